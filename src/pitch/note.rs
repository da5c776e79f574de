use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reference pitch: A4.
const REFERENCE_HZ: f32 = 440.0;
/// Table offset of A4 (octave 4 * 12 + A).
const REFERENCE_INDEX: i32 = 57;
/// C0 through G#9.
const TABLE_LEN: usize = 117;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    pub fn index(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|pc| pc.name() == name)
    }
}

/// A pitch class bound to an octave. Canonical label is e.g. `"A5"` or `"C#4"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Note {
    pub pitch_class: PitchClass,
    pub octave: i32,
}

impl Note {
    pub fn new(pitch_class: PitchClass, octave: i32) -> Self {
        Self { pitch_class, octave }
    }

    /// Position on the chromatic scale; strictly increases with pitch.
    pub fn index(&self) -> i32 {
        self.octave * 12 + self.pitch_class.index()
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class.name(), self.octave)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteParseError {
    #[error("note label '{0}' is not of the form <name><octave>")]
    Malformed(String),
    #[error("unknown pitch class '{name}' in note label '{label}'")]
    UnknownPitchClass { label: String, name: String },
    #[error("octave in note label '{0}' is out of range")]
    OctaveOutOfRange(String),
}

impl FromStr for Note {
    type Err = NoteParseError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let split = label
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| NoteParseError::Malformed(label.to_string()))?;
        let (name, digits) = label.split_at(split);

        if name.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(NoteParseError::Malformed(label.to_string()));
        }

        let octave: i32 = digits
            .parse()
            .map_err(|_| NoteParseError::OctaveOutOfRange(label.to_string()))?;
        // Keep `Note::index` representable for every pitch class.
        if octave.checked_mul(12).and_then(|base| base.checked_add(11)).is_none() {
            return Err(NoteParseError::OctaveOutOfRange(label.to_string()));
        }
        let pitch_class =
            PitchClass::from_name(name).ok_or_else(|| NoteParseError::UnknownPitchClass {
                label: label.to_string(),
                name: name.to_string(),
            })?;

        Ok(Note::new(pitch_class, octave))
    }
}

/// Parse a canonical note label into its chromatic index.
pub fn note_to_index(label: &str) -> Result<i32, NoteParseError> {
    label.parse::<Note>().map(|note| note.index())
}

/// Equal-tempered reference table used to quantize frequencies to notes.
///
/// Read-only after construction, so it can be shared freely (`Arc`).
#[derive(Debug, Clone)]
pub struct NoteMapper {
    frequencies: Vec<f32>,
}

impl Default for NoteMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteMapper {
    pub fn new() -> Self {
        let frequencies = (0..TABLE_LEN as i32)
            .map(|i| REFERENCE_HZ * 2f32.powf((i - REFERENCE_INDEX) as f32 / 12.0))
            .collect();
        Self { frequencies }
    }

    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies
    }

    /// Quantize to the nearest semitone by frequency ratio, not Hz difference.
    /// Ties resolve to the lower table entry.
    pub fn frequency_to_note(&self, freq: f32) -> Option<Note> {
        if !freq.is_finite() || freq <= 0.0 {
            return None;
        }

        let mut best: Option<(usize, f32)> = None;
        for (i, &reference) in self.frequencies.iter().enumerate() {
            let distance = reference.max(freq) / reference.min(freq);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((i, distance));
            }
        }

        best.map(|(i, _)| Self::note_at(i))
    }

    fn note_at(index: usize) -> Note {
        Note::new(PitchClass::ALL[index % 12], (index / 12) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_is_440() {
        let mapper = NoteMapper::new();
        assert_eq!(mapper.frequency_to_note(440.0).unwrap().to_string(), "A4");
        assert_eq!(mapper.frequency_to_note(880.0).unwrap().to_string(), "A5");
        assert_eq!(mapper.frequency_to_note(523.25).unwrap().to_string(), "C5");
        assert_eq!(mapper.frequency_to_note(1046.5).unwrap().to_string(), "C6");
    }

    #[test]
    fn zero_and_invalid_frequencies_have_no_note() {
        let mapper = NoteMapper::new();
        assert!(mapper.frequency_to_note(0.0).is_none());
        assert!(mapper.frequency_to_note(-12.0).is_none());
        assert!(mapper.frequency_to_note(f32::NAN).is_none());
    }

    #[test]
    fn every_entry_owns_its_half_semitone_band() {
        let mapper = NoteMapper::new();
        let half = 2f32.powf(1.0 / 24.0);
        for (i, &f) in mapper.frequencies().iter().enumerate() {
            let expected = NoteMapper::note_at(i);
            for factor in [1.0, 0.999 * half, 1.0 / (0.999 * half), 1.01, 0.99] {
                assert_eq!(
                    mapper.frequency_to_note(f * factor),
                    Some(expected),
                    "{} Hz (entry {})",
                    f * factor,
                    i
                );
            }
        }
    }

    #[test]
    fn ratio_distance_not_absolute_distance() {
        // 906 Hz is nearer A5 (880) in Hz but nearer A#5 (932.33) by ratio.
        let mapper = NoteMapper::new();
        assert!(906.0 - 880.0 < 932.33 - 906.0);
        assert_eq!(mapper.frequency_to_note(906.0).unwrap().to_string(), "A#5");
    }

    #[test]
    fn out_of_range_clamps_to_table_ends() {
        let mapper = NoteMapper::new();
        assert_eq!(mapper.frequency_to_note(1.0).unwrap().to_string(), "C0");
        assert_eq!(mapper.frequency_to_note(40_000.0).unwrap().to_string(), "G#9");
    }

    #[test]
    fn index_is_monotonic_across_semitones() {
        let mapper = NoteMapper::new();
        let indices: Vec<i32> = (0..mapper.frequencies().len())
            .map(|i| note_to_index(&NoteMapper::note_at(i).to_string()).unwrap())
            .collect();
        for pair in indices.windows(2) {
            assert_eq!(pair[1], pair[0] + 1);
        }
        assert!(note_to_index("B4").unwrap() < note_to_index("C5").unwrap());
    }

    #[test]
    fn parses_labels() {
        assert_eq!(note_to_index("C0").unwrap(), 0);
        assert_eq!(note_to_index("A5").unwrap(), 69);
        assert_eq!(note_to_index("C#5").unwrap(), 61);
        assert_eq!("G#9".parse::<Note>().unwrap(), Note::new(PitchClass::GSharp, 9));
    }

    #[test]
    fn rejects_malformed_labels() {
        assert!(matches!(note_to_index(""), Err(NoteParseError::Malformed(_))));
        assert!(matches!(note_to_index("C"), Err(NoteParseError::Malformed(_))));
        assert!(matches!(note_to_index("5"), Err(NoteParseError::Malformed(_))));
        assert!(matches!(note_to_index("C5x"), Err(NoteParseError::Malformed(_))));
        assert!(matches!(
            note_to_index("H5"),
            Err(NoteParseError::UnknownPitchClass { .. })
        ));
    }

    #[test]
    fn huge_octaves_are_rejected_not_wrapped() {
        assert!(matches!(
            note_to_index("C999999999"),
            Err(NoteParseError::OctaveOutOfRange(_))
        ));
        assert!(matches!(
            note_to_index("B99999999999999999999"),
            Err(NoteParseError::OctaveOutOfRange(_))
        ));
        // Largest octave whose B still has an index.
        let top = (i32::MAX - 11) / 12;
        assert_eq!(note_to_index(&format!("B{top}")).unwrap(), top * 12 + 11);
        assert!(note_to_index(&format!("C{}", top + 1)).is_err());
    }
}
