use std::time::Duration;

use super::table::{ActionId, GestureTable, Step};
use crate::config::GestureConfig;
use crate::pitch::note::{note_to_index, Note, NoteParseError};

/// Shortest gesture that can carry a step.
pub const MIN_GESTURE_NOTES: usize = 2;

/// How a completed gesture buffer was resolved.
#[derive(Clone, Debug, PartialEq)]
pub enum GestureOutcome {
    Matched {
        notes: Vec<String>,
        steps: Vec<Step>,
        action: ActionId,
    },
    Unmatched {
        notes: Vec<String>,
        steps: Vec<Step>,
    },
    /// Fewer than two notes; never reaches the matcher.
    TooShort { notes: Vec<String> },
    Malformed {
        notes: Vec<String>,
        error: NoteParseError,
    },
}

impl GestureOutcome {
    pub fn action(&self) -> Option<ActionId> {
        match self {
            GestureOutcome::Matched { action, .. } => Some(*action),
            _ => None,
        }
    }
}

/// Pairwise step directions of a note label sequence.
pub fn steps_for<S: AsRef<str>>(labels: &[S]) -> Result<Vec<Step>, NoteParseError> {
    let indices = labels
        .iter()
        .map(|label| note_to_index(label.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(indices.windows(2).map(|w| Step::between(w[0], w[1])).collect())
}

/// Resolve a finished note sequence against `table`. Pure: the same labels
/// always give the same outcome.
pub fn match_gesture(table: &GestureTable, notes: Vec<String>) -> GestureOutcome {
    if notes.len() < MIN_GESTURE_NOTES {
        return GestureOutcome::TooShort { notes };
    }
    match steps_for(&notes) {
        Ok(steps) => match table.lookup(&steps) {
            Some(action) => GestureOutcome::Matched {
                notes,
                steps,
                action,
            },
            None => GestureOutcome::Unmatched { notes, steps },
        },
        Err(error) => GestureOutcome::Malformed { notes, error },
    }
}

pub struct GestureRecognizer {
    table: GestureTable,
    end_gap: Duration,
    buffer: Vec<String>,
    last_note: Option<Duration>,
}

impl GestureRecognizer {
    pub fn new(config: &GestureConfig, table: GestureTable) -> Self {
        Self {
            table,
            end_gap: config.end_gap(),
            buffer: Vec::new(),
            last_note: None,
        }
    }

    pub fn buffer(&self) -> &[String] {
        &self.buffer
    }

    pub fn push_note(&mut self, note: &Note, now: Duration) {
        self.push_label(note.label(), now);
    }

    /// Append a finalized note label and restart the silence timer.
    pub fn push_label(&mut self, label: String, now: Duration) {
        self.buffer.push(label);
        self.last_note = Some(now);
    }

    /// Complete the gesture once `end_gap` has passed since the last note.
    /// The buffer is cleared whatever the outcome.
    pub fn poll(&mut self, now: Duration) -> Option<GestureOutcome> {
        let last = self.last_note?;
        if self.buffer.is_empty() || now.saturating_sub(last) <= self.end_gap {
            return None;
        }
        let notes = std::mem::take(&mut self.buffer);
        self.last_note = None;
        Some(match_gesture(&self.table, notes))
    }
}
