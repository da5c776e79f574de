use rustfft::{num_complex::Complex, Fft, FftPlanner, Length};
use std::sync::Arc;

use crate::config::DetectorConfig;

/// Non-redundant half of a block's DFT.
#[derive(Clone, Debug)]
pub struct Spectrum {
    pub bins: Vec<Complex<f32>>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeakEstimate {
    pub frequency: f32,
    pub power: f32,
}

pub struct SpectralAnalyzer {
    planner: FftPlanner<f32>,
    fft: Option<Arc<dyn Fft<f32>>>,
    silence_gate: i16,
    min_power: f32,
    min_frequency: f32,
    max_frequency: f32,
}

impl SpectralAnalyzer {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            planner: FftPlanner::new(),
            fft: None,
            silence_gate: config.silence_gate,
            min_power: config.min_power,
            min_frequency: config.min_frequency,
            max_frequency: config.max_frequency,
        }
    }

    /// Silence gate: the block's largest absolute sample must exceed the gate.
    pub fn is_active(&self, block: &[i16]) -> bool {
        let peak = block.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        peak > self.silence_gate.unsigned_abs()
    }

    pub fn analyze(&mut self, block: &[i16]) -> Spectrum {
        let n = block.len();
        if n == 0 {
            return Spectrum { bins: Vec::new() };
        }

        let fft = match &self.fft {
            Some(fft) if fft.len() == n => fft.clone(),
            _ => {
                let fft = self.planner.plan_fft_forward(n);
                self.fft = Some(fft.clone());
                fft
            }
        };

        let mut buffer: Vec<Complex<f32>> =
            block.iter().map(|&s| Complex::new(s as f32, 0.0)).collect();
        fft.process(&mut buffer);
        buffer.truncate(n / 2);

        Spectrum { bins: buffer }
    }

    /// Strongest bin, before any power or band filtering.
    pub fn peak(spectrum: &Spectrum, sample_rate: u32) -> Option<PeakEstimate> {
        let mut best: Option<(usize, f32)> = None;
        for (i, bin) in spectrum.bins.iter().enumerate() {
            let magnitude = bin.norm();
            if best.map_or(true, |(_, m)| magnitude > m) {
                best = Some((i, magnitude));
            }
        }

        best.map(|(i, power)| PeakEstimate {
            frequency: i as f32 * sample_rate as f32 / (2 * spectrum.len()) as f32,
            power,
        })
    }

    pub fn accepts(&self, peak: &PeakEstimate) -> bool {
        peak.power >= self.min_power
            && peak.frequency >= self.min_frequency
            && peak.frequency <= self.max_frequency
    }

    /// Gate, transform, pick the peak and filter it. `None` means no usable
    /// pitch in this block.
    pub fn detect(&mut self, block: &[i16], sample_rate: u32) -> Option<PeakEstimate> {
        if !self.is_active(block) {
            return None;
        }
        let spectrum = self.analyze(block);
        Self::peak(&spectrum, sample_rate).filter(|peak| self.accepts(peak))
    }
}

#[cfg(test)]
pub(crate) fn sine_block(freq: f32, amplitude: f32, len: usize, sample_rate: u32) -> Vec<i16> {
    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 48_000;
    const LEN: usize = 1024;

    fn analyzer() -> SpectralAnalyzer {
        SpectralAnalyzer::new(&DetectorConfig::default())
    }

    fn bin_width() -> f32 {
        RATE as f32 / LEN as f32
    }

    #[test]
    fn spectrum_is_half_the_block() {
        let mut a = analyzer();
        let spectrum = a.analyze(&sine_block(1000.0, 8000.0, LEN, RATE));
        assert_eq!(spectrum.len(), LEN / 2);
    }

    #[test]
    fn peak_lands_on_the_tone() {
        let mut a = analyzer();
        for freq in [843.75, 1031.25, 1500.0] {
            let spectrum = a.analyze(&sine_block(freq, 8000.0, LEN, RATE));
            let peak = SpectralAnalyzer::peak(&spectrum, RATE).unwrap();
            assert!(
                (peak.frequency - freq).abs() <= bin_width() / 2.0,
                "{} vs {}",
                peak.frequency,
                freq
            );
            assert!(peak.power > 700_000.0);
        }
    }

    #[test]
    fn silence_gate() {
        let a = analyzer();
        assert!(!a.is_active(&[0; LEN]));
        assert!(!a.is_active(&sine_block(1000.0, 3000.0, LEN, RATE)));
        assert!(a.is_active(&sine_block(1000.0, 8000.0, LEN, RATE)));
        assert!(a.is_active(&[-5000, 0, 0]));
        assert!(!a.is_active(&[]));
    }

    #[test]
    fn detect_accepts_whistle_band_only() {
        let mut a = analyzer();
        assert!(a.detect(&sine_block(1031.25, 8000.0, LEN, RATE), RATE).is_some());
        assert!(a.detect(&sine_block(421.875, 8000.0, LEN, RATE), RATE).is_none());
        assert!(a.detect(&sine_block(3000.0, 8000.0, LEN, RATE), RATE).is_none());
        assert!(a.detect(&sine_block(1031.25, 1000.0, LEN, RATE), RATE).is_none());
    }

    #[test]
    fn band_edges_are_inclusive() {
        let a = analyzer();
        let at = |frequency| PeakEstimate { frequency, power: 1e7 };
        assert!(a.accepts(&at(750.0)));
        assert!(a.accepts(&at(2000.0)));
        assert!(!a.accepts(&at(749.9)));
        assert!(!a.accepts(&at(2000.1)));
        assert!(!a.accepts(&PeakEstimate { frequency: 1000.0, power: 10.0 }));
    }

    #[test]
    fn replans_for_new_block_length() {
        let mut a = analyzer();
        assert_eq!(a.analyze(&sine_block(1000.0, 8000.0, 512, RATE)).len(), 256);
        assert_eq!(a.analyze(&sine_block(1000.0, 8000.0, 2048, RATE)).len(), 1024);
        assert!(a.analyze(&[]).is_empty());
    }
}
