//! Block-by-block segmentation of peak frequencies into sustained notes.
//!
//! A segment collects the accepted peak frequencies of one candidate note.
//! When the next peak arrives, the segment closes if its own relative
//! deviation is above `max_error_rate` or if no peak has been accepted for
//! longer than `gap`. A peak that strays from the note therefore joins the
//! segment first and closes it on the following block. Silence longer than
//! `gap` also closes it. Closed segments holding more than `min_segment_len`
//! peaks are quantized to a [`Note`]; shorter ones are transient noise.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::note::{Note, NoteMapper};
use crate::config::SegmenterConfig;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CloseCause {
    /// The segment's relative deviation went over the limit
    Unstable { error_rate: f32 },
    /// No accepted peak for longer than `gap`
    Timeout,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SegmentOutcome {
    Note(Note),
    TooShort,
}

/// Result of closing a segment. The peak that triggered the close is not part
/// of it.
#[derive(Clone, Debug, PartialEq)]
pub struct ClosedSegment {
    pub outcome: SegmentOutcome,
    pub cause: CloseCause,
    pub samples: usize,
    pub mean_frequency: f32,
    pub error_rate: f32,
}

impl ClosedSegment {
    pub fn note(&self) -> Option<Note> {
        match self.outcome {
            SegmentOutcome::Note(note) => Some(note),
            SegmentOutcome::TooShort => None,
        }
    }
}

pub struct NoteSegmenter {
    mapper: Arc<NoteMapper>,
    max_error_rate: f32,
    gap: Duration,
    min_segment_len: usize,
    segment: Vec<f32>,
    last_accepted: Option<Duration>,
}

impl NoteSegmenter {
    pub fn new(config: &SegmenterConfig, mapper: Arc<NoteMapper>) -> Self {
        Self {
            mapper,
            max_error_rate: config.max_error_rate,
            gap: config.gap(),
            min_segment_len: config.min_segment_len,
            segment: Vec::new(),
            last_accepted: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.segment.is_empty()
    }

    pub fn segment(&self) -> &[f32] {
        &self.segment
    }

    /// Feed one block's accepted peak (or `None`) observed at `now`.
    ///
    /// Closes at most one segment per call.
    pub fn push(&mut self, peak: Option<f32>, now: Duration) -> Option<ClosedSegment> {
        let timed_out = self.timed_out(now);

        let Some(freq) = peak else {
            return if timed_out {
                Some(self.close(CloseCause::Timeout))
            } else {
                None
            };
        };

        let closed = if self.segment.is_empty() {
            None
        } else if timed_out {
            Some(self.close(CloseCause::Timeout))
        } else {
            let (_, error_rate) = stats(&self.segment);
            (error_rate > self.max_error_rate)
                .then(|| self.close(CloseCause::Unstable { error_rate }))
        };

        self.segment.push(freq);
        self.last_accepted = Some(now);
        closed
    }

    fn timed_out(&self, now: Duration) -> bool {
        match self.last_accepted {
            Some(last) if !self.segment.is_empty() => now.saturating_sub(last) > self.gap,
            _ => false,
        }
    }

    fn close(&mut self, cause: CloseCause) -> ClosedSegment {
        let samples = self.segment.len();
        let (mean_frequency, error_rate) = stats(&self.segment);
        self.segment.clear();

        let outcome = if samples > self.min_segment_len {
            match self.mapper.frequency_to_note(mean_frequency) {
                Some(note) => SegmentOutcome::Note(note),
                None => SegmentOutcome::TooShort,
            }
        } else {
            SegmentOutcome::TooShort
        };

        ClosedSegment {
            outcome,
            cause,
            samples,
            mean_frequency,
            error_rate,
        }
    }
}

/// Mean and relative (population) standard deviation.
fn stats(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let count = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / count;
    let variance = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / count;
    if mean <= 0.0 {
        return (mean as f32, 0.0);
    }
    (mean as f32, (variance.sqrt() / mean) as f32)
}
