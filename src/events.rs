//! Structured pipeline events. Observers only watch; nothing they do feeds
//! back into segmentation or matching.

use serde::Serialize;
use std::io::Write;

use crate::gesture::recognizer::GestureOutcome;
use crate::gesture::table::{ActionId, Step};
use crate::pitch::note::Note;
use crate::pitch::segment::{CloseCause, ClosedSegment, SegmentOutcome};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    SegmentClosed {
        note: String,
        error_rate: f32,
        samples: usize,
        mean_frequency: f32,
        cause: CloseCause,
    },
    SegmentDiscarded {
        samples: usize,
        error_rate: f32,
        cause: CloseCause,
    },
    GestureAttempt {
        notes: Vec<String>,
        steps: Vec<Step>,
        matched: bool,
        action: Option<ActionId>,
    },
    GestureDropped {
        notes: Vec<String>,
    },
    GestureMalformed {
        notes: Vec<String>,
        error: String,
    },
    DispatchFailed {
        action: ActionId,
        error: String,
    },
}

impl Event {
    pub fn segment(closed: &ClosedSegment) -> Self {
        match closed.outcome {
            SegmentOutcome::Note(note) => Event::segment_closed(note, closed),
            SegmentOutcome::TooShort => Event::SegmentDiscarded {
                samples: closed.samples,
                error_rate: closed.error_rate,
                cause: closed.cause,
            },
        }
    }

    fn segment_closed(note: Note, closed: &ClosedSegment) -> Self {
        Event::SegmentClosed {
            note: note.label(),
            error_rate: closed.error_rate,
            samples: closed.samples,
            mean_frequency: closed.mean_frequency,
            cause: closed.cause,
        }
    }

    pub fn gesture(outcome: &GestureOutcome) -> Self {
        match outcome {
            GestureOutcome::Matched {
                notes,
                steps,
                action,
            } => Event::GestureAttempt {
                notes: notes.clone(),
                steps: steps.clone(),
                matched: true,
                action: Some(*action),
            },
            GestureOutcome::Unmatched { notes, steps } => Event::GestureAttempt {
                notes: notes.clone(),
                steps: steps.clone(),
                matched: false,
                action: None,
            },
            GestureOutcome::TooShort { notes } => Event::GestureDropped {
                notes: notes.clone(),
            },
            GestureOutcome::Malformed { notes, error } => Event::GestureMalformed {
                notes: notes.clone(),
                error: error.to_string(),
            },
        }
    }
}

pub trait Observer {
    fn on_event(&mut self, event: &Event);
}

/// Routes events to the `log` facade.
#[derive(Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn on_event(&mut self, event: &Event) {
        match event {
            Event::SegmentClosed {
                note,
                error_rate,
                samples,
                mean_frequency,
                ..
            } => log::debug!(
                "note {} ({:.1} Hz, {} blocks, error {:.4})",
                note,
                mean_frequency,
                samples,
                error_rate
            ),
            Event::SegmentDiscarded { samples, cause, .. } => {
                log::debug!("discarded {}-block segment ({:?})", samples, cause)
            }
            Event::GestureAttempt {
                notes,
                steps,
                action: Some(action),
                ..
            } => log::info!("gesture {:?} {:?} -> {}", notes, steps_repr(steps), action),
            Event::GestureAttempt { notes, steps, .. } => {
                log::info!("gesture {:?} {:?} unmatched", notes, steps_repr(steps))
            }
            Event::GestureDropped { notes } => log::debug!("dropped short gesture {:?}", notes),
            Event::GestureMalformed { notes, error } => {
                log::warn!("gesture {:?} aborted: {}", notes, error)
            }
            Event::DispatchFailed { action, error } => {
                log::warn!("action {} failed: {}", action, error)
            }
        }
    }
}

fn steps_repr(steps: &[Step]) -> Vec<i8> {
    steps.iter().map(|&s| i8::from(s)).collect()
}

/// One JSON object per line.
pub struct JsonObserver<W: Write> {
    out: W,
}

impl<W: Write> JsonObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Observer for JsonObserver<W> {
    fn on_event(&mut self, event: &Event) {
        let written = serde_json::to_writer(&mut self.out, event)
            .map_err(std::io::Error::from)
            .and_then(|_| writeln!(self.out))
            .and_then(|_| self.out.flush());
        if let Err(err) = written {
            log::warn!("failed to write event: {}", err);
        }
    }
}

/// Fans an event out to several observers.
pub struct Observers(pub Vec<Box<dyn Observer>>);

impl Observer for Observers {
    fn on_event(&mut self, event: &Event) {
        for observer in &mut self.0 {
            observer.on_event(event);
        }
    }
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct Recorder {
    pub events: Vec<Event>,
}

#[cfg(test)]
impl Observer for Recorder {
    fn on_event(&mut self, event: &Event) {
        self.events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::table::Switch;

    #[test]
    fn gesture_events_carry_match_flag() {
        let matched = Event::gesture(&GestureOutcome::Matched {
            notes: vec!["C5".into(), "D5".into(), "D5".into()],
            steps: vec![Step::Up, Step::Flat],
            action: ActionId::ToggleOn(Switch::A),
        });
        assert!(matches!(matched, Event::GestureAttempt { matched: true, .. }));

        let unmatched = Event::gesture(&GestureOutcome::Unmatched {
            notes: vec!["C5".into(), "D5".into()],
            steps: vec![Step::Up],
        });
        assert!(matches!(unmatched, Event::GestureAttempt { matched: false, action: None, .. }));
    }

    #[test]
    fn json_lines() {
        let mut out = Vec::new();
        {
            let mut observer = JsonObserver::new(&mut out);
            observer.on_event(&Event::GestureAttempt {
                notes: vec!["C5".into(), "D5".into()],
                steps: vec![Step::Up],
                matched: false,
                action: None,
            });
            observer.on_event(&Event::GestureDropped {
                notes: vec!["A5".into()],
            });
        }
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            concat!(
                r#"{"event":"gesture_attempt","notes":["C5","D5"],"steps":[1],"#,
                r#""matched":false,"action":null}"#
            )
        );
        assert_eq!(lines[1], r#"{"event":"gesture_dropped","notes":["A5"]}"#);
    }
}
