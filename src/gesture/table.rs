use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Direction between two consecutive notes of a gesture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "i8")]
pub enum Step {
    Down,
    Flat,
    Up,
}

impl Step {
    pub fn between(from: i32, to: i32) -> Self {
        match to.cmp(&from) {
            Ordering::Less => Step::Down,
            Ordering::Equal => Step::Flat,
            Ordering::Greater => Step::Up,
        }
    }
}

impl From<Step> for i8 {
    fn from(step: Step) -> i8 {
        match step {
            Step::Down => -1,
            Step::Flat => 0,
            Step::Up => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Switch {
    A,
    B,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case", tag = "action", content = "switch")]
pub enum ActionId {
    ToggleOn(Switch),
    ToggleOff(Switch),
    ResumePlayback,
    PausePlayback,
    PanicStopAll,
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionId::ToggleOn(switch) => write!(f, "toggle-on({:?})", switch),
            ActionId::ToggleOff(switch) => write!(f, "toggle-off({:?})", switch),
            ActionId::ResumePlayback => write!(f, "resume-playback"),
            ActionId::PausePlayback => write!(f, "pause-playback"),
            ActionId::PanicStopAll => write!(f, "panic-stop-all"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GesturePattern {
    pub steps: Vec<Step>,
    pub action: ActionId,
}

impl GesturePattern {
    pub fn new(steps: &[Step], action: ActionId) -> Self {
        Self {
            steps: steps.to_vec(),
            action,
        }
    }
}

/// Step sequences bound to actions. Lookups are exact sequence equality.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GestureTable {
    patterns: Vec<GesturePattern>,
}

impl GestureTable {
    pub fn new(patterns: Vec<GesturePattern>) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &[GesturePattern] {
        &self.patterns
    }

    /// First pattern whose steps equal `steps` exactly.
    pub fn lookup(&self, steps: &[Step]) -> Option<ActionId> {
        self.patterns
            .iter()
            .find(|pattern| pattern.steps == steps)
            .map(|pattern| pattern.action)
    }
}

impl Default for GestureTable {
    fn default() -> Self {
        use Step::*;
        Self::new(vec![
            GesturePattern::new(&[Up, Flat], ActionId::ToggleOn(Switch::A)),
            GesturePattern::new(&[Down, Flat], ActionId::ToggleOff(Switch::A)),
            GesturePattern::new(&[Down, Up], ActionId::ToggleOn(Switch::B)),
            GesturePattern::new(&[Up, Down], ActionId::ToggleOff(Switch::B)),
            GesturePattern::new(&[Flat, Up], ActionId::ResumePlayback),
            GesturePattern::new(&[Flat, Down], ActionId::PausePlayback),
            GesturePattern::new(&[Down, Down, Down], ActionId::PanicStopAll),
        ])
    }
}
