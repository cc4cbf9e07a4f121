//! Step patterns and the lookahead scheduler that turns them into
//! sample-stamped note events.

pub mod pattern;
pub mod scheduler;

pub use pattern::{SeqState, Step, StepPattern, DEFAULT_STEPS, MAX_STEPS};
pub use scheduler::{SchedulerCore, SchedulerHandle};

use crate::voice::Lane;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEventKind {
    On,
    Off,
}

/// A note transition stamped with an absolute sample time. The render
/// side applies it at the exact offset inside whichever block contains
/// that time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub time: u64,
    pub kind: NoteEventKind,
    pub note: i32,
    pub velocity: f32,
    pub lane: Lane,
}

impl NoteEvent {
    pub fn on(time: u64, note: i32, velocity: f32, lane: Lane) -> Self {
        Self {
            time,
            kind: NoteEventKind::On,
            note,
            velocity,
            lane,
        }
    }

    pub fn off(time: u64, note: i32, lane: Lane) -> Self {
        Self {
            time,
            kind: NoteEventKind::Off,
            note,
            velocity: 0.0,
            lane,
        }
    }
}
