use serde::{Deserialize, Serialize};

use crate::voice::Lane;

pub const MAX_STEPS: usize = 64;
pub const DEFAULT_STEPS: usize = 16;

/// One armed slot in a pattern.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub note: i32,
    pub velocity: f32,
}

/// A looping row of optional steps. Storage is always `MAX_STEPS` slots;
/// `length` decides how many take part in the loop, so shortening and
/// re-lengthening a pattern round-trips the hidden tail.
#[derive(Debug, Clone, PartialEq)]
pub struct StepPattern {
    steps: Vec<Option<Step>>,
    length: usize,
}

impl StepPattern {
    pub fn new() -> Self {
        Self {
            steps: vec![None; MAX_STEPS],
            length: DEFAULT_STEPS,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn set_length(&mut self, length: usize) {
        self.length = length.clamp(1, MAX_STEPS);
    }

    /// The step the loop plays at absolute step index `index`.
    pub fn step_at(&self, index: u64) -> Option<Step> {
        self.steps[(index % self.length as u64) as usize]
    }

    pub fn set_step(&mut self, slot: usize, step: Option<Step>) {
        if slot < MAX_STEPS {
            self.steps[slot] = step;
        }
    }

    pub fn clear(&mut self) {
        self.steps.fill(None);
    }

    pub fn armed_count(&self) -> usize {
        self.steps[..self.length].iter().filter(|s| s.is_some()).count()
    }
}

impl Default for StepPattern {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the scheduler reads each wake: both lane patterns plus the
/// timing controls. Lives behind a mutex shared by the control side and
/// the scheduler thread; the render side never touches it.
#[derive(Debug, Clone)]
pub struct SeqState {
    pub mono_pattern: StepPattern,
    pub poly_pattern: StepPattern,
    pub bpm: f32,
    /// Delay applied to odd-index steps, as a fraction of a step.
    pub swing: f32,
    /// Steps per beat. 4 gives sixteenth notes.
    pub subdivision: u32,
}

impl SeqState {
    pub fn pattern(&self, lane: Lane) -> &StepPattern {
        match lane {
            Lane::Mono => &self.mono_pattern,
            Lane::Poly => &self.poly_pattern,
        }
    }

    pub fn pattern_mut(&mut self, lane: Lane) -> &mut StepPattern {
        match lane {
            Lane::Mono => &mut self.mono_pattern,
            Lane::Poly => &mut self.poly_pattern,
        }
    }

    /// Unswung step duration. Swing displaces individual onsets but never
    /// this grid.
    pub fn step_duration_samples(&self, sample_rate: f32) -> f64 {
        let bpm = f64::from(self.bpm.clamp(20.0, 300.0));
        let subdivision = f64::from(self.subdivision.max(1));
        60.0 / bpm / subdivision * f64::from(sample_rate)
    }
}

impl Default for SeqState {
    fn default() -> Self {
        Self {
            mono_pattern: StepPattern::new(),
            poly_pattern: StepPattern::new(),
            bpm: 120.0,
            swing: 0.0,
            subdivision: 4,
        }
    }
}
