use serde::{Deserialize, Serialize};

use crate::MIN_TIME;

/*
ADSR Envelope
=============

Linear ADSR split into two pieces:

  EnvelopeConfig    Plain copyable data (attack/decay/release in ms, sustain
                    level). Shared across every voice of an instrument; a
                    voice never mutates it.

  EnvelopeInstance  The per-voice state machine. Idle -> Attack -> Decay ->
                    Sustain -> Release -> Idle.

Gate-off starts Release from the CURRENT level, from any stage, which
prevents clicks when a note is cut during its attack. Release snapshots the
starting level and total sample count at gate-off so the ramp lands exactly
on 0 after `release_ms` — voice disposal keys off that.
*/

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeConfig {
    pub attack_ms: f32,
    pub decay_ms: f32,
    /// Level held while the gate is high (0.0 - 1.0).
    pub sustain_level: f32,
    pub release_ms: f32,
}

impl EnvelopeConfig {
    pub fn new(attack_ms: f32, decay_ms: f32, sustain_level: f32, release_ms: f32) -> Self {
        Self {
            attack_ms: attack_ms.max(MIN_TIME * 1000.0),
            decay_ms: decay_ms.max(MIN_TIME * 1000.0),
            sustain_level: sustain_level.clamp(0.0, 1.0),
            release_ms: release_ms.max(MIN_TIME * 1000.0),
        }
    }
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self::new(10.0, 100.0, 0.7, 300.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

#[derive(Debug, Clone)]
pub struct EnvelopeInstance {
    config: EnvelopeConfig,
    stage: EnvelopeStage,
    level: f32,

    decay_start_level: f32,

    // Release bookkeeping, pre-calculated at gate-off for precision
    release_start_level: f32,
    release_total_samples: u32,
    release_elapsed_samples: u32,
}

impl EnvelopeInstance {
    pub fn new(config: EnvelopeConfig) -> Self {
        Self {
            config,
            stage: EnvelopeStage::Idle,
            level: 0.0,
            decay_start_level: 0.0,
            release_start_level: 0.0,
            release_total_samples: 1,
            release_elapsed_samples: 0,
        }
    }

    pub fn config(&self) -> EnvelopeConfig {
        self.config
    }

    /// Gate high: restart the attack from zero for a clean retrigger.
    pub fn gate_on(&mut self) {
        self.level = 0.0;
        self.stage = EnvelopeStage::Attack;
        self.release_elapsed_samples = 0;
    }

    /// Gate low: start the release phase from the current level.
    pub fn gate_off(&mut self, sample_rate: f32) {
        if self.stage == EnvelopeStage::Idle {
            return;
        }

        self.release_start_level = self.level;
        self.release_total_samples = (self.config.release_ms / 1000.0 * sample_rate)
            .round()
            .max(1.0) as u32;
        self.release_elapsed_samples = 0;
        self.stage = EnvelopeStage::Release;
    }

    /// Advance one sample and return the new level.
    pub fn next_sample(&mut self, sample_rate: f32) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }

            EnvelopeStage::Attack => {
                let increment = 1000.0 / (self.config.attack_ms * sample_rate);
                self.level += increment;

                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.decay_start_level = 1.0;
                    self.stage = EnvelopeStage::Decay;
                }
            }

            EnvelopeStage::Decay => {
                let target = self.config.sustain_level;
                let total_drop = self.decay_start_level - target;
                let decrement = total_drop * 1000.0 / (self.config.decay_ms * sample_rate);
                self.level -= decrement;

                if self.level <= target {
                    self.level = target;
                    self.stage = EnvelopeStage::Sustain;
                }
            }

            EnvelopeStage::Sustain => {
                self.level = self.config.sustain_level;
            }

            EnvelopeStage::Release => {
                let progress =
                    self.release_elapsed_samples as f32 / self.release_total_samples as f32;
                self.level = (self.release_start_level * (1.0 - progress)).max(0.0);

                self.release_elapsed_samples = self.release_elapsed_samples.saturating_add(1);

                if self.release_elapsed_samples >= self.release_total_samples {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }

        debug_assert!((0.0..=1.0).contains(&self.level));
        self.level
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn is_active(&self) -> bool {
        self.stage != EnvelopeStage::Idle
    }

    pub fn reset(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
        self.decay_start_level = 0.0;
        self.release_start_level = 0.0;
        self.release_elapsed_samples = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 1_000.0;

    fn advance(env: &mut EnvelopeInstance, samples: usize) {
        for _ in 0..samples {
            env.next_sample(SAMPLE_RATE);
        }
    }

    #[test]
    fn attack_reaches_full_level() {
        let mut env = EnvelopeInstance::new(EnvelopeConfig::new(10.0, 100.0, 0.7, 200.0));

        env.gate_on();
        advance(&mut env, (0.010 * SAMPLE_RATE) as usize);

        assert!(env.level() > 0.99, "expected attack to reach full level");
        assert_ne!(env.stage(), EnvelopeStage::Attack);
    }

    #[test]
    fn sustain_holds_target_level() {
        let sustain = 0.6;
        let mut env = EnvelopeInstance::new(EnvelopeConfig::new(10.0, 50.0, sustain, 200.0));

        env.gate_on();
        advance(&mut env, (0.060 * SAMPLE_RATE) as usize + 5);

        assert_eq!(env.stage(), EnvelopeStage::Sustain);
        assert!((env.level() - sustain).abs() < 0.05);
    }

    #[test]
    fn release_falls_back_to_idle() {
        let release_ms = 30.0;
        let mut env = EnvelopeInstance::new(EnvelopeConfig::new(10.0, 50.0, 0.5, release_ms));

        env.gate_on();
        advance(&mut env, (0.020 * SAMPLE_RATE) as usize);

        env.gate_off(SAMPLE_RATE);
        advance(&mut env, (release_ms / 1000.0 * SAMPLE_RATE) as usize + 2);

        assert!(env.level() <= 0.001, "release should fall back to zero");
        assert_eq!(env.stage(), EnvelopeStage::Idle);
    }

    #[test]
    fn release_starts_from_current_level_during_attack() {
        let mut env = EnvelopeInstance::new(EnvelopeConfig::new(100.0, 50.0, 0.7, 50.0));

        env.gate_on();
        advance(&mut env, 20); // partway through a 100-sample attack
        let level_at_cut = env.level();
        assert!(level_at_cut < 0.5);

        env.gate_off(SAMPLE_RATE);
        let next = env.next_sample(SAMPLE_RATE);
        assert!(
            next <= level_at_cut,
            "release must ramp down from the interrupted level, not jump"
        );
    }

    #[test]
    fn not_active_only_after_full_release() {
        let release_ms = 100.0;
        let mut env = EnvelopeInstance::new(EnvelopeConfig::new(1.0, 1.0, 1.0, release_ms));

        env.gate_on();
        advance(&mut env, 10);
        env.gate_off(SAMPLE_RATE);

        let release_samples = (release_ms / 1000.0 * SAMPLE_RATE) as usize;
        advance(&mut env, release_samples - 2);
        assert!(env.is_active(), "must stay active until release completes");

        advance(&mut env, 4);
        assert!(!env.is_active());
    }
}
