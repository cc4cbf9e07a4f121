//! Shared effects bus. All voices mix into a pre-bus which runs through a
//! fixed topology; only parameter values change at runtime, never wiring.

pub mod bus;
/// Chorus: LFO-modulated delay.
pub mod chorus;
/// Feedback delay line with wet/dry mix.
pub mod delay;
/// Envelope-follower dynamics: transient shaper and limiter.
pub mod dynamics;
/// Comb/allpass reverb with size, decay and pre-delay.
pub mod reverb;

use serde::{Deserialize, Serialize};

pub use bus::EffectsBus;

/// Every live-updatable bus parameter, as plain data. The control side
/// sends the whole struct; the bus copies the values into its nodes.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FxParams {
    pub chorus_rate_hz: f32,
    pub chorus_depth_ms: f32,
    pub chorus_mix: f32,

    pub delay_time_ms: f32,
    pub delay_feedback: f32,
    pub delay_mix: f32,

    pub reverb_size: f32,
    pub reverb_decay: f32,
    pub reverb_predelay_ms: f32,
    pub reverb_mix: f32,

    /// Transient emphasis, 0 = bypass.
    pub transient_attack: f32,
    /// Sustain gain shaping, 0 = bypass.
    pub transient_sustain: f32,

    pub master_gain: f32,
}

impl Default for FxParams {
    fn default() -> Self {
        Self {
            chorus_rate_hz: 0.9,
            chorus_depth_ms: 2.5,
            chorus_mix: 0.3,

            delay_time_ms: 375.0,
            delay_feedback: 0.35,
            delay_mix: 0.25,

            reverb_size: 0.5,
            reverb_decay: 0.5,
            reverb_predelay_ms: 20.0,
            reverb_mix: 0.2,

            transient_attack: 0.3,
            transient_sustain: 0.0,

            master_gain: 0.8,
        }
    }
}
