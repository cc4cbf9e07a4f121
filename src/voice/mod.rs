//! Voice layer: one sounding note's signal graph and the per-lane pool that
//! owns voice lifecycles (admission, stealing, disposal).

pub mod pool;
#[allow(clippy::module_inception)]
pub mod voice;

use serde::{Deserialize, Serialize};

use crate::dsp::envelope::EnvelopeConfig;
use crate::dsp::filter::FilterType;

pub use pool::VoicePool;
pub use voice::{Voice, VoiceState};

/// Which polyphony lane a note plays on.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// One sounding voice at a time; a new note cuts the holder.
    Mono,
    /// Capped polyphony with oldest-voice stealing.
    Poly,
}

impl Lane {
    pub fn from_index(index: u32) -> Self {
        if index == 0 {
            Lane::Mono
        } else {
            Lane::Poly
        }
    }
}

/// Convert a semitone note index to frequency in Hz (A4 = 440 Hz = 69).
#[inline]
pub fn note_to_freq(note: i32) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

/// Per-oscillator settings.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscParams {
    /// Morph position in [0, 3]: sine -> triangle -> saw -> square.
    pub morph: f32,
    pub semitone: f32,
    pub fine_cents: f32,
    pub level: f32,
    /// [-1, 1]. The engine renders mono; pan folds into the gain with a
    /// constant-power curve so presets keep the field intact.
    pub pan: f32,
}

impl OscParams {
    /// Mono gain after folding in the constant-power pan position.
    pub fn mono_gain(&self) -> f32 {
        let theta = (self.pan.clamp(-1.0, 1.0) + 1.0) * std::f32::consts::FRAC_PI_4;
        self.level * (theta.cos() + theta.sin()) * std::f32::consts::FRAC_1_SQRT_2
    }
}

/// Sub-oscillator: sine/square blend at the fundamental, tanh-shaped.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubParams {
    /// 0.0 = pure sine, 1.0 = pure square.
    pub blend: f32,
    pub level: f32,
}

/// FM operator settings. `attack_ms`/`decay_ms` are accepted, stored and
/// serialized but not routed into audio; the operator runs ungated.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FmParams {
    /// Modulator frequency = carrier * ratio.
    pub ratio: f32,
    /// Phase deviation amount, [0, 10].
    pub index: f32,
    pub attack_ms: f32,
    pub decay_ms: f32,
}

/// One filter slot.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    pub filter_type: FilterType,
    pub cutoff_hz: f32,
    pub resonance: f32,
    pub drive: f32,
}

/// Filter envelope: ADSR plus the exponential cutoff scaling
/// `factor = 2^(amount * octave_range * level)`.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterEnvParams {
    pub env: EnvelopeConfig,
    /// [-1, 1]. Negative amounts sweep the cutoff downward.
    pub amount: f32,
    /// Octave range of a full-amount sweep.
    pub octave_range: f32,
}

/// Everything a new voice copies at note-on. Plain data, shared by value.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceParams {
    pub osc_a: OscParams,
    pub osc_b: OscParams,
    pub sub: SubParams,
    pub fm: FmParams,
    pub filter1: FilterParams,
    pub filter2: FilterParams,
    /// Crossfade between the dry path and the parallel filter sum.
    /// 0.0 = fully dry, 1.0 = fully filtered.
    pub filter_mix: f32,
    pub amp_env: EnvelopeConfig,
    pub filter_env: FilterEnvParams,
    /// Rendered per voice but not hard-wired to a destination yet.
    pub mod_env: EnvelopeConfig,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            osc_a: OscParams {
                morph: 2.0, // saw
                semitone: 0.0,
                fine_cents: 0.0,
                level: 0.7,
                pan: 0.0,
            },
            osc_b: OscParams {
                morph: 3.0, // square
                semitone: 0.0,
                fine_cents: 7.0,
                level: 0.4,
                pan: 0.0,
            },
            sub: SubParams {
                blend: 0.3,
                level: 0.4,
            },
            fm: FmParams {
                ratio: 2.0,
                index: 0.0,
                attack_ms: 5.0,
                decay_ms: 120.0,
            },
            filter1: FilterParams {
                filter_type: FilterType::LowPass,
                cutoff_hz: 1200.0,
                resonance: 0.3,
                drive: 1.0,
            },
            filter2: FilterParams {
                filter_type: FilterType::HighPass,
                cutoff_hz: 200.0,
                resonance: 0.1,
                drive: 1.0,
            },
            filter_mix: 0.8,
            amp_env: EnvelopeConfig::new(5.0, 120.0, 0.6, 250.0),
            filter_env: FilterEnvParams {
                env: EnvelopeConfig::new(5.0, 180.0, 0.2, 250.0),
                amount: 0.5,
                octave_range: 4.0,
            },
            mod_env: EnvelopeConfig::new(10.0, 200.0, 0.5, 200.0),
        }
    }
}
