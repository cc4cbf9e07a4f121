//! Low-level DSP primitives used by voices and the effects bus.
//!
//! These components are allocation-free and realtime-safe, making them safe to
//! embed directly inside voice structs. They intentionally stay focused on the
//! signal-processing math so the voice and effects layers can layer on
//! orchestration and modulation.

/// Time-domain delay line with optional interpolation.
pub mod delay;
/// Attack/decay/sustain/release envelope generator.
pub mod envelope;
/// State-variable filter with drive and multiple responses.
pub mod filter;
/// Free-running low frequency oscillator.
pub mod lfo;
/// Wavetable-reading oscillator with detune and phase modulation.
pub mod oscillator;
/// Waveshaping curves (soft saturation, hard clip).
pub mod shaper;
/// Harmonic-series wavetable bank.
pub mod wavetable;

pub use envelope::{EnvelopeConfig, EnvelopeInstance, EnvelopeStage};
pub use wavetable::Waveform;
