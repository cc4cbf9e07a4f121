use crate::dsp::envelope::EnvelopeInstance;
use crate::dsp::filter::SVFilter;
use crate::dsp::oscillator::Oscillator;
use crate::dsp::shaper;
use crate::dsp::wavetable::{Waveform, WavetableBank};
use crate::voice::{note_to_freq, Lane, VoiceParams};

/*
Voice Signal Graph
==================

One sounding note. The graph is fixed:

  osc A (FM'd) ──┐
  osc B ─────────┼──→ dry ──┬──────────────────────────────┐
  sub (tanh) ────┘          ├──→ [filter 1] ──→ sat ──┐    │ crossfade
                            └──→ [filter 2] ──→ sat ──┴─(+)┘ by filter_mix
                                                            │
                                               amp envelope × velocity
                                                            ↓
                                                         pre-bus

The two filters run in PARALLEL and their sum is crossfaded against the dry
path; running them in series changes the timbre materially, so the topology
is part of the contract.

Modulation rates: envelopes advance per sample; filter cutoff coefficients
refresh at block rate from the filter envelope's level at block start
(factor = 2^(amount * octave_range * level), times the global LFO factor).
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    /// Slot available for allocation.
    Free,
    /// Envelope in attack/decay/sustain.
    Sounding,
    /// Gate released, amp envelope in its release ramp.
    Releasing,
}

pub struct Voice {
    note: i32,
    velocity: f32,
    lane: Lane,
    state: VoiceState,
    age: u64,
    sample_rate: f32,

    params: VoiceParams,

    osc_a: Oscillator,
    osc_b: Oscillator,
    fm_osc: Oscillator,
    sub_phase: f32,

    filter1: SVFilter,
    filter2: SVFilter,

    amp_env: EnvelopeInstance,
    filter_env: EnvelopeInstance,
    mod_env: EnvelopeInstance,
}

impl Voice {
    pub fn new(sample_rate: f32, params: VoiceParams) -> Self {
        Self {
            note: 0,
            velocity: 0.0,
            lane: Lane::Poly,
            state: VoiceState::Free,
            age: 0,
            sample_rate,
            params,
            osc_a: Oscillator::new(),
            osc_b: Oscillator::new(),
            fm_osc: Oscillator::new(),
            sub_phase: 0.0,
            filter1: SVFilter::new(params.filter1.filter_type),
            filter2: SVFilter::new(params.filter2.filter_type),
            amp_env: EnvelopeInstance::new(params.amp_env),
            filter_env: EnvelopeInstance::new(params.filter_env.env),
            mod_env: EnvelopeInstance::new(params.mod_env),
        }
    }

    /// Start this voice on a note, copying the current instrument defaults.
    pub fn start(&mut self, note: i32, velocity: f32, lane: Lane, age: u64, params: VoiceParams) {
        self.note = note;
        self.velocity = velocity.clamp(0.0, 1.0);
        self.lane = lane;
        self.state = VoiceState::Sounding;
        self.age = age;
        self.params = params;

        self.osc_a.reset();
        self.osc_b.reset();
        self.fm_osc.reset();
        self.sub_phase = 0.0;
        self.apply_osc_params();

        self.filter1 = SVFilter::new(params.filter1.filter_type);
        self.filter2 = SVFilter::new(params.filter2.filter_type);
        self.apply_filter_params(&params);

        self.amp_env = EnvelopeInstance::new(params.amp_env);
        self.filter_env = EnvelopeInstance::new(params.filter_env.env);
        self.mod_env = EnvelopeInstance::new(params.mod_env);
        self.amp_env.gate_on();
        self.filter_env.gate_on();
        self.mod_env.gate_on();
    }

    fn apply_osc_params(&mut self) {
        self.osc_a.morph = self.params.osc_a.morph;
        self.osc_a.semitone = self.params.osc_a.semitone;
        self.osc_a.fine_cents = self.params.osc_a.fine_cents;
        self.osc_b.morph = self.params.osc_b.morph;
        self.osc_b.semitone = self.params.osc_b.semitone;
        self.osc_b.fine_cents = self.params.osc_b.fine_cents;
    }

    /// Live-apply filter settings to a sounding voice. Called when the
    /// parameter store pushes an update; envelopes keep their state.
    pub fn apply_filter_params(&mut self, params: &VoiceParams) {
        self.params.filter1 = params.filter1;
        self.params.filter2 = params.filter2;
        self.params.filter_mix = params.filter_mix;
        self.params.filter_env = params.filter_env;

        self.filter1.filter_type = params.filter1.filter_type;
        self.filter1.cutoff_hz = params.filter1.cutoff_hz;
        self.filter1.resonance = params.filter1.resonance;
        self.filter1.drive = params.filter1.drive;
        self.filter2.filter_type = params.filter2.filter_type;
        self.filter2.cutoff_hz = params.filter2.cutoff_hz;
        self.filter2.resonance = params.filter2.resonance;
        self.filter2.drive = params.filter2.drive;
    }

    /// Gate off. The amp envelope ramps over its release time; the filter
    /// envelope releases too, walking the cutoff back to its base value.
    pub fn release(&mut self) {
        if self.state == VoiceState::Sounding {
            self.state = VoiceState::Releasing;
            self.amp_env.gate_off(self.sample_rate);
            self.filter_env.gate_off(self.sample_rate);
            self.mod_env.gate_off(self.sample_rate);
        }
    }

    /// Render and ADD this voice into `out`. Frees the slot once the amp
    /// envelope has finished its release, never before.
    pub fn render_add(&mut self, out: &mut [f32], lfo_factor: f32) {
        if self.state == VoiceState::Free {
            return;
        }

        let sr = self.sample_rate;
        let p = self.params;
        let freq = note_to_freq(self.note);
        let fm_freq = freq * p.fm.ratio;
        let fm_scale = p.fm.index / 10.0;

        // Block-rate cutoff modulation from the filter envelope and LFO
        let env_factor = 2.0_f32
            .powf(p.filter_env.amount * p.filter_env.octave_range * self.filter_env.level());
        let cutoff_factor = env_factor * lfo_factor;
        self.filter1.update_coefficients(cutoff_factor, sr);
        self.filter2.update_coefficients(cutoff_factor, sr);

        let gain_a = p.osc_a.mono_gain();
        let gain_b = p.osc_b.mono_gain();
        let bank = WavetableBank::shared();
        let sub_inc = freq / sr;

        for sample in out.iter_mut() {
            let amp = self.amp_env.next_sample(sr);
            self.filter_env.next_sample(sr);
            self.mod_env.next_sample(sr);

            let fm = self.fm_osc.next_sample(fm_freq, sr) * fm_scale;
            let a = self.osc_a.next_sample_pm(freq, sr, fm) * gain_a;
            let b = self.osc_b.next_sample(freq, sr) * gain_b;

            let sub_raw = bank.read(Waveform::Sine, self.sub_phase) * (1.0 - p.sub.blend)
                + bank.read(Waveform::Square, self.sub_phase) * p.sub.blend;
            let sub = shaper::soft_saturate(sub_raw * 1.5) * p.sub.level;
            self.sub_phase += sub_inc;
            if self.sub_phase >= 1.0 {
                self.sub_phase -= self.sub_phase.floor();
            }

            let dry = a + b + sub;
            let filtered = (shaper::soft_saturate(self.filter1.next_sample(dry))
                + shaper::soft_saturate(self.filter2.next_sample(dry)))
                * 0.5;
            let mixed = dry * (1.0 - p.filter_mix) + filtered * p.filter_mix;

            *sample += mixed * amp * self.velocity;
        }

        if self.state == VoiceState::Releasing && !self.amp_env.is_active() {
            self.free();
        }
    }

    pub fn free(&mut self) {
        self.state = VoiceState::Free;
        self.note = 0;
        self.velocity = 0.0;
    }

    pub fn is_free(&self) -> bool {
        self.state == VoiceState::Free
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, VoiceState::Sounding | VoiceState::Releasing)
    }

    pub fn note(&self) -> i32 {
        self.note
    }

    pub fn lane(&self) -> Lane {
        self.lane
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn amp_level(&self) -> f32 {
        self.amp_env.level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn sounding_voice() -> Voice {
        let mut voice = Voice::new(SAMPLE_RATE, VoiceParams::default());
        voice.start(60, 1.0, Lane::Poly, 0, VoiceParams::default());
        voice
    }

    fn render(voice: &mut Voice, blocks: usize, block_len: usize) -> f32 {
        let mut peak = 0.0f32;
        for _ in 0..blocks {
            let mut buf = vec![0.0; block_len];
            voice.render_add(&mut buf, 1.0);
            peak = buf.iter().fold(peak, |acc, &x| acc.max(x.abs()));
        }
        peak
    }

    #[test]
    fn voice_produces_audio_when_started() {
        let mut voice = sounding_voice();
        let peak = render(&mut voice, 4, 256);
        assert!(peak > 0.01, "a started voice must produce output");
        assert_eq!(voice.state(), VoiceState::Sounding);
    }

    #[test]
    fn release_tail_ends_at_release_time() {
        let mut params = VoiceParams::default();
        params.amp_env.release_ms = 50.0;
        let mut voice = Voice::new(SAMPLE_RATE, params);
        voice.start(60, 1.0, Lane::Poly, 0, params);

        render(&mut voice, 2, 256);
        voice.release();
        assert_eq!(voice.state(), VoiceState::Releasing);

        // Just before the release elapses the voice must still be live
        let release_samples = (0.050 * SAMPLE_RATE) as usize;
        let mut buf = vec![0.0; release_samples - 256];
        voice.render_add(&mut buf, 1.0);
        assert!(voice.is_live(), "voice freed before its release elapsed");

        // After the ramp it must be freed and near-silent
        let mut tail = vec![0.0; 512];
        voice.render_add(&mut tail, 1.0);
        assert!(voice.is_free());
        assert!(voice.amp_level() <= 0.001);
    }

    #[test]
    fn filter_mix_zero_bypasses_filters() {
        let mut dry_params = VoiceParams::default();
        dry_params.filter_mix = 0.0;
        dry_params.filter1.cutoff_hz = 20.0; // would silence a low tone if mixed in
        dry_params.filter2.cutoff_hz = 20_000.0;
        let mut voice = Voice::new(SAMPLE_RATE, dry_params);
        voice.start(48, 1.0, Lane::Poly, 0, dry_params);

        let peak = render(&mut voice, 4, 256);
        assert!(peak > 0.05, "dry path must be unaffected by filter settings");
    }

    #[test]
    fn fm_index_changes_waveshape() {
        let mut clean_params = VoiceParams::default();
        clean_params.fm.index = 0.0;
        let mut fm_params = clean_params;
        fm_params.fm.index = 8.0;

        let mut clean = Voice::new(SAMPLE_RATE, clean_params);
        clean.start(60, 1.0, Lane::Poly, 0, clean_params);
        let mut modulated = Voice::new(SAMPLE_RATE, fm_params);
        modulated.start(60, 1.0, Lane::Poly, 0, fm_params);

        let mut buf_a = vec![0.0; 512];
        let mut buf_b = vec![0.0; 512];
        clean.render_add(&mut buf_a, 1.0);
        modulated.render_add(&mut buf_b, 1.0);

        let diff: f32 = buf_a
            .iter()
            .zip(&buf_b)
            .map(|(a, b)| (a - b).abs())
            .sum();
        assert!(diff > 0.1, "FM index must audibly alter the output");
    }

    #[test]
    fn release_on_free_voice_is_a_no_op() {
        let mut voice = Voice::new(SAMPLE_RATE, VoiceParams::default());
        voice.release();
        assert_eq!(voice.state(), VoiceState::Free);
    }
}
