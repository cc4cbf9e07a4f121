use crate::dsp::shaper;
use crate::fx::chorus::Chorus;
use crate::fx::delay::FeedbackDelay;
use crate::fx::dynamics::{Limiter, TransientShaper};
use crate::fx::reverb::Reverb;
use crate::fx::FxParams;
use crate::MAX_BLOCK_SIZE;

/*
Effects Bus
===========

One shared bus for the whole voice mix. The wiring is fixed; parameter
changes only retune the nodes:

  mix ─→ saturate ─┬─────────────────────────────┐
                   ├─→ chorus ─→ delay ──────────┼─(+)─→ transient
                   └─→ reverb ───────────────────┘         │
                                              master gain ←┘
                                                   │
                                                limiter ─→ out

Chorus and delay form one send chain (the delayed signal keeps the chorus
movement), reverb its own. Sends are processed on scratch copies so the
dry path stays untouched; every node keeps its own wet/dry mix.
*/

pub struct EffectsBus {
    sample_rate: f32,
    chorus: Chorus,
    delay: FeedbackDelay,
    reverb: Reverb,
    transient: TransientShaper,
    limiter: Limiter,
    master_gain: f32,
    scratch: Vec<f32>,
}

impl EffectsBus {
    pub fn new(sample_rate: f32) -> Self {
        let params = FxParams::default();
        let mut bus = Self {
            sample_rate,
            chorus: Chorus::new(params.chorus_rate_hz, params.chorus_depth_ms, params.chorus_mix),
            delay: FeedbackDelay::new(params.delay_time_ms, params.delay_feedback, params.delay_mix),
            reverb: Reverb::new(sample_rate),
            transient: TransientShaper::new(sample_rate),
            limiter: Limiter::new(0.98, sample_rate),
            master_gain: params.master_gain,
            scratch: vec![0.0; MAX_BLOCK_SIZE],
        };
        bus.apply_params(&params);
        bus
    }

    /// Copy a full parameter snapshot into the nodes. Realtime-safe: no
    /// allocation, just field writes.
    pub fn apply_params(&mut self, params: &FxParams) {
        self.chorus.set_rate(params.chorus_rate_hz);
        self.chorus.set_depth(params.chorus_depth_ms);
        self.chorus.set_mix(params.chorus_mix);

        self.delay.set_time(params.delay_time_ms);
        self.delay.set_feedback(params.delay_feedback);
        self.delay.set_mix(params.delay_mix);

        self.reverb.set_size(params.reverb_size);
        self.reverb.set_decay(params.reverb_decay);
        self.reverb.set_predelay(params.reverb_predelay_ms);
        self.reverb.set_mix(params.reverb_mix);

        self.transient.set_attack(params.transient_attack);
        self.transient.set_sustain(params.transient_sustain);

        self.master_gain = params.master_gain.clamp(0.0, 2.0);
    }

    pub fn process_block(&mut self, buffer: &mut [f32]) {
        let len = buffer.len().min(MAX_BLOCK_SIZE);
        let buffer = &mut buffer[..len];

        // Gentle glue saturation on the summed voices
        shaper::saturate_buffer(buffer, 1.1);

        // Chorus -> delay chain; each node mixes its own wet against the
        // copy it was handed, so the sum below only adds the wet delta.
        let scratch = &mut self.scratch[..len];
        scratch.copy_from_slice(buffer);
        self.chorus.process_block(scratch, self.sample_rate);
        self.delay.process_block(scratch, self.sample_rate);
        for (out, send) in buffer.iter_mut().zip(scratch.iter()) {
            *out = 0.5 * (*out + send);
        }

        self.reverb.process_block(buffer);

        self.transient.process_block(buffer);

        for sample in buffer.iter_mut() {
            *sample *= self.master_gain;
        }

        self.limiter.process_block(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn tone(len: usize) -> Vec<f32> {
        (0..len).map(|i| 0.4 * (i as f32 * 0.06).sin()).collect()
    }

    #[test]
    fn output_is_finite_and_bounded() {
        let mut bus = EffectsBus::new(SAMPLE_RATE);
        let mut buffer = tone(2048);
        for _ in 0..20 {
            bus.process_block(&mut buffer);
        }
        assert!(buffer.iter().all(|s| s.is_finite() && s.abs() <= 1.5));
    }

    #[test]
    fn master_gain_scales_the_output() {
        let mut params = FxParams::default();
        params.chorus_mix = 0.0;
        params.delay_mix = 0.0;
        params.reverb_mix = 0.0;
        params.transient_attack = 0.0;
        params.transient_sustain = 0.0;

        params.master_gain = 0.1;
        let mut quiet_bus = EffectsBus::new(SAMPLE_RATE);
        quiet_bus.apply_params(&params);
        let mut quiet = tone(512);
        quiet_bus.process_block(&mut quiet);

        params.master_gain = 0.8;
        let mut loud_bus = EffectsBus::new(SAMPLE_RATE);
        loud_bus.apply_params(&params);
        let mut loud = tone(512);
        loud_bus.process_block(&mut loud);

        let quiet_rms: f32 = quiet.iter().map(|x| x * x).sum();
        let loud_rms: f32 = loud.iter().map(|x| x * x).sum();
        assert!(loud_rms > quiet_rms * 4.0);
    }

    #[test]
    fn silence_in_gives_near_silence_out() {
        let mut bus = EffectsBus::new(SAMPLE_RATE);
        let mut buffer = vec![0.0f32; 1024];
        bus.process_block(&mut buffer);
        assert!(buffer.iter().all(|s| s.abs() < 1e-4));
    }

    #[test]
    fn parameter_update_takes_effect() {
        let mut bus = EffectsBus::new(SAMPLE_RATE);
        let mut params = FxParams::default();
        params.master_gain = 0.0;
        bus.apply_params(&params);

        let mut buffer = tone(512);
        bus.process_block(&mut buffer);
        assert!(buffer.iter().all(|s| s.abs() < 1e-6));
    }
}
