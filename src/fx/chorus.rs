use std::f32::consts::TAU;

use crate::dsp::delay::DelayLine;

/*
Chorus: the dry signal mixed with a short delay whose time is swept by a
sine LFO. The moving delay tap detunes the wet copy slightly, which reads
as several voices playing the same part. Base delay sits at 20 ms; the LFO
swings it by +/- depth_ms.
*/

pub struct Chorus {
    delay_line: DelayLine,
    lfo_phase: f32,
    rate_hz: f32,
    depth_ms: f32,
    mix: f32,
    base_delay_ms: f32,
}

impl Chorus {
    pub fn new(rate_hz: f32, depth_ms: f32, mix: f32) -> Self {
        let mut chorus = Self {
            delay_line: DelayLine::with_capacity(8192),
            lfo_phase: 0.0,
            rate_hz: 1.0,
            depth_ms: 2.0,
            mix: 0.3,
            base_delay_ms: 20.0,
        };
        chorus.set_rate(rate_hz);
        chorus.set_depth(depth_ms);
        chorus.set_mix(mix);
        chorus
    }

    pub fn set_rate(&mut self, rate_hz: f32) {
        self.rate_hz = rate_hz.clamp(0.1, 10.0);
    }

    pub fn set_depth(&mut self, depth_ms: f32) {
        self.depth_ms = depth_ms.clamp(0.0, 10.0);
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    pub fn process_block(&mut self, buffer: &mut [f32], sample_rate: f32) {
        let phase_inc = TAU * self.rate_hz / sample_rate;

        for sample in buffer.iter_mut() {
            let lfo = self.lfo_phase.sin();
            let delay_ms = self.base_delay_ms + lfo * self.depth_ms;
            let delay_samples = (delay_ms * sample_rate / 1000.0).max(1.0);

            let wet = self.delay_line.read_interpolated(delay_samples);
            self.delay_line.write(*sample);

            *sample = *sample * (1.0 - self.mix) + wet * self.mix;

            self.lfo_phase += phase_inc;
            if self.lfo_phase >= TAU {
                self.lfo_phase -= TAU;
            }
        }
    }
}
