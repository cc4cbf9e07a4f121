use crate::dsp::wavetable::{Waveform, WavetableBank};

/*
Free-running LFO. Unlike voice oscillators it is global: it keeps its phase
across note events so modulation stays continuous while notes come and go.
Output is the waveshape scaled by `depth`, so a depth of 0 is a hard bypass.
*/

pub struct Lfo {
    phase: f32,
    pub waveform: Waveform,
    /// Rate in Hz, typically well below audio rate (0.01 - 20).
    pub rate_hz: f32,
    /// Output scale. 0.0 disables the LFO entirely.
    pub depth: f32,
}

impl Lfo {
    pub fn new(waveform: Waveform, rate_hz: f32, depth: f32) -> Self {
        Self {
            phase: 0.0,
            waveform,
            rate_hz,
            depth,
        }
    }

    /// Advance one sample and return the scaled control value.
    #[inline]
    pub fn next_sample(&mut self, sample_rate: f32) -> f32 {
        if self.depth == 0.0 {
            // Keep the phase running so re-enabling doesn't jump
            self.advance(1, sample_rate);
            return 0.0;
        }
        let out = WavetableBank::shared().read(self.waveform, self.phase) * self.depth;
        self.advance(1, sample_rate);
        out
    }

    /// Advance a whole block and return the control value at its start.
    /// Voice parameters are modulated at block rate, not per sample.
    pub fn next_block(&mut self, block_len: usize, sample_rate: f32) -> f32 {
        let out = if self.depth == 0.0 {
            0.0
        } else {
            WavetableBank::shared().read(self.waveform, self.phase) * self.depth
        };
        self.advance(block_len, sample_rate);
        out
    }

    #[inline]
    fn advance(&mut self, samples: usize, sample_rate: f32) {
        self.phase += self.rate_hz * samples as f32 / sample_rate;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48_000.0;

    #[test]
    fn output_is_scaled_by_depth() {
        let mut lfo = Lfo::new(Waveform::Sine, 2.0, 0.5);
        let peak = (0..SAMPLE_RATE as usize)
            .map(|_| lfo.next_sample(SAMPLE_RATE).abs())
            .fold(0.0f32, f32::max);
        assert!(peak <= 0.5 + 1e-4);
        assert!(peak > 0.4, "a full cycle should approach the depth");
    }

    #[test]
    fn zero_depth_outputs_silence_but_keeps_phase() {
        let mut muted = Lfo::new(Waveform::Sine, 1.0, 0.0);
        for _ in 0..1000 {
            assert_eq!(muted.next_sample(SAMPLE_RATE), 0.0);
        }

        // Phase kept running: re-enabling matches an always-on LFO
        let mut reference = Lfo::new(Waveform::Sine, 1.0, 1.0);
        for _ in 0..1000 {
            reference.next_sample(SAMPLE_RATE);
        }
        muted.depth = 1.0;
        assert!((muted.next_sample(SAMPLE_RATE) - reference.next_sample(SAMPLE_RATE)).abs() < 1e-5);
    }

    #[test]
    fn block_advance_matches_per_sample_phase() {
        let mut a = Lfo::new(Waveform::Triangle, 3.0, 1.0);
        let mut b = Lfo::new(Waveform::Triangle, 3.0, 1.0);

        let first = a.next_block(128, SAMPLE_RATE);
        let first_sample = b.next_sample(SAMPLE_RATE);
        assert!((first - first_sample).abs() < 1e-6);

        for _ in 0..127 {
            b.next_sample(SAMPLE_RATE);
        }
        assert!((a.next_block(1, SAMPLE_RATE) - b.next_sample(SAMPLE_RATE)).abs() < 1e-4);
    }
}
