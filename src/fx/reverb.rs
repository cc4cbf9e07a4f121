use crate::dsp::delay::DelayLine;

/*
Reverb
======

Four parallel feedback combs (with one-pole damping in the loop) summed
into two series allpasses, behind a pre-delay line:

  in ──→ [pre-delay] ──┬──→ [comb 1] ──┐
                       ├──→ [comb 2] ──┤
                       ├──→ [comb 3] ──┼─(+)→ [allpass 1] → [allpass 2] → wet
                       └──→ [comb 4] ──┘

Parameters map onto the network rather than an impulse file:
  size     scales every comb/allpass delay length
  decay    sets the comb feedback (tail length)
  predelay delays the wet path before the network
  mix      dry/wet crossfade

Comb delays are mutually prime so the tail stays dense instead of ringing.
*/

// Base delay lengths in samples at 48 kHz, scaled by sample rate and size.
const COMB_TUNINGS: [usize; 4] = [1557, 1617, 1491, 1422];
const ALLPASS_TUNINGS: [usize; 2] = [225, 556];
const MAX_PREDELAY_MS: f32 = 250.0;

struct Comb {
    line: DelayLine,
    delay_samples: usize,
    feedback: f32,
    damp: f32,
    filter_state: f32,
}

impl Comb {
    fn new(max_samples: usize) -> Self {
        Self {
            line: DelayLine::with_capacity(max_samples),
            delay_samples: max_samples / 2,
            feedback: 0.7,
            damp: 0.3,
            filter_state: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.line.read(self.delay_samples);
        self.filter_state = output * (1.0 - self.damp) + self.filter_state * self.damp;
        self.line.write(input + self.filter_state * self.feedback);
        output
    }
}

struct Allpass {
    line: DelayLine,
    delay_samples: usize,
    feedback: f32,
}

impl Allpass {
    fn new(max_samples: usize) -> Self {
        Self {
            line: DelayLine::with_capacity(max_samples),
            delay_samples: max_samples / 2,
            feedback: 0.5,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.line.read(self.delay_samples);
        let output = -self.feedback * input + delayed;
        self.line.write(input + self.feedback * output);
        output
    }
}

pub struct Reverb {
    sample_rate: f32,
    predelay: DelayLine,
    predelay_samples: usize,
    combs: [Comb; 4],
    allpasses: [Allpass; 2],
    size: f32,
    decay: f32,
    mix: f32,
}

impl Reverb {
    pub fn new(sample_rate: f32) -> Self {
        let scale = sample_rate / 48_000.0;
        let comb_max = |base: usize| ((base * 2) as f32 * scale) as usize + 2;
        let predelay_max = (MAX_PREDELAY_MS / 1000.0 * sample_rate) as usize + 2;

        let mut reverb = Self {
            sample_rate,
            predelay: DelayLine::with_capacity(predelay_max),
            predelay_samples: 0,
            combs: [
                Comb::new(comb_max(COMB_TUNINGS[0])),
                Comb::new(comb_max(COMB_TUNINGS[1])),
                Comb::new(comb_max(COMB_TUNINGS[2])),
                Comb::new(comb_max(COMB_TUNINGS[3])),
            ],
            allpasses: [
                Allpass::new(comb_max(ALLPASS_TUNINGS[0])),
                Allpass::new(comb_max(ALLPASS_TUNINGS[1])),
            ],
            size: 0.5,
            decay: 0.5,
            mix: 0.2,
        };
        reverb.set_size(0.5);
        reverb.set_decay(0.5);
        reverb.set_predelay(20.0);
        reverb
    }

    /// Room size scales every delay length: 0.0 = tight, 1.0 = hall.
    pub fn set_size(&mut self, size: f32) {
        self.size = size.clamp(0.0, 1.0);
        let scale = (self.sample_rate / 48_000.0) * (0.5 + self.size * 1.5);
        for (comb, base) in self.combs.iter_mut().zip(COMB_TUNINGS) {
            comb.delay_samples = ((base as f32 * scale) as usize).max(1);
        }
        for (allpass, base) in self.allpasses.iter_mut().zip(ALLPASS_TUNINGS) {
            allpass.delay_samples = ((base as f32 * scale) as usize).max(1);
        }
    }

    /// Tail length: 0.0 = near-dry slap, 1.0 = long wash.
    pub fn set_decay(&mut self, decay: f32) {
        self.decay = decay.clamp(0.0, 1.0);
        let feedback = 0.5 + self.decay * 0.48;
        for comb in &mut self.combs {
            comb.feedback = feedback;
        }
    }

    pub fn set_predelay(&mut self, predelay_ms: f32) {
        let clamped = predelay_ms.clamp(0.0, MAX_PREDELAY_MS);
        self.predelay_samples = (clamped / 1000.0 * self.sample_rate) as usize;
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    pub fn process_block(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            let dry = *sample;

            self.predelay.write(dry);
            let delayed = self.predelay.read(self.predelay_samples);

            let mut wet = 0.0;
            for comb in &mut self.combs {
                wet += comb.process(delayed);
            }
            wet *= 0.25;
            for allpass in &mut self.allpasses {
                wet = allpass.process(wet);
            }

            *sample = dry * (1.0 - self.mix) + wet * self.mix;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn tail_energy(reverb: &mut Reverb, blocks: usize) -> f32 {
        let mut impulse = vec![0.0f32; 64];
        impulse[0] = 1.0;
        reverb.process_block(&mut impulse);

        let mut energy = 0.0;
        for _ in 0..blocks {
            let mut silence = vec![0.0f32; 256];
            reverb.process_block(&mut silence);
            energy += silence.iter().map(|x| x * x).sum::<f32>();
        }
        energy
    }

    #[test]
    fn impulse_produces_a_tail() {
        let mut reverb = Reverb::new(SAMPLE_RATE);
        reverb.set_mix(1.0);
        assert!(tail_energy(&mut reverb, 100) > 0.01);
    }

    #[test]
    fn longer_decay_means_more_tail() {
        let mut short = Reverb::new(SAMPLE_RATE);
        short.set_mix(1.0);
        short.set_decay(0.1);

        let mut long = Reverb::new(SAMPLE_RATE);
        long.set_mix(1.0);
        long.set_decay(1.0);

        assert!(tail_energy(&mut long, 200) > tail_energy(&mut short, 200) * 1.5);
    }

    #[test]
    fn dry_mix_preserves_signal() {
        let mut reverb = Reverb::new(SAMPLE_RATE);
        reverb.set_mix(0.0);
        let mut buffer = vec![0.5, 0.3, -0.7];
        reverb.process_block(&mut buffer);
        assert!((buffer[0] - 0.5).abs() < 1e-6);
        assert!((buffer[2] + 0.7).abs() < 1e-6);
    }

    #[test]
    fn predelay_postpones_wet_onset() {
        let mut reverb = Reverb::new(SAMPLE_RATE);
        reverb.set_mix(1.0);
        reverb.set_predelay(100.0); // 4800 samples

        let mut buffer = vec![0.0f32; 2048];
        buffer[0] = 1.0;
        reverb.process_block(&mut buffer);

        // Well before pre-delay + shortest comb, nothing can come back
        assert!(buffer[1..1024].iter().all(|&x| x.abs() < 1e-6));
    }
}
