/*
Envelope-follower dynamics.

TransientShaper runs a fast and a slow follower over the rectified input;
the difference between them isolates attacks. `attack` boosts or cuts that
transient portion, `sustain` boosts or cuts the body. Both at zero is a
clean bypass.

Limiter is a hard-knee peak limiter for the end of the bus: gain drops
instantly when the follower crosses the ceiling and recovers over the
release time.
*/

struct Follower {
    level: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl Follower {
    fn new(attack_ms: f32, release_ms: f32, sample_rate: f32) -> Self {
        Self {
            level: 0.0,
            attack_coeff: coeff(attack_ms, sample_rate),
            release_coeff: coeff(release_ms, sample_rate),
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let rectified = input.abs();
        let coeff = if rectified > self.level {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.level = rectified + coeff * (self.level - rectified);
        self.level
    }
}

#[inline]
fn coeff(time_ms: f32, sample_rate: f32) -> f32 {
    (-1.0 / (time_ms.max(0.01) / 1000.0 * sample_rate)).exp()
}

pub struct TransientShaper {
    fast: Follower,
    slow: Follower,
    attack: f32,
    sustain: f32,
}

impl TransientShaper {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            fast: Follower::new(0.5, 50.0, sample_rate),
            slow: Follower::new(25.0, 150.0, sample_rate),
            attack: 0.0,
            sustain: 0.0,
        }
    }

    /// Transient emphasis in [-1, 1]; 0 leaves attacks untouched.
    pub fn set_attack(&mut self, attack: f32) {
        self.attack = attack.clamp(-1.0, 1.0);
    }

    /// Body gain shaping in [-1, 1]; 0 leaves the sustain untouched.
    pub fn set_sustain(&mut self, sustain: f32) {
        self.sustain = sustain.clamp(-1.0, 1.0);
    }

    pub fn process_block(&mut self, buffer: &mut [f32]) {
        if self.attack == 0.0 && self.sustain == 0.0 {
            // Keep the followers tracking so re-engaging is click-free
            for sample in buffer.iter() {
                self.fast.process(*sample);
                self.slow.process(*sample);
            }
            return;
        }

        for sample in buffer.iter_mut() {
            let fast = self.fast.process(*sample);
            let slow = self.slow.process(*sample);
            let transient = (fast - slow).max(0.0);

            // transient portion scaled by attack, the rest by sustain
            let gain = 1.0 + self.attack * transient * 4.0 + self.sustain * slow;
            *sample *= gain.clamp(0.0, 4.0);
        }
    }
}

/// Hard-knee peak limiter. Attack is instant so a peak can never pass the
/// ceiling; gain recovers over the release time.
pub struct Limiter {
    level: f32,
    release_coeff: f32,
    ceiling: f32,
}

impl Limiter {
    pub fn new(ceiling: f32, sample_rate: f32) -> Self {
        Self {
            level: 0.0,
            release_coeff: coeff(80.0, sample_rate),
            ceiling: ceiling.max(0.01),
        }
    }

    pub fn process_block(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            let rectified = sample.abs();
            if rectified > self.level {
                self.level = rectified;
            } else {
                self.level = rectified + self.release_coeff * (self.level - rectified);
            }
            if self.level > self.ceiling {
                *sample *= self.ceiling / self.level;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn burst() -> Vec<f32> {
        // Silence, loud onset, quieter body
        let mut signal = vec![0.0f32; 256];
        signal.extend((0..128).map(|i| 0.9 * (i as f32 * 0.3).sin()));
        signal.extend((0..1024).map(|i| 0.3 * (i as f32 * 0.3).sin()));
        signal
    }

    #[test]
    fn zero_settings_are_a_bypass() {
        let mut shaper = TransientShaper::new(SAMPLE_RATE);
        let mut buffer = burst();
        let original = buffer.clone();
        shaper.process_block(&mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn positive_attack_boosts_the_onset() {
        let mut shaper = TransientShaper::new(SAMPLE_RATE);
        shaper.set_attack(1.0);
        let mut buffer = burst();
        let original = burst();
        shaper.process_block(&mut buffer);

        let onset_gain: f32 = buffer[256..300]
            .iter()
            .zip(&original[256..300])
            .filter(|(_, o)| o.abs() > 0.1)
            .map(|(b, o)| b.abs() / o.abs())
            .fold(0.0, f32::max);
        assert!(onset_gain > 1.05, "onset should be louder, gain {onset_gain}");
    }

    #[test]
    fn limiter_holds_the_ceiling() {
        let mut limiter = Limiter::new(1.0, SAMPLE_RATE);
        let mut buffer: Vec<f32> = (0..4096).map(|i| 3.0 * (i as f32 * 0.2).sin()).collect();
        limiter.process_block(&mut buffer);
        assert!(
            buffer.iter().all(|s| s.abs() <= 1.0 + 1e-3),
            "instant attack means no peak ever passes the ceiling"
        );
    }

    #[test]
    fn limiter_passes_quiet_signals_untouched() {
        let mut limiter = Limiter::new(1.0, SAMPLE_RATE);
        let mut buffer: Vec<f32> = (0..512).map(|i| 0.2 * (i as f32 * 0.2).sin()).collect();
        let original = buffer.clone();
        limiter.process_block(&mut buffer);
        assert_eq!(buffer, original);
    }
}
