use crate::dsp::delay::DelayLine;
use crate::dsp::shaper;

/*
Feedback delay. The tap output is fed back into the line scaled by
`feedback`, through a soft saturator so runaway settings degrade into
warm smear instead of digital overflow. Delay time changes take effect
immediately (the read tap moves); feedback is capped below unity.
*/

pub struct FeedbackDelay {
    delay_line: DelayLine,
    time_ms: f32,
    feedback: f32,
    mix: f32,
}

impl FeedbackDelay {
    pub fn new(time_ms: f32, feedback: f32, mix: f32) -> Self {
        let mut delay = Self {
            delay_line: DelayLine::new(),
            time_ms: 300.0,
            feedback: 0.3,
            mix: 0.25,
        };
        delay.set_time(time_ms);
        delay.set_feedback(feedback);
        delay.set_mix(mix);
        delay
    }

    pub fn set_time(&mut self, time_ms: f32) {
        self.time_ms = time_ms.clamp(1.0, 2_000.0);
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.95);
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    pub fn process_block(&mut self, buffer: &mut [f32], sample_rate: f32) {
        let delay_samples = ((self.time_ms / 1000.0) * sample_rate).max(1.0) as usize;

        for sample in buffer.iter_mut() {
            let wet = self.delay_line.read(delay_samples);
            self.delay_line
                .write(*sample + shaper::soft_saturate(wet * self.feedback));
            *sample = *sample * (1.0 - self.mix) + wet * self.mix;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 1_000.0;

    #[test]
    fn echo_appears_after_delay_time() {
        let mut delay = FeedbackDelay::new(100.0, 0.0, 1.0); // 100 samples at 1 kHz
        let mut buffer = vec![0.0f32; 256];
        buffer[0] = 1.0;

        delay.process_block(&mut buffer, SAMPLE_RATE);

        assert!(buffer[100].abs() > 0.9, "echo expected at the delay time");
        assert!(buffer[50].abs() < 1e-6, "no output before the delay time");
    }

    #[test]
    fn feedback_produces_repeats() {
        let mut delay = FeedbackDelay::new(50.0, 0.5, 1.0);
        let mut buffer = vec![0.0f32; 256];
        buffer[0] = 1.0;

        delay.process_block(&mut buffer, SAMPLE_RATE);

        assert!(buffer[50].abs() > 0.8);
        assert!(buffer[100].abs() > 0.3, "second repeat expected");
        assert!(buffer[100].abs() < buffer[50].abs(), "repeats must decay");
    }

    #[test]
    fn extreme_feedback_is_clamped() {
        let mut delay = FeedbackDelay::new(10.0, 5.0, 1.0);
        let mut buffer: Vec<f32> = (0..4096).map(|i| (i as f32 * 0.3).sin()).collect();
        delay.process_block(&mut buffer, SAMPLE_RATE);
        assert!(buffer.iter().all(|s| s.is_finite()));
    }
}
