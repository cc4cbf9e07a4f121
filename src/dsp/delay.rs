/// Max delay: 2 seconds at 96 kHz.
pub const MAX_DELAY_SAMPLES: usize = 192_000;

/// Circular delay line. Pre-allocated, realtime-safe after construction.
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    pub fn new() -> Self {
        Self::with_capacity(MAX_DELAY_SAMPLES)
    }

    pub fn with_capacity(samples: usize) -> Self {
        Self {
            buffer: vec![0.0; samples.max(2)],
            write_pos: 0,
        }
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Write a sample and advance the head.
    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.len();
    }

    /// Read at an integer delay behind the write head.
    #[inline]
    pub fn read(&self, delay_samples: usize) -> f32 {
        let delay = delay_samples.min(self.len() - 1);
        let read_pos = (self.write_pos + self.len() - delay) % self.len();
        self.buffer[read_pos]
    }

    /// Read at a fractional delay with linear interpolation. Used by the
    /// chorus, where the delay time is modulated continuously.
    #[inline]
    pub fn read_interpolated(&self, delay_samples: f32) -> f32 {
        let delay = delay_samples.clamp(1.0, (self.len() - 2) as f32);
        let whole = delay as usize;
        let frac = delay - whole as f32;

        let a = self.read(whole);
        let b = self.read(whole + 1);
        a + (b - a) * frac
    }

    /// In-place delay of a whole buffer. The tap is read before the input
    /// is written so the effective delay is exactly `delay_samples`.
    pub fn render(&mut self, buffer: &mut [f32], delay_samples: usize) {
        for sample in buffer.iter_mut() {
            let delayed = self.read(delay_samples);
            self.write(*sample);
            *sample = delayed;
        }
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

impl Default for DelayLine {
    fn default() -> Self {
        Self::new()
    }
}
