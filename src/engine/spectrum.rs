use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Windowed FFT magnitudes for visualizing the engine's output tap.
/// The plan and buffers are built once; analysis itself never allocates.
pub struct Spectrum {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    size: usize,
}

impl Spectrum {
    pub fn new(size: usize) -> Self {
        let size = size.next_power_of_two().max(64);
        let fft = FftPlanner::new().plan_fft_forward(size);
        // Hann window
        let window = (0..size)
            .map(|i| {
                let x = i as f32 / size as f32;
                0.5 - 0.5 * (std::f32::consts::TAU * x).cos()
            })
            .collect();

        Self {
            fft,
            window,
            buffer: vec![Complex::new(0.0, 0.0); size],
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of useful output bins (up to Nyquist).
    pub fn bins(&self) -> usize {
        self.size / 2
    }

    /// Analyze up to `size` samples and write normalized magnitudes into
    /// `out` (truncated to `bins()` entries). Short input is zero-padded.
    pub fn magnitudes(&mut self, samples: &[f32], out: &mut [f32]) {
        let n = samples.len().min(self.size);
        for i in 0..n {
            self.buffer[i] = Complex::new(samples[i] * self.window[i], 0.0);
        }
        for slot in self.buffer.iter_mut().skip(n) {
            *slot = Complex::new(0.0, 0.0);
        }

        self.fft.process(&mut self.buffer);

        let scale = 2.0 / self.size as f32;
        for (bin, slot) in out.iter_mut().zip(&self.buffer).take(self.size / 2) {
            *bin = slot.norm() * scale;
        }
    }
}
