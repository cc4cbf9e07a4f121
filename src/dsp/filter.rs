use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::dsp::shaper;

/*
State-variable filter (TPT form), one per filter slot in a voice.

| type              | passes          | rejects      |
| ----------------- | --------------- | ------------ |
| low-pass          | below cutoff    | above cutoff |
| high-pass         | above cutoff    | below cutoff |
| band-pass         | around cutoff   | outside      |
| notch / band-stop | outside         | around cutoff|

The drive stage soft-saturates the input before the filter; resonance maps
[0, 1) onto the damping coefficient. Cutoff is always clamped to
[20 Hz, Nyquist * 0.45] — out-of-range values are corrected, never rejected.
*/

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    HighPass,
    BandPass,
    Notch,
}

impl FilterType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "lowpass" | "lp" => Some(FilterType::LowPass),
            "highpass" | "hp" => Some(FilterType::HighPass),
            "bandpass" | "bp" => Some(FilterType::BandPass),
            "notch" => Some(FilterType::Notch),
            _ => None,
        }
    }

    pub fn from_index(index: u32) -> Self {
        match index {
            1 => FilterType::HighPass,
            2 => FilterType::BandPass,
            3 => FilterType::Notch,
            _ => FilterType::LowPass,
        }
    }

    pub fn index(self) -> u32 {
        match self {
            FilterType::LowPass => 0,
            FilterType::HighPass => 1,
            FilterType::BandPass => 2,
            FilterType::Notch => 3,
        }
    }
}

pub const MIN_CUTOFF_HZ: f32 = 20.0;

/// Clamp a cutoff into the filter's stable range for the given sample rate.
#[inline]
pub fn clamp_cutoff(cutoff_hz: f32, sample_rate: f32) -> f32 {
    cutoff_hz.clamp(MIN_CUTOFF_HZ, sample_rate * 0.45)
}

pub struct SVFilter {
    ic1eq: f32, // First integrator's memory
    ic2eq: f32, // Second integrator's memory

    pub filter_type: FilterType,
    pub cutoff_hz: f32,
    pub resonance: f32,
    /// Input drive (1.0 = clean). Applied through a tanh curve pre-filter.
    pub drive: f32,

    // Coefficients, refreshed at block rate
    g: f32,
    k: f32,
}

impl SVFilter {
    pub fn new(filter_type: FilterType) -> Self {
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            filter_type,
            cutoff_hz: 1000.0,
            resonance: 0.0,
            drive: 1.0,
            g: 0.0,
            k: 2.0,
        }
    }

    pub fn lowpass(cutoff_hz: f32) -> Self {
        let mut f = Self::new(FilterType::LowPass);
        f.cutoff_hz = cutoff_hz;
        f
    }

    pub fn highpass(cutoff_hz: f32) -> Self {
        let mut f = Self::new(FilterType::HighPass);
        f.cutoff_hz = cutoff_hz;
        f
    }

    /// Refresh coefficients for an effective cutoff (base cutoff times a
    /// modulation factor). Called once per block, not per sample.
    pub fn update_coefficients(&mut self, cutoff_factor: f32, sample_rate: f32) {
        let cutoff = clamp_cutoff(self.cutoff_hz * cutoff_factor, sample_rate);
        let wd = TAU * cutoff;
        let wa = (2.0 * sample_rate) * (wd / (2.0 * sample_rate)).tan();
        self.g = wa / (2.0 * sample_rate);
        self.k = 2.0 - 2.0 * self.resonance.clamp(0.0, 0.99);
    }

    /// Filter one sample through drive -> SVF -> response select.
    #[inline]
    pub fn next_sample(&mut self, sample: f32) -> f32 {
        let driven = shaper::soft_saturate(sample * self.drive);

        let h = 1.0 / (1.0 + self.g * (self.g + self.k));
        let v3 = driven - self.ic2eq;
        let v1 = h * (self.ic1eq + self.g * v3);
        let v2 = self.ic2eq + self.g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        match self.filter_type {
            FilterType::LowPass => v2,
            FilterType::BandPass => v1,
            FilterType::HighPass => driven - self.k * v1 - v2,
            FilterType::Notch => driven - self.k * v1,
        }
    }

    pub fn render(&mut self, buffer: &mut [f32], cutoff_factor: f32, sample_rate: f32) {
        self.update_coefficients(cutoff_factor, sample_rate);
        for sample in buffer.iter_mut() {
            *sample = self.next_sample(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::Oscillator;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn render_sine(freq: f32, len: usize) -> Vec<f32> {
        let mut osc = Oscillator::new();
        (0..len).map(|_| osc.next_sample(freq, SAMPLE_RATE)).collect()
    }

    fn peak_after_transient(buffer: &[f32]) -> f32 {
        buffer[32.min(buffer.len())..]
            .iter()
            .fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut filter = SVFilter::lowpass(500.0);
        let mut buffer = vec![1.0; 256];
        filter.render(&mut buffer, 1.0, SAMPLE_RATE);
        assert!(buffer[255] > 0.7, "got {}", buffer[255]);
    }

    #[test]
    fn highpass_rejects_dc() {
        let mut filter = SVFilter::highpass(500.0);
        let mut buffer = vec![1.0; 256];
        filter.render(&mut buffer, 1.0, SAMPLE_RATE);
        assert!(buffer[255].abs() < 0.01, "got {}", buffer[255]);
    }

    #[test]
    fn lowpass_attenuates_above_cutoff() {
        let mut filter = SVFilter::lowpass(500.0);
        let mut buffer = render_sine(5_000.0, 256);
        filter.render(&mut buffer, 1.0, SAMPLE_RATE);
        assert!(
            peak_after_transient(&buffer) < 0.3,
            "10x cutoff should be well attenuated"
        );
    }

    #[test]
    fn cutoff_factor_scales_response() {
        // 1 kHz tone, 200 Hz base cutoff: a 16x factor opens the filter
        let tone = render_sine(1_000.0, 512);

        let mut closed = SVFilter::lowpass(200.0);
        let mut closed_buf = tone.clone();
        closed.render(&mut closed_buf, 1.0, SAMPLE_RATE);

        let mut open = SVFilter::lowpass(200.0);
        let mut open_buf = tone;
        open.render(&mut open_buf, 16.0, SAMPLE_RATE);

        assert!(peak_after_transient(&open_buf) > peak_after_transient(&closed_buf) * 2.0);
    }

    #[test]
    fn cutoff_is_clamped_to_stable_range() {
        assert_eq!(clamp_cutoff(1.0, SAMPLE_RATE), MIN_CUTOFF_HZ);
        assert_eq!(clamp_cutoff(1_000_000.0, SAMPLE_RATE), SAMPLE_RATE * 0.45);
    }

    #[test]
    fn output_stays_finite_with_heavy_drive_and_resonance() {
        let mut filter = SVFilter::lowpass(800.0);
        filter.drive = 10.0;
        filter.resonance = 0.95;

        let mut buffer = render_sine(800.0, 1024);
        filter.render(&mut buffer, 1.0, SAMPLE_RATE);

        assert!(buffer.iter().all(|s| s.is_finite()));
    }
}
