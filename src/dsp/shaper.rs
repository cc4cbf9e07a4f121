/*
Waveshaping curves shared by the sub-oscillator blend, the filter drive
stages and the bus saturation. All stateless, all per-sample.
*/

/// Soft tanh saturation. Near-linear below |x| ~ 0.5, compresses above.
#[inline]
pub fn soft_saturate(x: f32) -> f32 {
    x.tanh()
}

/// Hard clip at the given threshold.
#[inline]
pub fn hard_clip(x: f32, threshold: f32) -> f32 {
    x.clamp(-threshold, threshold)
}

/// Saturate a whole buffer in place with a drive amount.
pub fn saturate_buffer(buffer: &mut [f32], drive: f32) {
    for sample in buffer.iter_mut() {
        *sample = soft_saturate(*sample * drive);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_saturate_is_bounded_and_monotonic() {
        let mut prev = soft_saturate(-10.0);
        for i in -99..=100 {
            let x = i as f32 * 0.1;
            let y = soft_saturate(x);
            assert!(y.abs() <= 1.0);
            assert!(y >= prev);
            prev = y;
        }
    }

    #[test]
    fn soft_saturate_is_near_linear_for_small_input() {
        assert!((soft_saturate(0.1) - 0.1).abs() < 0.001);
    }

    #[test]
    fn hard_clip_limits_peaks() {
        assert_eq!(hard_clip(2.0, 0.5), 0.5);
        assert_eq!(hard_clip(-2.0, 0.5), -0.5);
        assert_eq!(hard_clip(0.3, 0.5), 0.3);
    }
}
