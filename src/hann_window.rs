//! Hann window generation and the overlap-add gain constant

use core::f32::consts::PI;

use libm::cosf;

/// Fill `window` with a periodic Hann window.
///
/// The periodic form (denominator N rather than N-1) is used because the
/// squared window tiles exactly under 75% overlap, which the resynthesis
/// normalization relies on.
pub fn fill_hann_window(window: &mut [f32]) {
    let n = window.len();
    if n == 0 {
        return;
    }

    for (i, w) in window.iter_mut().enumerate() {
        *w = 0.5 * (1.0 - cosf(2.0 * PI * i as f32 / n as f32));
    }
}

/// Overlap-add gain of the squared window at the given hop.
///
/// For a periodic Hann at hop N/4 this is exactly 3/2: the sum of the
/// four overlapping squared windows at every output sample.
pub fn overlap_add_gain(window: &[f32], hop_size: usize) -> f32 {
    if hop_size == 0 {
        return 1.0;
    }

    window.iter().map(|w| w * w).sum::<f32>() / hop_size as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_nonnegative_and_symmetric() {
        let mut window = [0.0f32; 1024];
        fill_hann_window(&mut window);

        assert_eq!(window[0], 0.0);
        for &w in &window {
            assert!(w >= 0.0);
            assert!(w <= 1.0);
        }
        for i in 1..window.len() {
            let mirror = window[window.len() - i];
            assert!((window[i] - mirror).abs() < 1e-6);
        }
    }

    #[test]
    fn test_overlap_add_gain_is_three_halves() {
        let mut window = [0.0f32; 1024];
        fill_hann_window(&mut window);

        let gain = overlap_add_gain(&window, 256);
        assert!((gain - 1.5).abs() < 1e-4);
    }

    #[test]
    fn test_squared_window_tiles_under_hop() {
        let mut window = [0.0f32; 1024];
        fill_hann_window(&mut window);

        // Sum of the four overlapping squared windows is the same
        // constant at every phase of the hop.
        for n in 0..256 {
            let sum: f32 = (0..4).map(|k| window[n + k * 256] * window[n + k * 256]).sum();
            assert!((sum - 1.5).abs() < 1e-4, "phase {n}: sum {sum}");
        }
    }
}
