//! Real FFT wrapper fixed at the analysis size

use std::sync::Arc;

use realfft::num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::config::{FFT_SIZE, SPECTRUM_SIZE};
use crate::error::FormantShiftError;

/// Forward/inverse real FFT of `FFT_SIZE` points with preallocated scratch.
///
/// The transforms are unnormalized: a forward transform followed by an
/// inverse returns the input scaled by `FFT_SIZE`. Callers fold the
/// factor into their own normalization.
pub struct FftEngine {
    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
    scratch_fwd: Vec<Complex32>,
    scratch_inv: Vec<Complex32>,
}

impl FftEngine {
    pub fn new() -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(FFT_SIZE);
        let c2r = planner.plan_fft_inverse(FFT_SIZE);
        let scratch_fwd = r2c.make_scratch_vec();
        let scratch_inv = c2r.make_scratch_vec();

        Self { r2c, c2r, scratch_fwd, scratch_inv }
    }

    /// Transform a real frame into its half-spectrum of `SPECTRUM_SIZE`
    /// bins. The frame contents are destroyed.
    pub fn forward(
        &mut self,
        frame: &mut [f32],
        spectrum: &mut [Complex32],
    ) -> Result<(), FormantShiftError> {
        self.r2c
            .process_with_scratch(frame, spectrum, &mut self.scratch_fwd)
            .map_err(|_| FormantShiftError::FftFailed)
    }

    /// Transform a half-spectrum back into a real frame of `FFT_SIZE`
    /// samples. The spectrum contents are destroyed.
    pub fn inverse(
        &mut self,
        spectrum: &mut [Complex32],
        frame: &mut [f32],
    ) -> Result<(), FormantShiftError> {
        // A real signal has no imaginary component at DC or Nyquist;
        // rounding residue there would leak into the transform.
        spectrum[0].im = 0.0;
        spectrum[SPECTRUM_SIZE - 1].im = 0.0;

        self.c2r
            .process_with_scratch(spectrum, frame, &mut self.scratch_inv)
            .map_err(|_| FormantShiftError::FftFailed)
    }
}

impl Default for FftEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_scales_by_fft_size() {
        let mut fft = FftEngine::new();
        let mut frame = [0.0f32; FFT_SIZE];
        for (i, s) in frame.iter_mut().enumerate() {
            let t = i as f32 / FFT_SIZE as f32;
            *s = (2.0 * core::f32::consts::PI * 8.0 * t).sin()
                + 0.25 * (2.0 * core::f32::consts::PI * 40.0 * t).cos();
        }
        let original = frame;

        let mut spectrum = [Complex32::new(0.0, 0.0); SPECTRUM_SIZE];
        fft.forward(&mut frame, &mut spectrum).unwrap();
        fft.inverse(&mut spectrum, &mut frame).unwrap();

        for (out, orig) in frame.iter().zip(original.iter()) {
            assert!((out / FFT_SIZE as f32 - orig).abs() < 1e-4);
        }
    }

    #[test]
    fn test_forward_resolves_on_grid_sine() {
        let mut fft = FftEngine::new();
        let mut frame = [0.0f32; FFT_SIZE];
        for (i, s) in frame.iter_mut().enumerate() {
            *s = (2.0 * core::f32::consts::PI * 16.0 * i as f32 / FFT_SIZE as f32).cos();
        }

        let mut spectrum = [Complex32::new(0.0, 0.0); SPECTRUM_SIZE];
        fft.forward(&mut frame, &mut spectrum).unwrap();

        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(k, _)| k)
            .unwrap();
        assert_eq!(peak, 16);
        // An on-grid cosine of unit amplitude lands at N/2 in an
        // unnormalized transform.
        assert!((spectrum[16].norm() - (FFT_SIZE / 2) as f32).abs() < 1e-1);
    }
}
