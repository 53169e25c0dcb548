//! Spectral envelope extraction via real cepstrum liftering
//!
//! The log magnitude spectrum separates the voiced excitation (fast
//! spectral ripple, high quefrency) from the vocal-tract filter (slow
//! spectral shape, low quefrency). Keeping only the low-quefrency part
//! of the cepstrum and transforming back yields a smooth envelope.

use libm::{expf, logf};
use realfft::num_complex::Complex32;

use crate::config::{FFT_SIZE, LOG_CLAMP, LOG_FLOOR, SPECTRUM_SIZE};
use crate::dsp::fft::FftEngine;
use crate::error::FormantShiftError;

/// Cepstral envelope extractor with preallocated working buffers.
pub struct EnvelopeExtractor {
    cutoff_bin: usize,
    cepstrum: Vec<f32>,
    spectrum: Vec<Complex32>,
}

impl EnvelopeExtractor {
    /// `cutoff_bin` is the lifter width in quefrency bins: larger values
    /// keep more spectral detail in the envelope.
    pub fn new(cutoff_bin: usize) -> Self {
        Self {
            cutoff_bin: cutoff_bin.min(FFT_SIZE / 2),
            cepstrum: vec![0.0; FFT_SIZE],
            spectrum: vec![Complex32::new(0.0, 0.0); SPECTRUM_SIZE],
        }
    }

    /// Compute the smooth envelope of `magnitudes` into `envelope`.
    /// Both slices are `SPECTRUM_SIZE` long; every output value is
    /// strictly positive.
    pub fn extract(
        &mut self,
        fft: &mut FftEngine,
        magnitudes: &[f32],
        envelope: &mut [f32],
    ) -> Result<(), FormantShiftError> {
        // Log magnitude as the real half-spectrum of a symmetric signal.
        for (bin, &m) in self.spectrum.iter_mut().zip(magnitudes.iter()) {
            *bin = Complex32::new(logf(m.max(LOG_FLOOR)), 0.0);
        }

        // Real cepstrum.
        fft.inverse(&mut self.spectrum, &mut self.cepstrum)?;

        // Lifter: keep the low-quefrency head and its symmetric tail.
        for c in &mut self.cepstrum[self.cutoff_bin..FFT_SIZE - self.cutoff_bin] {
            *c = 0.0;
        }

        // Back to the log spectral domain.
        fft.forward(&mut self.cepstrum, &mut self.spectrum)?;

        // The inverse/forward pair scales by FFT_SIZE.
        let norm = 1.0 / FFT_SIZE as f32;
        for (env, bin) in envelope.iter_mut().zip(self.spectrum.iter()) {
            let log_env = (bin.re * norm).clamp(-LOG_CLAMP, LOG_CLAMP);
            *env = expf(log_env);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_spectrum_round_trips() {
        let mut fft = FftEngine::new();
        let mut extractor = EnvelopeExtractor::new(30);

        let magnitudes = [0.5f32; SPECTRUM_SIZE];
        let mut envelope = [0.0f32; SPECTRUM_SIZE];
        extractor.extract(&mut fft, &magnitudes, &mut envelope).unwrap();

        for &e in &envelope {
            assert!((e - 0.5).abs() < 0.005, "envelope value {e}");
        }
    }

    #[test]
    fn test_envelope_is_strictly_positive_on_silence() {
        let mut fft = FftEngine::new();
        let mut extractor = EnvelopeExtractor::new(30);

        let magnitudes = [0.0f32; SPECTRUM_SIZE];
        let mut envelope = [0.0f32; SPECTRUM_SIZE];
        extractor.extract(&mut fft, &magnitudes, &mut envelope).unwrap();

        for &e in &envelope {
            assert!(e > 0.0);
            assert!(e.is_finite());
        }
    }

    #[test]
    fn test_envelope_smooths_spectral_ripple() {
        let mut fft = FftEngine::new();
        let mut extractor = EnvelopeExtractor::new(30);

        // Harmonic comb under a broad single-peak shape: the envelope
        // should track the shape, not the comb.
        let mut magnitudes = [0.0f32; SPECTRUM_SIZE];
        for (k, m) in magnitudes.iter_mut().enumerate() {
            let shape = (-((k as f32 - 100.0) / 120.0).powi(2)).exp() + 1e-3;
            let comb = if k % 8 == 0 { 1.0 } else { 0.05 };
            *m = shape * comb;
        }
        let mut envelope = [0.0f32; SPECTRUM_SIZE];
        extractor.extract(&mut fft, &magnitudes, &mut envelope).unwrap();

        // Adjacent-bin ratio of the envelope stays far below the 20x
        // swing of the comb.
        for k in 40..400 {
            let ratio = envelope[k] / envelope[k + 1];
            assert!(ratio < 3.0 && ratio > 1.0 / 3.0, "bin {k}: ratio {ratio}");
        }
    }
}
