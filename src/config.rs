//! Configuration types for the formant shifter

use crate::error::FormantShiftError;

/// FFT size of the analysis/resynthesis chain (must stay a power of two)
pub const FFT_SIZE: usize = 1024;

/// Number of unique bins in a real spectrum of `FFT_SIZE` points
pub const SPECTRUM_SIZE: usize = FFT_SIZE / 2 + 1;

/// Analysis hop in samples (75% overlap)
pub const HOP_SIZE: usize = FFT_SIZE / 4;

/// Number of tracked formants
pub const NUM_FORMANTS: usize = 15;

/// Floor applied to magnitudes before taking the log
pub const LOG_FLOOR: f32 = 1e-9;

/// Floor applied to the original envelope before division
pub const ENV_FLOOR: f32 = 1e-7;

/// Clamp applied to the log envelope after liftering
pub const LOG_CLAMP: f32 = 20.0;

/// Host contract captured at prepare time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Largest block the host will pass to `process`
    pub max_block_size: usize,
    /// Number of channels delivered per block
    pub channel_count: usize,
}

impl ProcessSpec {
    /// Create a new spec with validation
    pub fn new(
        sample_rate: f64,
        max_block_size: usize,
        channel_count: usize,
    ) -> Result<Self, FormantShiftError> {
        if sample_rate <= 0.0 || !sample_rate.is_finite() {
            return Err(FormantShiftError::InvalidConfiguration);
        }
        if max_block_size == 0 || channel_count == 0 {
            return Err(FormantShiftError::InvalidConfiguration);
        }

        Ok(Self { sample_rate, max_block_size, channel_count })
    }

    /// Width of one FFT bin in Hz
    pub fn hz_per_bin(&self) -> f32 {
        self.sample_rate as f32 / FFT_SIZE as f32
    }
}

/// Algorithm tunables. The defaults reproduce the reference behavior
/// bit for bit; hosts normally leave them alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphConfig {
    /// Cepstral lifter width in quefrency bins
    pub cutoff_bin: usize,
    /// Ceiling on the per-bin envelope substitution gain, in dB
    pub max_envelope_gain_db: f32,
    /// Floor for the first target formant in Hz
    pub min_formant_hz: f32,
    /// Minimum separation between successive target formants in Hz
    pub min_formant_separation_hz: f32,
    /// Lower edge of the formant detection band in Hz
    pub detection_min_hz: f32,
    /// Upper edge of the formant detection band in Hz
    pub detection_max_hz: f32,
    /// Minimum spacing between detected formant peaks in Hz
    pub detection_separation_hz: f32,
}

impl Default for MorphConfig {
    fn default() -> Self {
        Self {
            cutoff_bin: 30,
            max_envelope_gain_db: 24.0,
            min_formant_hz: 200.0,
            min_formant_separation_hz: 20.0,
            detection_min_hz: 150.0,
            detection_max_hz: 9000.0,
            detection_separation_hz: 120.0,
        }
    }
}

impl MorphConfig {
    /// Check the tunables against the fixed FFT geometry
    pub fn validate(&self) -> Result<(), FormantShiftError> {
        if self.cutoff_bin == 0 || self.cutoff_bin >= FFT_SIZE / 2 {
            return Err(FormantShiftError::InvalidConfiguration);
        }
        if !self.max_envelope_gain_db.is_finite() {
            return Err(FormantShiftError::InvalidConfiguration);
        }
        if self.min_formant_hz <= 0.0 || self.min_formant_separation_hz <= 0.0 {
            return Err(FormantShiftError::InvalidConfiguration);
        }
        if self.detection_min_hz <= 0.0
            || self.detection_max_hz <= self.detection_min_hz
            || self.detection_separation_hz <= 0.0
        {
            return Err(FormantShiftError::InvalidConfiguration);
        }

        Ok(())
    }
}
