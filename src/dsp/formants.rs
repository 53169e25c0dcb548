//! Formant peak detection and target vector maintenance

use libm::floorf;

use crate::config::{FFT_SIZE, MorphConfig, NUM_FORMANTS};

/// Convert a fractional bin index to Hz.
#[inline(always)]
pub fn bin_to_hz(bin: f32, sample_rate: f32) -> f32 {
    bin * sample_rate / FFT_SIZE as f32
}

/// Convert a frequency in Hz to a fractional bin index.
#[inline(always)]
pub fn hz_to_bin(hz: f32, sample_rate: f32) -> f32 {
    hz * FFT_SIZE as f32 / sample_rate
}

/// Enforce the monotone separation invariant on a target vector:
/// the first formant is floored at `min_first_hz`, every later one at
/// its predecessor plus `min_separation_hz`. Non-finite entries are
/// replaced by the floor.
pub fn monotonize_targets(
    targets: &mut [f32; NUM_FORMANTS],
    min_first_hz: f32,
    min_separation_hz: f32,
) {
    let mut floor = min_first_hz;
    for t in targets.iter_mut() {
        if !(*t >= floor) {
            *t = floor;
        }
        floor = *t + min_separation_hz;
    }
}

/// Peak-picking formant detector with preallocated scratch.
///
/// Always yields exactly `NUM_FORMANTS` ascending bins so the warp-node
/// construction downstream stays valid on silent or near-flat envelopes.
pub struct FormantDetector {
    peaks: Vec<(usize, f32)>,
    selected: Vec<usize>,
}

impl FormantDetector {
    pub fn new() -> Self {
        Self {
            peaks: Vec::with_capacity(FFT_SIZE / 2),
            selected: Vec::with_capacity(FFT_SIZE / 2),
        }
    }

    /// Detect formant peaks in `envelope` and write their bin indices,
    /// ascending, into `out`.
    pub fn detect(
        &mut self,
        envelope: &[f32],
        sample_rate: f32,
        config: &MorphConfig,
        out: &mut [f32; NUM_FORMANTS],
    ) {
        let hz_per_bin = sample_rate / FFT_SIZE as f32;
        let min_bin = (floorf(config.detection_min_hz / hz_per_bin) as usize)
            .clamp(1, FFT_SIZE / 2 - 2);
        let max_bin = (floorf(config.detection_max_hz / hz_per_bin) as usize)
            .clamp(min_bin, FFT_SIZE / 2 - 1);
        let min_distance = (floorf(config.detection_separation_hz / hz_per_bin) as usize).max(2);

        self.peaks.clear();
        for i in min_bin..=max_bin {
            if envelope[i] > envelope[i - 1] && envelope[i] >= envelope[i + 1] {
                self.peaks.push((i, envelope[i]));
            }
        }

        // Strongest peaks first, then greedily thin out anything closer
        // than the minimum spacing to an already accepted peak.
        self.peaks.sort_unstable_by(|a, b| b.1.total_cmp(&a.1));
        self.selected.clear();
        for &(bin, _) in &self.peaks {
            if self.selected.iter().all(|&s| bin.abs_diff(s) >= min_distance) {
                self.selected.push(bin);
                if self.selected.len() == NUM_FORMANTS {
                    break;
                }
            }
        }
        self.selected.sort_unstable();

        // Pad to a full vector by walking forward from the last peak.
        let mut next = match self.selected.last() {
            Some(&bin) => bin + min_distance,
            None => min_bin,
        };
        while self.selected.len() < NUM_FORMANTS {
            let bin = next.clamp(min_bin, max_bin);
            self.selected.push(bin);
            next = bin + min_distance;
        }

        for (o, &bin) in out.iter_mut().zip(self.selected.iter()) {
            *o = bin.clamp(min_bin, max_bin) as f32;
        }
    }
}

impl Default for FormantDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SPECTRUM_SIZE;

    fn detect(envelope: &[f32]) -> [f32; NUM_FORMANTS] {
        let mut detector = FormantDetector::new();
        let mut out = [0.0f32; NUM_FORMANTS];
        detector.detect(envelope, 48000.0, &MorphConfig::default(), &mut out);
        out
    }

    #[test]
    fn test_flat_envelope_yields_full_ascending_vector() {
        let envelope = [1.0f32; SPECTRUM_SIZE];
        let bins = detect(&envelope);

        for pair in bins.windows(2) {
            assert!(pair[1] > pair[0], "bins not ascending: {bins:?}");
        }
    }

    #[test]
    fn test_single_peak_is_first_formant() {
        let mut envelope = [0.01f32; SPECTRUM_SIZE];
        envelope[20] = 1.0;
        let bins = detect(&envelope);

        assert_eq!(bins[0], 20.0);
        for pair in bins.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn test_nearby_peaks_are_thinned() {
        // At 8 kHz the minimum spacing is 15 bins, so the weaker of two
        // peaks 10 bins apart is dropped.
        let mut envelope = [0.01f32; SPECTRUM_SIZE];
        envelope[100] = 1.0;
        envelope[110] = 0.9;
        envelope[200] = 0.5;

        let mut detector = FormantDetector::new();
        let mut bins = [0.0f32; NUM_FORMANTS];
        detector.detect(&envelope, 8000.0, &MorphConfig::default(), &mut bins);

        assert!(bins.contains(&100.0));
        assert!(!bins.contains(&110.0));
        assert!(bins.contains(&200.0));
    }

    #[test]
    fn test_peaks_outside_detection_band_are_ignored() {
        // 48 kHz: the band is bins 3..=192.
        let mut envelope = [0.01f32; SPECTRUM_SIZE];
        envelope[2] = 1.0;
        envelope[300] = 1.0;
        envelope[100] = 0.5;
        let bins = detect(&envelope);

        assert_eq!(bins[0], 100.0);
        assert!(bins.iter().all(|&b| (3.0..=192.0).contains(&b)));
    }

    #[test]
    fn test_monotonize_clamps_descending_input() {
        let mut targets = [0.0f32; NUM_FORMANTS];
        for (i, t) in targets.iter_mut().enumerate() {
            *t = 100.0 - i as f32 * 10.0;
        }
        monotonize_targets(&mut targets, 200.0, 20.0);

        assert_eq!(targets[0], 200.0);
        for i in 1..NUM_FORMANTS {
            assert_eq!(targets[i], targets[i - 1] + 20.0);
        }
    }

    #[test]
    fn test_monotonize_keeps_valid_input() {
        let mut targets = [0.0f32; NUM_FORMANTS];
        for (i, t) in targets.iter_mut().enumerate() {
            *t = 500.0 + i as f32 * 1000.0;
        }
        let expected = targets;
        monotonize_targets(&mut targets, 200.0, 20.0);

        assert_eq!(targets, expected);
    }

    #[test]
    fn test_monotonize_replaces_nan() {
        let mut targets = [f32::NAN; NUM_FORMANTS];
        monotonize_targets(&mut targets, 200.0, 20.0);

        assert_eq!(targets[0], 200.0);
        for i in 1..NUM_FORMANTS {
            assert_eq!(targets[i], targets[i - 1] + 20.0);
        }
    }
}
