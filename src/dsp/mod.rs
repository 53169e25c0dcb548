pub mod envelope;
pub mod fft;
pub mod formants;
pub mod warp;

pub use envelope::EnvelopeExtractor;
pub use fft::FftEngine;
pub use formants::{FormantDetector, bin_to_hz, hz_to_bin, monotonize_targets};
pub use warp::{FormantWarper, WarpingPoint};
