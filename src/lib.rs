//! Real-time vocal formant shifting.
//!
//! The core of this crate is [`FormantShifter`], a streaming processor
//! that moves the resonances of a voice (formants F1..F15) onto a
//! configurable set of target frequencies while leaving pitch and
//! harmonic fine structure alone. It works frame by frame over a
//! 1024-point STFT with 75% overlap: the spectral envelope is extracted
//! by cepstral liftering, formant peaks are picked from it, the
//! envelope is warped so the peaks land on the targets, and each bin is
//! rescaled by the warped-to-original envelope ratio before
//! overlap-add resynthesis.
//!
//! The processor is a plain owned value intended to live inside a
//! plugin shell or other audio host: `prepare` once, then drive
//! `process` from the audio thread and read visualization snapshots
//! from the UI thread through a [`VisualizationHandle`]. An offline
//! helper estimates the formants of a reference recording so targets
//! can be seeded from real material.

// Core modules
pub mod config;
pub mod error;

// Audio processing modules
pub mod dsp;
pub mod hann_window;
pub mod processor;

// Buffer management
pub mod ring_buffer;

// UI-facing data
pub mod visualization;

// Re-export main API
pub use config::{FFT_SIZE, HOP_SIZE, MorphConfig, NUM_FORMANTS, ProcessSpec, SPECTRUM_SIZE};
pub use error::FormantShiftError;
pub use processor::FormantShifter;
pub use visualization::{VisualizationHandle, VisualizationSnapshot};

// Re-export commonly used building blocks
pub use dsp::envelope::EnvelopeExtractor;
pub use dsp::fft::FftEngine;
pub use dsp::formants::{FormantDetector, monotonize_targets};
pub use dsp::warp::{FormantWarper, WarpingPoint};
