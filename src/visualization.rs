//! Snapshot plumbing between the audio and UI threads
//!
//! The processor owns a single snapshot slot and publishes into it with
//! a try-lock, dropping the update when the reader holds the lock. The
//! UI side holds a [`VisualizationHandle`] clone and pulls at its own
//! rate; it never pushes into the processor.

use std::sync::{Arc, Mutex};

use crate::config::SPECTRUM_SIZE;

/// Latest per-frame render data for the UI.
#[derive(Debug, Clone)]
pub struct VisualizationSnapshot {
    /// Magnitude spectrum of the analysed frame
    pub spectrum: Vec<f32>,
    /// Warped envelope applied in that frame
    pub envelope: Vec<f32>,
    /// First target formant as a destination bin
    pub f1_bin: f32,
    /// Second target formant as a destination bin
    pub f2_bin: f32,
}

impl Default for VisualizationSnapshot {
    fn default() -> Self {
        Self {
            spectrum: vec![0.0; SPECTRUM_SIZE],
            envelope: vec![0.0; SPECTRUM_SIZE],
            f1_bin: 0.0,
            f2_bin: 0.0,
        }
    }
}

/// Cloneable reader for the snapshot slot.
#[derive(Clone)]
pub struct VisualizationHandle {
    slot: Arc<Mutex<VisualizationSnapshot>>,
}

impl VisualizationHandle {
    pub(crate) fn new(slot: Arc<Mutex<VisualizationSnapshot>>) -> Self {
        Self { slot }
    }

    /// Copy out the latest published snapshot. Blocks only for the
    /// duration of the audio thread's copy-in; lock poisoning is
    /// absorbed since the slot holds plain sample data.
    pub fn latest(&self) -> VisualizationSnapshot {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}
