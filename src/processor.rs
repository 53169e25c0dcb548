//! Streaming formant shifting core
//!
//! Per sample, input enters an assembly ring and one finished sample
//! leaves the overlap-add ring. Every `HOP_SIZE` samples a frame is
//! analysed: Hann window, forward FFT, cepstral envelope, formant peak
//! detection, a piecewise-linear warp of the envelope onto the target
//! formants, and resynthesis by multiplying each bin with the ratio of
//! warped to original envelope. The per-bin gains are real, so the
//! phases (pitch and harmonic fine structure) pass through untouched.

use std::sync::{Arc, Mutex};

use libm::{powf, sqrtf};
use log::{debug, trace};
use realfft::num_complex::Complex32;

use crate::config::{
    ENV_FLOOR, FFT_SIZE, HOP_SIZE, MorphConfig, NUM_FORMANTS, ProcessSpec, SPECTRUM_SIZE,
};
use crate::dsp::envelope::EnvelopeExtractor;
use crate::dsp::fft::FftEngine;
use crate::dsp::formants::{FormantDetector, bin_to_hz, hz_to_bin, monotonize_targets};
use crate::dsp::warp::{FormantWarper, WarpingPoint};
use crate::error::FormantShiftError;
use crate::hann_window::{fill_hann_window, overlap_add_gain};
use crate::ring_buffer::SampleRing;
use crate::visualization::{VisualizationHandle, VisualizationSnapshot};

/// Real-time formant shifter.
///
/// Construction allocates every buffer; `prepare` stores the host
/// contract and flushes. After that the audio thread drives `process`
/// block by block without allocating or blocking.
pub struct FormantShifter {
    config: MorphConfig,
    spec: Option<ProcessSpec>,

    window: Vec<f32>,
    overlap_gain: f32,
    max_scale: f32,

    fft: FftEngine,
    envelope_extractor: EnvelopeExtractor,
    detector: FormantDetector,
    warper: FormantWarper,

    input_ring: SampleRing<FFT_SIZE>,
    output_ring: SampleRing<FFT_SIZE>,
    hop_counter: usize,

    target_formants_hz: [f32; NUM_FORMANTS],
    current_formant_bins: [f32; NUM_FORMANTS],

    frame: Vec<f32>,
    spectrum: Vec<Complex32>,
    magnitudes: Vec<f32>,
    env_orig: Vec<f32>,
    env_warp: Vec<f32>,
    nodes: Vec<WarpingPoint>,

    snapshot: Arc<Mutex<VisualizationSnapshot>>,
}

impl FormantShifter {
    pub fn new() -> Self {
        Self::build(MorphConfig::default())
    }

    /// Create a shifter with custom tunables.
    pub fn with_config(config: MorphConfig) -> Result<Self, FormantShiftError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: MorphConfig) -> Self {
        let mut window = vec![0.0; FFT_SIZE];
        fill_hann_window(&mut window);
        let overlap_gain = overlap_add_gain(&window, HOP_SIZE);

        let mut target_formants_hz = [0.0; NUM_FORMANTS];
        for (k, t) in target_formants_hz.iter_mut().enumerate() {
            // Resonances of a neutral vocal tract: (2k - 1) * 500 Hz.
            *t = (2 * k + 1) as f32 * 500.0;
        }

        Self {
            spec: None,
            window,
            overlap_gain,
            max_scale: powf(10.0, config.max_envelope_gain_db / 20.0),
            fft: FftEngine::new(),
            envelope_extractor: EnvelopeExtractor::new(config.cutoff_bin),
            detector: FormantDetector::new(),
            warper: FormantWarper::new(SPECTRUM_SIZE),
            input_ring: SampleRing::new(),
            output_ring: SampleRing::new(),
            hop_counter: 0,
            target_formants_hz,
            current_formant_bins: [0.0; NUM_FORMANTS],
            frame: vec![0.0; FFT_SIZE],
            spectrum: vec![Complex32::new(0.0, 0.0); SPECTRUM_SIZE],
            magnitudes: vec![0.0; SPECTRUM_SIZE],
            env_orig: vec![0.0; SPECTRUM_SIZE],
            env_warp: vec![0.0; SPECTRUM_SIZE],
            nodes: Vec::with_capacity(NUM_FORMANTS + 2),
            snapshot: Arc::new(Mutex::new(VisualizationSnapshot::default())),
            config,
        }
    }

    /// Store the host contract and flush all buffered state. Idempotent;
    /// nothing is allocated here.
    pub fn prepare(&mut self, spec: ProcessSpec) {
        debug!(
            "prepare: sample_rate={} max_block_size={} channels={}",
            spec.sample_rate, spec.max_block_size, spec.channel_count
        );
        self.spec = Some(spec);
        self.reset();
    }

    /// Zero the sample rings and hop counter. Window and FFT tables are
    /// kept.
    pub fn reset(&mut self) {
        trace!("reset");
        self.input_ring.reset();
        self.output_ring.reset();
        self.hop_counter = 0;
    }

    /// Audio-thread entry point. Channel 0 of `inputs` is analysed and
    /// the shifted result is written to every channel of `outputs`.
    /// Every channel slice must hold at least `num_samples` samples.
    /// Before `prepare` this passes the input through unchanged.
    pub fn process(
        &mut self,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        num_samples: usize,
    ) {
        let Some(spec) = self.spec else {
            passthrough(inputs, outputs, num_samples);
            return;
        };
        let Some(input) = inputs.first() else {
            return;
        };
        let sample_rate = spec.sample_rate as f32;

        for i in 0..num_samples {
            self.input_ring.push(input[i]);
            let out_sample = self.output_ring.pop();
            for ch in outputs.iter_mut() {
                ch[i] = out_sample;
            }

            self.hop_counter += 1;
            if self.hop_counter >= HOP_SIZE {
                self.hop_counter = 0;
                self.process_frame(sample_rate).ok();
            }
        }
    }

    /// Replace the target formant vector, enforcing the monotone
    /// separation invariant in place. Wait-free.
    pub fn set_target_formants_hz(&mut self, targets: &[f32; NUM_FORMANTS]) {
        self.target_formants_hz = *targets;
        monotonize_targets(
            &mut self.target_formants_hz,
            self.config.min_formant_hz,
            self.config.min_formant_separation_hz,
        );
    }

    /// Estimate formant frequencies from one analysis window centered at
    /// the midpoint of `buffer`, zero-padding if the buffer is shorter
    /// than a window. Not real-time safe; run while audio is idle. The
    /// stored targets are not touched — write the result back through
    /// [`Self::set_target_formants_hz`] to retune.
    pub fn estimate_formants_from_buffer(
        &mut self,
        buffer: &[f32],
        sample_rate: f32,
    ) -> Result<[f32; NUM_FORMANTS], FormantShiftError> {
        if buffer.is_empty() {
            return Err(FormantShiftError::EmptyReferenceBuffer);
        }
        if sample_rate <= 0.0 || !sample_rate.is_finite() {
            return Err(FormantShiftError::InvalidConfiguration);
        }

        self.frame.fill(0.0);
        if buffer.len() >= FFT_SIZE {
            let start = (buffer.len() - FFT_SIZE) / 2;
            self.frame.copy_from_slice(&buffer[start..start + FFT_SIZE]);
        } else {
            let offset = (FFT_SIZE - buffer.len()) / 2;
            self.frame[offset..offset + buffer.len()].copy_from_slice(buffer);
        }
        for (s, w) in self.frame.iter_mut().zip(self.window.iter()) {
            *s *= w;
        }

        self.fft.forward(&mut self.frame, &mut self.spectrum)?;
        for (m, bin) in self.magnitudes.iter_mut().zip(self.spectrum.iter()) {
            *m = sqrtf(bin.re * bin.re + bin.im * bin.im);
        }
        self.envelope_extractor.extract(&mut self.fft, &self.magnitudes, &mut self.env_orig)?;
        self.detector.detect(
            &self.env_orig,
            sample_rate,
            &self.config,
            &mut self.current_formant_bins,
        );

        let mut formants_hz = [0.0f32; NUM_FORMANTS];
        for (hz, &bin) in formants_hz.iter_mut().zip(self.current_formant_bins.iter()) {
            *hz = bin_to_hz(bin, sample_rate);
        }
        debug!(
            "estimated formants from {} samples at {} Hz: F1 = {:.1} Hz",
            buffer.len(),
            sample_rate,
            formants_hz[0]
        );
        Ok(formants_hz)
    }

    /// Cloneable reader for the UI thread.
    pub fn visualization_handle(&self) -> VisualizationHandle {
        VisualizationHandle::new(Arc::clone(&self.snapshot))
    }

    /// Copy of the latest published snapshot, for single-threaded hosts.
    pub fn latest_visualization_data(&self) -> VisualizationSnapshot {
        self.snapshot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn target_formants_hz(&self) -> &[f32; NUM_FORMANTS] {
        &self.target_formants_hz
    }

    /// Formant bins detected in the most recent frame.
    pub fn current_formant_bins(&self) -> &[f32; NUM_FORMANTS] {
        &self.current_formant_bins
    }

    pub fn is_prepared(&self) -> bool {
        self.spec.is_some()
    }

    pub fn config(&self) -> &MorphConfig {
        &self.config
    }

    pub fn process_spec(&self) -> Option<ProcessSpec> {
        self.spec
    }

    /// Fixed pipeline latency, for host delay compensation.
    pub fn latency_samples(&self) -> usize {
        FFT_SIZE
    }

    fn process_frame(&mut self, sample_rate: f32) -> Result<(), FormantShiftError> {
        // Assemble the newest window of input, oldest sample first.
        self.input_ring.latest_frame(&mut self.frame);
        for (s, w) in self.frame.iter_mut().zip(self.window.iter()) {
            *s *= w;
        }

        self.fft.forward(&mut self.frame, &mut self.spectrum)?;
        for (m, bin) in self.magnitudes.iter_mut().zip(self.spectrum.iter()) {
            *m = sqrtf(bin.re * bin.re + bin.im * bin.im);
        }

        self.envelope_extractor.extract(&mut self.fft, &self.magnitudes, &mut self.env_orig)?;
        self.detector.detect(
            &self.env_orig,
            sample_rate,
            &self.config,
            &mut self.current_formant_bins,
        );

        // Warp nodes: detected bin -> target bin, dst strictly
        // increasing and inside (0, N/2).
        let top = (FFT_SIZE / 2 - 1) as f32;
        self.nodes.clear();
        self.nodes.push(WarpingPoint { src: 0.0, dst: 0.0 });
        let mut last_dst = 0.0f32;
        for i in 0..NUM_FORMANTS {
            let src = self.current_formant_bins[i];
            let dst = hz_to_bin(self.target_formants_hz[i], sample_rate)
                .max(last_dst + 1.0)
                .min(top);
            self.nodes.push(WarpingPoint { src, dst });
            last_dst = dst;
        }
        let end = (FFT_SIZE / 2) as f32;
        self.nodes.push(WarpingPoint { src: end, dst: end });

        self.warper.build_map(&self.nodes);
        self.warper.apply(&self.env_orig, &mut self.env_warp);

        // Publish for the UI; a held lock just drops this frame's update.
        if let Ok(mut snapshot) = self.snapshot.try_lock() {
            snapshot.spectrum.copy_from_slice(&self.magnitudes);
            snapshot.envelope.copy_from_slice(&self.env_warp);
            snapshot.f1_bin = self.nodes[1].dst;
            snapshot.f2_bin = self.nodes[2].dst;
        }

        apply_envelope_substitution(
            &mut self.spectrum,
            &self.env_orig,
            &self.env_warp,
            self.max_scale,
        );

        self.fft.inverse(&mut self.spectrum, &mut self.frame)?;

        // Undo the unnormalized FFT round trip and the squared-window
        // overlap gain, then window again for synthesis.
        let norm = 1.0 / (FFT_SIZE as f32 * self.overlap_gain);
        for (s, w) in self.frame.iter_mut().zip(self.window.iter()) {
            *s *= norm * w;
        }

        for (i, &s) in self.frame.iter().enumerate() {
            self.output_ring.add_at_offset(i, s);
        }

        Ok(())
    }
}

impl Default for FormantShifter {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale each bin by the ratio of warped to original envelope. The
/// gains are real and nonnegative, so bin phases are untouched.
fn apply_envelope_substitution(
    spectrum: &mut [Complex32],
    env_orig: &[f32],
    env_warp: &[f32],
    max_scale: f32,
) {
    for (k, bin) in spectrum.iter_mut().enumerate() {
        let scale = (env_warp[k] / env_orig[k].max(ENV_FLOOR)).clamp(0.0, max_scale);
        bin.re *= scale;
        bin.im *= scale;
    }
}

fn passthrough(inputs: &[&[f32]], outputs: &mut [&mut [f32]], num_samples: usize) {
    let Some(input) = inputs.first() else {
        return;
    };
    for ch in outputs.iter_mut() {
        ch[..num_samples].copy_from_slice(&input[..num_samples]);
    }
}
