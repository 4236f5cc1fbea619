use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{
    audio::{FrameAudioData, SPECTRUM_SAMPLES, WAVEFORM_SAMPLES},
    RenderError, Result,
};

const BASS_CUTOFF_HZ: f32 = 250.0;
const MID_CUTOFF_HZ: f32 = 4_000.0;
/// Weight of the newest block in the long-term band average.
const LONG_TERM_RATE: f32 = 0.02;
/// Weight of the newest value in the attenuated (smoothed) band values.
const ATTENUATION_RATE: f32 = 0.2;

/// Derives a [`FrameAudioData`] snapshot from raw PCM blocks.
///
/// Band levels are reported relative to their own long-term average, so a
/// steady signal settles around 1.0 and transients rise above it.
pub struct FeatureExtractor {
    sample_rate: u32,
    frame: u32,
    long_term: [f32; 3],
    attenuated: [f32; 3],
    fft_planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
    snapshot: FrameAudioData,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::with_sample_rate(48_000)
    }

    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frame: 0,
            long_term: [0.0; 3],
            attenuated: [1.0; 3],
            fft_planner: RealFftPlanner::new(),
            fft: None,
            snapshot: FrameAudioData::default(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Clears the accumulated state while preserving configuration.
    pub fn reset(&mut self) {
        self.frame = 0;
        self.long_term = [0.0; 3];
        self.attenuated = [1.0; 3];
        self.snapshot = FrameAudioData::default();
    }

    /// Consumes one stereo block and returns the snapshot for the frame
    /// displayed at `time`.
    pub fn process_block(
        &mut self,
        left: &[f32],
        right: &[f32],
        time: f32,
        fps: f32,
    ) -> Result<&FrameAudioData> {
        if left.len() < 2 || right.len() < 2 {
            return Err(RenderError::msg(
                "feature extraction requires blocks with at least two samples",
            ));
        }

        let sample_rate = self.sample_rate as f32;
        let len = left.len();
        let fft = self.prepare_fft(len);
        let spectrum_left = spectrum_into(fft, left)?;
        let bands = band_energies(&fft.spectrum, sample_rate, len);
        copy_spectrum(&spectrum_left, &mut self.snapshot.spectrum_left);

        let fft = self.prepare_fft(right.len());
        let spectrum_right = spectrum_into(fft, right)?;
        copy_spectrum(&spectrum_right, &mut self.snapshot.spectrum_right);

        let mut relative = [1.0; 3];
        for band in 0..3 {
            let energy = bands[band];
            if self.long_term[band] <= f32::EPSILON {
                self.long_term[band] = energy;
            } else {
                self.long_term[band] += (energy - self.long_term[band]) * LONG_TERM_RATE;
            }
            relative[band] = if self.long_term[band] > f32::EPSILON {
                energy / self.long_term[band]
            } else {
                1.0
            };
            self.attenuated[band] += (relative[band] - self.attenuated[band]) * ATTENUATION_RATE;
        }

        resample_into(left, &mut self.snapshot.waveform_left);
        resample_into(right, &mut self.snapshot.waveform_right);

        let snapshot = &mut self.snapshot;
        snapshot.time = time;
        snapshot.frame = self.frame;
        snapshot.fps = fps;
        snapshot.bass = relative[0];
        snapshot.mid = relative[1];
        snapshot.treb = relative[2];
        snapshot.bass_att = self.attenuated[0];
        snapshot.mid_att = self.attenuated[1];
        snapshot.treb_att = self.attenuated[2];
        snapshot.vol = (relative[0] + relative[1] + relative[2]) / 3.0;
        self.frame = self.frame.wrapping_add(1);

        Ok(&self.snapshot)
    }

    fn prepare_fft(&mut self, size: usize) -> &mut FftResources {
        let resources = match self.fft.take() {
            Some(fft) if fft.size == size => fft,
            _ => {
                let plan = self.fft_planner.plan_fft_forward(size);
                FftResources {
                    size,
                    scratch: plan.make_scratch_vec(),
                    spectrum: plan.make_output_vec(),
                    input: plan.make_input_vec(),
                    magnitudes: Vec::with_capacity(size / 2 + 1),
                    plan,
                }
            }
        };

        self.fft.insert(resources)
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
    magnitudes: Vec<f32>,
}

impl fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("sample_rate", &self.sample_rate)
            .field("frame", &self.frame)
            .field("long_term", &self.long_term)
            .field("attenuated", &self.attenuated)
            .finish()
    }
}

fn spectrum_into(fft: &mut FftResources, samples: &[f32]) -> Result<Vec<f32>> {
    let len = samples.len();
    for (index, value) in samples.iter().enumerate() {
        fft.input[index] = *value * hann_value(index, len);
    }

    fft.plan
        .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)
        .map_err(|err| RenderError::msg(format!("fft failed: {err}")))?;

    fft.magnitudes.clear();
    let scale = 2.0 / len as f32;
    fft.magnitudes
        .extend(fft.spectrum.iter().map(|bin| bin.norm() * scale));
    Ok(fft.magnitudes.clone())
}

fn band_energies(spectrum: &[Complex32], sample_rate: f32, len: usize) -> [f32; 3] {
    let bin_hz = sample_rate / len as f32;
    let mut bands = [0.0; 3];
    for (i, bin) in spectrum.iter().enumerate().skip(1) {
        let hz = i as f32 * bin_hz;
        let band = if hz < BASS_CUTOFF_HZ {
            0
        } else if hz < MID_CUTOFF_HZ {
            1
        } else {
            2
        };
        bands[band] += bin.norm_sqr();
    }
    bands
}

fn copy_spectrum(magnitudes: &[f32], out: &mut Vec<f32>) {
    out.resize(SPECTRUM_SAMPLES, 0.0);
    for (index, slot) in out.iter_mut().enumerate() {
        *slot = magnitudes.get(index).copied().unwrap_or(0.0);
    }
}

/// Nearest-sample resampling of an arbitrary block onto the snapshot length.
fn resample_into(samples: &[f32], out: &mut Vec<f32>) {
    out.resize(WAVEFORM_SAMPLES, 0.0);
    let step = samples.len() as f32 / WAVEFORM_SAMPLES as f32;
    for (index, slot) in out.iter_mut().enumerate() {
        let source = ((index as f32 * step) as usize).min(samples.len() - 1);
        *slot = samples[source];
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * amplitude)
            .collect()
    }

    #[test]
    fn silence_reports_neutral_levels() {
        let mut extractor = FeatureExtractor::with_sample_rate(48_000);
        let block = vec![0.0; 1024];
        let snapshot = extractor.process_block(&block, &block, 0.0, 60.0).unwrap();

        assert_eq!(snapshot.bass, 1.0);
        assert_eq!(snapshot.treb, 1.0);
        assert_eq!(snapshot.waveform_left.len(), WAVEFORM_SAMPLES);
    }

    #[test]
    fn bass_transient_rises_above_average() {
        let mut extractor = FeatureExtractor::with_sample_rate(48_000);
        let quiet = sine(100.0, 48_000, 1024, 0.05);
        for frame in 0..30 {
            extractor
                .process_block(&quiet, &quiet, frame as f32 / 60.0, 60.0)
                .unwrap();
        }

        let loud = sine(100.0, 48_000, 1024, 0.8);
        let snapshot = extractor.process_block(&loud, &loud, 0.5, 60.0).unwrap();
        assert!(snapshot.bass > 2.0, "bass was {}", snapshot.bass);
        assert!(snapshot.bass_att < snapshot.bass);
    }

    #[test]
    fn rejects_tiny_blocks() {
        let mut extractor = FeatureExtractor::new();
        assert!(extractor.process_block(&[0.0], &[0.0], 0.0, 60.0).is_err());
    }
}
