use serde::{Deserialize, Serialize};

/// Number of PCM samples per channel carried in a snapshot.
pub const WAVEFORM_SAMPLES: usize = 576;
/// Number of spectrum bins per channel carried in a snapshot.
pub const SPECTRUM_SAMPLES: usize = 512;

/// Channel selector for waveform and spectrum lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

/// Per-frame audio features. The renderer only reads this; it is produced by
/// an external analyser (or [`crate::FeatureExtractor`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameAudioData {
    pub time: f32,
    pub frame: u32,
    pub fps: f32,
    /// Playback position of the preset in [0, 1].
    pub progress: f32,
    pub bass: f32,
    pub mid: f32,
    pub treb: f32,
    pub bass_att: f32,
    pub mid_att: f32,
    pub treb_att: f32,
    pub vol: f32,
    pub waveform_left: Vec<f32>,
    pub waveform_right: Vec<f32>,
    pub spectrum_left: Vec<f32>,
    pub spectrum_right: Vec<f32>,
}

impl Default for FrameAudioData {
    fn default() -> Self {
        Self {
            time: 0.0,
            frame: 0,
            fps: 60.0,
            progress: 0.0,
            bass: 1.0,
            mid: 1.0,
            treb: 1.0,
            bass_att: 1.0,
            mid_att: 1.0,
            treb_att: 1.0,
            vol: 1.0,
            waveform_left: vec![0.0; WAVEFORM_SAMPLES],
            waveform_right: vec![0.0; WAVEFORM_SAMPLES],
            spectrum_left: vec![0.0; SPECTRUM_SAMPLES],
            spectrum_right: vec![0.0; SPECTRUM_SAMPLES],
        }
    }
}

impl FrameAudioData {
    /// Copies `other` into `self`, reusing the sample buffers.
    pub fn copy_from(&mut self, other: &FrameAudioData) {
        self.clone_from(other);
    }

    /// Waveform sample at `index`, zero outside the captured range.
    pub fn waveform(&self, channel: Channel, index: usize) -> f32 {
        let data = match channel {
            Channel::Left => &self.waveform_left,
            Channel::Right => &self.waveform_right,
        };
        data.get(index).copied().unwrap_or(0.0)
    }

    pub fn spectrum(&self, channel: Channel, index: usize) -> f32 {
        let data = match channel {
            Channel::Left => &self.spectrum_left,
            Channel::Right => &self.spectrum_right,
        };
        data.get(index).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_samples_read_as_silence() {
        let mut audio = FrameAudioData::default();
        audio.waveform_left[3] = 0.5;

        assert_eq!(audio.waveform(Channel::Left, 3), 0.5);
        assert_eq!(audio.waveform(Channel::Left, WAVEFORM_SAMPLES + 10), 0.0);
        assert_eq!(audio.spectrum(Channel::Right, SPECTRUM_SAMPLES), 0.0);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let audio: FrameAudioData = serde_json::from_str(r#"{ "bass": 2.5 }"#).unwrap();
        assert_eq!(audio.bass, 2.5);
        assert_eq!(audio.mid, 1.0);
        assert_eq!(audio.waveform_right.len(), WAVEFORM_SAMPLES);
    }
}
