use std::f32::consts::{FRAC_PI_2, TAU};

use super::{to_clip, BatchList, Blend, DrawBatch, OverlayVertex, Primitive};
use crate::audio::{Channel, FrameAudioData};
use crate::expr::{FrameVar, PerFrameEvaluator};

/// Points drawn per trace.
const POINTS: usize = 256;
/// Offset between the two samples that form an x/y pair.
const PAIR_OFFSET: usize = 32;

/// Shape of the built-in waveform, selected by `wave_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveMode {
    Circle,
    XyRadial,
    Spiro,
    SpiroTreble,
    Horizontal,
    Explosive,
    Angled,
    DoubleAngled,
}

impl WaveMode {
    pub fn from_value(value: f32) -> Self {
        match value.floor().clamp(0.0, 7.0) as u8 {
            0 => Self::Circle,
            1 => Self::XyRadial,
            2 => Self::Spiro,
            3 => Self::SpiroTreble,
            4 => Self::Horizontal,
            5 => Self::Explosive,
            6 => Self::Angled,
            _ => Self::DoubleAngled,
        }
    }

    fn primitive(self, dots: bool) -> Primitive {
        match self {
            _ if dots => Primitive::Points,
            Self::Spiro | Self::SpiroTreble | Self::Explosive => Primitive::Points,
            Self::Circle => Primitive::LineLoop,
            _ => Primitive::LineStrip,
        }
    }
}

/// Built-in waveform driven by the `wave_*` per-frame variables. Alpha is
/// scaled by the current volume.
#[derive(Debug, Default)]
pub struct Waveform {
    batches: BatchList,
}

impl Waveform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(
        &mut self,
        frame: &PerFrameEvaluator,
        audio: &FrameAudioData,
        aspect_y: f32,
    ) -> &[DrawBatch] {
        self.batches.clear();

        let mode = WaveMode::from_value(frame.value(FrameVar::WaveMode));
        let mut alpha = (frame.value(FrameVar::WaveA) * audio.vol).clamp(0.0, 1.0);
        if mode == WaveMode::SpiroTreble {
            alpha = (alpha * audio.treb * audio.treb).clamp(0.0, 1.0);
        }
        if alpha <= 0.0 {
            return self.batches.as_slice();
        }

        let mut rgb = [
            frame.value(FrameVar::WaveR),
            frame.value(FrameVar::WaveG),
            frame.value(FrameVar::WaveB),
        ];
        if frame.get(FrameVar::WaveBrighten) > 0.0 {
            let max = rgb.iter().copied().fold(0.0f32, f32::max);
            if max > 0.0 {
                rgb = rgb.map(|c| c / max);
            }
        }
        let color = [rgb[0], rgb[1], rgb[2], alpha];

        let dots = frame.get(FrameVar::WaveUseDots) > 0.0;
        let style = TraceStyle {
            primitive: mode.primitive(dots),
            blend: Blend::from_flag(frame.get(FrameVar::WaveAdditive)),
            thick: frame.get(FrameVar::WaveThick) > 0.0,
            color,
        };

        let cx = frame.value(FrameVar::WaveX);
        let cy = frame.value(FrameVar::WaveY);
        let mystery = frame.value(FrameVar::WaveMystery);
        let time = audio.time;
        let left = |i: usize| audio.waveform(Channel::Left, i);
        let right = |i: usize| audio.waveform(Channel::Right, i);

        match mode {
            WaveMode::Circle => {
                let batch = style.open(&mut self.batches);
                for i in 0..POINTS {
                    let radius = 0.5 + 0.4 * left(i) + mystery;
                    let angle = i as f32 / POINTS as f32 * TAU + time * 0.2;
                    style.vertex(
                        batch,
                        cx + radius * angle.cos() * aspect_y * 0.5,
                        cy + radius * angle.sin() * 0.5,
                    );
                }
            }
            WaveMode::XyRadial => {
                let batch = style.open(&mut self.batches);
                for i in 0..POINTS {
                    let radius = 0.53 + 0.43 * right(i) + mystery;
                    let angle = left(i + PAIR_OFFSET) * FRAC_PI_2 + time * 2.3;
                    style.vertex(
                        batch,
                        cx + radius * angle.cos() * aspect_y * 0.5,
                        cy + radius * angle.sin() * 0.5,
                    );
                }
            }
            WaveMode::Spiro | WaveMode::SpiroTreble => {
                let batch = style.open(&mut self.batches);
                for i in 0..POINTS {
                    style.vertex(
                        batch,
                        cx + left(i) * aspect_y * 0.5,
                        cy + right(i + PAIR_OFFSET) * 0.5,
                    );
                }
            }
            WaveMode::Horizontal => {
                let batch = style.open(&mut self.batches);
                for i in 0..POINTS {
                    let x = i as f32 / (POINTS - 1) as f32;
                    style.vertex(batch, x, cy + left(i) * 0.25);
                }
            }
            WaveMode::Explosive => {
                let batch = style.open(&mut self.batches);
                let (sin, cos) = (time * 0.3).sin_cos();
                for i in 0..POINTS {
                    let (a, b) = (left(i), right(i + PAIR_OFFSET));
                    let x = a * a - b * b;
                    let y = 2.0 * a * b;
                    style.vertex(
                        batch,
                        cx + (x * cos - y * sin) * aspect_y * 0.5,
                        cy + (x * sin + y * cos) * 0.5,
                    );
                }
            }
            WaveMode::Angled | WaveMode::DoubleAngled => {
                let angle = mystery * FRAC_PI_2;
                let (sin, cos) = angle.sin_cos();
                let traces: &[(Channel, f32)] = if mode == WaveMode::Angled {
                    &[(Channel::Left, 0.0)]
                } else {
                    &[(Channel::Left, -0.125), (Channel::Right, 0.125)]
                };
                // each trace is its own strip
                for &(channel, offset) in traces {
                    let batch = style.open(&mut self.batches);
                    for i in 0..POINTS {
                        let t = i as f32 / (POINTS - 1) as f32 - 0.5;
                        let displacement = audio.waveform(channel, i) * 0.25 + offset;
                        style.vertex(
                            batch,
                            cx + t * cos - displacement * sin,
                            cy + t * sin + displacement * cos,
                        );
                    }
                }
            }
        }

        self.batches.as_slice()
    }
}

#[derive(Debug, Clone, Copy)]
struct TraceStyle {
    primitive: Primitive,
    blend: Blend,
    thick: bool,
    color: [f32; 4],
}

impl TraceStyle {
    fn open(self, batches: &mut BatchList) -> &mut DrawBatch {
        let batch = batches.push(self.primitive, self.blend);
        batch.thick = self.thick;
        batch
    }

    fn vertex(&self, batch: &mut DrawBatch, x: f32, y: f32) {
        let (px, py) = to_clip(x, y);
        batch.vertices.push(OverlayVertex::new(px, py, self.color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::PresetDescription;
    use crate::state::PresetState;

    fn frame(code: &str) -> PerFrameEvaluator {
        let mut state = PresetState::default();
        let description = PresetDescription {
            per_frame_code: code.into(),
            ..Default::default()
        };
        let mut frame = PerFrameEvaluator::load(&description, &mut state, (8, 6)).unwrap();
        frame.evaluate(&mut state, (8, 6));
        frame
    }

    #[test]
    fn every_mode_draws() {
        let audio = FrameAudioData::default();
        let mut waveform = Waveform::new();
        for mode in 0..7 {
            let batches = waveform.build(&frame(&format!("wave_mode = {mode}")), &audio, 0.75);
            assert_eq!(batches.len(), 1, "mode {mode}");
            assert!(!batches[0].vertices.is_empty(), "mode {mode}");
        }
    }

    #[test]
    fn double_angled_draws_two_traces() {
        let audio = FrameAudioData::default();
        let mut waveform = Waveform::new();
        let batches = waveform.build(&frame("wave_mode = 7"), &audio, 1.0);
        assert_eq!(batches.len(), 2);
        for batch in batches {
            assert_eq!(batch.primitive, Primitive::LineStrip);
            assert_eq!(batch.vertices.len(), POINTS);
        }
        let end_of_left = batches[0].vertices[POINTS - 1].position;
        let start_of_right = batches[1].vertices[0].position;
        assert!(end_of_left[0] > 0.9 && start_of_right[0] < -0.9);
    }

    #[test]
    fn mode_is_clamped() {
        assert_eq!(WaveMode::from_value(12.0), WaveMode::DoubleAngled);
        assert_eq!(WaveMode::from_value(-3.0), WaveMode::Circle);
        assert_eq!(WaveMode::from_value(4.9), WaveMode::Horizontal);
    }

    #[test]
    fn silence_hides_the_wave() {
        let audio = FrameAudioData {
            vol: 0.0,
            ..Default::default()
        };
        let mut waveform = Waveform::new();
        assert!(waveform.build(&frame(""), &audio, 1.0).is_empty());
    }

    #[test]
    fn brighten_normalises_colour() {
        let audio = FrameAudioData::default();
        let mut waveform = Waveform::new();
        let batches = waveform.build(
            &frame("wave_r = 0.5; wave_g = 0.25; wave_b = 0; wave_brighten = 1"),
            &audio,
            1.0,
        );
        let color = batches[0].vertices[0].color;
        assert_eq!(&color[..3], &[1.0, 0.5, 0.0]);
    }
}
