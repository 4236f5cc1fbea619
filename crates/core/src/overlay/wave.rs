use super::{to_clip, BatchList, Blend, DrawBatch, OverlayVertex, Primitive};
use crate::audio::{Channel, SPECTRUM_SAMPLES, WAVEFORM_SAMPLES};
use crate::expr::{CompiledProgram, ExprContext, WaveVar};
use crate::preset::WaveDescription;
use crate::state::PresetState;
use crate::LoadError;

const WAVE_SEED: u64 = 0x5eed_3a00;

/// A preset-defined waveform: per-frame code once, then per-point code for
/// every sample.
///
/// Before each point `x` and `y` are reset to a horizontal trace through the
/// per-frame position (`x + sample - 0.5`, `y + value1 / 2`) and the colour to
/// the per-frame colour.
#[derive(Debug)]
pub struct CustomWave {
    index: usize,
    enabled: bool,
    context: ExprContext,
    per_frame: CompiledProgram,
    per_point: CompiledProgram,
    baseline: Vec<f64>,
    batches: BatchList,
}

impl CustomWave {
    pub fn load(
        index: usize,
        description: &WaveDescription,
        state: &mut PresetState,
        mesh: (u32, u32),
    ) -> Result<Self, LoadError> {
        let mut context = ExprContext::new(WaveVar::TABLE, WAVE_SEED + index as u64);
        for (name, value) in &description.values {
            context.assign(name, *value, &mut state.globals);
        }
        context.set_q(&state.q);

        let init = context
            .compile(&description.init_code)
            .map_err(LoadError::InitCode)?;
        let per_frame = context
            .compile(&description.per_frame_code)
            .map_err(|source| LoadError::Expression {
                program: "custom wave",
                source,
            })?;
        let per_point = context
            .compile(&description.per_point_code)
            .map_err(|source| LoadError::Expression {
                program: "custom wave per-point",
                source,
            })?;

        context.bind_common_inputs(state, mesh);
        context.execute(&init, &mut state.globals);
        let baseline = context.fixed_slots().to_vec();

        Ok(Self {
            index,
            enabled: description.enabled,
            context,
            per_frame,
            per_point,
            baseline,
            batches: BatchList::new(),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn draw(&mut self, state: &mut PresetState, mesh: (u32, u32)) -> &[DrawBatch] {
        self.batches.clear();
        if !self.enabled {
            return self.batches.as_slice();
        }

        let context = &mut self.context;
        context.restore_fixed(&self.baseline);
        context.bind_common_inputs(state, mesh);
        context.set_q(&state.q);
        context.execute(&self.per_frame, &mut state.globals);
        if context.get(WaveVar::Enabled.index()) == 0.0 {
            return self.batches.as_slice();
        }

        let spectrum = context.get(WaveVar::Spectrum.index()) > 0.0;
        let available = if spectrum {
            SPECTRUM_SAMPLES
        } else {
            WAVEFORM_SAMPLES
        };
        let samples = (context.clamped(WaveVar::Samples.index()).floor() as usize).min(available);
        let sep = context.clamped(WaveVar::Sep.index()).floor() as usize;
        let scaling = context.get(WaveVar::Scaling.index()) as f32;
        let smoothing = context.clamped(WaveVar::Smoothing.index()) as f32;
        let origin = (context.get(WaveVar::X.index()), context.get(WaveVar::Y.index()));
        let color_vars = [WaveVar::R, WaveVar::G, WaveVar::B, WaveVar::A];
        let frame_color = color_vars.map(|var| context.get(var.index()));

        let primitive = if context.get(WaveVar::UseDots.index()) > 0.0 {
            Primitive::Points
        } else {
            Primitive::LineStrip
        };
        let batch = self.batches.push(
            primitive,
            Blend::from_flag(context.get(WaveVar::Additive.index())),
        );
        batch.thick = context.get(WaveVar::Thick.index()) > 0.0;

        let audio = &state.audio;
        let read = |channel: Channel, index: usize| {
            let index = index.min(available - 1);
            if spectrum {
                audio.spectrum(channel, index)
            } else {
                audio.waveform(channel, index)
            }
        };

        let mut smoothed = [0.0f32; 2];
        for i in 0..samples {
            let raw = [
                read(Channel::Left, i) * scaling,
                read(Channel::Right, i + sep) * scaling,
            ];
            if i == 0 {
                smoothed = raw;
            } else {
                for (value, raw) in smoothed.iter_mut().zip(raw) {
                    *value = raw * (1.0 - smoothing) + *value * smoothing;
                }
            }
            let sample = i as f64 / (samples - 1) as f64;
            let value1 = f64::from(smoothed[0]);

            context.set(WaveVar::Sample.index(), sample);
            context.set(WaveVar::Value1.index(), value1);
            context.set(WaveVar::Value2.index(), f64::from(smoothed[1]));
            context.set(WaveVar::X.index(), origin.0 + sample - 0.5);
            context.set(WaveVar::Y.index(), origin.1 + value1 * 0.5);
            for (var, value) in color_vars.iter().zip(frame_color) {
                context.set(var.index(), value);
            }

            context.execute(&self.per_point, &mut state.globals);

            let (x, y) = to_clip(
                context.get(WaveVar::X.index()) as f32,
                context.get(WaveVar::Y.index()) as f32,
            );
            let color = color_vars.map(|var| context.clamped(var.index()) as f32);
            batch.vertices.push(OverlayVertex::new(x, y, color));
        }

        self.batches.discard_empty_tail();
        self.batches.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(per_frame: &str, per_point: &str) -> (CustomWave, PresetState) {
        let mut state = PresetState::default();
        let description = WaveDescription {
            enabled: true,
            per_frame_code: per_frame.into(),
            per_point_code: per_point.into(),
            ..Default::default()
        };
        let wave = CustomWave::load(0, &description, &mut state, (8, 6)).unwrap();
        (wave, state)
    }

    #[test]
    fn one_vertex_per_sample() {
        let (mut wave, mut state) = wave("samples = 100", "");
        let batches = wave.draw(&mut state, (8, 6));

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].primitive, Primitive::LineStrip);
        let vertices = &batches[0].vertices;
        assert_eq!(vertices.len(), 100);
        assert!((vertices[0].position[0] + 1.0).abs() < 1e-6);
        assert!((vertices[99].position[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sample_count_is_clamped() {
        let (mut small, mut state) = wave("samples = 1", "");
        assert_eq!(small.draw(&mut state, (8, 6))[0].vertices.len(), 2);

        let (mut large, mut state) = wave("samples = 9999", "");
        assert_eq!(large.draw(&mut state, (8, 6))[0].vertices.len(), 512);
    }

    #[test]
    fn per_point_code_moves_points_and_sees_samples() {
        let (mut wave, mut state) = wave(
            "samples = 3; usedots = 1",
            "y = 0.5 + value1; r = sample",
        );
        state.audio.waveform_left[0] = 0.25;
        state.audio.waveform_left[1] = 0.25;
        state.audio.waveform_left[2] = 0.25;

        let batches = wave.draw(&mut state, (8, 6));
        assert_eq!(batches[0].primitive, Primitive::Points);
        let vertices = &batches[0].vertices;
        assert!((vertices[0].position[1] - -0.5).abs() < 1e-6);
        assert_eq!(vertices[2].color[0], 1.0);
        assert_eq!(vertices[1].color[0], 0.5);
    }

    #[test]
    fn per_frame_can_disable_the_wave() {
        let (mut wave, mut state) = wave("enabled = 0", "");
        assert!(wave.draw(&mut state, (8, 6)).is_empty());
    }
}
