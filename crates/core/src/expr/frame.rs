use super::compiler::CompiledProgram;
use super::context::ExprContext;
use super::vars::FrameVar;
use crate::{preset::PresetDescription, state::PresetState, LoadError};

const PER_FRAME_SEED: u64 = 0x5eed_f4a3;

/// The preset's per-frame program together with its `init` program.
///
/// Builtins restart every frame from the preset's initial values, so an
/// assignment to a builtin inside `init` lasts only until the first frame.
/// The `q` channels restart from the values `init` left in them.
/// Implicitly declared variables and registers persist.
#[derive(Debug)]
pub struct PerFrameEvaluator {
    context: ExprContext,
    program: CompiledProgram,
    baseline: Vec<f64>,
}

impl PerFrameEvaluator {
    /// Applies the initial values, compiles both programs and runs `init`
    /// exactly once.
    pub fn load(
        description: &PresetDescription,
        state: &mut PresetState,
        mesh: (u32, u32),
    ) -> Result<Self, LoadError> {
        let mut context = ExprContext::new(FrameVar::TABLE, PER_FRAME_SEED);
        for (name, value) in &description.values {
            context.assign(name, *value, &mut state.globals);
        }

        let init = context
            .compile(&description.init_code)
            .map_err(LoadError::InitCode)?;
        let program = context
            .compile(&description.per_frame_code)
            .map_err(|source| LoadError::Expression {
                program: "per-frame",
                source,
            })?;

        context.bind_common_inputs(state, mesh);
        let mut baseline = context.fixed_slots().to_vec();
        context.execute(&init, &mut state.globals);
        let q_start = baseline.len() - context.q().len();
        baseline[q_start..].copy_from_slice(context.q());
        state.q.copy_from_slice(context.q());

        tracing::debug!(
            init_ops = init.ops().len(),
            per_frame_ops = program.ops().len(),
            "compiled per-frame code"
        );

        Ok(Self {
            context,
            program,
            baseline,
        })
    }

    /// Runs the per-frame program for the current snapshot, applies the
    /// gamma and echo-zoom clamps and publishes the `q` channels.
    pub fn evaluate(&mut self, state: &mut PresetState, mesh: (u32, u32)) {
        self.context.restore_fixed(&self.baseline);
        self.context.bind_common_inputs(state, mesh);
        self.context.execute(&self.program, &mut state.globals);

        for var in [FrameVar::Gamma, FrameVar::EchoZoom] {
            let value = self.context.clamped(var.index());
            self.context.set(var.index(), value);
        }

        state.q.copy_from_slice(self.context.q());
    }

    pub fn get(&self, var: FrameVar) -> f64 {
        self.context.get(var.index())
    }

    /// Value with the variable's declared range applied.
    pub fn clamped(&self, var: FrameVar) -> f64 {
        self.context.clamped(var.index())
    }

    pub fn value(&self, var: FrameVar) -> f32 {
        self.clamped(var) as f32
    }

    pub fn lookup(&self, name: &str, state: &PresetState) -> Option<f64> {
        self.context.lookup(name, &state.globals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(description: PresetDescription) -> (PerFrameEvaluator, PresetState) {
        let mut state = PresetState::default();
        let evaluator = PerFrameEvaluator::load(&description, &mut state, (48, 36)).unwrap();
        (evaluator, state)
    }

    #[test]
    fn gamma_and_echo_zoom_are_hard_clamped() {
        for (code, gamma, echo) in [
            ("gamma = -5; echo_zoom = 0", 0.0, 0.001),
            ("gamma = 50; echo_zoom = 5000", 8.0, 1000.0),
        ] {
            let (mut evaluator, mut state) = load(PresetDescription {
                per_frame_code: code.into(),
                ..Default::default()
            });
            evaluator.evaluate(&mut state, (48, 36));
            assert_eq!(evaluator.get(FrameVar::Gamma), gamma);
            assert_eq!(evaluator.get(FrameVar::EchoZoom), echo);
        }
    }

    #[test]
    fn other_outputs_are_stored_unclamped() {
        let (mut evaluator, mut state) = load(PresetDescription {
            per_frame_code: "decay = 3".into(),
            ..Default::default()
        });
        evaluator.evaluate(&mut state, (48, 36));
        assert_eq!(evaluator.get(FrameVar::Decay), 3.0);
        assert_eq!(evaluator.clamped(FrameVar::Decay), 1.0);
    }

    #[test]
    fn init_runs_once_and_seeds_registers() {
        let (mut evaluator, mut state) = load(PresetDescription {
            init_code: "reg00 = 10; counter = 100; q1 = 0.25".into(),
            per_frame_code: "counter = counter + 1; reg00 = reg00 + 1; q1 = q1 * 2".into(),
            ..Default::default()
        });
        assert_eq!(state.globals.registers[0], 10.0);

        evaluator.evaluate(&mut state, (48, 36));
        evaluator.evaluate(&mut state, (48, 36));

        assert_eq!(evaluator.lookup("counter", &state), Some(102.0));
        assert_eq!(state.globals.registers[0], 12.0);
        // q channels restart from their post-init value every frame.
        assert_eq!(state.q[0], 0.5);
    }

    #[test]
    fn outputs_restart_from_initial_values() {
        let mut description = PresetDescription {
            per_frame_code: "zoom = zoom + 0.1".into(),
            ..Default::default()
        };
        description.values.insert("zoom".into(), 1.5);
        let (mut evaluator, mut state) = load(description);

        evaluator.evaluate(&mut state, (48, 36));
        evaluator.evaluate(&mut state, (48, 36));
        assert!((evaluator.get(FrameVar::Zoom) - 1.6).abs() < 1e-12);
    }

    #[test]
    fn builtins_assigned_in_init_do_not_carry_over() {
        let mut description = PresetDescription {
            init_code: "zoom = 3; decay = 0.5; q2 = 7".into(),
            ..Default::default()
        };
        description.values.insert("zoom".into(), 1.25);
        let (mut evaluator, mut state) = load(description);

        evaluator.evaluate(&mut state, (48, 36));
        assert_eq!(evaluator.get(FrameVar::Zoom), 1.25);
        assert_eq!(evaluator.get(FrameVar::Decay), FrameVar::Decay.builtin().default);
        assert_eq!(state.q[1], 7.0);
    }

    #[test]
    fn inputs_follow_the_audio_snapshot() {
        let (mut evaluator, mut state) = load(PresetDescription {
            per_frame_code: "seen = bass * 2 + meshx".into(),
            ..Default::default()
        });
        state.audio.bass = 1.5;
        evaluator.evaluate(&mut state, (48, 36));
        assert_eq!(evaluator.lookup("seen", &state), Some(51.0));
    }

    #[test]
    fn syntax_errors_fail_the_load() {
        let mut state = PresetState::default();
        let init = PresetDescription {
            init_code: "a = (".into(),
            ..Default::default()
        };
        assert!(matches!(
            PerFrameEvaluator::load(&init, &mut state, (48, 36)),
            Err(LoadError::InitCode(_))
        ));

        let per_frame = PresetDescription {
            per_frame_code: "zoom = = 2".into(),
            ..Default::default()
        };
        assert!(matches!(
            PerFrameEvaluator::load(&per_frame, &mut state, (48, 36)),
            Err(LoadError::Expression { program: "per-frame", .. })
        ));
    }
}
