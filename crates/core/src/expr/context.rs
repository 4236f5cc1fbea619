use super::compiler::{compile, CompiledProgram, Slot, SymbolTable};
use super::memory::MemoryBank;
use super::vars::{Builtin, COMMON_INPUTS};
use super::vm::{Env, Machine};
use crate::{
    state::{GlobalBank, PresetState, Q_COUNT},
    ExprError,
};

/// One evaluation namespace: builtin slots, the `q1`..`q32` channels and
/// every variable its programs declare implicitly. Values persist across
/// executions; only inputs are rebound.
#[derive(Debug)]
pub struct ExprContext {
    builtins: &'static [Builtin],
    symbols: SymbolTable,
    slots: Vec<f64>,
    memory: MemoryBank,
    rng: fastrand::Rng,
    machine: Machine,
}

impl ExprContext {
    pub fn new(builtins: &'static [Builtin], seed: u64) -> Self {
        let mut symbols = SymbolTable::with_builtins(builtins);
        for q in 1..=Q_COUNT {
            symbols.resolve(&format!("q{q}"));
        }
        let mut slots: Vec<f64> = builtins.iter().map(|builtin| builtin.default).collect();
        slots.resize(symbols.len(), 0.0);

        Self {
            builtins,
            symbols,
            slots,
            memory: MemoryBank::new(),
            rng: fastrand::Rng::with_seed(seed),
            machine: Machine::new(),
        }
    }

    /// Compiles `source` against this context. New identifiers get slots
    /// immediately so the program can run without further allocation.
    pub fn compile(&mut self, source: &str) -> Result<CompiledProgram, ExprError> {
        let program = compile(source, &mut self.symbols)?;
        self.slots.resize(self.symbols.len(), 0.0);
        self.machine.reserve_for(&program);
        Ok(program)
    }

    pub fn execute(&mut self, program: &CompiledProgram, globals: &mut GlobalBank) {
        if program.is_empty() {
            return;
        }
        let mut env = Env {
            slots: &mut self.slots,
            memory: &mut self.memory,
            globals,
            rng: &mut self.rng,
        };
        self.machine.run(program, &mut env);
    }

    /// Assigns a named value, declaring the name if needed. Used for the
    /// preset's initial values.
    pub fn assign(&mut self, name: &str, value: f64, globals: &mut GlobalBank) {
        match self.symbols.resolve(&name.to_ascii_lowercase()) {
            Slot::Local(index) => {
                self.slots.resize(self.symbols.len(), 0.0);
                self.slots[index as usize] = value;
            }
            Slot::Register(index) => globals.registers[usize::from(index)] = value,
        }
    }

    pub fn get(&self, index: usize) -> f64 {
        self.slots[index]
    }

    pub fn set(&mut self, index: usize, value: f64) {
        self.slots[index] = value;
    }

    /// Value of a builtin with its declared range applied.
    pub fn clamped(&self, index: usize) -> f64 {
        self.builtins[index].clamp(self.slots[index])
    }

    /// Reads any declared variable by name.
    pub fn lookup(&self, name: &str, globals: &GlobalBank) -> Option<f64> {
        match self.symbols.lookup(&name.to_ascii_lowercase())? {
            Slot::Local(index) => self.slots.get(index as usize).copied(),
            Slot::Register(index) => Some(globals.registers[usize::from(index)]),
        }
    }

    /// Builtins followed by the `q` channels.
    pub fn fixed_len(&self) -> usize {
        self.builtins.len() + Q_COUNT
    }

    pub fn fixed_slots(&self) -> &[f64] {
        &self.slots[..self.fixed_len()]
    }

    /// Restores builtins and `q` channels from a snapshot taken with
    /// [`ExprContext::fixed_slots`].
    pub fn restore_fixed(&mut self, snapshot: &[f64]) {
        let len = self.fixed_len().min(snapshot.len());
        self.slots[..len].copy_from_slice(&snapshot[..len]);
    }

    pub fn q(&self) -> &[f64] {
        let start = self.builtins.len();
        &self.slots[start..start + Q_COUNT]
    }

    pub fn set_q(&mut self, values: &[f64; Q_COUNT]) {
        let start = self.builtins.len();
        self.slots[start..start + Q_COUNT].copy_from_slice(values);
    }

    /// Binds the shared input block from the preset state.
    pub fn bind_common_inputs(&mut self, state: &PresetState, mesh: (u32, u32)) {
        let audio = &state.audio;
        let context = &state.context;
        let inputs: [f64; COMMON_INPUTS] = [
            f64::from(audio.time),
            f64::from(audio.fps),
            f64::from(audio.frame),
            f64::from(audio.progress),
            f64::from(audio.bass),
            f64::from(audio.mid),
            f64::from(audio.treb),
            f64::from(audio.bass_att),
            f64::from(audio.mid_att),
            f64::from(audio.treb_att),
            f64::from(audio.vol),
            f64::from(mesh.0),
            f64::from(mesh.1),
            f64::from(context.viewport_width),
            f64::from(context.viewport_height),
            f64::from(context.aspect_x),
            f64::from(context.aspect_y),
        ];
        self.slots[..COMMON_INPUTS].copy_from_slice(&inputs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::vars::FrameVar;

    #[test]
    fn q_channels_follow_builtins() {
        let mut globals = GlobalBank::default();
        let mut context = ExprContext::new(FrameVar::TABLE, 1);
        let program = context.compile("q3 = 7; zoom = 2").unwrap();
        context.execute(&program, &mut globals);

        assert_eq!(context.q()[2], 7.0);
        assert_eq!(context.get(FrameVar::Zoom.index()), 2.0);
        assert_eq!(context.fixed_len(), FrameVar::COUNT + Q_COUNT);
    }

    #[test]
    fn assign_declares_unknown_names() {
        let mut globals = GlobalBank::default();
        let mut context = ExprContext::new(FrameVar::TABLE, 1);
        context.assign("Custom_Value", 4.5, &mut globals);
        context.assign("reg12", 1.5, &mut globals);

        assert_eq!(context.lookup("custom_value", &globals), Some(4.5));
        assert_eq!(globals.registers[12], 1.5);
    }

    #[test]
    fn restore_leaves_user_variables_alone() {
        let mut globals = GlobalBank::default();
        let mut context = ExprContext::new(FrameVar::TABLE, 1);
        let snapshot = context.fixed_slots().to_vec();
        let program = context.compile("zoom = 3; mine = 9").unwrap();
        context.execute(&program, &mut globals);
        context.restore_fixed(&snapshot);

        assert_eq!(context.get(FrameVar::Zoom.index()), 1.0);
        assert_eq!(context.lookup("mine", &globals), Some(9.0));
    }
}
