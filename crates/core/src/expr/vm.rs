use super::compiler::{CompiledProgram, Func1, Func2, Op, Slot};
use super::memory::MemoryBank;
use super::parser::BinaryOp;
use crate::state::GlobalBank;

/// Tolerance the formula language uses for equality and truthiness.
const EPSILON: f64 = 0.000_01;

/// Mutable world a program runs against.
pub struct Env<'a> {
    pub slots: &'a mut [f64],
    pub memory: &'a mut MemoryBank,
    pub globals: &'a mut GlobalBank,
    pub rng: &'a mut fastrand::Rng,
}

/// Reusable VM working memory. Create once per context and reuse it across
/// frames and vertices so execution does not touch the heap.
#[derive(Debug, Default)]
pub struct Machine {
    stack: Vec<f64>,
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sure `program` can run without growing the stack.
    pub fn reserve_for(&mut self, program: &CompiledProgram) {
        let needed = program.max_stack();
        if self.stack.capacity() < needed {
            self.stack.reserve(needed - self.stack.len());
        }
    }

    pub fn capacity(&self) -> usize {
        self.stack.capacity()
    }

    /// Runs `program` top to bottom. Arithmetic anomalies never abort
    /// execution: they produce 0 or propagate NaN/inf.
    pub fn run(&mut self, program: &CompiledProgram, env: &mut Env<'_>) {
        self.stack.clear();
        let stack = &mut self.stack;
        let ops = program.ops();
        let mut ip = 0usize;

        while ip < ops.len() {
            match ops[ip] {
                Op::Const(value) => stack.push(value),
                Op::Load(slot) => stack.push(load(env, slot)),
                Op::Store(slot) => {
                    let value = stack.last().copied().unwrap_or(0.0);
                    store(env, slot, value);
                }
                Op::LoadMem { global } => {
                    let address = pop(stack);
                    let value = if global {
                        env.globals.memory.get(address)
                    } else {
                        env.memory.get(address)
                    };
                    stack.push(value);
                }
                Op::StoreMem { global } => {
                    let value = pop(stack);
                    let address = pop(stack);
                    if global {
                        env.globals.memory.set(address, value);
                    } else {
                        env.memory.set(address, value);
                    }
                    stack.push(value);
                }
                Op::Dup => {
                    let value = stack.last().copied().unwrap_or(0.0);
                    stack.push(value);
                }
                Op::Pop => {
                    stack.pop();
                }
                Op::Neg => unary(stack, |a| -a),
                Op::Not => unary(stack, |a| flag(!truthy(a))),
                Op::Truthy => unary(stack, |a| flag(truthy(a))),
                Op::Binary(op) => {
                    let b = pop(stack);
                    let a = pop(stack);
                    stack.push(binary(op, a, b));
                }
                Op::Call1(func) => unary(stack, |a| call1(func, a)),
                Op::Call2(func) => {
                    let b = pop(stack);
                    let a = pop(stack);
                    stack.push(call2(func, a, b));
                }
                Op::Rand => {
                    let limit = pop(stack).floor();
                    let value = if limit < 1.0 {
                        env.rng.f64()
                    } else {
                        (env.rng.f64() * limit).floor()
                    };
                    stack.push(value);
                }
                Op::Jump(target) => {
                    ip = target as usize;
                    continue;
                }
                Op::JumpIfZero(target) => {
                    if !truthy(pop(stack)) {
                        ip = target as usize;
                        continue;
                    }
                }
            }
            ip += 1;
        }
    }
}

fn load(env: &Env<'_>, slot: Slot) -> f64 {
    match slot {
        Slot::Local(index) => env.slots.get(index as usize).copied().unwrap_or(0.0),
        Slot::Register(index) => env.globals.registers[usize::from(index)],
    }
}

fn store(env: &mut Env<'_>, slot: Slot, value: f64) {
    match slot {
        Slot::Local(index) => {
            if let Some(cell) = env.slots.get_mut(index as usize) {
                *cell = value;
            }
        }
        Slot::Register(index) => env.globals.registers[usize::from(index)] = value,
    }
}

fn pop(stack: &mut Vec<f64>) -> f64 {
    stack.pop().unwrap_or(0.0)
}

fn unary(stack: &mut Vec<f64>, f: impl FnOnce(f64) -> f64) {
    let a = pop(stack);
    stack.push(f(a));
}

fn truthy(value: f64) -> bool {
    value.abs() > EPSILON
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn binary(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                0.0
            } else {
                a / b
            }
        }
        BinaryOp::Mod => {
            let divisor = b as i64;
            if divisor == 0 {
                0.0
            } else {
                ((a as i64) % divisor) as f64
            }
        }
        BinaryOp::Pow => a.powf(b),
        BinaryOp::Eq => flag((a - b).abs() < EPSILON),
        BinaryOp::Ne => flag((a - b).abs() >= EPSILON),
        BinaryOp::Lt => flag(a < b),
        BinaryOp::Gt => flag(a > b),
        BinaryOp::Le => flag(a <= b),
        BinaryOp::Ge => flag(a >= b),
        BinaryOp::BitAnd => ((a as i64) & (b as i64)) as f64,
        BinaryOp::BitOr => ((a as i64) | (b as i64)) as f64,
        // Short-circuit forms are compiled to jumps; these only run if a
        // caller builds the op by hand.
        BinaryOp::And => flag(truthy(a) && truthy(b)),
        BinaryOp::Or => flag(truthy(a) || truthy(b)),
    }
}

fn call1(func: Func1, a: f64) -> f64 {
    match func {
        Func1::Sin => a.sin(),
        Func1::Cos => a.cos(),
        Func1::Tan => a.tan(),
        Func1::Asin => a.asin(),
        Func1::Acos => a.acos(),
        Func1::Atan => a.atan(),
        Func1::Sqrt => a.abs().sqrt(),
        Func1::Sqr => a * a,
        Func1::InvSqrt => {
            let root = a.abs().sqrt();
            if root == 0.0 {
                0.0
            } else {
                1.0 / root
            }
        }
        Func1::Exp => a.exp(),
        Func1::Log => a.ln(),
        Func1::Log10 => a.log10(),
        Func1::Abs => a.abs(),
        Func1::Sign => {
            if a > 0.0 {
                1.0
            } else if a < 0.0 {
                -1.0
            } else {
                0.0
            }
        }
        Func1::Floor => a.floor(),
        Func1::Ceil => a.ceil(),
        Func1::Int => a.trunc(),
        Func1::Bnot => flag(!truthy(a)),
    }
}

fn call2(func: Func2, a: f64, b: f64) -> f64 {
    match func {
        Func2::Atan2 => a.atan2(b),
        Func2::Pow => a.powf(b),
        Func2::Min => a.min(b),
        Func2::Max => a.max(b),
        Func2::Sigmoid => {
            let t = 1.0 + (-a * b).exp();
            if t.abs() > EPSILON {
                1.0 / t
            } else {
                0.0
            }
        }
        Func2::Above => flag(a > b),
        Func2::Below => flag(a < b),
        Func2::Equal => flag((a - b).abs() < EPSILON),
        Func2::Band => flag(truthy(a) && truthy(b)),
        Func2::Bor => flag(truthy(a) || truthy(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::compiler::{compile, SymbolTable};

    struct Harness {
        symbols: SymbolTable,
        slots: Vec<f64>,
        memory: MemoryBank,
        globals: GlobalBank,
        rng: fastrand::Rng,
        machine: Machine,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                symbols: SymbolTable::with_builtins(&[]),
                slots: Vec::new(),
                memory: MemoryBank::new(),
                globals: GlobalBank::default(),
                rng: fastrand::Rng::with_seed(7),
                machine: Machine::new(),
            }
        }

        fn run(&mut self, source: &str) {
            let program = compile(source, &mut self.symbols).unwrap();
            self.slots.resize(self.symbols.len(), 0.0);
            self.machine.reserve_for(&program);
            let mut env = Env {
                slots: &mut self.slots,
                memory: &mut self.memory,
                globals: &mut self.globals,
                rng: &mut self.rng,
            };
            self.machine.run(&program, &mut env);
        }

        fn get(&self, name: &str) -> f64 {
            match self.symbols.lookup(name) {
                Some(Slot::Local(index)) => self.slots[index as usize],
                Some(Slot::Register(index)) => self.globals.registers[usize::from(index)],
                None => panic!("{name} was never declared"),
            }
        }
    }

    #[test]
    fn evaluates_arithmetic_with_precedence() {
        let mut h = Harness::new();
        h.run("a = 1 + 2 * 3 ^ 2; b = -2 ^ 2; c = 7 % 3; d = (1; 2; 3) + 1");
        assert_eq!(h.get("a"), 19.0);
        assert_eq!(h.get("b"), -4.0);
        assert_eq!(h.get("c"), 1.0);
        assert_eq!(h.get("d"), 4.0);
    }

    #[test]
    fn division_by_zero_yields_zero() {
        let mut h = Harness::new();
        h.run("a = 5 / 0; b = 5 % 0; c = log(0)");
        assert_eq!(h.get("a"), 0.0);
        assert_eq!(h.get("b"), 0.0);
        assert_eq!(h.get("c"), f64::NEG_INFINITY);
    }

    #[test]
    fn conditionals_only_evaluate_taken_branch() {
        let mut h = Harness::new();
        h.run("hit = 0; x = 1 ? 10 : (hit = 1); y = if(0, hit = 2, 20); z = 0 && (hit = 3)");
        assert_eq!(h.get("x"), 10.0);
        assert_eq!(h.get("y"), 20.0);
        assert_eq!(h.get("z"), 0.0);
        assert_eq!(h.get("hit"), 0.0);
    }

    #[test]
    fn logical_operators_normalise_to_flags() {
        let mut h = Harness::new();
        h.run("a = 3 || 0; b = 2 && 5; c = !4; d = above(2, 1) + below(2, 1) + equal(1, 1.000001)");
        assert_eq!(h.get("a"), 1.0);
        assert_eq!(h.get("b"), 1.0);
        assert_eq!(h.get("c"), 0.0);
        assert_eq!(h.get("d"), 2.0);
    }

    #[test]
    fn compound_assignment_and_memory() {
        let mut h = Harness::new();
        h.run("n = 2; n *= 4; megabuf(3) = 5; megabuf(3) += 1; gmegabuf(10) = n; reg05 = megabuf(3)");
        assert_eq!(h.get("n"), 8.0);
        assert_eq!(h.memory.get(3.0), 6.0);
        assert_eq!(h.globals.memory.get(10.0), 8.0);
        assert_eq!(h.get("reg05"), 6.0);
    }

    #[test]
    fn variables_persist_between_runs() {
        let mut h = Harness::new();
        h.run("count = count + 1");
        h.run("count = count + 1");
        assert_eq!(h.get("count"), 2.0);
    }

    #[test]
    fn rand_is_reproducible_for_a_seed() {
        let mut first = Harness::new();
        let mut second = Harness::new();
        first.run("a = rand(100); b = rand(0)");
        second.run("a = rand(100); b = rand(0)");
        assert_eq!(first.get("a"), second.get("a"));
        assert!(first.get("a") < 100.0 && first.get("a").fract() == 0.0);
        assert!((0.0..1.0).contains(&first.get("b")));
    }

    #[test]
    fn stack_never_grows_past_reservation() {
        let mut h = Harness::new();
        h.run("a = sin(1 + 2 * (3 - 4 / (5 + 6)))");
        let capacity = h.machine.capacity();
        for _ in 0..100 {
            h.run("a = sin(1 + 2 * (3 - 4 / (5 + 6)))");
        }
        assert_eq!(h.machine.capacity(), capacity);
    }
}
