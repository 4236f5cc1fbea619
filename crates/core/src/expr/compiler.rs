use std::collections::HashMap;

use super::parser::{is_memory, parse, AssignOp, BinaryOp, Expr, Target, UnaryOp};
use super::vars::{Access, Builtin};
use crate::{state::REGISTER_COUNT, ExprError};

/// Where an identifier lives at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Index into the owning context's value array (builtins, `q` channels
    /// and implicitly declared variables).
    Local(u32),
    /// One of the preset-wide `reg00`..`reg99` registers.
    Register(u8),
}

/// Resolves names to slots for one evaluation context. Shared by every
/// program compiled against that context, so `init` and per-frame code see
/// the same variables.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    names: HashMap<String, u32>,
    access: Vec<Access>,
}

impl SymbolTable {
    /// Registers the builtins first so their slot index equals their table
    /// position.
    pub fn with_builtins(builtins: &[Builtin]) -> Self {
        let mut table = Self {
            names: HashMap::with_capacity(builtins.len() * 2),
            access: Vec::with_capacity(builtins.len()),
        };
        for builtin in builtins {
            table.names.insert(builtin.name.to_string(), table.access.len() as u32);
            table.access.push(builtin.access);
        }
        table
    }

    /// Resolves `name`, declaring it as a zero-initialised variable on first
    /// sight.
    pub fn resolve(&mut self, name: &str) -> Slot {
        if let Some(register) = register_index(name) {
            return Slot::Register(register);
        }
        if let Some(&index) = self.names.get(name) {
            return Slot::Local(index);
        }
        let index = self.access.len() as u32;
        self.names.insert(name.to_string(), index);
        self.access.push(Access::Output {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        });
        Slot::Local(index)
    }

    pub fn lookup(&self, name: &str) -> Option<Slot> {
        if let Some(register) = register_index(name) {
            return Some(Slot::Register(register));
        }
        self.names.get(name).map(|&index| Slot::Local(index))
    }

    /// Number of local slots, builtins included.
    pub fn len(&self) -> usize {
        self.access.len()
    }

    pub fn is_empty(&self) -> bool {
        self.access.is_empty()
    }
}

fn register_index(name: &str) -> Option<u8> {
    let digits = name.strip_prefix("reg")?;
    if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index: u8 = digits.parse().ok()?;
    (usize::from(index) < REGISTER_COUNT).then_some(index)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func1 {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sqrt,
    Sqr,
    InvSqrt,
    Exp,
    Log,
    Log10,
    Abs,
    Sign,
    Floor,
    Ceil,
    Int,
    Bnot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func2 {
    Atan2,
    Pow,
    Min,
    Max,
    Sigmoid,
    Above,
    Below,
    Equal,
    Band,
    Bor,
}

fn func1(name: &str) -> Option<Func1> {
    let func = match name {
        "sin" => Func1::Sin,
        "cos" => Func1::Cos,
        "tan" => Func1::Tan,
        "asin" => Func1::Asin,
        "acos" => Func1::Acos,
        "atan" => Func1::Atan,
        "sqrt" => Func1::Sqrt,
        "sqr" => Func1::Sqr,
        "invsqrt" => Func1::InvSqrt,
        "exp" => Func1::Exp,
        "log" => Func1::Log,
        "log10" => Func1::Log10,
        "abs" => Func1::Abs,
        "sign" => Func1::Sign,
        "floor" => Func1::Floor,
        "ceil" => Func1::Ceil,
        "int" => Func1::Int,
        "bnot" => Func1::Bnot,
        _ => return None,
    };
    Some(func)
}

fn func2(name: &str) -> Option<Func2> {
    let func = match name {
        "atan2" => Func2::Atan2,
        "pow" => Func2::Pow,
        "min" => Func2::Min,
        "max" => Func2::Max,
        "sigmoid" => Func2::Sigmoid,
        "above" => Func2::Above,
        "below" => Func2::Below,
        "equal" => Func2::Equal,
        "band" => Func2::Band,
        "bor" => Func2::Bor,
        _ => return None,
    };
    Some(func)
}

/// Stack machine instructions. Jump targets are absolute op indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Const(f64),
    Load(Slot),
    /// Writes the top of the stack without popping it.
    Store(Slot),
    /// Pops an address, pushes the cell.
    LoadMem { global: bool },
    /// Pops value and address, writes, pushes the value back.
    StoreMem { global: bool },
    Dup,
    Pop,
    Neg,
    Not,
    /// Normalises the top of the stack to 0 or 1.
    Truthy,
    Binary(BinaryOp),
    Call1(Func1),
    Call2(Func2),
    Rand,
    Jump(u32),
    JumpIfZero(u32),
}

/// Immutable result of compiling one block of formula text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledProgram {
    ops: Vec<Op>,
    max_stack: usize,
}

impl CompiledProgram {
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Deepest stack the program can reach.
    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Parses and compiles `source`, resolving identifiers through `symbols`.
pub fn compile(source: &str, symbols: &mut SymbolTable) -> Result<CompiledProgram, ExprError> {
    let statements = parse(source)?;
    let mut compiler = Compiler {
        symbols,
        ops: Vec::new(),
        depth: 0,
        max_depth: 0,
    };
    for statement in &statements {
        compiler.expr(statement)?;
        compiler.emit(Op::Pop);
    }
    Ok(CompiledProgram {
        ops: compiler.ops,
        max_stack: compiler.max_depth,
    })
}

struct Compiler<'a> {
    symbols: &'a mut SymbolTable,
    ops: Vec<Op>,
    depth: usize,
    max_depth: usize,
}

impl Compiler<'_> {
    fn emit(&mut self, op: Op) -> usize {
        let (pops, pushes) = match op {
            Op::Const(_) | Op::Load(_) => (0, 1),
            Op::Store(_) => (1, 1),
            Op::LoadMem { .. } => (1, 1),
            Op::StoreMem { .. } => (2, 1),
            Op::Dup => (1, 2),
            Op::Pop => (1, 0),
            Op::Neg | Op::Not | Op::Truthy | Op::Call1(_) | Op::Rand => (1, 1),
            Op::Binary(_) | Op::Call2(_) => (2, 1),
            Op::Jump(_) => (0, 0),
            Op::JumpIfZero(_) => (1, 0),
        };
        self.depth = self.depth.saturating_sub(pops) + pushes;
        self.max_depth = self.max_depth.max(self.depth);
        self.ops.push(op);
        self.ops.len() - 1
    }

    fn here(&self) -> u32 {
        self.ops.len() as u32
    }

    fn patch(&mut self, at: usize, target: u32) {
        match &mut self.ops[at] {
            Op::Jump(dest) | Op::JumpIfZero(dest) => *dest = target,
            _ => unreachable!("patched op is not a jump"),
        }
    }

    /// Compiles `cond ? then : otherwise`; each branch must leave one value.
    fn branch(
        &mut self,
        cond: &Expr,
        then: impl FnOnce(&mut Self) -> Result<(), ExprError>,
        otherwise: impl FnOnce(&mut Self) -> Result<(), ExprError>,
    ) -> Result<(), ExprError> {
        self.expr(cond)?;
        let to_else = self.emit(Op::JumpIfZero(0));
        then(self)?;
        let to_end = self.emit(Op::Jump(0));
        // Only one branch runs; the else branch starts from the same depth.
        self.depth -= 1;
        let else_start = self.here();
        self.patch(to_else, else_start);
        otherwise(self)?;
        let end = self.here();
        self.patch(to_end, end);
        Ok(())
    }

    fn truthy(&mut self, expr: &Expr) -> Result<(), ExprError> {
        self.expr(expr)?;
        self.emit(Op::Truthy);
        Ok(())
    }

    fn constant(&mut self, value: f64) -> Result<(), ExprError> {
        self.emit(Op::Const(value));
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), ExprError> {
        match expr {
            Expr::Number(value) => {
                self.emit(Op::Const(*value));
            }
            Expr::Var(name) => {
                let slot = self.symbols.resolve(name);
                self.emit(Op::Load(slot));
            }
            Expr::Unary(op, operand) => {
                self.expr(operand)?;
                self.emit(match op {
                    UnaryOp::Neg => Op::Neg,
                    UnaryOp::Not => Op::Not,
                });
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                self.branch(lhs, |c| c.truthy(rhs), |c| c.constant(0.0))?;
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                self.branch(lhs, |c| c.constant(1.0), |c| c.truthy(rhs))?;
            }
            Expr::Binary(op, lhs, rhs) => {
                self.expr(lhs)?;
                self.expr(rhs)?;
                self.emit(Op::Binary(*op));
            }
            Expr::Ternary(cond, then, otherwise) => {
                self.branch(cond, |c| c.expr(then), |c| c.expr(otherwise))?;
            }
            Expr::Call(name, args) => self.call(name, args)?,
            Expr::Assign { target, op, value } => self.assign(target, *op, value)?,
            Expr::Sequence(items) => {
                let Some((last, init)) = items.split_last() else {
                    self.emit(Op::Const(0.0));
                    return Ok(());
                };
                for item in init {
                    self.expr(item)?;
                    self.emit(Op::Pop);
                }
                self.expr(last)?;
            }
        }
        Ok(())
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> Result<(), ExprError> {
        let arity = |expected: usize| {
            if args.len() == expected {
                Ok(())
            } else {
                Err(ExprError::Arity {
                    name: name.to_string(),
                    expected,
                    found: args.len(),
                })
            }
        };

        if name == "if" {
            arity(3)?;
            return self.branch(&args[0], |c| c.expr(&args[1]), |c| c.expr(&args[2]));
        }
        if is_memory(name) {
            arity(1)?;
            self.expr(&args[0])?;
            self.emit(Op::LoadMem {
                global: name == "gmegabuf",
            });
            return Ok(());
        }
        if name == "rand" {
            arity(1)?;
            self.expr(&args[0])?;
            self.emit(Op::Rand);
            return Ok(());
        }
        if let Some(func) = func1(name) {
            arity(1)?;
            self.expr(&args[0])?;
            self.emit(Op::Call1(func));
            return Ok(());
        }
        if let Some(func) = func2(name) {
            arity(2)?;
            self.expr(&args[0])?;
            self.expr(&args[1])?;
            self.emit(Op::Call2(func));
            return Ok(());
        }
        Err(ExprError::UnknownFunction(name.to_string()))
    }

    fn assign(&mut self, target: &Target, op: AssignOp, value: &Expr) -> Result<(), ExprError> {
        match target {
            Target::Var(name) => {
                let slot = self.symbols.resolve(name);
                if let AssignOp::Apply(binary) = op {
                    self.emit(Op::Load(slot));
                    self.expr(value)?;
                    self.emit(Op::Binary(binary));
                } else {
                    self.expr(value)?;
                }
                self.emit(Op::Store(slot));
            }
            Target::Memory { global, index } => {
                let global = *global;
                self.expr(index)?;
                if let AssignOp::Apply(binary) = op {
                    self.emit(Op::Dup);
                    self.emit(Op::LoadMem { global });
                    self.expr(value)?;
                    self.emit(Op::Binary(binary));
                } else {
                    self.expr(value)?;
                }
                self.emit(Op::StoreMem { global });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::vars::FrameVar;

    #[test]
    fn builtins_keep_their_table_index() {
        let mut symbols = SymbolTable::with_builtins(FrameVar::TABLE);
        assert_eq!(
            symbols.resolve("gamma"),
            Slot::Local(FrameVar::Gamma.index() as u32)
        );
    }

    #[test]
    fn unknown_names_become_new_locals() {
        let mut symbols = SymbolTable::with_builtins(FrameVar::TABLE);
        let before = symbols.len();
        let program = compile("my_var = my_var + 1; other = 2", &mut symbols).unwrap();

        assert_eq!(symbols.len(), before + 2);
        assert_eq!(symbols.lookup("my_var"), Some(Slot::Local(before as u32)));
        assert!(!program.is_empty());
    }

    #[test]
    fn registers_bypass_the_local_table() {
        let mut symbols = SymbolTable::with_builtins(&[]);
        assert_eq!(symbols.resolve("reg07"), Slot::Register(7));
        assert_eq!(symbols.resolve("reg99"), Slot::Register(99));
        // Not a register name, so it becomes an ordinary variable.
        assert_eq!(symbols.resolve("reg100"), Slot::Local(0));
        assert!(!symbols.is_empty());
    }

    #[test]
    fn tracks_stack_depth() {
        let mut symbols = SymbolTable::with_builtins(&[]);
        let program = compile("a = 1 + 2 * (3 + 4)", &mut symbols).unwrap();
        assert_eq!(program.max_stack(), 4);
    }

    #[test]
    fn rejects_unknown_functions_and_bad_arity() {
        let mut symbols = SymbolTable::with_builtins(&[]);
        assert_eq!(
            compile("loop(3, a)", &mut symbols).unwrap_err(),
            ExprError::UnknownFunction("loop".into())
        );
        assert!(matches!(
            compile("sin(1, 2)", &mut symbols).unwrap_err(),
            ExprError::Arity { expected: 1, found: 2, .. }
        ));
    }
}
