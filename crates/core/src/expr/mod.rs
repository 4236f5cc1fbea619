//! Preset formula language: lexing, parsing, compilation to a slot-addressed
//! stack program and execution against preset state.

pub mod compiler;
pub mod context;
pub mod frame;
pub mod lexer;
pub mod memory;
pub mod parser;
pub mod pixel;
pub mod vars;
pub mod vm;

pub use compiler::{CompiledProgram, Slot, SymbolTable};
pub use context::ExprContext;
pub use frame::PerFrameEvaluator;
pub use memory::MemoryBank;
pub use pixel::{PerPixelEvaluator, WarpParams};
pub use vars::{Access, Builtin, FrameVar, PixelVar, ShapeVar, WaveVar};
