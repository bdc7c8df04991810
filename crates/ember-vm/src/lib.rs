//! Ember Virtual Machine
//!
//! This crate implements a stack-based bytecode virtual machine for the Ember
//! scripting language: a dynamically typed language with classes, modules
//! and cooperative async functions.
//!
//! # Architecture
//!
//! - Values are NaN-boxed into 64 bits; objects live in an arena heap and are
//!   referenced by generation-checked handles
//! - A tracing mark-and-sweep collector runs only at safe points between
//!   instructions
//! - Every script, async call and module import runs on its own fiber; fibers
//!   are scheduled cooperatively through timers and an event queue
//!
//! # Modules
//!
//! - `value`: NaN-boxed runtime values
//! - `object`: Heap object variants
//! - `heap`: Allocator, intern table and garbage collector
//! - `opcode`: Instruction set definitions
//! - `bytecode`: Function prototypes and the bytecode assembler
//! - `bytecode_debug`: Disassembler
//! - `vm`: Virtual machine execution engine
//! - `builtins`: Native function registry and standard modules
//! - `compiler`, `host`, `events`: Collaborator seams (compiler, I/O, clock)
//! - `config`: VM configuration
//! - `error`: Error types for the VM and its compiler

#![allow(clippy::result_large_err)]

pub mod builtins;
pub mod bytecode;
pub mod bytecode_debug;
pub mod compiler;
pub mod config;
pub mod error;
pub mod events;
pub mod heap;
pub mod host;
pub mod object;
pub mod opcode;
pub mod value;
pub mod vm;

// Re-export main types
pub use builtins::registry::{BuiltinModule, NativeFn};
pub use bytecode::{Constant, FunctionBuilder, FunctionProto};
pub use bytecode_debug::disassemble;
pub use compiler::{BytecodeCompiler, ScriptCompiler};
pub use config::VmConfig;
pub use error::{CompileError, Diagnostic, InterpretError, VmError};
pub use events::{Clock, SystemClock, VirtualClock};
pub use heap::GcStats;
pub use host::{BufferedIo, IoHost, StdIo};
pub use opcode::OpCode;
pub use value::Value;
pub use vm::VM;

#[cfg(test)]
mod tests;
