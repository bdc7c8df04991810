//! Helper functions and common imports for integration tests.

use crate::bytecode::{Constant, FunctionBuilder, FunctionProto};
use crate::config::VmConfig;
use crate::error::{InterpretError, VmError};
use crate::events::VirtualClock;
use crate::host::BufferedIo;
use crate::opcode::OpCode;
use crate::value::Value;
use crate::vm::VM;

/// A VM wired to captured I/O and a manually driven clock
pub struct Harness {
    pub vm: VM,
    pub io: BufferedIo,
    pub clock: VirtualClock,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        let io = BufferedIo::new();
        let clock = VirtualClock::new();
        let vm = VM::with_config(config)
            .with_io(io.clone())
            .with_clock(clock.clone());
        Self { vm, io, clock }
    }

    pub fn run(&mut self, proto: &FunctionProto) -> Result<(), InterpretError> {
        self.vm.interpret(proto)
    }

    /// Run and return the runtime error the script must raise
    pub fn run_err(&mut self, proto: &FunctionProto) -> VmError {
        match self.vm.interpret(proto) {
            Err(InterpretError::Runtime { error, .. }) => error,
            other => panic!("expected a runtime error, got {:?}", other),
        }
    }

    pub fn global(&self, name: &str) -> Value {
        self.vm
            .get_global(name)
            .unwrap_or_else(|| panic!("global '{}' is not defined", name))
    }

    pub fn number(&self, name: &str) -> f64 {
        self.global(name)
            .as_number()
            .unwrap_or_else(|| panic!("global '{}' is not a number", name))
    }

    pub fn shown(&self, name: &str) -> String {
        self.vm.display(self.global(name))
    }
}

/// Assemble a top-level script; `Nil, Return` is appended
pub fn script(build: impl FnOnce(&mut FunctionBuilder)) -> FunctionProto {
    let mut b = FunctionBuilder::new("script");
    build(&mut b);
    b.op(OpCode::Nil).op(OpCode::Return);
    b.finish().expect("script assembles")
}

/// Assemble a function constant with the given arity; the body must return
pub fn function(
    name: &str,
    arity: u8,
    build: impl FnOnce(&mut FunctionBuilder),
) -> Constant {
    let mut b = FunctionBuilder::new(name).arity(arity);
    build(&mut b);
    Constant::Function(b.finish().expect("function assembles"))
}

pub fn async_function(
    name: &str,
    arity: u8,
    build: impl FnOnce(&mut FunctionBuilder),
) -> Constant {
    let mut b = FunctionBuilder::new(name).arity(arity).asynchronous();
    build(&mut b);
    Constant::Function(b.finish().expect("function assembles"))
}

/// `name = <value on top>` as a new global
pub fn define(b: &mut FunctionBuilder, name: &str) {
    b.named(OpCode::DefineGlobal, name);
}

pub fn get(b: &mut FunctionBuilder, name: &str) {
    b.named(OpCode::GetGlobal, name);
}

/// `import <name>` of a module
pub fn import(b: &mut FunctionBuilder, name: &str) {
    b.named(OpCode::ImportModule, name);
}

/// `import <name> as <alias>`
pub fn import_as(b: &mut FunctionBuilder, name: &str, alias: &str) {
    b.named(OpCode::ImportModuleAs, name);
    let alias = b.name(alias);
    b.short(alias);
}

/// `println(text)` as a statement; `std:io` must be imported
pub fn println(b: &mut FunctionBuilder, text: &str) {
    get(b, "println");
    b.string(text).op_u8(OpCode::Call, 1).op(OpCode::Pop);
}

/// Serialized bytecode, the format the default compiler loads
pub fn module_source(proto: &FunctionProto) -> String {
    serde_json::to_string(proto).expect("prototype serializes")
}
