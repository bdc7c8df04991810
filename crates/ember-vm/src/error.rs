//! Error types for the VM and its compiler collaborator

use std::fmt;
use thiserror::Error;

/// VM runtime errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    /// Too many call frames on one fiber
    #[error("Stack overflow: call depth exceeded {0} frames")]
    StackOverflow(usize),

    /// Operand stack exhausted its slot budget
    #[error("Operand stack overflow")]
    OperandStackOverflow,

    /// Pop from empty stack
    #[error("Stack underflow")]
    StackUnderflow,

    /// Unknown opcode byte
    #[error("Invalid opcode: {0}")]
    InvalidOpcode(u8),

    /// Truncated operand, bad slot or jump target
    #[error("Malformed bytecode: {0}")]
    InvalidBytecode(String),

    /// Invalid constant pool index
    #[error("Invalid constant index: {0}")]
    InvalidConstant(usize),

    /// Type error during operation
    #[error("Type error in {operation}: expected {expected}, got {got}")]
    TypeError {
        operation: String,
        expected: String,
        got: String,
    },

    #[error("Undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("Undefined property '{0}'")]
    UndefinedProperty(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    /// Wrong number of arguments for a callable
    #[error("{callee} expected {expected} arguments but got {got}")]
    Arity {
        callee: String,
        expected: usize,
        got: usize,
    },

    #[error("Can only call functions and classes, got {0}")]
    NotCallable(String),

    /// Handle to an object that has already been collected
    #[error("Dangling object reference")]
    DanglingReference,

    /// Module source could not be read (or was empty)
    #[error("Cannot read file for module '{0}'")]
    ModuleNotFound(String),

    #[error("Failed to compile module '{name}': {error}")]
    ModuleCompile { name: String, error: CompileError },

    /// Runtime error with message
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl VmError {
    pub(crate) fn type_error(operation: &str, expected: &str, got: &str) -> Self {
        VmError::TypeError {
            operation: operation.to_string(),
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}

/// A single compiler report
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub line: u32,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error: {}", self.line, self.message)
    }
}

/// Compiler errors
///
/// A compiler may keep going after the first error and report several
/// independent problems from one pass; any error means no bytecode.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileError {
    pub fn new(line: u32, message: impl Into<String>) -> Self {
        Self {
            diagnostics: vec![Diagnostic {
                line,
                message: message.into(),
            }],
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Outcome of [`crate::VM::interpret`] when it does not succeed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpretError {
    #[error("{0}")]
    Compile(CompileError),

    /// Halted on a runtime error; the backtrace lists active frames innermost first
    #[error("{error}")]
    Runtime {
        error: VmError,
        backtrace: Vec<String>,
    },
}

impl InterpretError {
    /// The runtime error, if this was one
    pub fn runtime_error(&self) -> Option<&VmError> {
        match self {
            InterpretError::Runtime { error, .. } => Some(error),
            InterpretError::Compile(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_lists_every_diagnostic() {
        let err = CompileError {
            diagnostics: vec![
                Diagnostic {
                    line: 3,
                    message: "Expect ';'".into(),
                },
                Diagnostic {
                    line: 9,
                    message: "Unexpected token".into(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "[line 3] Error: Expect ';'\n[line 9] Error: Unexpected token"
        );
    }

    #[test]
    fn test_vm_error_messages() {
        assert_eq!(
            VmError::StackOverflow(64).to_string(),
            "Stack overflow: call depth exceeded 64 frames"
        );
        assert_eq!(
            VmError::type_error("add", "numbers", "bool").to_string(),
            "Type error in add: expected numbers, got bool"
        );
    }
}
