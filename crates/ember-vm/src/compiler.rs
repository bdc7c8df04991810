//! Compiler collaborator seam
//!
//! The VM only needs `source text -> FunctionProto`. It calls the compiler
//! once per program and once per user-module import.

use crate::bytecode::FunctionProto;
use crate::error::CompileError;

pub trait ScriptCompiler {
    fn compile(&self, source: &str) -> Result<FunctionProto, CompileError>;
}

impl<F> ScriptCompiler for F
where
    F: Fn(&str) -> Result<FunctionProto, CompileError>,
{
    fn compile(&self, source: &str) -> Result<FunctionProto, CompileError> {
        self(source)
    }
}

/// Loads precompiled bytecode: a [`FunctionProto`] serialized as JSON
#[derive(Debug, Default, Clone, Copy)]
pub struct BytecodeCompiler;

impl ScriptCompiler for BytecodeCompiler {
    fn compile(&self, source: &str) -> Result<FunctionProto, CompileError> {
        serde_json::from_str(source).map_err(|err| {
            CompileError::new(err.line() as u32, format!("invalid bytecode: {}", err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::FunctionBuilder;
    use crate::opcode::OpCode;

    #[test]
    fn test_bytecode_compiler_reads_serialized_proto() {
        let mut b = FunctionBuilder::new("script");
        b.op(OpCode::Nil).op(OpCode::Return);
        let proto = b.finish().unwrap();
        let json = serde_json::to_string_pretty(&proto).unwrap();

        assert_eq!(BytecodeCompiler.compile(&json).unwrap(), proto);
    }

    #[test]
    fn test_bytecode_compiler_reports_line() {
        let err = BytecodeCompiler.compile("{\n  \"name\": 3\n}").unwrap_err();
        assert_eq!(err.diagnostics.len(), 1);
        assert_eq!(err.diagnostics[0].line, 2);
    }

    #[test]
    fn test_closures_are_compilers() {
        let compiler =
            |_: &str| -> Result<FunctionProto, CompileError> { Err(CompileError::new(1, "nope")) };
        assert!(compiler.compile("x").is_err());
    }
}
