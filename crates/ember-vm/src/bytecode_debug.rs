//! Bytecode debugging utilities
//!
//! Renders instructions as text: offset, mnemonic, operands, and for
//! constant operands the constant itself. Used by the CLI's
//! `--disassemble` and by per-instruction tracing.

use crate::bytecode::{Constant, FunctionProto};
use crate::opcode::{instruction::decode_u16, OpCode, Operands};
use crate::value::format_number;
use std::fmt::Write;

/// Whether the u16 operand of `op` indexes the constant pool
fn names_constant(op: OpCode) -> bool {
    !matches!(op, OpCode::GetLocal | OpCode::SetLocal | OpCode::CreateList)
}

/// Disassemble the instruction at `offset`
///
/// `describe` renders constant `index` for the operand comments. Returns the
/// text and the offset of the next instruction.
pub fn disassemble_instruction(
    code: &[u8],
    offset: usize,
    describe: &dyn Fn(usize) -> String,
) -> (String, usize) {
    let Some(&byte) = code.get(offset) else {
        return (format!("{:04} <end of code>", offset), offset + 1);
    };
    let Some(op) = OpCode::from_u8(byte) else {
        return (format!("{:04} UNKNOWN {}", offset, byte), offset + 1);
    };

    let operands = op.operands();
    let next = offset + 1 + operands.width();
    if next > code.len() {
        return (format!("{:04} {:<16} <truncated>", offset, op.name()), code.len());
    }

    let at = offset + 1;
    let short = || decode_u16(code, at).unwrap_or(0) as usize;
    let text = match operands {
        Operands::None => format!("{:04} {}", offset, op.name()),
        Operands::Byte if op == OpCode::Constant => {
            let index = code[at] as usize;
            format!("{:04} {:<16} {:4} '{}'", offset, op.name(), index, describe(index))
        }
        Operands::Byte => format!("{:04} {:<16} {:4}", offset, op.name(), code[at]),
        Operands::Short if names_constant(op) => {
            let index = short();
            format!("{:04} {:<16} {:4} '{}'", offset, op.name(), index, describe(index))
        }
        Operands::Short => format!("{:04} {:<16} {:4}", offset, op.name(), short()),
        Operands::Jump => {
            let distance = short();
            let target = if op == OpCode::Loop {
                next.saturating_sub(distance)
            } else {
                next + distance
            };
            format!("{:04} {:<16} {:4} -> {}", offset, op.name(), distance, target)
        }
        Operands::ShortShort => {
            let name = short();
            let alias = decode_u16(code, at + 2).unwrap_or(0) as usize;
            format!(
                "{:04} {:<16} {:4} '{}' as {} '{}'",
                offset,
                op.name(),
                name,
                describe(name),
                alias,
                describe(alias)
            )
        }
        Operands::ShortByte => {
            let name = short();
            format!(
                "{:04} {:<16} ({} args) {:4} '{}'",
                offset,
                op.name(),
                code[at + 2],
                name,
                describe(name)
            )
        }
    };
    (text, next)
}

/// Listing of a whole prototype, followed by its nested functions
pub fn disassemble(proto: &FunctionProto) -> String {
    let mut out = String::new();
    disassemble_into(proto, &mut out);
    out
}

fn disassemble_into(proto: &FunctionProto, out: &mut String) {
    let _ = writeln!(out, "== {} ==", proto.name);

    let describe = |index: usize| match proto.constants.get(index) {
        Some(constant) => describe_constant(constant),
        None => "?".to_string(),
    };

    let mut offset = 0;
    let mut previous_line = None;
    while offset < proto.code.len() {
        let line = proto.line_at(offset);
        let column = match line {
            Some(line) if previous_line == Some(line) => "   |".to_string(),
            Some(line) => format!("{:4}", line),
            None => "   ?".to_string(),
        };
        previous_line = line;

        let (text, next) = disassemble_instruction(&proto.code, offset, &describe);
        let _ = writeln!(out, "{} {}", column, text);
        offset = next;
    }

    for constant in &proto.constants {
        if let Constant::Function(inner) = constant {
            out.push('\n');
            disassemble_into(inner, out);
        }
    }
}

fn describe_constant(constant: &Constant) -> String {
    match constant {
        Constant::Nil => "nil".to_string(),
        Constant::Bool(b) => b.to_string(),
        Constant::Number(n) => format_number(*n),
        Constant::String(s) => s.clone(),
        Constant::Function(f) => format!("<fn {}>", f.name),
    }
}
