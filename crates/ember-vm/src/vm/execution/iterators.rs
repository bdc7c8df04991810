//! For-in iteration
//!
//! The loop keeps a three-slot window on the stack: the loop variable, the
//! sequence and a cursor that starts as nil. Each ITER either stores the
//! next element in the variable and advances the cursor, or jumps past the
//! loop body once the sequence is exhausted.

use crate::error::VmError;
use crate::object::ObjData;
use crate::opcode::OpCode;
use crate::value::Value;
use crate::vm::result::ExecutionResult;
use crate::vm::VM;

impl VM {
    /// Execute iteration instructions
    pub(crate) fn execute_iterators(&mut self, opcode: OpCode) -> Result<ExecutionResult, VmError> {
        match opcode {
            OpCode::Iter => {
                let exit = self.read_u16()? as usize;
                let sequence = self.peek(1)?;
                let cursor = self.peek(0)?;

                match self.next_element(sequence, cursor)? {
                    Some((element, next)) => {
                        self.set_peek(2, element)?;
                        self.set_peek(0, next)?;
                    }
                    None => self.jump(true, exit)?,
                }
            }

            _ => unreachable!("Non-iterator opcode in iterator handler"),
        }
        Ok(ExecutionResult::Continue)
    }

    /// Element at `cursor` and the cursor after it, or `None` when exhausted
    fn next_element(&self, sequence: Value, cursor: Value) -> Result<Option<(Value, Value)>, VmError> {
        let data = match sequence.as_object() {
            Some(r) => &self.heap.get(r)?.data,
            None => {
                return Err(VmError::type_error(
                    "iteration",
                    "array or range",
                    sequence.kind_name(),
                ))
            }
        };

        match data {
            ObjData::Array(array) => {
                let index = cursor.as_number().unwrap_or(0.0) as usize;
                Ok(array
                    .items
                    .get(index)
                    .map(|element| (*element, Value::number((index + 1) as f64))))
            }
            ObjData::Range(range) => {
                let position = cursor.as_number().unwrap_or(range.from);
                if range.step == 0.0 || !range.contains(position) {
                    return Ok(None);
                }
                let next = range.advance(position)?;
                Ok(Some((Value::number(position), Value::number(next))))
            }
            other => Err(VmError::type_error(
                "iteration",
                "array or range",
                other.kind().name(),
            )),
        }
    }
}
