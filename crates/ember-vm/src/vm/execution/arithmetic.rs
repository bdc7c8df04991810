//! Arithmetic instruction execution

use crate::error::VmError;
use crate::opcode::OpCode;
use crate::vm::ops::ValueOperations;
use crate::vm::result::ExecutionResult;
use crate::vm::VM;

impl VM {
    /// Execute arithmetic instructions
    pub(crate) fn execute_arithmetic(&mut self, opcode: OpCode) -> Result<ExecutionResult, VmError> {
        match opcode {
            OpCode::Negate => {
                let value = self.peek(0)?;
                self.set_peek(0, ValueOperations::neg_value(value)?)?;
            }

            OpCode::Increment => {
                let value = self.peek(0)?;
                self.set_peek(0, ValueOperations::step_value(value, 1.0)?)?;
            }

            OpCode::Decrement => {
                let value = self.peek(0)?;
                self.set_peek(0, ValueOperations::step_value(value, -1.0)?)?;
            }

            OpCode::Add => {
                let right = self.pop()?;
                let left = self.pop()?;
                let result = self.add_values(left, right)?;
                self.push(result)?;
            }

            OpCode::Subtract
            | OpCode::Multiply
            | OpCode::Divide
            | OpCode::Power
            | OpCode::Modulo => {
                let right = self.pop()?;
                let left = self.pop()?;
                let result = match opcode {
                    OpCode::Subtract => ValueOperations::sub_values(left, right),
                    OpCode::Multiply => ValueOperations::mul_values(left, right),
                    OpCode::Divide => ValueOperations::div_values(left, right),
                    OpCode::Power => ValueOperations::pow_values(left, right),
                    _ => ValueOperations::mod_values(left, right),
                }?;
                self.push(result)?;
            }

            _ => unreachable!("Non-arithmetic opcode in arithmetic handler"),
        }
        Ok(ExecutionResult::Continue)
    }
}
