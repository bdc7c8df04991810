//! List, subscript, slice and range instruction execution

use crate::error::VmError;
use crate::object::{ObjData, ObjRange};
use crate::opcode::OpCode;
use crate::value::Value;
use crate::vm::result::ExecutionResult;
use crate::vm::VM;

impl VM {
    /// Execute collection instructions
    pub(crate) fn execute_collections(&mut self, opcode: OpCode) -> Result<ExecutionResult, VmError> {
        match opcode {
            OpCode::CreateList => {
                let count = self.read_u16()? as usize;
                let stack = &mut self.fiber_mut()?.stack;
                let items = stack.top_slice(count)?;
                stack.truncate(stack.len() - count);
                let array = self.heap.new_array(items);
                self.push(Value::object(array))?;
            }

            OpCode::SubscriptRead => {
                let index = self.pop()?;
                let target = self.pop()?;
                let value = self.subscript_read(target, index)?;
                self.push(value)?;
            }

            OpCode::SubscriptWrite => {
                let value = self.pop()?;
                let index = self.pop()?;
                let target = self.pop()?;
                self.subscript_write(target, index, value)?;
                self.push(value)?;
            }

            OpCode::SliceArray => {
                let to = self.pop()?;
                let from = self.pop()?;
                let target = self.pop()?;
                let slice = self.slice_array(target, from, to)?;
                self.push(slice)?;
            }

            OpCode::CreateRange => {
                let to = self.pop()?;
                let from = self.pop()?;
                let (Some(from), Some(to)) = (from.as_number(), to.as_number()) else {
                    return Err(VmError::type_error(
                        "range",
                        "numbers",
                        &format!("{} and {}", from.kind_name(), to.kind_name()),
                    ));
                };
                let range = self.heap.new_range(ObjRange::new(from, to));
                self.push(Value::object(range))?;
            }

            _ => unreachable!("Non-collection opcode in collection handler"),
        }
        Ok(ExecutionResult::Continue)
    }

    fn subscript_read(&mut self, target: Value, index: Value) -> Result<Value, VmError> {
        let r = target.as_object();
        let data = match r {
            Some(r) => &self.heap.get(r)?.data,
            None => {
                return Err(VmError::type_error(
                    "subscript",
                    "array, dictionary or string",
                    target.kind_name(),
                ))
            }
        };

        match data {
            ObjData::Array(array) => {
                let i = element_index(index, array.items.len())?;
                Ok(array.items[i])
            }
            ObjData::Dictionary(dict) => match dict.entries.get(&index) {
                Some(value) => Ok(*value),
                None => Err(VmError::KeyNotFound(self.display(index))),
            },
            ObjData::String(s) => {
                let len = s.chars.chars().count();
                let i = element_index(index, len)?;
                let ch = s.chars.chars().nth(i).map(String::from).unwrap_or_default();
                Ok(Value::object(self.heap.intern(&ch)))
            }
            other => Err(VmError::type_error(
                "subscript",
                "array, dictionary or string",
                other.kind().name(),
            )),
        }
    }

    fn subscript_write(&mut self, target: Value, index: Value, value: Value) -> Result<(), VmError> {
        let Some(r) = target.as_object() else {
            return Err(VmError::type_error(
                "subscript assignment",
                "array or dictionary",
                target.kind_name(),
            ));
        };

        self.heap.mutate(r, |obj| match &mut obj.data {
            ObjData::Array(array) => {
                let i = element_index(index, array.items.len())?;
                array.items[i] = value;
                Ok(())
            }
            ObjData::Dictionary(dict) => {
                dict.entries.insert(index, value);
                Ok(())
            }
            other => Err(VmError::type_error(
                "subscript assignment",
                "array or dictionary",
                other.kind().name(),
            )),
        })?
    }

    /// New array holding `target[from..to]`
    fn slice_array(&mut self, target: Value, from: Value, to: Value) -> Result<Value, VmError> {
        let items = match target.as_object().map(|r| self.heap.array(r)) {
            Some(Ok(array)) => {
                let len = array.items.len();
                let start = slice_bound(from, len)?;
                let end = slice_bound(to, len)?;
                if start > end {
                    return Err(VmError::IndexOutOfBounds {
                        index: start as i64,
                        len: end,
                    });
                }
                array.items[start..end].to_vec()
            }
            _ => {
                return Err(VmError::type_error(
                    "slice",
                    "array",
                    self.heap.type_name(target),
                ))
            }
        };
        Ok(Value::object(self.heap.new_array(items)))
    }
}

fn integer(operation: &str, index: Value) -> Result<i64, VmError> {
    match index.as_number() {
        Some(n) if n.fract() == 0.0 => Ok(n as i64),
        Some(n) => Err(VmError::type_error(operation, "integer", &n.to_string())),
        None => Err(VmError::type_error(operation, "number", index.kind_name())),
    }
}

/// Element position for `index`; negative indices count from the end
fn element_index(index: Value, len: usize) -> Result<usize, VmError> {
    let i = integer("subscript", index)?;
    let resolved = if i < 0 { len as i64 + i } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(VmError::IndexOutOfBounds { index: i, len });
    }
    Ok(resolved as usize)
}

/// Slice bounds may equal the length
fn slice_bound(bound: Value, len: usize) -> Result<usize, VmError> {
    let i = integer("slice", bound)?;
    if i < 0 || i > len as i64 {
        return Err(VmError::IndexOutOfBounds { index: i, len });
    }
    Ok(i as usize)
}
