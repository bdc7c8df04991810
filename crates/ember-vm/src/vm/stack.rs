//! Per-fiber operand stack

use crate::error::VmError;
use crate::value::Value;
use std::mem::size_of;

/// Bounded operand stack; capacity is max frames x slots per frame
#[derive(Debug, Clone)]
pub struct Stack {
    values: Vec<Value>,
    limit: usize,
}

impl Stack {
    pub fn new(limit: usize) -> Self {
        Self {
            values: Vec::new(),
            limit,
        }
    }

    #[inline]
    pub fn push(&mut self, value: Value) -> Result<(), VmError> {
        if self.values.len() >= self.limit {
            return Err(VmError::OperandStackOverflow);
        }
        self.values.push(value);
        Ok(())
    }

    #[inline]
    pub fn pop(&mut self) -> Result<Value, VmError> {
        self.values.pop().ok_or(VmError::StackUnderflow)
    }

    /// Value `distance` slots below the top (0 = top)
    #[inline]
    pub fn peek(&self, distance: usize) -> Result<Value, VmError> {
        let len = self.values.len();
        if distance >= len {
            return Err(VmError::StackUnderflow);
        }
        Ok(self.values[len - 1 - distance])
    }

    /// Overwrite the value `distance` slots below the top
    #[inline]
    pub fn set_peek(&mut self, distance: usize, value: Value) -> Result<(), VmError> {
        let len = self.values.len();
        if distance >= len {
            return Err(VmError::StackUnderflow);
        }
        self.values[len - 1 - distance] = value;
        Ok(())
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.values.get(index).copied()
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.values.get_mut(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop everything at and above `len`
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    /// Copy of the top `count` values, bottom first
    pub fn top_slice(&self, count: usize) -> Result<Vec<Value>, VmError> {
        let len = self.values.len();
        if count > len {
            return Err(VmError::StackUnderflow);
        }
        Ok(self.values[len - count..].to_vec())
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub(crate) fn footprint(&self) -> usize {
        self.values.capacity() * size_of::<Value>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_peek() {
        let mut stack = Stack::new(8);
        stack.push(Value::number(1.0)).unwrap();
        stack.push(Value::number(2.0)).unwrap();
        assert_eq!(stack.peek(0).unwrap(), Value::number(2.0));
        assert_eq!(stack.peek(1).unwrap(), Value::number(1.0));
        assert_eq!(stack.pop().unwrap(), Value::number(2.0));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_bounds_are_errors() {
        let mut stack = Stack::new(2);
        assert_eq!(stack.pop(), Err(VmError::StackUnderflow));
        assert_eq!(stack.peek(0), Err(VmError::StackUnderflow));
        stack.push(Value::NIL).unwrap();
        stack.push(Value::NIL).unwrap();
        assert_eq!(stack.push(Value::NIL), Err(VmError::OperandStackOverflow));
    }

    #[test]
    fn test_top_slice_keeps_push_order() {
        let mut stack = Stack::new(8);
        for i in 0..4 {
            stack.push(Value::number(i as f64)).unwrap();
        }
        assert_eq!(
            stack.top_slice(2).unwrap(),
            vec![Value::number(2.0), Value::number(3.0)]
        );
    }
}
