//! Value operation helpers

use crate::error::VmError;
use crate::heap::Heap;
use crate::object::ObjData;
use crate::value::{format_number, ObjRef, Value};
use std::collections::HashSet;
use crate::vm::VM;

/// Nesting depth after which display stops descending
const MAX_DEPTH: usize = 32;

/// Numeric operations that never touch the heap
pub(crate) struct ValueOperations;

impl ValueOperations {
    fn numbers(operation: &str, left: Value, right: Value) -> Result<(f64, f64), VmError> {
        match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(VmError::type_error(
                operation,
                "numbers",
                &format!("{} and {}", left.kind_name(), right.kind_name()),
            )),
        }
    }

    pub(crate) fn sub_values(left: Value, right: Value) -> Result<Value, VmError> {
        let (a, b) = Self::numbers("subtraction", left, right)?;
        Ok(Value::number(a - b))
    }

    pub(crate) fn mul_values(left: Value, right: Value) -> Result<Value, VmError> {
        let (a, b) = Self::numbers("multiplication", left, right)?;
        Ok(Value::number(a * b))
    }

    pub(crate) fn div_values(left: Value, right: Value) -> Result<Value, VmError> {
        let (a, b) = Self::numbers("division", left, right)?;
        Ok(Value::number(a / b))
    }

    pub(crate) fn pow_values(left: Value, right: Value) -> Result<Value, VmError> {
        let (a, b) = Self::numbers("exponentiation", left, right)?;
        Ok(Value::number(a.powf(b)))
    }

    /// Remainder with the sign of the dividend
    pub(crate) fn mod_values(left: Value, right: Value) -> Result<Value, VmError> {
        let (a, b) = Self::numbers("modulo", left, right)?;
        Ok(Value::number(a % b))
    }

    pub(crate) fn neg_value(value: Value) -> Result<Value, VmError> {
        value
            .as_number()
            .map(|n| Value::number(-n))
            .ok_or_else(|| VmError::type_error("negation", "number", value.kind_name()))
    }

    pub(crate) fn step_value(value: Value, delta: f64) -> Result<Value, VmError> {
        value
            .as_number()
            .map(|n| Value::number(n + delta))
            .ok_or_else(|| VmError::type_error("increment", "number", value.kind_name()))
    }

    pub(crate) fn lt_values(left: Value, right: Value) -> Result<Value, VmError> {
        let (a, b) = Self::numbers("comparison", left, right)?;
        Ok(Value::bool(a < b))
    }

    pub(crate) fn gt_values(left: Value, right: Value) -> Result<Value, VmError> {
        let (a, b) = Self::numbers("comparison", left, right)?;
        Ok(Value::bool(a > b))
    }
}

/// Equality: bit identity, plus element-wise comparison of arrays
///
/// Nested arrays are compared from an explicit worklist of pairs. A pair
/// already on the worklist is assumed equal, so cyclic arrays terminate.
pub fn values_equal(heap: &Heap, left: Value, right: Value) -> bool {
    let mut pending = vec![(left, right)];
    let mut visited: HashSet<(ObjRef, ObjRef)> = HashSet::new();

    while let Some((left, right)) = pending.pop() {
        if left == right {
            continue;
        }
        let (Some(a), Some(b)) = (left.as_object(), right.as_object()) else {
            return false;
        };
        if !visited.insert((a, b)) {
            continue;
        }
        match (heap.get(a).map(|o| &o.data), heap.get(b).map(|o| &o.data)) {
            (Ok(ObjData::Array(x)), Ok(ObjData::Array(y))) => {
                if x.items.len() != y.items.len() {
                    return false;
                }
                pending.extend(x.items.iter().copied().zip(y.items.iter().copied()));
            }
            _ => return false,
        }
    }
    true
}

/// Human-readable rendering used by printing and string interpolation
pub fn display_value(heap: &Heap, value: Value) -> String {
    let mut out = String::new();
    write_value(heap, value, &mut out, 0);
    out
}

fn write_value(heap: &Heap, value: Value, out: &mut String, depth: usize) {
    if let Some(n) = value.as_number() {
        out.push_str(&format_number(n));
        return;
    }
    if let Some(b) = value.as_bool() {
        out.push_str(if b { "true" } else { "false" });
        return;
    }
    let Some(r) = value.as_object() else {
        out.push_str("nil");
        return;
    };
    let Ok(obj) = heap.get(r) else {
        out.push_str("<dangling>");
        return;
    };
    if depth >= MAX_DEPTH {
        out.push_str("...");
        return;
    }

    match &obj.data {
        ObjData::String(s) => out.push_str(&s.chars),
        ObjData::Array(array) => {
            out.push('[');
            for (i, item) in array.items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(heap, *item, out, depth + 1);
            }
            out.push(']');
        }
        ObjData::Range(range) => {
            out.push_str(&format_number(range.from));
            out.push_str("..");
            out.push_str(&format_number(range.to));
            if range.step != 1.0 {
                out.push_str(" by ");
                out.push_str(&format_number(range.step));
            }
        }
        ObjData::Dictionary(dict) => {
            // hash order is unstable, sort by rendered key
            let mut entries: Vec<(String, Value)> = dict
                .entries
                .iter()
                .map(|(k, v)| (display_value(heap, *k), *v))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&key);
                out.push_str(": ");
                write_value(heap, item, out, depth + 1);
            }
            out.push('}');
        }
        ObjData::Function(function) => {
            let name = heap.string(function.name).unwrap_or("?");
            out.push_str(&format!("<fn {}>", name));
        }
        ObjData::Native(native) => out.push_str(&format!("<native fn {}>", native.name)),
        ObjData::Class(class) => out.push_str(heap.string(class.name).unwrap_or("?")),
        ObjData::Instance(instance) => {
            let class_name = heap
                .get(instance.class)
                .ok()
                .and_then(|c| match &c.data {
                    ObjData::Class(class) => heap.string(class.name).ok(),
                    _ => None,
                })
                .unwrap_or("?");
            out.push_str(&format!("{} instance", class_name));
        }
        ObjData::BoundMethod(bound) => {
            write_value(heap, Value::object(bound.method), out, depth + 1);
        }
        ObjData::Module(module) => {
            let name = heap.string(module.name).unwrap_or("?");
            out.push_str(&format!("<module {}>", name));
        }
        ObjData::Fiber(_) => out.push_str("<fiber>"),
        ObjData::UserData(_) => out.push_str("<userdata>"),
    }
}

impl VM {
    /// ADD: numbers, string concatenation, in-place array append
    pub(crate) fn add_values(&mut self, left: Value, right: Value) -> Result<Value, VmError> {
        if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
            return Ok(Value::number(a + b));
        }

        if let (Some(a), Some(b)) = (self.heap.as_str(left), self.heap.as_str(right)) {
            let joined = format!("{}{}", a, b);
            return Ok(Value::object(self.heap.intern(&joined)));
        }

        if let Some(target) = left
            .as_object()
            .filter(|r| matches!(self.heap.get(*r).map(|o| &o.data), Ok(ObjData::Array(_))))
        {
            let appended = match right.as_object().map(|r| self.heap.array(r)) {
                Some(Ok(other)) => other.items.clone(),
                _ => vec![right],
            };
            self.heap.mutate(target, |obj| {
                if let ObjData::Array(array) = &mut obj.data {
                    array.items.extend(appended);
                }
            })?;
            return Ok(left);
        }

        Err(VmError::type_error(
            "addition",
            "numbers, strings or an array",
            &format!(
                "{} and {}",
                self.heap.type_name(left),
                self.heap.type_name(right)
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjRange;

    #[test]
    fn test_numeric_ops() {
        let two = Value::number(2.0);
        let three = Value::number(3.0);
        assert_eq!(ValueOperations::pow_values(two, three).unwrap(), Value::number(8.0));
        assert_eq!(
            ValueOperations::mod_values(Value::number(-7.0), three).unwrap(),
            Value::number(-1.0)
        );
        assert_eq!(ValueOperations::lt_values(two, three).unwrap(), Value::TRUE);
        assert!(ValueOperations::sub_values(two, Value::NIL).is_err());
    }

    #[test]
    fn test_arrays_compare_by_contents() {
        let mut heap = Heap::new();
        let a = heap.new_array(vec![Value::number(1.0), Value::TRUE]);
        let b = heap.new_array(vec![Value::number(1.0), Value::TRUE]);
        let c = heap.new_array(vec![Value::number(1.0)]);
        assert!(values_equal(&heap, Value::object(a), Value::object(b)));
        assert!(!values_equal(&heap, Value::object(a), Value::object(c)));
        assert!(!values_equal(&heap, Value::number(0.0), Value::number(-0.0)));
    }

    #[test]
    fn test_deeply_nested_arrays_compare_by_contents() {
        let mut heap = Heap::new();
        let nested = |heap: &mut Heap, leaf: f64| {
            let mut head = heap.new_array(vec![Value::number(leaf)]);
            for _ in 0..100 {
                head = heap.new_array(vec![Value::object(head)]);
            }
            Value::object(head)
        };
        let a = nested(&mut heap, 1.0);
        let b = nested(&mut heap, 1.0);
        let c = nested(&mut heap, 2.0);
        assert!(values_equal(&heap, a, b));
        assert!(!values_equal(&heap, a, c));
    }

    #[test]
    fn test_cyclic_arrays_terminate() {
        let mut heap = Heap::new();
        let a = heap.new_array(Vec::new());
        let b = heap.new_array(Vec::new());
        heap.array_push(a, Value::object(a)).unwrap();
        heap.array_push(b, Value::object(b)).unwrap();
        assert!(values_equal(&heap, Value::object(a), Value::object(b)));

        heap.array_push(a, Value::number(1.0)).unwrap();
        heap.array_push(b, Value::number(2.0)).unwrap();
        assert!(!values_equal(&heap, Value::object(a), Value::object(b)));
    }

    #[test]
    fn test_ranges_compare_by_identity() {
        let mut heap = Heap::new();
        let a = Value::object(heap.new_range(ObjRange::new(0.0, 3.0)));
        let b = Value::object(heap.new_range(ObjRange::new(0.0, 3.0)));
        assert!(values_equal(&heap, a, a));
        assert!(!values_equal(&heap, a, b));
    }

    #[test]
    fn test_display() {
        let mut heap = Heap::new();
        let s = heap.intern("hi");
        let arr = heap.new_array(vec![Value::number(1.5), Value::object(s), Value::NIL]);
        assert_eq!(display_value(&heap, Value::object(arr)), "[1.5, hi, nil]");
        let range = heap.new_range(ObjRange::new(0.0, 4.0));
        assert_eq!(display_value(&heap, Value::object(range)), "0..4");
        assert_eq!(display_value(&heap, Value::FALSE), "false");
    }

    #[test]
    fn test_display_of_self_containing_array_terminates() {
        let mut heap = Heap::new();
        let arr = heap.new_array(Vec::new());
        heap.array_push(arr, Value::object(arr)).unwrap();
        assert!(display_value(&heap, Value::object(arr)).contains("..."));
    }
}
