//! Intrinsic methods of arrays, ranges, dictionaries and strings
//!
//! Every method receives its receiver as `args[0]`; declared arities count
//! only the arguments after it.

use super::registry::BuiltinModule;
use super::utils::{arg, number_arg, object_arg};
use crate::error::VmError;
use crate::object::{ObjData, ObjKind, ObjRange};
use crate::value::Value;
use crate::vm::VM;

pub fn array_methods() -> BuiltinModule {
    let mut module = BuiltinModule::new();
    module
        .register("length", array_length, 0)
        .register("append", array_append, 1)
        .register("pop", array_pop, 0);
    module
}

pub fn range_methods() -> BuiltinModule {
    let mut module = BuiltinModule::new();
    module
        .register("expand", range_expand, 0)
        .register("step", range_step, 1);
    module
}

pub fn dictionary_methods() -> BuiltinModule {
    let mut module = BuiltinModule::new();
    module
        .register("put", dict_put, 2)
        .register("get", dict_get, 1)
        .register("has", dict_has, 1)
        .register("remove", dict_remove, 1)
        .register("size", dict_size, 0)
        .register("keys", dict_keys, 0);
    module
}

pub fn string_methods() -> BuiltinModule {
    let mut module = BuiltinModule::new();
    module.register("length", string_length, 0);
    module
}

// ============================================================================
// Array
// ============================================================================

pub fn array_length(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let array = object_arg(vm, "length", args, 0, ObjKind::Array)?;
    Ok(Value::number(vm.heap().array(array)?.items.len() as f64))
}

/// Push in place; returns nil
pub fn array_append(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let array = object_arg(vm, "append", args, 0, ObjKind::Array)?;
    let value = arg("append", args, 1)?;
    vm.heap_mut().array_push(array, value)?;
    Ok(Value::NIL)
}

/// Remove and return the last element; nil when empty
pub fn array_pop(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let array = object_arg(vm, "pop", args, 0, ObjKind::Array)?;
    let popped = vm.heap_mut().mutate(array, |obj| match &mut obj.data {
        ObjData::Array(a) => a.items.pop(),
        _ => None,
    })?;
    Ok(popped.unwrap_or(Value::NIL))
}

// ============================================================================
// Range
// ============================================================================

/// Materialise every value the range visits
pub fn range_expand(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let range = object_arg(vm, "expand", args, 0, ObjKind::Range)?;
    let items = vm
        .heap()
        .range(range)?
        .values()?
        .into_iter()
        .map(Value::number)
        .collect();
    Ok(vm.new_array(items))
}

/// Copy of the range advancing by `n`
pub fn range_step(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let range = object_arg(vm, "step", args, 0, ObjKind::Range)?;
    let step = number_arg(vm, "step", args, 1)?;
    if step == 0.0 || !step.is_finite() {
        return Err(VmError::Runtime(
            "range step must be a non-zero finite number".into(),
        ));
    }
    let ObjRange { from, to, .. } = vm.heap().range(range)?;
    Ok(Value::object(
        vm.heap_mut().new_range(ObjRange { from, to, step }),
    ))
}

// ============================================================================
// Dictionary
// ============================================================================

pub fn dict_put(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let dict = object_arg(vm, "put", args, 0, ObjKind::Dictionary)?;
    let key = arg("put", args, 1)?;
    let value = arg("put", args, 2)?;
    vm.heap_mut().mutate(dict, |obj| {
        if let ObjData::Dictionary(d) = &mut obj.data {
            d.entries.insert(key, value);
        }
    })?;
    Ok(Value::NIL)
}

pub fn dict_get(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let dict = object_arg(vm, "get", args, 0, ObjKind::Dictionary)?;
    let key = arg("get", args, 1)?;
    match vm.heap().dictionary(dict)?.entries.get(&key) {
        Some(value) => Ok(*value),
        None => Err(VmError::KeyNotFound(vm.display(key))),
    }
}

pub fn dict_has(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let dict = object_arg(vm, "has", args, 0, ObjKind::Dictionary)?;
    let key = arg("has", args, 1)?;
    Ok(Value::bool(
        vm.heap().dictionary(dict)?.entries.contains_key(&key),
    ))
}

/// Remove a key, returning its value (nil if absent)
pub fn dict_remove(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let dict = object_arg(vm, "remove", args, 0, ObjKind::Dictionary)?;
    let key = arg("remove", args, 1)?;
    let removed = vm.heap_mut().mutate(dict, |obj| match &mut obj.data {
        ObjData::Dictionary(d) => d.entries.remove(&key),
        _ => None,
    })?;
    Ok(removed.unwrap_or(Value::NIL))
}

pub fn dict_size(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let dict = object_arg(vm, "size", args, 0, ObjKind::Dictionary)?;
    Ok(Value::number(
        vm.heap().dictionary(dict)?.entries.len() as f64,
    ))
}

/// Keys as an array, ordered by their display text
pub fn dict_keys(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let dict = object_arg(vm, "keys", args, 0, ObjKind::Dictionary)?;
    let mut keys: Vec<(String, Value)> = vm
        .heap()
        .dictionary(dict)?
        .entries
        .keys()
        .map(|key| (vm.display(*key), *key))
        .collect();
    keys.sort_by(|a, b| a.0.cmp(&b.0));
    let items = keys.into_iter().map(|(_, key)| key).collect();
    Ok(vm.new_array(items))
}

// ============================================================================
// String
// ============================================================================

/// Length in characters
pub fn string_length(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let text = object_arg(vm, "length", args, 0, ObjKind::String)?;
    Ok(Value::number(vm.heap().string(text)?.chars().count() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_methods() {
        let mut vm = VM::new();
        let array = vm.new_array(vec![Value::number(1.0)]);

        array_append(&mut vm, &[array, Value::number(2.0)]).unwrap();
        assert_eq!(array_length(&mut vm, &[array]).unwrap(), Value::number(2.0));
        assert_eq!(array_pop(&mut vm, &[array]).unwrap(), Value::number(2.0));
        assert_eq!(array_pop(&mut vm, &[array]).unwrap(), Value::number(1.0));
        assert_eq!(array_pop(&mut vm, &[array]).unwrap(), Value::NIL);
    }

    #[test]
    fn test_range_step_and_expand() {
        let mut vm = VM::new();
        let range = Value::object(vm.heap_mut().new_range(ObjRange::new(0.0, 7.0)));
        let stepped = range_step(&mut vm, &[range, Value::number(3.0)]).unwrap();
        let expanded = range_expand(&mut vm, &[stepped]).unwrap();
        assert_eq!(vm.display(expanded), "[0, 3, 6]");
        assert!(range_step(&mut vm, &[range, Value::number(0.0)]).is_err());
    }

    #[test]
    fn test_expand_rejects_ranges_that_cannot_be_materialised() {
        let mut vm = VM::new();
        let big = 2f64.powi(53);
        let stalled = Value::object(vm.heap_mut().new_range(ObjRange::new(big, big + 4.0)));
        assert!(matches!(
            range_expand(&mut vm, &[stalled]),
            Err(VmError::Runtime(_))
        ));
        let huge = Value::object(vm.heap_mut().new_range(ObjRange::new(0.0, 1e12)));
        assert!(range_expand(&mut vm, &[huge]).is_err());
    }

    #[test]
    fn test_dictionary_methods() {
        let mut vm = VM::new();
        let dict = vm.new_dictionary();
        let b = vm.intern("b");
        let a = vm.intern("a");

        dict_put(&mut vm, &[dict, b, Value::number(2.0)]).unwrap();
        dict_put(&mut vm, &[dict, a, Value::number(1.0)]).unwrap();
        assert_eq!(dict_get(&mut vm, &[dict, a]).unwrap(), Value::number(1.0));
        assert_eq!(dict_has(&mut vm, &[dict, b]).unwrap(), Value::TRUE);
        assert_eq!(dict_size(&mut vm, &[dict]).unwrap(), Value::number(2.0));

        let keys = dict_keys(&mut vm, &[dict]).unwrap();
        assert_eq!(vm.display(keys), "[a, b]");

        assert_eq!(dict_remove(&mut vm, &[dict, b]).unwrap(), Value::number(2.0));
        assert!(matches!(
            dict_get(&mut vm, &[dict, b]),
            Err(VmError::KeyNotFound(key)) if key == "b"
        ));
    }

    #[test]
    fn test_string_length_counts_chars() {
        let mut vm = VM::new();
        let text = vm.intern("héllo");
        assert_eq!(string_length(&mut vm, &[text]).unwrap(), Value::number(5.0));
    }
}
