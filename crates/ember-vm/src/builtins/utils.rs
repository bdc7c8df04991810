//! Argument helpers shared by the natives
//!
//! The VM enforces declared arity before a native runs, but natives can
//! also be invoked directly by a host, so every access is still checked.

use crate::error::VmError;
use crate::object::ObjKind;
use crate::value::{ObjRef, Value};
use crate::vm::VM;

/// Argument `index`, or a runtime error naming the native
pub fn arg(name: &str, args: &[Value], index: usize) -> Result<Value, VmError> {
    args.get(index).copied().ok_or_else(|| {
        VmError::Runtime(format!(
            "{}() expects at least {} arguments, got {}",
            name,
            index + 1,
            args.len()
        ))
    })
}

pub fn number_arg(vm: &VM, name: &str, args: &[Value], index: usize) -> Result<f64, VmError> {
    let value = arg(name, args, index)?;
    value
        .as_number()
        .ok_or_else(|| VmError::type_error(name, "number", vm.heap().type_name(value)))
}

pub fn string_arg<'vm>(
    vm: &'vm VM,
    name: &str,
    args: &[Value],
    index: usize,
) -> Result<&'vm str, VmError> {
    let value = arg(name, args, index)?;
    vm.heap()
        .as_str(value)
        .ok_or_else(|| VmError::type_error(name, "string", vm.heap().type_name(value)))
}

/// Handle of an object argument of the given kind
pub fn object_arg(
    vm: &VM,
    name: &str,
    args: &[Value],
    index: usize,
    kind: ObjKind,
) -> Result<ObjRef, VmError> {
    let value = arg(name, args, index)?;
    match value.as_object() {
        Some(r) if vm.heap().kind(r)? == kind => Ok(r),
        _ => Err(VmError::type_error(
            name,
            kind.name(),
            vm.heap().type_name(value),
        )),
    }
}

/// Convert an index argument to usize, rejecting fractions and negatives
pub fn index_arg(vm: &VM, name: &str, args: &[Value], index: usize) -> Result<usize, VmError> {
    let n = number_arg(vm, name, args, index)?;
    if n < 0.0 || n.fract() != 0.0 || !n.is_finite() {
        return Err(VmError::type_error(name, "non-negative integer", &n.to_string()));
    }
    Ok(n as usize)
}
