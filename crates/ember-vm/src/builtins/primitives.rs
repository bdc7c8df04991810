//! Constructors bound in the process globals of every VM

use super::registry::BuiltinModule;
use crate::error::VmError;
use crate::value::Value;
use crate::vm::VM;

pub fn globals() -> BuiltinModule {
    let mut module = BuiltinModule::new();
    module
        .register("Dictionary", new_dictionary, 0)
        .register("List", new_list, 0);
    module
}

/// Dictionary() -> empty dictionary
pub fn new_dictionary(vm: &mut VM, _args: &[Value]) -> Result<Value, VmError> {
    Ok(vm.new_dictionary())
}

/// List() -> empty array
pub fn new_list(vm: &mut VM, _args: &[Value]) -> Result<Value, VmError> {
    Ok(vm.new_array(Vec::new()))
}
