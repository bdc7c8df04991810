//! Filesystem built-ins (`std:filesystem`), served by the host's [`crate::host::IoHost`]

use super::registry::BuiltinModule;
use super::utils::string_arg;
use crate::error::VmError;
use crate::value::Value;
use crate::vm::VM;

pub fn module() -> BuiltinModule {
    let mut module = BuiltinModule::new();
    module
        .register("fileExists", vm_file_exists, 1)
        .register("readFile", vm_read_file, 1);
    module
}

/// Whether the host can read a non-empty file at `path`
pub fn vm_file_exists(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let path = string_arg(vm, "fileExists", args, 0)?.to_string();
    Ok(Value::bool(!vm.io().read_file(&path).is_empty()))
}

/// File contents, or nil when the file cannot be read
pub fn vm_read_file(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let path = string_arg(vm, "readFile", args, 0)?.to_string();
    let contents = vm.io().read_file(&path);
    if contents.is_empty() {
        return Ok(Value::NIL);
    }
    Ok(vm.intern(&contents))
}
