//! I/O built-in functions (`std:io`)
//!
//! Output goes through the VM's [`crate::host::IoHost`], never straight to
//! stdout, so embedders can capture it.

use super::registry::BuiltinModule;
use crate::error::VmError;
use crate::value::Value;
use crate::vm::VM;

pub fn module() -> BuiltinModule {
    let mut module = BuiltinModule::new();
    module
        .register("print", vm_print, -1)
        .register("println", vm_println, -1)
        .register("input", vm_input, 0);
    module
}

fn render(vm: &VM, args: &[Value]) -> String {
    args.iter()
        .map(|arg| vm.display(*arg))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Print values separated by spaces, without a trailing newline
pub fn vm_print(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let text = render(vm, args);
    vm.io().print(&text);
    Ok(Value::NIL)
}

/// Print values separated by spaces, then a newline
pub fn vm_println(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let mut text = render(vm, args);
    text.push('\n');
    vm.io().print(&text);
    Ok(Value::NIL)
}

/// Read one line from the host
pub fn vm_input(vm: &mut VM, _args: &[Value]) -> Result<Value, VmError> {
    let line = vm.io().read_line();
    Ok(vm.intern(&line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::BufferedIo;

    #[test]
    fn test_print_joins_with_spaces() {
        let io = BufferedIo::new();
        let mut vm = VM::new().with_io(io.clone());
        let word = vm.intern("total:");

        vm_print(&mut vm, &[word, Value::number(3.0)]).unwrap();
        vm_println(&mut vm, &[Value::TRUE, Value::NIL]).unwrap();
        vm_println(&mut vm, &[]).unwrap();

        assert_eq!(io.output(), "total: 3true nil\n\n");
    }

    #[test]
    fn test_input_reads_from_host() {
        let io = BufferedIo::new();
        io.push_input("typed");
        let mut vm = VM::new().with_io(io);
        let line = vm_input(&mut vm, &[]).unwrap();
        assert_eq!(vm.string_value(line), Some("typed"));
    }
}
