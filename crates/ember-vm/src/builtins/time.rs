//! Time built-ins (`std:time`)

use super::registry::BuiltinModule;
use crate::error::VmError;
use crate::value::Value;
use crate::vm::VM;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn module() -> BuiltinModule {
    let mut module = BuiltinModule::new();
    module
        .register("now", vm_now, 0)
        .register("clock", vm_clock, 0);
    module
}

/// Seconds since the Unix epoch
pub fn vm_now(_vm: &mut VM, _args: &[Value]) -> Result<Value, VmError> {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| VmError::Runtime(format!("system clock before epoch: {}", e)))?;
    Ok(Value::number(since_epoch.as_secs_f64()))
}

/// Seconds on the VM's timer clock
pub fn vm_clock(vm: &mut VM, _args: &[Value]) -> Result<Value, VmError> {
    Ok(Value::number(vm.now().as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::VirtualClock;
    use std::time::Duration;

    #[test]
    fn test_clock_follows_vm_clock() {
        let clock = VirtualClock::new();
        let mut vm = VM::new().with_clock(clock.clone());
        clock.advance(Duration::from_millis(1500));
        assert_eq!(vm_clock(&mut vm, &[]).unwrap(), Value::number(1.5));
    }

    #[test]
    fn test_now_is_after_2020() {
        let mut vm = VM::new();
        let now = vm_now(&mut vm, &[]).unwrap().as_number().unwrap();
        assert!(now > 1_577_836_800.0);
    }
}
