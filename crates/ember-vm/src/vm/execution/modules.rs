//! Module import
//!
//! Built-in names (`std:io`, ...) bind their natives synchronously. Any
//! other name is a user module: its source is read through the host,
//! compiled, and run on a child fiber. When that fiber returns, the module
//! object holding its globals is bound in the importer's scope and in the
//! process globals.

use crate::error::VmError;
use crate::object::{FiberKind, ObjKind};
use crate::opcode::OpCode;
use crate::value::{ObjRef, Value};
use crate::vm::result::ExecutionResult;
use crate::vm::VM;
use tracing::debug;

impl VM {
    /// Execute module import instructions
    pub(crate) fn execute_modules(&mut self, opcode: OpCode) -> Result<ExecutionResult, VmError> {
        match opcode {
            OpCode::ImportModule => {
                let name = self.read_name()?;
                self.import_module(name, None)
            }

            OpCode::ImportModuleAs => {
                let name = self.read_name()?;
                let alias = self.read_name()?;
                self.import_module(name, Some(alias))
            }

            _ => unreachable!("Non-module opcode in module handler"),
        }
    }

    fn import_module(
        &mut self,
        name: ObjRef,
        alias: Option<ObjRef>,
    ) -> Result<ExecutionResult, VmError> {
        let text = self.name_text(name);
        if self.builtins.contains(&text) {
            self.import_builtin(&text, alias)?;
            return Ok(ExecutionResult::Continue);
        }

        let key = alias.unwrap_or(name);
        if self.modules.contains_key(&key) {
            debug!(module = %text, "module already imported");
            return Ok(ExecutionResult::Continue);
        }

        let path = format!("{}{}", text, self.config.module_extension);
        let source = self.io.read_file(&path);
        if source.is_empty() {
            return Err(VmError::ModuleNotFound(path));
        }
        let proto = self
            .compiler
            .compile(&source)
            .map_err(|error| VmError::ModuleCompile {
                name: text.clone(),
                error,
            })?;

        let scope = self.current_scope()?;
        let module = self.heap.new_module(key, scope);
        self.modules.insert(key, Value::object(module));
        self.module_stack.push(module);

        let function = self.load_function(&proto, Some(module));
        let fiber = self.new_fiber(FiberKind::Module, function, &[], Some(module))?;
        debug!(module = %text, ?fiber, "running module");
        self.resume_fiber(fiber)?;
        Ok(ExecutionResult::Suspended)
    }

    /// Bind a native module's functions and constants into the importer's
    /// scope, or into a module object named by `alias`
    fn import_builtin(&mut self, name: &str, alias: Option<ObjRef>) -> Result<(), VmError> {
        let Some(module) = self.builtins.get(name).cloned() else {
            return Err(VmError::ModuleNotFound(name.to_string()));
        };
        let importer = self.current_scope()?;

        let target = match alias {
            Some(alias) => {
                let existing = self
                    .modules
                    .get(&alias)
                    .and_then(|value| value.as_object())
                    .filter(|r| matches!(self.heap.kind(*r), Ok(ObjKind::Module)));
                let object = match existing {
                    Some(object) => object,
                    None => {
                        let object = self.heap.new_module(alias, importer);
                        self.modules.insert(alias, Value::object(object));
                        object
                    }
                };
                self.define_in_scope(importer, alias, Value::object(object))?;
                Some(object)
            }
            None => importer,
        };

        for function in module.functions() {
            let native = self.new_native(&function.name, function.func, function.arity);
            let key = self.heap.intern(&function.name);
            self.define_in_scope(target, key, native)?;
        }
        for (constant, value) in module.constants() {
            let key = self.heap.intern(constant);
            self.define_in_scope(target, key, Value::number(*value))?;
        }
        debug!(module = name, entries = module.len(), "imported native module");
        Ok(())
    }

    /// A module fiber returned: expose its globals
    pub(crate) fn complete_module(&mut self, module: ObjRef) -> Result<(), VmError> {
        self.module_stack.retain(|m| *m != module);
        let (name, importer) = {
            let m = self.heap.module(module)?;
            (m.name, m.caller)
        };
        let value = Value::object(module);
        self.define_in_scope(importer, name, value)?;
        self.globals.insert(name, value);
        debug!(module = %self.name_text(name), "module loaded");
        Ok(())
    }
}
