//! Built-in function registry for the VM
//!
//! Natives are grouped into [`BuiltinModule`]s. The [`BuiltinRegistry`]
//! maps an import name such as `std:maths` to its module; importing that
//! name binds the module's functions and constants into the importer's
//! scope (or into an aliased module object).

use crate::error::VmError;
use crate::value::Value;
use crate::vm::VM;
use std::collections::HashMap;
use std::fmt;

/// Type signature for native VM functions
///
/// Takes a mutable reference to the VM and a slice of argument values,
/// returns a Result with the computed value or a VmError. Methods receive
/// their receiver as the first argument.
pub type NativeFn = fn(&mut VM, &[Value]) -> Result<Value, VmError>;

/// Metadata for a single built-in function
#[derive(Clone)]
pub struct BuiltinMetadata {
    /// Function name
    pub name: String,
    /// Function pointer
    pub func: NativeFn,
    /// Expected argument count (-1 for variadic); a method's receiver is not counted
    pub arity: i8,
}

impl fmt::Debug for BuiltinMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinMetadata")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Functions and numeric constants registered under one import name
#[derive(Debug, Clone, Default)]
pub struct BuiltinModule {
    functions: Vec<BuiltinMetadata>,
    constants: Vec<(String, f64)>,
}

impl BuiltinModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built-in function
    ///
    /// # Panics
    /// Panics if the name is already registered in this module.
    pub fn register(&mut self, name: &str, func: NativeFn, arity: i8) -> &mut Self {
        if self.get(name).is_some() {
            panic!("Built-in function '{}' already registered", name);
        }
        self.functions.push(BuiltinMetadata {
            name: name.to_string(),
            func,
            arity,
        });
        self
    }

    /// Register a number bound alongside the functions
    pub fn constant(&mut self, name: &str, value: f64) -> &mut Self {
        self.constants.push((name.to_string(), value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&BuiltinMetadata> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn functions(&self) -> &[BuiltinMetadata] {
        &self.functions
    }

    pub fn constants(&self) -> &[(String, f64)] {
        &self.constants
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.functions.len() + self.constants.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.constants.is_empty()
    }
}

/// Registry of importable native modules
#[derive(Debug, Default)]
pub struct BuiltinRegistry {
    modules: HashMap<String, BuiltinModule>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Module registered as `name`, created empty on first use
    pub fn module_mut(&mut self, name: &str) -> &mut BuiltinModule {
        self.modules.entry(name.to_string()).or_default()
    }

    /// Add or replace a whole module
    pub fn insert(&mut self, name: &str, module: BuiltinModule) {
        self.modules.insert(name.to_string(), module);
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&BuiltinModule> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Registered import names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
