//! Built-in functions module
//!
//! Natives are organised by the import name they are registered under:
//! - `std:io`: print, println, input
//! - `std:maths`: trigonometric, exponential and rounding functions, pi, e
//! - `std:time`: wall clock and VM clock
//! - `std:json`: parse and stringify
//! - `std:filesystem`: host file access
//!
//! Primitive constructors live in the process globals, and the per-kind
//! intrinsic methods are installed on the VM's intrinsic registry.

pub mod collections;
pub mod encoding;
pub mod filesystem;
pub mod io;
pub mod math;
pub mod primitives;
pub mod registry;
pub mod time;
pub mod utils;

use crate::object::ObjKind;
use registry::{BuiltinModule, BuiltinRegistry};

/// Create and populate the importable module registry
pub fn create_builtin_registry() -> BuiltinRegistry {
    let mut registry = BuiltinRegistry::new();
    registry.insert("std:io", io::module());
    registry.insert("std:maths", math::module());
    registry.insert("std:time", time::module());
    registry.insert("std:json", encoding::module());
    registry.insert("std:filesystem", filesystem::module());
    registry
}

/// Intrinsic method sets per built-in object kind
pub fn create_intrinsics() -> Vec<(ObjKind, BuiltinModule)> {
    vec![
        (ObjKind::Array, collections::array_methods()),
        (ObjKind::Range, collections::range_methods()),
        (ObjKind::Dictionary, collections::dictionary_methods()),
        (ObjKind::String, collections::string_methods()),
    ]
}
