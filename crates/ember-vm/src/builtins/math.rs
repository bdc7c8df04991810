//! Mathematical built-in functions (`std:maths`)
//!
//! This module provides:
//! - Trigonometric: sin, cos, tan, asin, acos, atan, atan2
//! - Hyperbolic: sinh, cosh, tanh, asinh, acosh, atanh
//! - Exponential/Logarithmic: exp, exp2, expm1, log, log2, log10
//! - Rounding: floor, ceil, round
//! - Other: sqrt, cbrt, abs, pow
//! - Constants: pi, e

use super::registry::BuiltinModule;
use super::utils::number_arg;
use crate::error::VmError;
use crate::value::Value;
use crate::vm::VM;

/// Native wrapping a unary `f64` function
macro_rules! unary_math_fn {
    ($name:expr, $f:expr) => {
        |vm: &mut VM, args: &[Value]| -> Result<Value, VmError> {
            let x = number_arg(vm, $name, args, 0)?;
            Ok(Value::number($f(x)))
        }
    };
}

/// Native wrapping a binary `f64` function
macro_rules! binary_math_fn {
    ($name:expr, $f:expr) => {
        |vm: &mut VM, args: &[Value]| -> Result<Value, VmError> {
            let a = number_arg(vm, $name, args, 0)?;
            let b = number_arg(vm, $name, args, 1)?;
            Ok(Value::number($f(a, b)))
        }
    };
}

pub fn module() -> BuiltinModule {
    let mut module = BuiltinModule::new();

    // Trigonometric
    module
        .register("sin", unary_math_fn!("sin", f64::sin), 1)
        .register("cos", unary_math_fn!("cos", f64::cos), 1)
        .register("tan", unary_math_fn!("tan", f64::tan), 1)
        .register("asin", unary_math_fn!("asin", f64::asin), 1)
        .register("acos", unary_math_fn!("acos", f64::acos), 1)
        .register("atan", unary_math_fn!("atan", f64::atan), 1)
        .register("atan2", binary_math_fn!("atan2", f64::atan2), 2);

    // Hyperbolic
    module
        .register("sinh", unary_math_fn!("sinh", f64::sinh), 1)
        .register("cosh", unary_math_fn!("cosh", f64::cosh), 1)
        .register("tanh", unary_math_fn!("tanh", f64::tanh), 1)
        .register("asinh", unary_math_fn!("asinh", f64::asinh), 1)
        .register("acosh", unary_math_fn!("acosh", f64::acosh), 1)
        .register("atanh", unary_math_fn!("atanh", f64::atanh), 1);

    // Exponential and Logarithmic
    module
        .register("exp", unary_math_fn!("exp", f64::exp), 1)
        .register("exp2", unary_math_fn!("exp2", f64::exp2), 1)
        .register("expm1", unary_math_fn!("expm1", f64::exp_m1), 1)
        .register("log", unary_math_fn!("log", f64::ln), 1)
        .register("log2", unary_math_fn!("log2", f64::log2), 1)
        .register("log10", unary_math_fn!("log10", f64::log10), 1);

    // Rounding
    module
        .register("floor", unary_math_fn!("floor", f64::floor), 1)
        .register("ceil", unary_math_fn!("ceil", f64::ceil), 1)
        .register("round", unary_math_fn!("round", f64::round), 1);

    // Other
    module
        .register("sqrt", unary_math_fn!("sqrt", f64::sqrt), 1)
        .register("cbrt", unary_math_fn!("cbrt", f64::cbrt), 1)
        .register("abs", unary_math_fn!("abs", f64::abs), 1)
        .register("pow", binary_math_fn!("pow", f64::powf), 2);

    module
        .constant("pi", std::f64::consts::PI)
        .constant("e", std::f64::consts::E);

    module
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Result<Value, VmError> {
        let mut vm = VM::new();
        let module = module();
        let native = module.get(name).unwrap().func;
        native(&mut vm, args)
    }

    #[test]
    fn test_unary_and_binary() {
        assert_eq!(call("sqrt", &[Value::number(16.0)]).unwrap(), Value::number(4.0));
        assert_eq!(call("floor", &[Value::number(-1.5)]).unwrap(), Value::number(-2.0));
        assert_eq!(
            call("pow", &[Value::number(2.0), Value::number(10.0)]).unwrap(),
            Value::number(1024.0)
        );
        assert_eq!(call("log", &[Value::number(1.0)]).unwrap(), Value::number(0.0));
    }

    #[test]
    fn test_rejects_non_numbers() {
        let err = call("sin", &[Value::TRUE]).unwrap_err();
        assert!(matches!(err, VmError::TypeError { .. }));
    }

    #[test]
    fn test_constants() {
        let module = module();
        let names: Vec<&str> = module.constants().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["pi", "e"]);
    }
}
