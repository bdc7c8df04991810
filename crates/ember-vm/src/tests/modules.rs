use super::helpers::*;
use crate::config::VmConfig;
use crate::error::VmError;
use crate::opcode::OpCode;
use crate::value::Value;

/// util: factor = 2 (private); export answer = 42; export double(x) = x * factor
fn util_source() -> String {
    let double = function("double", 1, |b| {
        b.op_u16(OpCode::GetLocal, 1);
        get(b, "factor");
        b.op(OpCode::Multiply).op(OpCode::Return);
    });
    let proto = script(|b| {
        get(b, "loads");
        b.op(OpCode::Increment).named(OpCode::SetGlobal, "loads").op(OpCode::Pop);
        b.number(2.0);
        define(b, "factor");
        b.number(42.0).named(OpCode::ExportGlobal, "answer");
        b.constant(double).named(OpCode::ExportGlobal, "double");
    });
    module_source(&proto)
}

fn harness_with_util() -> Harness {
    let h = Harness::new();
    h.io.add_file("util.ember", util_source());
    h
}

#[test]
fn test_user_module_import() {
    let proto = script(|b| {
        b.number(0.0);
        define(b, "loads");
        import(b, "util");
        get(b, "util");
        b.named(OpCode::GetProperty, "answer");
        define(b, "answer");
        get(b, "util");
        b.number(21.0).named(OpCode::Invoke, "double").byte(1);
        define(b, "doubled");
    });
    let mut h = harness_with_util();
    h.run(&proto).unwrap();
    assert_eq!(h.number("loads"), 1.0);
    assert_eq!(h.number("answer"), 42.0);
    assert_eq!(h.number("doubled"), 42.0);
    assert_eq!(h.shown("util"), "<module util>");
    assert_eq!(h.vm.exported_names(), &["answer".to_string(), "double".to_string()]);
    // module globals stay inside the module
    assert!(h.vm.get_global("factor").is_none());
}

#[test]
fn test_repeated_import_runs_once() {
    let proto = script(|b| {
        b.number(0.0);
        define(b, "loads");
        import(b, "util");
        import(b, "util");
    });
    let mut h = harness_with_util();
    h.run(&proto).unwrap();
    assert_eq!(h.number("loads"), 1.0);

    let again = script(|b| import(b, "util"));
    h.run(&again).unwrap();
    assert_eq!(h.number("loads"), 1.0);
}

/// inner: base = 7 (private); export getseven() = base
fn inner_source() -> String {
    let getseven = function("getseven", 0, |b| {
        get(b, "base");
        b.op(OpCode::Return);
    });
    let proto = script(|b| {
        b.number(7.0);
        define(b, "base");
        b.constant(getseven).named(OpCode::ExportGlobal, "getseven");
    });
    module_source(&proto)
}

/// outer: import inner; after_inner = inner.getseven() (private);
/// export seven = after_inner; export viaInner() = inner.getseven()
fn outer_source() -> String {
    let via_inner = function("viaInner", 0, |b| {
        get(b, "inner");
        b.named(OpCode::Invoke, "getseven").byte(0);
        b.op(OpCode::Return);
    });
    let proto = script(|b| {
        import(b, "inner");
        get(b, "inner");
        b.named(OpCode::Invoke, "getseven").byte(0);
        define(b, "after_inner");
        get(b, "after_inner");
        b.named(OpCode::ExportGlobal, "seven");
        b.constant(via_inner).named(OpCode::ExportGlobal, "viaInner");
    });
    module_source(&proto)
}

fn run_nested_import(h: &mut Harness) {
    h.io.add_file("inner.ember", inner_source());
    h.io.add_file("outer.ember", outer_source());
    let proto = script(|b| {
        import(b, "outer");
        get(b, "outer");
        b.named(OpCode::GetProperty, "seven");
        define(b, "seven");
        get(b, "outer");
        b.named(OpCode::Invoke, "viaInner").byte(0);
        define(b, "via_inner");
        get(b, "outer");
        b.named(OpCode::GetProperty, "inner");
        define(b, "inner_seen_by_outer");
    });
    h.run(&proto).unwrap();

    assert_eq!(h.number("seven"), 7.0);
    assert_eq!(h.number("via_inner"), 7.0);
    assert_eq!(h.shown("inner_seen_by_outer"), "<module inner>");
    // the enclosing module's scope is restored once the nested import returns
    assert!(h.vm.get_global("after_inner").is_none());
    assert!(h.vm.get_global("base").is_none());
}

#[test]
fn test_module_importing_a_module() {
    let mut h = Harness::new();
    run_nested_import(&mut h);
}

#[test]
fn test_nested_import_under_gc_stress() {
    let mut h = Harness::with_config(VmConfig {
        gc_stress: true,
        ..VmConfig::default()
    });
    run_nested_import(&mut h);
}

#[test]
fn test_aliased_user_import() {
    let proto = script(|b| {
        b.number(0.0);
        define(b, "loads");
        import_as(b, "util", "u");
        get(b, "u");
        b.named(OpCode::GetProperty, "answer");
        define(b, "answer");
    });
    let mut h = harness_with_util();
    h.run(&proto).unwrap();
    assert_eq!(h.number("answer"), 42.0);
    assert_eq!(h.shown("u"), "<module u>");
}

#[test]
fn test_missing_module() {
    let proto = script(|b| import(b, "nope"));
    let mut h = Harness::new();
    assert_eq!(
        h.run_err(&proto),
        VmError::ModuleNotFound("nope.ember".into())
    );
}

#[test]
fn test_module_compile_failure() {
    let proto = script(|b| import(b, "broken"));
    let mut h = Harness::new();
    h.io.add_file("broken.ember", "not bytecode");
    assert!(matches!(
        h.run_err(&proto),
        VmError::ModuleCompile { name, .. } if name == "broken"
    ));
}

#[test]
fn test_builtin_import_binds_into_scope() {
    let proto = script(|b| {
        import(b, "std:maths");
        get(b, "sqrt");
        b.number(16.0).op_u8(OpCode::Call, 1);
        define(b, "root");
        get(b, "pi");
        define(b, "pi_value");
    });
    let mut h = Harness::new();
    h.run(&proto).unwrap();
    assert_eq!(h.number("root"), 4.0);
    assert_eq!(h.number("pi_value"), std::f64::consts::PI);
}

#[test]
fn test_aliased_builtin_import() {
    let proto = script(|b| {
        import_as(b, "std:maths", "m");
        get(b, "m");
        b.number(9.0).named(OpCode::Invoke, "sqrt").byte(1);
        define(b, "root");
        get(b, "m");
        b.named(OpCode::GetProperty, "e");
        define(b, "e_value");
    });
    let mut h = Harness::new();
    h.run(&proto).unwrap();
    assert_eq!(h.number("root"), 3.0);
    assert_eq!(h.number("e_value"), std::f64::consts::E);
    assert!(h.vm.get_global("sqrt").is_none());
}

#[test]
fn test_std_io() {
    let proto = script(|b| {
        import(b, "std:io");
        println(b, "hello");
        get(b, "print");
        b.string("a").number(1.0).op_u8(OpCode::Call, 2).op(OpCode::Pop);
        get(b, "input");
        b.op_u8(OpCode::Call, 0);
        define(b, "typed");
    });
    let mut h = Harness::new();
    h.io.push_input("from host");
    h.run(&proto).unwrap();
    assert_eq!(h.io.output(), "hello\na 1");
    assert_eq!(h.shown("typed"), "from host");
}

#[test]
fn test_std_json() {
    let proto = script(|b| {
        import_as(b, "std:json", "json");
        get(b, "json");
        b.string(r#"{"n": 2, "xs": [true, null]}"#);
        b.named(OpCode::Invoke, "parse").byte(1);
        define(b, "parsed");
        get(b, "json");
        b.number(1.0).string("x").op_u16(OpCode::CreateList, 2);
        b.named(OpCode::Invoke, "stringify").byte(1);
        define(b, "text");
    });
    let mut h = Harness::new();
    h.run(&proto).unwrap();
    assert_eq!(h.shown("parsed"), "{n: 2, xs: [true, nil]}");
    assert_eq!(h.shown("text"), r#"[1.0,"x"]"#);
}

#[test]
fn test_std_filesystem() {
    let proto = script(|b| {
        import(b, "std:filesystem");
        get(b, "readFile");
        b.string("notes.txt").op_u8(OpCode::Call, 1);
        define(b, "contents");
        get(b, "fileExists");
        b.string("other.txt").op_u8(OpCode::Call, 1);
        define(b, "other");
    });
    let mut h = Harness::new();
    h.io.add_file("notes.txt", "remember");
    h.run(&proto).unwrap();
    assert_eq!(h.shown("contents"), "remember");
    assert_eq!(h.global("other"), Value::FALSE);
}

#[test]
fn test_host_registered_module() {
    fn answer(_vm: &mut crate::vm::VM, _args: &[Value]) -> Result<Value, VmError> {
        Ok(Value::number(42.0))
    }

    let mut module = crate::builtins::registry::BuiltinModule::new();
    module.register("answer", answer, 0).constant("limit", 3.0);

    let proto = script(|b| {
        import(b, "host:app");
        get(b, "answer");
        b.op_u8(OpCode::Call, 0);
        get(b, "limit");
        b.op(OpCode::Add);
        define(b, "r");
    });
    let mut h = Harness::new();
    h.vm.register_builtin_module("host:app", module);
    h.run(&proto).unwrap();
    assert_eq!(h.number("r"), 45.0);
}
