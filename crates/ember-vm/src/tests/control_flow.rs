use super::helpers::*;
use crate::config::VmConfig;
use crate::error::VmError;
use crate::opcode::OpCode;
use crate::value::Value;

/// `if (cond) { r = then } else { r = other }`
fn branch(cond: OpCode) -> crate::bytecode::FunctionProto {
    script(|b| {
        b.op(cond);
        let else_jump = b.emit_jump(OpCode::JumpIfFalse);
        b.op(OpCode::Pop);
        b.string("then");
        define(b, "r");
        let end_jump = b.emit_jump(OpCode::Jump);
        b.patch_jump(else_jump);
        b.op(OpCode::Pop);
        b.string("other");
        define(b, "r");
        b.patch_jump(end_jump);
    })
}

#[test]
fn test_if_else() {
    let mut h = Harness::new();
    h.run(&branch(OpCode::True)).unwrap();
    assert_eq!(h.shown("r"), "then");

    let mut h = Harness::new();
    h.run(&branch(OpCode::Nil)).unwrap();
    assert_eq!(h.shown("r"), "other");
}

#[test]
fn test_while_loop_with_local() {
    // var i = 0; while (i < 5) { i = i + 1; total = total + i }
    let proto = script(|b| {
        b.number(0.0);
        define(b, "total");
        b.number(0.0); // local slot 1: i

        let start = b.offset();
        b.op_u16(OpCode::GetLocal, 1).number(5.0).op(OpCode::Less);
        let exit = b.emit_jump(OpCode::JumpIfFalse);
        b.op(OpCode::Pop);

        b.op_u16(OpCode::GetLocal, 1).op(OpCode::Increment);
        b.op_u16(OpCode::SetLocal, 1).op(OpCode::Pop);
        get(b, "total");
        b.op_u16(OpCode::GetLocal, 1).op(OpCode::Add);
        b.named(OpCode::SetGlobal, "total").op(OpCode::Pop);
        b.emit_loop(start);

        b.patch_jump(exit);
        b.op(OpCode::Pop).op(OpCode::Pop);
    });
    let mut h = Harness::new();
    h.run(&proto).unwrap();
    assert_eq!(h.number("total"), 15.0);
}

/// `for x in <sequence> { seen = seen + [x] }`
fn for_in(push_sequence: impl FnOnce(&mut crate::bytecode::FunctionBuilder)) -> crate::bytecode::FunctionProto {
    script(|b| {
        b.op_u16(OpCode::CreateList, 0);
        define(b, "seen");

        b.op(OpCode::Nil); // loop variable
        push_sequence(b);
        b.op(OpCode::Nil); // cursor

        let start = b.offset();
        let exit = b.emit_jump(OpCode::Iter);
        get(b, "seen");
        b.op_u16(OpCode::GetLocal, 1).op_u16(OpCode::CreateList, 1);
        b.op(OpCode::Add).op(OpCode::Pop);
        b.emit_loop(start);
        b.patch_jump(exit);

        b.op(OpCode::Pop).op(OpCode::Pop).op(OpCode::Pop);
    })
}

#[test]
fn test_for_in_range() {
    let proto = for_in(|b| {
        b.number(2.0).number(5.0).op(OpCode::CreateRange);
    });
    let mut h = Harness::new();
    h.run(&proto).unwrap();
    assert_eq!(h.shown("seen"), "[2, 3, 4]");
}

#[test]
fn test_for_in_array() {
    let proto = for_in(|b| {
        b.string("a").number(1.0).op(OpCode::True);
        b.op_u16(OpCode::CreateList, 3);
    });
    let mut h = Harness::new();
    h.run(&proto).unwrap();
    assert_eq!(h.shown("seen"), "[a, 1, true]");
}

#[test]
fn test_for_in_empty_range_skips_body() {
    let proto = for_in(|b| {
        b.number(3.0).number(3.0).op(OpCode::CreateRange);
    });
    let mut h = Harness::new();
    h.run(&proto).unwrap();
    assert_eq!(h.shown("seen"), "[]");
}

#[test]
fn test_for_in_range_whose_step_is_lost_to_rounding_fails() {
    let big = 2f64.powi(53);
    let proto = for_in(|b| {
        b.number(big).number(big + 4.0).op(OpCode::CreateRange);
    });
    let mut h = Harness::new();
    assert!(matches!(h.run_err(&proto), VmError::Runtime(_)));
}

#[test]
fn test_iterating_a_number_is_a_type_error() {
    let proto = for_in(|b| {
        b.number(3.0);
    });
    let mut h = Harness::new();
    assert!(matches!(h.run_err(&proto), VmError::TypeError { .. }));
}

#[test]
fn test_throw_is_ignored() {
    let proto = script(|b| {
        b.op(OpCode::Throw);
        b.op(OpCode::True);
        define(b, "after");
    });
    let mut h = Harness::new();
    h.run(&proto).unwrap();
    assert_eq!(h.global("after"), Value::TRUE);
}

#[test]
fn test_invalid_opcode() {
    let mut b = crate::bytecode::FunctionBuilder::new("script");
    b.byte(0xfe);
    let proto = b.finish().unwrap();
    let mut h = Harness::new();
    assert_eq!(h.run_err(&proto), VmError::InvalidOpcode(0xfe));
}

#[test]
fn test_bad_local_slot() {
    let proto = script(|b| {
        b.op_u16(OpCode::GetLocal, 40).op(OpCode::Pop);
    });
    let mut h = Harness::new();
    assert!(matches!(h.run_err(&proto), VmError::InvalidBytecode(_)));
}

#[test]
fn test_vm_is_reusable_after_error() {
    let mut h = Harness::new();
    let failing = script(|b| {
        b.number(1.0);
        define(b, "kept");
        get(b, "missing");
    });
    assert!(matches!(h.run_err(&failing), VmError::UndefinedVariable(_)));
    assert_eq!(h.vm.stack_depth(), 0);

    let ok = script(|b| {
        get(b, "kept");
        b.op(OpCode::Increment);
        define(b, "next");
    });
    h.run(&ok).unwrap();
    assert_eq!(h.number("next"), 2.0);
}

#[test]
fn test_trace_execution_does_not_change_results() {
    let config = VmConfig {
        trace_execution: true,
        ..VmConfig::default()
    };
    let mut h = Harness::with_config(config);
    h.run(&branch(OpCode::False)).unwrap();
    assert_eq!(h.shown("r"), "other");
}
