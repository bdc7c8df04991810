use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ember_vm::{Constant, FunctionBuilder, FunctionProto, OpCode, VM};

/// sum = 0; for i in 0..n { sum = sum + i }
fn counting_loop(n: f64) -> FunctionProto {
    let mut b = FunctionBuilder::new("script");
    b.number(0.0).named(OpCode::DefineGlobal, "sum");
    b.op(OpCode::Nil);
    b.number(0.0).number(n).op(OpCode::CreateRange);
    b.op(OpCode::Nil);
    let start = b.offset();
    let exit = b.emit_jump(OpCode::Iter);
    b.named(OpCode::GetGlobal, "sum");
    b.op_u16(OpCode::GetLocal, 1).op(OpCode::Add);
    b.named(OpCode::SetGlobal, "sum").op(OpCode::Pop);
    b.emit_loop(start);
    b.patch_jump(exit);
    b.op(OpCode::Pop).op(OpCode::Pop).op(OpCode::Pop);
    b.op(OpCode::Nil).op(OpCode::Return);
    b.finish().unwrap()
}

/// fib(n) with two recursive calls per frame
fn fibonacci(n: f64) -> FunctionProto {
    let mut f = FunctionBuilder::new("fib").arity(1);
    f.op_u16(OpCode::GetLocal, 1).number(2.0).op(OpCode::Less);
    let recurse = f.emit_jump(OpCode::JumpIfFalse);
    f.op(OpCode::Pop).op_u16(OpCode::GetLocal, 1).op(OpCode::Return);
    f.patch_jump(recurse);
    f.op(OpCode::Pop);
    f.named(OpCode::GetGlobal, "fib");
    f.op_u16(OpCode::GetLocal, 1).op(OpCode::Decrement).op_u8(OpCode::Call, 1);
    f.named(OpCode::GetGlobal, "fib");
    f.op_u16(OpCode::GetLocal, 1).number(2.0).op(OpCode::Subtract);
    f.op_u8(OpCode::Call, 1);
    f.op(OpCode::Add).op(OpCode::Return);
    let fib = f.finish().unwrap();

    let mut b = FunctionBuilder::new("script");
    b.constant(Constant::Function(fib)).named(OpCode::DefineGlobal, "fib");
    b.named(OpCode::GetGlobal, "fib");
    b.number(n).op_u8(OpCode::Call, 1).named(OpCode::DefineGlobal, "result");
    b.op(OpCode::Nil).op(OpCode::Return);
    b.finish().unwrap()
}

/// Build lists of interpolated strings so the collector has work to do
fn allocation_churn(n: f64) -> FunctionProto {
    let mut b = FunctionBuilder::new("script");
    b.op(OpCode::Nil);
    b.number(0.0).number(n).op(OpCode::CreateRange);
    b.op(OpCode::Nil);
    let start = b.offset();
    let exit = b.emit_jump(OpCode::Iter);
    b.string("item ").op_u16(OpCode::GetLocal, 1).op_u8(OpCode::StringInterp, 2);
    b.op_u16(OpCode::GetLocal, 1).op_u16(OpCode::CreateList, 2).op(OpCode::Pop);
    b.emit_loop(start);
    b.patch_jump(exit);
    b.op(OpCode::Pop).op(OpCode::Pop).op(OpCode::Pop);
    b.op(OpCode::Nil).op(OpCode::Return);
    b.finish().unwrap()
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    for n in [100.0, 10_000.0] {
        let proto = counting_loop(n);
        group.bench_with_input(BenchmarkId::new("counting_loop", n), &proto, |b, proto| {
            let mut vm = VM::new();
            b.iter(|| vm.interpret(black_box(proto)).unwrap());
        });
    }

    let proto = fibonacci(15.0);
    group.bench_function("fib_15", |b| {
        let mut vm = VM::new();
        b.iter(|| vm.interpret(black_box(&proto)).unwrap());
    });

    group.finish();
}

fn bench_collection(c: &mut Criterion) {
    let mut group = c.benchmark_group("gc");
    let proto = allocation_churn(5_000.0);

    group.bench_function("allocation_churn", |b| {
        b.iter_batched(
            VM::new,
            |mut vm| vm.interpret(black_box(&proto)).unwrap(),
            criterion::BatchSize::SmallInput,
        );
    });

    group.bench_function("full_collection", |b| {
        let mut vm = VM::new();
        vm.interpret(&proto).unwrap();
        b.iter(|| black_box(vm.collect_garbage()));
    });

    group.finish();
}

criterion_group!(benches, bench_dispatch, bench_collection);
criterion_main!(benches);
