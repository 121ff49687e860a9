//! Benchmarks for the bytecode VM dispatch loop
//!
//! Each program is compiled and linked once; the timed loop only resets the
//! VM and runs it to `halt`, so the numbers reflect dispatch, calls and
//! register traffic rather than compilation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lilium::backend::bytecode::{compile_source, link_modules, BytecodeVM, VmConfig};
use std::sync::Arc;
use std::time::Duration;

fn build_vm(source: &str) -> BytecodeVM {
    let module = compile_source("bench", source)
        .expect("compilation failed")
        .to_module()
        .expect("load failed");
    let image = link_modules(vec![module]).expect("link failed");
    let config = VmConfig {
        register_file_size: 1 << 20,
        max_call_stack: 1 << 16,
        ..VmConfig::default()
    };
    BytecodeVM::with_config(Arc::new(image), config)
}

fn run(vm: &mut BytecodeVM) -> i64 {
    vm.reset();
    vm.run().expect("VM execution failed")
}

/// Steps per run, for element throughput
fn steps(vm: &mut BytecodeVM) -> u64 {
    run(vm);
    vm.executed_instructions()
}

// ============================================================================
// Benchmark 1: Sum (non-tail vs tail recursion)
// ============================================================================

const SUM: &str = concat!(
    "(def sum (a b)",
    "  (if ",
    "     (> a 0)",
    "     ((+ (sum (- a 1) (+ b 1)) 0))",
    "     ((+ b 1))))",
);

const SUM_TAIL: &str = concat!(
    "(def sum (a b)",
    "  (if ",
    "     (> a 0)",
    "     ((sum (- a 1) (+ b 1)))",
    "     ((+ b 1))))",
);

fn bench_sum(c: &mut Criterion) {
    let mut group = c.benchmark_group("sum");
    group.measurement_time(Duration::from_secs(5));

    for n in [100u64, 900] {
        for (label, def) in [("sum", SUM), ("sum_tail", SUM_TAIL)] {
            let mut vm = build_vm(&format!("{} (sum {} 0)", def, n));
            group.throughput(Throughput::Elements(steps(&mut vm)));
            group.bench_with_input(BenchmarkId::new(label, n), &n, |b, _| {
                b.iter(|| black_box(run(&mut vm)))
            });
        }
    }

    group.finish();
}

// ============================================================================
// Benchmark 2: Factorial (wrapping multiplication)
// ============================================================================

const FACTORIAL: &str = concat!(
    "(def fac (a b)",
    "  (if ",
    "     (> a 0)",
    "     ((+ (fac (- a 1) (* b a)) 0))",
    "     (b)))",
);

const FACTORIAL_TAIL: &str = concat!(
    "(def fac (a b)",
    "  (if ",
    "     (> a 0)",
    "     ((fac (- a 1) (* b a)))",
    "     (b)))",
);

fn bench_factorial(c: &mut Criterion) {
    let mut group = c.benchmark_group("factorial");

    for (label, def) in [("factorial", FACTORIAL), ("factorial_tail", FACTORIAL_TAIL)] {
        let mut vm = build_vm(&format!("{} (fac 900 1)", def));
        group.throughput(Throughput::Elements(steps(&mut vm)));
        group.bench_function(label, |b| b.iter(|| black_box(run(&mut vm))));
    }

    group.finish();
}

// ============================================================================
// Benchmark 3: Fibonacci (tree recursion vs accumulator loop)
// ============================================================================

const FIBONACCI: &str = "(def fib (n) (if (> 2 n) (n) ((+ (fib (- n 1)) (fib (- n 2))))))";

const FIBONACCI_TAIL: &str = concat!(
    "(def fib_iter (n a b) (if (> n 0) ((fib_iter (- n 1) b (+ a b))) (a)))",
    "(def fib (n) (fib_iter n 0 1))",
);

fn bench_fibonacci(c: &mut Criterion) {
    let mut group = c.benchmark_group("fibonacci");

    for n in [15u64, 20] {
        for (label, def) in [("fibonacci", FIBONACCI), ("fibonacci_tail", FIBONACCI_TAIL)] {
            let mut vm = build_vm(&format!("{} (fib {})", def, n));
            group.throughput(Throughput::Elements(steps(&mut vm)));
            group.bench_with_input(BenchmarkId::new(label, n), &n, |b, _| {
                b.iter(|| black_box(run(&mut vm)))
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_sum, bench_factorial, bench_fibonacci);
criterion_main!(benches);
