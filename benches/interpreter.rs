mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use loxparse::{Config, Interpreter};

fn bench_interpreter(c: &mut Criterion) {
    for (label, path) in common::WORKLOADS {
        let source = common::load_source(path);

        c.bench_function(&format!("interpreter_full_pipeline_{label}"), |b| {
            b.iter(|| {
                let mut interpreter = Interpreter::with_output(Config::extras(), Vec::new());
                loxparse::run(black_box(&source), &mut interpreter).expect("run");
                black_box(interpreter.into_output());
            })
        });
    }
}

criterion_group!(benches, bench_interpreter);
criterion_main!(benches);
