// Benchmark for the parser and interpreter over a synthetic program.
// Run with: cargo bench

use criterion::{criterion_group, criterion_main, Criterion};
use millstream_core::{parse, Machine};

fn synthetic_program() -> String {
    let mut src = String::new();
    for i in 0..10_000 {
        src.push_str(&format!("G1 X{} Y{} F1500\n", i % 200, (i * 7) % 200));
    }
    src
}

fn bench_parse(c: &mut Criterion) {
    let src = synthetic_program();
    c.bench_function("parse 10k lines", |b| {
        b.iter(|| {
            let doc = parse(&src).unwrap();
            assert_eq!(doc.len(), 10_000);
        });
    });
}

fn bench_process(c: &mut Criterion) {
    let src = synthetic_program();
    let doc = parse(&src).unwrap();
    c.bench_function("interpret 10k lines", |b| {
        b.iter(|| {
            let mut machine = Machine::new();
            machine.process(&doc).unwrap();
            assert!(machine.positions.len() > 9_000);
        });
    });
}

criterion_group!(benches, bench_parse, bench_process);
criterion_main!(benches);
