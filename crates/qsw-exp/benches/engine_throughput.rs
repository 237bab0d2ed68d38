use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qsw_core::{InvocationFailure, Mode, ParameterRange};
use qsw_exp::{InvocationArguments, RunOpts, SweepEngine};

fn canned_output(args: &InvocationArguments) -> Result<String, InvocationFailure> {
    Ok(format!(
        "Number of command line arguments: 5\nB: {}\nTotal Error Sum: {}\n",
        args.transformed,
        args.transformed % 100_003
    ))
}

fn engine_bench(c: &mut Criterion) {
    let engine = SweepEngine::new(canned_output, "dataset/test5.rgb");
    let modes: BTreeSet<Mode> = Mode::ALL.into_iter().collect();
    let range = ParameterRange::new(2, 256);

    for concurrency in [1usize, 4, 16] {
        let opts = RunOpts {
            concurrency,
            ..RunOpts::default()
        };
        c.bench_function(&format!("sweep_510_tasks_c{concurrency}"), |b| {
            b.iter(|| black_box(engine.run(&modes, range, &opts).expect("sweep")));
        });
    }
}

criterion_group!(benches, engine_bench);
criterion_main!(benches);
