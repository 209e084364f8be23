//! Call overhead benchmarks
//!
//! Compares a loop that stays inside the interpreter against one bridged call
//! per iteration, and against a JSON round trip on both sides.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pybridge::{BridgeConfig, Object, Value};

const FOO: &str = "hello";
const BAR: &str = "world";
const BAZ: i64 = 1234;

fn fixture() -> Object {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/benches");
    // Already configured when criterion calls back in; the first setting wins.
    let _ = pybridge::configure(BridgeConfig::from_env().with_python_path(dir));
    pybridge::import("bench_module").expect("bench fixture module")
}

fn fixed_args() -> [Value; 3] {
    [Value::from(FOO), Value::from(BAR), Value::Int(BAZ)]
}

fn bench_foreign_loop(c: &mut Criterion) {
    let module = fixture();
    let mut group = c.benchmark_group("foreign_loop");

    for n in [1_000i64, 10_000] {
        let mut args = vec![Value::Int(n)];
        args.extend(fixed_args());
        let run = module.call("python_only_factory", &args).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(n), &run, |b, run| {
            b.iter(|| run.invoke(&[]).unwrap())
        });
    }

    group.finish();
}

fn bench_bridged_calls(c: &mut Criterion) {
    let module = fixture();
    let function = module.attr("function").unwrap();
    let args = fixed_args();

    c.bench_function("bridged_call", |b| {
        b.iter(|| function.invoke_value(black_box(&args)).unwrap())
    });

    c.bench_function("bridged_call_handle", |b| {
        b.iter(|| function.invoke(black_box(&args)).unwrap())
    });
}

fn bench_json(c: &mut Criterion) {
    let module = fixture();
    let function = module.attr("function").unwrap();
    let payload = serde_json::json!({ "foo": FOO, "bar": BAR, "baz": BAZ }).to_string();

    c.bench_function("json_round_trip", |b| {
        b.iter(|| {
            let parsed: serde_json::Value = serde_json::from_str(black_box(&payload)).unwrap();
            let args = [
                Value::from_json(parsed["foo"].clone()),
                Value::from_json(parsed["bar"].clone()),
                Value::from_json(parsed["baz"].clone()),
            ];
            let result = function.invoke_value(&args).unwrap();
            serde_json::to_string(&result.to_json().unwrap()).unwrap()
        })
    });

    let mut args = vec![Value::Int(1_000)];
    args.extend(fixed_args());
    let run = module.call("json_factory", &args).unwrap();
    c.bench_function("foreign_json_loop_1000", |b| b.iter(|| run.invoke(&[]).unwrap()));
}

criterion_group!(benches, bench_foreign_loop, bench_bridged_calls, bench_json);
criterion_main!(benches);
