//! Two execution contexts sharing the interpreter.
//!
//! One context grinds through a foreign computation in small steps while the
//! other drives a spinner on `sys.stdout`. Their jobs interleave but never
//! overlap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pybridge::{logging, Context, Value};

const SPINNER: &str = "-\\|/";

fn crunch(done: Arc<AtomicBool>) -> pybridge::Result<i64> {
    let total = Context::new("crunch").and_then(|context| {
        let total = sum_in_steps(&context);
        context.close();
        total
    });

    done.store(true, Ordering::Release);
    total
}

fn sum_in_steps(context: &Context) -> pybridge::Result<i64> {
    let builtins = context.import("builtins")?;

    let mut total = 0i64;
    for step in 0..40 {
        let bounds = [Value::Int(step * 50_000), Value::Int((step + 1) * 50_000)];
        let range = builtins.call("range", &bounds)?;
        total += builtins
            .call_value("sum", &[Value::from(range)])?
            .as_i64()
            .unwrap_or_default();
    }
    Ok(total)
}

fn spin(done: Arc<AtomicBool>) -> pybridge::Result<()> {
    let context = Context::new("spin")?;
    let stdout = context.import("sys")?.attr("stdout")?;
    let write = stdout.attr("write")?;
    let flush = stdout.attr("flush")?;

    for frame in SPINNER.chars().cycle() {
        if done.load(Ordering::Acquire) {
            break;
        }
        write.invoke(&[Value::from(format!("\r{}", frame))])?;
        flush.invoke(&[])?;
        thread::sleep(Duration::from_millis(100));
    }

    write.invoke(&[Value::from("\r")])?;
    context.close();
    Ok(())
}

fn main() -> pybridge::Result<()> {
    logging::init();

    let done = Arc::new(AtomicBool::new(false));

    let spinner = {
        let done = done.clone();
        thread::spawn(move || spin(done))
    };
    let total = crunch(done.clone());

    let spun = spinner.join().expect("spinner thread panicked");

    println!("sum = {}", total?);
    spun
}
