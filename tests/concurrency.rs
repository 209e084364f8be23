use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;
use pybridge::{Context, Error, Value};

#[test]
fn test_contexts_never_overlap() {
    const CONTEXTS: usize = 4;
    const ROUNDS: usize = 5;

    let intervals = Arc::new(Mutex::new(Vec::new()));
    let barrier = Arc::new(Barrier::new(CONTEXTS));

    let workers: Vec<_> = (0..CONTEXTS)
        .map(|i| {
            let intervals = intervals.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let ctx = Context::new(format!("overlap-{}", i)).unwrap();
                let time = ctx.import("time").unwrap();
                barrier.wait();

                for _ in 0..ROUNDS {
                    let interval = ctx
                        .execute(|| {
                            let enter = Instant::now();
                            // A foreign sleep drops the engine's own lock.
                            time.call("sleep", &[Value::Float(0.005)]).unwrap();
                            (enter, Instant::now())
                        })
                        .unwrap();
                    intervals.lock().push((i, interval));
                }
                ctx.close();
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let mut intervals = intervals.lock().clone();
    assert_eq!(intervals.len(), CONTEXTS * ROUNDS);

    intervals.sort_by_key(|(_, (enter, _))| *enter);
    for pair in intervals.windows(2) {
        let (_, (_, exit)) = pair[0];
        let (_, (enter, _)) = pair[1];
        assert!(exit <= enter, "intervals overlap: {:?}", pair);
    }
}

#[test]
fn test_submissions_run_in_order() {
    let ctx = Context::new("fifo").unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let pending: Vec<_> = (0..50)
        .map(|i| {
            let order = order.clone();
            ctx.submit(move || order.lock().push(i)).unwrap()
        })
        .collect();

    for p in pending {
        p.wait().unwrap();
    }
    assert_eq!(*order.lock(), (0..50).collect::<Vec<_>>());
    ctx.close();
}

#[test]
fn test_close_completes_pending_work() {
    let ctx = Context::new("drain").unwrap();
    let ran = Arc::new(AtomicUsize::new(0));

    let pending: Vec<_> = (0..10)
        .map(|_| {
            let ran = ran.clone();
            ctx.submit(move || {
                thread::sleep(std::time::Duration::from_millis(2));
                ran.fetch_add(1, Ordering::SeqCst)
            })
            .unwrap()
        })
        .collect();

    ctx.close();
    assert_eq!(ran.load(Ordering::SeqCst), 10);
    assert!(ctx.is_closed());

    for p in pending {
        assert!(p.is_done());
        p.wait().unwrap();
    }
}

#[test]
fn test_submit_after_close() {
    let ctx = Context::new("closed").unwrap();
    ctx.close();

    assert!(matches!(ctx.submit(|| ()), Err(Error::ContextClosed(_))));
    assert_eq!(
        ctx.execute(|| 1).unwrap_err(),
        Error::ContextClosed("closed".to_string())
    );
    assert!(matches!(ctx.import("os"), Err(Error::ContextClosed(_))));

    // Closing twice is harmless.
    ctx.close();
}

#[test]
fn test_default_context_stays_open() {
    let ctx = Context::default_context().unwrap();
    assert!(ctx.is_default());

    ctx.close();
    assert!(!ctx.is_closed());
    assert_eq!(ctx.execute(|| 7).unwrap(), 7);
}

#[test]
fn test_panic_releases_lock() {
    let ctx = Context::new("panics").unwrap();

    let caught = thread::spawn({
        let ctx = ctx.clone();
        move || ctx.execute(|| panic!("boom"))
    })
    .join();
    assert!(caught.is_err());

    // The same and other contexts can still get in.
    assert_eq!(ctx.execute(|| 1).unwrap(), 1);
    let sys = pybridge::import("sys").unwrap();
    assert!(sys.attr_value("version").unwrap().as_str().is_some());
    ctx.close();
}

#[test]
fn test_nested_execute_runs_inline() {
    let outer = Context::new("outer").unwrap();
    let inner = Context::new("inner").unwrap();

    let result = outer
        .execute(|| {
            let from_inner = inner.execute(|| 20).unwrap();
            let from_outer = outer.execute(|| 1).unwrap();
            let value = pybridge::import("builtins")
                .unwrap()
                .call_value("abs", &[Value::Int(-21)])
                .unwrap();
            from_inner + from_outer + value.as_i64().unwrap()
        })
        .unwrap();
    assert_eq!(result, 42);

    outer.close();
    inner.close();
}

#[test]
fn test_close_from_inside_is_deferred() {
    let ctx = Context::new("self-close").unwrap();

    let finished = ctx
        .execute(|| {
            ctx.close();
            // Still running: the close waits for this closure.
            "finished"
        })
        .unwrap();
    assert_eq!(finished, "finished");
    assert!(ctx.is_closed());
    assert!(matches!(ctx.execute(|| ()), Err(Error::ContextClosed(_))));
}

#[test]
fn test_borrowing_closure() {
    let ctx = Context::new("borrow").unwrap();
    let mut collected = Vec::new();
    let input = vec![1, 2, 3];

    ctx.execute(|| collected.extend(input.iter().map(|i| i * 2)))
        .unwrap();
    assert_eq!(collected, vec![2, 4, 6]);
    ctx.close();
}

#[test]
fn test_handles_dropped_across_threads() {
    let list = pybridge::import("builtins")
        .unwrap()
        .call("list", &[])
        .unwrap();
    let before = list.ref_count().unwrap();

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let list = list.clone();
            thread::spawn(move || {
                let ctx = Context::new(format!("share-{}", i)).unwrap();
                let shared: Vec<_> = (0..10)
                    .map(|_| ctx.encode(&Value::from(&list)).unwrap())
                    .collect();
                drop(shared);
                ctx.close();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // Releases were queued on the default context, which the ref_count call also uses.
    assert_eq!(list.ref_count().unwrap(), before);
}
