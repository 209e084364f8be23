//! Facade and finalization tests

use super::*;
use crate::error::Error;

fn fresh_list() -> Object {
    import("builtins").unwrap().call("list", &[]).unwrap()
}

#[test]
fn test_clone_is_host_only() {
    let list = fresh_list();
    let before = list.ref_count().unwrap();

    let copies: Vec<Object> = (0..8).map(|_| list.clone()).collect();
    assert_eq!(list.ref_count().unwrap(), before);

    drop(copies);
    assert_eq!(list.ref_count().unwrap(), before);
}

#[test]
fn test_release_goes_through_queue() {
    let list = fresh_list();
    let before = list.ref_count().unwrap();

    let shared = list.context().encode(&Value::from(&list)).unwrap();
    assert_eq!(shared, list);
    assert_eq!(list.ref_count().unwrap(), before + 1);

    // Dropped off-lock: the decrement is queued ahead of the ref_count call below.
    drop(shared);
    assert_eq!(list.ref_count().unwrap(), before);
}

#[test]
fn test_release_from_other_thread() {
    let list = fresh_list();
    let before = list.ref_count().unwrap();

    let extra: Vec<Object> = (0..4)
        .map(|_| list.context().encode(&Value::from(&list)).unwrap())
        .collect();
    assert_eq!(list.ref_count().unwrap(), before + 4);

    std::thread::spawn(move || drop(extra)).join().unwrap();
    assert_eq!(list.ref_count().unwrap(), before);
}

#[test]
fn test_release_inside_closure() {
    let list = fresh_list();
    let before = list.ref_count().unwrap();

    let ctx = list.context().clone();
    let after = ctx
        .execute(|| {
            let inner = ctx.encode(&Value::from(&list)).unwrap();
            drop(inner);
            list.ref_count().unwrap()
        })
        .unwrap();
    assert_eq!(after, before);
}

#[test]
fn test_bool_results_are_singletons() {
    let builtins = import("builtins").unwrap();
    let a = builtins.call("bool", &[Value::Int(1)]).unwrap();
    let b = builtins.call("bool", &[Value::from("x")]).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.value().unwrap(), Value::Bool(true));
    assert!(!a.is_none());
}

#[test]
fn test_none_identity() {
    let none = import("builtins")
        .unwrap()
        .call("getattr", &[Value::Int(0), Value::from("missing"), Value::None])
        .unwrap();
    assert!(none.is_none());
    assert_eq!(none.kind().unwrap(), Kind::None);
}

#[test]
fn test_debug_and_display() {
    let text = import("builtins")
        .unwrap()
        .call("str", &[Value::Float(1.5)])
        .unwrap();
    assert_eq!(text.to_string(), "1.5");

    let debug = format!("{:?}", text);
    assert!(debug.starts_with("Object"));
    assert!(debug.contains("default"));
}

#[test]
fn test_names_checked_first() {
    let os = import("os").unwrap();
    assert!(matches!(os.attr("get\0pid"), Err(Error::InvalidName(_))));
    assert!(matches!(os.call("x\0", &[]), Err(Error::InvalidName(_))));
    assert!(matches!(import("o\0s"), Err(Error::InvalidName(_))));
}
