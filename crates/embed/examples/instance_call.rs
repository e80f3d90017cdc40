//! Construct a runtime object and drive it through its methods.
//!
//! Uses the in-memory stub backend, so it runs without a real interpreter:
//! a `Counter` class is registered, instantiated with a start value, and
//! bumped a few times.
//!
//! Run with: `cargo run --example instance_call`

use tether_core::Value;
use tether_embed::stub::StubRuntime;
use tether_embed::{Host, Session};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let rt = StubRuntime::new();
    rt.register_class("tally", "Counter", |args| {
        Ok(Value::Int(args.as_seq().get(0).as_int()))
    });
    rt.register_method("tally", "Counter", "increment", |state, args| {
        let step = match args.as_seq().len() {
            0 => 1,
            _ => args.as_seq().get(0).as_int(),
        };
        *state = Value::Int(state.as_int() + step);
        Ok(state.clone())
    });
    rt.register_method("tally", "Counter", "reset", |state, _| {
        *state = Value::Int(0);
        Ok(Value::None)
    });
    rt.register_method("tally", "Counter", "value", |state, _| Ok(state.clone()));

    let mut session = Session::new(Host::new(rt));

    let mut counter = session
        .new_instance("tally", "Counter", Some(&Value::Int(10)))
        .expect("Counter is registered");

    counter.call_method("increment", None);
    counter.call_method("increment", Some(&Value::Int(5)));

    let result = counter
        .call_method("value", None)
        .expect("value() never raises");
    println!("counter = {}", counter.value(result).expect("fresh handle"));

    // a method the class does not have: captured, not panicked
    session.set_auto_alert(false);
    assert!(counter.call_method("decrement", None).is_none());
    println!("last error: {}", session.last_error().summary());
}
