//! Integration tests for Instance construction and method calls

use std::cell::RefCell;
use std::rc::Rc;

use tether_core::Value;
use tether_embed::stub::{Raise, StubRuntime};
use tether_embed::{AlertSink, ErrorRecord, Host, Session};

fn tally_runtime() -> StubRuntime {
    let rt = StubRuntime::new();
    rt.register_class("tally", "Counter", |args| {
        let start = args.as_seq().get(0).as_int();
        if start < 0 {
            return Err(Raise::new("ValueError", "start must not be negative"));
        }
        Ok(Value::Int(start))
    });
    rt.register_method("tally", "Counter", "increment", |state, _| {
        *state = Value::Int(state.as_int() + 1);
        Ok(state.clone())
    });
    rt.register_method("tally", "Counter", "value", |state, _| Ok(state.clone()));
    rt
}

#[derive(Clone, Default)]
struct CollectSink {
    records: Rc<RefCell<Vec<ErrorRecord>>>,
}

impl AlertSink for CollectSink {
    fn alert(&self, record: &ErrorRecord) {
        self.records.borrow_mut().push(record.clone());
    }
}

fn quiet_session(rt: StubRuntime) -> Session<StubRuntime> {
    Session::with_alert_sink(Host::new(rt), false, Box::new(CollectSink::default()))
}

#[test]
fn test_construct_and_call() {
    let rt = tally_runtime();
    let mut session = Session::new(Host::new(rt));
    let mut counter = session
        .new_instance("tally", "Counter", Some(&Value::Int(10)))
        .expect("Counter is registered");
    counter.call_method("increment", None);
    counter.call_method("increment", None);
    let result = counter.call_method("value", None).unwrap();
    assert_eq!(counter.value(result), Some(&Value::Int(12)));
}

#[test]
fn test_instances_have_separate_state() {
    let rt = tally_runtime();
    let mut session = Session::new(Host::new(rt));
    let mut a = session.new_instance("tally", "Counter", Some(&Value::Int(0))).unwrap();
    let mut b = session.new_instance("tally", "Counter", Some(&Value::Int(100))).unwrap();
    a.call_method("increment", None);
    let a_val = a.call_method("value", None).unwrap();
    let b_val = b.call_method("value", None).unwrap();
    assert_eq!(a.value(a_val), Some(&Value::Int(1)));
    assert_eq!(b.value(b_val), Some(&Value::Int(100)));
}

#[test]
fn test_constructor_failure_is_captured() {
    let rt = tally_runtime();
    let mut session = quiet_session(rt);
    assert!(
        session
            .new_instance("tally", "Counter", Some(&Value::Int(-1)))
            .is_none()
    );
    let err = session.last_error();
    assert_eq!(err.context, "Creating instance of class Counter from module tally");
    assert_eq!(err.category, "ValueError");
}

#[test]
fn test_missing_class_is_captured() {
    let rt = tally_runtime();
    let mut session = quiet_session(rt);
    assert!(session.new_instance("tally", "Gauge", None).is_none());
    let err = session.last_error();
    assert_eq!(err.context, "Creating instance of class Gauge from module tally");
    assert_eq!(err.category, "AttributeError");
}

#[test]
fn test_missing_method_reports_into_session_record() {
    let rt = tally_runtime();
    let mut session = quiet_session(rt);
    let mut counter = session.new_instance("tally", "Counter", None).unwrap();
    assert!(counter.call_method("decrement", None).is_none());
    let err = session.last_error();
    assert_eq!(err.context, "Calling method decrement");
    assert_eq!(err.category, "AttributeError");
}

#[test]
fn test_method_raise_is_captured() {
    let rt = tally_runtime();
    rt.register_method("tally", "Counter", "explode", |_, _| {
        Err(Raise::new("RuntimeError", "counter exploded"))
    });
    let mut session = quiet_session(rt);
    let mut counter = session.new_instance("tally", "Counter", None).unwrap();
    assert!(counter.call_method("explode", None).is_none());
    let err = session.last_error();
    assert_eq!(err.context, "Calling method explode");
    assert_eq!(err.category, "RuntimeError");
    assert!(err.traceback.contains("tally.Counter.explode"));
}

#[test]
fn test_arena_independence() {
    let rt = tally_runtime();
    let mut session = Session::new(Host::new(rt));
    let mut counter = session.new_instance("tally", "Counter", Some(&Value::Int(3))).unwrap();
    let method_result = counter.call_method("value", None).unwrap();
    let session_result = session.build_value("i", &[9.into()]).unwrap();

    // flushing the session arena leaves instance handles intact
    session.flush_result_arena();
    assert!(session.value(session_result).is_none());
    assert_eq!(counter.value(method_result), Some(&Value::Int(3)));

    // and the other way around
    let session_result = session.build_value("i", &[9.into()]).unwrap();
    counter.flush_result_arena();
    assert!(counter.value(method_result).is_none());
    assert_eq!(session.value(session_result), Some(&Value::Int(9)));
}

#[test]
fn test_handles_do_not_cross_arenas() {
    let rt = tally_runtime();
    let mut session = Session::new(Host::new(rt));
    let mut counter = session.new_instance("tally", "Counter", Some(&Value::Int(3))).unwrap();
    counter.flush_result_arena();
    let session_handle = session.build_value("i", &[1.into()]).unwrap();
    // a session handle resolved against the (flushed) instance arena misses
    assert!(counter.value(session_handle).is_none());
}

#[test]
fn test_instance_drop_releases_object() {
    let rt = tally_runtime();
    {
        let mut session = Session::new(Host::new(rt.clone()));
        {
            let mut counter = session
                .new_instance("tally", "Counter", Some(&Value::Int(1)))
                .unwrap();
            counter.call_method("increment", None);
        }
        // instance gone; only the module object remains with the session
        session.call_function("tally", "missing_fn", None);
    }
    assert_eq!(rt.live_object_count(), 0);
    assert!(rt.ledger_ok());
}
