//! Integration tests for the Session surface
//!
//! These drive import/call/build/flush against the stub backend and verify
//! the error-capture contract: failures return None, never panic, and the
//! session's error record names the attempted operation.

use std::cell::RefCell;
use std::rc::Rc;

use tether_core::Value;
use tether_embed::stub::{Raise, StubRuntime};
use tether_embed::{AlertSink, ErrorRecord, Host, Session};

fn math_runtime() -> StubRuntime {
    let rt = StubRuntime::new();
    rt.register_function("math", "add", |args| {
        let a = args.as_seq().get(0).as_int();
        let b = args.as_seq().get(1).as_int();
        Ok(Value::Int(a + b))
    });
    rt.register_function("math", "neg", |args| {
        Ok(Value::Int(-args.as_seq().get(0).as_int()))
    });
    rt.register_function("math", "boom", |_| Err(Raise::new("ValueError", "bad operand")));
    rt.register_value("math", "pi", Value::Float(3.14159));
    rt
}

/// Alert sink that collects records instead of logging them.
#[derive(Clone, Default)]
struct CollectSink {
    records: Rc<RefCell<Vec<ErrorRecord>>>,
}

impl AlertSink for CollectSink {
    fn alert(&self, record: &ErrorRecord) {
        self.records.borrow_mut().push(record.clone());
    }
}

#[test]
fn test_import_is_idempotent() {
    let rt = math_runtime();
    let mut session = Session::new(Host::new(rt.clone()));
    assert!(session.import_module("math"));
    let after_first = rt.live_object_count();
    assert!(session.import_module("math"));
    // the second import did not load a second module object
    assert_eq!(rt.live_object_count(), after_first);
}

#[test]
fn test_import_failure_records_context() {
    let rt = math_runtime();
    let mut session = Session::with_alert_sink(Host::new(rt), false, Box::new(CollectSink::default()));
    assert!(!session.import_module("missing"));
    let err = session.last_error();
    assert_eq!(err.context, "Importing missing");
    assert_eq!(err.category, "ImportError");
    assert!(err.message.contains("missing"));
}

#[test]
fn test_call_function_returns_arena_handle() {
    let rt = math_runtime();
    let mut session = Session::new(Host::new(rt));
    let args = Value::from(vec![Value::Int(40), Value::Int(2)]);
    let result = session
        .call_function("math", "add", Some(&args))
        .expect("add is registered");
    assert_eq!(session.value(result), Some(&Value::Int(42)));
}

#[test]
fn test_call_function_imports_on_demand() {
    let rt = math_runtime();
    let mut session = Session::new(Host::new(rt));
    // no explicit import_module call
    let result = session
        .call_function("math", "neg", Some(&Value::Int(5)))
        .expect("import-on-demand");
    assert_eq!(session.value(result), Some(&Value::Int(-5)));
}

#[test]
fn test_call_scalar_argument_is_wrapped() {
    let rt = math_runtime();
    rt.register_function("math", "arity", |args| {
        Ok(Value::Int(args.as_seq().len() as i64))
    });
    let mut session = Session::new(Host::new(rt));
    let one = session.call_function("math", "arity", Some(&Value::Int(9))).unwrap();
    assert_eq!(session.value(one), Some(&Value::Int(1)));
    let zero = session.call_function("math", "arity", None).unwrap();
    assert_eq!(session.value(zero), Some(&Value::Int(0)));
}

#[test]
fn test_missing_function_is_captured() {
    let rt = math_runtime();
    let mut session = Session::with_alert_sink(Host::new(rt), false, Box::new(CollectSink::default()));
    assert!(session.call_function("math", "nope", None).is_none());
    let err = session.last_error();
    assert_eq!(err.context, "Calling function nope in module math");
    assert_eq!(err.category, "AttributeError");
}

#[test]
fn test_missing_module_is_captured_with_call_context() {
    let rt = math_runtime();
    let mut session = Session::with_alert_sink(Host::new(rt), false, Box::new(CollectSink::default()));
    assert!(session.call_function("ghost", "f", None).is_none());
    let err = session.last_error();
    assert_eq!(err.context, "Calling function f in module ghost");
}

#[test]
fn test_non_callable_attribute_is_captured() {
    let rt = math_runtime();
    let mut session = Session::with_alert_sink(Host::new(rt), false, Box::new(CollectSink::default()));
    assert!(session.call_function("math", "pi", None).is_none());
    let err = session.last_error();
    assert_eq!(err.context, "Calling function pi in module math");
    assert!(err.message.contains("not callable"));
}

#[test]
fn test_raised_error_captures_category_and_traceback() {
    let rt = math_runtime();
    let mut session = Session::with_alert_sink(Host::new(rt), false, Box::new(CollectSink::default()));
    assert!(session.call_function("math", "boom", None).is_none());
    let err = session.last_error();
    assert_eq!(err.category, "ValueError");
    assert_eq!(err.message, "bad operand");
    assert_eq!(err.context, "Calling function boom in module math");
    assert!(err.traceback.contains("math.boom"));
}

#[test]
fn test_error_record_is_overwritten_by_next_failure() {
    let rt = math_runtime();
    let mut session = Session::with_alert_sink(Host::new(rt), false, Box::new(CollectSink::default()));
    session.call_function("math", "boom", None);
    assert_eq!(session.last_error().category, "ValueError");
    session.call_function("math", "nope", None);
    assert_eq!(session.last_error().category, "AttributeError");
}

#[test]
fn test_auto_alert_pushes_to_sink_immediately() {
    let rt = math_runtime();
    let sink = CollectSink::default();
    let mut session = Session::with_alert_sink(Host::new(rt), true, Box::new(sink.clone()));
    session.call_function("math", "boom", None);
    let records = sink.records.borrow();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].category, "ValueError");
}

#[test]
fn test_deferred_alert_via_raise_last_error() {
    let rt = math_runtime();
    let sink = CollectSink::default();
    let mut session = Session::with_alert_sink(Host::new(rt), false, Box::new(sink.clone()));
    session.call_function("math", "boom", None);
    assert!(sink.records.borrow().is_empty());
    session.raise_last_error();
    assert_eq!(sink.records.borrow().len(), 1);
}

#[test]
fn test_build_value_registers_in_arena() {
    let rt = math_runtime();
    let mut session = Session::new(Host::new(rt));
    let none = session.build_value("", &[]).unwrap();
    assert_eq!(session.value(none), Some(&Value::None));
    let bare = session.build_value("i", &[123.into()]).unwrap();
    assert_eq!(session.value(bare), Some(&Value::Int(123)));
    let pair = session.build_value("ii", &[1.into(), 2.into()]).unwrap();
    assert_eq!(session.value(pair).unwrap().to_string(), "(1,2)");
    let wrapped = session.build_value("(i)", &[123.into()]).unwrap();
    assert_eq!(session.value(wrapped).unwrap().to_string(), "(123,)");
}

#[test]
fn test_build_value_failure_is_captured() {
    let rt = math_runtime();
    let mut session = Session::with_alert_sink(Host::new(rt), false, Box::new(CollectSink::default()));
    assert!(session.build_value("q", &[1.into()]).is_none());
    let err = session.last_error();
    assert_eq!(err.context, "Building value from format \"q\"");
    assert_eq!(err.category, "format");
}

#[test]
fn test_flush_invalidates_outstanding_handles() {
    let rt = math_runtime();
    let mut session = Session::new(Host::new(rt));
    let before = session
        .call_function("math", "add", Some(&Value::from(vec![Value::Int(1), Value::Int(2)])))
        .unwrap();
    assert!(session.value(before).is_some());
    session.flush_result_arena();
    assert!(session.value(before).is_none());

    let after = session.build_value("i", &[7.into()]).unwrap();
    assert!(session.value(after).is_some());
    assert!(session.value(before).is_none());
}

#[test]
fn test_search_path_round_trip() {
    let rt = math_runtime();
    let session = Session::new(Host::new(rt));
    session.append_search_path("/opt/modules");
    session.append_search_path("/srv/modules");
    assert_eq!(
        session.search_path(),
        vec!["/opt/modules".to_string(), "/srv/modules".to_string()]
    );
}

#[test]
fn test_session_drop_releases_everything() {
    let rt = math_runtime();
    {
        let mut session = Session::new(Host::new(rt.clone()));
        session.import_module("math");
        session.call_function("math", "add", Some(&Value::from(vec![Value::Int(1), Value::Int(2)])));
        assert!(rt.live_object_count() > 0);
    }
    assert_eq!(rt.live_object_count(), 0);
    assert!(rt.ledger_ok());
}

#[test]
fn test_failed_calls_leak_nothing() {
    let rt = math_runtime();
    {
        let mut session =
            Session::with_alert_sink(Host::new(rt.clone()), false, Box::new(CollectSink::default()));
        session.import_module("math");
        let baseline = rt.live_object_count();
        session.call_function("math", "boom", Some(&Value::Int(1)));
        session.call_function("math", "nope", None);
        session.call_function("ghost", "f", None);
        assert_eq!(rt.live_object_count(), baseline);
    }
    assert_eq!(rt.live_object_count(), 0);
    assert!(rt.ledger_ok());
}
