//! Instance: one constructed runtime object
//!
//! Created by [`Session::new_instance`](crate::session::Session::new_instance).
//! An Instance owns a strong reference to the constructed runtime object
//! and its own method-result arena, separate from the session arena:
//! flushing one never invalidates handles from the other. Dropping the
//! Instance releases the arena and the object reference.

use std::rc::Rc;

use tracing::debug;

use tether_core::{Arena, Value, ValueRef};

use crate::convert::{from_native, to_native};
use crate::host::{Host, ObjRef};
use crate::runtime::Runtime;
use crate::session::{SessionShared, record_failure, record_local};

pub struct Instance<R: Runtime> {
    host: Host<R>,
    shared: Rc<SessionShared>,
    object: ObjRef<R>,
    arena: Arena,
}

impl<R: Runtime> Instance<R> {
    pub(crate) fn new(host: Host<R>, shared: Rc<SessionShared>, object: ObjRef<R>) -> Self {
        Instance {
            host,
            shared,
            object,
            arena: Arena::new(),
        }
    }

    /// The owned runtime object.
    pub fn object(&self) -> &ObjRef<R> {
        &self.object
    }

    /// Call `method` on the owned object. Arguments follow the call
    /// protocol (forced sequence shape); the result is owned by the
    /// instance arena. Failures land in the owning session's error record
    /// with context `Calling method <method>`.
    pub fn call_method(&mut self, method: &str, args: Option<&Value>) -> Option<ValueRef> {
        let context = || format!("Calling method {method}");
        let rt = self.host.runtime();
        let Some(func_raw) = rt.get_attribute(self.object.raw(), method) else {
            record_failure(
                &self.host,
                &self.shared,
                context(),
                "resolution",
                format!("object has no attribute {method}"),
            );
            return None;
        };
        let func = self.host.adopt(func_raw);
        if !rt.is_callable(func.raw()) {
            record_local(
                &self.shared,
                context(),
                "resolution",
                format!("attribute {method} is not callable"),
            );
            return None;
        }
        let native_args = to_native(&self.host, args.unwrap_or(&Value::None), true);
        let Some(result_raw) = rt.invoke(func.raw(), native_args.raw()) else {
            record_failure(
                &self.host,
                &self.shared,
                context(),
                "runtime",
                "method call raised an error".to_string(),
            );
            return None;
        };
        let result = self.host.adopt(result_raw);
        let value = from_native(&self.host, result.raw());
        debug!(method, "method call succeeded");
        Some(self.arena.insert(value))
    }

    /// Resolve a method-result handle against the instance arena.
    pub fn value(&self, handle: ValueRef) -> Option<&Value> {
        self.arena.get(handle)
    }

    /// Release every Value owned by the instance arena.
    pub fn flush_result_arena(&mut self) {
        debug!(count = self.arena.len(), "flushing instance result arena");
        self.arena.flush();
    }
}
