//! Session: the top-level bridge surface
//!
//! A `Session` owns the set of imported modules, the result arena for
//! free-function calls, the single last-error record, and a clone of the
//! process-scoped [`Host`]. It is the object host code talks to: import a
//! module, build arguments, call a function, read the result through a
//! [`ValueRef`] handle.
//!
//! Every operation is synchronous and runs to completion on the calling
//! thread. Failures never panic and never raise: they are captured in the
//! error record together with a context string describing the attempted
//! operation, and the call returns `None`/`false`. With auto-alert enabled
//! (the default) each captured failure is also pushed to the session's
//! [`AlertSink`] immediately.

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use tracing::debug;

use tether_core::{Arena, BuildArg, Value, ValueRef};

use crate::convert::{from_native, to_native};
use crate::error::{AlertSink, ErrorRecord, LogAlert};
use crate::host::{Host, ObjRef};
use crate::instance::Instance;
use crate::runtime::Runtime;

/// State shared between a Session and the Instances it creates: the error
/// record is per session, and instances report failures into it.
pub(crate) struct SessionShared {
    pub(crate) last_error: RefCell<ErrorRecord>,
    pub(crate) auto_alert: Cell<bool>,
    pub(crate) alert: Box<dyn AlertSink>,
}

impl SessionShared {
    pub(crate) fn raise(&self) {
        self.alert.alert(&self.last_error.borrow());
    }
}

/// Capture a failure reported by the runtime into the shared error record.
///
/// The runtime's pending error, when there is one, supplies category,
/// payload and traceback; the fallback pair covers failures the bridge
/// detected itself. Alerts immediately when auto-alert is on.
pub(crate) fn record_failure<R: Runtime>(
    host: &Host<R>,
    shared: &SessionShared,
    context: String,
    fallback_category: &str,
    fallback_message: String,
) {
    let rt = host.runtime();
    let mut record = ErrorRecord {
        context,
        ..Default::default()
    };
    match rt.take_error() {
        Some((category, payload, traceback)) => {
            let category = host.adopt(category);
            record.category = rt.describe(category.raw());
            if let Some(payload) = payload {
                let payload = host.adopt(payload);
                record.message = rt.describe(payload.raw());
            }
            if let Some(traceback) = traceback {
                let traceback = host.adopt(traceback);
                record.traceback = rt.render_traceback(traceback.raw());
            }
        }
        None => {
            record.category = fallback_category.to_string();
            record.message = fallback_message;
        }
    }
    *shared.last_error.borrow_mut() = record;
    if shared.auto_alert.get() {
        shared.raise();
    }
}

/// Capture a failure the bridge detected without involving the runtime
/// (so a stale pending runtime error is left untouched).
pub(crate) fn record_local(
    shared: &SessionShared,
    context: String,
    category: &str,
    message: String,
) {
    *shared.last_error.borrow_mut() = ErrorRecord {
        category: category.to_string(),
        message,
        context,
        traceback: String::new(),
    };
    if shared.auto_alert.get() {
        shared.raise();
    }
}

/// Top-level bridge object: runtime lifecycle handle, imported modules,
/// constructed instances' shared error state, and the free-function result
/// arena.
pub struct Session<R: Runtime> {
    host: Host<R>,
    shared: Rc<SessionShared>,
    modules: Vec<(String, ObjRef<R>)>,
    arena: Arena,
}

impl<R: Runtime> Session<R> {
    /// A session with auto-alert enabled and the default logging sink.
    pub fn new(host: Host<R>) -> Self {
        Self::with_alert_sink(host, true, Box::new(LogAlert))
    }

    /// A session with an explicit auto-alert setting and alert sink.
    pub fn with_alert_sink(host: Host<R>, auto_alert: bool, alert: Box<dyn AlertSink>) -> Self {
        Session {
            host,
            shared: Rc::new(SessionShared {
                last_error: RefCell::new(ErrorRecord::default()),
                auto_alert: Cell::new(auto_alert),
                alert,
            }),
            modules: Vec::new(),
            arena: Arena::new(),
        }
    }

    pub fn host(&self) -> &Host<R> {
        &self.host
    }

    /// Enable/disable immediate surfacing of captured failures.
    pub fn set_auto_alert(&self, enabled: bool) {
        self.shared.auto_alert.set(enabled);
    }

    pub fn auto_alert(&self) -> bool {
        self.shared.auto_alert.get()
    }

    /// Import a module by name. Importing an already-imported module is a
    /// no-op success. On failure the error record gets context
    /// `Importing <name>`.
    pub fn import_module(&mut self, name: &str) -> bool {
        if self.loaded_module(name).is_some() {
            return true;
        }
        match self.host.runtime().import_by_name(name) {
            Some(raw) => {
                let module = self.host.adopt(raw);
                debug!(module = name, "imported module");
                self.modules.push((name.to_string(), module));
                true
            }
            None => {
                record_failure(
                    &self.host,
                    &self.shared,
                    format!("Importing {name}"),
                    "import",
                    format!("module {name} not found"),
                );
                if self.shared.auto_alert.get() {
                    debug!(path = ?self.host.runtime().search_path(), "module search path");
                }
                false
            }
        }
    }

    fn loaded_module(&self, name: &str) -> Option<&ObjRef<R>> {
        self.modules
            .iter()
            .find(|(loaded, _)| loaded == name)
            .map(|(_, module)| module)
    }

    /// The module, importing it on demand.
    fn resolve_module(&mut self, name: &str) -> Option<ObjRef<R>> {
        if self.loaded_module(name).is_none() && !self.import_module(name) {
            return None;
        }
        self.loaded_module(name).map(ObjRef::clone_ref)
    }

    /// Call `function` from `module`, importing the module on demand.
    ///
    /// `args` follows the call protocol: it is converted with forced
    /// sequence shape, so `None` means no arguments and a single scalar
    /// becomes a one-argument list. The result Value is owned by the
    /// session arena; the returned handle stays valid until the next
    /// [`Session::flush_result_arena`].
    pub fn call_function(
        &mut self,
        module: &str,
        function: &str,
        args: Option<&Value>,
    ) -> Option<ValueRef> {
        let context = || format!("Calling function {function} in module {module}");
        let Some(module_obj) = self.resolve_module(module) else {
            record_local(
                &self.shared,
                context(),
                "resolution",
                format!("module {module} is not available"),
            );
            return None;
        };
        let rt = self.host.runtime();
        let Some(func_raw) = rt.get_attribute(module_obj.raw(), function) else {
            record_failure(
                &self.host,
                &self.shared,
                context(),
                "resolution",
                format!("no attribute {function} in module {module}"),
            );
            return None;
        };
        let func = self.host.adopt(func_raw);
        if !rt.is_callable(func.raw()) {
            record_local(
                &self.shared,
                context(),
                "resolution",
                format!("{function} in module {module} is not callable"),
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
                "call raised an error".to_string(),
            );
            return None;
        };
        let result = self.host.adopt(result_raw);
        let value = from_native(&self.host, result.raw());
        debug!(module, function, "function call succeeded");
        Some(self.arena.insert(value))
    }

    /// Construct an instance of `class_name` from `module`. The returned
    /// Instance owns the runtime object and its own method-result arena,
    /// and reports failures into this session's error record.
    pub fn new_instance(
        &mut self,
        module: &str,
        class_name: &str,
        args: Option<&Value>,
    ) -> Option<Instance<R>> {
        let context = || format!("Creating instance of class {class_name} from module {module}");
        let Some(module_obj) = self.resolve_module(module) else {
            record_local(
                &self.shared,
                context(),
                "resolution",
                format!("module {module} is not available"),
            );
            return None;
        };
        let rt = self.host.runtime();
        let Some(class_raw) = rt.get_attribute(module_obj.raw(), class_name) else {
            record_failure(
                &self.host,
                &self.shared,
                context(),
                "resolution",
                format!("no class {class_name} in module {module}"),
            );
            return None;
        };
        let class = self.host.adopt(class_raw);
        let native_args = to_native(&self.host, args.unwrap_or(&Value::None), true);
        let Some(instance_raw) = rt.instantiate(class.raw(), native_args.raw()) else {
            record_failure(
                &self.host,
                &self.shared,
                context(),
                "runtime",
                format!("constructor of {class_name} raised an error"),
            );
            return None;
        };
        let object = self.host.adopt(instance_raw);
        debug!(module, class = class_name, "instance created");
        Some(Instance::new(
            self.host.clone(),
            Rc::clone(&self.shared),
            object,
        ))
    }

    /// Build a Value from the format mini-language and register it in the
    /// session arena. See [`tether_core::build_value`] for the grammar.
    pub fn build_value(&mut self, format: &str, args: &[BuildArg]) -> Option<ValueRef> {
        match tether_core::build_value(format, args) {
            Ok(value) => Some(self.arena.insert(value)),
            Err(err) => {
                record_local(
                    &self.shared,
                    format!("Building value from format \"{format}\""),
                    "format",
                    err.to_string(),
                );
                None
            }
        }
    }

    /// Resolve a result handle. `None` when the handle predates the last
    /// flush (or belongs to an Instance arena).
    pub fn value(&self, handle: ValueRef) -> Option<&Value> {
        self.arena.get(handle)
    }

    /// Release every Value owned by the session arena. All previously
    /// returned handles become invalid.
    pub fn flush_result_arena(&mut self) {
        debug!(count = self.arena.len(), "flushing session result arena");
        self.arena.flush();
    }

    /// Read access to the session's single error record.
    pub fn last_error(&self) -> Ref<'_, ErrorRecord> {
        self.shared.last_error.borrow()
    }

    /// Push the current error record to the alert sink, for callers that
    /// run with auto-alert disabled and surface failures later.
    pub fn raise_last_error(&self) {
        self.shared.raise();
    }

    /// Append one absolute path to the runtime's module search path.
    pub fn append_search_path(&self, path: &str) {
        self.host.runtime().append_search_path(path);
    }

    /// The runtime's current module search path.
    pub fn search_path(&self) -> Vec<String> {
        self.host.runtime().search_path()
    }
}
