//! In-memory stub runtime
//!
//! A self-contained [`Runtime`] implementation backed by an id-indexed,
//! reference-counted object heap. It backs the test suite and doubles as a
//! reference implementation of the boundary contract: every owned handle
//! the trait hands out is tracked in the heap, so tests can assert that
//! conversions and failure paths release exactly what they acquired.
//!
//! Host code registers modules up front:
//!
//! ```
//! use tether_embed::stub::{Raise, StubRuntime};
//! use tether_core::Value;
//!
//! let rt = StubRuntime::new();
//! rt.register_function("math", "add", |args| {
//!     let a = args.as_seq().get(0).as_int();
//!     let b = args.as_seq().get(1).as_int();
//!     Ok(Value::Int(a + b))
//! });
//! rt.register_function("math", "fail", |_| {
//!     Err(Raise::new("ValueError", "always fails"))
//! });
//! ```
//!
//! The stub is deliberately strict about reference counts: releasing an
//! unknown id or over-releasing does not panic (drop paths must stay
//! quiet) but flips the ledger, and `ledger_ok()` reports it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tether_core::{Mapping, Value};

use crate::runtime::{Runtime, TypeTag};

/// An error raised by a registered stub function, method or constructor.
#[derive(Debug, Clone)]
pub struct Raise {
    pub category: String,
    pub message: String,
}

impl Raise {
    pub fn new(category: &str, message: &str) -> Self {
        Raise {
            category: category.to_string(),
            message: message.to_string(),
        }
    }
}

type StubFn = Rc<dyn Fn(&Value) -> Result<Value, Raise>>;
type InitFn = Rc<dyn Fn(&Value) -> Result<Value, Raise>>;
type MethodFn = Rc<dyn Fn(&mut Value, &Value) -> Result<Value, Raise>>;

#[derive(Clone, Default)]
struct ModuleSpec {
    functions: HashMap<String, StubFn>,
    classes: HashMap<String, ClassSpec>,
    values: HashMap<String, Value>,
}

#[derive(Clone)]
struct ClassSpec {
    init: InitFn,
    methods: HashMap<String, MethodFn>,
}

impl Default for ClassSpec {
    fn default() -> Self {
        ClassSpec {
            init: Rc::new(|_| Ok(Value::None)),
            methods: HashMap::new(),
        }
    }
}

/// Heap payloads. Two integer shapes and two string shapes exist on
/// purpose: they model the legacy/modern scalar split of real runtimes
/// that the conversion layer folds into one Value tag each.
enum Datum {
    NoneVal,
    Int(i64),
    WideInt(i64),
    Float(f64),
    Text(String),
    Bytes(String),
    List(Vec<u64>),
    Tuple(Vec<u64>),
    Dict(Vec<(u64, u64)>),
    Module(String),
    Function { module: String, name: String },
    Class { module: String, name: String },
    InstanceObj { module: String, class: String, state: Value },
    Bound { target: u64, method: String },
    Opaque(String),
}

struct Slot {
    refs: u32,
    datum: Datum,
}

struct Pending {
    category: String,
    message: String,
    traceback: String,
}

#[derive(Default)]
struct StubState {
    next_id: u64,
    objects: HashMap<u64, Slot>,
    registry: HashMap<String, ModuleSpec>,
    search_path: Vec<String>,
    pending: Option<Pending>,
    init_count: u32,
    shutdown_count: u32,
    ledger_violations: u32,
}

impl StubState {
    fn alloc(&mut self, datum: Datum) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.objects.insert(id, Slot { refs: 1, datum });
        id
    }

    fn retain(&mut self, id: u64) {
        match self.objects.get_mut(&id) {
            Some(slot) => slot.refs += 1,
            None => self.ledger_violations += 1,
        }
    }

    fn release(&mut self, id: u64) {
        let children = match self.objects.get_mut(&id) {
            Some(slot) => {
                slot.refs -= 1;
                if slot.refs > 0 {
                    return;
                }
                let slot = self.objects.remove(&id).expect("slot present");
                children_of(&slot.datum)
            }
            None => {
                self.ledger_violations += 1;
                return;
            }
        };
        for child in children {
            self.release(child);
        }
    }

    fn set_pending(&mut self, category: &str, message: String, traceback: String) {
        self.pending = Some(Pending {
            category: category.to_string(),
            message,
            traceback,
        });
    }

    fn export(&self, id: u64) -> Value {
        match self.objects.get(&id).map(|slot| &slot.datum) {
            Some(Datum::Int(n)) | Some(Datum::WideInt(n)) => Value::Int(*n),
            Some(Datum::Float(x)) => Value::Float(*x),
            Some(Datum::Text(s)) | Some(Datum::Bytes(s)) => Value::Str(s.clone()),
            Some(Datum::List(items)) | Some(Datum::Tuple(items)) => {
                Value::Seq(items.iter().map(|item| self.export(*item)).collect())
            }
            Some(Datum::Dict(pairs)) => Value::Map(
                pairs
                    .iter()
                    .map(|(k, v)| (self.export(*k), self.export(*v)))
                    .collect::<Mapping>(),
            ),
            _ => Value::None,
        }
    }

    fn import(&mut self, value: &Value) -> u64 {
        match value {
            Value::None => self.alloc(Datum::NoneVal),
            Value::Int(n) => self.alloc(Datum::Int(*n)),
            Value::Float(x) => self.alloc(Datum::Float(*x)),
            Value::Str(s) => self.alloc(Datum::Text(s.clone())),
            Value::Seq(seq) => {
                let items: Vec<u64> = seq.iter().map(|item| self.import(item)).collect();
                self.alloc(Datum::Tuple(items))
            }
            Value::Map(map) => {
                let pairs: Vec<(u64, u64)> = map
                    .iter()
                    .map(|(k, v)| (self.import(k), self.import(v)))
                    .collect();
                self.alloc(Datum::Dict(pairs))
            }
        }
    }

    fn describe(&self, id: u64) -> String {
        match self.objects.get(&id).map(|slot| &slot.datum) {
            Some(Datum::NoneVal) => "None".to_string(),
            Some(Datum::Int(n)) | Some(Datum::WideInt(n)) => n.to_string(),
            Some(Datum::Float(x)) => x.to_string(),
            Some(Datum::Text(s)) | Some(Datum::Bytes(s)) => s.clone(),
            Some(Datum::List(items)) => format!("<list of {}>", items.len()),
            Some(Datum::Tuple(items)) => format!("<tuple of {}>", items.len()),
            Some(Datum::Dict(pairs)) => format!("<dict of {}>", pairs.len()),
            Some(Datum::Module(name)) => format!("<module {name}>"),
            Some(Datum::Function { module, name }) => format!("<function {module}.{name}>"),
            Some(Datum::Class { module, name }) => format!("<class {module}.{name}>"),
            Some(Datum::InstanceObj { module, class, .. }) => {
                format!("<{module}.{class} instance>")
            }
            Some(Datum::Bound { method, .. }) => format!("<bound method {method}>"),
            Some(Datum::Opaque(label)) => format!("<{label}>"),
            None => "<released object>".to_string(),
        }
    }
}

fn children_of(datum: &Datum) -> Vec<u64> {
    match datum {
        Datum::List(items) | Datum::Tuple(items) => items.clone(),
        Datum::Dict(pairs) => pairs.iter().flat_map(|(k, v)| [*k, *v]).collect(),
        Datum::Bound { target, .. } => vec![*target],
        _ => Vec::new(),
    }
}

/// What `invoke`/`instantiate` resolved a callable to, pulled out of the
/// state borrow so user callbacks run without holding it.
enum Callable {
    Function(StubFn, String, String),
    Constructor(InitFn, String, String),
    Method(MethodFn, u64, String, String),
    Not(String),
}

/// Shared-state in-memory runtime. Clones share one heap, so a test can
/// keep a handle while the [`Host`](crate::host::Host) owns another.
#[derive(Clone, Default)]
pub struct StubRuntime {
    state: Rc<RefCell<StubState>>,
}

impl StubRuntime {
    pub fn new() -> Self {
        StubRuntime::default()
    }

    // -- registration --

    pub fn register_function(
        &self,
        module: &str,
        name: &str,
        f: impl Fn(&Value) -> Result<Value, Raise> + 'static,
    ) {
        let mut st = self.state.borrow_mut();
        st.registry
            .entry(module.to_string())
            .or_default()
            .functions
            .insert(name.to_string(), Rc::new(f));
    }

    /// Register a plain (non-callable) module attribute.
    pub fn register_value(&self, module: &str, name: &str, value: Value) {
        let mut st = self.state.borrow_mut();
        st.registry
            .entry(module.to_string())
            .or_default()
            .values
            .insert(name.to_string(), value);
    }

    /// Register a class; `init` receives the constructor arguments and
    /// returns the instance state.
    pub fn register_class(
        &self,
        module: &str,
        class: &str,
        init: impl Fn(&Value) -> Result<Value, Raise> + 'static,
    ) {
        let mut st = self.state.borrow_mut();
        let spec = st
            .registry
            .entry(module.to_string())
            .or_default()
            .classes
            .entry(class.to_string())
            .or_default();
        spec.init = Rc::new(init);
    }

    /// Register a method; `f` receives the mutable instance state and the
    /// call arguments.
    pub fn register_method(
        &self,
        module: &str,
        class: &str,
        method: &str,
        f: impl Fn(&mut Value, &Value) -> Result<Value, Raise> + 'static,
    ) {
        let mut st = self.state.borrow_mut();
        st.registry
            .entry(module.to_string())
            .or_default()
            .classes
            .entry(class.to_string())
            .or_default()
            .methods
            .insert(method.to_string(), Rc::new(f));
    }

    // -- legacy/extra object shapes for conversion tests --

    /// A wide-integer object (second native integer shape).
    pub fn alloc_wide_int(&self, value: i64) -> u64 {
        self.state.borrow_mut().alloc(Datum::WideInt(value))
    }

    /// A byte-string object (second native string shape).
    pub fn alloc_legacy_str(&self, value: &str) -> u64 {
        self.state
            .borrow_mut()
            .alloc(Datum::Bytes(value.to_string()))
    }

    /// An object of no recognized category.
    pub fn alloc_opaque(&self, label: &str) -> u64 {
        self.state
            .borrow_mut()
            .alloc(Datum::Opaque(label.to_string()))
    }

    /// A list-like object. Takes ownership of `items`.
    pub fn alloc_list(&self, items: Vec<u64>) -> u64 {
        self.state.borrow_mut().alloc(Datum::List(items))
    }

    // -- ledger access for tests --

    pub fn live_object_count(&self) -> usize {
        self.state.borrow().objects.len()
    }

    /// False when anything retained or released a handle it did not own.
    pub fn ledger_ok(&self) -> bool {
        self.state.borrow().ledger_violations == 0
    }

    pub fn initialize_count(&self) -> u32 {
        self.state.borrow().init_count
    }

    pub fn shutdown_count(&self) -> u32 {
        self.state.borrow().shutdown_count
    }

    // -- callable resolution, outside the user-callback path --

    fn resolve_callable(&self, id: u64) -> Callable {
        let st = self.state.borrow();
        match st.objects.get(&id).map(|slot| &slot.datum) {
            Some(Datum::Function { module, name }) => {
                match st
                    .registry
                    .get(module)
                    .and_then(|spec| spec.functions.get(name))
                {
                    Some(f) => Callable::Function(Rc::clone(f), module.clone(), name.clone()),
                    None => Callable::Not(format!("{module}.{name}")),
                }
            }
            Some(Datum::Class { module, name }) => {
                match st
                    .registry
                    .get(module)
                    .and_then(|spec| spec.classes.get(name))
                {
                    Some(class) => {
                        Callable::Constructor(Rc::clone(&class.init), module.clone(), name.clone())
                    }
                    None => Callable::Not(format!("{module}.{name}")),
                }
            }
            Some(Datum::Bound { target, method }) => {
                let found = match st.objects.get(target).map(|slot| &slot.datum) {
                    Some(Datum::InstanceObj { module, class, .. }) => st
                        .registry
                        .get(module)
                        .and_then(|spec| spec.classes.get(class))
                        .and_then(|class_spec| class_spec.methods.get(method))
                        .map(|f| (Rc::clone(f), format!("{module}.{class}"))),
                    _ => None,
                };
                match found {
                    Some((f, qual)) => Callable::Method(f, *target, qual, method.clone()),
                    None => Callable::Not(method.clone()),
                }
            }
            Some(other) => Callable::Not(describe_datum_kind(other)),
            None => Callable::Not("<released object>".to_string()),
        }
    }
}

fn describe_datum_kind(datum: &Datum) -> String {
    match datum {
        Datum::Module(name) => format!("<module {name}>"),
        Datum::Opaque(label) => format!("<{label}>"),
        _ => "<object>".to_string(),
    }
}

impl Runtime for StubRuntime {
    type Object = u64;

    fn initialize(&self) {
        self.state.borrow_mut().init_count += 1;
    }

    fn shutdown(&self) {
        self.state.borrow_mut().shutdown_count += 1;
    }

    fn import_by_name(&self, name: &str) -> Option<u64> {
        let mut st = self.state.borrow_mut();
        if st.registry.contains_key(name) {
            Some(st.alloc(Datum::Module(name.to_string())))
        } else {
            st.set_pending(
                "ImportError",
                format!("no module named '{name}'"),
                String::new(),
            );
            None
        }
    }

    fn get_attribute(&self, object: &u64, name: &str) -> Option<u64> {
        let mut st = self.state.borrow_mut();
        let found = match st.objects.get(object).map(|slot| &slot.datum) {
            Some(Datum::Module(module)) => {
                let module = module.clone();
                match st.registry.get(&module) {
                    Some(spec) if spec.functions.contains_key(name) => Some(Datum::Function {
                        module,
                        name: name.to_string(),
                    }),
                    Some(spec) if spec.classes.contains_key(name) => Some(Datum::Class {
                        module,
                        name: name.to_string(),
                    }),
                    Some(spec) if spec.values.contains_key(name) => {
                        let value = spec.values[name].clone();
                        let id = st.import(&value);
                        return Some(id);
                    }
                    _ => None,
                }
            }
            Some(Datum::InstanceObj { module, class, .. }) => {
                let known = st
                    .registry
                    .get(module)
                    .and_then(|spec| spec.classes.get(class))
                    .is_some_and(|spec| spec.methods.contains_key(name));
                if known {
                    Some(Datum::Bound {
                        target: *object,
                        method: name.to_string(),
                    })
                } else {
                    None
                }
            }
            _ => None,
        };
        match found {
            Some(datum) => {
                if let Datum::Bound { target, .. } = &datum {
                    st.retain(*target);
                }
                Some(st.alloc(datum))
            }
            None => {
                let owner = st.describe(*object);
                st.set_pending(
                    "AttributeError",
                    format!("{owner} has no attribute '{name}'"),
                    String::new(),
                );
                None
            }
        }
    }

    fn is_callable(&self, object: &u64) -> bool {
        let st = self.state.borrow();
        matches!(
            st.objects.get(object).map(|slot| &slot.datum),
            Some(Datum::Function { .. }) | Some(Datum::Class { .. }) | Some(Datum::Bound { .. })
        )
    }

    fn invoke(&self, callable: &u64, args: &u64) -> Option<u64> {
        let (resolved, args_value) = {
            let st = self.state.borrow();
            (self.resolve_callable(*callable), st.export(*args))
        };
        match resolved {
            Callable::Function(f, module, name) => match f(&args_value) {
                Ok(value) => Some(self.state.borrow_mut().import(&value)),
                Err(raise) => {
                    self.state.borrow_mut().set_pending(
                        &raise.category,
                        raise.message,
                        format!("  at {module}.{name}\n"),
                    );
                    None
                }
            },
            Callable::Constructor(..) => self.instantiate(callable, args),
            Callable::Method(f, target, qual, method) => {
                let mut state_value = {
                    let mut st = self.state.borrow_mut();
                    match st.objects.get_mut(&target).map(|slot| &mut slot.datum) {
                        Some(Datum::InstanceObj { state, .. }) => std::mem::take(state),
                        _ => return None,
                    }
                };
                let result = f(&mut state_value, &args_value);
                let mut st = self.state.borrow_mut();
                if let Some(Datum::InstanceObj { state, .. }) =
                    st.objects.get_mut(&target).map(|slot| &mut slot.datum)
                {
                    *state = state_value;
                }
                match result {
                    Ok(value) => Some(st.import(&value)),
                    Err(raise) => {
                        st.set_pending(
                            &raise.category,
                            raise.message,
                            format!("  at {qual}.{method}\n"),
                        );
                        None
                    }
                }
            }
            Callable::Not(what) => {
                self.state.borrow_mut().set_pending(
                    "TypeError",
                    format!("{what} is not callable"),
                    String::new(),
                );
                None
            }
        }
    }

    fn instantiate(&self, class: &u64, args: &u64) -> Option<u64> {
        let (resolved, args_value) = {
            let st = self.state.borrow();
            (self.resolve_callable(*class), st.export(*args))
        };
        match resolved {
            Callable::Constructor(init, module, name) => match init(&args_value) {
                Ok(state_value) => Some(self.state.borrow_mut().alloc(Datum::InstanceObj {
                    module,
                    class: name,
                    state: state_value,
                })),
                Err(raise) => {
                    self.state.borrow_mut().set_pending(
                        &raise.category,
                        raise.message,
                        format!("  at {module}.{name}\n"),
                    );
                    None
                }
            },
            _ => {
                self.state.borrow_mut().set_pending(
                    "TypeError",
                    "object is not a class".to_string(),
                    String::new(),
                );
                None
            }
        }
    }

    fn type_of(&self, object: &u64) -> TypeTag {
        let st = self.state.borrow();
        match st.objects.get(object).map(|slot| &slot.datum) {
            Some(Datum::List(_)) => TypeTag::List,
            Some(Datum::Text(_)) => TypeTag::Text,
            Some(Datum::Float(_)) => TypeTag::Float,
            Some(Datum::Int(_)) => TypeTag::Int,
            Some(Datum::WideInt(_)) => TypeTag::Long,
            Some(Datum::Bytes(_)) => TypeTag::Str,
            Some(Datum::Tuple(_)) => TypeTag::Tuple,
            Some(Datum::Dict(_)) => TypeTag::Dict,
            _ => TypeTag::Opaque,
        }
    }

    fn as_int(&self, object: &u64) -> i64 {
        let st = self.state.borrow();
        match st.objects.get(object).map(|slot| &slot.datum) {
            Some(Datum::Int(n)) | Some(Datum::WideInt(n)) => *n,
            _ => 0,
        }
    }

    fn as_float(&self, object: &u64) -> f64 {
        let st = self.state.borrow();
        match st.objects.get(object).map(|slot| &slot.datum) {
            Some(Datum::Float(x)) => *x,
            _ => 0.0,
        }
    }

    fn as_str(&self, object: &u64) -> String {
        let st = self.state.borrow();
        match st.objects.get(object).map(|slot| &slot.datum) {
            Some(Datum::Text(s)) | Some(Datum::Bytes(s)) => s.clone(),
            _ => String::new(),
        }
    }

    fn normalize_sequence(&self, object: &u64) -> u64 {
        let mut st = self.state.borrow_mut();
        let items = match st.objects.get(object).map(|slot| &slot.datum) {
            Some(Datum::List(items)) | Some(Datum::Tuple(items)) => items.clone(),
            _ => Vec::new(),
        };
        for item in &items {
            st.retain(*item);
        }
        st.alloc(Datum::Tuple(items))
    }

    fn sequence_len(&self, object: &u64) -> usize {
        let st = self.state.borrow();
        match st.objects.get(object).map(|slot| &slot.datum) {
            Some(Datum::List(items)) | Some(Datum::Tuple(items)) => items.len(),
            _ => 0,
        }
    }

    fn sequence_get(&self, object: &u64, index: usize) -> Option<u64> {
        let mut st = self.state.borrow_mut();
        let item = match st.objects.get(object).map(|slot| &slot.datum) {
            Some(Datum::List(items)) | Some(Datum::Tuple(items)) => items.get(index).copied(),
            _ => None,
        };
        if let Some(id) = item {
            st.retain(id);
        }
        item
    }

    fn mapping_items(&self, object: &u64) -> Vec<(u64, u64)> {
        let mut st = self.state.borrow_mut();
        let pairs = match st.objects.get(object).map(|slot| &slot.datum) {
            Some(Datum::Dict(pairs)) => pairs.clone(),
            _ => Vec::new(),
        };
        for (key, value) in &pairs {
            st.retain(*key);
            st.retain(*value);
        }
        pairs
    }

    fn new_int(&self, value: i64) -> u64 {
        self.state.borrow_mut().alloc(Datum::Int(value))
    }

    fn new_float(&self, value: f64) -> u64 {
        self.state.borrow_mut().alloc(Datum::Float(value))
    }

    fn new_str(&self, value: &str) -> u64 {
        self.state
            .borrow_mut()
            .alloc(Datum::Text(value.to_string()))
    }

    fn new_sequence(&self, items: Vec<u64>) -> u64 {
        self.state.borrow_mut().alloc(Datum::Tuple(items))
    }

    fn new_mapping(&self, items: Vec<(u64, u64)>) -> u64 {
        self.state.borrow_mut().alloc(Datum::Dict(items))
    }

    fn none(&self) -> u64 {
        self.state.borrow_mut().alloc(Datum::NoneVal)
    }

    fn take_error(&self) -> Option<(u64, Option<u64>, Option<u64>)> {
        let mut st = self.state.borrow_mut();
        let pending = st.pending.take()?;
        let category = st.alloc(Datum::Text(pending.category));
        let message = st.alloc(Datum::Text(pending.message));
        let traceback = if pending.traceback.is_empty() {
            None
        } else {
            Some(st.alloc(Datum::Text(pending.traceback)))
        };
        Some((category, Some(message), traceback))
    }

    fn describe(&self, object: &u64) -> String {
        self.state.borrow().describe(*object)
    }

    fn render_traceback(&self, traceback: &u64) -> String {
        self.state.borrow().describe(*traceback)
    }

    fn retain(&self, object: &u64) {
        self.state.borrow_mut().retain(*object);
    }

    fn release(&self, object: &u64) {
        self.state.borrow_mut().release(*object);
    }

    fn append_search_path(&self, path: &str) {
        self.state.borrow_mut().search_path.push(path.to_string());
    }

    fn search_path(&self) -> Vec<String> {
        self.state.borrow().search_path.clone()
    }
}
