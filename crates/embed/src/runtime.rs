//! The runtime boundary
//!
//! `Runtime` is the narrow interface the bridge consumes from an embedded
//! dynamic interpreter. Everything interpreter-specific lives behind it:
//! process lifecycle, module import, attribute and call dispatch, type
//! introspection, object construction and the interpreter's error state.
//! The bridge core never names a concrete interpreter.
//!
//! # Reference ownership
//!
//! `Object` is an opaque strong-reference handle. Every `Object` returned
//! by a trait method is owned by the caller and must be released exactly
//! once; in bridge code that duty always sits with an
//! [`ObjRef`](crate::host::ObjRef) guard so early-return paths cannot leak.
//! Methods taking `&Object` borrow without consuming.
//! `new_sequence` and `new_mapping` are the exception in the other
//! direction: they take ownership of the element handles passed in.

/// The closed set of type categories the conversion layer dispatches on.
///
/// `type_of` must classify with a fixed priority: a list-like object
/// reports `List` even when it would also satisfy a generic sequence
/// check, because the winning category decides which Value tag the
/// object converts to. Two native integer shapes (`Int`, `Long`) both
/// convert to the integer tag; two native text shapes (`Text`, `Str`)
/// both convert to the string tag. Anything else is `Opaque` and
/// converts to the none value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    List,
    Text,
    Float,
    Int,
    Long,
    Str,
    Tuple,
    Dict,
    Opaque,
}

/// Narrow interface to an embedded dynamic interpreter.
///
/// Single-threaded by contract: all methods are called from the thread
/// that owns the [`Host`](crate::host::Host). Implementations use interior
/// mutability rather than `&mut self` so borrows of unrelated objects can
/// overlap.
pub trait Runtime {
    /// Opaque strong-reference handle to one native object. Cloning the
    /// handle does not retain; use [`Runtime::retain`] for that.
    type Object: Clone;

    // -- process lifecycle (driven by Host, once each) --

    fn initialize(&self);
    fn shutdown(&self);

    // -- modules, attributes, calls --

    /// Import a module by name. `None` leaves the failure in the error
    /// state for [`Runtime::take_error`].
    fn import_by_name(&self, name: &str) -> Option<Self::Object>;

    /// Attribute lookup on any object (module, instance, ...).
    fn get_attribute(&self, object: &Self::Object, name: &str) -> Option<Self::Object>;

    fn is_callable(&self, object: &Self::Object) -> bool;

    /// Call `callable` with a sequence-shaped argument object.
    fn invoke(&self, callable: &Self::Object, args: &Self::Object) -> Option<Self::Object>;

    /// Construct an instance of `class` with sequence-shaped arguments.
    fn instantiate(&self, class: &Self::Object, args: &Self::Object) -> Option<Self::Object>;

    // -- introspection and scalar access --

    fn type_of(&self, object: &Self::Object) -> TypeTag;
    fn as_int(&self, object: &Self::Object) -> i64;
    fn as_float(&self, object: &Self::Object) -> f64;
    fn as_str(&self, object: &Self::Object) -> String;

    // -- container access --

    /// Snapshot a list-like object into a tuple-like one. The result is a
    /// conversion temporary owned by the caller.
    fn normalize_sequence(&self, object: &Self::Object) -> Self::Object;
    fn sequence_len(&self, object: &Self::Object) -> usize;
    fn sequence_get(&self, object: &Self::Object, index: usize) -> Option<Self::Object>;
    /// All key/value pairs of a dict-like object, as owned handles.
    fn mapping_items(&self, object: &Self::Object) -> Vec<(Self::Object, Self::Object)>;

    // -- construction --

    fn new_int(&self, value: i64) -> Self::Object;
    fn new_float(&self, value: f64) -> Self::Object;
    fn new_str(&self, value: &str) -> Self::Object;
    /// Takes ownership of `items`.
    fn new_sequence(&self, items: Vec<Self::Object>) -> Self::Object;
    /// Takes ownership of both handles in every pair.
    fn new_mapping(&self, items: Vec<(Self::Object, Self::Object)>) -> Self::Object;
    /// The canonical empty/null object.
    fn none(&self) -> Self::Object;

    // -- error state --

    /// Fetch and clear the pending error: (category object, payload
    /// object, traceback object). All three are owned by the caller.
    fn take_error(
        &self,
    ) -> Option<(Self::Object, Option<Self::Object>, Option<Self::Object>)>;

    /// Human-readable rendering of any object.
    fn describe(&self, object: &Self::Object) -> String;

    /// Render a traceback object to text.
    fn render_traceback(&self, traceback: &Self::Object) -> String;

    // -- reference counts --

    fn retain(&self, object: &Self::Object);
    fn release(&self, object: &Self::Object);

    // -- module search path --

    fn append_search_path(&self, path: &str);
    fn search_path(&self) -> Vec<String>;
}
