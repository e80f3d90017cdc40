//! Tether Core: the value layer of an embedding bridge
//!
//! This crate provides the host-side mirror of a dynamic interpreter's value
//! universe, independent of any particular interpreter:
//! - Value: What the embedded runtime talks about (none, int, float, string,
//!   sequence, mapping), with deep-copy semantics and a total order
//! - Sequence / Mapping: owned containers of Values
//! - Arena: session-scoped owner of call results, handing out
//!   generation-checked references instead of raw pointers
//! - build_value: a compact format mini-language for constructing Values
//!   without an interpreter round trip
//!
//! Key design principles:
//! - Copying a Value copies everything underneath it. Two Values never share
//!   a nested container, so mutating one can never be observed through the
//!   other.
//! - Values order by tag first, then by tag-local comparison. Mapping keys
//!   depend on this order being total.
//! - Probing accessors never panic: a mismatched tag yields the tag's zero
//!   value, because host code is usually inspecting a dynamically typed
//!   result it does not control.
//!
//! # Modules
//!
//! - `value`: Value, Sequence, Mapping, ordering and rendering
//! - `arena`: result ownership with generation-checked handles
//! - `format`: the build-value format mini-language

pub mod arena;
pub mod format;
pub mod value;

pub use arena::{Arena, ValueRef};
pub use format::{BuildArg, BuildError, build_value};
pub use value::{Kind, Mapping, Sequence, Value};
