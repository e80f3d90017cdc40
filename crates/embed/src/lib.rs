//! Tether Embed: session surface and runtime boundary
//!
//! This crate is the interpreter-facing half of the Tether bridge. It owns
//! everything that touches the embedded runtime:
//!
//! - `runtime`: the narrow [`Runtime`] trait the bridge consumes, with the
//!   closed [`TypeTag`] set the conversion layer dispatches on
//! - `host`: init-once/shutdown-once process state ([`Host`]) and the
//!   [`ObjRef`] guard that releases every acquired native reference on
//!   every exit path
//! - `convert`: total, bidirectional conversion between
//!   [`tether_core::Value`] and native objects
//! - `error`: the per-session [`ErrorRecord`] and the [`AlertSink`]
//!   reporting collaborator
//! - `session` / `instance`: the caller surface — import, call, construct,
//!   build, result arenas, last-error access
//! - `stub`: an in-memory runtime backend with a refcount ledger, used by
//!   the test suite and as a reference implementation of the boundary
//!   contract
//!
//! The bridge is single-threaded and synchronous: every operation runs to
//! completion on the calling thread, and failures come back as `None` or
//! `false` with the detail captured in the session's error record — never
//! as a panic.
//!
//! # Example
//!
//! ```
//! use tether_core::Value;
//! use tether_embed::{Host, Session};
//! use tether_embed::stub::StubRuntime;
//!
//! let rt = StubRuntime::new();
//! rt.register_function("math", "add", |args| {
//!     let a = args.as_seq().get(0).as_int();
//!     let b = args.as_seq().get(1).as_int();
//!     Ok(Value::Int(a + b))
//! });
//!
//! let mut session = Session::new(Host::new(rt));
//! let args = session.build_value("ii", &[40.into(), 2.into()]).unwrap();
//! let args = session.value(args).unwrap().clone();
//! let result = session.call_function("math", "add", Some(&args)).unwrap();
//! assert_eq!(session.value(result), Some(&Value::Int(42)));
//! ```

pub mod convert;
pub mod error;
pub mod host;
pub mod instance;
pub mod runtime;
pub mod session;
pub mod stub;

pub use convert::{from_native, to_native};
pub use error::{AlertSink, ErrorRecord, LogAlert};
pub use host::{Host, ObjRef};
pub use instance::Instance;
pub use runtime::{Runtime, TypeTag};
pub use session::Session;

// Re-export the value layer so bridge users need only one dependency
pub use tether_core::{Arena, BuildArg, BuildError, Kind, Mapping, Sequence, Value, ValueRef};
