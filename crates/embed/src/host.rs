//! Process-scoped runtime host and scoped object ownership
//!
//! The embedded interpreter is process-wide state with a strict
//! init-once/shutdown-once lifecycle. `Host` models that lifecycle
//! explicitly: constructing a `Host` initializes the runtime, and dropping
//! the last clone of it shuts the runtime down. Sessions, instances and
//! every live native handle hold a `Host` clone, so the interpreter can
//! never be finalized while something still points into it.
//!
//! `ObjRef` is the ownership guard for one native handle. The runtime
//! boundary hands out strong references that must be released exactly once;
//! wrapping each acquisition in an `ObjRef` makes release automatic on
//! every exit path, including early-return failure branches.

use std::rc::Rc;

use crate::runtime::Runtime;

struct HostInner<R: Runtime> {
    runtime: R,
}

impl<R: Runtime> Drop for HostInner<R> {
    fn drop(&mut self) {
        self.runtime.shutdown();
    }
}

/// Shared handle to the process-scoped interpreter state.
///
/// Cloning is cheap (one `Rc`). The bridge is single-threaded by design;
/// hosts and everything holding them stay on the creating thread.
pub struct Host<R: Runtime> {
    inner: Rc<HostInner<R>>,
}

impl<R: Runtime> Host<R> {
    /// Take ownership of `runtime` and initialize it.
    pub fn new(runtime: R) -> Self {
        runtime.initialize();
        Host {
            inner: Rc::new(HostInner { runtime }),
        }
    }

    pub fn runtime(&self) -> &R {
        &self.inner.runtime
    }

    /// Wrap an owned native handle in a release-on-drop guard.
    pub fn adopt(&self, raw: R::Object) -> ObjRef<R> {
        ObjRef {
            host: self.clone(),
            raw: Some(raw),
        }
    }
}

impl<R: Runtime> Clone for Host<R> {
    fn clone(&self) -> Self {
        Host {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Owning guard over one native object reference.
///
/// Dropping the guard releases the reference. Ownership can be handed to a
/// consuming runtime constructor with [`ObjRef::into_raw`], or duplicated
/// with [`ObjRef::clone_ref`], which retains first.
pub struct ObjRef<R: Runtime> {
    host: Host<R>,
    // None only transiently inside into_raw/drop
    raw: Option<R::Object>,
}

impl<R: Runtime> ObjRef<R> {
    /// Borrow the underlying handle.
    pub fn raw(&self) -> &R::Object {
        self.raw.as_ref().expect("guard holds its object until consumed")
    }

    pub fn host(&self) -> &Host<R> {
        &self.host
    }

    /// A second owning guard for the same object.
    pub fn clone_ref(&self) -> ObjRef<R> {
        let raw = self.raw();
        self.host.runtime().retain(raw);
        ObjRef {
            host: self.host.clone(),
            raw: Some(raw.clone()),
        }
    }

    /// Give up the guard without releasing; the caller (usually a
    /// consuming constructor like `new_sequence`) takes over the duty.
    pub fn into_raw(mut self) -> R::Object {
        self.raw.take().expect("guard holds its object until consumed")
    }
}

impl<R: Runtime> Drop for ObjRef<R> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            self.host.runtime().release(&raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubRuntime;

    #[test]
    fn test_objref_releases_on_drop() {
        let rt = StubRuntime::new();
        let host = Host::new(rt.clone());
        let baseline = rt.live_object_count();
        {
            let _guard = host.adopt(rt.new_int(5));
            assert_eq!(rt.live_object_count(), baseline + 1);
        }
        assert_eq!(rt.live_object_count(), baseline);
        assert!(rt.ledger_ok());
    }

    #[test]
    fn test_clone_ref_retains() {
        let rt = StubRuntime::new();
        let host = Host::new(rt.clone());
        let a = host.adopt(rt.new_int(5));
        let b = a.clone_ref();
        drop(a);
        // still alive through b
        assert_eq!(rt.live_object_count(), 1);
        drop(b);
        assert_eq!(rt.live_object_count(), 0);
        assert!(rt.ledger_ok());
    }

    #[test]
    fn test_into_raw_transfers_ownership() {
        let rt = StubRuntime::new();
        let host = Host::new(rt.clone());
        let guard = host.adopt(rt.new_int(5));
        let raw = guard.into_raw();
        assert_eq!(rt.live_object_count(), 1);
        rt.release(&raw);
        assert_eq!(rt.live_object_count(), 0);
        assert!(rt.ledger_ok());
    }
}
