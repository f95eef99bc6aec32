//! Owned references to host automation objects.
//!
//! The wrapped object model hands out reference-counted object references;
//! each [`NativeHandle`] owns exactly one such reference and is responsible
//! for giving it back exactly once. Release is idempotent at the handle
//! layer: a handle that has already released (or never held) its reference
//! treats a further release as a no-op, so two wrappers around the same
//! host object can only ever release their own references.

use std::fmt;
use std::sync::Arc;

use crate::disposal::Releasable;
use crate::errors::AutoResult;

/// Host-side automation object, as the bindings layer exposes it.
///
/// Implementations live in the out-of-scope bindings layer over the real
/// automation surface; tests implement it directly with stubs.
pub trait HostObject: Send + Sync {
    /// Stable identity of the underlying automation object.
    fn object_id(&self) -> u64;

    /// Drops one host-side reference.
    fn release(&self) -> AutoResult<()>;
}

/// An owned reference to a native automation object.
///
/// A handle is either attached (holding one host-side reference) or
/// detached. [`NativeHandle::release`] detaches and returns the reference
/// to the host; a second call is a no-op. Dropping a still-attached handle
/// triggers a backstop release that logs instead of propagating, a safety
/// net rather than the primary contract.
pub struct NativeHandle {
    raw: Option<Arc<dyn HostObject>>,
}

impl NativeHandle {
    /// Wraps a host reference the bindings layer just acquired.
    pub fn attach(raw: Arc<dyn HostObject>) -> Self {
        Self { raw: Some(raw) }
    }

    /// A handle holding no reference.
    pub fn detached() -> Self {
        Self { raw: None }
    }

    pub fn is_attached(&self) -> bool {
        self.raw.is_some()
    }

    /// Identity of the referenced object, if attached.
    pub fn object_id(&self) -> Option<u64> {
        self.raw.as_ref().map(|raw| raw.object_id())
    }

    /// Returns the host-side reference. Idempotent: releasing a detached
    /// handle is an `Ok` no-op.
    pub fn release(&mut self) -> AutoResult<()> {
        match self.raw.take() {
            Some(raw) => raw.release(),
            None => Ok(()),
        }
    }
}

impl Default for NativeHandle {
    fn default() -> Self {
        Self::detached()
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.object_id() {
            Some(id) => write!(f, "NativeHandle({id})"),
            None => write!(f, "NativeHandle(detached)"),
        }
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            if let Err(e) = raw.release() {
                tracing::warn!(
                    error = %e,
                    object_id = raw.object_id(),
                    "backstop release of dropped handle failed"
                );
            }
        }
    }
}

/// The state every generated wrapper carries: one owned handle plus a
/// disposed flag.
///
/// Once disposed, [`ObjectState::handle`] returns `None`, so accessors on a
/// disposed wrapper degrade to safe defaults instead of touching the
/// released reference. Disposal is idempotent.
#[derive(Debug, Default)]
pub struct ObjectState {
    handle: NativeHandle,
    disposed: bool,
}

impl ObjectState {
    /// A wrapper state with no backing object.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Adopts `handle` as the backing object.
    ///
    /// Returns `false`, leaving the state untouched, when the handle is
    /// detached, the state is already disposed, or a backing object is
    /// already held.
    pub fn adopt(&mut self, handle: NativeHandle) -> bool {
        if self.disposed || !handle.is_attached() || self.handle.is_attached() {
            return false;
        }
        self.handle = handle;
        true
    }

    /// The live handle, or `None` once disposed or never attached.
    pub fn handle(&self) -> Option<&NativeHandle> {
        if self.disposed || !self.handle.is_attached() {
            None
        } else {
            Some(&self.handle)
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Releases the backing object and marks the state disposed.
    ///
    /// The state ends disposed even when the release fails; a second call
    /// is an `Ok` no-op.
    pub fn dispose(&mut self) -> AutoResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        self.handle.release()
    }
}

impl Releasable for ObjectState {
    fn release(&mut self) -> AutoResult<()> {
        self.dispose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AutoError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubHost {
        id: u64,
        releases: Arc<AtomicUsize>,
        fail: bool,
    }

    impl StubHost {
        fn counted(id: u64, releases: &Arc<AtomicUsize>) -> Arc<Self> {
            Arc::new(Self {
                id,
                releases: Arc::clone(releases),
                fail: false,
            })
        }
    }

    impl HostObject for StubHost {
        fn object_id(&self) -> u64 {
            self.id
        }

        fn release(&self) -> AutoResult<()> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AutoError::Release("stub refused".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn release_is_idempotent() {
        let releases = Arc::new(AtomicUsize::new(0));
        let mut handle = NativeHandle::attach(StubHost::counted(1, &releases));
        assert!(handle.is_attached());
        handle.release().unwrap();
        assert!(!handle.is_attached());
        handle.release().unwrap();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_backstop_releases_attached_handle() {
        let releases = Arc::new(AtomicUsize::new(0));
        {
            let _handle = NativeHandle::attach(StubHost::counted(2, &releases));
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_after_release_does_not_double_release() {
        let releases = Arc::new(AtomicUsize::new(0));
        {
            let mut handle = NativeHandle::attach(StubHost::counted(3, &releases));
            handle.release().unwrap();
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_failure_propagates_once() {
        let releases = Arc::new(AtomicUsize::new(0));
        let mut handle = NativeHandle::attach(Arc::new(StubHost {
            id: 4,
            releases: Arc::clone(&releases),
            fail: true,
        }));
        assert!(handle.release().is_err());
        // The reference was consumed by the failing release.
        assert!(handle.release().is_ok());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn adopt_rejects_detached_and_double_adopt() {
        let releases = Arc::new(AtomicUsize::new(0));
        let mut state = ObjectState::detached();
        assert!(!state.adopt(NativeHandle::detached()));
        assert!(state.adopt(NativeHandle::attach(StubHost::counted(5, &releases))));
        assert!(!state.adopt(NativeHandle::attach(StubHost::counted(6, &releases))));
        assert_eq!(state.handle().and_then(NativeHandle::object_id), Some(5));
        // The rejected handle was dropped and backstop-released.
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disposed_state_hides_handle_and_stays_disposed() {
        let releases = Arc::new(AtomicUsize::new(0));
        let mut state = ObjectState::detached();
        assert!(state.adopt(NativeHandle::attach(StubHost::counted(7, &releases))));
        state.dispose().unwrap();
        assert!(state.is_disposed());
        assert!(state.handle().is_none());
        assert!(!state.adopt(NativeHandle::attach(StubHost::counted(8, &releases))));
        state.dispose().unwrap();
        // One release for the adopted object, one backstop for the rejected one.
        assert_eq!(releases.load(Ordering::SeqCst), 2);
    }
}
