//! Aggregate ownership and teardown of releasable native resources.
//!
//! A [`DisposableList`] owns a batch of sibling resources (typically the
//! child wrappers spawned by one owning wrapper) and guarantees each of
//! them is released exactly once, in insertion order, with every failure
//! collected instead of aborting the loop. Single-item paths
//! ([`DisposableList::remove_and_dispose`], [`DisposableList::clear`]) log
//! and swallow failures; full teardown logs and then raises the aggregate.
//! The two policies are intentionally different and must stay that way:
//! callers of the single-item paths are still holding other live resources.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::errors::{AutoError, AutoResult, ReleaseFailure};

/// A resource that can give its native backing back to the host.
///
/// Implementations must be idempotent: a second `release` is an `Ok`
/// no-op. [`crate::handle::ObjectState`] provides this for wrapper-backed
/// resources.
pub trait Releasable: Send {
    fn release(&mut self) -> AutoResult<()>;
}

/// Opaque membership token returned by [`DisposableList::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(u64);

struct Entry {
    id: u64,
    resource: Box<dyn Releasable>,
}

struct Inner {
    items: Vec<Entry>,
    disposed: bool,
    next_id: u64,
}

/// Thread-safe owning collection of releasable resources.
///
/// Every operation is serialized behind one mutex scoped to the container.
/// Membership churn is expected to be orders of magnitude less frequent
/// than the native calls the owned resources perform, so full
/// serialization is an acceptable cost for safe sharing across concurrent
/// producers and consumers of child resources.
pub struct DisposableList {
    inner: Mutex<Inner>,
}

impl DisposableList {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: Vec::new(),
                disposed: false,
                // 0 is reserved so a token is never ambiguous with "null".
                next_id: 1,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking producer must not be able to block teardown.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a resource to the live set.
    ///
    /// # Errors
    ///
    /// Returns [`AutoError::AlreadyDisposed`] once the container has been
    /// torn down: there is no valid way to register a resource into a
    /// container that is mid-teardown or gone.
    pub fn add(&self, resource: Box<dyn Releasable>) -> AutoResult<ResourceId> {
        let mut inner = self.lock();
        if inner.disposed {
            return Err(AutoError::AlreadyDisposed);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.items.push(Entry { id, resource });
        Ok(ResourceId(id))
    }

    /// Appends every resource, in order, under one lock acquisition.
    ///
    /// # Errors
    ///
    /// Returns [`AutoError::AlreadyDisposed`] once the container has been
    /// torn down; no resource is adopted in that case.
    pub fn add_range(
        &self,
        resources: impl IntoIterator<Item = Box<dyn Releasable>>,
    ) -> AutoResult<Vec<ResourceId>> {
        let mut inner = self.lock();
        if inner.disposed {
            return Err(AutoError::AlreadyDisposed);
        }
        let mut ids = Vec::new();
        for resource in resources {
            let id = inner.next_id;
            inner.next_id += 1;
            inner.items.push(Entry { id, resource });
            ids.push(ResourceId(id));
        }
        Ok(ids)
    }

    /// Atomically removes one member and releases it immediately.
    ///
    /// Returns whether the member was present. A release failure on this
    /// path is logged and swallowed: the caller is cleaning up one resource
    /// among many still in use and must not be destabilized by it.
    pub fn remove_and_dispose(&self, id: ResourceId) -> bool {
        let mut inner = self.lock();
        let Some(position) = inner.items.iter().position(|entry| entry.id == id.0) else {
            return false;
        };
        let mut entry = inner.items.remove(position);
        if let Err(e) = entry.resource.release() {
            tracing::warn!(error = %e, resource_id = id.0, "single-item release failed");
        }
        true
    }

    /// Full teardown: releases every member in insertion order, clears the
    /// set, and marks the container disposed. A second call is a no-op.
    ///
    /// # Errors
    ///
    /// If any member failed to release, every other member was still given
    /// its chance first; the collected failures come back as
    /// [`AutoError::ReleaseAggregate`] after being logged, so a caller that
    /// drops the error still has an audit trail.
    pub fn dispose(&self) -> AutoResult<()> {
        let mut inner = self.lock();
        if inner.disposed {
            return Ok(());
        }
        inner.disposed = true;
        let items = std::mem::take(&mut inner.items);
        let attempted = items.len();
        let mut failures = Vec::new();
        for (index, mut entry) in items.into_iter().enumerate() {
            if let Err(source) = entry.resource.release() {
                failures.push(ReleaseFailure { index, source });
            }
        }
        drop(inner);
        if failures.is_empty() {
            return Ok(());
        }
        tracing::error!(
            failed = failures.len(),
            attempted,
            "teardown completed with release failures"
        );
        Err(AutoError::ReleaseAggregate {
            attempted,
            failures,
        })
    }

    /// Releases every member without finalizing the container.
    ///
    /// Unlike [`DisposableList::dispose`] the membership is kept and the
    /// container continues to accept new resources; used when resources
    /// must be released opportunistically. Members rely on release
    /// idempotency when a later teardown revisits them.
    ///
    /// # Errors
    ///
    /// Same aggregate policy as full teardown.
    pub fn dispose_all(&self) -> AutoResult<()> {
        let mut inner = self.lock();
        let attempted = inner.items.len();
        let mut failures = Vec::new();
        for (index, entry) in inner.items.iter_mut().enumerate() {
            if let Err(source) = entry.resource.release() {
                failures.push(ReleaseFailure { index, source });
            }
        }
        drop(inner);
        if failures.is_empty() {
            return Ok(());
        }
        tracing::error!(
            failed = failures.len(),
            attempted,
            "opportunistic release completed with failures"
        );
        Err(AutoError::ReleaseAggregate {
            attempted,
            failures,
        })
    }

    /// Releases all current members best-effort and empties the set, while
    /// the container itself stays live. Failures are logged and swallowed.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let items = std::mem::take(&mut inner.items);
        for mut entry in items {
            if let Err(e) = entry.resource.release() {
                tracing::warn!(error = %e, resource_id = entry.id, "release failed while clearing");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }
}

impl Default for DisposableList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DisposableList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("DisposableList")
            .field("len", &inner.items.len())
            .field("disposed", &inner.disposed)
            .finish()
    }
}

impl Drop for DisposableList {
    /// Last-resort backstop: if the container was never explicitly
    /// disposed, release whatever is still owned, logging failures. Host
    /// automation resources are frequently scarce, so this path must not
    /// be relied upon for timely release.
    fn drop(&mut self) {
        let inner = self
            .inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if inner.disposed || inner.items.is_empty() {
            return;
        }
        tracing::warn!(
            count = inner.items.len(),
            "disposable list dropped without dispose; releasing as backstop"
        );
        for entry in &mut inner.items {
            if let Err(e) = entry.resource.release() {
                tracing::warn!(error = %e, resource_id = entry.id, "backstop release failed");
            }
        }
        inner.items.clear();
    }
}
