//! Typed wrapper construction from raw native handles.
//!
//! The original wrapping layer discovered concrete wrapper types at runtime
//! by naming convention; here the discovery is an explicit registration
//! table instead. The generated wrapper layer registers a factory per
//! contract at startup, and [`WrapperRegistry::create`] resolves a contract
//! to an instance. A contract with no registration is not an error: the
//! lookup degrades to `None`, the documented "capability unavailable"
//! outcome, and the miss is cached so repeated requests stay cheap.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use once_cell::sync::Lazy;

use crate::handle::NativeHandle;

/// Uniform adoption protocol used by [`WrapperRegistry::register_loadable`].
///
/// A wrapper is default-constructed and then asked to adopt the supplied
/// handle; returning `false` signals the handle cannot back this wrapper
/// type, and the factory degrades to `None`.
pub trait FromHandle: Default {
    fn load(&mut self, handle: NativeHandle) -> bool;
}

type ErasedFactory = Arc<dyn Fn(NativeHandle) -> Option<Box<dyn Any + Send>> + Send + Sync>;

enum Slot {
    Available(ErasedFactory),
    /// Negative entry: the contract was requested but nothing is
    /// registered for it. Cached so the miss is not re-resolved.
    Unavailable,
}

enum Lookup {
    Factory(ErasedFactory),
    Unavailable,
    Miss,
}

/// Registration table mapping contract identity to a factory closure.
///
/// The table is append-only for the lifetime of the process; entries are
/// never evicted. An explicit [`WrapperRegistry::register`] replaces a
/// previously cached negative entry.
pub struct WrapperRegistry {
    slots: RwLock<HashMap<TypeId, Slot>>,
}

impl WrapperRegistry {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TypeId, Slot>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TypeId, Slot>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a factory for contract `W`. The last registration wins.
    pub fn register<W, F>(&self, factory: F)
    where
        W: Any + Send,
        F: Fn(NativeHandle) -> Option<W> + Send + Sync + 'static,
    {
        let erased: ErasedFactory =
            Arc::new(move |handle| factory(handle).map(|w| Box::new(w) as Box<dyn Any + Send>));
        self.write().insert(TypeId::of::<W>(), Slot::Available(erased));
    }

    /// Registers the canonical construct-then-adopt path for `W`: a
    /// default-constructed instance that loads itself from the handle.
    pub fn register_loadable<W>(&self)
    where
        W: FromHandle + Any + Send,
    {
        self.register(|handle| {
            let mut wrapper = W::default();
            wrapper.load(handle).then_some(wrapper)
        });
    }

    /// Whether a factory (not a negative entry) is registered for `W`.
    pub fn is_registered<W: Any>(&self) -> bool {
        matches!(self.read().get(&TypeId::of::<W>()), Some(Slot::Available(_)))
    }

    /// Produces a wrapper for contract `W` from a raw native handle.
    ///
    /// Never fails hard: an unregistered contract, a cached negative
    /// entry, or a wrapper that declines the handle all yield `None`.
    /// Treating `None` as "capability unavailable" is the caller's
    /// responsibility.
    pub fn create<W: Any + Send>(&self, handle: NativeHandle) -> Option<W> {
        let lookup = {
            let slots = self.read();
            match slots.get(&TypeId::of::<W>()) {
                Some(Slot::Available(factory)) => Lookup::Factory(Arc::clone(factory)),
                Some(Slot::Unavailable) => Lookup::Unavailable,
                None => Lookup::Miss,
            }
        };
        match lookup {
            Lookup::Factory(factory) => match factory(handle) {
                Some(boxed) => match boxed.downcast::<W>() {
                    Ok(wrapper) => Some(*wrapper),
                    Err(_) => {
                        tracing::warn!(
                            contract = type_name::<W>(),
                            "registered factory produced a foreign type"
                        );
                        None
                    }
                },
                None => {
                    tracing::debug!(
                        contract = type_name::<W>(),
                        "wrapper declined the supplied handle"
                    );
                    None
                }
            },
            Lookup::Unavailable => {
                tracing::debug!(contract = type_name::<W>(), "contract cached as unavailable");
                None
            }
            Lookup::Miss => {
                // Get-or-add: concurrent first misses may race here, both
                // converge on the same negative entry.
                self.write()
                    .entry(TypeId::of::<W>())
                    .or_insert(Slot::Unavailable);
                tracing::debug!(contract = type_name::<W>(), "no wrapper registered");
                None
            }
        }
    }
}

impl Default for WrapperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: Lazy<WrapperRegistry> = Lazy::new(WrapperRegistry::new);

/// The process-wide registry the generated wrapper layer populates.
pub fn registry() -> &'static WrapperRegistry {
    &GLOBAL
}

/// Registers a factory for `W` in the process-wide registry.
pub fn register<W, F>(factory: F)
where
    W: Any + Send,
    F: Fn(NativeHandle) -> Option<W> + Send + Sync + 'static,
{
    GLOBAL.register(factory);
}

/// Registers the construct-then-adopt path for `W` in the process-wide
/// registry.
pub fn register_loadable<W>()
where
    W: FromHandle + Any + Send,
{
    GLOBAL.register_loadable::<W>();
}

/// Produces a wrapper for contract `W` via the process-wide registry.
pub fn create<W: Any + Send>(handle: NativeHandle) -> Option<W> {
    GLOBAL.create(handle)
}
