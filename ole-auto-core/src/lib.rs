//! # ole-auto-core
//!
//! Lifecycle, marshaling, and conversion core for wrappers over a host
//! office-suite OLE Automation object model.
//!
//! The generated per-object wrappers (chart, worksheet, document, ...)
//! live outside this crate; they consume three things from here:
//!
//! - the wrapper [`factory`]: an explicit registration table resolving a
//!   contract type plus a raw [`handle::NativeHandle`] into a typed
//!   wrapper instance, degrading to `None` when the capability is
//!   unavailable;
//! - the [`disposal`] container: a thread-safe owning collection that
//!   releases a batch of sibling resources exactly once, in insertion
//!   order, with aggregate failure reporting;
//! - the [`convert`], [`optional`], and [`color`] helpers bridging the
//!   loosely-typed native value domain ([`variant::Variant`]) and the
//!   strongly-typed wrapper surface.
//!
//! The crate never talks to the host itself; the bindings layer implements
//! [`handle::HostObject`] over the real automation surface.

pub mod color;
pub mod convert;
pub mod disposal;
pub mod errors;
pub mod factory;
pub mod handle;
pub mod optional;
pub mod variant;

// Stable public API
pub use color::{COLOR_AUTOMATIC, COLOR_NONE, Color, color_from_packed, color_from_variant, color_to_packed};
pub use convert::{
    NativeEnum, datetime_to_serial, to_bool, to_datetime, to_decimal, to_f32, to_f64, to_grid,
    to_i32, to_i64, transcode, transcode_nullable, transcode_nullable_or, transcode_or,
};
pub use disposal::{DisposableList, Releasable, ResourceId};
pub use errors::{AutoError, AutoResult, ReleaseFailure};
pub use factory::{FromHandle, WrapperRegistry, create, register, register_loadable, registry};
pub use handle::{HostObject, NativeHandle, ObjectState};
pub use optional::{omittable, omittable_string, omittable_when};
pub use variant::{TriState, Variant, VariantGrid};
