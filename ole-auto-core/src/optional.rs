//! Last-moment substitution of the omitted-argument sentinel.
//!
//! The native call surface models "argument omitted" as a distinguished
//! value rather than a language-level optional. Wrapper methods keep their
//! parameters as `Option` and only translate absence to
//! [`Variant::Missing`] here, immediately before the native call. This is
//! a pure syntactic bridge: there is no validation beyond presence and the
//! caller-supplied applicability condition.

use crate::variant::Variant;

/// A present value passes through; an absent one becomes the omitted
/// sentinel.
pub fn omittable<T: Into<Variant>>(value: Option<T>) -> Variant {
    value.map_or(Variant::Missing, Into::into)
}

/// A present value passes through only when `applies` holds for it;
/// otherwise the omitted sentinel is substituted.
pub fn omittable_when<T, F>(value: Option<T>, applies: F) -> Variant
where
    T: Into<Variant>,
    F: FnOnce(&T) -> bool,
{
    match value {
        Some(v) if applies(&v) => v.into(),
        _ => Variant::Missing,
    }
}

/// A present, non-empty string passes through; an absent or empty one
/// becomes the omitted sentinel.
pub fn omittable_string<S: AsRef<str>>(value: Option<S>) -> Variant {
    match value {
        Some(s) if !s.as_ref().is_empty() => Variant::Str(s.as_ref().to_string()),
        _ => Variant::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_value_passes_through() {
        assert_eq!(omittable(Some(3i32)), Variant::I32(3));
        assert_eq!(omittable(Some("name")), Variant::from("name"));
    }

    #[test]
    fn absent_value_becomes_missing() {
        assert!(omittable(None::<i32>).is_missing());
    }

    #[test]
    fn condition_gates_the_value() {
        assert_eq!(omittable_when(Some(5i32), |v| *v > 0), Variant::I32(5));
        assert!(omittable_when(Some(-5i32), |v| *v > 0).is_missing());
        assert!(omittable_when(None::<i32>, |v| *v > 0).is_missing());
    }

    #[test]
    fn empty_string_is_omitted() {
        assert_eq!(omittable_string(Some("sheet")), Variant::from("sheet"));
        assert!(omittable_string(Some("")).is_missing());
        assert!(omittable_string(None::<&str>).is_missing());
    }
}
