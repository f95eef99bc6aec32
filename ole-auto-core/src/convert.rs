//! Coercion between loosely-typed native values and the strongly-typed
//! scalars and enums the wrapper surface exposes.
//!
//! Coercion is the hard-fail path of the core: when neither the direct
//! shape nor a string parse applies, the call reports which shape arrived
//! and which type was wanted. A silent wrong zero or false is considered
//! more dangerous than a visible failure here, in contrast to the
//! soft-fail factory and color paths.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::errors::{AutoError, AutoResult};
use crate::variant::{Variant, VariantGrid};

/// Serial day number of 1970-01-01 in the host date encoding
/// (epoch 1899-12-30).
const UNIX_EPOCH_SERIAL: f64 = 25_569.0;

/// Serial range a floating-point value must fall in to be read as a date:
/// day 1 up to the end of year 9999.
const SERIAL_MIN: f64 = 1.0;
const SERIAL_MAX: f64 = 2_958_466.0;

fn conversion(value: &Variant, target: &'static str) -> AutoError {
    AutoError::Conversion {
        found: value.type_name(),
        target,
    }
}

/// Host enum mirror with a stable numeric wire code.
///
/// Implemented for fieldless mirrors by the [`crate::native_enum!`] macro.
pub trait NativeEnum: Copy {
    /// The defined member carrying `code`, if any.
    fn from_code(code: i32) -> Option<Self>;

    /// The numeric wire code of this member.
    fn code(self) -> i32;
}

/// Declares a fieldless host enum mirror and wires up [`NativeEnum`].
#[macro_export]
macro_rules! native_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $code:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $code ),+
        }

        impl $crate::convert::NativeEnum for $name {
            fn from_code(code: i32) -> Option<Self> {
                $( if code == $code { return Some(Self::$variant); } )+
                None
            }

            #[allow(clippy::as_conversions)]
            fn code(self) -> i32 {
                self as i32
            }
        }
    };
}

/// Transcodes between two differently-shaped enums sharing numeric
/// storage. An undefined destination code yields `fallback` instead of an
/// undefined member.
pub fn transcode<S: NativeEnum, D: NativeEnum>(value: S, fallback: D) -> D {
    D::from_code(value.code()).unwrap_or(fallback)
}

/// Nullable-source transcode: `None` input yields `fallback`.
pub fn transcode_or<S: NativeEnum, D: NativeEnum>(value: Option<S>, fallback: D) -> D {
    value.map_or(fallback, |v| transcode(v, fallback))
}

/// Nullable-destination transcode: an undefined code yields `fallback`.
pub fn transcode_nullable<S: NativeEnum, D: NativeEnum>(value: S, fallback: Option<D>) -> Option<D> {
    D::from_code(value.code()).or(fallback)
}

/// Nullable on both sides; `None` input and undefined codes both yield
/// `fallback`.
pub fn transcode_nullable_or<S: NativeEnum, D: NativeEnum>(
    value: Option<S>,
    fallback: Option<D>,
) -> Option<D> {
    value.map_or(fallback, |v| transcode_nullable(v, fallback))
}

/// Coerces a native value to `f64`.
#[allow(clippy::cast_precision_loss)]
pub fn to_f64(value: &Variant) -> AutoResult<f64> {
    match value {
        Variant::F64(v) => Ok(*v),
        Variant::F32(v) => Ok(f64::from(*v)),
        Variant::I16(v) => Ok(f64::from(*v)),
        Variant::I32(v) => Ok(f64::from(*v)),
        Variant::I64(v) => Ok(*v as f64),
        Variant::Currency(raw) => Ok(*raw as f64 / 10_000.0),
        Variant::Date(serial) => Ok(*serial),
        Variant::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Variant::TriState(t) => Ok(f64::from(t.code())),
        Variant::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| conversion(value, "f64")),
        _ => Err(conversion(value, "f64")),
    }
}

/// Coerces a native value to `f32`.
#[allow(clippy::cast_possible_truncation)]
pub fn to_f32(value: &Variant) -> AutoResult<f32> {
    match value {
        Variant::F32(v) => Ok(*v),
        other => to_f64(other)
            .map(|v| v as f32)
            .map_err(|_| conversion(value, "f32")),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn round_in_range(v: f64, min: f64, max: f64) -> Option<i64> {
    if !v.is_finite() {
        return None;
    }
    let rounded = v.round();
    if rounded < min || rounded > max {
        return None;
    }
    Some(rounded as i64)
}

/// Coerces a native value to `i32`. Floats are rounded half away from
/// zero; out-of-range values fail.
#[allow(clippy::cast_possible_truncation)]
pub fn to_i32(value: &Variant) -> AutoResult<i32> {
    let err = || conversion(value, "i32");
    match value {
        Variant::I32(v) => Ok(*v),
        Variant::I16(v) => Ok(i32::from(*v)),
        Variant::I64(v) => i32::try_from(*v).map_err(|_| err()),
        Variant::Bool(b) => Ok(i32::from(*b)),
        Variant::TriState(t) => Ok(t.code()),
        Variant::F64(_) | Variant::F32(_) | Variant::Currency(_) => {
            let v = to_f64(value).map_err(|_| err())?;
            round_in_range(v, f64::from(i32::MIN), f64::from(i32::MAX))
                .map(|r| r as i32)
                .ok_or_else(err)
        }
        Variant::Str(s) => {
            let s = s.trim();
            if let Ok(v) = s.parse::<i32>() {
                return Ok(v);
            }
            let v: f64 = s.parse().map_err(|_| err())?;
            round_in_range(v, f64::from(i32::MIN), f64::from(i32::MAX))
                .map(|r| r as i32)
                .ok_or_else(err)
        }
        _ => Err(err()),
    }
}

/// Coerces a native value to `i64`. Floats are rounded half away from
/// zero; out-of-range values fail.
#[allow(clippy::cast_precision_loss)]
pub fn to_i64(value: &Variant) -> AutoResult<i64> {
    let err = || conversion(value, "i64");
    match value {
        Variant::I64(v) => Ok(*v),
        Variant::I32(v) => Ok(i64::from(*v)),
        Variant::I16(v) => Ok(i64::from(*v)),
        Variant::Bool(b) => Ok(i64::from(*b)),
        Variant::TriState(t) => Ok(i64::from(t.code())),
        Variant::F64(_) | Variant::F32(_) | Variant::Currency(_) => {
            let v = to_f64(value).map_err(|_| err())?;
            round_in_range(v, i64::MIN as f64, i64::MAX as f64).ok_or_else(err)
        }
        Variant::Str(s) => {
            let s = s.trim();
            if let Ok(v) = s.parse::<i64>() {
                return Ok(v);
            }
            let v: f64 = s.parse().map_err(|_| err())?;
            round_in_range(v, i64::MIN as f64, i64::MAX as f64).ok_or_else(err)
        }
        _ => Err(err()),
    }
}

/// Coerces a native value to `bool`.
///
/// Any nonzero numeric is true; the host tri-state maps both of its true
/// encodings to true and every other state to false.
pub fn to_bool(value: &Variant) -> AutoResult<bool> {
    match value {
        Variant::Bool(b) => Ok(*b),
        Variant::TriState(t) => Ok(t.is_true()),
        Variant::I16(v) => Ok(*v != 0),
        Variant::I32(v) => Ok(*v != 0),
        Variant::I64(v) => Ok(*v != 0),
        Variant::F32(v) => Ok(*v != 0.0),
        Variant::F64(v) => Ok(*v != 0.0),
        Variant::Currency(raw) => Ok(*raw != 0),
        Variant::Str(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                return Ok(true);
            }
            if s.eq_ignore_ascii_case("false") {
                return Ok(false);
            }
            s.parse::<f64>()
                .map(|v| v != 0.0)
                .map_err(|_| conversion(value, "bool"))
        }
        _ => Err(conversion(value, "bool")),
    }
}

/// Coerces a native value to a `Decimal`.
///
/// The host currency encoding converts exactly: it is a 64-bit
/// fixed-point scaled by 10 000.
pub fn to_decimal(value: &Variant) -> AutoResult<Decimal> {
    let err = || conversion(value, "Decimal");
    match value {
        Variant::Currency(raw) => Ok(Decimal::new(*raw, 4)),
        Variant::I16(v) => Ok(Decimal::from(*v)),
        Variant::I32(v) => Ok(Decimal::from(*v)),
        Variant::I64(v) => Ok(Decimal::from(*v)),
        Variant::Bool(b) => Ok(Decimal::from(i32::from(*b))),
        Variant::TriState(t) => Ok(Decimal::from(t.code())),
        Variant::F64(v) => Decimal::from_f64(*v).ok_or_else(err),
        Variant::F32(v) => Decimal::from_f32(*v).ok_or_else(err),
        Variant::Str(s) => s.trim().parse().map_err(|_| err()),
        _ => Err(err()),
    }
}

fn in_serial_range(v: f64) -> bool {
    (SERIAL_MIN..SERIAL_MAX).contains(&v)
}

/// Serial day number to a naive timestamp, second precision.
#[allow(clippy::cast_possible_truncation)]
fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let total_secs = (serial - UNIX_EPOCH_SERIAL) * 86_400.0;
    chrono::DateTime::from_timestamp(total_secs.round() as i64, 0).map(|utc| utc.naive_utc())
}

/// Coerces a native value to a timestamp.
///
/// A floating-point value is read as a serial day number only when it
/// falls in the plausible range (day 1 through the end of year 9999);
/// outside that range it is an ordinary float and the coercion fails,
/// leaving the caller's fallback logic in charge. Strings accept RFC 3339
/// and the common dashed date shapes.
pub fn to_datetime(value: &Variant) -> AutoResult<NaiveDateTime> {
    let err = || conversion(value, "NaiveDateTime");
    match value {
        Variant::Date(serial) => serial_to_datetime(*serial).ok_or_else(err),
        Variant::F64(v) if in_serial_range(*v) => serial_to_datetime(*v).ok_or_else(err),
        Variant::F32(v) if in_serial_range(f64::from(*v)) => {
            serial_to_datetime(f64::from(*v)).ok_or_else(err)
        }
        Variant::I32(v) if in_serial_range(f64::from(*v)) => {
            serial_to_datetime(f64::from(*v)).ok_or_else(err)
        }
        #[allow(clippy::cast_precision_loss)]
        Variant::I64(v) if in_serial_range(*v as f64) => {
            serial_to_datetime(*v as f64).ok_or_else(err)
        }
        Variant::Str(s) => parse_datetime(s.trim()).ok_or_else(err),
        _ => Err(err()),
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Timestamp back to the host serial encoding, for the way out.
#[allow(clippy::cast_precision_loss)]
pub fn datetime_to_serial(value: &NaiveDateTime) -> f64 {
    let secs = value.and_utc().timestamp() as f64;
    secs / 86_400.0 + UNIX_EPOCH_SERIAL
}

/// Normalizes a native return into the grid shape used for range data, so
/// "one cell" and "many cells" read the same without a branch.
pub fn to_grid(value: Variant) -> VariantGrid {
    match value {
        Variant::Array(grid) => grid,
        scalar => VariantGrid::scalar(scalar),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native_enum;
    use crate::variant::TriState;
    use chrono::{NaiveDate, Timelike};

    native_enum! {
        enum LineStyle {
            Continuous = 1,
            Dash = -4115,
            Dot = -4118,
            None = -4142,
        }
    }

    native_enum! {
        enum BorderStyle {
            Continuous = 1,
            Dash = -4115,
            Double = -4119,
        }
    }

    #[test]
    fn test_transcode_shared_code() {
        let out: BorderStyle = transcode(LineStyle::Dash, BorderStyle::Continuous);
        assert_eq!(out, BorderStyle::Dash);
    }

    #[test]
    fn test_transcode_round_trip() {
        let there: BorderStyle = transcode(LineStyle::Continuous, BorderStyle::Double);
        let back: LineStyle = transcode(there, LineStyle::None);
        assert_eq!(back, LineStyle::Continuous);
    }

    #[test]
    fn test_transcode_undefined_code_falls_back() {
        let out: BorderStyle = transcode(LineStyle::Dot, BorderStyle::Double);
        assert_eq!(out, BorderStyle::Double);
    }

    #[test]
    fn test_transcode_nullable_shapes() {
        assert_eq!(
            transcode_or(None::<LineStyle>, BorderStyle::Continuous),
            BorderStyle::Continuous
        );
        assert_eq!(
            transcode_or(Some(LineStyle::Dash), BorderStyle::Continuous),
            BorderStyle::Dash
        );
        assert_eq!(
            transcode_nullable::<_, BorderStyle>(LineStyle::Dot, None),
            None
        );
        assert_eq!(
            transcode_nullable(LineStyle::Dash, Some(BorderStyle::Double)),
            Some(BorderStyle::Dash)
        );
        assert_eq!(
            transcode_nullable_or::<LineStyle, _>(None, Some(BorderStyle::Double)),
            Some(BorderStyle::Double)
        );
    }

    #[test]
    fn test_to_i32_parses_strings() {
        assert_eq!(to_i32(&Variant::from("42")).unwrap(), 42);
        assert_eq!(to_i32(&Variant::from(" -7 ")).unwrap(), -7);
        assert_eq!(to_i32(&Variant::from("2.6")).unwrap(), 3);
    }

    #[test]
    fn test_to_i32_rounds_floats_and_rejects_overflow() {
        assert_eq!(to_i32(&Variant::F64(2.5)).unwrap(), 3);
        assert_eq!(to_i32(&Variant::F64(-2.5)).unwrap(), -3);
        assert!(to_i32(&Variant::F64(3e10)).is_err());
        assert!(to_i32(&Variant::I64(i64::from(i32::MAX) + 1)).is_err());
        assert!(to_i32(&Variant::F64(f64::NAN)).is_err());
    }

    #[test]
    fn test_to_i64_currency_rounds() {
        assert_eq!(to_i64(&Variant::Currency(15_000)).unwrap(), 2);
        assert_eq!(to_i64(&Variant::Currency(14_999)).unwrap(), 1);
    }

    #[test]
    fn test_to_bool_numerics_and_tri_state() {
        assert!(!to_bool(&Variant::I32(0)).unwrap());
        assert!(to_bool(&Variant::I32(3)).unwrap());
        assert!(to_bool(&Variant::F64(-0.5)).unwrap());
        assert!(to_bool(&Variant::TriState(TriState::True)).unwrap());
        assert!(to_bool(&Variant::TriState(TriState::CTrue)).unwrap());
        assert!(!to_bool(&Variant::TriState(TriState::False)).unwrap());
        assert!(!to_bool(&Variant::TriState(TriState::Mixed)).unwrap());
        assert!(to_bool(&Variant::from("TRUE")).unwrap());
        assert!(!to_bool(&Variant::from("false")).unwrap());
        assert!(to_bool(&Variant::from("1")).unwrap());
    }

    #[test]
    fn test_null_never_becomes_a_silent_zero() {
        let err = to_f64(&Variant::Null).unwrap_err();
        assert_eq!(err.to_string(), "cannot convert Null to f64");
        assert!(to_bool(&Variant::Null).is_err());
        assert!(to_i32(&Variant::Empty).is_err());
        assert!(to_datetime(&Variant::Missing).is_err());
    }

    #[test]
    fn test_to_f64_fast_paths() {
        assert_eq!(to_f64(&Variant::F64(1.25)).unwrap(), 1.25);
        assert_eq!(to_f64(&Variant::I16(-3)).unwrap(), -3.0);
        assert_eq!(to_f64(&Variant::Currency(123_456)).unwrap(), 12.3456);
        assert_eq!(to_f64(&Variant::from("3.5")).unwrap(), 3.5);
        assert!(to_f64(&Variant::from("not a number")).is_err());
    }

    #[test]
    fn test_to_decimal_currency_is_exact() {
        assert_eq!(
            to_decimal(&Variant::Currency(123_456_789)).unwrap(),
            "12345.6789".parse::<Decimal>().unwrap()
        );
        assert_eq!(
            to_decimal(&Variant::from("12.34")).unwrap(),
            Decimal::new(1234, 2)
        );
    }

    #[test]
    fn test_serial_dates_inside_plausible_range() {
        // Serial 25569 is 1970-01-01; .5 is noon.
        let dt = to_datetime(&Variant::Date(25_569.5)).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
        assert_eq!(dt.hour(), 12);

        let from_float = to_datetime(&Variant::F64(25_570.0)).unwrap();
        assert_eq!(
            from_float.date(),
            NaiveDate::from_ymd_opt(1970, 1, 2).unwrap()
        );
    }

    #[test]
    fn test_out_of_range_float_is_not_a_date() {
        assert!(to_datetime(&Variant::F64(0.25)).is_err());
        assert!(to_datetime(&Variant::F64(3_000_000.0)).is_err());
    }

    #[test]
    fn test_datetime_string_parsing() {
        let dt = to_datetime(&Variant::from("2024-02-29 08:30:00")).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let date_only = to_datetime(&Variant::from("2024-02-29")).unwrap();
        assert_eq!(date_only.hour(), 0);
        assert!(to_datetime(&Variant::from("yesterday")).is_err());
    }

    #[test]
    fn test_serial_round_trip() {
        let dt = to_datetime(&Variant::Date(45_000.75)).unwrap();
        let serial = datetime_to_serial(&dt);
        assert!((serial - 45_000.75).abs() < 1e-6);
    }

    #[test]
    fn test_to_grid_normalizes_scalars() {
        let grid = to_grid(Variant::from(5i32));
        assert_eq!((grid.rows(), grid.cols()), (1, 1));
        assert_eq!(grid.get(0, 0), Some(&Variant::I32(5)));

        let mut source = VariantGrid::new(2, 2);
        source.set(0, 1, Variant::from("x"));
        let passthrough = to_grid(Variant::Array(source));
        assert_eq!((passthrough.rows(), passthrough.cols()), (2, 2));
        assert_eq!(passthrough.get(0, 1), Some(&Variant::from("x")));
    }
}
