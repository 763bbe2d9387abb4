//! Generic token converter.
//!
//! Conversion reads one whitespace-delimited field from the token and hands it
//! to the target type's scanner, the way a formatted-input scanner would read
//! a single operand. Every failure, a panicking scanner included, surfaces as
//! [`CallError::ArgConversion`].

use std::panic;

use serde::{Deserialize, Serialize};

use crate::{
    error::{BoxError, CallError, panic_message},
    param::{TypeDesc, Value},
};

/// How much of a token the converter reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Parse the first field and ignore anything after it.
    #[default]
    Lenient,
    /// Parse the first field and reject any trailing content.
    Strict,
}

/// Reasons a token could not be scanned, independent of the target type's
/// own parse errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScanError {
    #[error("unexpected end of input")]
    Empty,

    #[error("unexpected trailing input {0:?}")]
    Trailing(String),

    #[error("type has no string scanner")]
    NoScanner,

    #[error("scanner panicked: {0}")]
    Panicked(String),
}

/// Converts `token` into a value of the type described by `ty`.
///
/// # Errors
///
/// Returns [`CallError::ArgConversion`] carrying the token, the target type
/// name and the underlying cause. A panicking scanner is reported the same
/// way; the process panic hook still runs for it.
pub fn convert(token: &str, ty: &TypeDesc, mode: ScanMode) -> Result<Value, CallError> {
    let fail = |source: BoxError| CallError::ArgConversion {
        token: token.to_string(),
        type_name: ty.name(),
        source,
    };

    let scanner = ty.scanner().ok_or_else(|| fail(ScanError::NoScanner.into()))?;
    let field = field(token, mode).map_err(|e| fail(e.into()))?;

    match panic::catch_unwind(|| scanner(field)) {
        Ok(result) => result.map_err(fail),
        Err(payload) => Err(fail(ScanError::Panicked(panic_message(&*payload)).into())),
    }
}

fn field(token: &str, mode: ScanMode) -> Result<&str, ScanError> {
    let trimmed = token.trim_start();
    let first = trimmed.split_whitespace().next().ok_or(ScanError::Empty)?;

    if mode == ScanMode::Strict {
        let rest = trimmed[first.len()..].trim();
        if !rest.is_empty() {
            return Err(ScanError::Trailing(rest.to_string()));
        }
    }

    Ok(first)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::param::Param;

    struct Fragile;

    impl FromStr for Fragile {
        type Err = std::convert::Infallible;

        fn from_str(_: &str) -> Result<Self, Self::Err> {
            panic!("fragile scanner exploded");
        }
    }

    crate::scan_param!(Fragile);

    struct Unscannable;

    impl Param for Unscannable {}

    fn source_of(err: &CallError) -> &(dyn std::error::Error + 'static) {
        std::error::Error::source(err).expect("conversion errors carry a source")
    }

    #[test]
    fn test_convert_parses_integer_token() {
        let value = convert("1", &TypeDesc::of::<i32>(), ScanMode::Lenient).unwrap();

        assert_eq!(value.downcast_ref::<i32>(), Some(&1));
    }

    #[test]
    fn test_convert_non_numeric_token_reports_token_and_type() {
        // Act
        let err = convert("a", &TypeDesc::of::<i32>(), ScanMode::Lenient).unwrap_err();

        // Assert
        match &err {
            CallError::ArgConversion {
                token, type_name, ..
            } => {
                assert_eq!(token, "a");
                assert_eq!(*type_name, "i32");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(
            source_of(&err)
                .downcast_ref::<std::num::ParseIntError>()
                .is_some()
        );
    }

    #[test]
    fn test_lenient_mode_reads_first_field_only() {
        let value = convert("  42 trailing", &TypeDesc::of::<u8>(), ScanMode::Lenient).unwrap();

        assert_eq!(value.downcast_ref::<u8>(), Some(&42));
    }

    #[test]
    fn test_strict_mode_rejects_trailing_input() {
        let err = convert("42 trailing", &TypeDesc::of::<u8>(), ScanMode::Strict).unwrap_err();

        assert_eq!(
            source_of(&err).downcast_ref::<ScanError>(),
            Some(&ScanError::Trailing("trailing".to_string()))
        );
    }

    #[test]
    fn test_strict_mode_accepts_surrounding_whitespace() {
        let value = convert(" 7 ", &TypeDesc::of::<i64>(), ScanMode::Strict).unwrap();

        assert_eq!(value.downcast_ref::<i64>(), Some(&7));
    }

    #[test]
    fn test_blank_token_is_unexpected_end_of_input() {
        let err = convert("   ", &TypeDesc::of::<f64>(), ScanMode::Lenient).unwrap_err();

        assert_eq!(
            source_of(&err).downcast_ref::<ScanError>(),
            Some(&ScanError::Empty)
        );
    }

    #[test]
    fn test_type_without_scanner_fails_conversion() {
        let err = convert("x", &TypeDesc::of::<Unscannable>(), ScanMode::Lenient).unwrap_err();

        assert_eq!(
            source_of(&err).downcast_ref::<ScanError>(),
            Some(&ScanError::NoScanner)
        );
    }

    #[test]
    fn test_panicking_scanner_is_contained_as_conversion_error() {
        // Act
        let err = convert("boom", &TypeDesc::of::<Fragile>(), ScanMode::Lenient).unwrap_err();

        // Assert
        assert!(matches!(err, CallError::ArgConversion { ref token, .. } if token == "boom"));
        assert_eq!(
            source_of(&err).downcast_ref::<ScanError>(),
            Some(&ScanError::Panicked("fragile scanner exploded".to_string()))
        );
    }

    #[test]
    fn test_scan_mode_deserializes_from_lowercase_names() {
        let strict: ScanMode = serde_json::from_str("\"strict\"").unwrap();
        let lenient: ScanMode = serde_json::from_str("\"lenient\"").unwrap();

        assert_eq!(strict, ScanMode::Strict);
        assert_eq!(lenient, ScanMode::Lenient);
    }
}
