//! Error taxonomy for binding construction and invocation.
//!
//! Registration failures are reported as [`BindError`], call-time failures as
//! [`CallError`]. Both classify into a flat [`ErrorKind`] so dispatch layers
//! can branch on the category without matching every variant.

use std::{any::Any, error::Error as StdError, sync::Arc};

use crate::handler::Output;

/// Boxed error used for conversion and resolution causes.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Shared error used for a callable's returned error.
///
/// The same error appears both in the trailing output slot and as the cause of
/// [`CallError::Runtime`], so it is reference counted.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// Coarse classification of every error the engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The registration target is not invocable.
    NotCallable,
    /// A variadic tail is bound to a resolver that does not consume tokens.
    InvalidVariadicTail,
    /// The token count does not satisfy the binding's arity.
    ArityMismatch,
    /// A token could not be converted to its target type.
    ArgConversionFailed,
    /// A token-consuming resolver ran with no tokens left.
    ArgsExhausted,
    /// A context-derived resolver failed.
    ContextResolution,
    /// The callable returned an error, or a fault was contained at the call
    /// boundary.
    RuntimeFault,
}

/// Errors raised while building a binding.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BindError {
    /// The value handed to the binder is not a callable.
    #[error("not a function")]
    NotCallable,

    /// The variadic tail would never consume a token, so the tail loop could
    /// not terminate on token exhaustion.
    #[error("variadic tail of type {type_name} must be resolved from tokens")]
    VariadicTailNotConsuming {
        /// Element type of the tail.
        type_name: &'static str,
    },
}

impl BindError {
    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotCallable => ErrorKind::NotCallable,
            Self::VariadicTailNotConsuming { .. } => ErrorKind::InvalidVariadicTail,
        }
    }
}

/// Errors raised while invoking a binding.
///
/// All call-time failures are terminal for that call; nothing is retried.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CallError {
    /// The number of tokens does not match the binding.
    ///
    /// When `variadic` is set, `want` is a floor rather than an exact count.
    #[error(
        "expected {}{want} argument(s), got {got}",
        if *variadic { "at least " } else { "" }
    )]
    ArityMismatch {
        want: usize,
        got: usize,
        variadic: bool,
    },

    /// A token could not be converted to the parameter type.
    #[error("failed to convert arg {token:?} to {type_name}")]
    ArgConversion {
        token: String,
        type_name: &'static str,
        #[source]
        source: BoxError,
    },

    /// A token-consuming resolver found the token queue empty.
    #[error("no argument left to resolve {type_name}")]
    ArgsExhausted { type_name: &'static str },

    /// A context-derived resolver could not produce its value.
    #[error("failed to resolve {type_name} from context")]
    ContextResolution {
        type_name: &'static str,
        #[source]
        source: BoxError,
    },

    /// The callable returned a non-empty error in its trailing output slot.
    ///
    /// `outputs` holds the complete output list, error slot included.
    #[error("command runtime error: {source}")]
    Runtime {
        #[source]
        source: SharedError,
        outputs: Vec<Output>,
    },

    /// A panic or a misbehaving resolver was contained at the call boundary.
    #[error("panic: {message}")]
    Fault { message: String },
}

impl CallError {
    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ArityMismatch { .. } => ErrorKind::ArityMismatch,
            Self::ArgConversion { .. } => ErrorKind::ArgConversionFailed,
            Self::ArgsExhausted { .. } => ErrorKind::ArgsExhausted,
            Self::ContextResolution { .. } => ErrorKind::ContextResolution,
            Self::Runtime { .. } | Self::Fault { .. } => ErrorKind::RuntimeFault,
        }
    }

    /// Returns the outputs carried by a runtime error.
    #[must_use]
    pub fn outputs(&self) -> Option<&[Output]> {
        match self {
            Self::Runtime { outputs, .. } => Some(outputs),
            _ => None,
        }
    }

    /// Returns the error the callable itself returned, if any.
    #[must_use]
    pub fn runtime_cause(&self) -> Option<&SharedError> {
        match self {
            Self::Runtime { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_mismatch_message_for_exact_count() {
        let err = CallError::ArityMismatch {
            want: 2,
            got: 1,
            variadic: false,
        };

        assert_eq!(err.to_string(), "expected 2 argument(s), got 1");
        assert_eq!(err.kind(), ErrorKind::ArityMismatch);
    }

    #[test]
    fn test_arity_mismatch_message_for_variadic_floor() {
        let err = CallError::ArityMismatch {
            want: 3,
            got: 0,
            variadic: true,
        };

        assert_eq!(err.to_string(), "expected at least 3 argument(s), got 0");
    }

    #[test]
    fn test_arg_conversion_exposes_underlying_cause() {
        // Arrange
        let cause = "a".parse::<i32>().unwrap_err();
        let err = CallError::ArgConversion {
            token: "a".to_string(),
            type_name: "i32",
            source: Box::new(cause.clone()),
        };

        // Act
        let source = err.source().expect("conversion error should have a source");

        // Assert
        assert_eq!(err.to_string(), "failed to convert arg \"a\" to i32");
        assert_eq!(
            source.downcast_ref::<std::num::ParseIntError>(),
            Some(&cause)
        );
        assert_eq!(err.kind(), ErrorKind::ArgConversionFailed);
    }

    #[test]
    fn test_runtime_and_fault_share_runtime_kind() {
        let runtime = CallError::Runtime {
            source: Arc::new(std::fmt::Error),
            outputs: Vec::new(),
        };
        let fault = CallError::Fault {
            message: "boom".to_string(),
        };

        assert_eq!(runtime.kind(), ErrorKind::RuntimeFault);
        assert_eq!(fault.kind(), ErrorKind::RuntimeFault);
        assert_eq!(fault.to_string(), "panic: boom");
        assert!(runtime.outputs().is_some());
        assert!(fault.outputs().is_none());
    }

    #[test]
    fn test_panic_message_reads_str_and_string_payloads() {
        let from_str: Box<dyn Any + Send> = Box::new("static message");
        let from_string: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        let other: Box<dyn Any + Send> = Box::new(42_u8);

        assert_eq!(panic_message(&*from_str), "static message");
        assert_eq!(panic_message(&*from_string), "owned message");
        assert_eq!(panic_message(&*other), "unknown panic payload");
    }
}
