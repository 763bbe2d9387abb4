//! Ambient context for a single command invocation.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use serde::de::DeserializeOwned;

use crate::param::Param;

/// Errors that can occur when reading values from a [`Context`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ContextError {
    /// No value is stored under the requested key.
    #[error("context value '{0}' not found")]
    NotFound(String),

    /// The stored value does not deserialize into the requested type.
    #[error("failed to deserialize context value '{key}': {source}")]
    Deserialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Provides request metadata and ambient values to context-derived resolvers.
///
/// A context is created by the front end for each call. Clones share the
/// cancellation flag and extension values, so a callable that receives a
/// `Context` parameter observes cancellation requested by the caller.
#[derive(Debug, Clone, Default)]
pub struct Context {
    request_id: String,
    session_id: String,
    user_id: String,
    values: HashMap<String, serde_json::Value>,
    extensions: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    cancelled: Arc<AtomicBool>,
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a context with the specified request metadata.
    #[must_use]
    pub fn with_metadata(request_id: &str, session_id: &str, user_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            ..Self::default()
        }
    }

    /// Caller-assigned identifier for correlating logs across components.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Stores a JSON value under `key`, replacing any previous value.
    #[must_use]
    pub fn with_value(mut self, key: &str, value: serde_json::Value) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    /// Returns true if a value is stored under `key`.
    #[must_use]
    pub fn has_value(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Retrieves the value stored under `key`, deserializing into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::NotFound`] if no value is stored under `key`,
    /// or [`ContextError::Deserialization`] if it does not fit `T`.
    pub fn value<T: DeserializeOwned>(&self, key: &str) -> Result<T, ContextError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ContextError::NotFound(key.to_string()))?;

        T::deserialize(value).map_err(|source| ContextError::Deserialization {
            key: key.to_string(),
            source,
        })
    }

    /// Attaches a typed extension, replacing any previous one of the same type.
    #[must_use]
    pub fn with_extension<T: Any + Send + Sync>(mut self, extension: T) -> Self {
        self.insert_extension(extension);
        self
    }

    pub fn insert_extension<T: Any + Send + Sync>(&mut self, extension: T) {
        self.extensions
            .insert(TypeId::of::<T>(), Arc::new(extension));
    }

    #[must_use]
    pub fn extension<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|extension| (**extension).downcast_ref::<T>())
    }

    /// Requests cooperative cancellation of the call.
    ///
    /// The engine never checks this flag itself; resolvers and callables may.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Param for Context {}
