//! Resolution strategies for individual parameters.
//!
//! A [`Resolver`] produces one typed value for one parameter, either by
//! consuming the next token or by deriving the value from the invocation
//! [`Context`]. Binding picks the first caller-supplied resolver that accepts
//! a parameter type and otherwise falls back to the built-ins: the context
//! resolver for [`Context`], the identity resolver for [`String`], and the
//! scanning converter for everything else.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    convert::Infallible,
    fmt,
    marker::PhantomData,
    sync::Arc,
};

use crate::{
    context::Context,
    error::{BoxError, CallError},
    param::{Param, TypeDesc, Value},
    scan::{self, ScanMode},
};

/// A strategy for producing values of one or more parameter types.
///
/// Implementations must be stateless with respect to individual calls: all
/// per-call state lives in the [`ResolveContext`], see
/// [`ResolveContext::state_mut_or_default`].
pub trait Resolver: Send + Sync {
    /// Returns true if this resolver can produce values of `ty`.
    fn can_resolve(&self, ty: &TypeDesc) -> bool;

    /// Returns true if resolving `ty` consumes exactly one token.
    fn requires_arg(&self, ty: &TypeDesc) -> bool;

    /// Produces a value of `ty`.
    ///
    /// # Errors
    ///
    /// Token-consuming resolvers return [`CallError::ArgsExhausted`] when no
    /// token remains and [`CallError::ArgConversion`] when the token does not
    /// convert; context resolvers return [`CallError::ContextResolution`].
    fn resolve(&self, ty: &TypeDesc, cx: &mut ResolveContext<'_>) -> Result<Value, CallError>;
}

/// Per-call resolution state: the ambient context, a cursor over the
/// remaining tokens, and a scratch bag resolvers share for one call.
///
/// The token slice is never mutated; consuming a token advances the cursor.
pub struct ResolveContext<'a> {
    context: &'a Context,
    tokens: &'a [&'a str],
    cursor: usize,
    scan: ScanMode,
    state: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl<'a> ResolveContext<'a> {
    #[must_use]
    pub fn new(context: &'a Context, tokens: &'a [&'a str]) -> Self {
        Self {
            context,
            tokens,
            cursor: 0,
            scan: ScanMode::default(),
            state: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_scan_mode(mut self, scan: ScanMode) -> Self {
        self.scan = scan;
        self
    }

    #[must_use]
    pub fn context(&self) -> &'a Context {
        self.context
    }

    #[must_use]
    pub fn scan_mode(&self) -> ScanMode {
        self.scan
    }

    /// Number of tokens not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.tokens.len() - self.cursor
    }

    #[must_use]
    pub fn remaining_tokens(&self) -> &'a [&'a str] {
        &self.tokens[self.cursor..]
    }

    /// Consumes the next token on behalf of a parameter of type `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::ArgsExhausted`] if no token remains.
    pub fn next_token(&mut self, ty: &TypeDesc) -> Result<&'a str, CallError> {
        let token = self
            .tokens
            .get(self.cursor)
            .copied()
            .ok_or(CallError::ArgsExhausted {
                type_name: ty.name(),
            })?;
        self.cursor += 1;
        Ok(token)
    }

    /// Returns the call-scoped state of type `T`, if a resolver stored one.
    #[must_use]
    pub fn state<T: Any + Send>(&self) -> Option<&T> {
        self.state
            .get(&TypeId::of::<T>())
            .and_then(|state| state.downcast_ref::<T>())
    }

    /// Returns the call-scoped state of type `T`, inserting `T::default()`
    /// first if none exists.
    ///
    /// State lives until the call ends and is never shared between calls.
    pub fn state_mut_or_default<T: Any + Send + Default>(&mut self) -> &mut T {
        let state = self
            .state
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()));
        match state.downcast_mut::<T>() {
            Some(state) => state,
            None => unreachable!("state is keyed by its own TypeId"),
        }
    }
}

impl fmt::Debug for ResolveContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveContext")
            .field("request_id", &self.context.request_id())
            .field("remaining", &self.remaining_tokens())
            .field("scan", &self.scan)
            .field("state", &self.state.len())
            .finish()
    }
}

/// Builds a resolver that consumes one token and parses it with `parse`.
///
/// The resolver accepts parameters of exactly type `T`. Parse failures are
/// reported as [`CallError::ArgConversion`].
pub fn from_token<T, E, F>(parse: F) -> Arc<dyn Resolver>
where
    T: Param,
    E: Into<BoxError> + 'static,
    F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
{
    Arc::new(TokenResolver {
        parse,
        _marker: PhantomData,
    })
}

/// Builds a resolver that derives a `T` from the invocation context without
/// consuming a token.
pub fn from_context<T, E, F>(derive: F) -> Arc<dyn Resolver>
where
    T: Param,
    E: Into<BoxError> + 'static,
    F: Fn(&Context) -> Result<T, E> + Send + Sync + 'static,
{
    Arc::new(ContextResolver {
        derive,
        _marker: PhantomData,
    })
}

struct TokenResolver<T, E, F> {
    parse: F,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E, F> Resolver for TokenResolver<T, E, F>
where
    T: Param,
    E: Into<BoxError> + 'static,
    F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
{
    fn can_resolve(&self, ty: &TypeDesc) -> bool {
        ty.is::<T>()
    }

    fn requires_arg(&self, _ty: &TypeDesc) -> bool {
        true
    }

    fn resolve(&self, ty: &TypeDesc, cx: &mut ResolveContext<'_>) -> Result<Value, CallError> {
        let token = cx.next_token(ty)?;
        (self.parse)(token)
            .map(|value| Box::new(value) as Value)
            .map_err(|e| CallError::ArgConversion {
                token: token.to_string(),
                type_name: ty.name(),
                source: e.into(),
            })
    }
}

struct ContextResolver<T, E, F> {
    derive: F,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E, F> Resolver for ContextResolver<T, E, F>
where
    T: Param,
    E: Into<BoxError> + 'static,
    F: Fn(&Context) -> Result<T, E> + Send + Sync + 'static,
{
    fn can_resolve(&self, ty: &TypeDesc) -> bool {
        ty.is::<T>()
    }

    fn requires_arg(&self, _ty: &TypeDesc) -> bool {
        false
    }

    fn resolve(&self, ty: &TypeDesc, cx: &mut ResolveContext<'_>) -> Result<Value, CallError> {
        (self.derive)(cx.context())
            .map(|value| Box::new(value) as Value)
            .map_err(|e| CallError::ContextResolution {
                type_name: ty.name(),
                source: e.into(),
            })
    }
}

/// Fallback resolver: consumes one token and converts it with the target
/// type's scanner.
struct ScanResolver;

impl Resolver for ScanResolver {
    fn can_resolve(&self, _ty: &TypeDesc) -> bool {
        true
    }

    fn requires_arg(&self, _ty: &TypeDesc) -> bool {
        true
    }

    fn resolve(&self, ty: &TypeDesc, cx: &mut ResolveContext<'_>) -> Result<Value, CallError> {
        let token = cx.next_token(ty)?;
        scan::convert(token, ty, cx.scan_mode())
    }
}

/// Selects the resolver for `ty`.
///
/// The first of `custom` whose [`Resolver::can_resolve`] accepts `ty` wins;
/// otherwise the built-in chain applies.
#[must_use]
pub fn find_resolver(ty: &TypeDesc, custom: &[Arc<dyn Resolver>]) -> Arc<dyn Resolver> {
    custom
        .iter()
        .find(|resolver| resolver.can_resolve(ty))
        .map_or_else(|| builtin(ty), Arc::clone)
}

fn builtin(ty: &TypeDesc) -> Arc<dyn Resolver> {
    if ty.is::<Context>() {
        from_context(|ctx: &Context| Ok::<_, Infallible>(ctx.clone()))
    } else if ty.is::<String>() {
        from_token(|token: &str| Ok::<_, Infallible>(token.to_string()))
    } else {
        Arc::new(ScanResolver)
    }
}
