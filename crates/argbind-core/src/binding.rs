//! Binding plans and the per-call invocation engine.
//!
//! A [`Binding`] is built once per callable. Construction assigns a resolver
//! to every parameter and counts the token-consuming ones; after that the
//! binding is immutable and every [`Binding::call`] only walks the plan.
//!
//! # Call lifecycle
//!
//! 1. **Arity check**: a non-variadic binding needs exactly as many tokens as
//!    it has token-consuming parameters. A variadic binding needs at least as
//!    many as its token-consuming fixed parameters.
//! 2. **Fixed resolution**: each fixed resolver runs in order; the first error
//!    ends the call.
//! 3. **Variadic resolution**: the tail resolver runs once per remaining token.
//! 4. **Invocation** of the callable with the resolved arguments.
//! 5. **Output mapping**: a filled trailing error slot becomes
//!    [`CallError::Runtime`], which still carries every output.
//!
//! Panics raised in steps 2 to 4 are caught and reported as
//! [`CallError::Fault`].
//!
//! # Thread Safety
//!
//! Bindings are `Send + Sync`. Each call builds its own [`ResolveContext`], so
//! one binding can serve concurrent calls without locking.

use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use tracing::{debug, instrument, trace, warn};

use crate::{
    context::Context,
    error::{BindError, CallError, panic_message},
    handler::{Callable, Handler, Output},
    param::{TypeDesc, Value},
    resolver::{ResolveContext, Resolver, find_resolver},
    scan::ScanMode,
};

/// A parameter type paired with the resolver chosen for it.
#[derive(Clone)]
struct Bound {
    ty: TypeDesc,
    resolver: Arc<dyn Resolver>,
}

impl Bound {
    fn new(ty: TypeDesc, custom: &[Arc<dyn Resolver>]) -> Self {
        Self {
            resolver: find_resolver(&ty, custom),
            ty,
        }
    }

    fn requires_arg(&self) -> bool {
        self.resolver.requires_arg(&self.ty)
    }

    fn resolve(&self, cx: &mut ResolveContext<'_>) -> Result<Value, CallError> {
        self.resolver.resolve(&self.ty, cx)
    }
}

impl fmt::Debug for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bound")
            .field("ty", &self.ty.name())
            .field("requires_arg", &self.requires_arg())
            .finish()
    }
}

/// The immutable resolution plan for one callable.
#[derive(Debug)]
pub struct Binding {
    callable: Callable,
    fixed: Vec<Bound>,
    variadic: Option<Bound>,
    expected_args: usize,
    scan: ScanMode,
}

impl Binding {
    /// Builds a binding for `handler`.
    ///
    /// `resolvers` are consulted in order before the built-in chain for every
    /// parameter type.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::VariadicTailNotConsuming`] if the variadic tail
    /// resolves without consuming tokens.
    pub fn new<Args: 'static, H: Handler<Args>>(
        handler: H,
        resolvers: &[Arc<dyn Resolver>],
    ) -> Result<Self, BindError> {
        Self::from_callable(Callable::new(handler), resolvers)
    }

    /// Builds a binding for an already erased callable.
    ///
    /// # Errors
    ///
    /// See [`Binding::new`].
    pub fn from_callable(
        callable: Callable,
        resolvers: &[Arc<dyn Resolver>],
    ) -> Result<Self, BindError> {
        let signature = callable.signature();

        let fixed: Vec<Bound> = signature
            .params()
            .iter()
            .map(|ty| Bound::new(*ty, resolvers))
            .collect();

        let variadic = signature
            .variadic()
            .map(|ty| Bound::new(*ty, resolvers));

        if let Some(tail) = &variadic
            && !tail.requires_arg()
        {
            return Err(BindError::VariadicTailNotConsuming {
                type_name: tail.ty.name(),
            });
        }

        let expected_args = fixed.iter().filter(|bound| bound.requires_arg()).count()
            + usize::from(variadic.is_some());

        debug!(
            callable = callable.name(),
            fixed = fixed.len(),
            expected_args,
            variadic = variadic.is_some(),
            "Bound callable"
        );

        Ok(Self {
            callable,
            fixed,
            variadic,
            expected_args,
            scan: ScanMode::default(),
        })
    }

    /// Builds a binding from a value whose type is only known at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::NotCallable`] unless `value` is a [`Callable`],
    /// and otherwise the errors of [`Binding::new`].
    pub fn from_any(
        value: Box<dyn Any + Send + Sync>,
        resolvers: &[Arc<dyn Resolver>],
    ) -> Result<Self, BindError> {
        let callable = value
            .downcast::<Callable>()
            .map_err(|_| BindError::NotCallable)?;
        Self::from_callable(*callable, resolvers)
    }

    /// Sets how the fallback converter reads tokens.
    #[must_use]
    pub fn with_scan_mode(mut self, scan: ScanMode) -> Self {
        self.scan = scan;
        self
    }

    #[must_use]
    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    /// Number of token-consuming parameters, the variadic tail included.
    #[must_use]
    pub fn expected_args(&self) -> usize {
        self.expected_args
    }

    #[must_use]
    pub fn is_variadic(&self) -> bool {
        self.variadic.is_some()
    }

    #[must_use]
    pub fn scan_mode(&self) -> ScanMode {
        self.scan
    }

    /// Resolves `tokens` against the plan, invokes the callable, and returns
    /// its outputs.
    ///
    /// # Errors
    ///
    /// - [`CallError::ArityMismatch`] if the token count does not fit.
    /// - [`CallError::ArgConversion`], [`CallError::ArgsExhausted`] or
    ///   [`CallError::ContextResolution`] if a parameter cannot be resolved.
    /// - [`CallError::Runtime`] if the callable returned an error.
    /// - [`CallError::Fault`] if a panic was contained.
    ///
    /// Containment does not touch the process panic hook, so the default
    /// hook still reports a contained panic on stderr before this returns.
    /// Install a quiet hook with [`std::panic::set_hook`] to rely on the
    /// `warn!` event alone.
    #[instrument(skip_all, fields(callable = self.callable.name(), tokens = tokens.len()))]
    pub fn call<S: AsRef<str>>(
        &self,
        ctx: &Context,
        tokens: &[S],
    ) -> Result<Vec<Output>, CallError> {
        self.check_arity(tokens.len())?;

        let tokens: Vec<&str> = tokens.iter().map(S::as_ref).collect();
        let mut cx = ResolveContext::new(ctx, &tokens).with_scan_mode(self.scan);

        let attempt = panic::catch_unwind(AssertUnwindSafe(|| self.resolve_and_invoke(&mut cx)));
        let outputs = match attempt {
            Ok(result) => result?,
            Err(payload) => {
                let message = panic_message(&*payload);
                warn!(callable = self.callable.name(), %message, "Contained panic");
                return Err(CallError::Fault { message });
            }
        };

        if let Some(Output::Error(Some(source))) = outputs.last() {
            let source = Arc::clone(source);
            debug!(callable = self.callable.name(), error = %source, "Callable returned error");
            return Err(CallError::Runtime { source, outputs });
        }

        Ok(outputs)
    }

    fn check_arity(&self, got: usize) -> Result<(), CallError> {
        if self.variadic.is_some() {
            let want = self.expected_args - 1;
            if got < want {
                return Err(CallError::ArityMismatch {
                    want,
                    got,
                    variadic: true,
                });
            }
        } else if got != self.expected_args {
            return Err(CallError::ArityMismatch {
                want: self.expected_args,
                got,
                variadic: false,
            });
        }
        Ok(())
    }

    fn resolve_and_invoke(&self, cx: &mut ResolveContext<'_>) -> Result<Vec<Output>, CallError> {
        let mut args = Vec::with_capacity(self.fixed.len() + cx.remaining());

        for bound in &self.fixed {
            args.push(bound.resolve(cx)?);
            trace!(param = bound.ty.name(), remaining = cx.remaining(), "Resolved parameter");
        }

        if let Some(tail) = &self.variadic {
            while cx.remaining() > 0 {
                let before = cx.remaining();
                args.push(tail.resolve(cx)?);
                if cx.remaining() >= before {
                    return Err(CallError::Fault {
                        message: format!(
                            "variadic resolver for {} did not consume a token",
                            tail.ty.name()
                        ),
                    });
                }
            }
        }

        self.callable.invoke(args)
    }
}
