//! Callable abstraction: signatures, erased invocation and output mapping.
//!
//! Any `Fn(A1, ..., An) -> R` whose parameters implement [`Param`] and whose
//! return type implements [`IntoOutputs`] is a [`Handler`]. A function whose
//! last parameter is [`Rest<T>`] is variadic. [`Callable`] erases the concrete
//! function type so bindings can be stored side by side.

use std::{
    any::{Any, type_name},
    fmt,
    marker::PhantomData,
    sync::Arc,
};

use crate::{
    error::{BoxError, CallError, SharedError},
    param::{Param, Rest, TypeDesc, Value},
};

/// One slot of a callable's output list.
#[derive(Debug)]
pub enum Output {
    /// A value the callable returned.
    Value(Value),
    /// The trailing error slot of a fallible callable. `None` on success.
    Error(Option<SharedError>),
    /// A value slot the callable declared but did not fill, because it
    /// returned an error instead.
    Missing,
}

impl Output {
    /// Returns the slot's value if it holds a `T`.
    #[must_use]
    pub fn value<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Value(value) => (**value).downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Takes the slot's value if it holds a `T`.
    #[must_use]
    pub fn into_value<T: Any>(self) -> Option<T> {
        match self {
            Self::Value(value) => value.downcast::<T>().ok().map(|value| *value),
            _ => None,
        }
    }

    /// Returns the error held by an error slot.
    #[must_use]
    pub fn error(&self) -> Option<&SharedError> {
        match self {
            Self::Error(error) => error.as_ref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_error_slot(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Maps a callable's return value onto an ordered output list.
///
/// `()` yields no outputs, a single [`Param`] yields one, tuples yield one per
/// element, and `Result<T, E>` yields `T`'s outputs followed by an error slot.
///
/// An `Err` carries no values, so its value slots are filled with
/// [`Output::Missing`]. The output list keeps its declared length either way,
/// and a runtime error hands those slots back unmodified through
/// [`CallError::outputs`].
pub trait IntoOutputs: Send + 'static {
    /// Number of outputs this return type declares.
    fn arity() -> usize;

    fn into_outputs(self, outputs: &mut Vec<Output>);
}

impl IntoOutputs for () {
    fn arity() -> usize {
        0
    }

    fn into_outputs(self, _outputs: &mut Vec<Output>) {}
}

impl<T: Param> IntoOutputs for T {
    fn arity() -> usize {
        1
    }

    fn into_outputs(self, outputs: &mut Vec<Output>) {
        outputs.push(Output::Value(Box::new(self)));
    }
}

impl<T, E> IntoOutputs for Result<T, E>
where
    T: IntoOutputs,
    E: Into<BoxError> + Send + 'static,
{
    fn arity() -> usize {
        T::arity() + 1
    }

    fn into_outputs(self, outputs: &mut Vec<Output>) {
        match self {
            Ok(value) => {
                value.into_outputs(outputs);
                outputs.push(Output::Error(None));
            }
            Err(error) => {
                let error: BoxError = error.into();
                outputs.extend((0..T::arity()).map(|_| Output::Missing));
                outputs.push(Output::Error(Some(Arc::from(error))));
            }
        }
    }
}

macro_rules! impl_tuple_outputs {
    ($($ty:ident $var:ident),+) => {
        impl<$($ty: Param),+> IntoOutputs for ($($ty,)+) {
            fn arity() -> usize {
                [$(stringify!($ty)),+].len()
            }

            fn into_outputs(self, outputs: &mut Vec<Output>) {
                let ($($var,)+) = self;
                $(outputs.push(Output::Value(Box::new($var)));)+
            }
        }
    };
}

impl_tuple_outputs!(A a, B b);
impl_tuple_outputs!(A a, B b, C c);
impl_tuple_outputs!(A a, B b, C c, D d);

/// Parameter and output shape of a callable.
#[derive(Debug, Clone)]
pub struct Signature {
    params: Vec<TypeDesc>,
    variadic: Option<TypeDesc>,
    outputs: usize,
}

impl Signature {
    #[must_use]
    pub fn new(params: Vec<TypeDesc>, variadic: Option<TypeDesc>, outputs: usize) -> Self {
        Self {
            params,
            variadic,
            outputs,
        }
    }

    /// Fixed parameter types, in declaration order.
    #[must_use]
    pub fn params(&self) -> &[TypeDesc] {
        &self.params
    }

    /// Element type of the variadic tail, if the callable has one.
    #[must_use]
    pub fn variadic(&self) -> Option<&TypeDesc> {
        self.variadic.as_ref()
    }

    #[must_use]
    pub fn is_variadic(&self) -> bool {
        self.variadic.is_some()
    }

    /// Number of outputs the callable declares.
    #[must_use]
    pub fn outputs(&self) -> usize {
        self.outputs
    }
}

/// A function that can be driven by resolved, type-erased arguments.
///
/// `Args` is a marker that keeps the fixed-arity and variadic implementations
/// apart; callers never name it.
pub trait Handler<Args>: Send + Sync + 'static {
    fn signature(&self) -> Signature;

    /// Invokes the function with one value per fixed parameter followed by
    /// one value per variadic element.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Fault`] if an argument is missing or has the
    /// wrong type.
    fn invoke(&self, args: Vec<Value>) -> Result<Vec<Output>, CallError>;
}

/// Argument marker for variadic handlers.
#[doc(hidden)]
pub struct Variadic<Fixed, T>(PhantomData<fn() -> (Fixed, T)>);

fn take<T: Param>(args: &mut impl Iterator<Item = Value>) -> Result<T, CallError> {
    let value = args.next().ok_or_else(|| CallError::Fault {
        message: format!("missing resolved argument of type {}", type_name::<T>()),
    })?;
    downcast(value)
}

fn downcast<T: Param>(value: Value) -> Result<T, CallError> {
    value
        .downcast::<T>()
        .map(|value| *value)
        .map_err(|_| CallError::Fault {
            message: format!("resolved argument is not of type {}", type_name::<T>()),
        })
}

fn ensure_drained(args: &mut impl Iterator<Item = Value>) -> Result<(), CallError> {
    match args.next() {
        None => Ok(()),
        Some(_) => Err(CallError::Fault {
            message: "more resolved arguments than parameters".to_string(),
        }),
    }
}

fn collect_outputs<R: IntoOutputs>(ret: R) -> Vec<Output> {
    let mut outputs = Vec::with_capacity(R::arity());
    ret.into_outputs(&mut outputs);
    outputs
}

macro_rules! impl_handler {
    ($($ty:ident $var:ident),*) => {
        impl<F, R, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: IntoOutputs,
            $($ty: Param,)*
        {
            fn signature(&self) -> Signature {
                Signature::new(vec![$(TypeDesc::of::<$ty>()),*], None, R::arity())
            }

            fn invoke(&self, args: Vec<Value>) -> Result<Vec<Output>, CallError> {
                let mut args = args.into_iter();
                $(let $var = take::<$ty>(&mut args)?;)*
                ensure_drained(&mut args)?;
                Ok(collect_outputs((self)($($var),*)))
            }
        }

        impl<F, R, $($ty,)* T> Handler<Variadic<($($ty,)*), T>> for F
        where
            F: Fn($($ty,)* Rest<T>) -> R + Send + Sync + 'static,
            R: IntoOutputs,
            $($ty: Param,)*
            T: Param,
        {
            fn signature(&self) -> Signature {
                Signature::new(
                    vec![$(TypeDesc::of::<$ty>()),*],
                    Some(TypeDesc::of::<T>()),
                    R::arity(),
                )
            }

            fn invoke(&self, args: Vec<Value>) -> Result<Vec<Output>, CallError> {
                let mut args = args.into_iter();
                $(let $var = take::<$ty>(&mut args)?;)*
                let rest = args
                    .by_ref()
                    .map(downcast::<T>)
                    .collect::<Result<Vec<T>, _>>()?;
                Ok(collect_outputs((self)($($var,)* Rest(rest))))
            }
        }
    };
}

impl_handler!();
impl_handler!(A1 a1);
impl_handler!(A1 a1, A2 a2);
impl_handler!(A1 a1, A2 a2, A3 a3);
impl_handler!(A1 a1, A2 a2, A3 a3, A4 a4);
impl_handler!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_handler!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);
impl_handler!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7);

type Invoker = Box<dyn Fn(Vec<Value>) -> Result<Vec<Output>, CallError> + Send + Sync>;

/// A type-erased callable together with its signature.
pub struct Callable {
    name: &'static str,
    signature: Signature,
    invoke: Invoker,
}

impl Callable {
    /// Erases `handler`, capturing its signature.
    pub fn new<Args: 'static, H: Handler<Args>>(handler: H) -> Self {
        Self {
            name: type_name::<H>(),
            signature: <H as Handler<Args>>::signature(&handler),
            invoke: Box::new(move |args| <H as Handler<Args>>::invoke(&handler, args)),
        }
    }

    /// Name of the underlying function type, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Invokes the callable with already-resolved arguments.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Fault`] if the arguments do not match the
    /// signature.
    pub fn invoke(&self, args: Vec<Value>) -> Result<Vec<Output>, CallError> {
        (self.invoke)(args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}
