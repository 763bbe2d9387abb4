//! Binding and invocation engine for command callables.
//!
//! This crate adapts ordinary Rust functions and closures to a flat sequence
//! of string tokens. Each parameter is bound either to the next token or to a
//! value derived from the invocation [`Context`], the callable is invoked, and
//! its outputs are classified into values and errors.
//!
//! # Key Components
//!
//! - **Parameters**: [`Param`] marks types a callable may accept, and
//!   [`scan_param!`] gives any `FromStr` type a token scanner
//! - **Resolvers**: [`Resolver`] strategies produce argument values, either
//!   from tokens ([`from_token`]) or from the context ([`from_context`])
//! - **Handlers**: [`Handler`] is implemented for functions and closures of up
//!   to seven parameters, with an optional [`Rest`] variadic tail
//! - **Bindings**: [`Binding`] is the immutable per-callable plan that runs a
//!   call end to end
//!
//! # Example
//!
//! ```
//! use argbind_core::{Binding, Context, Rest};
//!
//! fn add(nums: Rest<i64>) -> i64 {
//!     nums.iter().sum()
//! }
//!
//! let binding = Binding::new(add, &[]).unwrap();
//! let outputs = binding.call(&Context::empty(), &["1", "2", "3"]).unwrap();
//!
//! assert_eq!(outputs[0].value::<i64>(), Some(&6));
//! ```
//!
//! # Thread Safety
//!
//! Bindings, resolvers and callables are `Send + Sync`. A binding keeps no
//! per-call state, so it can be shared behind an `Arc` and called
//! concurrently.

mod binding;
mod context;
mod error;
mod handler;
mod param;
mod resolver;
mod scan;

pub use binding::Binding;
pub use context::{Context, ContextError};
pub use error::{BindError, BoxError, CallError, ErrorKind, SharedError};
pub use handler::{Callable, Handler, IntoOutputs, Output, Signature, Variadic};
pub use param::{Param, Rest, Scanner, TypeDesc, Value, scan_from_str};
pub use resolver::{ResolveContext, Resolver, find_resolver, from_context, from_token};
pub use scan::{ScanError, ScanMode, convert};
