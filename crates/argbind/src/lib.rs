//! Command dispatch over the `argbind-core` binding engine.
//!
//! A [`Commander`] maps command names to bound callables. A front end splits
//! user input into a command name and string tokens, and the commander binds
//! those tokens to the callable's parameters and returns its outputs.
//!
//! # Example
//!
//! ```
//! use argbind::{Commander, Context, Rest};
//!
//! let mut commander = Commander::new();
//! commander.register("add", |nums: Rest<i64>| nums.iter().sum::<i64>())?;
//!
//! let outputs = commander.call(&Context::empty(), "add", &["1", "2", "3"])?;
//! assert_eq!(outputs[0].value::<i64>(), Some(&6));
//! # Ok::<(), argbind::RegistryError>(())
//! ```
//!
//! # Configuration
//!
//! [`Config`] is read from TOML and controls the conversion mode, whether
//! re-registration replaces a command, and command aliases.

mod commander;
mod config;

pub use argbind_core::{
    BindError, Binding, BoxError, CallError, Callable, Context, ContextError, ErrorKind, Handler,
    IntoOutputs, Output, Param, ResolveContext, Resolver, Rest, ScanError, ScanMode, Scanner,
    SharedError, Signature, TypeDesc, Value, find_resolver, from_context, from_token, scan_param,
};
pub use commander::{Commander, RegistryError};
pub use config::{Config, ConfigError};
