//! Name-to-command registry and dispatch.

use std::{collections::HashMap, sync::Arc};

use argbind_core::{BindError, Binding, CallError, Context, Handler, Output, Resolver};
use tracing::{info, instrument};

use crate::config::{Config, ConfigError};

/// Errors that can occur when registering or dispatching commands.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// No command or alias is registered under the name.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A command with the name already exists and overwriting is disabled.
    #[error("duplicate command: {0}")]
    DuplicateCommand(String),

    /// The name is configured as an alias, so a command under it would be
    /// unreachable.
    #[error("command name is configured as an alias: {0}")]
    AliasConflict(String),

    /// The callable could not be bound.
    #[error("failed to bind command: {0}")]
    Bind(#[from] BindError),

    /// The command was found but the call failed.
    #[error(transparent)]
    Call(#[from] CallError),

    /// The registry configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A table of named commands, each backed by a [`Binding`].
///
/// Registration takes `&mut self`; lookup and dispatch take `&self`. Register
/// everything first, then wrap the commander in `Arc` to share it between
/// threads.
#[derive(Debug, Default)]
pub struct Commander {
    config: Config,
    commands: HashMap<String, Arc<Binding>>,
}

impl Commander {
    /// Creates an empty commander with the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty commander with `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Config`] if `config` fails validation.
    pub fn with_config(config: Config) -> Result<Self, RegistryError> {
        config.validate()?;
        Ok(Self {
            config,
            commands: HashMap::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Binds `handler` with the built-in resolvers and registers it as `name`.
    ///
    /// # Errors
    ///
    /// See [`Commander::register_with`].
    pub fn register<Args: 'static, H: Handler<Args>>(
        &mut self,
        name: &str,
        handler: H,
    ) -> Result<(), RegistryError> {
        self.register_with(name, handler, &[])
    }

    /// Binds `handler`, consulting `resolvers` before the built-in ones, and
    /// registers it as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AliasConflict`] if `name` is an alias,
    /// [`RegistryError::DuplicateCommand`] if `name` is taken and the config
    /// does not allow overwriting, or [`RegistryError::Bind`] if the handler
    /// cannot be bound.
    pub fn register_with<Args: 'static, H: Handler<Args>>(
        &mut self,
        name: &str,
        handler: H,
        resolvers: &[Arc<dyn Resolver>],
    ) -> Result<(), RegistryError> {
        if self.config.aliases.contains_key(name) {
            return Err(RegistryError::AliasConflict(name.to_string()));
        }
        if !self.config.allow_overwrite && self.commands.contains_key(name) {
            return Err(RegistryError::DuplicateCommand(name.to_string()));
        }

        let binding = Binding::new(handler, resolvers)?.with_scan_mode(self.config.scan);
        let replaced = self
            .commands
            .insert(name.to_string(), Arc::new(binding))
            .is_some();

        info!(command = name, replaced, "Registered command");
        Ok(())
    }

    /// Removes the command registered as `name`.
    ///
    /// Returns `true` if a command was removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.commands.remove(name).is_some()
    }

    /// Gets the binding for `name`, following aliases.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Binding>> {
        self.commands.get(self.config.resolve_alias(name)).cloned()
    }

    /// Returns registered command names in sorted order. Aliases are not
    /// included.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Dispatches `tokens` to the command registered as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownCommand`] if neither a command nor an
    /// alias matches `name`, or [`RegistryError::Call`] wrapping the
    /// binding's error.
    #[instrument(
        skip(self, ctx, tokens),
        fields(request_id = ctx.request_id(), tokens = tokens.len())
    )]
    pub fn call<S: AsRef<str>>(
        &self,
        ctx: &Context,
        name: &str,
        tokens: &[S],
    ) -> Result<Vec<Output>, RegistryError> {
        let binding = self
            .get(name)
            .ok_or_else(|| RegistryError::UnknownCommand(name.to_string()))?;
        Ok(binding.call(ctx, tokens)?)
    }
}

#[cfg(test)]
mod tests {
    use std::{convert::Infallible, io::Write, thread};

    use argbind_core::{ErrorKind, Rest, ScanMode, from_token};

    use super::*;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn add(nums: Rest<i64>) -> i64 {
        nums.iter().sum()
    }

    fn echo(word: String) -> String {
        word
    }

    fn commander() -> Commander {
        let mut commander = Commander::new();
        commander.register("add", add).unwrap();
        commander.register("echo", echo).unwrap();
        commander
    }

    fn value_of<T: Clone + 'static>(outputs: &[Output]) -> T {
        outputs[0].value::<T>().cloned().expect("first output value")
    }

    #[test]
    fn test_new_commander_is_empty() {
        let commander = Commander::new();

        assert!(commander.is_empty());
        assert_eq!(commander.len(), 0);
        assert!(commander.names().is_empty());
    }

    #[test]
    fn test_register_and_call() {
        // Arrange
        init_tracing();
        let commander = commander();

        // Act
        let outputs = commander
            .call(&Context::empty(), "add", &["1", "2", "3"])
            .unwrap();

        // Assert
        assert_eq!(value_of::<i64>(&outputs), 6);
        assert_eq!(commander.len(), 2);
    }

    #[test]
    fn test_names_are_sorted() {
        let mut commander = commander();
        commander.register("concat", |a: String, b: String| a + &b).unwrap();

        assert_eq!(commander.names(), vec!["add", "concat", "echo"]);
    }

    #[test]
    fn test_unknown_command() {
        let commander = commander();

        let err = commander
            .call(&Context::empty(), "missing", &[] as &[&str])
            .unwrap_err();

        assert!(matches!(err, RegistryError::UnknownCommand(ref name) if name == "missing"));
        assert_eq!(err.to_string(), "unknown command: missing");
    }

    #[test]
    fn test_duplicate_registration_is_rejected_by_default() {
        let mut commander = commander();

        let err = commander.register("add", echo).unwrap_err();

        assert!(matches!(err, RegistryError::DuplicateCommand(ref name) if name == "add"));
        let outputs = commander.call(&Context::empty(), "add", &["2"]).unwrap();
        assert_eq!(value_of::<i64>(&outputs), 2);
    }

    #[test]
    fn test_allow_overwrite_replaces_command() {
        // Arrange
        let config = Config {
            allow_overwrite: true,
            ..Config::default()
        };
        let mut commander = Commander::with_config(config).unwrap();
        commander.register("run", add).unwrap();

        // Act
        commander.register("run", echo).unwrap();

        // Assert
        let outputs = commander.call(&Context::empty(), "run", &["hi"]).unwrap();
        assert_eq!(value_of::<String>(&outputs), "hi");
        assert_eq!(commander.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let mut commander = commander();

        assert!(commander.unregister("echo"));
        assert!(!commander.unregister("echo"));
        assert!(commander.get("echo").is_none());
    }

    #[test]
    fn test_alias_dispatches_to_target() {
        let mut config = Config::default();
        config.aliases.insert("sum".to_string(), "add".to_string());
        let mut commander = Commander::with_config(config).unwrap();
        commander.register("add", add).unwrap();

        let outputs = commander.call(&Context::empty(), "sum", &["4", "5"]).unwrap();

        assert_eq!(value_of::<i64>(&outputs), 9);
        assert_eq!(commander.names(), vec!["add"]);
    }

    #[test]
    fn test_register_under_alias_name_is_rejected() {
        // Arrange
        let mut config = Config::default();
        config.aliases.insert("add".to_string(), "echo".to_string());
        let mut commander = Commander::with_config(config).unwrap();
        commander.register("echo", echo).unwrap();

        // Act
        let err = commander
            .register("add", |a: i64, b: i64| a + b)
            .unwrap_err();

        // Assert
        assert!(matches!(err, RegistryError::AliasConflict(ref name) if name == "add"));
        assert_eq!(commander.names(), vec!["echo"]);
        let outputs = commander.call(&Context::empty(), "add", &["hi"]).unwrap();
        assert_eq!(value_of::<String>(&outputs), "hi");
    }

    #[test]
    fn test_with_config_rejects_chained_alias() {
        let mut config = Config::default();
        config.aliases.insert("a".to_string(), "b".to_string());
        config.aliases.insert("b".to_string(), "c".to_string());

        let result = Commander::with_config(config);

        assert!(matches!(
            result,
            Err(RegistryError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn test_call_error_is_wrapped_with_kind() {
        let commander = commander();

        let err = commander.call(&Context::empty(), "add", &["x"]).unwrap_err();

        match err {
            RegistryError::Call(call) => assert_eq!(call.kind(), ErrorKind::ArgConversionFailed),
            other => panic!("Expected Call error, got {other:?}"),
        }
    }

    #[test]
    fn test_register_with_custom_resolver() {
        let mut commander = Commander::new();
        let upper = from_token(|arg: &str| Ok::<_, Infallible>(arg.to_uppercase()));
        commander.register_with("shout", echo, &[upper]).unwrap();

        let outputs = commander.call(&Context::empty(), "shout", &["hey"]).unwrap();

        assert_eq!(value_of::<String>(&outputs), "HEY");
    }

    #[test]
    fn test_strict_config_applies_to_registered_bindings() {
        // Arrange
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scan = \"strict\"").unwrap();
        let config = Config::load(file.path()).unwrap();
        let mut commander = Commander::with_config(config).unwrap();
        commander.register("add", add).unwrap();

        // Act
        let err = commander
            .call(&Context::empty(), "add", &["1 2"])
            .unwrap_err();

        // Assert
        assert_eq!(
            commander.get("add").map(|binding| binding.scan_mode()),
            Some(ScanMode::Strict)
        );
        assert!(matches!(err, RegistryError::Call(CallError::ArgConversion { .. })));
    }

    #[test]
    fn test_runtime_error_passes_through() {
        let mut commander = Commander::new();
        commander
            .register("fail", |n: i64| -> anyhow::Result<i64> {
                anyhow::ensure!(n != 0, "zero is not allowed");
                Ok(n)
            })
            .unwrap();

        let err = commander.call(&Context::empty(), "fail", &["0"]).unwrap_err();

        assert_eq!(err.to_string(), "command runtime error: zero is not allowed");
    }

    #[test]
    fn test_shared_commander_dispatches_from_many_threads() {
        let commander = Arc::new(commander());

        let handles: Vec<_> = (1..=4_i64)
            .map(|n| {
                let commander = Arc::clone(&commander);
                thread::spawn(move || {
                    let tokens = [n.to_string(), n.to_string()];
                    let outputs = commander.call(&Context::empty(), "add", &tokens).unwrap();
                    value_of::<i64>(&outputs)
                })
            })
            .collect();

        let sums: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(sums, vec![2, 4, 6, 8]);
    }
}
