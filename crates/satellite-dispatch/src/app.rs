//! The app boundary and the in-process app builder.
//!
//! [`App`] is the whole surface a host sees of an app: its manifest, command
//! execution, and the three hook phases. A host talks to an in-process
//! [`Dispatcher`] and to an out-of-process [`RemoteApp`](crate::RemoteApp)
//! the same way.
//!
//! # Building an App
//!
//! ```rust
//! use satellite_dispatch::{
//!     App, Command, CommandContext, Dispatcher, ExecutedCommand, Flag, Invocation, Manifest,
//! };
//!
//! let manifest = Manifest::builder("hello")
//!     .command(Command::new("greet").flag(Flag::string("name").default_value("world")))
//!     .build()?;
//!
//! let app = Dispatcher::builder(manifest)
//!     .command("greet", |inv: &Invocation, _ctx: &CommandContext| {
//!         println!("hello {}", inv.flags.string("name")?);
//!         Ok(())
//!     })?
//!     .build()?;
//!
//! app.execute(&ExecutedCommand::new(["greet"]), &CommandContext::default())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Handler paths are verified against the manifest while building: a path
//! the manifest does not declare, or a leaf command left without a handler,
//! fails [`DispatcherBuilder::build`] instead of falling through at runtime.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::dispatch::{resolve_node, string_to_path, UnresolvedPathError};
use crate::error::DispatchError;
use crate::flags::decode;
use crate::handler::{
    CommandContext, ExecutedCommand, ExecutedHook, Extensions, FnHandler, Handler, HandlerResult,
    Invocation,
};
use crate::hooks::{HookPhase, Hooks};
use crate::manifest::{Command, Manifest};

/// An app as the host sees it.
///
/// Implementations are shared across threads; a host may drive several
/// invocations concurrently.
pub trait App: Send + Sync {
    /// Returns the app's manifest.
    fn manifest(&self) -> Result<Manifest, DispatchError>;

    /// Runs the command named by `command.path`.
    fn execute(&self, command: &ExecutedCommand, ctx: &CommandContext)
        -> Result<(), DispatchError>;

    fn hook_pre(&self, _hook: &ExecutedHook, _ctx: &CommandContext) -> Result<(), DispatchError> {
        Ok(())
    }

    fn hook_post(&self, _hook: &ExecutedHook, _ctx: &CommandContext) -> Result<(), DispatchError> {
        Ok(())
    }

    fn hook_clean_up(
        &self,
        _hook: &ExecutedHook,
        _ctx: &CommandContext,
    ) -> Result<(), DispatchError> {
        Ok(())
    }
}

impl<T: App + ?Sized> App for Arc<T> {
    fn manifest(&self) -> Result<Manifest, DispatchError> {
        (**self).manifest()
    }

    fn execute(
        &self,
        command: &ExecutedCommand,
        ctx: &CommandContext,
    ) -> Result<(), DispatchError> {
        (**self).execute(command, ctx)
    }

    fn hook_pre(&self, hook: &ExecutedHook, ctx: &CommandContext) -> Result<(), DispatchError> {
        (**self).hook_pre(hook, ctx)
    }

    fn hook_post(&self, hook: &ExecutedHook, ctx: &CommandContext) -> Result<(), DispatchError> {
        (**self).hook_post(hook, ctx)
    }

    fn hook_clean_up(&self, hook: &ExecutedHook, ctx: &CommandContext) -> Result<(), DispatchError> {
        (**self).hook_clean_up(hook, ctx)
    }
}

/// Error type for dispatcher setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// A handler targets a path the manifest does not declare.
    UnknownCommand(String),
    /// A leaf command has no handler.
    MissingHandler(String),
    /// Two handlers target the same command.
    DuplicateHandler(String),
    /// Hook callbacks target a hook the manifest does not declare.
    UnknownHook(String),
    /// Hook callbacks registered twice for one hook.
    DuplicateHook(String),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::UnknownCommand(path) => write!(f, "unknown command: {}", path),
            SetupError::MissingHandler(path) => write!(f, "no handler for command: {}", path),
            SetupError::DuplicateHandler(path) => write!(f, "duplicate handler: {}", path),
            SetupError::UnknownHook(name) => write!(f, "unknown hook: {}", name),
            SetupError::DuplicateHook(name) => write!(f, "duplicate hook callbacks: {}", name),
        }
    }
}

impl std::error::Error for SetupError {}

/// An in-process app: a manifest plus the handlers behind it.
pub struct Dispatcher {
    manifest: Manifest,
    handlers: HashMap<String, Arc<dyn Handler>>,
    hooks: HashMap<String, Hooks>,
    app_state: Arc<Extensions>,
}

impl Dispatcher {
    pub fn builder(manifest: Manifest) -> DispatcherBuilder {
        DispatcherBuilder {
            manifest,
            handlers: HashMap::new(),
            hooks: HashMap::new(),
            app_state: Extensions::new(),
        }
    }

    /// Borrowed access to the manifest.
    pub fn manifest_ref(&self) -> &Manifest {
        &self.manifest
    }

    fn hook_phase(
        &self,
        phase: HookPhase,
        hook: &ExecutedHook,
        ctx: &CommandContext,
    ) -> Result<(), DispatchError> {
        let name = &hook.hook.name;
        if self.manifest.hook(name).is_none() {
            return Err(UnresolvedPathError {
                matched: Vec::new(),
                attempted: Some(name.clone()),
                available: self.manifest.hooks().iter().map(|h| h.name.clone()).collect(),
            }
            .into());
        }

        let hooks = match self.hooks.get(name) {
            Some(hooks) => hooks,
            None => return Ok(()),
        };

        log::debug!("running {} phase of hook `{}`", phase, name);
        let ctx = ctx.clone().with_app_state(self.app_state.clone());
        hooks.run(phase, hook, &ctx).map_err(DispatchError::handler)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut commands: Vec<_> = self.handlers.keys().collect();
        commands.sort();
        f.debug_struct("Dispatcher")
            .field("app", &self.manifest.name())
            .field("commands", &commands)
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl App for Dispatcher {
    fn manifest(&self) -> Result<Manifest, DispatchError> {
        Ok(self.manifest.clone())
    }

    fn execute(
        &self,
        command: &ExecutedCommand,
        ctx: &CommandContext,
    ) -> Result<(), DispatchError> {
        ctx.checkpoint()?;

        let resolved = resolve_node(&self.manifest, command.path.as_slice())?;
        let key = resolved.key();
        let handler = self
            .handlers
            .get(&key)
            .ok_or_else(|| UnresolvedPathError::group(&resolved))?;

        let flags = decode(resolved.flag_set(), &command.flags)?;

        let mut args = resolved.remaining.clone();
        args.extend(command.args.iter().cloned());

        let invocation = Invocation {
            command: resolved.command,
            path: resolved.path.clone(),
            args,
            os_args: &command.os_args,
            flags,
        };
        let ctx = ctx
            .clone()
            .with_app_state(self.app_state.clone())
            .with_command_path(resolved.path.clone());

        log::debug!("executing `{}`", key);
        handler
            .handle(&invocation, &ctx)
            .map_err(DispatchError::handler)
    }

    fn hook_pre(&self, hook: &ExecutedHook, ctx: &CommandContext) -> Result<(), DispatchError> {
        self.hook_phase(HookPhase::Pre, hook, ctx)
    }

    fn hook_post(&self, hook: &ExecutedHook, ctx: &CommandContext) -> Result<(), DispatchError> {
        self.hook_phase(HookPhase::Post, hook, ctx)
    }

    fn hook_clean_up(&self, hook: &ExecutedHook, ctx: &CommandContext) -> Result<(), DispatchError> {
        self.hook_phase(HookPhase::CleanUp, hook, ctx)
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    manifest: Manifest,
    handlers: HashMap<String, Arc<dyn Handler>>,
    hooks: HashMap<String, Hooks>,
    app_state: Extensions,
}

impl DispatcherBuilder {
    /// Registers a closure for the command at the dotted `path`.
    pub fn command<F>(self, path: &str, f: F) -> Result<Self, SetupError>
    where
        F: Fn(&Invocation<'_>, &CommandContext) -> HandlerResult + Send + Sync + 'static,
    {
        self.handler(path, FnHandler::new(f))
    }

    /// Registers a handler for the command at the dotted `path`.
    ///
    /// Aliases are accepted; the handler is stored under the canonical path.
    pub fn handler<H>(mut self, path: &str, handler: H) -> Result<Self, SetupError>
    where
        H: Handler + 'static,
    {
        let segments = string_to_path(path);
        let key = match resolve_node(&self.manifest, segments.as_slice()) {
            Ok(resolved) if resolved.remaining.is_empty() => resolved.key(),
            _ => return Err(SetupError::UnknownCommand(path.to_string())),
        };

        if self.handlers.contains_key(&key) {
            return Err(SetupError::DuplicateHandler(key));
        }
        self.handlers.insert(key, Arc::new(handler));
        Ok(self)
    }

    /// Registers callbacks for a declared hook.
    pub fn hooks(mut self, name: &str, hooks: Hooks) -> Result<Self, SetupError> {
        if self.manifest.hook(name).is_none() {
            return Err(SetupError::UnknownHook(name.to_string()));
        }
        if self.hooks.contains_key(name) {
            return Err(SetupError::DuplicateHook(name.to_string()));
        }
        self.hooks.insert(name.to_string(), hooks);
        Ok(self)
    }

    /// Adds app-lifetime state available to every handler via
    /// `ctx.app_state`.
    pub fn app_state<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.app_state.insert(value);
        self
    }

    /// Verifies every leaf command has a handler and freezes the app.
    pub fn build(self) -> Result<Dispatcher, SetupError> {
        let mut leaves = Vec::new();
        collect_leaves(self.manifest.commands(), &mut Vec::new(), &mut leaves);
        if let Some(missing) = leaves.into_iter().find(|key| !self.handlers.contains_key(key)) {
            return Err(SetupError::MissingHandler(missing));
        }

        Ok(Dispatcher {
            manifest: self.manifest,
            handlers: self.handlers,
            hooks: self.hooks,
            app_state: Arc::new(self.app_state),
        })
    }
}

fn collect_leaves(commands: &[Command], prefix: &mut Vec<String>, out: &mut Vec<String>) {
    for command in commands {
        prefix.push(command.name.clone());
        if command.is_leaf() {
            out.push(prefix.join("."));
        } else {
            collect_leaves(&command.commands, prefix, out);
        }
        prefix.pop();
    }
}
