//! Command handler types.
//!
//! This module provides the values that flow into app code on every call:
//! the per-invocation request ([`ExecutedCommand`], [`ExecutedHook`]), the
//! decoded view a handler works with ([`Invocation`]), and the execution
//! environment ([`CommandContext`]).
//!
//! # State Management
//!
//! [`CommandContext`] carries two kinds of shared state:
//!
//! | Field | Owner | Lifetime | Purpose |
//! |-------|-------|----------|---------|
//! | `api` | Host | Invocation | Capability facade calls back into the host |
//! | `app_state` | App | App lifetime (shared via Arc) | Clients, config, caches |
//!
//! App state is configured at build time via `DispatcherBuilder::app_state()`
//! and shared immutably across all invocations:
//!
//! ```rust
//! use satellite_dispatch::{Command, CommandContext, Dispatcher, Invocation, Manifest};
//!
//! struct Greeting(String);
//!
//! let manifest = Manifest::builder("demo").command(Command::new("hello")).build()?;
//! let app = Dispatcher::builder(manifest)
//!     .app_state(Greeting("hi".into()))
//!     .command("hello", |_inv: &Invocation, ctx: &CommandContext| {
//!         let greeting = ctx.app_state.get_required::<Greeting>()?;
//!         println!("{}", greeting.0);
//!         Ok(())
//!     })?
//!     .build()?;
//! # let _ = app;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! There are no ambient globals: anything a handler needs is reachable from
//! its arguments.

use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::cancel::{Cancellation, Cancelled};
use crate::capability::{ChainInfo, ClientApi, HostInfo, UnavailableApi};
use crate::error::DispatchError;
use crate::flags::{decode, FlagError, TypedFlags};
use crate::manifest::{Command, Hook};

/// Type-safe container for injecting shared state into handlers.
///
/// Values must be `Send + Sync`; the container is shared across invocations
/// that may run on different threads. For mutable state, store a `Mutex` or
/// an atomic inside.
///
/// Cloning yields an empty container, since boxed values cannot be cloned
/// generically. Share the container through an `Arc` instead.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Creates a new empty extensions container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, val: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(val))
            .and_then(|boxed| boxed.downcast().ok().map(|b| *b))
    }

    /// Gets a reference to a value of the specified type.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    /// Gets a required reference to a value of the specified type.
    ///
    /// Returns an error if no value of this type exists.
    pub fn get_required<T: Send + Sync + 'static>(&self) -> Result<&T, anyhow::Error> {
        self.get::<T>().ok_or_else(|| {
            anyhow::anyhow!(
                "Extension missing: type {} not found in context",
                std::any::type_name::<T>()
            )
        })
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast().ok().map(|b| *b))
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish_non_exhaustive()
    }
}

impl Clone for Extensions {
    fn clone(&self) -> Self {
        Self::new()
    }
}

/// Execution environment passed to every handler and hook phase.
#[derive(Clone)]
pub struct CommandContext {
    /// Canonical path of the command being run; empty for hook phases.
    pub command_path: Vec<String>,

    /// Host capability facade.
    pub api: Arc<dyn ClientApi>,

    /// Cancellation token for this invocation.
    pub cancel: Cancellation,

    /// Immutable app-level state shared across all invocations.
    pub app_state: Arc<Extensions>,
}

impl CommandContext {
    pub fn new(api: Arc<dyn ClientApi>, cancel: Cancellation) -> Self {
        Self {
            command_path: Vec::new(),
            api,
            cancel,
            app_state: Arc::new(Extensions::new()),
        }
    }

    pub fn with_app_state(mut self, app_state: Arc<Extensions>) -> Self {
        self.app_state = app_state;
        self
    }

    pub fn with_command_path(mut self, path: Vec<String>) -> Self {
        self.command_path = path;
        self
    }

    /// Returns `Err(Cancelled)` once the host has cancelled this invocation.
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        self.cancel.checkpoint()
    }

    /// Asks the host for chain information, after a cancellation checkpoint.
    pub fn chain_info(&self) -> Result<ChainInfo, DispatchError> {
        self.checkpoint()?;
        Ok(self.api.get_chain_info()?)
    }

    /// Asks the host for its own build information, after a cancellation
    /// checkpoint.
    pub fn host_info(&self) -> Result<HostInfo, DispatchError> {
        self.checkpoint()?;
        Ok(self.api.get_host_info()?)
    }
}

impl Default for CommandContext {
    fn default() -> Self {
        Self::new(Arc::new(UnavailableApi), Cancellation::new())
    }
}

impl fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("command_path", &self.command_path)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("app_state", &self.app_state)
            .finish_non_exhaustive()
    }
}

/// A command invocation as the host sends it.
///
/// `path` holds the command segments as typed (aliases allowed). Anything
/// left over once routing reaches a leaf is treated as a positional argument,
/// followed by `args`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedCommand {
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub os_args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<String, String>,
}

impl ExecutedCommand {
    pub fn new<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn flag(mut self, name: impl Into<String>, raw: impl Into<String>) -> Self {
        self.flags.insert(name.into(), raw.into());
        self
    }

    pub fn os_args<I, S>(mut self, os_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.os_args = os_args.into_iter().map(Into::into).collect();
        self
    }
}

/// The decoded view of an invocation a handler receives.
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub command: &'a Command,
    /// Canonical command path.
    pub path: Vec<String>,
    /// Positional arguments.
    pub args: Vec<String>,
    pub os_args: &'a [String],
    pub flags: TypedFlags,
}

impl Invocation<'_> {
    /// Returns the positional argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

/// Host-side information about the action a hook wraps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookContext {
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub rpc_address: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// A hook trigger as the host sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedHook {
    pub hook: Hook,
    /// The host command the hook is wrapping.
    pub executed_command: ExecutedCommand,
    #[serde(default)]
    pub context: HookContext,
}

impl ExecutedHook {
    pub fn new(hook: Hook, executed_command: ExecutedCommand) -> Self {
        Self {
            hook,
            executed_command,
            context: HookContext::default(),
        }
    }

    pub fn with_context(mut self, context: HookContext) -> Self {
        self.context = context;
        self
    }

    /// Decodes the flags this hook declared.
    ///
    /// The wrapped host command carries its own flags as well; only the
    /// hook's declared names are considered here.
    pub fn hook_flags(&self) -> Result<TypedFlags, FlagError> {
        let raw: BTreeMap<String, String> = self
            .executed_command
            .flags
            .iter()
            .filter(|(name, _)| self.hook.flags.iter().any(|f| &f.name == *name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        decode(&self.hook.flags, &raw)
    }
}

/// The result type for command handlers.
pub type HandlerResult = Result<(), anyhow::Error>;

/// Trait for command handlers.
///
/// Handlers take `&self` and must be `Send + Sync`: one app may serve
/// several invocations concurrently. Keep mutable state behind a lock in
/// `app_state`.
///
/// # Example
///
/// ```rust
/// use satellite_dispatch::{CommandContext, Handler, HandlerResult, Invocation};
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// struct Counter { count: AtomicU32 }
///
/// impl Handler for Counter {
///     fn handle(&self, _inv: &Invocation, _ctx: &CommandContext) -> HandlerResult {
///         self.count.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }
/// }
/// ```
pub trait Handler: Send + Sync {
    /// Execute the handler with the decoded invocation and context.
    fn handle(&self, invocation: &Invocation<'_>, ctx: &CommandContext) -> HandlerResult;
}

/// A wrapper that implements [`Handler`] for closures.
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Invocation<'_>, &CommandContext) -> HandlerResult + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&Invocation<'_>, &CommandContext) -> HandlerResult + Send + Sync,
{
    fn handle(&self, invocation: &Invocation<'_>, ctx: &CommandContext) -> HandlerResult {
        (self.f)(invocation, ctx)
    }
}
