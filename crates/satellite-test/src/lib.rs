//! In-process test harness for satellite hosts and apps.
//!
//! - [`MockClientApi`]: a capability facade that records every call and can
//!   be told to fail specific operations.
//! - [`RecordingApp`]: an [`App`] that logs each step it is asked to run and
//!   fails or panics on demand.
//! - [`TestHost`]: drives an app the way a host does, through a JSON
//!   round-tripping [`LocalTransport`], answering capability calls from a
//!   [`MockClientApi`].
//!
//! ```rust
//! use satellite_dispatch::{Hook, Manifest};
//! use satellite_test::{RecordingApp, Step, TestHost};
//!
//! let manifest = Manifest::builder("builder")
//!     .hook(Hook::new("chain-build", "ignite chain build"))
//!     .build()?;
//! let app = RecordingApp::new(manifest).fail(Step::Pre, "disk full");
//! let host = TestHost::new(app.clone());
//!
//! let outcome = host.trigger("ignite chain build", || Ok::<_, String>(()));
//! assert_eq!(outcome.errors().count(), 1);
//! assert_eq!(app.steps(), vec!["pre chain-build", "post chain-build", "clean-up chain-build"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use satellite_dispatch::{
    App, CapabilityError, Cancellation, ChainInfo, ClientApi, CommandContext, DispatchError,
    ExecutedCommand, ExecutedHook, HookOutcome, HostInfo, LocalTransport, Manifest,
    PreFailurePolicy, RemoteApp, HookCoordinator, OP_GET_CHAIN_INFO, OP_GET_HOST_INFO,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking step must not poison the harness for later assertions.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// MockClientApi
// ============================================================================

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<String>,
    failing: BTreeMap<String, String>,
    unavailable: BTreeSet<String>,
}

/// Capability facade with canned answers and a call log.
///
/// Clones share the same log, so a test can keep one handle while the host
/// owns another.
#[derive(Debug, Clone)]
pub struct MockClientApi {
    chain: ChainInfo,
    host: HostInfo,
    state: Arc<Mutex<MockState>>,
}

impl MockClientApi {
    pub fn new() -> Self {
        Self {
            chain: ChainInfo {
                chain_id: "mars".to_string(),
                app_path: "/tmp/mars".to_string(),
                config_path: "/tmp/mars/config.yml".to_string(),
                rpc_address: "http://localhost:26657".to_string(),
                home: "/tmp/.mars".to_string(),
            },
            host: HostInfo::current("test"),
            state: Arc::default(),
        }
    }

    pub fn with_chain(mut self, chain: ChainInfo) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_host(mut self, host: HostInfo) -> Self {
        self.host = host;
        self
    }

    /// Makes `operation` fail with `message`.
    pub fn failing(self, operation: &str, message: &str) -> Self {
        lock(&self.state)
            .failing
            .insert(operation.to_string(), message.to_string());
        self
    }

    /// Makes `operation` report itself as not offered.
    pub fn unavailable(self, operation: &str) -> Self {
        lock(&self.state).unavailable.insert(operation.to_string());
        self
    }

    /// Operations called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    fn answer<T: Clone>(&self, operation: &str, value: &T) -> Result<T, CapabilityError> {
        let mut state = lock(&self.state);
        state.calls.push(operation.to_string());
        if state.unavailable.contains(operation) {
            return Err(CapabilityError::unavailable(operation));
        }
        if let Some(message) = state.failing.get(operation) {
            return Err(CapabilityError::failed(operation, message.clone()));
        }
        Ok(value.clone())
    }
}

impl Default for MockClientApi {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientApi for MockClientApi {
    fn get_chain_info(&self) -> Result<ChainInfo, CapabilityError> {
        self.answer(OP_GET_CHAIN_INFO, &self.chain)
    }

    fn get_host_info(&self) -> Result<HostInfo, CapabilityError> {
        self.answer(OP_GET_HOST_INFO, &self.host)
    }
}

// ============================================================================
// RecordingApp
// ============================================================================

/// A unit of work a [`RecordingApp`] can be asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Execute,
    Pre,
    Post,
    CleanUp,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Execute => "execute",
            Step::Pre => "pre",
            Step::Post => "post",
            Step::CleanUp => "clean-up",
        })
    }
}

#[derive(Debug, Clone)]
enum Behavior {
    Fail(String),
    Panic(String),
}

#[derive(Debug, Default)]
struct Recording {
    steps: Vec<String>,
    behaviors: BTreeMap<Step, Behavior>,
}

/// An app that records what it is asked to do.
///
/// Steps are logged as `"<step> <target>"`, where the target is the dotted
/// command path or the hook name, e.g. `"execute web.add"` or
/// `"clean-up chain-build"`. Clones share one log.
#[derive(Debug, Clone)]
pub struct RecordingApp {
    manifest: Manifest,
    recording: Arc<Mutex<Recording>>,
}

impl RecordingApp {
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            recording: Arc::default(),
        }
    }

    /// Makes `step` return an error with `message`.
    pub fn fail(self, step: Step, message: &str) -> Self {
        lock(&self.recording)
            .behaviors
            .insert(step, Behavior::Fail(message.to_string()));
        self
    }

    /// Makes `step` panic with `message`.
    pub fn panic_on(self, step: Step, message: &str) -> Self {
        lock(&self.recording)
            .behaviors
            .insert(step, Behavior::Panic(message.to_string()));
        self
    }

    pub fn steps(&self) -> Vec<String> {
        lock(&self.recording).steps.clone()
    }

    /// Number of recorded steps of the given kind.
    pub fn count(&self, step: Step) -> usize {
        let prefix = format!("{} ", step);
        lock(&self.recording)
            .steps
            .iter()
            .filter(|s| s.starts_with(&prefix))
            .count()
    }

    fn step(&self, step: Step, target: &str) -> Result<(), DispatchError> {
        let behavior = {
            let mut recording = lock(&self.recording);
            recording.steps.push(format!("{} {}", step, target));
            recording.behaviors.get(&step).cloned()
        };
        match behavior {
            None => Ok(()),
            Some(Behavior::Fail(message)) => Err(DispatchError::handler(anyhow::anyhow!(message))),
            Some(Behavior::Panic(message)) => panic!("{}", message),
        }
    }
}

impl App for RecordingApp {
    fn manifest(&self) -> Result<Manifest, DispatchError> {
        Ok(self.manifest.clone())
    }

    fn execute(&self, command: &ExecutedCommand, ctx: &CommandContext) -> Result<(), DispatchError> {
        ctx.checkpoint()?;
        self.step(Step::Execute, &command.path.join("."))
    }

    fn hook_pre(&self, hook: &ExecutedHook, _ctx: &CommandContext) -> Result<(), DispatchError> {
        self.step(Step::Pre, &hook.hook.name)
    }

    fn hook_post(&self, hook: &ExecutedHook, _ctx: &CommandContext) -> Result<(), DispatchError> {
        self.step(Step::Post, &hook.hook.name)
    }

    fn hook_clean_up(&self, hook: &ExecutedHook, _ctx: &CommandContext) -> Result<(), DispatchError> {
        self.step(Step::CleanUp, &hook.hook.name)
    }
}

// ============================================================================
// TestHost
// ============================================================================

/// A host that talks to one app through a JSON round-tripping transport.
pub struct TestHost<A: App> {
    app: RemoteApp<LocalTransport<A>>,
    api: MockClientApi,
    cancel: Cancellation,
    policy: PreFailurePolicy,
    root: String,
}

impl<A: App> TestHost<A> {
    pub fn new(app: A) -> Self {
        Self {
            app: RemoteApp::new(LocalTransport::new(app)),
            api: MockClientApi::new(),
            cancel: Cancellation::new(),
            policy: PreFailurePolicy::default(),
            root: "ignite".to_string(),
        }
    }

    pub fn with_api(mut self, api: MockClientApi) -> Self {
        self.api = api;
        self
    }

    pub fn with_policy(mut self, policy: PreFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the host root command stripped from extension points.
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    /// The facade answering the app's capability calls.
    pub fn api(&self) -> &MockClientApi {
        &self.api
    }

    /// The token passed to every request; cancel it to cancel them all.
    pub fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    /// The host-side view of the app.
    pub fn app(&self) -> &RemoteApp<LocalTransport<A>> {
        &self.app
    }

    pub fn context(&self) -> CommandContext {
        CommandContext::new(Arc::new(self.api.clone()), self.cancel.clone())
    }

    pub fn manifest(&self) -> Result<Manifest, DispatchError> {
        self.app.manifest()
    }

    /// Runs the command at `path` with no flags or extra arguments.
    pub fn run(&self, path: &[&str]) -> Result<(), DispatchError> {
        self.execute(&ExecutedCommand::new(path.iter().copied()))
    }

    pub fn execute(&self, command: &ExecutedCommand) -> Result<(), DispatchError> {
        self.app.execute(command, &self.context())
    }

    /// Runs every hook the app attached to `extension_point` around
    /// `action`.
    ///
    /// The hooks see the extension point, minus the host root, as the
    /// executed command. A manifest that cannot be fetched triggers no hooks.
    pub fn trigger<T, E, F>(&self, extension_point: &str, action: F) -> HookOutcome<T, E>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        self.trigger_with(extension_point, ExecutedCommand::default(), action)
    }

    /// Like [`trigger`](Self::trigger), with the host command's flags and
    /// arguments supplied by the caller. `command.path` is overwritten.
    pub fn trigger_with<T, E, F>(
        &self,
        extension_point: &str,
        mut command: ExecutedCommand,
        action: F,
    ) -> HookOutcome<T, E>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        command.path = extension_point
            .split_whitespace()
            .skip_while(|segment| *segment == self.root)
            .map(String::from)
            .collect();

        let hooks: Vec<ExecutedHook> = match self.manifest() {
            Ok(manifest) => manifest
                .hooks_on(extension_point)
                .map(|hook| ExecutedHook::new(hook.clone(), command.clone()))
                .collect(),
            Err(err) => {
                log::warn!("no hooks triggered: {}", err);
                Vec::new()
            }
        };

        HookCoordinator::new(&self.app)
            .with_policy(self.policy)
            .run_all(&hooks, &self.context(), action)
    }
}
