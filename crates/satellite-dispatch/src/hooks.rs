//! Hook lifecycle.
//!
//! A hook wraps a host action with app callbacks. For one trigger the phases
//! always run in this order:
//!
//! ```text
//! Idle ─► PreRunning ─► HostActionRunning ─► PostRunning ─► CleanUpRunning ─► Done
//!              │               │                  ▲                ▲
//!              │               └── action failed ─┼────────────────┤
//!              └── Pre failed, Abort policy ──────┴────────────────┘
//! ```
//!
//! # Phase Rules
//!
//! - Pre runs first. A Pre error is captured and reported; under the default
//!   [`PreFailurePolicy::Advisory`] the host action still runs.
//! - Post runs only if the host action succeeded.
//! - CleanUp runs exactly once per trigger on every exit path: phase errors,
//!   phase panics, host action failure, host action panic, cancellation.
//! - Each phase contributes at most one [`HookPhaseError`]. A CleanUp
//!   failure is reported but never turns a successful action into a failure.
//!
//! CleanUp is guaranteed by a scope guard: if the host action unwinds, the
//! guard's `Drop` invokes CleanUp before the panic continues.
//!
//! # App Side
//!
//! Apps built with [`Dispatcher`](crate::Dispatcher) register callbacks per
//! hook name with [`Hooks`]. Callbacks for one phase run in registration
//! order and stop at the first error.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::app::App;
use crate::error::DispatchError;
use crate::handler::{CommandContext, ExecutedHook, HandlerResult};

/// One of the three app-side phases of a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    Pre,
    Post,
    CleanUp,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::Pre => write!(f, "pre"),
            HookPhase::Post => write!(f, "post"),
            HookPhase::CleanUp => write!(f, "clean-up"),
        }
    }
}

/// Lifecycle state of one hook trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    Idle,
    PreRunning,
    HostActionRunning,
    PostRunning,
    CleanUpRunning,
    Done,
}

/// A failure captured from one phase of one hook.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("hook `{hook}` {phase} failed: {message}")]
pub struct HookPhaseError {
    pub hook: String,
    pub phase: HookPhase,
    pub message: String,
}

impl HookPhaseError {
    /// Stable error kind used on the wire.
    pub fn kind(&self) -> &'static str {
        "hook_phase"
    }
}

/// All phase errors of a trigger, reported together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct HookFailure {
    pub errors: Vec<HookPhaseError>,
}

impl HookFailure {
    pub fn kind(&self) -> &'static str {
        "hook_phase"
    }
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

/// What happened to the host action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActionOutcome {
    Succeeded,
    Failed(String),
    /// Not run: a Pre phase failed under [`PreFailurePolicy::Abort`].
    #[default]
    Skipped,
}

/// How a Pre failure affects the host action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreFailurePolicy {
    /// Report the failure and run the action anyway.
    #[default]
    Advisory,
    /// Skip the action (and therefore Post). CleanUp still runs.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown pre-failure policy `{0}` (expected `advisory` or `abort`)")]
pub struct ParsePolicyError(pub String);

impl FromStr for PreFailurePolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "advisory" => Ok(PreFailurePolicy::Advisory),
            "abort" => Ok(PreFailurePolicy::Abort),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

/// Record of one hook trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookReport {
    pub hook: String,
    /// Phases actually invoked on the app, in order.
    pub invoked: Vec<HookPhase>,
    pub action: ActionOutcome,
    pub errors: Vec<HookPhaseError>,
}

/// Result of running one or more hooks around a host action.
#[derive(Debug)]
pub struct HookOutcome<T, E> {
    /// The action's own result; `None` if it was skipped.
    pub action: Option<Result<T, E>>,
    /// One report per hook, in trigger order.
    pub reports: Vec<HookReport>,
}

impl<T, E> HookOutcome<T, E> {
    pub fn errors(&self) -> impl Iterator<Item = &HookPhaseError> {
        self.reports.iter().flat_map(|r| r.errors.iter())
    }

    /// All captured phase errors as one composite, if there were any.
    pub fn failure(&self) -> Option<HookFailure> {
        let errors: Vec<_> = self.errors().cloned().collect();
        if errors.is_empty() {
            None
        } else {
            Some(HookFailure { errors })
        }
    }
}

/// Type alias for app-side hook callbacks.
pub type HookFn = Arc<dyn Fn(&ExecutedHook, &CommandContext) -> HandlerResult + Send + Sync>;

/// Per-hook callback configuration.
#[derive(Clone, Default)]
pub struct Hooks {
    pre: Vec<HookFn>,
    post: Vec<HookFn>,
    clean_up: Vec<HookFn>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty() && self.clean_up.is_empty()
    }

    /// Adds a callback run before the host action.
    ///
    /// # Example
    ///
    /// ```rust
    /// use satellite_dispatch::Hooks;
    ///
    /// let hooks = Hooks::new()
    ///     .pre(|hook, _ctx| {
    ///         println!("before {}", hook.hook.place_hook_on);
    ///         Ok(())
    ///     })
    ///     .clean_up(|_hook, _ctx| Ok(()));
    /// assert!(!hooks.is_empty());
    /// ```
    pub fn pre<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExecutedHook, &CommandContext) -> HandlerResult + Send + Sync + 'static,
    {
        self.pre.push(Arc::new(f));
        self
    }

    /// Adds a callback run after a successful host action.
    pub fn post<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExecutedHook, &CommandContext) -> HandlerResult + Send + Sync + 'static,
    {
        self.post.push(Arc::new(f));
        self
    }

    /// Adds a callback run once the trigger ends, whatever the outcome.
    pub fn clean_up<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExecutedHook, &CommandContext) -> HandlerResult + Send + Sync + 'static,
    {
        self.clean_up.push(Arc::new(f));
        self
    }

    /// Runs every callback of `phase` in order, stopping at the first error.
    pub fn run(&self, phase: HookPhase, hook: &ExecutedHook, ctx: &CommandContext) -> HandlerResult {
        let callbacks = match phase {
            HookPhase::Pre => &self.pre,
            HookPhase::Post => &self.post,
            HookPhase::CleanUp => &self.clean_up,
        };
        for callback in callbacks {
            callback(hook, ctx)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("pre_count", &self.pre.len())
            .field("post_count", &self.post.len())
            .field("clean_up_count", &self.clean_up.len())
            .finish()
    }
}

/// Invokes one phase on an app.
pub fn call_phase<A: App + ?Sized>(
    app: &A,
    phase: HookPhase,
    hook: &ExecutedHook,
    ctx: &CommandContext,
) -> Result<(), DispatchError> {
    match phase {
        HookPhase::Pre => app.hook_pre(hook, ctx),
        HookPhase::Post => app.hook_post(hook, ctx),
        HookPhase::CleanUp => app.hook_clean_up(hook, ctx),
    }
}

/// Host-side driver for hook triggers.
///
/// # Example
///
/// ```rust
/// use satellite_dispatch::{
///     CommandContext, Dispatcher, ExecutedCommand, ExecutedHook, Hook, HookCoordinator,
///     HookPhase, Hooks, Manifest,
/// };
///
/// let hook = Hook::new("chain-build", "ignite chain build");
/// let manifest = Manifest::builder("demo").hook(hook.clone()).build()?;
/// let app = Dispatcher::builder(manifest)
///     .hooks("chain-build", Hooks::new().pre(|_, _| Ok(())))?
///     .build()?;
///
/// let trigger = ExecutedHook::new(hook, ExecutedCommand::new(["chain", "build"]));
/// let outcome = HookCoordinator::new(&app).run(&trigger, &CommandContext::default(), || {
///     Ok::<_, std::io::Error>("built")
/// });
///
/// assert_eq!(outcome.reports[0].invoked, vec![HookPhase::Pre, HookPhase::Post, HookPhase::CleanUp]);
/// assert!(outcome.failure().is_none());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct HookCoordinator<'a, A: App + ?Sized> {
    app: &'a A,
    policy: PreFailurePolicy,
}

impl<'a, A: App + ?Sized> HookCoordinator<'a, A> {
    pub fn new(app: &'a A) -> Self {
        Self {
            app,
            policy: PreFailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PreFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> PreFailurePolicy {
        self.policy
    }

    /// Runs one hook around `action`.
    pub fn run<T, E, F>(&self, hook: &ExecutedHook, ctx: &CommandContext, action: F) -> HookOutcome<T, E>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        self.run_all(std::slice::from_ref(hook), ctx, action)
    }

    /// Runs several hooks attached to the same extension point around one
    /// action.
    ///
    /// Pre and Post run in the given order; CleanUp runs in reverse order.
    /// Under [`PreFailurePolicy::Abort`] any Pre failure skips the action.
    pub fn run_all<T, E, F>(
        &self,
        hooks: &[ExecutedHook],
        ctx: &CommandContext,
        action: F,
    ) -> HookOutcome<T, E>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        let mut scopes = ScopeStack(
            hooks
                .iter()
                .map(|hook| HookScope::new(self.app, hook, ctx))
                .collect(),
        );

        let mut pre_failed = false;
        for scope in scopes.0.iter_mut() {
            if !scope.pre() {
                pre_failed = true;
            }
        }

        let result = if pre_failed && self.policy == PreFailurePolicy::Abort {
            log::warn!("pre phase failed; skipping host action");
            for scope in scopes.0.iter_mut() {
                scope.report.action = ActionOutcome::Skipped;
            }
            None
        } else {
            for scope in scopes.0.iter_mut() {
                scope.transition(HookState::HostActionRunning);
            }
            let result = action();
            let outcome = match &result {
                Ok(_) => ActionOutcome::Succeeded,
                Err(e) => ActionOutcome::Failed(e.to_string()),
            };
            for scope in scopes.0.iter_mut() {
                scope.report.action = outcome.clone();
            }
            Some(result)
        };

        if matches!(result, Some(Ok(_))) {
            for scope in scopes.0.iter_mut() {
                scope.post();
            }
        }

        HookOutcome {
            action: result,
            reports: scopes.finish(),
        }
    }
}

/// Guard owning the phase bookkeeping for one hook trigger.
struct HookScope<'a, A: App + ?Sized> {
    app: &'a A,
    hook: &'a ExecutedHook,
    ctx: &'a CommandContext,
    state: HookState,
    report: HookReport,
    cleaned: bool,
}

impl<'a, A: App + ?Sized> HookScope<'a, A> {
    fn new(app: &'a A, hook: &'a ExecutedHook, ctx: &'a CommandContext) -> Self {
        Self {
            app,
            hook,
            ctx,
            state: HookState::Idle,
            report: HookReport {
                hook: hook.hook.name.clone(),
                ..Default::default()
            },
            cleaned: false,
        }
    }

    fn transition(&mut self, next: HookState) {
        log::debug!("hook `{}`: {:?} -> {:?}", self.report.hook, self.state, next);
        self.state = next;
    }

    fn pre(&mut self) -> bool {
        self.transition(HookState::PreRunning);
        self.guarded(HookPhase::Pre)
    }

    fn post(&mut self) -> bool {
        self.transition(HookState::PostRunning);
        self.guarded(HookPhase::Post)
    }

    fn clean_up(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        self.transition(HookState::CleanUpRunning);
        self.invoke(HookPhase::CleanUp);
        self.transition(HookState::Done);
    }

    /// Invokes a phase unless the trigger was cancelled.
    fn guarded(&mut self, phase: HookPhase) -> bool {
        if self.ctx.cancel.is_cancelled() {
            self.record(phase, "cancelled".to_string());
            return false;
        }
        self.invoke(phase)
    }

    fn invoke(&mut self, phase: HookPhase) -> bool {
        let (app, hook, ctx) = (self.app, self.hook, self.ctx);
        let result = panic::catch_unwind(AssertUnwindSafe(|| call_phase(app, phase, hook, ctx)));
        self.report.invoked.push(phase);

        let message = match result {
            Ok(Ok(())) => return true,
            Ok(Err(err)) => err.to_string(),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };
        self.record(phase, message);
        false
    }

    fn record(&mut self, phase: HookPhase, message: String) {
        log::warn!("hook `{}` {} failed: {}", self.report.hook, phase, message);
        self.report.errors.push(HookPhaseError {
            hook: self.report.hook.clone(),
            phase,
            message,
        });
    }
}

impl<A: App + ?Sized> Drop for HookScope<'_, A> {
    fn drop(&mut self) {
        if !self.cleaned {
            log::warn!(
                "hook `{}` left {:?} without clean-up; running it now",
                self.report.hook,
                self.state
            );
            self.clean_up();
        }
    }
}

/// Scopes of one trigger; unwinds CleanUp in reverse order.
struct ScopeStack<'a, A: App + ?Sized>(Vec<HookScope<'a, A>>);

impl<A: App + ?Sized> ScopeStack<'_, A> {
    fn finish(mut self) -> Vec<HookReport> {
        for scope in self.0.iter_mut().rev() {
            scope.clean_up();
        }
        self.0
            .iter_mut()
            .map(|scope| std::mem::take(&mut scope.report))
            .collect()
    }
}

impl<A: App + ?Sized> Drop for ScopeStack<'_, A> {
    fn drop(&mut self) {
        while let Some(scope) = self.0.pop() {
            drop(scope);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Dispatcher;
    use crate::handler::ExecutedCommand;
    use crate::manifest::{Hook, Manifest};
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording(log: &Log, label: &'static str, fail: bool) -> impl Fn(&ExecutedHook, &CommandContext) -> HandlerResult {
        let log = log.clone();
        move |hook, _ctx| {
            log.lock().unwrap().push(format!("{}:{}", hook.hook.name, label));
            if fail {
                anyhow::bail!("{} failed", label);
            }
            Ok(())
        }
    }

    fn app_with(names: &[&str], log: &Log, fail_pre: bool) -> Dispatcher {
        let mut builder = Manifest::builder("test");
        for name in names {
            builder = builder.hook(Hook::new(*name, "ignite chain build"));
        }
        let mut dispatcher = Dispatcher::builder(builder.build().unwrap());
        for name in names {
            dispatcher = dispatcher
                .hooks(
                    name,
                    Hooks::new()
                        .pre(recording(log, "pre", fail_pre))
                        .post(recording(log, "post", false))
                        .clean_up(recording(log, "clean_up", false)),
                )
                .unwrap();
        }
        dispatcher.build().unwrap()
    }

    fn trigger(name: &str) -> ExecutedHook {
        ExecutedHook::new(
            Hook::new(name, "ignite chain build"),
            ExecutedCommand::new(["chain", "build"]),
        )
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(HookPhase::Pre.to_string(), "pre");
        assert_eq!(HookPhase::CleanUp.to_string(), "clean-up");
        assert_eq!(
            serde_json::to_string(&HookPhase::CleanUp).unwrap(),
            r#""clean_up""#
        );
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("advisory".parse(), Ok(PreFailurePolicy::Advisory));
        assert_eq!(" ABORT ".parse(), Ok(PreFailurePolicy::Abort));
        assert!("strict".parse::<PreFailurePolicy>().is_err());
        assert_eq!(PreFailurePolicy::default(), PreFailurePolicy::Advisory);
    }

    #[test]
    fn test_hooks_stop_at_first_error() {
        let hooks = Hooks::new()
            .pre(|_, _| anyhow::bail!("first fails"))
            .pre(|_, _| panic!("should not be called"));
        assert!(hooks
            .run(HookPhase::Pre, &trigger("x"), &CommandContext::default())
            .is_err());
        assert!(hooks
            .run(HookPhase::Post, &trigger("x"), &CommandContext::default())
            .is_ok());
    }

    #[test]
    fn test_multiple_hooks_order() {
        let log: Log = Arc::default();
        let app = app_with(&["a", "b"], &log, false);
        let outcome = HookCoordinator::new(&app).run_all(
            &[trigger("a"), trigger("b")],
            &CommandContext::default(),
            || {
                log.lock().unwrap().push("action".into());
                Ok::<_, String>(())
            },
        );

        assert!(outcome.failure().is_none());
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:pre", "b:pre", "action", "a:post", "b:post", "b:clean_up", "a:clean_up"
            ]
        );
    }

    #[test]
    fn test_abort_policy_skips_action_and_post() {
        let log: Log = Arc::default();
        let app = app_with(&["a"], &log, true);
        let outcome = HookCoordinator::new(&app)
            .with_policy(PreFailurePolicy::Abort)
            .run(&trigger("a"), &CommandContext::default(), || {
                log.lock().unwrap().push("action".into());
                Ok::<_, String>(())
            });

        assert!(outcome.action.is_none());
        assert_eq!(outcome.reports[0].action, ActionOutcome::Skipped);
        assert_eq!(
            outcome.reports[0].invoked,
            vec![HookPhase::Pre, HookPhase::CleanUp]
        );
        assert_eq!(*log.lock().unwrap(), vec!["a:pre", "a:clean_up"]);
    }

    #[test]
    fn test_cancelled_before_pre() {
        let log: Log = Arc::default();
        let app = app_with(&["a"], &log, false);
        let ctx = CommandContext::default();
        ctx.cancel.cancel();

        let outcome = HookCoordinator::new(&app).run(&trigger("a"), &ctx, || Ok::<_, String>(()));

        let report = &outcome.reports[0];
        assert_eq!(report.invoked, vec![HookPhase::CleanUp]);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].phase, HookPhase::Pre);
        assert_eq!(report.errors[0].message, "cancelled");
        assert_eq!(report.errors[1].phase, HookPhase::Post);
    }

    #[test]
    fn test_action_panic_still_cleans_up() {
        let log: Log = Arc::default();
        let app = app_with(&["a"], &log, false);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            HookCoordinator::new(&app).run(&trigger("a"), &CommandContext::default(), || {
                if true {
                    panic!("host action exploded");
                }
                Ok::<(), String>(())
            })
        }));

        assert!(result.is_err());
        assert_eq!(*log.lock().unwrap(), vec!["a:pre", "a:clean_up"]);
    }

    #[test]
    fn test_failure_display_joins_errors() {
        let failure = HookFailure {
            errors: vec![
                HookPhaseError {
                    hook: "a".into(),
                    phase: HookPhase::Pre,
                    message: "disk full".into(),
                },
                HookPhaseError {
                    hook: "a".into(),
                    phase: HookPhase::CleanUp,
                    message: "lock held".into(),
                },
            ],
        };
        assert_eq!(
            failure.to_string(),
            "hook `a` pre failed: disk full; hook `a` clean-up failed: lock held"
        );
        assert_eq!(failure.kind(), "hook_phase");
    }
}
