//! Message model and transport seam.
//!
//! The protocol is a handful of request/response pairs:
//!
//! | Request | Success | Failure |
//! |---------|---------|---------|
//! | `manifest` | `{status: manifest, manifest}` | `{status: error, error: {kind, message}}` |
//! | `execute` | `{status: done}` | `{status: error, ...}` |
//! | `hook` (one phase) | `{status: done}` | `{status: error, ...}` |
//!
//! Capability calls travel the other way, see [`crate::capability`].
//!
//! Nothing here spawns processes or frames bytes. A host plugs in a
//! [`Transport`]; [`LocalTransport`] runs an app in-process while still
//! pushing every message through JSON, which keeps the serialized forms
//! honest in tests.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use crate::app::App;
use crate::cancel::Cancellation;
use crate::capability::{
    serve_capability, CapabilityChannel, CapabilityRequest, CapabilityResponse, ClientApi,
    RemoteClientApi,
};
use crate::error::DispatchError;
use crate::handler::{CommandContext, ExecutedCommand, ExecutedHook};
use crate::hooks::{call_phase, HookPhase};
use crate::manifest::Manifest;

/// A failure as it crosses the process boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Host to app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Manifest,
    Execute { command: ExecutedCommand },
    Hook { phase: HookPhase, hook: ExecutedHook },
}

/// App to host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Manifest { manifest: Manifest },
    Done,
    Error { error: ErrorPayload },
}

impl Response {
    fn from_result(result: Result<(), DispatchError>) -> Self {
        match result {
            Ok(()) => Response::Done,
            Err(err) => Response::Error {
                error: err.to_payload(),
            },
        }
    }
}

/// App-side entry point: answers one request using `app`.
///
/// `api` is the facade the app's handlers call back into; `cancel` is the
/// token for this request.
pub fn serve<A: App + ?Sized>(
    app: &A,
    request: &Request,
    api: Arc<dyn ClientApi>,
    cancel: Cancellation,
) -> Response {
    let ctx = CommandContext::new(api, cancel);
    match request {
        Request::Manifest => match app.manifest() {
            Ok(manifest) => Response::Manifest { manifest },
            Err(err) => Response::Error {
                error: err.to_payload(),
            },
        },
        Request::Execute { command } => Response::from_result(app.execute(command, &ctx)),
        Request::Hook { phase, hook } => {
            Response::from_result(call_phase(app, *phase, hook, &ctx))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The app process exited with a non-zero status.
    #[error("app exited with status {code}")]
    AppExited { code: i32 },

    /// The peer hung up before answering.
    #[error("app closed the connection")]
    Closed,

    #[error("message encoding failed: {0}")]
    Codec(String),
}

impl TransportError {
    /// Stable error kind used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::AppExited { .. } | TransportError::Closed => "app_terminated",
            TransportError::Codec(_) => "transport",
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Codec(e.to_string())
    }
}

/// Carries one request to an app and its response back.
///
/// While a request is in flight the transport answers the app's capability
/// calls from `ctx.api`, and forwards `ctx.cancel` to the app.
pub trait Transport: Send + Sync {
    fn round_trip(&self, request: &Request, ctx: &CommandContext)
        -> Result<Response, TransportError>;
}

/// Host-side [`App`] backed by a transport.
///
/// The manifest is fetched once and cached. Nothing is retried: a transport
/// failure ends the current call.
pub struct RemoteApp<T> {
    transport: T,
    manifest: OnceLock<Manifest>,
}

impl<T: Transport> RemoteApp<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            manifest: OnceLock::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn call(&self, request: &Request, ctx: &CommandContext) -> Result<(), DispatchError> {
        match self.transport.round_trip(request, ctx)? {
            Response::Done => Ok(()),
            Response::Error { error } => Err(DispatchError::Remote(error)),
            Response::Manifest { .. } => Err(DispatchError::Protocol { expected: "done" }),
        }
    }

    fn phase(
        &self,
        phase: HookPhase,
        hook: &ExecutedHook,
        ctx: &CommandContext,
    ) -> Result<(), DispatchError> {
        let request = Request::Hook {
            phase,
            hook: hook.clone(),
        };
        self.call(&request, ctx)
    }
}

impl<T: Transport> App for RemoteApp<T> {
    fn manifest(&self) -> Result<Manifest, DispatchError> {
        if let Some(manifest) = self.manifest.get() {
            return Ok(manifest.clone());
        }

        let ctx = CommandContext::default();
        let manifest = match self.transport.round_trip(&Request::Manifest, &ctx)? {
            Response::Manifest { manifest } => manifest,
            Response::Error { error } => return Err(DispatchError::Remote(error)),
            Response::Done => return Err(DispatchError::Protocol { expected: "manifest" }),
        };
        log::debug!(
            "loaded manifest of `{}` ({} commands, {} hooks)",
            manifest.name(),
            manifest.commands().len(),
            manifest.hooks().len()
        );
        Ok(self.manifest.get_or_init(|| manifest).clone())
    }

    fn execute(
        &self,
        command: &ExecutedCommand,
        ctx: &CommandContext,
    ) -> Result<(), DispatchError> {
        let request = Request::Execute {
            command: command.clone(),
        };
        self.call(&request, ctx)
    }

    fn hook_pre(&self, hook: &ExecutedHook, ctx: &CommandContext) -> Result<(), DispatchError> {
        self.phase(HookPhase::Pre, hook, ctx)
    }

    fn hook_post(&self, hook: &ExecutedHook, ctx: &CommandContext) -> Result<(), DispatchError> {
        self.phase(HookPhase::Post, hook, ctx)
    }

    fn hook_clean_up(&self, hook: &ExecutedHook, ctx: &CommandContext) -> Result<(), DispatchError> {
        self.phase(HookPhase::CleanUp, hook, ctx)
    }
}

fn json_round_trip<T>(value: &T) -> Result<T, TransportError>
where
    T: Serialize + serde::de::DeserializeOwned,
{
    let encoded = serde_json::to_vec(value)?;
    Ok(serde_json::from_slice(&encoded)?)
}

/// In-process transport that still serializes every message.
pub struct LocalTransport<A> {
    app: A,
}

impl<A: App> LocalTransport<A> {
    pub fn new(app: A) -> Self {
        Self { app }
    }

    pub fn app(&self) -> &A {
        &self.app
    }
}

impl<A: App> Transport for LocalTransport<A> {
    fn round_trip(
        &self,
        request: &Request,
        ctx: &CommandContext,
    ) -> Result<Response, TransportError> {
        let request = json_round_trip(request)?;
        let api: Arc<dyn ClientApi> =
            Arc::new(RemoteClientApi::new(LocalCapabilityChannel::new(ctx.api.clone())));

        let response = serve(&self.app, &request, api, ctx.cancel.clone());
        json_round_trip(&response)
    }
}

/// In-process capability channel that serializes every message.
pub struct LocalCapabilityChannel {
    host: Arc<dyn ClientApi>,
}

impl LocalCapabilityChannel {
    pub fn new(host: Arc<dyn ClientApi>) -> Self {
        Self { host }
    }
}

impl CapabilityChannel for LocalCapabilityChannel {
    fn call(&self, request: &CapabilityRequest) -> Result<CapabilityResponse, TransportError> {
        let request = json_round_trip(request)?;
        let response = serve_capability(self.host.as_ref(), &request);
        json_round_trip(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Dispatcher;
    use crate::capability::{ChainInfo, HostInfo, StaticClientApi};
    use crate::handler::Invocation;
    use crate::manifest::{Command, Flag, Hook};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn app() -> Dispatcher {
        let manifest = Manifest::builder("chain-info")
            .command(Command::new("info").flag(Flag::string_slice("fields")))
            .command(Command::new("fail"))
            .hook(Hook::new("chain-build", "ignite chain build"))
            .build()
            .unwrap();

        Dispatcher::builder(manifest)
            .command("info", |inv: &Invocation<'_>, ctx: &CommandContext| {
                let chain = ctx.chain_info()?;
                anyhow::ensure!(chain.chain_id == "venus", "wrong chain {}", chain.chain_id);
                anyhow::ensure!(inv.flags.string_slice("fields")?.len() == 2);
                Ok(())
            })
            .unwrap()
            .command("fail", |_: &Invocation<'_>, _: &CommandContext| {
                anyhow::bail!("boom")
            })
            .unwrap()
            .build()
            .unwrap()
    }

    fn host_ctx() -> CommandContext {
        let chain = ChainInfo {
            chain_id: "venus".into(),
            ..Default::default()
        };
        CommandContext::new(
            Arc::new(StaticClientApi::new(chain, HostInfo::default())),
            Cancellation::new(),
        )
    }

    #[test]
    fn test_request_wire_shape() {
        let request = Request::Execute {
            command: ExecutedCommand::new(["info"]).flag("fields", "[a,b]"),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "execute");
        assert_eq!(json["command"]["path"][0], "info");
        assert_eq!(json["command"]["flags"]["fields"], "[a,b]");

        let hook = Request::Hook {
            phase: HookPhase::CleanUp,
            hook: ExecutedHook::new(
                Hook::new("chain-build", "ignite chain build"),
                ExecutedCommand::new(["chain", "build"]),
            ),
        };
        let json = serde_json::to_value(&hook).unwrap();
        assert_eq!(json["phase"], "clean_up");
        assert_eq!(json["hook"]["hook"]["place_hook_on"], "ignite chain build");
    }

    #[test]
    fn test_remote_app_manifest() {
        let remote = RemoteApp::new(LocalTransport::new(app()));
        let manifest = remote.manifest().unwrap();
        assert_eq!(manifest.name(), "chain-info");
        assert_eq!(manifest, *app().manifest_ref());
    }

    #[test]
    fn test_remote_execute_uses_capabilities() {
        let remote = RemoteApp::new(LocalTransport::new(app()));
        let cmd = ExecutedCommand::new(["info"]).flag("fields", "[chain_id,home]");
        remote.execute(&cmd, &host_ctx()).unwrap();
    }

    #[test]
    fn test_remote_errors_keep_kind() {
        let remote = RemoteApp::new(LocalTransport::new(app()));

        let err = remote
            .execute(&ExecutedCommand::new(["fail"]), &host_ctx())
            .unwrap_err();
        assert_eq!(err.kind(), "handler");
        assert_eq!(err.to_string(), "boom");

        let err = remote
            .execute(&ExecutedCommand::new(["nope"]), &host_ctx())
            .unwrap_err();
        assert_eq!(err.kind(), "unresolved_path");

        let err = remote
            .execute(&ExecutedCommand::new(["info"]), &CommandContext::default())
            .unwrap_err();
        assert_eq!(err.kind(), "capability");
    }

    #[test]
    fn test_capability_errors_match_in_process_calls() {
        let ctx = CommandContext::default();
        let cmd = ExecutedCommand::new(["info"]).flag("fields", "[a,b]");

        let direct = app().execute(&cmd, &ctx).unwrap_err();
        let remote = RemoteApp::new(LocalTransport::new(app()))
            .execute(&cmd, &ctx)
            .unwrap_err();

        assert_eq!(remote.kind(), direct.kind());
        assert_eq!(remote.to_string(), direct.to_string());
        assert_eq!(remote.to_string(), "capability `get_chain_info` is not available");
    }

    struct Exited {
        calls: AtomicUsize,
    }

    impl Transport for Exited {
        fn round_trip(
            &self,
            _request: &Request,
            _ctx: &CommandContext,
        ) -> Result<Response, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::AppExited { code: 1 })
        }
    }

    #[test]
    fn test_app_exit_is_fatal_and_not_retried() {
        let remote = RemoteApp::new(Exited {
            calls: AtomicUsize::new(0),
        });
        let err = remote
            .execute(&ExecutedCommand::new(["info"]), &host_ctx())
            .unwrap_err();
        assert_eq!(err.kind(), "app_terminated");
        assert_eq!(remote.transport().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_serve_manifest() {
        let response = serve(
            &app(),
            &Request::Manifest,
            Arc::new(StaticClientApi::default()),
            Cancellation::new(),
        );
        assert!(matches!(response, Response::Manifest { .. }));
    }
}
