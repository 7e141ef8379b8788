//! Host/app protocol for out-of-process CLI extensions.
//!
//! `satellite-dispatch` lets a host CLI load separately built apps that
//! contribute commands to the host's command tree and hook into host
//! workflows. Both sides of the boundary live here: apps describe themselves
//! with a [`Manifest`] and answer requests through the [`App`] trait; hosts
//! mount manifests into clap, route invocations and drive hook triggers.
//!
//! # Features
//!
//! - **Manifest**: validated command tree plus hook list, immutable once built
//! - **Flag codec**: string-valued flags on the wire, typed values in handlers
//! - **Command routing**: first-match resolution by name or alias
//! - **Hook lifecycle**: Pre / host action / Post / CleanUp with CleanUp run
//!   exactly once on every exit path
//! - **Capability facade**: the bounded set of host queries an app may make
//! - **Clap integration**: mount manifests into a host `clap::Command`
//!
//! # Host Side
//!
//! ```rust
//! use std::sync::Arc;
//! use satellite_dispatch::{
//!     App, Cancellation, CommandContext, Dispatcher, ExecutedCommand, LocalTransport, Manifest,
//!     Command, RemoteApp, UnavailableApi,
//! };
//!
//! let manifest = Manifest::builder("notes")
//!     .command(Command::new("list"))
//!     .build()?;
//! let app = Dispatcher::builder(manifest)
//!     .command("list", |_, _| Ok(()))?
//!     .build()?;
//!
//! // Every message crosses the boundary as JSON, as it would over a pipe.
//! let remote = RemoteApp::new(LocalTransport::new(app));
//! let ctx = CommandContext::new(Arc::new(UnavailableApi), Cancellation::new());
//!
//! assert_eq!(remote.manifest()?.name(), "notes");
//! remote.execute(&ExecutedCommand::new(["list"]), &ctx)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Errors
//!
//! Every failure surfaced to a host is a [`DispatchError`]; its
//! [`kind`](DispatchError::kind) is a stable string that survives the trip
//! across the process boundary in an [`ErrorPayload`].

mod app;
mod cancel;
mod capability;
mod cli;
mod config;
mod dispatch;
mod error;
mod flags;
mod handler;
mod hooks;
mod manifest;
mod serialize;
mod wire;

pub use app::{App, Dispatcher, DispatcherBuilder, SetupError};

pub use cancel::{Cancellation, Cancelled};

pub use capability::{
    serve_capability, CapabilityChannel, CapabilityError, CapabilityRequest, CapabilityResponse,
    ChainInfo, ClientApi, HostInfo, RemoteClientApi, StaticClientApi, UnavailableApi,
    CAPABILITY_VERSION, OP_GET_CHAIN_INFO, OP_GET_HOST_INFO,
};

pub use cli::{
    collect_flags, extract_command_path, get_deepest_matches, invocation_from_matches, ARGS_ID,
};

pub use config::{
    ConfigError, EnvReader, HostConfig, MockEnv, RealEnv, ENV_APP_PATH, ENV_CHAIN_ID, ENV_HOME,
    ENV_HOST_ROOT, ENV_LOG, ENV_PRE_FAILURE, ENV_RPC_ADDRESS,
};

pub use dispatch::{
    path_to_string, resolve, resolve_node, string_to_path, Resolved, UnresolvedPathError,
};

pub use error::DispatchError;

pub use flags::{decode, parse_value, FlagError, FlagType, FlagValue, TypedFlags};

pub use handler::{
    CommandContext, ExecutedCommand, ExecutedHook, Extensions, FnHandler, Handler, HandlerResult,
    HookContext, Invocation,
};

pub use hooks::{
    call_phase, ActionOutcome, HookCoordinator, HookFailure, HookFn, HookOutcome, HookPhase,
    HookPhaseError, HookReport, HookState, Hooks, ParsePolicyError, PreFailurePolicy,
};

pub use manifest::{Command, Flag, Hook, Manifest, ManifestBuilder, ManifestError};

pub use serialize::{command_table, export_manifest, to_json, to_yaml, ExportFormat, SerializeError};

pub use wire::{
    serve, ErrorPayload, LocalCapabilityChannel, LocalTransport, RemoteApp, Request, Response,
    Transport, TransportError,
};
