//! Per-call error type.
//!
//! [`DispatchError`] is what a command invocation or hook phase returns when
//! it fails. Every variant maps to a stable wire `kind()`, and
//! [`DispatchError::to_payload`] turns it into the `{kind, message}` pair the
//! host receives.

use thiserror::Error;

use crate::cancel::Cancelled;
use crate::capability::CapabilityError;
use crate::dispatch::UnresolvedPathError;
use crate::flags::FlagError;
use crate::manifest::ManifestError;
use crate::wire::{ErrorPayload, TransportError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Unresolved(#[from] UnresolvedPathError),

    #[error(transparent)]
    Flag(#[from] FlagError),

    /// The handler itself failed; its message is forwarded verbatim.
    #[error("{0:#}")]
    Handler(anyhow::Error),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An error the remote app reported, kept as received.
    #[error(transparent)]
    Remote(ErrorPayload),

    /// The peer answered with the wrong kind of response.
    #[error("protocol violation: expected {expected} response")]
    Protocol { expected: &'static str },
}

impl From<Cancelled> for DispatchError {
    fn from(_: Cancelled) -> Self {
        DispatchError::Cancelled
    }
}

impl DispatchError {
    /// Wraps an error returned by app code.
    ///
    /// Errors that already carry a protocol kind (a capability failure the
    /// handler propagated with `?`, a cancellation checkpoint) keep it.
    pub fn handler(err: anyhow::Error) -> Self {
        let err = match err.downcast::<DispatchError>() {
            Ok(inner) => return inner,
            Err(err) => err,
        };
        let err = match err.downcast::<CapabilityError>() {
            Ok(inner) => return DispatchError::Capability(inner),
            Err(err) => err,
        };
        let err = match err.downcast::<FlagError>() {
            Ok(inner) => return DispatchError::Flag(inner),
            Err(err) => err,
        };
        match err.downcast::<Cancelled>() {
            Ok(_) => DispatchError::Cancelled,
            Err(err) => DispatchError::Handler(err),
        }
    }

    /// Stable error kind used on the wire.
    pub fn kind(&self) -> &str {
        match self {
            DispatchError::Manifest(e) => e.kind(),
            DispatchError::Unresolved(e) => e.kind(),
            DispatchError::Flag(e) => e.kind(),
            DispatchError::Handler(_) => "handler",
            DispatchError::Capability(e) => e.kind(),
            DispatchError::Cancelled => "cancelled",
            DispatchError::Transport(e) => e.kind(),
            DispatchError::Remote(payload) => &payload.kind,
            DispatchError::Protocol { .. } => "protocol",
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            DispatchError::Remote(payload) => payload.clone(),
            other => ErrorPayload::new(other.kind(), other.to_string()),
        }
    }
}
