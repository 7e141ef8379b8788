//! Capability facade.
//!
//! [`ClientApi`] is the narrow, versioned set of read operations an app may
//! call back into the host while a command or hook phase runs. Each call is a
//! single request/response; failures are forwarded as reported and never
//! retried here.
//!
//! Out of process, the facade travels in the reverse direction of the normal
//! protocol: the app sends a [`CapabilityRequest`] over a
//! [`CapabilityChannel`] and the host answers it with [`serve_capability`].
//!
//! ```text
//! app handler ──► RemoteClientApi ──► CapabilityChannel ──► serve_capability ──► host ClientApi
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::wire::TransportError;

/// Version of the capability operation set.
pub const CAPABILITY_VERSION: u32 = 1;

pub const OP_GET_CHAIN_INFO: &str = "get_chain_info";
pub const OP_GET_HOST_INFO: &str = "get_host_info";

/// Information about the chain the host is operating on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub chain_id: String,
    pub app_path: String,
    pub config_path: String,
    pub rpc_address: String,
    pub home: String,
}

/// Information about the host binary itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub cli_version: String,
    #[serde(default)]
    pub sdk_version: String,
    #[serde(default)]
    pub config_version: String,
    pub os: String,
    pub arch: String,
    #[serde(default)]
    pub build_from_source: bool,
}

impl HostInfo {
    /// Host info for the running binary, with OS and architecture filled in.
    pub fn current(cli_version: impl Into<String>) -> Self {
        Self {
            cli_version: cli_version.into(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            ..Default::default()
        }
    }
}

/// Errors from a capability call.
///
/// The variant travels on the wire so the app side sees the host's error
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CapabilityError {
    /// The host does not offer this operation.
    #[error("capability `{operation}` is not available")]
    Unavailable { operation: String },

    /// The host ran the operation and it failed.
    #[error("capability `{operation}` failed: {message}")]
    Failed { operation: String, message: String },

    /// The host answered with something that is not the expected shape.
    #[error("capability `{operation}` returned a malformed result: {message}")]
    Malformed { operation: String, message: String },

    /// The channel to the host failed before an answer arrived.
    #[error("capability `{operation}` could not reach the host: {message}")]
    Channel { operation: String, message: String },
}

impl CapabilityError {
    /// Stable error kind used on the wire.
    pub fn kind(&self) -> &'static str {
        "capability"
    }

    pub fn unavailable(operation: impl Into<String>) -> Self {
        CapabilityError::Unavailable {
            operation: operation.into(),
        }
    }

    pub fn failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        CapabilityError::Failed {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Host operations available to apps.
///
/// Implementations must be shareable across threads; a host may serve
/// several invocations at once.
pub trait ClientApi: Send + Sync {
    fn get_chain_info(&self) -> Result<ChainInfo, CapabilityError>;

    fn get_host_info(&self) -> Result<HostInfo, CapabilityError>;
}

/// A facade that offers nothing. Every call fails with `Unavailable`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableApi;

impl ClientApi for UnavailableApi {
    fn get_chain_info(&self) -> Result<ChainInfo, CapabilityError> {
        Err(CapabilityError::unavailable(OP_GET_CHAIN_INFO))
    }

    fn get_host_info(&self) -> Result<HostInfo, CapabilityError> {
        Err(CapabilityError::unavailable(OP_GET_HOST_INFO))
    }
}

/// A facade answering from fixed values.
#[derive(Debug, Clone, Default)]
pub struct StaticClientApi {
    pub chain: ChainInfo,
    pub host: HostInfo,
}

impl StaticClientApi {
    pub fn new(chain: ChainInfo, host: HostInfo) -> Self {
        Self { chain, host }
    }
}

impl ClientApi for StaticClientApi {
    fn get_chain_info(&self) -> Result<ChainInfo, CapabilityError> {
        Ok(self.chain.clone())
    }

    fn get_host_info(&self) -> Result<HostInfo, CapabilityError> {
        Ok(self.host.clone())
    }
}

/// A capability call sent from app to host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRequest {
    pub version: u32,
    pub operation: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

impl CapabilityRequest {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            version: CAPABILITY_VERSION,
            operation: operation.into(),
            args: BTreeMap::new(),
        }
    }
}

/// The host's answer to a [`CapabilityRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CapabilityResponse {
    Ok {
        result: serde_json::Map<String, serde_json::Value>,
    },
    Error {
        error: CapabilityError,
    },
}

/// Carries capability calls from app to host.
pub trait CapabilityChannel: Send + Sync {
    fn call(&self, request: &CapabilityRequest) -> Result<CapabilityResponse, TransportError>;
}

/// App-side [`ClientApi`] that forwards every call over a channel.
///
/// Each operation is exactly one request. Failures are returned as received.
pub struct RemoteClientApi<C> {
    channel: C,
}

impl<C: CapabilityChannel> RemoteClientApi<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    fn call<T: DeserializeOwned>(&self, operation: &str) -> Result<T, CapabilityError> {
        let request = CapabilityRequest::new(operation);
        log::debug!("capability call `{}`", operation);

        let response = self
            .channel
            .call(&request)
            .map_err(|e| CapabilityError::Channel {
                operation: operation.to_string(),
                message: e.to_string(),
            })?;

        match response {
            CapabilityResponse::Ok { result } => {
                serde_json::from_value(serde_json::Value::Object(result)).map_err(|e| {
                    CapabilityError::Malformed {
                        operation: operation.to_string(),
                        message: e.to_string(),
                    }
                })
            }
            CapabilityResponse::Error { error } => Err(error),
        }
    }
}

impl<C: CapabilityChannel> ClientApi for RemoteClientApi<C> {
    fn get_chain_info(&self) -> Result<ChainInfo, CapabilityError> {
        self.call(OP_GET_CHAIN_INFO)
    }

    fn get_host_info(&self) -> Result<HostInfo, CapabilityError> {
        self.call(OP_GET_HOST_INFO)
    }
}

/// Host-side handler for a capability request.
pub fn serve_capability(api: &dyn ClientApi, request: &CapabilityRequest) -> CapabilityResponse {
    if request.version != CAPABILITY_VERSION {
        let err = CapabilityError::failed(
            &request.operation,
            format!(
                "unsupported capability version {} (host speaks {})",
                request.version, CAPABILITY_VERSION
            ),
        );
        return error_response(&err);
    }

    let result = match request.operation.as_str() {
        OP_GET_CHAIN_INFO => api.get_chain_info().and_then(|v| to_object(OP_GET_CHAIN_INFO, &v)),
        OP_GET_HOST_INFO => api.get_host_info().and_then(|v| to_object(OP_GET_HOST_INFO, &v)),
        other => Err(CapabilityError::unavailable(other)),
    };

    match result {
        Ok(result) => CapabilityResponse::Ok { result },
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &CapabilityError) -> CapabilityResponse {
    CapabilityResponse::Error { error: err.clone() }
}

fn to_object<T: Serialize>(
    operation: &str,
    value: &T,
) -> Result<serde_json::Map<String, serde_json::Value>, CapabilityError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(CapabilityError::Malformed {
            operation: operation.to_string(),
            message: "result is not an object".to_string(),
        }),
        Err(e) => Err(CapabilityError::Malformed {
            operation: operation.to_string(),
            message: e.to_string(),
        }),
    }
}
