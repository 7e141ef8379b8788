//! A worked example of a host CLI with satellite apps.
//!
//! The `ignite-lite` binary builds a [`Host`], installs the example apps
//! from [`apps`] and runs the command line against the combined tree. Apps
//! are reached through a JSON round-tripping transport, so every request and
//! capability call takes the same shape it would between processes.

pub mod apps;
pub mod console;
pub mod host;
pub mod logging;

use std::sync::Arc;

use satellite_dispatch::{HostConfig, HostInfo, LocalTransport, RemoteApp, StaticClientApi};

pub use console::Console;
pub use host::{Host, InstallError};

/// A host with every example app installed.
///
/// Apps that fail to install are skipped with a warning.
pub fn demo_host(config: HostConfig, console: Console) -> Result<Host, anyhow::Error> {
    let api = StaticClientApi::new(
        config.chain.clone(),
        HostInfo::current(env!("CARGO_PKG_VERSION")),
    );
    let mut host = Host::new(config, Arc::new(api), console.clone());

    for app in apps::builtin(&console)? {
        if let Err(err) = host.install(Arc::new(RemoteApp::new(LocalTransport::new(app)))) {
            log::warn!("skipping app: {}", err);
        }
    }
    Ok(host)
}
