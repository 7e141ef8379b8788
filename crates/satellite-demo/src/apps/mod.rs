//! The example apps shipped with the demo host.
//!
//! Each module exposes the app's `manifest()` and an `app()` constructor
//! returning a ready [`Dispatcher`]. The apps write through the
//! [`Console`] they are given as app state.

use satellite_dispatch::Dispatcher;

use crate::console::Console;

pub mod chain_info;
pub mod flags;
pub mod health_monitor;
pub mod hello_world;
pub mod hooks;

/// Every example app, in install order.
pub fn builtin(console: &Console) -> Result<Vec<Dispatcher>, anyhow::Error> {
    Ok(vec![
        hello_world::app(console.clone())?,
        flags::app(console.clone())?,
        chain_info::app(console.clone())?,
        health_monitor::app(console.clone())?,
        hooks::app(console.clone())?,
    ])
}
