//! Where the demo's apps and host write their output.

use std::sync::{Arc, Mutex};

use satellite_dispatch::CommandContext;

/// Line-oriented output sink.
///
/// In a real deployment every app writes to its own stdout. The demo runs
/// apps in-process, so output goes through a `Console` stored in each app's
/// state; tests swap in a capturing one.
#[derive(Debug, Clone, Default)]
pub struct Console {
    captured: Option<Arc<Mutex<Vec<String>>>>,
}

impl Console {
    pub fn stdout() -> Self {
        Self { captured: None }
    }

    /// A console that keeps lines in memory instead of printing them.
    pub fn capture() -> Self {
        Self {
            captured: Some(Arc::default()),
        }
    }

    pub fn println(&self, line: impl Into<String>) {
        let line = line.into();
        match &self.captured {
            Some(lines) => match lines.lock() {
                Ok(mut lines) => lines.push(line),
                Err(poisoned) => poisoned.into_inner().push(line),
            },
            None => println!("{}", line),
        }
    }

    /// Captured lines so far; always empty for a stdout console.
    pub fn lines(&self) -> Vec<String> {
        match &self.captured {
            Some(lines) => match lines.lock() {
                Ok(lines) => lines.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            },
            None => Vec::new(),
        }
    }
}

/// The console an app registered as state.
pub fn console(ctx: &CommandContext) -> Result<&Console, anyhow::Error> {
    ctx.app_state.get_required::<Console>()
}
