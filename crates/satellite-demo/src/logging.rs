//! Logger bootstrap for the host binary.
//!
//! Logs go to stderr so they never mix with command output. The level spec
//! comes from `SATELLITE_LOG` through [`HostConfig`](satellite_dispatch::HostConfig)
//! and accepts anything `flexi_logger` does, e.g. `debug` or
//! `warn, satellite_dispatch=debug`.

use flexi_logger::{FlexiLoggerError, Logger, LoggerHandle};

/// Starts the logger. Keep the handle alive for the life of the process.
pub fn init_logging(spec: &str) -> Result<LoggerHandle, FlexiLoggerError> {
    Logger::try_with_str(spec)?
        .log_to_stderr()
        .format(flexi_logger::default_format)
        .start()
}
