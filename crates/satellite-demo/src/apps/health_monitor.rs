//! Periodic status reports until a count is reached or the host cancels.

use std::time::Duration;

use anyhow::{anyhow, bail};
use satellite_dispatch::{
    Command, CommandContext, Dispatcher, Flag, HandlerResult, Invocation, Manifest, ManifestError,
};
use serde::Serialize;

use crate::console::{console, Console};

const DEFAULT_REFRESH: Duration = Duration::from_secs(5);

pub fn manifest() -> Result<Manifest, ManifestError> {
    Manifest::builder("health-monitor")
        .command(
            Command::new("health-monitor")
                .short("Monitors the health of a running chain")
                .subcommand(
                    Command::new("monitor")
                        .short("Monitor and print out health status of a running chain")
                        .flag(Flag::bool("json").usage("output as JSON"))
                        .flag(
                            Flag::string("refresh-duration")
                                .shorthand('r')
                                .usage("refresh duration of the monitor")
                                .default_value("5s"),
                        )
                        .flag(Flag::string("rpc-address").usage(
                            "RPC address of the chain to monitor (default: current chain RPC address)",
                        ))
                        .flag(
                            Flag::uint("count")
                                .shorthand('c')
                                .usage("number of reports before exiting, 0 to run until cancelled"),
                        ),
                ),
        )
        .build()
}

pub fn app(console: Console) -> Result<Dispatcher, anyhow::Error> {
    Ok(Dispatcher::builder(manifest()?)
        .app_state(console)
        .command("health-monitor.monitor", monitor)?
        .build()?)
}

#[derive(Debug, Serialize)]
struct Status<'a> {
    chain_id: &'a str,
    rpc_address: &'a str,
    report: u64,
}

fn monitor(inv: &Invocation<'_>, ctx: &CommandContext) -> HandlerResult {
    let json = inv.flags.bool("json")?;
    let refresh = parse_duration(inv.flags.string("refresh-duration")?)?;
    let count = inv.flags.uint("count")?;

    let chain = ctx.chain_info()?;
    let rpc_address = match inv.flags.string("rpc-address")? {
        "" => chain.rpc_address.as_str(),
        explicit => explicit,
    };
    let out = console(ctx)?;

    let mut report = 0u64;
    loop {
        report += 1;
        let status = Status {
            chain_id: &chain.chain_id,
            rpc_address,
            report,
        };
        if json {
            out.println(serde_json::to_string(&status)?);
        } else {
            out.println(format!(
                "[{}] chain `{}` at {}: reachable",
                status.report, status.chain_id, status.rpc_address
            ));
        }

        if count != 0 && report >= count {
            return Ok(());
        }
        if ctx.cancel.sleep(refresh).is_err() {
            log::debug!("monitor cancelled after {} report(s)", report);
            return Ok(());
        }
    }
}

/// Parses `500ms`, `5s`, `2m` or `1h`. Empty input means the default.
fn parse_duration(raw: &str) -> Result<Duration, anyhow::Error> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(DEFAULT_REFRESH);
    }

    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| anyhow!("duration `{}` is missing a unit", raw))?;
    let (number, unit) = raw.split_at(split);
    let number: u64 = number
        .parse()
        .map_err(|_| anyhow!("invalid duration `{}`", raw))?;

    let seconds = |scale: u64| {
        number
            .checked_mul(scale)
            .map(Duration::from_secs)
            .ok_or_else(|| anyhow!("duration `{}` is too large", raw))
    };
    let duration = match unit {
        "ms" => Duration::from_millis(number),
        "s" => Duration::from_secs(number),
        "m" => seconds(60)?,
        "h" => seconds(3600)?,
        other => bail!("unknown duration unit `{}` in `{}`", other, raw),
    };
    if duration.is_zero() {
        bail!("refresh duration must be positive");
    }
    Ok(duration)
}
