//! Reads chain and host details through the capability facade.

use satellite_dispatch::{
    Command, CommandContext, Dispatcher, HandlerResult, Invocation, Manifest, ManifestError,
};

use crate::console::{console, Console};

pub fn manifest() -> Result<Manifest, ManifestError> {
    Manifest::builder("chain-info")
        .command(
            Command::new("chain-info")
                .short("Shows information about the chain in the current directory")
                .subcommand(
                    Command::new("info")
                        .short("Prints out some basic information about the chain"),
                ),
        )
        .build()
}

pub fn app(console: Console) -> Result<Dispatcher, anyhow::Error> {
    Ok(Dispatcher::builder(manifest()?)
        .app_state(console)
        .command("chain-info.info", info)?
        .build()?)
}

fn info(_inv: &Invocation<'_>, ctx: &CommandContext) -> HandlerResult {
    let chain = ctx.chain_info()?;
    let host = ctx.host_info()?;

    let rows = [
        ("Chain ID", chain.chain_id),
        ("App Path", chain.app_path),
        ("Config Path", chain.config_path),
        ("RPC Address", chain.rpc_address),
        ("Home", chain.home),
        (
            "Host",
            format!("{} ({}/{})", host.cli_version, host.os, host.arch),
        ),
    ];
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0) + 1;

    let out = console(ctx)?;
    for (label, value) in rows {
        out.println(format!("{:<width$} {}", format!("{}:", label), value, width = width));
    }
    Ok(())
}
