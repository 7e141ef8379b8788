//! Hooks around the host's `chain build` and `chain serve`.

use satellite_dispatch::{
    Command, CommandContext, Dispatcher, ExecutedHook, Flag, HandlerResult, Hook, Hooks,
    Invocation, Manifest, ManifestError,
};

use crate::console::{console, Console};

pub const CHAIN_BUILD: &str = "chain-build";
pub const CHAIN_SERVE: &str = "chain-serve";

pub fn manifest() -> Result<Manifest, ManifestError> {
    Manifest::builder("hooks")
        .command(
            Command::new("hooks")
                .short("Demonstrates usage of hooks")
                .long("To use either run \"ignite chain build\" or \"ignite chain serve\" and see the output."),
        )
        .hook(
            Hook::new(CHAIN_BUILD, "ignite chain build").flag(
                Flag::bool("summary").usage("Print a summary once the build succeeded"),
            ),
        )
        .hook(Hook::new(CHAIN_SERVE, "ignite chain serve"))
        .build()
}

pub fn app(console: Console) -> Result<Dispatcher, anyhow::Error> {
    let phases = || Hooks::new().pre(pre).post(post).clean_up(clean_up);
    Ok(Dispatcher::builder(manifest()?)
        .app_state(console)
        .command("hooks", usage)?
        .hooks(CHAIN_BUILD, phases().post(summary))?
        .hooks(CHAIN_SERVE, phases())?
        .build()?)
}

fn usage(_inv: &Invocation<'_>, ctx: &CommandContext) -> HandlerResult {
    console(ctx)?.println(
        "To use either run \"ignite chain build\" or \"ignite chain serve\" and see the output.",
    );
    Ok(())
}

fn pre(hook: &ExecutedHook, ctx: &CommandContext) -> HandlerResult {
    let out = console(ctx)?;
    out.println(format!("ExecuteHookPre: {}", hook.hook.name));
    let chain = ctx.chain_info()?;
    out.println(format!(
        "Chain with chain-id \"{}\" running at rpc address \"{}\"",
        chain.chain_id, chain.rpc_address
    ));
    Ok(())
}

fn post(hook: &ExecutedHook, ctx: &CommandContext) -> HandlerResult {
    console(ctx)?.println(format!("ExecuteHookPost: {}", hook.hook.name));
    Ok(())
}

fn summary(hook: &ExecutedHook, ctx: &CommandContext) -> HandlerResult {
    if hook.hook_flags()?.bool("summary")? {
        console(ctx)?.println(format!(
            "{} finished: {}",
            hook.hook.name,
            hook.executed_command.path.join(" ")
        ));
    }
    Ok(())
}

fn clean_up(hook: &ExecutedHook, ctx: &CommandContext) -> HandlerResult {
    console(ctx)?.println(format!("ExecuteHookCleanUp: {}", hook.hook.name));
    Ok(())
}
