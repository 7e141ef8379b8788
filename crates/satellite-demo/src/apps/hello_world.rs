use satellite_dispatch::{Command, CommandContext, Dispatcher, HandlerResult, Invocation, Manifest, ManifestError};

use crate::console::{console, Console};

pub fn manifest() -> Result<Manifest, ManifestError> {
    Manifest::builder("hello-world")
        .command(Command::new("hello-world").short("Say hello to the world of ignite!"))
        .build()
}

pub fn app(console: Console) -> Result<Dispatcher, anyhow::Error> {
    Ok(Dispatcher::builder(manifest()?)
        .app_state(console)
        .command("hello-world", hello)?
        .build()?)
}

fn hello(_inv: &Invocation<'_>, ctx: &CommandContext) -> HandlerResult {
    console(ctx)?.println("Hello, world!");
    Ok(())
}
