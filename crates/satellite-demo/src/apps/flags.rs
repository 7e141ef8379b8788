//! Flags and arguments: a persistent `--name` shared by two subcommands.

use anyhow::bail;
use satellite_dispatch::{
    Command, CommandContext, Dispatcher, Flag, HandlerResult, Invocation, Manifest, ManifestError,
};

use crate::console::{console, Console};

const DEFAULT_NAME: &str = "Ignite";
const COW_TYPES: &[&str] = &["default", "dead"];

pub fn manifest() -> Result<Manifest, ManifestError> {
    Manifest::builder("flags")
        .command(
            Command::new("flags")
                .short("Demonstrates cli flags and args in satellite apps")
                .flag(
                    Flag::string("name")
                        .shorthand('n')
                        .usage("Name of the one you want to say hello to!")
                        .default_value(DEFAULT_NAME)
                        .persistent(),
                )
                .subcommand(Command::new("hello").short("Say hello to the user!"))
                .subcommand(
                    Command::new("cowsay")
                        .short("Cow says hello to the user!")
                        .flag(
                            Flag::string("type")
                                .shorthand('t')
                                .usage("Type of the cow! (Try dead)")
                                .default_value("default"),
                        ),
                ),
        )
        .build()
}

pub fn app(console: Console) -> Result<Dispatcher, anyhow::Error> {
    Ok(Dispatcher::builder(manifest()?)
        .app_state(console)
        .command("flags.hello", hello)?
        .command("flags.cowsay", cowsay)?
        .build()?)
}

fn name(inv: &Invocation<'_>) -> Result<String, anyhow::Error> {
    let name = inv.flags.string("name")?;
    Ok(if name.is_empty() { DEFAULT_NAME } else { name }.to_string())
}

fn hello(inv: &Invocation<'_>, ctx: &CommandContext) -> HandlerResult {
    console(ctx)?.println(format!("Hello, {}!", name(inv)?));
    Ok(())
}

fn cowsay(inv: &Invocation<'_>, ctx: &CommandContext) -> HandlerResult {
    let cow = inv.flags.string("type")?;
    let out = console(ctx)?;
    for line in say(&format!("Hello, {}!", name(inv)?), cow)? {
        out.println(line);
    }
    Ok(())
}

fn say(text: &str, cow: &str) -> Result<Vec<String>, anyhow::Error> {
    let (eyes, tongue) = match cow {
        "default" => ("oo", "  "),
        "dead" => ("xx", "U "),
        other => bail!(
            "unknown cow type `{}`; available: {}",
            other,
            COW_TYPES.join(", ")
        ),
    };
    let width = text.chars().count() + 2;
    Ok(vec![
        format!(" {}", "_".repeat(width)),
        format!("< {} >", text),
        format!(" {}", "-".repeat(width)),
        r"        \   ^__^".to_string(),
        format!(r"         \  ({})\_______", eyes),
        r"            (__)\       )\/\".to_string(),
        format!("             {} ||----w |", tongue),
        "                ||     ||".to_string(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_say_frames_the_text() {
        let lines = say("Hi", "default").unwrap();
        assert_eq!(lines[0], " ____");
        assert_eq!(lines[1], "< Hi >");
        assert!(lines[4].contains("(oo)"));
    }

    #[test]
    fn test_say_rejects_unknown_cow() {
        let err = say("Hi", "cheese").unwrap_err();
        assert_eq!(err.to_string(), "unknown cow type `cheese`; available: default, dead");
    }

    #[test]
    fn test_manifest_is_valid() {
        let manifest = manifest().unwrap();
        assert_eq!(manifest.commands()[0].commands.len(), 2);
    }
}
