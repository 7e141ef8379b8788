//! Host-side clap integration.
//!
//! A host mounts an app's commands into its own clap tree with
//! [`Manifest::to_clap`] and, once clap has parsed the command line, turns
//! the matches back into an [`ExecutedCommand`] with
//! [`invocation_from_matches`].
//!
//! Flags are kept as raw strings on the host side. Clap does not apply
//! defaults or parse numbers: the app's flag codec owns typing, so the host
//! forwards only what the user actually typed.

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches};
use std::collections::BTreeMap;

use crate::dispatch::resolve_node;
use crate::flags::{parse_value, FlagType, FlagValue};
use crate::handler::ExecutedCommand;
use crate::manifest::{Command, Flag, Manifest};

/// Id of the trailing positional argument on leaf commands.
pub const ARGS_ID: &str = "satellite-args";

/// Extracts the command path from ArgMatches by following the subcommand chain.
///
/// For example, `ignite chain build` produces `["chain", "build"]`.
pub fn extract_command_path(matches: &ArgMatches) -> Vec<String> {
    let mut path = Vec::new();
    let mut current = matches;

    while let Some((name, sub)) = current.subcommand() {
        // Skip "help" as it's handled separately
        if name == "help" {
            break;
        }
        path.push(name.to_string());
        current = sub;
    }

    path
}

/// Gets the deepest subcommand matches.
pub fn get_deepest_matches(matches: &ArgMatches) -> &ArgMatches {
    let mut current = matches;

    while let Some((name, sub)) = current.subcommand() {
        if name == "help" {
            break;
        }
        current = sub;
    }

    current
}

impl Manifest {
    /// Mounts the manifest's commands into a host clap tree.
    ///
    /// Top-level commands go under the host command named by
    /// `place_command_under` (created if missing); hook flags are added to
    /// the host command each hook is placed on, when that command exists.
    pub fn to_clap(&self, root: clap::Command) -> clap::Command {
        let root_name = root.get_name().to_string();
        let mut root = root;

        for command in self.commands() {
            let place = placement(command.place_command_under.as_deref(), &root_name);
            root = attach(root, &place, command_to_clap(command));
        }

        for hook in self.hooks() {
            let place = placement(Some(hook.place_hook_on.as_str()), &root_name);
            let args = hook.flags.iter().map(flag_to_arg).collect();
            root = attach_args(root, &place, args);
        }

        root
    }
}

/// Builds an [`ExecutedCommand`] from parsed host matches.
///
/// Returns `None` when the matches do not select one of the manifest's
/// commands (the user ran a host command instead).
pub fn invocation_from_matches(
    manifest: &Manifest,
    root_name: &str,
    matches: &ArgMatches,
) -> Option<ExecutedCommand> {
    let full = extract_command_path(matches);

    let offset = manifest.commands().iter().find_map(|command| {
        let place = placement(command.place_command_under.as_deref(), root_name);
        let n = place.len();
        (full.len() > n && full[..n] == place[..] && full[n] == command.name).then_some(n)
    })?;

    let path = full[offset..].to_vec();
    let resolved = resolve_node(manifest, path.as_slice()).ok()?;
    let deepest = get_deepest_matches(matches);

    let args = deepest
        .try_get_many::<String>(ARGS_ID)
        .ok()
        .flatten()
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    Some(ExecutedCommand {
        path,
        args,
        os_args: Vec::new(),
        flags: collect_flags(deepest, resolved.flag_set()),
    })
}

/// Collects the raw values of `flags` the user supplied on the command line.
///
/// Repeated string-slice flags are merged into one list.
pub fn collect_flags<'a, I>(matches: &ArgMatches, flags: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = &'a Flag>,
{
    let mut raw = BTreeMap::new();
    for flag in flags {
        if matches.value_source(&flag.name) != Some(ValueSource::CommandLine) {
            continue;
        }
        let values: Vec<String> = match matches.try_get_many::<String>(&flag.name) {
            Ok(Some(values)) => values.cloned().collect(),
            _ => continue,
        };
        if let Some(value) = join_values(flag.flag_type, values) {
            raw.insert(flag.name.clone(), value);
        }
    }
    raw
}

fn join_values(flag_type: FlagType, values: Vec<String>) -> Option<String> {
    if flag_type != FlagType::StringSlice {
        return values.into_iter().last();
    }

    let mut items = Vec::new();
    for value in values {
        match parse_value(FlagType::StringSlice, &value) {
            Some(FlagValue::StringSlice(parsed)) => items.extend(parsed),
            _ => items.push(value),
        }
    }
    Some(FlagValue::StringSlice(items).encode())
}

fn placement(place: Option<&str>, root_name: &str) -> Vec<String> {
    let mut segments: Vec<String> = place
        .unwrap_or_default()
        .split_whitespace()
        .map(String::from)
        .collect();
    if segments.first().map(String::as_str) == Some(root_name) {
        segments.remove(0);
    }
    segments
}

// `mut_subcommand` looks children up by name only.
fn has_subcommand(cmd: &clap::Command, name: &str) -> bool {
    cmd.get_subcommands().any(|sub| sub.get_name() == name)
}

fn attach(parent: clap::Command, place: &[String], sub: clap::Command) -> clap::Command {
    match place.split_first() {
        None => parent.subcommand(sub),
        Some((first, rest)) => {
            let parent = if has_subcommand(&parent, first) {
                parent
            } else {
                parent.subcommand(clap::Command::new(first.clone()))
            };
            parent.mut_subcommand(first, |child| attach(child, rest, sub))
        }
    }
}

fn attach_args(cmd: clap::Command, place: &[String], args: Vec<Arg>) -> clap::Command {
    match place.split_first() {
        None => args.into_iter().fold(cmd, |cmd, arg| {
            if cmd.get_arguments().any(|a| a.get_id() == arg.get_id()) {
                cmd
            } else {
                cmd.arg(arg)
            }
        }),
        Some((first, rest)) => {
            if has_subcommand(&cmd, first) {
                cmd.mut_subcommand(first, |child| attach_args(child, rest, args))
            } else {
                log::debug!("host command `{}` not found; hook flags not mounted", first);
                cmd
            }
        }
    }
}

fn command_to_clap(command: &Command) -> clap::Command {
    let mut cmd = clap::Command::new(command.name.clone()).hide(command.hidden);
    if !command.short.is_empty() {
        cmd = cmd.about(command.short.clone());
    }
    if !command.long.is_empty() {
        cmd = cmd.long_about(command.long.clone());
    }
    for alias in &command.aliases {
        cmd = cmd.visible_alias(alias.clone());
    }
    for flag in &command.flags {
        cmd = cmd.arg(flag_to_arg(flag));
    }

    if command.is_leaf() {
        cmd.arg(
            Arg::new(ARGS_ID)
                .value_name("ARGS")
                .num_args(0..)
                .action(ArgAction::Append),
        )
    } else {
        command
            .commands
            .iter()
            .fold(cmd, |cmd, child| cmd.subcommand(command_to_clap(child)))
    }
}

fn flag_to_arg(flag: &Flag) -> Arg {
    let mut arg = Arg::new(flag.name.clone())
        .long(flag.name.clone())
        .hide(flag.hidden)
        .global(flag.persistent);

    if let Some(shorthand) = flag.shorthand {
        arg = arg.short(shorthand);
    }

    let mut help = flag.usage.clone();
    if flag.required {
        help.push_str(" (required)");
    }
    if let Some(default) = &flag.default {
        help.push_str(&format!(" [default: {}]", default.encode()));
    }
    arg = arg.help(help.trim().to_string());

    match flag.flag_type {
        FlagType::Bool => arg
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true")
            .action(ArgAction::Set),
        FlagType::StringSlice => arg
            .value_name("LIST")
            .num_args(1)
            .action(ArgAction::Append),
        other => arg
            .value_name(other.as_str().to_uppercase())
            .num_args(1)
            .action(ArgAction::Set),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Hook;

    fn manifest() -> Manifest {
        Manifest::builder("demo")
            .command(
                Command::new("web")
                    .alias("w")
                    .short("Manage web frontends")
                    .flag(Flag::string("home").shorthand('H').persistent())
                    .subcommand(
                        Command::new("add")
                            .flag(Flag::bool("force").shorthand('f'))
                            .flag(Flag::string_slice("tags"))
                            .flag(Flag::uint("port").default_value(8080u64)),
                    ),
            )
            .command(Command::new("relayer").place_under("ignite chain"))
            .hook(Hook::new("chain-build", "ignite chain build").flag(Flag::bool("skip-proto")))
            .build()
            .unwrap()
    }

    fn host() -> clap::Command {
        clap::Command::new("ignite")
            .subcommand(clap::Command::new("chain").subcommand(clap::Command::new("build")))
    }

    #[test]
    fn test_extract_command_path() {
        let cmd = host();
        let matches = cmd.try_get_matches_from(["ignite", "chain", "build"]).unwrap();
        assert_eq!(extract_command_path(&matches), vec!["chain", "build"]);
        assert!(get_deepest_matches(&matches).subcommand().is_none());
    }

    #[test]
    fn test_only_supplied_flags_are_forwarded() {
        let m = manifest();
        let cli = m.to_clap(host());
        let matches = cli
            .try_get_matches_from(["ignite", "web", "add", "--force", "site", "-H", "/tmp/w"])
            .unwrap();

        let cmd = invocation_from_matches(&m, "ignite", &matches).unwrap();
        assert_eq!(cmd.path, vec!["web", "add"]);
        assert_eq!(cmd.args, vec!["site"]);
        assert_eq!(cmd.flags.get("force").map(String::as_str), Some("true"));
        assert_eq!(cmd.flags.get("home").map(String::as_str), Some("/tmp/w"));
        // Defaults stay with the app.
        assert!(!cmd.flags.contains_key("port"));
    }

    #[test]
    fn test_alias_and_bool_value() {
        let m = manifest();
        let matches = m
            .to_clap(host())
            .try_get_matches_from(["ignite", "w", "add", "--force=false"])
            .unwrap();

        let cmd = invocation_from_matches(&m, "ignite", &matches).unwrap();
        assert_eq!(cmd.path, vec!["web", "add"]);
        assert_eq!(cmd.flags["force"], "false");
    }

    #[test]
    fn test_repeated_slice_flags_merge() {
        let m = manifest();
        let matches = m
            .to_clap(host())
            .try_get_matches_from(["ignite", "web", "add", "--tags", "a,b", "--tags", "c"])
            .unwrap();

        let cmd = invocation_from_matches(&m, "ignite", &matches).unwrap();
        assert_eq!(cmd.flags["tags"], "[a,b,c]");
    }

    #[test]
    fn test_place_command_under_host_command() {
        let m = manifest();
        let cli = m.to_clap(host());
        let chain = cli.find_subcommand("chain").unwrap();
        assert!(chain.find_subcommand("relayer").is_some());
        assert!(chain.find_subcommand("build").is_some());

        let matches = cli.try_get_matches_from(["ignite", "chain", "relayer"]).unwrap();
        let cmd = invocation_from_matches(&m, "ignite", &matches).unwrap();
        assert_eq!(cmd.path, vec!["relayer"]);
    }

    #[test]
    fn test_host_commands_are_not_app_commands() {
        let m = manifest();
        let matches = m
            .to_clap(host())
            .try_get_matches_from(["ignite", "chain", "build", "--skip-proto"])
            .unwrap();
        assert!(invocation_from_matches(&m, "ignite", &matches).is_none());

        let hook = m.hook("chain-build").unwrap();
        let raw = collect_flags(get_deepest_matches(&matches), &hook.flags);
        assert_eq!(raw.get("skip-proto").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_clap_tree_is_consistent() {
        manifest().to_clap(host()).debug_assert();
    }
}
