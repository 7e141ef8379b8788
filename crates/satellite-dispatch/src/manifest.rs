//! App manifest model.
//!
//! A [`Manifest`] is everything an app tells the host about itself: a tree of
//! [`Command`]s with their [`Flag`]s and a list of [`Hook`]s attached to host
//! extension points. It is built once per process start, validated, and never
//! mutated afterwards.
//!
//! # Building
//!
//! ```rust
//! use satellite_dispatch::{Command, Flag, Hook, Manifest};
//!
//! let manifest = Manifest::builder("hooks")
//!     .command(
//!         Command::new("web")
//!             .alias("w")
//!             .short("Manage the web frontend")
//!             .subcommand(Command::new("add").flag(Flag::string("template").shorthand('t'))),
//!     )
//!     .hook(Hook::new("chain-build", "ignite chain build"))
//!     .build()?;
//!
//! assert_eq!(manifest.commands().len(), 1);
//! # Ok::<(), satellite_dispatch::ManifestError>(())
//! ```
//!
//! # Invariants
//!
//! Checked by [`ManifestBuilder::build`] and again whenever a manifest is
//! deserialized:
//!
//! - no two siblings share a name or alias, and no name is empty
//! - within a command's effective flag set (its own flags plus persistent
//!   flags inherited from ancestors) names and shorthands are unique
//! - shorthands are a single character
//! - defaults match the declared flag type
//! - hooks have a name, a non-empty extension point, and unique names

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::flags::{parse_value, FlagType, FlagValue};

/// Errors detected while building or loading a manifest.
///
/// These are construction-time errors: an app whose manifest fails
/// validation cannot be loaded at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("empty command name under `{parent}`")]
    EmptyCommandName { parent: String },

    #[error("duplicate command name or alias `{name}` under `{parent}`")]
    DuplicateCommand { parent: String, name: String },

    #[error("empty flag name on `{command}`")]
    EmptyFlagName { command: String },

    #[error("duplicate flag `--{flag}` on `{command}`")]
    DuplicateFlag { command: String, flag: String },

    #[error("duplicate flag shorthand `-{shorthand}` on `{command}`")]
    DuplicateShorthand { command: String, shorthand: char },

    #[error("default value of flag `--{flag}` on `{command}` is not a valid {expected}")]
    DefaultTypeMismatch {
        command: String,
        flag: String,
        expected: FlagType,
    },

    #[error("hook name must not be empty")]
    EmptyHookName,

    #[error("hook `{hook}` does not name an extension point")]
    EmptyExtensionPoint { hook: String },

    #[error("duplicate hook `{hook}`")]
    DuplicateHook { hook: String },
}

impl ManifestError {
    /// Stable error kind used on the wire.
    pub fn kind(&self) -> &'static str {
        "manifest_conflict"
    }
}

/// A flag declaration.
///
/// On the wire a flag's shorthand and default travel as plain strings, the
/// same way the host sees them on its own command line; in memory they are
/// typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireFlag", into = "WireFlag")]
pub struct Flag {
    pub name: String,
    pub shorthand: Option<char>,
    pub usage: String,
    pub flag_type: FlagType,
    /// Typed default; `None` means the type's zero value.
    pub default: Option<FlagValue>,
    pub required: bool,
    /// Inherited by every descendant command.
    pub persistent: bool,
    pub hidden: bool,
}

impl Flag {
    pub fn new(name: impl Into<String>, flag_type: FlagType) -> Self {
        Self {
            name: name.into(),
            shorthand: None,
            usage: String::new(),
            flag_type,
            default: None,
            required: false,
            persistent: false,
            hidden: false,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FlagType::String)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FlagType::Bool)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FlagType::Int)
    }

    pub fn uint(name: impl Into<String>) -> Self {
        Self::new(name, FlagType::Uint)
    }

    pub fn int64(name: impl Into<String>) -> Self {
        Self::new(name, FlagType::Int64)
    }

    pub fn uint64(name: impl Into<String>) -> Self {
        Self::new(name, FlagType::Uint64)
    }

    pub fn string_slice(name: impl Into<String>) -> Self {
        Self::new(name, FlagType::StringSlice)
    }

    pub fn shorthand(mut self, shorthand: char) -> Self {
        self.shorthand = Some(shorthand);
        self
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    /// Sets the typed default. A value that does not match the declared
    /// type is reported when the manifest is built.
    pub fn default_value(mut self, value: impl Into<FlagValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

#[derive(Serialize, Deserialize)]
struct WireFlag {
    name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    shorthand: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    usage: String,
    #[serde(rename = "type")]
    flag_type: FlagType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    default_value: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    persistent: bool,
    #[serde(default)]
    hidden: bool,
}

impl TryFrom<WireFlag> for Flag {
    type Error = String;

    fn try_from(wire: WireFlag) -> Result<Self, Self::Error> {
        let mut chars = wire.shorthand.chars();
        let shorthand = match (chars.next(), chars.next()) {
            (None, _) => None,
            (Some(c), None) => Some(c),
            (Some(_), Some(_)) => {
                return Err(format!(
                    "flag `--{}` has shorthand {:?}; shorthands are one character",
                    wire.name, wire.shorthand
                ))
            }
        };

        let default = if wire.default_value.is_empty() {
            None
        } else {
            let value = parse_value(wire.flag_type, &wire.default_value).ok_or_else(|| {
                format!(
                    "default {:?} of flag `--{}` is not a valid {}",
                    wire.default_value, wire.name, wire.flag_type
                )
            })?;
            Some(value)
        };

        Ok(Flag {
            name: wire.name,
            shorthand,
            usage: wire.usage,
            flag_type: wire.flag_type,
            default,
            required: wire.required,
            persistent: wire.persistent,
            hidden: wire.hidden,
        })
    }
}

impl From<Flag> for WireFlag {
    fn from(flag: Flag) -> Self {
        WireFlag {
            name: flag.name,
            shorthand: flag.shorthand.map(String::from).unwrap_or_default(),
            usage: flag.usage,
            flag_type: flag.flag_type,
            default_value: flag.default.map(|v| v.encode()).unwrap_or_default(),
            required: flag.required,
            persistent: flag.persistent,
            hidden: flag.hidden,
        }
    }
}

/// A node in the command tree.
///
/// A command with children is a group; a command without children is a leaf
/// and receives any path segments left over after routing as positional
/// arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub short: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub long: String,
    /// Host command this command is attached under, e.g. `"ignite chain"`.
    /// Only meaningful on top-level commands; `None` means the host root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_command_under: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<Flag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Command>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn short(mut self, short: impl Into<String>) -> Self {
        self.short = short.into();
        self
    }

    pub fn long(mut self, long: impl Into<String>) -> Self {
        self.long = long.into();
        self
    }

    pub fn place_under(mut self, host_command: impl Into<String>) -> Self {
        self.place_command_under = Some(host_command.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn flag(mut self, flag: Flag) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn subcommand(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Returns true if this command has no children.
    pub fn is_leaf(&self) -> bool {
        self.commands.is_empty()
    }

    /// The command's name followed by its aliases.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Finds a child by name first, then by alias.
    pub fn find_child(&self, segment: &str) -> Option<&Command> {
        find_command(&self.commands, segment)
    }

    /// Names of children that should be offered as next steps.
    pub fn visible_children(&self) -> Vec<String> {
        visible_names(&self.commands)
    }
}

pub(crate) fn find_command<'a>(commands: &'a [Command], segment: &str) -> Option<&'a Command> {
    commands
        .iter()
        .find(|c| c.name == segment)
        .or_else(|| {
            commands
                .iter()
                .find(|c| c.aliases.iter().any(|alias| alias == segment))
        })
}

pub(crate) fn visible_names(commands: &[Command]) -> Vec<String> {
    commands
        .iter()
        .filter(|c| !c.hidden)
        .map(|c| c.name.clone())
        .collect()
}

/// Attachment of app callbacks to a host extension point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
    pub name: String,
    /// Host extension point, e.g. `"ignite chain build"`.
    pub place_hook_on: String,
    /// Flags the hook contributes to the host command it wraps.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<Flag>,
}

impl Hook {
    pub fn new(name: impl Into<String>, place_hook_on: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            place_hook_on: place_hook_on.into(),
            flags: Vec::new(),
        }
    }

    pub fn flag(mut self, flag: Flag) -> Self {
        self.flags.push(flag);
        self
    }
}

/// An app's validated command tree and hook list.
///
/// Fields are private: once built (or deserialized, which re-runs the same
/// validation) a manifest cannot be changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ManifestBuilder")]
pub struct Manifest {
    name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    commands: Vec<Command>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    hooks: Vec<Hook>,
    shared_host: bool,
}

impl Manifest {
    pub fn builder(name: impl Into<String>) -> ManifestBuilder {
        ManifestBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Top-level commands.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn hooks(&self) -> &[Hook] {
        &self.hooks
    }

    /// Whether one app process may serve several host instances.
    pub fn shared_host(&self) -> bool {
        self.shared_host
    }

    pub fn hook(&self, name: &str) -> Option<&Hook> {
        self.hooks.iter().find(|h| h.name == name)
    }

    /// Hooks attached to the given extension point, in declaration order.
    pub fn hooks_on<'a>(&'a self, extension_point: &'a str) -> impl Iterator<Item = &'a Hook> {
        self.hooks
            .iter()
            .filter(move |h| h.place_hook_on == extension_point)
    }
}

/// Builder for [`Manifest`]; doubles as the raw deserialization form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestBuilder {
    name: String,
    #[serde(default)]
    commands: Vec<Command>,
    #[serde(default)]
    hooks: Vec<Hook>,
    #[serde(default)]
    shared_host: bool,
}

impl ManifestBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn shared_host(mut self, shared: bool) -> Self {
        self.shared_host = shared;
        self
    }

    /// Validates and freezes the manifest.
    ///
    /// An empty string default is the zero value and is stored as `None`,
    /// which is also how it reads back from the wire.
    pub fn build(mut self) -> Result<Manifest, ManifestError> {
        validate_commands("", &self.commands, &[])?;
        validate_hooks(&self.hooks)?;

        clear_empty_defaults(&mut self.commands);
        for hook in &mut self.hooks {
            clear_empty_flag_defaults(&mut hook.flags);
        }

        Ok(Manifest {
            name: self.name,
            commands: self.commands,
            hooks: self.hooks,
            shared_host: self.shared_host,
        })
    }
}

impl TryFrom<ManifestBuilder> for Manifest {
    type Error = ManifestError;

    fn try_from(builder: ManifestBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

fn clear_empty_defaults(commands: &mut [Command]) {
    for command in commands {
        clear_empty_flag_defaults(&mut command.flags);
        clear_empty_defaults(&mut command.commands);
    }
}

fn clear_empty_flag_defaults(flags: &mut [Flag]) {
    for flag in flags {
        if matches!(&flag.default, Some(FlagValue::String(s)) if s.is_empty()) {
            flag.default = None;
        }
    }
}

fn display_parent(parent: &str) -> String {
    if parent.is_empty() {
        "<root>".to_string()
    } else {
        parent.to_string()
    }
}

fn validate_commands(
    parent: &str,
    commands: &[Command],
    inherited: &[&Flag],
) -> Result<(), ManifestError> {
    let mut seen = BTreeSet::new();

    for command in commands {
        if command.name.trim().is_empty() {
            return Err(ManifestError::EmptyCommandName {
                parent: display_parent(parent),
            });
        }
        for name in command.names() {
            if !seen.insert(name) {
                return Err(ManifestError::DuplicateCommand {
                    parent: display_parent(parent),
                    name: name.to_string(),
                });
            }
        }

        let path = if parent.is_empty() {
            command.name.clone()
        } else {
            format!("{}.{}", parent, command.name)
        };

        validate_flags(&path, &command.flags, inherited)?;

        let mut next: Vec<&Flag> = inherited.to_vec();
        next.extend(command.flags.iter().filter(|f| f.persistent));
        validate_commands(&path, &command.commands, &next)?;
    }

    Ok(())
}

fn validate_flags(owner: &str, flags: &[Flag], inherited: &[&Flag]) -> Result<(), ManifestError> {
    let mut names: BTreeSet<&str> = inherited.iter().map(|f| f.name.as_str()).collect();
    let mut shorthands: BTreeSet<char> = inherited.iter().filter_map(|f| f.shorthand).collect();

    for flag in flags {
        if flag.name.trim().is_empty() {
            return Err(ManifestError::EmptyFlagName {
                command: owner.to_string(),
            });
        }
        if !names.insert(flag.name.as_str()) {
            return Err(ManifestError::DuplicateFlag {
                command: owner.to_string(),
                flag: flag.name.clone(),
            });
        }
        if let Some(shorthand) = flag.shorthand {
            if !shorthands.insert(shorthand) {
                return Err(ManifestError::DuplicateShorthand {
                    command: owner.to_string(),
                    shorthand,
                });
            }
        }
        if let Some(default) = &flag.default {
            if !default.matches(flag.flag_type) {
                return Err(ManifestError::DefaultTypeMismatch {
                    command: owner.to_string(),
                    flag: flag.name.clone(),
                    expected: flag.flag_type,
                });
            }
        }
    }

    Ok(())
}

fn validate_hooks(hooks: &[Hook]) -> Result<(), ManifestError> {
    let mut seen = BTreeSet::new();

    for hook in hooks {
        if hook.name.trim().is_empty() {
            return Err(ManifestError::EmptyHookName);
        }
        if hook.place_hook_on.trim().is_empty() {
            return Err(ManifestError::EmptyExtensionPoint {
                hook: hook.name.clone(),
            });
        }
        if !seen.insert(hook.name.as_str()) {
            return Err(ManifestError::DuplicateHook {
                hook: hook.name.clone(),
            });
        }
        validate_flags(&format!("hook {}", hook.name), &hook.flags, &[])?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web() -> Command {
        Command::new("web")
            .alias("w")
            .subcommand(Command::new("add"))
            .subcommand(Command::new("remove").alias("rm"))
    }

    #[test]
    fn test_build_valid_manifest() {
        let manifest = Manifest::builder("demo")
            .command(web())
            .hook(Hook::new("chain-build", "ignite chain build"))
            .build()
            .unwrap();

        assert_eq!(manifest.name(), "demo");
        assert_eq!(manifest.commands()[0].commands.len(), 2);
        assert!(manifest.hook("chain-build").is_some());
        assert!(!manifest.shared_host());
    }

    #[test]
    fn test_sibling_name_collision() {
        let err = Manifest::builder("demo")
            .command(web())
            .command(Command::new("web"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ManifestError::DuplicateCommand {
                parent: "<root>".into(),
                name: "web".into()
            }
        );
        assert_eq!(err.kind(), "manifest_conflict");
    }

    #[test]
    fn test_sibling_alias_collides_with_name() {
        let err = Manifest::builder("demo")
            .command(
                Command::new("web")
                    .subcommand(Command::new("add").alias("new"))
                    .subcommand(Command::new("new")),
            )
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ManifestError::DuplicateCommand {
                parent: "web".into(),
                name: "new".into()
            }
        );
    }

    #[test]
    fn test_same_name_in_different_branches_is_fine() {
        let manifest = Manifest::builder("demo")
            .command(Command::new("a").subcommand(Command::new("list")))
            .command(Command::new("b").subcommand(Command::new("list")))
            .build();
        assert!(manifest.is_ok());
    }

    #[test]
    fn test_empty_command_name() {
        let err = Manifest::builder("demo")
            .command(Command::new("web").subcommand(Command::new(" ")))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ManifestError::EmptyCommandName {
                parent: "web".into()
            }
        );
    }

    #[test]
    fn test_flag_name_collision() {
        let err = Manifest::builder("demo")
            .command(
                Command::new("monitor")
                    .flag(Flag::bool("json"))
                    .flag(Flag::string("json")),
            )
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ManifestError::DuplicateFlag {
                command: "monitor".into(),
                flag: "json".into()
            }
        );
    }

    #[test]
    fn test_flag_shorthand_collision() {
        let err = Manifest::builder("demo")
            .command(
                Command::new("monitor")
                    .flag(Flag::string("rpc").shorthand('r'))
                    .flag(Flag::string("refresh").shorthand('r')),
            )
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ManifestError::DuplicateShorthand {
                command: "monitor".into(),
                shorthand: 'r'
            }
        );
    }

    #[test]
    fn test_persistent_flag_collides_with_descendant() {
        let err = Manifest::builder("demo")
            .command(
                Command::new("relayer")
                    .flag(Flag::string("config").shorthand('c').persistent())
                    .subcommand(Command::new("start").flag(Flag::string("chain").shorthand('c'))),
            )
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ManifestError::DuplicateShorthand {
                command: "relayer.start".into(),
                shorthand: 'c'
            }
        );
    }

    #[test]
    fn test_non_persistent_flag_does_not_leak() {
        let manifest = Manifest::builder("demo")
            .command(
                Command::new("relayer")
                    .flag(Flag::string("config"))
                    .subcommand(Command::new("start").flag(Flag::string("config"))),
            )
            .build();
        assert!(manifest.is_ok());
    }

    #[test]
    fn test_default_type_mismatch() {
        let err = Manifest::builder("demo")
            .command(Command::new("monitor").flag(Flag::bool("json").default_value("yes")))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ManifestError::DefaultTypeMismatch {
                command: "monitor".into(),
                flag: "json".into(),
                expected: FlagType::Bool
            }
        );
    }

    #[test]
    fn test_hook_validation() {
        let err = Manifest::builder("demo")
            .hook(Hook::new("chain-build", ""))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ManifestError::EmptyExtensionPoint {
                hook: "chain-build".into()
            }
        );

        let err = Manifest::builder("demo")
            .hook(Hook::new("chain-build", "ignite chain build"))
            .hook(Hook::new("chain-build", "ignite chain serve"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ManifestError::DuplicateHook {
                hook: "chain-build".into()
            }
        );
    }

    #[test]
    fn test_hooks_on_extension_point() {
        let manifest = Manifest::builder("demo")
            .hook(Hook::new("a", "ignite chain build"))
            .hook(Hook::new("b", "ignite chain serve"))
            .hook(Hook::new("c", "ignite chain build"))
            .build()
            .unwrap();
        let names: Vec<_> = manifest
            .hooks_on("ignite chain build")
            .map(|h| h.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_find_child_prefers_name() {
        let cmd = web();
        assert_eq!(cmd.find_child("rm").unwrap().name, "remove");
        assert_eq!(cmd.find_child("add").unwrap().name, "add");
        assert!(cmd.find_child("missing").is_none());
    }

    #[test]
    fn test_json_round_trip_keeps_typed_defaults() {
        let manifest = Manifest::builder("demo")
            .command(
                Command::new("monitor")
                    .flag(Flag::uint("count").default_value(3u64))
                    .flag(Flag::string_slice("tags").default_value(vec!["a", "b"]))
                    .flag(Flag::string("rpc").shorthand('r')),
            )
            .build()
            .unwrap();

        let json = serde_json::to_string(&manifest).unwrap();
        assert!(json.contains(r#""default_value":"3""#));
        assert!(json.contains(r#""shorthand":"r""#));

        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn test_empty_default_survives_json_round_trip() {
        let manifest = Manifest::builder("demo")
            .command(Command::new("monitor").flag(Flag::string("rpc").default_value("")))
            .hook(
                Hook::new("build", "ignite chain build")
                    .flag(Flag::string("out").default_value("")),
            )
            .build()
            .unwrap();
        assert_eq!(manifest.commands()[0].flags[0].default, None);
        assert_eq!(manifest.hooks()[0].flags[0].default, None);

        let json = serde_json::to_string(&manifest).unwrap();
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);

        let err = Manifest::builder("demo")
            .command(Command::new("monitor").flag(Flag::int("count").default_value("")))
            .build()
            .unwrap_err();
        assert!(matches!(err, ManifestError::DefaultTypeMismatch { .. }));
    }

    #[test]
    fn test_deserialize_revalidates() {
        let json = r#"{
            "name": "demo",
            "commands": [{"name": "web"}, {"name": "web"}],
            "shared_host": false
        }"#;
        let err = serde_json::from_str::<Manifest>(json).unwrap_err();
        assert!(err.to_string().contains("duplicate command"));
    }

    #[test]
    fn test_deserialize_rejects_bad_default() {
        let json = r#"{
            "name": "demo",
            "commands": [{"name": "monitor", "flags": [
                {"name": "json", "type": "bool", "default_value": "maybe"}
            ]}]
        }"#;
        let err = serde_json::from_str::<Manifest>(json).unwrap_err();
        assert!(err.to_string().contains("not a valid bool"));
    }

    #[test]
    fn test_deserialize_rejects_long_shorthand() {
        let json = r#"{
            "name": "demo",
            "commands": [{"name": "monitor", "flags": [
                {"name": "rpc", "type": "string", "shorthand": "rp"}
            ]}]
        }"#;
        assert!(serde_json::from_str::<Manifest>(json).is_err());
    }
}
