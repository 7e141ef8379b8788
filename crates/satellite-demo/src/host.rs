//! A small host CLI that mounts apps into its command tree.
//!
//! The host owns three commands of its own: `chain build` and `chain serve`
//! (extension points apps can hook into) and `app list|describe`. Everything
//! else comes from installed manifests via [`Manifest::to_clap`].

use std::sync::Arc;

use anyhow::anyhow;
use clap::{Arg, ArgMatches};
use satellite_dispatch::{
    collect_flags, export_manifest, extract_command_path, get_deepest_matches,
    invocation_from_matches, App, Cancellation, ClientApi, CommandContext, DispatchError,
    ExecutedCommand, ExecutedHook, ExportFormat, Flag, HookContext, HookCoordinator, HookOutcome,
    HostConfig, Manifest, UnresolvedPathError,
};
use thiserror::Error;

use crate::console::Console;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("could not load app manifest: {0}")]
    Load(#[from] DispatchError),

    #[error("app `{app}` conflicts with the host: {detail}")]
    Conflict { app: String, detail: String },
}

struct Installed {
    manifest: Manifest,
    app: Arc<dyn App>,
}

pub struct Host {
    config: HostConfig,
    api: Arc<dyn ClientApi>,
    console: Console,
    apps: Vec<Installed>,
}

impl Host {
    pub fn new(config: HostConfig, api: Arc<dyn ClientApi>, console: Console) -> Self {
        Self {
            config,
            api,
            console,
            apps: Vec::new(),
        }
    }

    /// Loads an app's manifest and mounts it.
    ///
    /// An app whose commands or hooks clash with the host or with an app
    /// installed earlier is refused as a whole.
    pub fn install(&mut self, app: Arc<dyn App>) -> Result<(), InstallError> {
        let manifest = app.manifest()?;
        if let Some(detail) = self.conflict(&manifest) {
            return Err(InstallError::Conflict {
                app: manifest.name().to_string(),
                detail,
            });
        }
        log::debug!("installed app `{}`", manifest.name());
        self.apps.push(Installed { manifest, app });
        Ok(())
    }

    /// Names of installed apps, in install order.
    pub fn installed(&self) -> Vec<&str> {
        self.apps.iter().map(|i| i.manifest.name()).collect()
    }

    fn placement(&self, place: Option<&str>) -> String {
        let mut segments: Vec<&str> = place.unwrap_or_default().split_whitespace().collect();
        if segments.first() == Some(&self.config.host_root.as_str()) {
            segments.remove(0);
        }
        segments.join(" ")
    }

    fn conflict(&self, manifest: &Manifest) -> Option<String> {
        let host = self.host_command();

        for command in manifest.commands() {
            let place = self.placement(command.place_command_under.as_deref());
            let node = find_subcommand(&host, &place);
            for name in command.names() {
                // clap generates `help` under every command with subcommands.
                let reserved =
                    name == "help" || node.map_or(false, |n| n.find_subcommand(name).is_some());
                if reserved {
                    return Some(format!("command `{}` is reserved by the host", name));
                }
                for installed in &self.apps {
                    let taken = installed.manifest.commands().iter().any(|other| {
                        self.placement(other.place_command_under.as_deref()) == place
                            && other.names().any(|n| n == name)
                    });
                    if taken {
                        return Some(format!(
                            "command `{}` is already provided by `{}`",
                            name,
                            installed.manifest.name()
                        ));
                    }
                }
            }
        }

        for hook in manifest.hooks() {
            if let Some(installed) = self
                .apps
                .iter()
                .find(|i| i.manifest.hook(&hook.name).is_some())
            {
                return Some(format!(
                    "hook `{}` is already declared by `{}`",
                    hook.name,
                    installed.manifest.name()
                ));
            }
        }

        self.hook_flag_conflict(&host, manifest)
    }

    /// Hook flags on one extension point share a single clap arg per name,
    /// so every hook there must agree on its shape.
    fn hook_flag_conflict(&self, host: &clap::Command, manifest: &Manifest) -> Option<String> {
        let mut mounted: Vec<(String, &Flag, &str)> = Vec::new();
        for installed in &self.apps {
            for hook in installed.manifest.hooks() {
                let point = self.placement(Some(&hook.place_hook_on));
                for flag in &hook.flags {
                    mounted.push((point.clone(), flag, installed.manifest.name()));
                }
            }
        }

        for hook in manifest.hooks() {
            let point = self.placement(Some(&hook.place_hook_on));
            let node = find_subcommand(host, &point);
            for flag in &hook.flags {
                let shadows_host = node.map_or(false, |n| {
                    n.get_arguments().any(|arg| {
                        arg.get_id() == flag.name.as_str()
                            || (flag.shorthand.is_some() && arg.get_short() == flag.shorthand)
                    })
                });
                if shadows_host {
                    return Some(format!(
                        "hook flag `{}` on `{}` is reserved by the host",
                        flag.name, point
                    ));
                }

                for (other_point, other, owner) in &mounted {
                    if *other_point != point {
                        continue;
                    }
                    let clash = if other.name == flag.name {
                        other.flag_type != flag.flag_type || other.shorthand != flag.shorthand
                    } else {
                        flag.shorthand.is_some() && other.shorthand == flag.shorthand
                    };
                    if clash {
                        return Some(format!(
                            "hook flag `{}` on `{}` does not match the one declared by `{}`",
                            flag.name, point, owner
                        ));
                    }
                }
            }
            for flag in &hook.flags {
                mounted.push((point.clone(), flag, manifest.name()));
            }
        }
        None
    }

    /// The host's own commands, before any app is mounted.
    fn host_command(&self) -> clap::Command {
        clap::Command::new(self.config.host_root.clone())
            .about("Host CLI with satellite apps")
            .subcommand(
                clap::Command::new("chain")
                    .about("Build and run the chain")
                    .subcommand(clap::Command::new("build").about("Build the chain binary"))
                    .subcommand(clap::Command::new("serve").about("Start the chain node")),
            )
            .subcommand(
                clap::Command::new("app")
                    .about("Inspect installed apps")
                    .subcommand(clap::Command::new("list").about("List installed apps"))
                    .subcommand(
                        clap::Command::new("describe")
                            .about("Print an app's manifest")
                            .arg(Arg::new("name").required(true))
                            .arg(
                                Arg::new("format")
                                    .long("format")
                                    .value_parser(["json", "yaml", "csv"])
                                    .default_value("yaml"),
                            ),
                    ),
            )
    }

    /// The full command tree: host commands plus every installed app.
    pub fn command(&self) -> clap::Command {
        self.apps
            .iter()
            .fold(self.host_command(), |root, installed| installed.manifest.to_clap(root))
    }

    pub fn context(&self, cancel: Cancellation) -> CommandContext {
        CommandContext::new(self.api.clone(), cancel)
    }

    /// Runs whatever `matches` selected.
    pub fn run(
        &self,
        matches: &ArgMatches,
        os_args: &[String],
        cancel: Cancellation,
    ) -> Result<(), anyhow::Error> {
        let ctx = self.context(cancel);
        let root = self.config.host_root.as_str();

        for installed in &self.apps {
            if let Some(command) = invocation_from_matches(&installed.manifest, root, matches) {
                let command = command.os_args(os_args.iter().cloned());
                return Ok(installed.app.execute(&command, &ctx)?);
            }
        }

        let path = extract_command_path(matches);
        let segments: Vec<&str> = path.iter().map(String::as_str).collect();
        match segments.as_slice() {
            ["chain", action @ ("build" | "serve")] => {
                let command = ExecutedCommand::new(["chain", *action]).os_args(os_args.iter().cloned());
                self.chain_action(action, get_deepest_matches(matches), command, &ctx)
            }
            ["app", "list"] => {
                for installed in &self.apps {
                    self.console.println(describe_line(&installed.manifest));
                }
                Ok(())
            }
            ["app", "describe"] => {
                let deepest = get_deepest_matches(matches);
                let name = deepest
                    .get_one::<String>("name")
                    .ok_or_else(|| anyhow!("missing app name"))?;
                let format: ExportFormat = deepest
                    .get_one::<String>("format")
                    .map(String::as_str)
                    .unwrap_or("yaml")
                    .parse()
                    .map_err(|e: String| anyhow!(e))?;
                let installed = self
                    .apps
                    .iter()
                    .find(|i| i.manifest.name() == name.as_str())
                    .ok_or_else(|| anyhow!("no app named `{}` is installed", name))?;
                self.console
                    .println(export_manifest(&installed.manifest, format)?.trim_end());
                Ok(())
            }
            _ => {
                let mut cmd = self.command();
                self.console.println(cmd.render_help().to_string());
                Ok(())
            }
        }
    }

    fn chain_action(
        &self,
        action: &str,
        matches: &ArgMatches,
        command: ExecutedCommand,
        ctx: &CommandContext,
    ) -> Result<(), anyhow::Error> {
        let chain_id = self.config.chain.chain_id.clone();
        let console = self.console.clone();
        let outcome = self.trigger(&format!("chain {}", action), matches, command, ctx, || {
            ctx.checkpoint()?;
            match action {
                "build" => console.println(format!("Building chain `{}`... done", chain_id)),
                _ => console.println(format!("Serving chain `{}` (stopped)", chain_id)),
            }
            Ok::<_, anyhow::Error>(())
        });

        if let Some(failure) = outcome.failure() {
            log::warn!("{}", failure);
            self.console.println(format!("hook errors: {}", failure));
        }
        match outcome.action {
            Some(result) => result,
            None => Err(anyhow!("chain {} aborted by a failing pre hook", action)),
        }
    }

    /// Runs every installed hook placed on `extension_point` around
    /// `action`.
    ///
    /// Hooks of all apps are triggered together: Pre in install order, then
    /// the action once, then Post in install order, then CleanUp in reverse.
    pub fn trigger<T, E, F>(
        &self,
        extension_point: &str,
        matches: &ArgMatches,
        command: ExecutedCommand,
        ctx: &CommandContext,
        action: F,
    ) -> HookOutcome<T, E>
    where
        E: std::fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        let point = self.placement(Some(extension_point));
        let mut fanout = HookFanout::default();
        let mut triggers = Vec::new();
        let context = HookContext {
            chain_id: self.config.chain.chain_id.clone(),
            rpc_address: self.config.chain.rpc_address.clone(),
            ..Default::default()
        };

        for installed in &self.apps {
            for hook in installed.manifest.hooks() {
                if self.placement(Some(&hook.place_hook_on)) != point {
                    continue;
                }
                let mut executed = command.clone();
                executed.flags = collect_flags(matches, &hook.flags);
                triggers.push(ExecutedHook::new(hook.clone(), executed).with_context(context.clone()));
                fanout.owners.push((hook.name.clone(), installed.app.clone()));
            }
        }

        log::debug!("{} hook(s) on `{}`", triggers.len(), point);
        HookCoordinator::new(&fanout)
            .with_policy(self.config.pre_failure)
            .run_all(&triggers, ctx, action)
    }
}

/// Walks a space-separated placement down the subcommand tree.
fn find_subcommand<'a>(cmd: &'a clap::Command, place: &str) -> Option<&'a clap::Command> {
    place
        .split_whitespace()
        .try_fold(cmd, |cmd, segment| cmd.find_subcommand(segment))
}

fn describe_line(manifest: &Manifest) -> String {
    let commands: Vec<&str> = manifest.commands().iter().map(|c| c.name.as_str()).collect();
    let hooks: Vec<&str> = manifest.hooks().iter().map(|h| h.name.as_str()).collect();
    let mut line = manifest.name().to_string();
    if !commands.is_empty() {
        line.push_str(&format!("  commands: {}", commands.join(", ")));
    }
    if !hooks.is_empty() {
        line.push_str(&format!("  hooks: {}", hooks.join(", ")));
    }
    line
}

/// Routes hook phases to the app that declared each hook, so hooks from
/// several apps share one trigger.
#[derive(Default)]
struct HookFanout {
    owners: Vec<(String, Arc<dyn App>)>,
}

impl HookFanout {
    fn owner(&self, hook: &ExecutedHook) -> Result<&dyn App, DispatchError> {
        self.owners
            .iter()
            .find(|(name, _)| *name == hook.hook.name)
            .map(|(_, app)| app.as_ref())
            .ok_or_else(|| {
                UnresolvedPathError {
                    matched: Vec::new(),
                    attempted: Some(hook.hook.name.clone()),
                    available: self.owners.iter().map(|(name, _)| name.clone()).collect(),
                }
                .into()
            })
    }
}

impl App for HookFanout {
    fn manifest(&self) -> Result<Manifest, DispatchError> {
        Ok(Manifest::builder("hook-fanout").build()?)
    }

    fn execute(&self, command: &ExecutedCommand, _ctx: &CommandContext) -> Result<(), DispatchError> {
        Err(UnresolvedPathError {
            matched: Vec::new(),
            attempted: command.path.first().cloned(),
            available: Vec::new(),
        }
        .into())
    }

    fn hook_pre(&self, hook: &ExecutedHook, ctx: &CommandContext) -> Result<(), DispatchError> {
        self.owner(hook)?.hook_pre(hook, ctx)
    }

    fn hook_post(&self, hook: &ExecutedHook, ctx: &CommandContext) -> Result<(), DispatchError> {
        self.owner(hook)?.hook_post(hook, ctx)
    }

    fn hook_clean_up(&self, hook: &ExecutedHook, ctx: &CommandContext) -> Result<(), DispatchError> {
        self.owner(hook)?.hook_clean_up(hook, ctx)
    }
}
