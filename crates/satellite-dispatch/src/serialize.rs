//! Manifest export for host-side inspection.
//!
//! JSON and YAML carry the full manifest in its wire shape. CSV flattens the
//! command tree into one row per command, which is handy for spotting
//! placement and alias clashes across several installed apps.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::dispatch::path_to_string;
use crate::manifest::{Command, Manifest};

/// Errors that can occur during serialization.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV serialization failed: {0}")]
    Csv(String),
}

impl From<csv::Error> for SerializeError {
    fn from(err: csv::Error) -> Self {
        SerializeError::Csv(err.to_string())
    }
}

/// Export formats for [`export_manifest`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Json,
    Yaml,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "yaml" | "yml" => Ok(ExportFormat::Yaml),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown export format `{}`", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Json => "json",
            ExportFormat::Yaml => "yaml",
            ExportFormat::Csv => "csv",
        })
    }
}

/// Serializes a manifest in the given format.
pub fn export_manifest(manifest: &Manifest, format: ExportFormat) -> Result<String, SerializeError> {
    match format {
        ExportFormat::Json => to_json(manifest),
        ExportFormat::Yaml => to_yaml(manifest),
        ExportFormat::Csv => command_table(manifest),
    }
}

/// Serializes data to JSON format.
pub fn to_json<T: Serialize>(data: &T) -> Result<String, SerializeError> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Serializes data to YAML format.
pub fn to_yaml<T: Serialize>(data: &T) -> Result<String, SerializeError> {
    Ok(serde_yaml::to_string(data)?)
}

#[derive(Serialize)]
struct CommandRow {
    path: String,
    placed_under: String,
    aliases: String,
    flags: String,
    leaf: bool,
    hidden: bool,
    short: String,
}

/// One CSV row per command, depth first.
pub fn command_table(manifest: &Manifest) -> Result<String, SerializeError> {
    let mut rows = Vec::new();
    for command in manifest.commands() {
        let placed_under = command.place_command_under.clone().unwrap_or_default();
        collect_rows(command, &mut Vec::new(), &placed_under, &mut rows);
    }

    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in &rows {
        wtr.serialize(row)?;
    }
    if rows.is_empty() {
        wtr.write_record(["path", "placed_under", "aliases", "flags", "leaf", "hidden", "short"])?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| SerializeError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| SerializeError::Csv(e.to_string()))
}

fn collect_rows(
    command: &Command,
    prefix: &mut Vec<String>,
    placed_under: &str,
    rows: &mut Vec<CommandRow>,
) {
    prefix.push(command.name.clone());
    rows.push(CommandRow {
        path: path_to_string(prefix.as_slice()),
        placed_under: placed_under.to_string(),
        aliases: command.aliases.join(" "),
        flags: command
            .flags
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        leaf: command.is_leaf(),
        hidden: command.hidden,
        short: command.short.clone(),
    });
    for child in &command.commands {
        collect_rows(child, prefix, placed_under, rows);
    }
    prefix.pop();
}
