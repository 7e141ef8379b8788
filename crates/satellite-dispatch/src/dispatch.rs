//! Command routing.
//!
//! Resolves an invocation path against a manifest's command tree. The walk is
//! explicit and left to right:
//!
//! ```text
//! ["web", "w", "add", "file.txt"]
//!    │
//!    ├─ root children:  web ✓
//!    ├─ web children:   add (by name first, then alias) ✓
//!    └─ add is a leaf:  "file.txt" becomes a positional argument
//! ```
//!
//! A segment that matches no child of a group stops the walk with an
//! [`UnresolvedPathError`] that lists what was available at that point. The
//! router is pure: it never mutates the manifest and the same input always
//! yields the same result.

use std::fmt;
use thiserror::Error;

use crate::manifest::{find_command, visible_names, Command, Flag, Manifest};

/// A path that does not lead to a runnable command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct UnresolvedPathError {
    /// Canonical names of the segments that did resolve.
    pub matched: Vec<String>,
    /// The segment that failed to match, or `None` when the path stopped at
    /// a group.
    pub attempted: Option<String>,
    /// Children offered at the point of failure.
    pub available: Vec<String>,
}

impl UnresolvedPathError {
    /// Stable error kind used on the wire.
    pub fn kind(&self) -> &'static str {
        "unresolved_path"
    }

    /// Error for a path that ends at a group with no handler.
    pub fn group(resolved: &Resolved<'_>) -> Self {
        Self {
            matched: resolved.path.clone(),
            attempted: None,
            available: resolved.command.visible_children(),
        }
    }
}

impl fmt::Display for UnresolvedPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = if self.matched.is_empty() {
            "<root>".to_string()
        } else {
            self.matched.join(" ")
        };
        match &self.attempted {
            Some(segment) => write!(f, "unknown command `{}` under `{}`", segment, at)?,
            None => write!(f, "`{}` needs a subcommand", at)?,
        }
        if !self.available.is_empty() {
            write!(f, "; available: {}", self.available.join(", "))?;
        }
        Ok(())
    }
}

/// Outcome of a successful walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<'m> {
    pub command: &'m Command,
    /// Canonical names along the resolved path, aliases replaced.
    pub path: Vec<String>,
    /// Segments left over after reaching a leaf; positional arguments.
    pub remaining: Vec<String>,
    /// Ancestors of `command`, root first.
    pub lineage: Vec<&'m Command>,
}

impl<'m> Resolved<'m> {
    /// The command's effective flag set: persistent flags inherited from
    /// ancestors first, then the command's own flags.
    pub fn flag_set(&self) -> impl Iterator<Item = &'m Flag> + '_ {
        self.lineage
            .iter()
            .flat_map(|ancestor| ancestor.flags.iter().filter(|f| f.persistent))
            .chain(self.command.flags.iter())
    }

    pub fn is_group(&self) -> bool {
        !self.command.is_leaf()
    }

    /// Dotted key of the resolved command, e.g. `"web.add"`.
    pub fn key(&self) -> String {
        path_to_string(&self.path)
    }
}

/// Walks `path` down the manifest and returns the node it ends on.
///
/// Unlike [`resolve`], a path ending at a group is not an error here;
/// callers that can run groups (a registered group handler) use this.
pub fn resolve_node<'m, S: AsRef<str>>(
    manifest: &'m Manifest,
    path: &[S],
) -> Result<Resolved<'m>, UnresolvedPathError> {
    let mut segments = path.iter().map(S::as_ref);

    let first = match segments.next() {
        Some(first) => first,
        None => {
            return Err(UnresolvedPathError {
                matched: Vec::new(),
                attempted: None,
                available: visible_names(manifest.commands()),
            })
        }
    };

    let mut current =
        find_command(manifest.commands(), first).ok_or_else(|| UnresolvedPathError {
            matched: Vec::new(),
            attempted: Some(first.to_string()),
            available: visible_names(manifest.commands()),
        })?;
    let mut matched = vec![current.name.clone()];
    let mut lineage = Vec::new();
    let mut remaining = Vec::new();

    for segment in segments.by_ref() {
        if current.is_leaf() {
            remaining.push(segment.to_string());
            break;
        }
        match current.find_child(segment) {
            Some(child) => {
                lineage.push(current);
                matched.push(child.name.clone());
                current = child;
            }
            None => {
                return Err(UnresolvedPathError {
                    matched,
                    attempted: Some(segment.to_string()),
                    available: current.visible_children(),
                })
            }
        }
    }
    remaining.extend(segments.map(String::from));

    log::debug!(
        "resolved {:?} to `{}` with {} positional arg(s)",
        path.iter().map(S::as_ref).collect::<Vec<_>>(),
        matched.join("."),
        remaining.len()
    );

    Ok(Resolved {
        command: current,
        path: matched,
        remaining,
        lineage,
    })
}

/// Resolves `path` to the unique leaf command responsible for it.
///
/// A path ending at a group is an [`UnresolvedPathError`] with no attempted
/// segment and the group's children listed as available.
pub fn resolve<'m, S: AsRef<str>>(
    manifest: &'m Manifest,
    path: &[S],
) -> Result<Resolved<'m>, UnresolvedPathError> {
    let resolved = resolve_node(manifest, path)?;
    if resolved.is_group() {
        return Err(UnresolvedPathError::group(&resolved));
    }
    Ok(resolved)
}

/// Converts a command path vector to a dot-separated string.
///
/// For example, `["web", "add"]` becomes `"web.add"`.
pub fn path_to_string(path: &[String]) -> String {
    path.join(".")
}

/// Parses a dot-separated command path string into a vector.
///
/// For example, `"web.add"` becomes `["web", "add"]`.
pub fn string_to_path(s: &str) -> Vec<String> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split('.').map(String::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Command, Flag};

    fn manifest() -> Manifest {
        Manifest::builder("demo")
            .command(
                Command::new("web")
                    .alias("w")
                    .flag(Flag::string("home").persistent())
                    .flag(Flag::bool("local"))
                    .subcommand(Command::new("add").flag(Flag::string("template")))
                    .subcommand(Command::new("remove").alias("rm"))
                    .subcommand(Command::new("debug").hidden()),
            )
            .command(Command::new("version"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolve_leaf() {
        let m = manifest();
        let resolved = resolve(&m, &["web", "add"]).unwrap();
        assert_eq!(resolved.command.name, "add");
        assert_eq!(resolved.path, vec!["web", "add"]);
        assert!(resolved.remaining.is_empty());
        assert_eq!(resolved.key(), "web.add");
    }

    #[test]
    fn test_resolve_alias_yields_canonical_path() {
        let m = manifest();
        let resolved = resolve(&m, &["w", "rm", "site-a"]).unwrap();
        assert_eq!(resolved.path, vec!["web", "remove"]);
        assert_eq!(resolved.remaining, vec!["site-a"]);
    }

    #[test]
    fn test_leaf_absorbs_remaining_segments() {
        let m = manifest();
        let resolved = resolve(&m, &["version", "add", "web"]).unwrap();
        assert_eq!(resolved.command.name, "version");
        assert_eq!(resolved.remaining, vec!["add", "web"]);
    }

    #[test]
    fn test_unknown_segment_lists_visible_children() {
        let m = manifest();
        let err = resolve(&m, &["web", "missing"]).unwrap_err();
        assert_eq!(err.matched, vec!["web"]);
        assert_eq!(err.attempted.as_deref(), Some("missing"));
        assert_eq!(err.available, vec!["add", "remove"]);
        assert_eq!(err.kind(), "unresolved_path");
        assert_eq!(
            err.to_string(),
            "unknown command `missing` under `web`; available: add, remove"
        );
    }

    #[test]
    fn test_unknown_root_command() {
        let m = manifest();
        let err = resolve(&m, &["deploy"]).unwrap_err();
        assert!(err.matched.is_empty());
        assert_eq!(err.available, vec!["web", "version"]);
    }

    #[test]
    fn test_path_ending_at_group() {
        let m = manifest();
        let err = resolve(&m, &["web"]).unwrap_err();
        assert_eq!(err.matched, vec!["web"]);
        assert_eq!(err.attempted, None);
        assert_eq!(err.available, vec!["add", "remove"]);

        // resolve_node accepts it.
        assert!(resolve_node(&m, &["web"]).unwrap().is_group());
    }

    #[test]
    fn test_empty_path() {
        let m = manifest();
        let err = resolve::<&str>(&m, &[]).unwrap_err();
        assert_eq!(err.attempted, None);
        assert_eq!(err.available, vec!["web", "version"]);
    }

    #[test]
    fn test_hidden_commands_still_resolve() {
        let m = manifest();
        assert!(resolve(&m, &["web", "debug"]).is_ok());
    }

    #[test]
    fn test_flag_set_includes_inherited_persistent_flags() {
        let m = manifest();
        let resolved = resolve(&m, &["web", "add"]).unwrap();
        let names: Vec<_> = resolved.flag_set().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["home", "template"]);
    }

    #[test]
    fn test_path_to_string() {
        assert_eq!(path_to_string(&["web".into(), "add".into()]), "web.add");
        assert_eq!(path_to_string(&["version".into()]), "version");
        assert_eq!(path_to_string(&[]), "");
    }

    #[test]
    fn test_string_to_path() {
        assert_eq!(string_to_path("web.add"), vec!["web", "add"]);
        assert_eq!(string_to_path("version"), vec!["version"]);
        assert_eq!(string_to_path(""), Vec::<String>::new());
    }
}
