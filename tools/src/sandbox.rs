//! `PathCapability`: allowlist-checked path resolution.
//!
//! `resolve_allowed` is the only legal way a tool obtains a filesystem
//! path. Resolution is relative to the base directory, canonicalized, then
//! checked against the allowed roots and the non-overridable hard-block
//! names.

use std::path::{Component, Path, PathBuf};

use super::ToolError;

/// Names a capability refuses even when the allowlist would permit them.
const HARD_BLOCKED_NAMES: &[&str] = &[".git", ".env", "node_modules", ".ssh"];

/// Whether resolution is for reading or for creating/overwriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

/// Filesystem capability bound to `{base_dir, allow_paths}`.
#[derive(Debug, Clone)]
pub struct PathCapability {
    base_dir: PathBuf,
    allow_roots: Vec<PathBuf>,
}

impl PathCapability {
    /// Build the capability. `base_dir` must exist; allow roots are
    /// interpreted relative to it and canonicalized when present on disk.
    pub fn new(base_dir: &Path, allow_paths: &[String]) -> Result<Self, ToolError> {
        let base_dir = std::fs::canonicalize(base_dir).map_err(|e| {
            ToolError::failed(format!(
                "base directory {} does not resolve: {e}",
                base_dir.display()
            ))
        })?;

        let mut allow_roots = Vec::new();
        for raw in allow_paths {
            let trimmed = raw.trim_matches('/').trim_start_matches("./");
            let joined = if trimmed.is_empty() {
                base_dir.clone()
            } else {
                base_dir.join(trimmed)
            };
            let root = std::fs::canonicalize(&joined).unwrap_or(joined);
            allow_roots.push(root);
        }

        Ok(Self {
            base_dir,
            allow_roots,
        })
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve a user-supplied path and check it against policy.
    pub fn resolve_allowed(&self, user_path: &str, mode: AccessMode) -> Result<PathBuf, ToolError> {
        if user_path.trim().is_empty() {
            return Err(ToolError::bad_args("path must not be empty"));
        }

        let input = Path::new(user_path);
        if input.is_absolute() {
            return Err(ToolError::PathTraversal(format!(
                "absolute paths are not allowed: {user_path}"
            )));
        }
        if input
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(ToolError::PathTraversal(format!(
                "path may not contain '..' segments: {user_path}"
            )));
        }

        let joined = self.base_dir.join(input);
        let canonical = match mode {
            AccessMode::Read => canonicalize_existing(&joined)?,
            AccessMode::Write => canonicalize_for_create(&joined)?,
        };

        if !canonical.starts_with(&self.base_dir) {
            return Err(ToolError::PathAllowlist(format!(
                "path escapes the base directory: {user_path}"
            )));
        }

        if let Some(name) = hard_blocked_component(&canonical) {
            return Err(ToolError::PathAllowlist(format!(
                "path touches blocked name '{name}': {user_path}"
            )));
        }

        if !self
            .allow_roots
            .iter()
            .any(|root| canonical.starts_with(root))
        {
            return Err(ToolError::PathAllowlist(format!(
                "path is outside the allowed roots: {user_path}"
            )));
        }

        Ok(canonical)
    }
}

/// First path component matching a hard-blocked name, if any. `.env.*`
/// variants count as `.env`.
fn hard_blocked_component(path: &Path) -> Option<&'static str> {
    for component in path.components() {
        let Component::Normal(name) = component else {
            continue;
        };
        let name = name.to_string_lossy();
        for blocked in HARD_BLOCKED_NAMES {
            if name.as_ref() == *blocked {
                return Some(blocked);
            }
        }
        if name.starts_with(".env.") {
            return Some(".env");
        }
    }
    None
}

/// Canonicalize a path that should exist, or whose parent must exist.
fn canonicalize_existing(resolved: &Path) -> Result<PathBuf, ToolError> {
    if resolved.exists() {
        return std::fs::canonicalize(resolved)
            .map_err(|e| ToolError::failed(format!("cannot resolve {}: {e}", resolved.display())));
    }
    let parent = resolved
        .parent()
        .ok_or_else(|| ToolError::bad_args("path has no parent directory"))?;
    let parent_canon = std::fs::canonicalize(parent).map_err(|_| {
        ToolError::failed(format!("no such file or directory: {}", resolved.display()))
    })?;
    Ok(parent_canon.join(resolved.file_name().unwrap_or_default()))
}

/// Canonicalize for creation: walk up to the nearest existing ancestor,
/// canonicalize it, then rejoin the non-existent tail.
fn canonicalize_for_create(resolved: &Path) -> Result<PathBuf, ToolError> {
    if resolved.exists() {
        return std::fs::canonicalize(resolved)
            .map_err(|e| ToolError::failed(format!("cannot resolve {}: {e}", resolved.display())));
    }

    let mut existing_ancestor = resolved.parent();
    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
    if let Some(file_name) = resolved.file_name() {
        tail.push(file_name);
    }

    while let Some(ancestor) = existing_ancestor {
        if ancestor.exists() {
            break;
        }
        if let Some(dir_name) = ancestor.file_name() {
            tail.push(dir_name);
        }
        existing_ancestor = ancestor.parent();
    }

    let existing = existing_ancestor
        .ok_or_else(|| ToolError::failed(format!("cannot resolve {}", resolved.display())))?;
    let canon_existing = std::fs::canonicalize(existing)
        .map_err(|e| ToolError::failed(format!("cannot resolve {}: {e}", existing.display())))?;

    let mut result = canon_existing;
    for part in tail.into_iter().rev() {
        result = result.join(part);
    }
    Ok(result)
}
