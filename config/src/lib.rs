//! Configuration loading and resolution.
//!
//! A `config.toml` plus three environment overrides resolve into a single
//! [`ResolvedConfig`] at startup; every component receives that value and
//! nothing re-reads the environment afterwards.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use steward_types::PermissionSet;
use steward_types::agent::AgentSpec;

/// Environment variable overriding the data directory.
pub const ENV_DATA_DIR: &str = "ASSISTANT_DATA_DIR";
/// Environment variable overriding the config directory.
pub const ENV_CONFIG_DIR: &str = "ASSISTANT_CONFIG_DIR";
/// Environment variable overriding the permissions file path.
pub const ENV_PERMISSIONS_PATH: &str = "ASSISTANT_PERMISSIONS_PATH";

const CONFIG_FILE_NAME: &str = "config.toml";
const PERMISSIONS_FILE_NAME: &str = "permissions.json";

const DEFAULT_HISTORY_LIMIT: usize = 20;
const DEFAULT_MAX_READ_BYTES: usize = 1024 * 1024;
const DEFAULT_MAX_WRITE_BYTES: usize = 1024 * 1024;
const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;
const DEFAULT_MAX_FETCH_BYTES: usize = 1024 * 1024;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 10;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path}: {message}")]
    Parse { path: String, message: String },
    #[error("base directory {path} does not resolve: {source}")]
    BadBaseDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Absolute paths of the storage files under the base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub memory: PathBuf,
    pub tasks: PathBuf,
    pub reminders: PathBuf,
    pub audit: PathBuf,
    pub command_log: PathBuf,
}

impl StoragePaths {
    fn under(base: &Path) -> Self {
        Self {
            memory: base.join("memory.json"),
            tasks: base.join("tasks.jsonl"),
            reminders: base.join("reminders.jsonl"),
            audit: base.join("audit.jsonl"),
            command_log: base.join("command_log.jsonl"),
        }
    }
}

/// Byte and time limits applied to tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecLimits {
    pub max_read_bytes: usize,
    pub max_write_bytes: usize,
    pub max_output_bytes: usize,
    pub max_fetch_bytes: usize,
    pub command_timeout: Duration,
    pub fetch_timeout: Duration,
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self {
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
            max_write_bytes: DEFAULT_MAX_WRITE_BYTES,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_fetch_bytes: DEFAULT_MAX_FETCH_BYTES,
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

/// Runtime configuration after defaulting. Built once at startup, shared
/// read-only.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_dir: PathBuf,
    pub storage: StoragePaths,
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub history_limit: usize,
    pub limits: ExecLimits,
    pub agents: Vec<AgentSpec>,
}

/// On-disk shape of `config.toml`. Everything is optional; defaults fill
/// the gaps.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub base_dir: Option<String>,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub model: Option<String>,
    pub history_limit: Option<usize>,
    #[serde(default)]
    pub limits: LimitsSection,
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitsSection {
    pub max_read_bytes: Option<usize>,
    pub max_write_bytes: Option<usize>,
    pub max_output_bytes: Option<usize>,
    pub max_fetch_bytes: Option<usize>,
    pub command_timeout_secs: Option<u64>,
    pub fetch_timeout_secs: Option<u64>,
}

impl ConfigFile {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };
        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Load config, applying `ASSISTANT_*` environment overrides.
pub fn load() -> Result<ResolvedConfig, ConfigError> {
    let env = |key: &str| std::env::var(key).ok();
    load_with_env(&env)
}

/// Same as [`load`], but with an injectable environment lookup so the
/// resolution order is testable without mutating process state.
pub fn load_with_env(env: &dyn Fn(&str) -> Option<String>) -> Result<ResolvedConfig, ConfigError> {
    let config_dir = env(ENV_CONFIG_DIR).map_or_else(|| PathBuf::from("."), PathBuf::from);
    let file = ConfigFile::read(&config_dir.join(CONFIG_FILE_NAME))?;
    resolve(file, env)
}

/// Turn a parsed config file plus environment into a [`ResolvedConfig`].
pub fn resolve(
    file: ConfigFile,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig, ConfigError> {
    let base_raw = env(ENV_DATA_DIR)
        .or(file.base_dir)
        .unwrap_or_else(|| ".".to_string());
    std::fs::create_dir_all(&base_raw).map_err(|e| ConfigError::BadBaseDir {
        path: base_raw.clone(),
        source: e,
    })?;
    let base_dir = std::fs::canonicalize(&base_raw).map_err(|e| ConfigError::BadBaseDir {
        path: base_raw.clone(),
        source: e,
    })?;

    let limits = ExecLimits {
        max_read_bytes: file.limits.max_read_bytes.unwrap_or(DEFAULT_MAX_READ_BYTES),
        max_write_bytes: file
            .limits
            .max_write_bytes
            .unwrap_or(DEFAULT_MAX_WRITE_BYTES),
        max_output_bytes: file
            .limits
            .max_output_bytes
            .unwrap_or(DEFAULT_MAX_OUTPUT_BYTES),
        max_fetch_bytes: file
            .limits
            .max_fetch_bytes
            .unwrap_or(DEFAULT_MAX_FETCH_BYTES),
        command_timeout: Duration::from_secs(
            file.limits
                .command_timeout_secs
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS),
        ),
        fetch_timeout: Duration::from_secs(
            file.limits
                .fetch_timeout_secs
                .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
        ),
    };

    Ok(ResolvedConfig {
        storage: StoragePaths::under(&base_dir),
        base_dir,
        api_key: file.api_key,
        api_base: file
            .api_base
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        model: file.model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
        history_limit: file.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
        limits,
        agents: file.agents,
    })
}

/// Resolve the permissions file path: env override first, then the config
/// directory.
#[must_use]
pub fn permissions_path(env: &dyn Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(p) = env(ENV_PERMISSIONS_PATH) {
        return PathBuf::from(p);
    }
    let config_dir = env(ENV_CONFIG_DIR).map_or_else(|| PathBuf::from("."), PathBuf::from);
    config_dir.join(PERMISSIONS_FILE_NAME)
}

/// Load `permissions.json`. A missing file yields the default policy; a
/// malformed file is a startup error, not a silent fallback.
pub fn load_permissions(path: &Path) -> Result<PermissionSet, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No permissions file, using defaults");
            return Ok(PermissionSet::default());
        }
        Err(e) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source: e,
            });
        }
    };
    serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{ConfigFile, load_permissions, permissions_path, resolve};

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_fill_an_empty_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path().to_string_lossy().into_owned();
        let file = ConfigFile {
            base_dir: Some(base),
            ..ConfigFile::default()
        };
        let cfg = resolve(file, &no_env).expect("resolve");
        assert_eq!(cfg.history_limit, 20);
        assert_eq!(cfg.limits.max_output_bytes, 1024 * 1024);
        assert!(cfg.storage.memory.ends_with("memory.json"));
        assert!(cfg.base_dir.is_absolute());
    }

    #[test]
    fn data_dir_env_overrides_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let from_env = dir.path().join("env-data");
        let env = |key: &str| {
            (key == super::ENV_DATA_DIR).then(|| from_env.to_string_lossy().into_owned())
        };
        let file = ConfigFile {
            base_dir: Some("/ignored".to_string()),
            ..ConfigFile::default()
        };
        let cfg = resolve(file, &env).expect("resolve");
        assert_eq!(cfg.base_dir, fs::canonicalize(&from_env).expect("canon"));
    }

    #[test]
    fn permissions_path_prefers_env_override() {
        let env = |key: &str| {
            (key == super::ENV_PERMISSIONS_PATH).then(|| "/tmp/perms.json".to_string())
        };
        assert_eq!(
            permissions_path(&env),
            std::path::PathBuf::from("/tmp/perms.json")
        );
        assert!(permissions_path(&no_env).ends_with("permissions.json"));
    }

    #[test]
    fn missing_permissions_file_yields_default_policy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let perms = load_permissions(&dir.path().join("permissions.json")).expect("load");
        assert!(perms.command_rule("ls").is_some());
    }

    #[test]
    fn malformed_permissions_file_is_a_startup_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("permissions.json");
        fs::write(&path, b"{ nope").expect("seed");
        assert!(load_permissions(&path).is_err());
    }

    #[test]
    fn permissions_file_contents_are_honored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("permissions.json");
        fs::write(
            &path,
            br#"{"allow_paths": ["notes/"], "deny_tools": ["run_command"], "require_confirmation_for": ["write_file"]}"#,
        )
        .expect("seed");
        let perms = load_permissions(&path).expect("load");
        assert_eq!(perms.allow_paths, vec!["notes/".to_string()]);
        assert!(perms.denies("run_command"));
        assert!(perms.requires_confirmation("write_file"));
    }

    #[test]
    fn config_file_parses_toml_sections() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            br#"
model = "gpt-4o"
history_limit = 6

[limits]
command_timeout_secs = 3

[[agents]]
name = "coder"
tools = ["write_file", "read_file"]
"#,
        )
        .expect("seed");
        let file = ConfigFile::read(&path).expect("read");
        assert_eq!(file.model.as_deref(), Some("gpt-4o"));
        assert_eq!(file.limits.command_timeout_secs, Some(3));
        assert_eq!(file.agents.len(), 1);
        assert_eq!(file.agents[0].name, "coder");
    }
}
