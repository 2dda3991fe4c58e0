//! Layered configuration.
//!
//! Precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (`PLCSYNC_*`)
//! 3. Project config (`plcsync.json` beside the project, or `--config`)
//! 4. Defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SyncError;
use crate::rename::MatcherKind;

/// File name looked up next to the project when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "plcsync.json";

pub const ENV_RENAME_MATCHER: &str = "PLCSYNC_RENAME_MATCHER";
pub const ENV_PROPAGATE: &str = "PLCSYNC_PROPAGATE";
pub const ENV_TREE_MAX_DEPTH: &str = "PLCSYNC_TREE_MAX_DEPTH";

/// Default nesting backstop for the variable tree.
pub const DEFAULT_TREE_MAX_DEPTH: usize = 32;

// ============================================================================
// Configuration Sources
// ============================================================================

/// Configuration value source (for precedence tracking).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigSource {
    /// Built-in default value.
    Default = 0,
    /// From the project config file.
    ProjectConfig = 1,
    /// From environment variable.
    EnvVar = 2,
    /// From CLI flag (highest precedence).
    CliFlag = 3,
}

/// A configuration value with its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        ConfigValue { value, source }
    }

    /// Merge with another value, preferring higher precedence.
    pub fn merge(self, other: Self) -> Self {
        if other.source >= self.source {
            other
        } else {
            self
        }
    }
}

// ============================================================================
// Project Config File
// ============================================================================

/// Contents of `plcsync.json`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub rename_matcher: Option<MatcherKind>,
    #[serde(default)]
    pub propagate_when_non_interactive: Option<bool>,
    #[serde(default)]
    pub tree_max_depth: Option<usize>,
}

impl ProjectConfig {
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let text = std::fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| SyncError::Config {
            message: format!("{}: {}", path.display(), e),
        })
    }
}

// ============================================================================
// Configuration Resolution
// ============================================================================

/// Resolved configuration with precedence information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub rename_matcher: ConfigValue<MatcherKind>,
    /// Answer used when the rename prompt cannot be shown.
    pub propagate_when_non_interactive: ConfigValue<bool>,
    pub tree_max_depth: ConfigValue<usize>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        ResolvedConfig {
            rename_matcher: ConfigValue::new(MatcherKind::FirstMatch, ConfigSource::Default),
            propagate_when_non_interactive: ConfigValue::new(true, ConfigSource::Default),
            tree_max_depth: ConfigValue::new(DEFAULT_TREE_MAX_DEPTH, ConfigSource::Default),
        }
    }
}

/// CLI configuration overrides.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// --config flag.
    pub config_path: Option<PathBuf>,
    /// --matcher flag.
    pub rename_matcher: Option<MatcherKind>,
    /// --max-depth flag.
    pub tree_max_depth: Option<usize>,
}

impl ResolvedConfig {
    /// Resolve configuration from all sources, reading the process environment.
    pub fn resolve(project_dir: &Path, cli_overrides: &CliOverrides) -> Result<Self, SyncError> {
        Self::resolve_with_env(project_dir, cli_overrides, |key| std::env::var(key).ok())
    }

    /// Resolve configuration with an explicit environment lookup.
    pub fn resolve_with_env(
        project_dir: &Path,
        cli_overrides: &CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SyncError> {
        let mut config = ResolvedConfig::default();

        match &cli_overrides.config_path {
            Some(path) => config.apply_project_config(&ProjectConfig::load(path)?),
            None => {
                let path = project_dir.join(CONFIG_FILE_NAME);
                if path.exists() {
                    config.apply_project_config(&ProjectConfig::load(&path)?);
                }
            }
        }

        config.apply_env_vars(env)?;
        config.apply_cli_overrides(cli_overrides);

        debug!(
            matcher = %config.rename_matcher.value,
            propagate = config.propagate_when_non_interactive.value,
            max_depth = config.tree_max_depth.value,
            "resolved configuration"
        );
        Ok(config)
    }

    fn apply_project_config(&mut self, file: &ProjectConfig) {
        if let Some(matcher) = file.rename_matcher {
            self.rename_matcher = self
                .rename_matcher
                .clone()
                .merge(ConfigValue::new(matcher, ConfigSource::ProjectConfig));
        }
        if let Some(propagate) = file.propagate_when_non_interactive {
            self.propagate_when_non_interactive = self
                .propagate_when_non_interactive
                .clone()
                .merge(ConfigValue::new(propagate, ConfigSource::ProjectConfig));
        }
        if let Some(depth) = file.tree_max_depth {
            self.tree_max_depth = self
                .tree_max_depth
                .clone()
                .merge(ConfigValue::new(depth, ConfigSource::ProjectConfig));
        }
    }

    fn apply_env_vars(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), SyncError> {
        if let Some(raw) = env(ENV_RENAME_MATCHER) {
            let matcher = raw.parse::<MatcherKind>().map_err(|message| SyncError::Config {
                message: format!("{}: {}", ENV_RENAME_MATCHER, message),
            })?;
            self.rename_matcher = ConfigValue::new(matcher, ConfigSource::EnvVar);
        }

        if let Some(raw) = env(ENV_PROPAGATE) {
            let propagate = parse_bool(&raw).ok_or_else(|| SyncError::Config {
                message: format!("{}: expected true/false, got '{}'", ENV_PROPAGATE, raw),
            })?;
            self.propagate_when_non_interactive = ConfigValue::new(propagate, ConfigSource::EnvVar);
        }

        if let Some(raw) = env(ENV_TREE_MAX_DEPTH) {
            let depth = raw.trim().parse::<usize>().map_err(|e| SyncError::Config {
                message: format!("{}: {}", ENV_TREE_MAX_DEPTH, e),
            })?;
            self.tree_max_depth = ConfigValue::new(depth, ConfigSource::EnvVar);
        }
        Ok(())
    }

    fn apply_cli_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(matcher) = overrides.rename_matcher {
            self.rename_matcher = ConfigValue::new(matcher, ConfigSource::CliFlag);
        }
        if let Some(depth) = overrides.tree_max_depth {
            self.tree_max_depth = ConfigValue::new(depth, ConfigSource::CliFlag);
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResolvedConfig::resolve_with_env(dir.path(), &CliOverrides::default(), no_env)
            .unwrap();
        assert_eq!(config, ResolvedConfig::default());
        assert!(config.propagate_when_non_interactive.value);
        assert_eq!(config.tree_max_depth.value, 32);
    }

    #[test]
    fn project_file_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"renameMatcher": "unique", "treeMaxDepth": 8}"#,
        )
        .unwrap();
        let config = ResolvedConfig::resolve_with_env(dir.path(), &CliOverrides::default(), no_env)
            .unwrap();
        assert_eq!(config.rename_matcher.value, MatcherKind::Unique);
        assert_eq!(config.rename_matcher.source, ConfigSource::ProjectConfig);
        assert_eq!(config.tree_max_depth.value, 8);
        assert_eq!(
            config.propagate_when_non_interactive.source,
            ConfigSource::Default
        );
    }

    #[test]
    fn precedence_cli_over_env_over_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"renameMatcher": "unique", "propagateWhenNonInteractive": true}"#,
        )
        .unwrap();
        let env: HashMap<&str, &str> = [
            (ENV_RENAME_MATCHER, "off"),
            (ENV_PROPAGATE, "no"),
        ]
        .into_iter()
        .collect();
        let overrides = CliOverrides {
            rename_matcher: Some(MatcherKind::FirstMatch),
            ..Default::default()
        };
        let config = ResolvedConfig::resolve_with_env(dir.path(), &overrides, |k| {
            env.get(k).map(|v| v.to_string())
        })
        .unwrap();
        assert_eq!(config.rename_matcher.value, MatcherKind::FirstMatch);
        assert_eq!(config.rename_matcher.source, ConfigSource::CliFlag);
        assert!(!config.propagate_when_non_interactive.value);
        assert_eq!(
            config.propagate_when_non_interactive.source,
            ConfigSource::EnvVar
        );
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = CliOverrides {
            config_path: Some(dir.path().join("missing.json")),
            ..Default::default()
        };
        let err = ResolvedConfig::resolve_with_env(dir.path(), &overrides, no_env).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
    }

    #[test]
    fn unknown_keys_and_bad_env_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{"matcher": "off"}"#).unwrap();
        let err = ResolvedConfig::resolve_with_env(dir.path(), &CliOverrides::default(), no_env)
            .unwrap_err();
        assert!(matches!(err, SyncError::Config { .. }));

        let clean = tempfile::tempdir().unwrap();
        let err = ResolvedConfig::resolve_with_env(clean.path(), &CliOverrides::default(), |k| {
            (k == ENV_TREE_MAX_DEPTH).then(|| "deep".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains(ENV_TREE_MAX_DEPTH));
    }

    #[test]
    fn merge_prefers_higher_source() {
        let low = ConfigValue::new(1, ConfigSource::ProjectConfig);
        let high = ConfigValue::new(2, ConfigSource::EnvVar);
        assert_eq!(low.clone().merge(high.clone()).value, 2);
        assert_eq!(high.merge(low).value, 2);
    }
}
