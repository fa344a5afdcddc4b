//! Layered settings: flags and environment, then the config file, then defaults.

use crate::cli::GlobalArgs;
use crate::engine::{DEFAULT_TIMEOUT, SUCCESS_MARKER};
use crate::paths::AppPaths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PYTHON: &str = "python";

/// Optional on-disk settings. Every key may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub root: Option<PathBuf>,
    pub python: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
    pub success_marker: Option<String>,
}

/// Effective settings for one process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub paths: AppPaths,
    pub python: String,
    pub timeout: Duration,
    pub success_marker: String,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hospital-scheduler").join("config.json"))
}

/// An explicit path must exist; the default location is optional.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(FileConfig::default()),
        },
    };
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "config file loaded");
    Ok(cfg)
}

/// Build a `SessionConfig` from CLI arguments and the file layer.
pub fn build_config(args: &GlobalArgs, file: &FileConfig) -> SessionConfig {
    let paths = match args.root.as_ref().or(file.root.as_ref()) {
        Some(root) => AppPaths::new(root),
        None => AppPaths::discover(),
    };
    SessionConfig {
        paths,
        python: args
            .python
            .clone()
            .or_else(|| file.python.clone())
            .unwrap_or_else(|| DEFAULT_PYTHON.to_string()),
        timeout: args
            .timeout
            .map(Duration::from)
            .or(file.timeout)
            .unwrap_or(DEFAULT_TIMEOUT),
        success_marker: file
            .success_marker
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| SUCCESS_MARKER.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> GlobalArgs {
        GlobalArgs {
            root: None,
            config: None,
            python: None,
            timeout: None,
            verbose: false,
        }
    }

    #[test]
    fn file_layer_fills_missing_flags() {
        let file: FileConfig = serde_json::from_str(
            r#"{"root": "/opt/hs", "python": "python3", "timeout": "90s", "success_marker": "DONE"}"#,
        )
        .unwrap();
        let cfg = build_config(&args(), &file);
        assert_eq!(cfg.paths.root(), Path::new("/opt/hs"));
        assert_eq!(cfg.python, "python3");
        assert_eq!(cfg.timeout, Duration::from_secs(90));
        assert_eq!(cfg.success_marker, "DONE");
    }

    #[test]
    fn flags_win_over_file() {
        let file = FileConfig {
            root: Some("/opt/hs".into()),
            python: Some("python3".into()),
            timeout: Some(Duration::from_secs(90)),
            success_marker: None,
        };
        let mut a = args();
        a.root = Some("/tmp/other".into());
        a.python = Some("/usr/bin/python3.12".into());
        a.timeout = Some("5s".parse().unwrap());
        let cfg = build_config(&a, &file);
        assert_eq!(cfg.paths.root(), Path::new("/tmp/other"));
        assert_eq!(cfg.python, "/usr/bin/python3.12");
        assert_eq!(cfg.timeout, Duration::from_secs(5));
        assert_eq!(cfg.success_marker, SUCCESS_MARKER);
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let mut a = args();
        a.root = Some("/r".into());
        let cfg = build_config(&a, &FileConfig::default());
        assert_eq!(cfg.python, DEFAULT_PYTHON);
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn explicit_config_must_exist_and_parse() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_file_config(Some(&dir.path().join("missing.json"))).is_err());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"colour": "blue"}"#).unwrap();
        assert!(load_file_config(Some(&bad)).is_err());

        let good = dir.path().join("good.json");
        std::fs::write(&good, r#"{"timeout": "2m"}"#).unwrap();
        let cfg = load_file_config(Some(&good)).unwrap();
        assert_eq!(cfg.timeout, Some(Duration::from_secs(120)));
        assert!(cfg.root.is_none());
    }
}
