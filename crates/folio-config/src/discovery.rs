//! Where folio looks for configuration.
//!
//! Two files are read, each optional: the user file
//! (`$FOLIO_CONFIG_DIR/config.toml`, else `~/.config/folio/config.toml`)
//! and `folio.toml` in the working directory. The project file wins section
//! by section. A file that cannot be read or parsed is skipped with a
//! warning; it never stops folio from starting. CLI flags are applied on
//! top by the binary.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::{ConfigError, FolioConfig, Result};

const PROJECT_FILE: &str = "folio.toml";
const USER_FILE: &str = "config.toml";
const CONFIG_DIR_ENV: &str = "FOLIO_CONFIG_DIR";

/// Which file a source is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    User,
    Project,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::User => "user",
            Self::Project => "project",
        })
    }
}

/// What happened when a layer was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Loaded,
    Missing,
    /// Present but skipped; holds the reason.
    Invalid(String),
}

/// One file folio looked at.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub layer: ConfigLayer,
    pub path: PathBuf,
    pub status: SourceStatus,
}

impl ConfigSource {
    pub fn is_loaded(&self) -> bool {
        self.status == SourceStatus::Loaded
    }
}

/// Merged configuration plus the files it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: FolioConfig,
    /// Lowest precedence first.
    pub sources: Vec<ConfigSource>,
}

impl LoadedConfig {
    /// Paths that contributed to `config`.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.is_loaded())
            .map(|s| s.path.as_path())
            .collect()
    }

    /// One message per skipped file.
    pub fn warnings(&self) -> Vec<String> {
        self.sources
            .iter()
            .filter_map(|s| match &s.status {
                SourceStatus::Invalid(reason) => Some(format!(
                    "ignoring {} config {}: {reason}",
                    s.layer,
                    s.path.display()
                )),
                _ => None,
            })
            .collect()
    }
}

/// Read the user and project files, the project file from `project_dir`
/// or the working directory.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Like [`load_config`], reading the user file from `config_dir` when given.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let user = config_dir
        .map(|dir| dir.join(USER_FILE))
        .or_else(user_config_path);
    let project = project_dir.map_or_else(|| PathBuf::from(PROJECT_FILE), |d| d.join(PROJECT_FILE));

    let candidates = user
        .map(|path| (ConfigLayer::User, path))
        .into_iter()
        .chain([(ConfigLayer::Project, project)]);

    let mut config = FolioConfig::new();
    let mut sources = Vec::new();
    for (layer, path) in candidates {
        let status = match read_layer(&path) {
            Ok(Some(found)) => {
                config.merge(found);
                SourceStatus::Loaded
            }
            Ok(None) => SourceStatus::Missing,
            Err(e) => SourceStatus::Invalid(e.to_string()),
        };
        sources.push(ConfigSource {
            layer,
            path,
            status,
        });
    }

    Ok(LoadedConfig { config, sources })
}

/// Parse one file.
pub fn load_config_file(path: &Path) -> Result<FolioConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    FolioConfig::from_toml(&contents)
}

fn read_layer(path: &Path) -> Result<Option<FolioConfig>> {
    if path.is_file() {
        load_config_file(path).map(Some)
    } else {
        Ok(None)
    }
}

/// The user file, if a config directory can be resolved.
pub fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(USER_FILE))
}

/// folio's per-user directory. A non-empty `FOLIO_CONFIG_DIR` wins.
pub fn config_dir() -> Option<PathBuf> {
    match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|d| d.join("folio")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::AuthMode;

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[auth]\nmode = \"deferred\"\n").unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.auth().mode, AuthMode::Deferred);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_no_files() {
        let dir = TempDir::new().unwrap();
        let empty_config_dir = TempDir::new().unwrap();
        let loaded =
            load_config_with_options(Some(dir.path()), Some(empty_config_dir.path())).unwrap();
        assert!(loaded.config.server.is_none());
        assert!(loaded.loaded_from().is_empty());
        assert_eq!(loaded.sources.len(), 2);
    }

    #[test]
    fn test_load_config_layered_merge() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();

        fs::write(
            user_dir.path().join("config.toml"),
            r#"
[server]
url = "http://user.example/mcp/stream"

[auth]
max_retries = 2
"#,
        )
        .unwrap();

        fs::write(
            project_dir.path().join("folio.toml"),
            r#"
[server]
url = "http://project.example/mcp/stream"
"#,
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path())).unwrap();

        assert_eq!(loaded.config.server().url, "http://project.example/mcp/stream");
        assert_eq!(loaded.config.auth().max_retries, 2);
        assert_eq!(loaded.loaded_from().len(), 2);
        assert!(loaded.warnings().is_empty());
        assert_eq!(loaded.sources[0].layer, ConfigLayer::User);
        assert_eq!(loaded.sources[1].layer, ConfigLayer::Project);
    }

    #[test]
    fn test_malformed_config_warns_but_continues() {
        let dir = TempDir::new().unwrap();
        let empty_config_dir = TempDir::new().unwrap();
        fs::write(dir.path().join("folio.toml"), "not valid toml {{{{").unwrap();

        let loaded =
            load_config_with_options(Some(dir.path()), Some(empty_config_dir.path())).unwrap();
        let warnings = loaded.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("ignoring project config"));
        assert!(matches!(loaded.sources[1].status, SourceStatus::Invalid(_)));
        assert_eq!(loaded.sources[0].status, SourceStatus::Missing);
        assert!(loaded.loaded_from().is_empty());
    }

    #[test]
    fn test_loaded_from_tracks_sources() {
        let dir = TempDir::new().unwrap();
        let empty_config_dir = TempDir::new().unwrap();
        fs::write(dir.path().join("folio.toml"), "[portfolio]\nprobe = \"net_worth\"\n").unwrap();

        let loaded =
            load_config_with_options(Some(dir.path()), Some(empty_config_dir.path())).unwrap();
        let loaded_paths = loaded.loaded_from();
        assert!(loaded_paths.iter().any(|p| p.ends_with("folio.toml")));
    }
}
