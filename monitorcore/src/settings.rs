//! Layered settings.
//!
//! Sources, lowest priority first:
//!
//! 1. built-in defaults
//! 2. a TOML file (`monitorcore.toml` in the working directory, or an explicit path)
//! 3. environment variables such as `MONITORCORE_WEB__LISTEN=127.0.0.1:8080`
//!
//! Front ends apply their command-line flags on top of the loaded value.

use std::env::consts::EXE_SUFFIX;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::debug;

use crate::error::SettingsError;
use crate::pipeline::PipelineConfig;

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "monitorcore.toml";

const ENV_PREFIX: &str = "MONITORCORE";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub producer: ProducerSettings,
    pub pipeline: PipelineSettings,
    pub web: WebSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProducerSettings {
    /// Explicit executable. Takes precedence over the search list.
    pub path: Option<PathBuf>,
    /// Candidates tried in order when no explicit path is set.
    pub search_paths: Vec<PathBuf>,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            path: None,
            search_paths: default_search_paths(),
        }
    }
}

/// Where a build of the producer usually ends up.
fn default_search_paths() -> Vec<PathBuf> {
    let exe = format!("monitor{}", EXE_SUFFIX);
    let build = Path::new("cpp").join("build");
    vec![
        build.join(&exe),
        build.join("Debug").join(&exe),
        build.join("Release").join(&exe),
        build.join("x64").join("Debug").join(&exe),
        build.join("x64").join("Release").join(&exe),
        PathBuf::from(".").join(&exe),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub subscriber_queue: usize,
    pub decode_log_limit: usize,
    pub max_frame_bytes: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let defaults = PipelineConfig::default();
        Self {
            subscriber_queue: crate::broadcaster::DEFAULT_QUEUE_CAPACITY,
            decode_log_limit: defaults.decode_log_limit,
            max_frame_bytes: defaults.max_frame_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WebSettings {
    pub listen: SocketAddr,
    /// Extra assets served under `/static`.
    pub static_dir: Option<PathBuf>,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 5000)),
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from `monitorcore.toml` if it exists.
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("producer.search_paths")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        debug!(?settings, "settings loaded");
        Ok(settings)
    }

    /// Resolve the producer executable relative to the working directory.
    ///
    /// The returned path is absolute.
    pub fn locate_producer(&self) -> Result<PathBuf, SettingsError> {
        self.locate_producer_in(Path::new(""))
    }

    /// Resolve the producer executable with relative paths joined to `base`.
    pub fn locate_producer_in(&self, base: &Path) -> Result<PathBuf, SettingsError> {
        if let Some(path) = &self.producer.path {
            let path = resolve(base, path);
            if path.is_file() {
                return Ok(path);
            }
            return Err(SettingsError::MissingProducer(path));
        }

        let searched: Vec<PathBuf> = self
            .producer
            .search_paths
            .iter()
            .map(|candidate| resolve(base, candidate))
            .collect();

        match searched.iter().find(|candidate| candidate.is_file()) {
            Some(found) => Ok(found.clone()),
            None => Err(SettingsError::ProducerNotFound { searched }),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_frame_bytes: self.pipeline.max_frame_bytes,
            decode_log_limit: self.pipeline.decode_log_limit,
        }
    }
}

/// Join `path` to `base` and make it absolute.
fn resolve(base: &Path, path: &Path) -> PathBuf {
    let joined = base.join(path);
    std::path::absolute(&joined).unwrap_or(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.pipeline.subscriber_queue, 16);
        assert_eq!(settings.pipeline.decode_log_limit, 5);
        assert_eq!(settings.pipeline.max_frame_bytes, 4 * 1024 * 1024);
        assert_eq!(settings.web.listen.port(), 5000);
        assert_eq!(settings.log.level, "info");
        assert!(settings.producer.path.is_none());
        assert_eq!(settings.producer.search_paths.len(), 6);
    }

    #[test]
    fn test_load_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[producer]
path = "/opt/monitor/bin/monitor"

[pipeline]
decode_log_limit = 2

[web]
listen = "127.0.0.1:8080"
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(
            settings.producer.path.as_deref(),
            Some(Path::new("/opt/monitor/bin/monitor"))
        );
        assert_eq!(settings.pipeline.decode_log_limit, 2);
        // Untouched keys keep their defaults.
        assert_eq!(settings.pipeline.subscriber_queue, 16);
        assert_eq!(settings.web.listen, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(settings.pipeline_config().decode_log_limit, 2);
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Settings::load(Some(Path::new("/definitely/missing.toml"))).unwrap_err();
        assert!(matches!(err, SettingsError::Load(_)));
    }

    #[test]
    fn test_load_rejects_bad_values() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[web]\nlisten = \"not an address\"").unwrap();
        assert!(Settings::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_locate_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b/monitor"), "").unwrap();
        fs::create_dir_all(dir.path().join("c")).unwrap();
        fs::write(dir.path().join("c/monitor"), "").unwrap();

        let mut settings = Settings::default();
        settings.producer.search_paths = vec!["a/monitor".into(), "b/monitor".into(), "c/monitor".into()];

        let found = settings.locate_producer_in(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("b/monitor"));
    }

    #[test]
    fn test_locate_reports_searched_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.producer.search_paths = vec!["a/monitor".into(), "b/monitor".into()];

        match settings.locate_producer_in(dir.path()).unwrap_err() {
            SettingsError::ProducerNotFound { searched } => {
                assert_eq!(
                    searched,
                    vec![dir.path().join("a/monitor"), dir.path().join("b/monitor")]
                );
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_located_path_is_absolute() {
        // Unit tests run with the crate directory as working directory.
        let mut settings = Settings::default();
        settings.producer.path = Some(PathBuf::from("Cargo.toml"));
        let found = settings.locate_producer().unwrap();
        assert!(found.is_absolute());
        assert_eq!(found, std::env::current_dir().unwrap().join("Cargo.toml"));

        settings.producer.path = None;
        settings.producer.search_paths = vec!["missing/monitor".into(), "Cargo.toml".into()];
        assert!(settings.locate_producer().unwrap().is_absolute());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("monitor"), "").unwrap();

        let mut settings = Settings::default();
        settings.producer.path = Some(dir.path().join("monitor"));
        assert_eq!(settings.locate_producer().unwrap(), dir.path().join("monitor"));

        settings.producer.path = Some(dir.path().join("missing"));
        assert!(matches!(
            settings.locate_producer().unwrap_err(),
            SettingsError::MissingProducer(_)
        ));
    }
}
