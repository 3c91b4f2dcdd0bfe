use crate::adb::AdbBackend;
use crate::error::{Error, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "hmperf.toml";

/// Run settings.
///
/// Every field has a default matching the deployed perf service,
/// so an absent or partial file is fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub upload_url: String,
    pub pubkey_url: String,
    /// Local files are resolved against this directory.
    pub work_dir: PathBuf,
    pub token_file: PathBuf,
    pub pubkey_file: PathBuf,
    /// Name of the collector's result file, both on the device and locally.
    pub artifact: String,
    /// Device directory holding the collector, its key and its output.
    pub remote_dir: String,
    /// Collector binary, pushed from `work_dir`.
    pub collector: String,
    pub backend: AdbBackend,
    pub start_delay_secs: u64,
    pub http_timeout_secs: u64,
    /// Defaults to the token, as the perf service expects.
    pub tester_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_url: "http://perf.haimacloud.com/api/uploaddatasource/".into(),
            pubkey_url: "http://perf.haimacloud.com/api/getpubkey/".into(),
            work_dir: PathBuf::from("."),
            token_file: PathBuf::from("token.txt"),
            pubkey_file: PathBuf::from("pub.pem"),
            artifact: "out.hmp".into(),
            remote_dir: "/data/local/tmp".into(),
            collector: "romstat".into(),
            backend: AdbBackend::default(),
            start_delay_secs: 2,
            http_timeout_secs: 60,
            tester_name: None,
        }
    }
}

impl Config {
    /// Load from `explicit` if given (it must exist),
    /// else from the first of `./hmperf.toml` and `<config_dir>/hmperf/config.toml`,
    /// else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let candidates = [
            Some(PathBuf::from(CONFIG_FILE_NAME)),
            dirs::config_dir().map(|d| d.join("hmperf").join("config.toml")),
        ];
        for path in candidates.into_iter().flatten() {
            if path.is_file() {
                return Self::from_file(&path);
            }
        }
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config = Self::parse(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    fn local(&self, p: &Path) -> PathBuf {
        self.work_dir.join(p)
    }

    #[must_use]
    pub fn token_path(&self) -> PathBuf {
        self.local(&self.token_file)
    }

    #[must_use]
    pub fn pubkey_path(&self) -> PathBuf {
        self.local(&self.pubkey_file)
    }

    #[must_use]
    pub fn artifact_path(&self) -> PathBuf {
        self.local(Path::new(&self.artifact))
    }

    #[must_use]
    pub fn collector_path(&self) -> PathBuf {
        self.local(Path::new(&self.collector))
    }

    /// Full device path of a file in [`Self::remote_dir`].
    #[must_use]
    pub fn remote(&self, name: &str) -> String {
        format!("{}/{name}", self.remote_dir.trim_end_matches('/'))
    }

    /// Device path of the key file, under the same name as locally.
    #[must_use]
    pub fn remote_pubkey(&self) -> String {
        let name = self
            .pubkey_file
            .file_name()
            .map_or_else(|| "pub.pem".into(), |n| n.to_string_lossy());
        self.remote(&name)
    }

    #[must_use]
    pub const fn start_delay(&self) -> Duration {
        Duration::from_secs(self.start_delay_secs)
    }

    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_defaults() {
        assert_eq!(Config::parse("").ok(), Some(Config::default()));
    }

    #[test]
    fn partial_override() {
        let config = Config::parse(
            r#"
            upload_url = "http://127.0.0.1:8000/api/uploaddatasource/"
            backend = "system"
            tester_name = "qa-bot"
            "#,
        )
        .expect("valid config");
        assert_eq!(config.upload_url, "http://127.0.0.1:8000/api/uploaddatasource/");
        assert_eq!(config.backend, AdbBackend::System);
        assert_eq!(config.tester_name.as_deref(), Some("qa-bot"));
        assert_eq!(config.artifact, "out.hmp");
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(Config::parse("upload = 1").is_err());
    }

    #[test]
    fn device_paths() {
        let config = Config {
            remote_dir: "/data/local/tmp/".into(),
            ..Config::default()
        };
        assert_eq!(config.remote("out.hmp"), "/data/local/tmp/out.hmp");
        assert_eq!(config.remote_pubkey(), "/data/local/tmp/pub.pem");
    }

    #[test]
    fn local_paths_are_under_work_dir() {
        let config = Config {
            work_dir: PathBuf::from("/tmp/run"),
            ..Config::default()
        };
        assert_eq!(config.token_path(), Path::new("/tmp/run/token.txt"));
        assert_eq!(config.artifact_path(), Path::new("/tmp/run/out.hmp"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/hmperf.toml")))
            .expect_err("file does not exist");
        assert!(matches!(err, Error::Config(_)));
    }
}
