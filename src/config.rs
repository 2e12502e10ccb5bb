use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{ExplorerError, Result};

/// Officials dataset (Répertoire National des Élus, mayors) on data.gouv.fr.
pub const DEFAULT_OFFICIALS_URL: &str =
    "https://www.data.gouv.fr/fr/datasets/r/2876a346-d50c-4911-934e-19ee07b0e503";
/// Communes with coordinates on data.gouv.fr.
pub const DEFAULT_TOWNS_URL: &str =
    "https://www.data.gouv.fr/fr/datasets/r/dbe8a621-a9c4-4bc3-9cae-be1699c5ff25";

pub const ENV_OFFICIALS_URL: &str = "RNE_OFFICIALS_URL";
pub const ENV_TOWNS_URL: &str = "RNE_TOWNS_URL";
pub const ENV_DATA_DIR: &str = "RNE_DATA_DIR";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "RNE_HTTP_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Whole-request timeout. `None` keeps the HTTP client default.
    pub timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// One remote CSV and the cache file it is stored in, relative to the data
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataSource {
    pub url: String,
    pub file: PathBuf,
}

/// Where the two datasets come from and where they are cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub officials_url: String,
    pub towns_url: String,
    pub data_dir: PathBuf,
    /// Cache file of the officials CSV, relative to `data_dir`.
    pub officials_file: PathBuf,
    /// Cache file of the towns CSV, relative to `data_dir`.
    pub towns_file: PathBuf,
    pub http: HttpSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            officials_url: DEFAULT_OFFICIALS_URL.to_string(),
            towns_url: DEFAULT_TOWNS_URL.to_string(),
            data_dir: PathBuf::from("data"),
            officials_file: PathBuf::from("elus.csv"),
            towns_file: PathBuf::from("communes.csv"),
            http: HttpSettings::default(),
        }
    }
}

impl Settings {
    /// Defaults, overlaid by the YAML file at `path` when given, then by the
    /// `RNE_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            ExplorerError::Config(format!("reading {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
            .map_err(|e| ExplorerError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| ExplorerError::Config(e.to_string()))
    }

    /// Overlay values from an environment lookup. Taking the lookup as a
    /// closure keeps tests away from the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_OFFICIALS_URL) {
            self.officials_url = url;
        }
        if let Some(url) = lookup(ENV_TOWNS_URL) {
            self.towns_url = url;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup(ENV_HTTP_TIMEOUT_SECS) {
            let secs = secs.trim().parse::<u64>().map_err(|e| {
                ExplorerError::Config(format!("{}={:?}: {}", ENV_HTTP_TIMEOUT_SECS, secs, e))
            })?;
            self.http.timeout_secs = Some(secs);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("officials_url", &self.officials_url),
            ("towns_url", &self.towns_url),
        ] {
            let url = Url::parse(value)
                .map_err(|e| ExplorerError::Config(format!("{} {:?}: {}", name, value, e)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ExplorerError::Config(format!(
                    "{} must be http(s), got {}",
                    name,
                    url.scheme()
                )));
            }
        }
        for (name, file) in [
            ("officials_file", &self.officials_file),
            ("towns_file", &self.towns_file),
        ] {
            if file.as_os_str().is_empty() || file.is_absolute() {
                return Err(ExplorerError::Config(format!(
                    "{} must be a relative path, got {:?}",
                    name, file
                )));
            }
        }
        debug!(settings = ?self, "settings resolved");
        Ok(())
    }

    pub fn officials_source(&self) -> DataSource {
        DataSource {
            url: self.officials_url.clone(),
            file: self.officials_file.clone(),
        }
    }

    pub fn towns_source(&self) -> DataSource {
        DataSource {
            url: self.towns_url.clone(),
            file: self.towns_file.clone(),
        }
    }

    pub fn officials_path(&self) -> PathBuf {
        self.data_dir.join(&self.officials_file)
    }

    pub fn towns_path(&self) -> PathBuf {
        self.data_dir.join(&self.towns_file)
    }
}
