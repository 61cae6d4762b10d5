//! Process-wide configuration.
//!
//! The configuration names where credential material lives, which API
//! endpoint the remote store is reached at, and how remote calls are paced.
//! It is installed once at startup with [`Config::install`]; readers that run
//! before any install see [`Config::default`].

use crate::error::{LedgerError, LedgerResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Default configuration directory.
pub const DEFAULT_CONF_DIR: &str = "gconf";
/// Default client credential description file name.
pub const DEFAULT_CREDENTIAL_FILE: &str = "gsheet-auth.json";
/// Default persisted token file name.
pub const DEFAULT_TOKEN_FILE: &str = "token.json";
/// Default base URL of the remote tabular-document API.
pub const DEFAULT_API_BASE_URL: &str = "https://sheets.googleapis.com";

/// Minimum spacing between the starts of two calls on one session.
pub const REQUEST_DURATION: Duration = Duration::from_millis(1200);
/// Backoff before the single retry of a failed call.
pub const SLEEP_ON_ERROR: Duration = Duration::from_secs(10);

static INSTALLED: OnceLock<Config> = OnceLock::new();

/// Request pacing policy for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Minimum time from the start of one call to the start of the next.
    pub request_duration: Duration,
    /// Sleep between a failed call and its retry.
    pub sleep_on_error: Duration,
}

impl Pacing {
    /// A policy that never sleeps. Useful for in-memory backends.
    pub const fn none() -> Self {
        Self {
            request_duration: Duration::ZERO,
            sleep_on_error: Duration::ZERO,
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            request_duration: REQUEST_DURATION,
            sleep_on_error: SLEEP_ON_ERROR,
        }
    }
}

/// testledger configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the credential description and the token file.
    pub conf_dir: PathBuf,
    /// Client credential description file name, relative to `conf_dir`.
    pub credential_file: String,
    /// Persisted token file name, relative to `conf_dir`.
    pub token_file: String,
    /// Base URL of the remote API.
    pub api_base_url: String,
    /// Pacing applied to every remote call.
    pub pacing: Pacing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            conf_dir: PathBuf::from(DEFAULT_CONF_DIR),
            credential_file: DEFAULT_CREDENTIAL_FILE.to_string(),
            token_file: DEFAULT_TOKEN_FILE.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            pacing: Pacing::default(),
        }
    }
}

/// On-disk shape of a configuration file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigFile {
    conf_dir: Option<PathBuf>,
    credential_file: Option<String>,
    token_file: Option<String>,
    api_base_url: Option<String>,
    request_duration_ms: Option<u64>,
    sleep_on_error_ms: Option<u64>,
}

impl Config {
    /// Create a configuration with the given directory and file names.
    ///
    /// `None` keeps the default for that setting.
    pub fn new(
        conf_dir: Option<PathBuf>,
        credential_file: Option<String>,
        token_file: Option<String>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            conf_dir: conf_dir.unwrap_or(defaults.conf_dir),
            credential_file: credential_file.unwrap_or(defaults.credential_file),
            token_file: token_file.unwrap_or(defaults.token_file),
            ..defaults
        }
    }

    /// Load a configuration from a JSON file, filling missing keys with defaults.
    pub fn from_file(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let file: ConfigFile = serde_json::from_str(&content)?;
        let defaults = Self::default();

        Ok(Self {
            conf_dir: file.conf_dir.unwrap_or(defaults.conf_dir),
            credential_file: file.credential_file.unwrap_or(defaults.credential_file),
            token_file: file.token_file.unwrap_or(defaults.token_file),
            api_base_url: file.api_base_url.unwrap_or(defaults.api_base_url),
            pacing: Pacing {
                request_duration: file
                    .request_duration_ms
                    .map_or(defaults.pacing.request_duration, Duration::from_millis),
                sleep_on_error: file
                    .sleep_on_error_ms
                    .map_or(defaults.pacing.sleep_on_error, Duration::from_millis),
            },
        })
    }

    /// Use a different API base URL.
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Use a different pacing policy.
    #[must_use]
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Full path of the credential description file.
    pub fn credential_path(&self) -> PathBuf {
        self.conf_dir.join(&self.credential_file)
    }

    /// Full path of the persisted token file.
    pub fn token_path(&self) -> PathBuf {
        self.conf_dir.join(&self.token_file)
    }

    /// Install this configuration for the rest of the process.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Config` if a configuration was already installed.
    pub fn install(self) -> LedgerResult<()> {
        INSTALLED
            .set(self)
            .map_err(|_| LedgerError::Config("configuration already installed".to_string()))
    }

    /// The installed configuration, or the defaults if none was installed.
    pub fn current() -> Config {
        INSTALLED.get().cloned().unwrap_or_default()
    }
}
