use std::{path::Path, time::Duration};

use anyhow::{bail, Context};
use config::{Config, Environment, File, FileFormat};
use roster_core::DEFAULT_API_BASE_URL;
use serde::Deserialize;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "roster.toml";
pub const ENV_PREFIX: &str = "ROSTER";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    /// Unset means requests may wait indefinitely.
    pub request_timeout_secs: Option<u64>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            request_timeout_secs: None,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(self.api_base_url.trim())
            .with_context(|| format!("api_base_url '{}' is not a valid URL", self.api_base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("api_base_url must use http or https, got '{}'", url.scheme());
        }
        if self.request_timeout_secs == Some(0) {
            bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

/// Defaults, then `roster.toml` in the working directory (or the explicit
/// `path`, which must exist), then `ROSTER__*` environment variables.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
    };

    let settings: Settings = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("failed to read roster settings")?
        .try_deserialize()
        .context("invalid roster settings")?;

    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
