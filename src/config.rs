//! Application configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat, FileSourceFile};
use serde::Deserialize;
use serde_with::serde_as;
use tracing::warn;

use crate::errors::DashboardError;

const LOCAL_API: &str = "http://localhost:8080/api";
const DEPLOYED_API: &str = "https://driver-drowsiness-api.onrender.com/api";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Which API deployment to talk to when no explicit URL is set
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiTarget {
    #[default]
    Local,
    Deployed,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub target: ApiTarget,
    /// Overrides `target` when set
    pub base_url: Option<String>,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub timeout: Duration,
    /// Readings requested per history poll
    pub history_limit: u32,
    pub recent_alerts_limit: u32,
    /// Device shown on the driver dashboard when neither the command line
    /// nor the signed-in account names one
    pub default_device_id: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            target: ApiTarget::Local,
            base_url: None,
            timeout: Duration::from_secs(30),
            history_limit: 300,
            recent_alerts_limit: 20,
            default_device_id: "device_01".to_string(),
        }
    }
}

/// When the adaptive cadence looks at the danger window again
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoostReevaluation {
    /// Only when the danger stamp moves
    #[default]
    OnChange,
    /// After every poll
    EveryTick,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub fast_interval: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub slow_interval: Duration,
    /// How long the fast interval holds after a danger event
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub boost_window: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub admin_interval: Duration,
    pub boost_reevaluation: BoostReevaluation,
    /// Events listed on the driver dashboard
    pub event_display_limit: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            fast_interval: Duration::from_secs(5),
            slow_interval: Duration::from_secs(30),
            boost_window: Duration::from_secs(120),
            admin_interval: Duration::from_secs(1),
            boost_reevaluation: BoostReevaluation::OnChange,
            event_display_limit: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub token_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            token_path: home.join(".drowsy").join("token"),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(File::with_name("config/default").required(false))
    }

    /// Load with an explicit configuration file in place of `config/default`
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(File::from(path).format(FileFormat::Toml))
    }

    fn load_with(file: File<FileSourceFile, FileFormat>) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("DROWSY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), DashboardError> {
        self.api.validate()?;
        self.polling.validate()?;
        self.session.validate()?;
        Ok(())
    }
}

impl ApiConfig {
    /// Base URL without a trailing slash
    pub fn resolve_base_url(&self) -> String {
        let url = match (&self.base_url, self.target) {
            (Some(url), _) if !url.trim().is_empty() => url.trim(),
            (_, ApiTarget::Local) => LOCAL_API,
            (_, ApiTarget::Deployed) => DEPLOYED_API,
        };
        url.trim_end_matches('/').to_string()
    }

    pub fn validate(&self) -> Result<(), DashboardError> {
        let base = self.resolve_base_url();
        reqwest::Url::parse(&base).map_err(|e| DashboardError::ConfigurationError {
            message: format!("Invalid API base URL '{}': {}", base, e),
        })?;
        if self.default_device_id.trim().is_empty() {
            return Err(DashboardError::ConfigurationError {
                message: "Default device id cannot be empty".to_string(),
            });
        }
        if self.history_limit == 0 {
            return Err(DashboardError::ConfigurationError {
                message: "History limit must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl PollingConfig {
    pub fn validate(&self) -> Result<(), DashboardError> {
        for (name, interval) in [
            ("fast_interval", self.fast_interval),
            ("slow_interval", self.slow_interval),
            ("admin_interval", self.admin_interval),
        ] {
            if interval.is_zero() {
                return Err(DashboardError::ConfigurationError {
                    message: format!("Polling {} must be greater than zero", name),
                });
            }
        }
        if self.fast_interval > self.slow_interval {
            return Err(DashboardError::ConfigurationError {
                message: "Fast polling interval cannot exceed the slow interval".to_string(),
            });
        }
        Ok(())
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), DashboardError> {
        if self.token_path.as_os_str().is_empty() {
            return Err(DashboardError::ConfigurationError {
                message: "Token path cannot be empty".to_string(),
            });
        }
        if let Some(dir) = self.token_path.parent() {
            self.ensure_directory_exists(dir)?;
        }
        Ok(())
    }

    fn ensure_directory_exists(&self, dir: &Path) -> Result<(), DashboardError> {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            warn!("Token directory does not exist, attempting to create it");
            std::fs::create_dir_all(dir).map_err(|e| DashboardError::ConfigurationError {
                message: format!("Could not create token directory: {}", e),
            })?;
        }
        Ok(())
    }
}
