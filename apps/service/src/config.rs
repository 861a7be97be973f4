use std::{env, fmt, fs, io, path};

use logger::LogSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },

    #[error("Failed to write config file {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },

    #[error("Failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("No config path available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitoring: MonitoringSettings,
    pub database: DatabaseSettings,
    pub logs: LogsSettings,
    pub accounts: AccountSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twilio: Option<TwilioSettings>,
    pub logging: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringSettings {
    pub interval_seconds: u64,
    pub max_concurrency: usize,
    pub shutdown_grace_seconds: u64,
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self { interval_seconds: 60, max_concurrency: cores * 4, shutdown_grace_seconds: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: path::PathBuf,
    pub pool_size: usize,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { path: "upwatch.db".into(), pool_size: 8 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsSettings {
    pub directory: path::PathBuf,
    pub rotation_interval_seconds: u64,
    /// 0 keeps archives forever
    pub archive_retention_days: u64,
}

impl Default for LogsSettings {
    fn default() -> Self {
        Self { directory: "logs".into(), rotation_interval_seconds: 24 * 3600, archive_retention_days: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSettings {
    pub max_checks: usize,
    pub token_ttl_seconds: u64,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self { max_checks: 5, token_ttl_seconds: 3600 }
    }
}

/// Twilio credentials; alerts are only logged when this section is absent
#[derive(Clone, Serialize, Deserialize)]
pub struct TwilioSettings {
    pub account_sid: String,
    pub auth_token: String,
    pub from_phone: String,
    #[serde(default = "default_twilio_api_base")]
    pub api_base: String,
    #[serde(default = "default_country_code")]
    pub country_code: String,
}

fn default_twilio_api_base() -> String {
    "https://api.twilio.com".into()
}

fn default_country_code() -> String {
    "+1".into()
}

impl fmt::Debug for TwilioSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioSettings")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("from_phone", &self.from_phone)
            .field("api_base", &self.api_base)
            .field("country_code", &self.country_code)
            .finish()
    }
}

const ENV_TWILIO_ACCOUNT_SID: &str = "UPWATCH_TWILIO_ACCOUNT_SID";
const ENV_TWILIO_AUTH_TOKEN: &str = "UPWATCH_TWILIO_AUTH_TOKEN";
const ENV_TWILIO_FROM_PHONE: &str = "UPWATCH_TWILIO_FROM_PHONE";

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/upwatch/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("upwatch/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Monitoring")?;
        write_1(f, "Interval (s)", &self.monitoring.interval_seconds)?;
        write_1(f, "Max Concurrency", &self.monitoring.max_concurrency)?;
        write_1(f, "Shutdown Grace (s)", &self.monitoring.shutdown_grace_seconds)?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path.display())?;
        write_1(f, "Pool Size", &self.database.pool_size)?;
        write_title_1(f, "Execution Logs")?;
        write_1(f, "Directory", &self.logs.directory.display())?;
        write_1(f, "Rotation Interval (s)", &self.logs.rotation_interval_seconds)?;
        write_1(f, "Archive Retention (days)", &self.logs.archive_retention_days)?;
        write_title_1(f, "Accounts")?;
        write_1(f, "Max Checks", &self.accounts.max_checks)?;
        write_1(f, "Token TTL (s)", &self.accounts.token_ttl_seconds)?;
        write_title_1(f, "Alerts")?;
        match &self.twilio {
            Some(twilio) => {
                write_1(f, "Gateway", &"twilio")?;
                write_1(f, "From", &twilio.from_phone)?;
            }
            None => write_1(f, "Gateway", &"log only")?,
        }
        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;
        write_1(f, "Format", &format_args!("{:?}", self.logging.format))?;

        Ok(())
    }
}

impl Config {
    /// Load, apply environment overrides and validate
    pub fn load(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let mut config = Self::from_config(optional_path)?;
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/upwatch/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;
        let write_failed = |source| ConfigError::WriteFailed { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        fs::write(path, config_str).map_err(write_failed)
    }

    /// Fill Twilio credentials from the environment
    ///
    /// Individual variables override fields of an existing `[twilio]`
    /// section. Without one, all three must be set to enable the gateway.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let sid = lookup(ENV_TWILIO_ACCOUNT_SID);
        let token = lookup(ENV_TWILIO_AUTH_TOKEN);
        let from = lookup(ENV_TWILIO_FROM_PHONE);

        match &mut self.twilio {
            Some(twilio) => {
                if let Some(sid) = sid {
                    twilio.account_sid = sid;
                }
                if let Some(token) = token {
                    twilio.auth_token = token;
                }
                if let Some(from) = from {
                    twilio.from_phone = from;
                }
            }
            None => {
                if let (Some(account_sid), Some(auth_token), Some(from_phone)) = (sid, token, from) {
                    self.twilio = Some(TwilioSettings {
                        account_sid,
                        auth_token,
                        from_phone,
                        api_base: default_twilio_api_base(),
                        country_code: default_country_code(),
                    });
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.monitoring.interval_seconds == 0 {
            return invalid("monitoring.interval_seconds must be greater than zero");
        }
        if self.monitoring.max_concurrency == 0 {
            return invalid("monitoring.max_concurrency must be greater than zero");
        }
        if self.database.pool_size == 0 {
            return invalid("database.pool_size must be greater than zero");
        }
        if self.logs.rotation_interval_seconds == 0 {
            return invalid("logs.rotation_interval_seconds must be greater than zero");
        }
        if self.accounts.max_checks == 0 {
            return invalid("accounts.max_checks must be greater than zero");
        }
        if self.accounts.token_ttl_seconds == 0 {
            return invalid("accounts.token_ttl_seconds must be greater than zero");
        }

        if let Some(twilio) = &self.twilio {
            if twilio.account_sid.is_empty() || twilio.auth_token.is_empty() || twilio.from_phone.is_empty() {
                return invalid("twilio.account_sid, auth_token and from_phone are required");
            }
            if url::Url::parse(&twilio.api_base).is_err() {
                return invalid("twilio.api_base must be a valid URL");
            }
            if !twilio.country_code.starts_with('+') {
                return invalid("twilio.country_code must start with '+'");
            }
        }

        Ok(())
    }
}
