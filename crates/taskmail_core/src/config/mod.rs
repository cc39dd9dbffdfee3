use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.json";
const STORE_FILE_NAME: &str = "tasks.json";
const CONFIG_ENV_VAR: &str = "TASKMAIL_CONFIG_PATH";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 600;
pub const DEFAULT_SMTP_PORT: u16 = 465;

/// Recipient label used when mail is not configured and reminders go to the
/// desktop instead.
pub const LOCAL_RECIPIENT: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store_path: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub sweep_interval_secs: u64,
    pub recipient: Option<String>,
    pub smtp: Option<SmtpSettings>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            recipient: None,
            smtp: None,
        }
    }
}

impl Config {
    pub fn store_path(&self) -> Result<PathBuf, AppError> {
        match self.store_path.as_ref() {
            Some(path) => Ok(path.clone()),
            None => default_dir().map(|dir| dir.join(STORE_FILE_NAME)),
        }
    }

    pub fn sweep_interval(&self) -> Result<Duration, AppError> {
        if self.sweep_interval_secs == 0 {
            return Err(AppError::config("sweep_interval_secs must be positive"));
        }
        Ok(Duration::from_secs(self.sweep_interval_secs))
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Where reminders go: the configured recipient, else the SMTP account
    /// itself, else the local desktop.
    pub fn reminder_recipient(&self) -> String {
        self.recipient
            .clone()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.smtp.as_ref().map(|smtp| smtp.username.clone()))
            .unwrap_or_else(|| LOCAL_RECIPIENT.to_string())
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub from: Option<String>,
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    StorePath,
    Host,
    Port,
    SweepIntervalSecs,
    Recipient,
    SmtpHost,
    SmtpPort,
    SmtpUsername,
    SmtpPassword,
    SmtpFrom,
}

impl ConfigKey {
    /// Environment variables consulted by [`ConfigOverrides::from_env`].
    pub const ENV_VARS: [(&'static str, ConfigKey); 10] = [
        ("TASKMAIL_STORE_PATH", ConfigKey::StorePath),
        ("TASKMAIL_HOST", ConfigKey::Host),
        ("PORT", ConfigKey::Port),
        ("TASKMAIL_SWEEP_INTERVAL_SECS", ConfigKey::SweepIntervalSecs),
        ("TASKMAIL_RECIPIENT", ConfigKey::Recipient),
        ("SMTP_HOST", ConfigKey::SmtpHost),
        ("SMTP_PORT", ConfigKey::SmtpPort),
        ("SMTP_USERNAME", ConfigKey::SmtpUsername),
        ("SMTP_PASSWORD", ConfigKey::SmtpPassword),
        ("SMTP_FROM", ConfigKey::SmtpFrom),
    ];

    /// Resolves a dotted key such as `smtp.host` or `sweep_interval_secs`.
    /// Input is expected to be canonicalized (lowercase, `_` separators).
    pub fn from_name(field: &str, subfield: Option<&str>) -> Option<Self> {
        match (field, subfield) {
            ("store_path" | "store", None) => Some(Self::StorePath),
            ("host", None) => Some(Self::Host),
            ("port", None) => Some(Self::Port),
            ("sweep_interval_secs" | "sweep_interval", None) => Some(Self::SweepIntervalSecs),
            ("recipient", None) => Some(Self::Recipient),
            ("smtp", Some("host")) => Some(Self::SmtpHost),
            ("smtp", Some("port")) => Some(Self::SmtpPort),
            ("smtp", Some("username" | "user")) => Some(Self::SmtpUsername),
            ("smtp", Some("password" | "pass")) => Some(Self::SmtpPassword),
            ("smtp", Some("from")) => Some(Self::SmtpFrom),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub store_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub sweep_interval_secs: Option<u64>,
    pub recipient: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
}

impl ConfigOverrides {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut overrides = Self::default();
        for (name, key) in ConfigKey::ENV_VARS {
            if let Some(value) = lookup(name)
                && !value.trim().is_empty()
            {
                overrides
                    .set(key, &value)
                    .map_err(|err| AppError::config(format!("{name}: {}", err.message())))?;
            }
        }
        Ok(overrides)
    }

    pub fn set(&mut self, key: ConfigKey, raw: &str) -> Result<(), AppError> {
        let value = raw.trim().to_string();
        match key {
            ConfigKey::StorePath => self.store_path = Some(PathBuf::from(value)),
            ConfigKey::Host => self.host = Some(value),
            ConfigKey::Port => self.port = Some(parse_number(&value, "port")?),
            ConfigKey::SweepIntervalSecs => {
                self.sweep_interval_secs = Some(parse_number(&value, "sweep_interval_secs")?)
            }
            ConfigKey::Recipient => self.recipient = Some(value),
            ConfigKey::SmtpHost => self.smtp_host = Some(value),
            ConfigKey::SmtpPort => self.smtp_port = Some(parse_number(&value, "smtp.port")?),
            ConfigKey::SmtpUsername => self.smtp_username = Some(value),
            // Passwords may legitimately carry surrounding spaces.
            ConfigKey::SmtpPassword => self.smtp_password = Some(raw.to_string()),
            ConfigKey::SmtpFrom => self.smtp_from = Some(value),
        }
        Ok(())
    }

    /// Later overrides win field by field.
    pub fn merge(mut self, later: ConfigOverrides) -> Self {
        fn take<T>(slot: &mut Option<T>, later: Option<T>) {
            if later.is_some() {
                *slot = later;
            }
        }
        take(&mut self.store_path, later.store_path);
        take(&mut self.host, later.host);
        take(&mut self.port, later.port);
        take(&mut self.sweep_interval_secs, later.sweep_interval_secs);
        take(&mut self.recipient, later.recipient);
        take(&mut self.smtp_host, later.smtp_host);
        take(&mut self.smtp_port, later.smtp_port);
        take(&mut self.smtp_username, later.smtp_username);
        take(&mut self.smtp_password, later.smtp_password);
        take(&mut self.smtp_from, later.smtp_from);
        self
    }

    fn touches_smtp(&self) -> bool {
        self.smtp_host.is_some()
            || self.smtp_port.is_some()
            || self.smtp_username.is_some()
            || self.smtp_password.is_some()
            || self.smtp_from.is_some()
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, field: &str) -> Result<T, AppError> {
    value
        .parse()
        .map_err(|_| AppError::config(format!("{field} must be a number, got '{value}'")))
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    default_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

fn default_dir() -> Result<PathBuf, AppError> {
    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::config("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("taskmail"))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::config("HOME is not set"))?;
        Ok(PathBuf::from(home).join(".config").join("taskmail"))
    }
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::config(format!("{}: {}", path.display(), err)))?;
    serde_json::from_str(&content)
        .map_err(|err| AppError::config(format!("invalid JSON in {}: {}", path.display(), err)))
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(path) = overrides.store_path.as_ref() {
        merged.store_path = Some(path.clone());
    }
    if let Some(host) = overrides.host.as_ref() {
        merged.host = host.clone();
    }
    if let Some(port) = overrides.port {
        merged.port = port;
    }
    if let Some(secs) = overrides.sweep_interval_secs {
        merged.sweep_interval_secs = secs;
    }
    if let Some(recipient) = overrides.recipient.as_ref() {
        merged.recipient = Some(recipient.clone());
    }

    if overrides.touches_smtp() {
        let mut smtp = merged.smtp.clone().unwrap_or_else(|| SmtpSettings {
            host: String::new(),
            port: DEFAULT_SMTP_PORT,
            username: String::new(),
            password: String::new(),
            from: None,
        });
        if let Some(host) = overrides.smtp_host.as_ref() {
            smtp.host = host.clone();
        }
        if let Some(port) = overrides.smtp_port {
            smtp.port = port;
        }
        if let Some(username) = overrides.smtp_username.as_ref() {
            smtp.username = username.clone();
        }
        if let Some(password) = overrides.smtp_password.as_ref() {
            smtp.password = password.clone();
        }
        if let Some(from) = overrides.smtp_from.as_ref() {
            smtp.from = Some(from.clone());
        }

        // Half-configured mail stays off rather than failing at send time.
        if !smtp.host.is_empty() && !smtp.username.is_empty() {
            merged.smtp = Some(smtp);
        }
    }

    merged
}
