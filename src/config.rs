use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// The public host of the service
pub const DEFAULT_HOST: &str = "vwflow.com";
/// The user agent sent when none was configured
pub const DEFAULT_USER_AGENT: &str = "VWflow 1.0";
/// How long an upload may take before the request is abandoned
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(500);

/// The bundled configuration, written out when none exists
pub static DEFAULT_CONFIG: &str = include_str!("../default.toml");

/// Env var that overrides the password from the configuration file
pub const PASSWORD_ENV: &str = "VWFLOW_PASSWORD";

/// How the server's TLS certificate should be checked
#[derive(Debug, Clone, PartialEq)]
pub enum Verify {
    /// Trust the certificate(s) in this PEM file
    CaFile(PathBuf),
    /// Don't verify at all
    Disabled,
}

/// Configuration for a [`VWflow`](crate::VWflow) client
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub username: String,
    pub password: String,
    pub ssl: bool,
    pub user_agent: String,
    /// Query-string arguments added to every items query, before the caller's
    pub default_query: Vec<(String, String)>,
    pub custom_host: Option<String>,
    pub verify: Option<Verify>,
    pub upload_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            ssl: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_query: Vec::new(),
            custom_host: None,
            verify: None,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn new(username: impl ToString, password: impl ToString) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            ..Self::default()
        }
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl ToString) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn with_default_query<I, K, V>(mut self, query: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: ToString,
        V: ToString,
    {
        self.default_query
            .extend(query.into_iter().map(|(k, v)| (k.to_string(), v.to_string())));
        self
    }

    pub fn with_custom_host(mut self, host: impl ToString) -> Self {
        self.custom_host.replace(host.to_string());
        self
    }

    pub fn with_verify(mut self, verify: Verify) -> Self {
        self.verify.replace(verify);
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// The base url every resource path is appended to
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        let host = self
            .custom_host
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_HOST);
        format!("{}://{}/api/v1/", scheme, host)
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::Trace,
            LogLevel::Debug => Self::Debug,
            LogLevel::Info => Self::Info,
            LogLevel::Warn => Self::Warn,
            LogLevel::Error => Self::Error,
        }
    }
}

/// Configuration for the `vwflow` tool, read from a toml file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The log level to use for the console output
    pub log_level: LogLevel,
    pub username: String,
    pub password: String,
    pub ssl: bool,
    pub host: Option<String>,
    pub user_agent: Option<String>,
    /// Path to a PEM file with trusted certificates
    pub ca_file: Option<PathBuf>,
    /// Skip certificate verification entirely
    pub insecure_skip_verify: bool,
    /// Upload timeout, in seconds
    pub upload_timeout: u64,
    /// Sent with every items query, in the order they appear in the file
    pub default_query: toml::value::Table,
    pub hmac: Hmac,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            username: String::new(),
            password: String::new(),
            ssl: true,
            host: None,
            user_agent: None,
            ca_file: None,
            insecure_skip_verify: false,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT.as_secs(),
            default_query: toml::value::Table::new(),
            hmac: Hmac::default(),
        }
    }
}

/// Defaults for direct uploads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Hmac {
    pub account_id: String,
    pub wprofile_id: String,
    pub secret: String,
    /// In seconds, 30 when left out
    pub valid_for: Option<u64>,
}

impl Config {
    pub async fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let data = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("cannot read config file '{}'", path.as_ref().display()))?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> anyhow::Result<Self> {
        let mut this: Self = toml::from_str(data).with_context(|| "invalid config toml")?;
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            log::trace!("using password from {}", PASSWORD_ENV);
            this.password = password;
        }
        Ok(this)
    }

    /// Print out the default configuration
    pub fn print_default() {
        println!("{}", DEFAULT_CONFIG)
    }

    /// The `[default_query]` pairs, non-string values in their toml form
    pub fn default_query(&self) -> Vec<(String, String)> {
        self.default_query
            .iter()
            .map(|(key, value)| match value {
                toml::Value::String(s) => (key.clone(), s.clone()),
                value => (key.clone(), value.to_string()),
            })
            .collect()
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(&self.username, &self.password)
            .with_ssl(self.ssl)
            .with_default_query(self.default_query())
            .with_upload_timeout(Duration::from_secs(self.upload_timeout));

        if let Some(host) = &self.host {
            config = config.with_custom_host(host);
        }
        if let Some(user_agent) = &self.user_agent {
            config = config.with_user_agent(user_agent);
        }
        if self.insecure_skip_verify {
            config = config.with_verify(Verify::Disabled);
        } else if let Some(ca_file) = &self.ca_file {
            config = config.with_verify(Verify::CaFile(ca_file.clone()));
        }
        config
    }
}
