//! Process configuration for the alert bot service.
//!
//! Only deployment concerns live here (listen address, data dir, API base URLs
//! and the credentials used by the `status` action). Broadcast settings arrive
//! with every request as an [`AlertBotConfig`](crate::model::AlertBotConfig).
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub telegram: Telegram,
    pub whatsapp: WhatsApp,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub listen_addr: String,
    pub data_dir: String,
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Telegram {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
}

/// WhatsApp Business (Graph API) settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WhatsApp {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub phone_number_id: String,
    #[serde(default = "default_graph_api_url")]
    pub api_url: String,
    #[serde(default = "default_graph_api_version")]
    pub api_version: String,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_graph_api_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_graph_api_version() -> String {
    "v17.0".to_string()
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// SQLite URL used when `DATABASE_URL` is not set.
    pub fn default_database_url(&self) -> String {
        format!("sqlite://{}/alertbot.db", self.app.data_dir.trim_end_matches('/'))
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.app
            .listen_addr
            .parse()
            .map_err(|_| ConfigError::Invalid("app.listen_addr must be a socket address"))
    }

    pub fn telegram_api_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.telegram.api_url)
            .map_err(|_| ConfigError::Invalid("telegram.api_url must be a valid URL"))
    }

    pub fn graph_api_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.whatsapp.api_url)
            .map_err(|_| ConfigError::Invalid("whatsapp.api_url must be a valid URL"))
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
///
/// Credentials may be blank: the `status` action reports them as not configured.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    cfg.listen_addr()?;
    cfg.telegram_api_url()?;
    cfg.graph_api_url()?;
    if cfg.whatsapp.api_version.trim().is_empty() {
        return Err(ConfigError::Invalid("whatsapp.api_version must be non-empty"));
    }
    Ok(())
}

/// Example configuration, also shipped as `config.example.yaml`.
pub fn example() -> &'static str {
    r#"app:
  listen_addr: "0.0.0.0:8080"
  data_dir: "./data"

telegram:
  bot_token: "YOUR_TELEGRAM_BOT_TOKEN"
  api_url: "https://api.telegram.org"

whatsapp:
  access_token: "YOUR_WHATSAPP_ACCESS_TOKEN"
  phone_number_id: "YOUR_PHONE_NUMBER_ID"
  api_url: "https://graph.facebook.com"
  api_version: "v17.0"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.listen_addr().unwrap().port(), 8080);
    }

    #[test]
    fn blank_credentials_are_allowed() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.telegram.bot_token = "".into();
        cfg.whatsapp.access_token = "".into();
        cfg.whatsapp.phone_number_id = "".into();
        validate(&cfg).unwrap();
    }

    #[test]
    fn invalid_listen_addr() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.listen_addr = "not-an-addr".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("listen_addr")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_api_urls() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.telegram.api_url = "::nope".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(msg)) if msg.contains("telegram.api_url")));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.whatsapp.api_url = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(msg)) if msg.contains("whatsapp.api_url")));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.whatsapp.api_version = " ".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn optional_sections_use_defaults() {
        let raw = r#"app:
  listen_addr: "127.0.0.1:9000"
  data_dir: "./data"
telegram: {}
whatsapp: {}
"#;
        let cfg: Config = serde_yaml::from_str(raw).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.telegram.api_url, "https://api.telegram.org");
        assert_eq!(cfg.whatsapp.api_version, "v17.0");
        assert!(cfg.telegram.bot_token.is_empty());
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
        assert!(cfg.default_database_url().ends_with("/data/alertbot.db"));
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.whatsapp.phone_number_id, "YOUR_PHONE_NUMBER_ID");
    }
}
