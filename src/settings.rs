use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{MailbotError, Result};
use crate::models::Filter;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir_string")]
    pub data_dir: String,
    /// Editor used by `mailbot review`; falls back to $VISUAL / $EDITOR.
    #[serde(default)]
    pub editor: Option<String>,
    #[serde(default)]
    pub mailboxes: BTreeMap<String, MailboxConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailboxConfig {
    /// Folder URL, e.g. `imaps://imap.gmail.com/INBOX`.
    pub url: String,
    pub login: String,
    /// Password entry: `<cache dir>/<entry>.txt` if present, else `pass <entry>`.
    pub password: String,
    #[serde(default)]
    pub purge: Vec<Filter>,
    #[serde(default)]
    pub summarize: Vec<Filter>,
    /// Only charges on or after this date (YYYY-MM-DD) are aggregated.
    #[serde(default)]
    pub summary_since: Option<String>,
    #[serde(default = "default_small_threshold")]
    pub small_threshold: f64,
}

fn default_small_threshold() -> f64 {
    10.0
}

fn default_data_dir_string() -> String {
    default_data_dir().to_string_lossy().to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir_string(),
            editor: None,
            mailboxes: BTreeMap::new(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("mailbot")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("mailbot")
}

/// Load and validate settings. An explicit path must exist; the default
/// location falls back to empty settings.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (settings_path(), false),
    };
    if !path.exists() {
        if explicit {
            return Err(MailbotError::Settings(format!(
                "cannot open {}",
                path.display()
            )));
        }
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(&path)?;
    let settings: Settings = serde_json::from_str(&content)
        .map_err(|e| MailbotError::Settings(format!("{}: {e}", path.display())))?;
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        for (name, mailbox) in &self.mailboxes {
            mailbox
                .validate()
                .map_err(|reason| MailbotError::Config(format!("mailbox {name}: {reason}")))?;
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand_path(&self.data_dir))
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir().join("mailbot.log")
    }

    pub fn mailbox(&self, name: &str) -> Result<&MailboxConfig> {
        self.mailboxes
            .get(name)
            .ok_or_else(|| MailbotError::UnknownMailbox(name.to_string()))
    }

    pub fn cache_dir(&self, name: &str) -> PathBuf {
        self.data_dir().join(name)
    }
}

impl MailboxConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("url is empty".to_string());
        }
        for (purpose, filters) in [("purge", &self.purge), ("summarize", &self.summarize)] {
            for (i, filter) in filters.iter().enumerate() {
                if filter.days_before == 0 {
                    return Err(format!(
                        "{purpose} filter #{}: days_before must be greater than 0",
                        i + 1
                    ));
                }
                if filter.expression.trim().is_empty() {
                    return Err(format!("{purpose} filter #{}: expression is empty", i + 1));
                }
            }
        }
        if let Some(since) = &self.summary_since {
            parse_since(since)?;
        }
        if !self.small_threshold.is_finite() || self.small_threshold < 0.0 {
            return Err(format!("invalid small_threshold: {}", self.small_threshold));
        }
        Ok(())
    }

    pub fn since(&self) -> Result<Option<NaiveDate>> {
        self.summary_since
            .as_deref()
            .map(parse_since)
            .transpose()
            .map_err(MailbotError::Config)
    }
}

fn parse_since(raw: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("summary_since must be YYYY-MM-DD, got {raw:?}"))
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
