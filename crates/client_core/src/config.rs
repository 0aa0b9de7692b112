use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const DEFAULT_WINDOW_TITLE: &str = "Bot Control Surface";
pub const DEFAULT_CHAT_LOG_FILE: &str = "chat_log.txt";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub gateway_url: String,
    pub window_title: String,
    /// `None` logs beside the executable; an empty path disables the log.
    pub chat_log_path: Option<PathBuf>,
    pub disconnect_timeout_secs: u64,
    pub event_buffer: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            gateway_url: "ws://127.0.0.1:8443/gateway".into(),
            window_title: DEFAULT_WINDOW_TITLE.into(),
            chat_log_path: None,
            disconnect_timeout_secs: 10,
            event_buffer: 256,
        }
    }
}

impl ClientSettings {
    /// Where message lines are appended, if anywhere.
    pub fn chat_log_path(&self) -> Option<PathBuf> {
        match &self.chat_log_path {
            Some(path) if path.as_os_str().is_empty() => None,
            Some(path) => Some(path.clone()),
            None => Some(default_chat_log_path()),
        }
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_secs(self.disconnect_timeout_secs)
    }

    pub fn gateway_url(&self) -> anyhow::Result<Url> {
        let url = Url::parse(&self.gateway_url)
            .with_context(|| format!("invalid gateway url `{}`", self.gateway_url))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => bail!("gateway url must use ws or wss, got `{other}`"),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.gateway_url()?;
        if self.event_buffer == 0 {
            bail!("event_buffer must be greater than zero");
        }
        Ok(())
    }
}

/// Reads settings from an optional TOML file and applies `APP__*`
/// environment overrides. A missing file yields the defaults.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<ClientSettings> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

pub fn load_settings_with(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<ClientSettings> {
    let mut settings = match path {
        Some(path) => read_settings_file(path)?,
        None => ClientSettings::default(),
    };
    apply_env_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

fn read_settings_file(path: &Path) -> anyhow::Result<ClientSettings> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ClientSettings::default()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn apply_env_overrides(settings: &mut ClientSettings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("APP__GATEWAY_URL") {
        settings.gateway_url = v;
    }
    if let Some(v) = env("APP__WINDOW_TITLE") {
        settings.window_title = v;
    }
    if let Some(v) = env("APP__CHAT_LOG_PATH") {
        settings.chat_log_path = Some(PathBuf::from(v));
    }
    if let Some(v) = env("APP__DISCONNECT_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.disconnect_timeout_secs = parsed,
            Err(err) => warn!("ignoring APP__DISCONNECT_TIMEOUT_SECS={v:?}: {err}"),
        }
    }
}

fn default_chat_log_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_CHAT_LOG_FILE)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CHAT_LOG_FILE))
}
