use std::{fs, io, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "album.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub token: Option<String>,
    pub viewport_width: u32,
    pub http_timeout_seconds: u64,
    pub dedupe_images: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:5000".into(),
            token: None,
            viewport_width: 1280,
            http_timeout_seconds: 30,
            dedupe_images: true,
        }
    }
}

impl Settings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    token: Option<String>,
    viewport_width: Option<u32>,
    http_timeout_seconds: Option<u64>,
    dedupe_images: Option<bool>,
}

/// Defaults, then the config file (if present), then the process environment.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?,
        Err(err) if err.kind() == io::ErrorKind::NotFound && config_path.is_none() => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.token {
        settings.token = Some(v);
    }
    if let Some(v) = file_cfg.viewport_width {
        settings.viewport_width = v;
    }
    if let Some(v) = file_cfg.http_timeout_seconds {
        settings.http_timeout_seconds = v;
    }
    if let Some(v) = file_cfg.dedupe_images {
        settings.dedupe_images = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("ALBUM_API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = lookup("ALBUM_TOKEN") {
        settings.token = Some(v);
    }
    if let Some(v) = lookup("APP__TOKEN") {
        settings.token = Some(v);
    }

    if let Some(v) = lookup("APP__VIEWPORT_WIDTH") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.viewport_width = parsed;
        }
    }
    if let Some(v) = lookup("APP__HTTP_TIMEOUT_SECONDS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.http_timeout_seconds = parsed;
        }
    }
    if let Some(v) = lookup("APP__DEDUPE_IMAGES") {
        if let Ok(parsed) = v.parse::<bool>() {
            settings.dedupe_images = parsed;
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
