use std::{collections::HashMap, fs, path::Path, time::Duration};

use agent_core::ExecutorConfig;
use anyhow::{bail, Context};
use canvas_core::Size;
use studio::PresenterConfig;
use url::Url;

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8787";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub backend_url: String,
    pub api_key: Option<String>,
    pub video_poll_interval_ms: u64,
    pub video_poll_max_attempts: u32,
    pub window_width: f64,
    pub window_height: f64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.into(),
            api_key: None,
            video_poll_interval_ms: 10_000,
            video_poll_max_attempts: 60,
            window_width: 1280.0,
            window_height: 800.0,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            video_poll_interval: Duration::from_millis(self.video_poll_interval_ms.max(1)),
            max_video_polls: self.video_poll_max_attempts,
            ..ExecutorConfig::default()
        }
    }

    pub fn presenter_config(&self) -> PresenterConfig {
        PresenterConfig {
            executor: self.executor_config(),
            screen: Size::new(self.window_width, self.window_height),
            ..PresenterConfig::default()
        }
    }
}

/// Reads `path` if it exists, then applies environment overrides. Settings
/// load before logging is up, so problems come back as warnings for the
/// caller to log.
pub fn load_settings(path: &Path) -> (Settings, Vec<String>) {
    load_settings_with(path, |key| std::env::var(key).ok())
}

pub fn load_settings_with(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> (Settings, Vec<String>) {
    let mut settings = Settings::default();
    let mut warnings = Vec::new();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(file_cfg) => apply_values(&mut settings, |key| file_cfg.get(key).cloned()),
            Err(err) => warnings.push(format!(
                "ignoring unreadable config file {}: {err}",
                path.display()
            )),
        }
    }

    if let Some(v) = env("STUDIO_BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Some(v) = env("STUDIO_API_KEY") {
        settings.api_key = Some(v);
    }
    apply_values(&mut settings, |key| env(&format!("APP__{}", key.to_ascii_uppercase())));

    (settings, warnings)
}

/// Applies the flat `key = "value"` settings shared by the config file and
/// the `APP__*` environment variables. Unparseable numbers are ignored.
fn apply_values(settings: &mut Settings, get: impl Fn(&str) -> Option<String>) {
    if let Some(v) = get("backend_url") {
        settings.backend_url = v;
    }
    if let Some(v) = get("api_key") {
        settings.api_key = Some(v);
    }
    if let Some(v) = get("video_poll_interval_ms") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.video_poll_interval_ms = parsed;
        }
    }
    if let Some(v) = get("video_poll_max_attempts") {
        if let Ok(parsed) = v.trim().parse::<u32>() {
            settings.video_poll_max_attempts = parsed;
        }
    }
    if let Some(v) = get("window_width") {
        if let Ok(parsed) = v.trim().parse::<f64>() {
            settings.window_width = parsed;
        }
    }
    if let Some(v) = get("window_height") {
        if let Ok(parsed) = v.trim().parse::<f64>() {
            settings.window_height = parsed;
        }
    }
    if let Some(v) = get("log_filter") {
        settings.log_filter = v;
    }
}

/// Accepts bare `host:port` as well as full URLs; only http(s) is allowed.
pub fn normalize_backend_url(raw: &str) -> anyhow::Result<Url> {
    let raw = raw.trim();
    let raw = if raw.is_empty() { DEFAULT_BACKEND_URL } else { raw };
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let url = Url::parse(&candidate).with_context(|| format!("invalid backend url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("backend url must use http or https, got '{}'", url.scheme());
    }
    Ok(url)
}
