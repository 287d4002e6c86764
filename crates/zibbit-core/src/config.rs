// Configuration loading and parsing (zibbit.toml).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::render::Palette;

/// Environment variable that overrides `server.base_url`.
pub const SERVER_URL_ENV: &str = "ZIBBIT_SERVER_URL";

const CONFIG_FILE: &str = "zibbit.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Contents of `zibbit.toml`. Every section is optional and falls back to
/// its defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub timing: TimingConfig,
    pub reconnect: ReconnectConfig,
    pub palette: Palette,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub events_path: String,
    pub submit_path: String,
    pub vote_path: String,
    pub flag_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            base_url: "http://127.0.0.1:8000".into(),
            events_path: "/events".into(),
            submit_path: "/submit_candidate".into(),
            vote_path: "/vote".into(),
            flag_path: "/flag_word".into(),
        }
    }
}

impl ServerConfig {
    /// Absolute URL for a server-relative `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn events_url(&self) -> String {
        self.url(&self.events_path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Total lifetime of a candidate, used for the highlight fade.
    pub candidate_window_ms: u64,
    pub phase_tick_ms: u64,
    pub decay_tick_ms: u64,
    /// How long a winning phrase stays highlighted.
    pub winner_flash_ms: u64,
    /// How long the stream may stay down before it is shown as lost.
    pub reconnect_grace_ms: u64,
    pub apply_clock_skew: bool,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            candidate_window_ms: 10_000,
            phase_tick_ms: 1_000,
            decay_tick_ms: 500,
            winner_flash_ms: 1_500,
            reconnect_grace_ms: 5_000,
            apply_clock_skew: true,
        }
    }
}

/// Exponential backoff between push-channel reconnect attempts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub factor: f64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig {
            initial_delay_ms: 500,
            factor: 2.0,
            max_delay_ms: 15_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/zibbit.toml` relative to `base_dir`, applying
/// overrides from `env`.
///
/// This is the lower-level loading primitive that does not auto-copy
/// defaults. Prefer `load_config()`.
pub fn load_config_from(
    base_dir: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let mut config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    apply_env_overrides(&mut config, env);
    validate(&config)?;

    Ok(config)
}

/// Create `config/zibbit.toml` from `defaults/zibbit.toml` when it is missing.
/// Returns the path written, or `None` when the player already has a config.
/// An existing file is never overwritten.
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = base_dir.join("config").join(CONFIG_FILE);
    if target.is_file() {
        return Ok(None);
    }

    let source = base_dir.join("defaults").join(CONFIG_FILE);
    let defaults = std::fs::read(&source).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!(
            "no config/{CONFIG_FILE} and cannot read {}: {e}",
            source.display()
        ),
    })?;

    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", dir.display()),
        })?;
    }

    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
    {
        Ok(dest) => dest,
        // Another client instance wrote it first.
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => {
            return Err(ConfigError::DefaultsCopyError {
                message: format!("failed to create {}: {e}", target.display()),
            })
        }
    };
    std::io::Write::write_all(&mut dest, &defaults).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to write {}: {e}", target.display()),
    })?;

    info!("Created {} from defaults", target.display());
    Ok(Some(target))
}

/// Convenience wrapper: loads config relative to the current working
/// directory, copying defaults first and honouring the process environment.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_file(&cwd)?;
    load_config_from(&cwd, |key| std::env::var(key).ok())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn apply_env_overrides(config: &mut Config, env: impl Fn(&str) -> Option<String>) {
    if let Some(url) = env(SERVER_URL_ENV).filter(|u| !u.trim().is_empty()) {
        config.server.base_url = url.trim().to_string();
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let server = &config.server;
    if !(server.base_url.starts_with("http://") || server.base_url.starts_with("https://")) {
        return Err(invalid(
            "server.base_url",
            format!("must be an http(s) URL, got {:?}", server.base_url),
        ));
    }

    let paths: &[(&str, &str)] = &[
        ("server.events_path", server.events_path.as_str()),
        ("server.submit_path", server.submit_path.as_str()),
        ("server.vote_path", server.vote_path.as_str()),
        ("server.flag_path", server.flag_path.as_str()),
    ];
    for (name, path) in paths {
        if !path.starts_with('/') {
            return Err(invalid(name, format!("must start with '/', got {path:?}")));
        }
    }

    let t = &config.timing;
    let durations: &[(&str, u64)] = &[
        ("timing.candidate_window_ms", t.candidate_window_ms),
        ("timing.phase_tick_ms", t.phase_tick_ms),
        ("timing.decay_tick_ms", t.decay_tick_ms),
        ("reconnect.initial_delay_ms", config.reconnect.initial_delay_ms),
    ];
    for (name, val) in durations {
        if *val == 0 {
            return Err(invalid(name, "must be greater than 0"));
        }
    }

    let r = &config.reconnect;
    if !r.factor.is_finite() || r.factor < 1.0 {
        return Err(invalid(
            "reconnect.factor",
            format!("must be at least 1.0, got {}", r.factor),
        ));
    }
    if r.max_delay_ms < r.initial_delay_ms {
        return Err(invalid(
            "reconnect.max_delay_ms",
            format!(
                "must be at least reconnect.initial_delay_ms ({}), got {}",
                r.initial_delay_ms, r.max_delay_ms
            ),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
