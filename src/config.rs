//! Application-level configuration loading, including default match rules for new sessions.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::{
    live::{MatchSettings, WinCondition},
    timer::DEFAULT_DRIFT_TOLERANCE_SECS,
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PELADA_BACK_CONFIG_PATH";
/// Attempts at drawing an unused join code before giving up.
const DEFAULT_CODE_ATTEMPTS: u32 = 8;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    default_settings: MatchSettings,
    timer_drift_tolerance_secs: u32,
    session_code_attempts: u32,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        players_per_team = app_config.default_settings.players_per_team,
                        match_duration_mins = app_config.default_settings.match_duration_mins,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Match rules handed to clients when a session is created.
    pub fn default_settings(&self) -> &MatchSettings {
        &self.default_settings
    }

    /// Seconds of disagreement tolerated between a client's clock and the Timer Authority.
    pub fn timer_drift_tolerance_secs(&self) -> u32 {
        self.timer_drift_tolerance_secs
    }

    /// How many random join codes to try before reporting the store as unavailable.
    pub fn session_code_attempts(&self) -> u32 {
        self.session_code_attempts
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_settings: MatchSettings::default(),
            timer_drift_tolerance_secs: DEFAULT_DRIFT_TOLERANCE_SECS,
            session_code_attempts: DEFAULT_CODE_ATTEMPTS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    match_defaults: RawMatchDefaults,
    #[serde(default)]
    timer_drift_tolerance_secs: Option<u32>,
    #[serde(default)]
    session_code_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
/// Partial match rules; omitted keys keep the built-in value.
struct RawMatchDefaults {
    players_per_team: Option<usize>,
    match_duration_mins: Option<u32>,
    win_condition: Option<WinCondition>,
    goals_to_win: Option<u32>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let fallback = Self::default();
        let base = fallback.default_settings;
        let raw = value.match_defaults;
        Self {
            default_settings: MatchSettings {
                players_per_team: raw.players_per_team.unwrap_or(base.players_per_team),
                match_duration_mins: raw.match_duration_mins.unwrap_or(base.match_duration_mins),
                win_condition: raw.win_condition.unwrap_or(base.win_condition),
                goals_to_win: raw.goals_to_win.unwrap_or(base.goals_to_win),
            },
            timer_drift_tolerance_secs: value
                .timer_drift_tolerance_secs
                .unwrap_or(fallback.timer_drift_tolerance_secs),
            session_code_attempts: value
                .session_code_attempts
                .filter(|attempts| *attempts > 0)
                .unwrap_or(fallback.session_code_attempts),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
