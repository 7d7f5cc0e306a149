//! Application-level configuration loading: question durations and the reveal window.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::state::game::Difficulty;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_ARENA_BACK_CONFIG_PATH";

const DEFAULT_SCRUM_QUESTION: Duration = Duration::from_secs(30);
const DEFAULT_EASY_QUESTION: Duration = Duration::from_secs(30);
const DEFAULT_MEDIUM_QUESTION: Duration = Duration::from_secs(15);
const DEFAULT_HARD_QUESTION: Duration = Duration::from_secs(5);
const DEFAULT_REVEAL_WINDOW: Duration = Duration::from_millis(5_000);

/// Round timing shared by every component that computes a countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingConfig {
    /// Single duration used by every scrum question.
    pub scrum_question: Duration,
    /// Question duration for easy team sessions.
    pub easy_question: Duration,
    /// Question duration for medium team sessions.
    pub medium_question: Duration,
    /// Question duration for hard team sessions.
    pub hard_question: Duration,
    /// Pause between a round's reveal and the next question.
    pub reveal_window: Duration,
}

impl TimingConfig {
    /// Time allotted to a question of the given difficulty tier.
    pub fn for_difficulty(&self, difficulty: Difficulty) -> Duration {
        match difficulty {
            Difficulty::Easy => self.easy_question,
            Difficulty::Medium => self.medium_question,
            Difficulty::Hard => self.hard_question,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            scrum_question: DEFAULT_SCRUM_QUESTION,
            easy_question: DEFAULT_EASY_QUESTION,
            medium_question: DEFAULT_MEDIUM_QUESTION,
            hard_question: DEFAULT_HARD_QUESTION,
            reveal_window: DEFAULT_REVEAL_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    timing: TimingConfig,
}

impl AppConfig {
    /// Wrap the round timing.
    pub fn new(timing: TimingConfig) -> Self {
        Self { timing }
    }

    /// Load the application configuration from disk, falling back to the built-in timings.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        timing = ?app_config.timing,
                        "loaded round timings from config"
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

    /// Round timing shared by timers and countdowns.
    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
/// Every field is optional and falls back to its built-in value.
struct RawConfig {
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    scrum_question_secs: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    easy_secs: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    medium_secs: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    hard_secs: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    reveal_window_ms: Option<Duration>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = TimingConfig::default();
        Self {
            timing: TimingConfig {
                scrum_question: value.scrum_question_secs.unwrap_or(defaults.scrum_question),
                easy_question: value.easy_secs.unwrap_or(defaults.easy_question),
                medium_question: value.medium_secs.unwrap_or(defaults.medium_question),
                hard_question: value.hard_secs.unwrap_or(defaults.hard_question),
                reveal_window: value.reveal_window_ms.unwrap_or(defaults.reveal_window),
            },
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
