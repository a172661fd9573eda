use chrono::Duration;

use crate::names;

/// Tunables built once at process start and shared by every service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Points for a correct answer before the streak multiplier.
    pub base_points: i64,
    /// How long a signed score token stays valid.
    pub score_token_max_age: Duration,
    /// How long a multiplayer lobby waits for humans before bots join.
    pub bot_wait: Duration,
    pub multiplayer_turns: i64,
    pub retention: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_points: names::DEFAULT_BASE_POINTS,
            score_token_max_age: Duration::seconds(names::SCORE_TOKEN_MAX_AGE_SECS),
            bot_wait: Duration::seconds(names::BOT_WAIT_SECS),
            multiplayer_turns: names::DEFAULT_MULTIPLAYER_TURNS,
            retention: Duration::days(names::DEFAULT_RETENTION_DAYS),
        }
    }
}
