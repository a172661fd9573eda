// Database model structs

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::helpers::{
    comma_integers, from_optional_text, from_text, optional_shown_images, optional_sql_date,
    optional_sql_timestamp, shown_images, sql_timestamp,
};
use crate::models::{Difficulty, GameMode, ImageKind, MultiplayerStatus, ShownImages};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: i64,
    pub filename: String,
    #[serde(rename = "type", deserialize_with = "from_text")]
    pub kind: ImageKind,
    #[serde(deserialize_with = "from_optional_text")]
    pub difficulty: Option<Difficulty>,
    pub category: Option<String>,
    pub description: Option<String>,
}

pub(crate) const IMAGE_COLUMNS: &str = "id, filename, type, difficulty, category, description";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub vip: bool,
    pub tutorial_completed: bool,
    pub active: bool,
}

pub(crate) const USER_COLUMNS: &str =
    "id, username, email, is_admin, vip, tutorial_completed, active";

/// One single-player, endless or daily play-through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRow {
    pub id: i64,
    pub session_id: String,
    #[serde(deserialize_with = "from_text")]
    pub game_mode: GameMode,
    #[serde(deserialize_with = "from_optional_text")]
    pub difficulty: Option<Difficulty>,
    pub total_turns: i64,
    pub current_turn: i64,
    pub lives: i64,
    pub starting_lives: i64,
    pub score: i64,
    pub current_streak: i64,
    pub best_streak: i64,
    pub correct_answers: i64,
    pub completed: bool,
    #[serde(deserialize_with = "shown_images")]
    pub shown_images: ShownImages,
    pub current_real_image: Option<i64>,
    pub current_ai_image: Option<i64>,
    pub left_is_real: bool,
    pub time_penalty: bool,
    pub bonus_turn: i64,
    #[serde(deserialize_with = "optional_shown_images")]
    pub bonus_images: Option<ShownImages>,
    pub bonus_real_image: Option<i64>,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub version: i64,
    #[serde(deserialize_with = "sql_timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(deserialize_with = "sql_timestamp")]
    pub updated_at: NaiveDateTime,
}

pub(crate) const GAME_COLUMNS: &str = "id, session_id, game_mode, difficulty, total_turns, \
    current_turn, lives, starting_lives, score, current_streak, best_streak, correct_answers, \
    completed, shown_images, current_real_image, current_ai_image, left_is_real, time_penalty, \
    bonus_turn, bonus_images, bonus_real_image, user_id, username, version, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiplayerGameRow {
    pub id: i64,
    pub game_code: String,
    pub room_code: String,
    pub is_public: bool,
    #[serde(deserialize_with = "from_text")]
    pub status: MultiplayerStatus,
    pub total_turns: i64,
    pub current_turn: i64,
    pub current_real_image: Option<i64>,
    pub current_ai_image: Option<i64>,
    pub left_is_real: bool,
    #[serde(deserialize_with = "shown_images")]
    pub shown_images: ShownImages,
    #[serde(deserialize_with = "sql_timestamp")]
    pub wait_timeout: NaiveDateTime,
    pub has_bots: bool,
    #[serde(deserialize_with = "optional_sql_timestamp")]
    pub started_at: Option<NaiveDateTime>,
    pub host_user_id: Option<i64>,
    pub version: i64,
    #[serde(deserialize_with = "sql_timestamp")]
    pub created_at: NaiveDateTime,
}

pub(crate) const MULTIPLAYER_COLUMNS: &str = "id, game_code, room_code, is_public, status, \
    total_turns, current_turn, current_real_image, current_ai_image, left_is_real, shown_images, \
    wait_timeout, has_bots, started_at, host_user_id, version, created_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRow {
    pub slot: i64,
    pub user_id: Option<i64>,
    pub player_name: String,
    pub score: i64,
    pub answered: bool,
    pub is_bot: bool,
    pub last_response_ms: Option<i64>,
    pub bonus_claimed: bool,
}

pub(crate) const PLAYER_COLUMNS: &str =
    "slot, user_id, player_name, score, answered, is_bot, last_response_ms, bonus_claimed";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusChestRow {
    pub slot: i64,
    #[serde(deserialize_with = "comma_integers")]
    pub chest_values: Vec<i64>,
    pub chosen_chest: Option<i64>,
    pub bonus_points: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: i64,
    pub criteria: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAchievement {
    pub criteria: String,
    pub name: String,
    #[serde(deserialize_with = "sql_timestamp")]
    pub unlocked_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyChallengeRecord {
    pub username: String,
    #[serde(deserialize_with = "optional_sql_date")]
    pub date_last_challenge: Option<NaiveDate>,
    #[serde(deserialize_with = "sql_timestamp")]
    pub next_challenge_date: NaiveDateTime,
    pub games_completed: i64,
    pub streak: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyHistory {
    #[serde(deserialize_with = "shown_images")]
    pub seen_real_images: ShownImages,
    #[serde(deserialize_with = "shown_images")]
    pub seen_ai_images: ShownImages,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: Option<i64>,
    pub username: String,
    pub score: i64,
    #[serde(deserialize_with = "from_text")]
    pub game_mode: GameMode,
    #[serde(deserialize_with = "from_optional_text")]
    pub difficulty: Option<Difficulty>,
    #[serde(deserialize_with = "sql_timestamp")]
    pub created_at: NaiveDateTime,
}
