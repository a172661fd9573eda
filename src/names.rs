use crate::models::DifficultyPreset;

// Single-player presets (turns / lives)
pub const EASY_PRESET: DifficultyPreset = DifficultyPreset { turns: 20, lives: 5 };
pub const MEDIUM_PRESET: DifficultyPreset = DifficultyPreset { turns: 50, lives: 3 };
pub const HARD_PRESET: DifficultyPreset = DifficultyPreset { turns: 100, lives: 1 };

pub const ENDLESS_LIVES: i64 = 3;
/// Endless turns up to which easy, then medium images are served.
pub const ENDLESS_EASY_UNTIL: i64 = 10;
pub const ENDLESS_MEDIUM_UNTIL: i64 = 25;

pub const DAILY_TURNS: i64 = 10;
pub const DAILY_LIVES: i64 = 3;
pub const DAILY_EASY_UNTIL: i64 = 3;
pub const DAILY_MEDIUM_UNTIL: i64 = 7;
/// Hour of the day (UTC) the next daily challenge unlocks.
pub const DAILY_UNLOCK_HOUR: u32 = 8;
/// Seen ids kept per image kind in a player's daily history, about ten days of play.
pub const DAILY_HISTORY_WINDOW: usize = 100;

// Scoring
pub const DEFAULT_BASE_POINTS: i64 = 10;
pub const STREAK_STEP: i64 = 5;
/// Highest power of two the streak multiplier is allowed to reach.
pub const MAX_STREAK_DOUBLINGS: i64 = 16;
pub const BONUS_ROUND_EVERY: i64 = 10;
pub const BONUS_AI_IMAGES: usize = 3;

// Image selection
/// How many recent ids stay excluded once the full history is dropped.
pub const RECENT_EXCLUSION_WINDOW: usize = 10;

// Score tokens
pub const SCORE_SECRET_ENV: &str = "SCORE_SECRET";
/// Used only when `SCORE_SECRET` is unset. Anyone reading the source can forge tokens.
pub const FALLBACK_SCORE_SECRET: &str = "realvsai-insecure-default-secret";
pub const SCORE_TOKEN_MAX_AGE_SECS: i64 = 300;

// Multiplayer
pub const MAX_PLAYERS: i64 = 4;
pub const MIN_PLAYERS: i64 = 2;
/// The lobby creator always sits in the first slot.
pub const HOST_SLOT: i64 = 1;
pub const DEFAULT_MULTIPLAYER_TURNS: i64 = 10;
pub const MULTIPLAYER_TURNS_SETTING: &str = "multiplayer_turns";
pub const BOT_WAIT_SECS: i64 = 60;
pub const BOT_ACCURACY: f64 = 0.5;
pub const BOT_MIN_RESPONSE_MS: i64 = 800;
pub const BOT_MAX_RESPONSE_MS: i64 = 4000;
pub const MULTIPLAYER_POINTS: i64 = 1;
pub const BONUS_CHEST_VALUES: [i64; 4] = [1, 10, 25, 50];

/// Room code alphabet without 0/O, 1/I/L.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const ROOM_CODE_LEN: usize = 6;

pub const BOT_ADJECTIVES: &[&str] = &[
    "Swift", "Clever", "Sneaky", "Pixel", "Neon", "Quiet", "Lucky", "Turbo", "Fuzzy", "Cosmic",
];

pub const BOT_NOUNS: &[&str] = &[
    "Falcon", "Lens", "Otter", "Shutter", "Render", "Panda", "Comet", "Prism", "Badger", "Vortex",
];

/// Used when the bot_usernames table is empty.
pub const CURATED_BOT_NAMES: &[&str] = &["FrameByFrame", "AlbedoAl", "BokehBandit", "PromptPilot"];

// Daily challenge rewards
pub const AVATARS: &[&str] = &[
    "🦊", "🦉", "🐼", "🐙", "🦄", "🐢", "🦋", "🐝", "🦖", "🐳", "🦜", "🐧", "🦔", "🐲", "🦩", "🐞",
];

// Retention
pub const DEFAULT_RETENTION_DAYS: i64 = 30;
