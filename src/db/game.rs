use chrono::NaiveDateTime;
use color_eyre::Result;
use libsql::params;

use super::helpers::{
    bool_value, optional_integer, optional_text, query_i64, query_optional, sql_time,
};
use super::models::{GameRow, GAME_COLUMNS};
use super::Db;
use crate::models::{Difficulty, GameMode};

/// Fields a new game row is created with.
pub struct NewGame<'a> {
    pub session_id: &'a str,
    pub game_mode: GameMode,
    pub difficulty: Option<Difficulty>,
    pub total_turns: i64,
    pub lives: i64,
    pub time_penalty: bool,
    pub user_id: Option<i64>,
    pub username: Option<&'a str>,
    pub created_at: NaiveDateTime,
}

impl Db {
    pub async fn insert_game(&self, game: &NewGame<'_>) -> Result<GameRow> {
        let conn = self.connect()?;
        let now = sql_time(game.created_at);

        conn.execute(
            r#"
            INSERT INTO games (session_id, game_mode, difficulty, total_turns, current_turn,
                lives, starting_lives, time_penalty, user_id, username, created_at, updated_at)
            VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                game.session_id,
                game.game_mode.as_str(),
                optional_text(game.difficulty.map(Difficulty::as_str)),
                game.total_turns,
                game.lives,
                game.lives,
                bool_value(game.time_penalty),
                optional_integer(game.user_id),
                optional_text(game.username),
                now.clone(),
                now
            ],
        )
        .await?;

        tracing::info!(
            "game created: session={}, mode={}, user_id={:?}",
            game.session_id,
            game.game_mode,
            game.user_id
        );

        query_optional(
            &conn,
            &format!("SELECT {GAME_COLUMNS} FROM games WHERE session_id = ?"),
            params![game.session_id],
        )
        .await?
        .ok_or_else(|| color_eyre::eyre::eyre!("game {} vanished after insert", game.session_id))
    }

    pub async fn game_by_session(&self, session_id: &str) -> Result<Option<GameRow>> {
        let conn = self.connect()?;
        query_optional(
            &conn,
            &format!("SELECT {GAME_COLUMNS} FROM games WHERE session_id = ?"),
            params![session_id],
        )
        .await
    }

    pub async fn latest_completed_game(&self, user_id: i64) -> Result<Option<GameRow>> {
        let conn = self.connect()?;
        query_optional(
            &conn,
            &format!(
                "SELECT {GAME_COLUMNS} FROM games WHERE user_id = ? AND completed = 1 \
                 ORDER BY updated_at DESC, id DESC LIMIT 1"
            ),
            params![user_id],
        )
        .await
    }

    /// Writes every mutable column of `game` if nobody else wrote since it was read.
    ///
    /// Returns `false` when the stored version moved on, leaving the row untouched.
    /// On success `game.version` is bumped to match the stored row.
    pub async fn save_game(&self, game: &mut GameRow, at: NaiveDateTime) -> Result<bool> {
        let conn = self.connect()?;
        let bonus_images = game.bonus_images.as_ref().map(|ids| ids.join());

        let affected = conn
            .execute(
                r#"
                UPDATE games SET
                    current_turn = ?, lives = ?, score = ?, current_streak = ?, best_streak = ?,
                    correct_answers = ?, completed = ?, shown_images = ?,
                    current_real_image = ?, current_ai_image = ?, left_is_real = ?,
                    bonus_turn = ?, bonus_images = ?, bonus_real_image = ?,
                    version = version + 1, updated_at = ?
                WHERE id = ? AND version = ?
                "#,
                params![
                    game.current_turn,
                    game.lives,
                    game.score,
                    game.current_streak,
                    game.best_streak,
                    game.correct_answers,
                    bool_value(game.completed),
                    game.shown_images.join(),
                    optional_integer(game.current_real_image),
                    optional_integer(game.current_ai_image),
                    bool_value(game.left_is_real),
                    game.bonus_turn,
                    optional_text(bonus_images.as_deref()),
                    optional_integer(game.bonus_real_image),
                    sql_time(at),
                    game.id,
                    game.version
                ],
            )
            .await?;

        if affected == 0 {
            tracing::warn!(
                "stale write rejected for game session={} version={}",
                game.session_id,
                game.version
            );
            return Ok(false);
        }

        game.version += 1;
        game.updated_at = at;
        Ok(true)
    }

    pub async fn completed_games_count(&self, user_id: i64) -> Result<i64> {
        let conn = self.connect()?;
        query_i64(
            &conn,
            "SELECT COUNT(*) FROM games WHERE user_id = ? AND completed = 1",
            params![user_id],
        )
        .await
    }

    /// Distinct difficulties of single-player games the user played to the end, won or lost.
    pub async fn completed_difficulties(&self, user_id: i64) -> Result<Vec<Difficulty>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                r#"
                SELECT DISTINCT difficulty FROM games
                WHERE user_id = ? AND completed = 1 AND game_mode = 'single'
                    AND difficulty IS NOT NULL
                ORDER BY difficulty
                "#,
                params![user_id],
            )
            .await?;

        let mut difficulties = Vec::new();
        while let Some(row) = rows.next().await? {
            difficulties.push(row.get::<String>(0)?.parse()?);
        }
        Ok(difficulties)
    }

    /// Retention cleanup. Returns the number of deleted games.
    pub async fn delete_games_before(&self, cutoff: NaiveDateTime) -> Result<u64> {
        let conn = self.connect()?;
        let deleted = conn
            .execute(
                "DELETE FROM games WHERE updated_at < ?",
                params![sql_time(cutoff)],
            )
            .await?;

        tracing::info!("retention cleanup removed {deleted} games older than {cutoff}");
        Ok(deleted)
    }
}
