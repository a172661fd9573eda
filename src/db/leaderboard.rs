use chrono::NaiveDateTime;
use color_eyre::Result;
use libsql::params;

use super::helpers::{optional_integer, optional_text, query_all, query_optional, sql_time};
use super::models::LeaderboardEntry;
use super::Db;
use crate::models::{Difficulty, GameMode};

const LEADERBOARD_COLUMNS: &str = "user_id, username, score, game_mode, difficulty, created_at";

impl Db {
    pub async fn record_score(
        &self,
        user_id: Option<i64>,
        username: &str,
        score: i64,
        game_mode: GameMode,
        difficulty: Option<Difficulty>,
        at: NaiveDateTime,
    ) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO leaderboard (user_id, username, score, game_mode, difficulty, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                optional_integer(user_id),
                username,
                score,
                game_mode.as_str(),
                optional_text(difficulty.map(Difficulty::as_str)),
                sql_time(at)
            ],
        )
        .await?;

        tracing::info!("leaderboard entry: {username} scored {score} in {game_mode}");
        Ok(())
    }

    /// Highest scores for a mode; `difficulty` of `None` ranks across all difficulties.
    pub async fn top_scores(
        &self,
        game_mode: GameMode,
        difficulty: Option<Difficulty>,
        limit: i64,
    ) -> Result<Vec<LeaderboardEntry>> {
        let conn = self.connect()?;
        match difficulty {
            Some(d) => {
                query_all(
                    &conn,
                    &format!(
                        "SELECT {LEADERBOARD_COLUMNS} FROM leaderboard \
                         WHERE game_mode = ? AND difficulty = ? \
                         ORDER BY score DESC, created_at ASC LIMIT ?"
                    ),
                    params![game_mode.as_str(), d.as_str(), limit],
                )
                .await
            }
            None => {
                query_all(
                    &conn,
                    &format!(
                        "SELECT {LEADERBOARD_COLUMNS} FROM leaderboard \
                         WHERE game_mode = ? ORDER BY score DESC, created_at ASC LIMIT ?"
                    ),
                    params![game_mode.as_str(), limit],
                )
                .await
            }
        }
    }

    pub async fn user_best(&self, user_id: i64) -> Result<Option<LeaderboardEntry>> {
        let conn = self.connect()?;
        query_optional(
            &conn,
            &format!(
                "SELECT {LEADERBOARD_COLUMNS} FROM leaderboard WHERE user_id = ? \
                 ORDER BY score DESC, created_at ASC LIMIT 1"
            ),
            params![user_id],
        )
        .await
    }
}
