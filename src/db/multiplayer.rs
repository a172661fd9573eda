use chrono::NaiveDateTime;
use color_eyre::Result;
use libsql::params;

use super::helpers::{
    bool_value, optional_integer, optional_text, query_all, query_i64, query_optional, sql_time,
};
use super::models::{
    BonusChestRow, MultiplayerGameRow, PlayerRow, MULTIPLAYER_COLUMNS, PLAYER_COLUMNS,
};
use super::Db;
use crate::models::MultiplayerStatus;
use crate::names;

pub struct NewMultiplayerGame<'a> {
    pub game_code: &'a str,
    pub room_code: &'a str,
    pub is_public: bool,
    pub total_turns: i64,
    pub wait_timeout: NaiveDateTime,
    pub host_user_id: Option<i64>,
    pub host_name: &'a str,
    pub created_at: NaiveDateTime,
}

impl Db {
    /// Creates the game and seats the host in slot 1 atomically.
    pub async fn insert_multiplayer_game(
        &self,
        game: &NewMultiplayerGame<'_>,
    ) -> Result<MultiplayerGameRow> {
        let conn = self.connect()?;
        let tx = conn.transaction().await?;

        let game_id = query_i64(
            &tx,
            r#"
            INSERT INTO multiplayer_games (game_code, room_code, is_public, status, total_turns,
                wait_timeout, host_user_id, created_at)
            VALUES (?, ?, ?, 'waiting', ?, ?, ?, ?)
            RETURNING id
            "#,
            params![
                game.game_code,
                game.room_code,
                bool_value(game.is_public),
                game.total_turns,
                sql_time(game.wait_timeout),
                optional_integer(game.host_user_id),
                sql_time(game.created_at)
            ],
        )
        .await?;

        tx.execute(
            r#"
            INSERT INTO multiplayer_players (game_id, slot, user_id, player_name, is_bot)
            VALUES (?, ?, ?, ?, 0)
            "#,
            params![
                game_id,
                names::HOST_SLOT,
                optional_integer(game.host_user_id),
                game.host_name
            ],
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            "multiplayer game created: code={}, room={}, public={}",
            game.game_code,
            game.room_code,
            game.is_public
        );

        query_optional(
            &conn,
            &format!("SELECT {MULTIPLAYER_COLUMNS} FROM multiplayer_games WHERE id = ?"),
            params![game_id],
        )
        .await?
        .ok_or_else(|| color_eyre::eyre::eyre!("multiplayer game {game_id} vanished after insert"))
    }

    pub async fn room_code_exists(&self, room_code: &str) -> Result<bool> {
        let conn = self.connect()?;
        let count = query_i64(
            &conn,
            "SELECT COUNT(*) FROM multiplayer_games WHERE room_code = ?",
            params![room_code],
        )
        .await?;
        Ok(count > 0)
    }

    pub async fn multiplayer_by_code(&self, game_code: &str) -> Result<Option<MultiplayerGameRow>> {
        let conn = self.connect()?;
        query_optional(
            &conn,
            &format!("SELECT {MULTIPLAYER_COLUMNS} FROM multiplayer_games WHERE game_code = ?"),
            params![game_code],
        )
        .await
    }

    pub async fn multiplayer_by_room(&self, room_code: &str) -> Result<Option<MultiplayerGameRow>> {
        let conn = self.connect()?;
        query_optional(
            &conn,
            &format!("SELECT {MULTIPLAYER_COLUMNS} FROM multiplayer_games WHERE room_code = ?"),
            params![room_code],
        )
        .await
    }

    /// Public lobbies nobody has started yet that still have a free slot, oldest first.
    pub async fn open_public_games(&self) -> Result<Vec<MultiplayerGameRow>> {
        let conn = self.connect()?;
        query_all(
            &conn,
            &format!(
                r#"
                SELECT {MULTIPLAYER_COLUMNS} FROM multiplayer_games g
                WHERE g.is_public = 1
                    AND g.status IN ('waiting', 'ready')
                    AND g.started_at IS NULL
                    AND g.current_turn = 1
                    AND (SELECT COUNT(*) FROM multiplayer_players p WHERE p.game_id = g.id) < 4
                ORDER BY g.created_at, g.id
                "#
            ),
            (),
        )
        .await
    }

    pub async fn waiting_games_past_timeout(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<MultiplayerGameRow>> {
        let conn = self.connect()?;
        query_all(
            &conn,
            &format!(
                "SELECT {MULTIPLAYER_COLUMNS} FROM multiplayer_games \
                 WHERE status = 'waiting' AND wait_timeout <= ? ORDER BY id"
            ),
            params![sql_time(now)],
        )
        .await
    }

    pub async fn players(&self, game_id: i64) -> Result<Vec<PlayerRow>> {
        let conn = self.connect()?;
        query_all(
            &conn,
            &format!(
                "SELECT {PLAYER_COLUMNS} FROM multiplayer_players WHERE game_id = ? ORDER BY slot"
            ),
            params![game_id],
        )
        .await
    }

    /// Seats a human in `slot`. `false` when the slot was taken in the meantime.
    pub async fn add_player(
        &self,
        game_id: i64,
        slot: i64,
        user_id: Option<i64>,
        player_name: &str,
    ) -> Result<bool> {
        let conn = self.connect()?;
        let affected = conn
            .execute(
                r#"
                INSERT OR IGNORE INTO multiplayer_players (game_id, slot, user_id, player_name, is_bot)
                VALUES (?, ?, ?, ?, 0)
                "#,
                params![game_id, slot, optional_integer(user_id), player_name],
            )
            .await?;

        if affected > 0 {
            tracing::info!("player {player_name} joined game {game_id} in slot {slot}");
        }
        Ok(affected > 0)
    }

    /// Seats bots in the given slots and flips the game to in progress in one transaction.
    ///
    /// Returns `false` without changes when the game row's version moved on.
    pub async fn fill_with_bots(
        &self,
        game: &mut MultiplayerGameRow,
        bots: &[(i64, String)],
        at: NaiveDateTime,
    ) -> Result<bool> {
        let conn = self.connect()?;
        let tx = conn.transaction().await?;

        let affected = tx
            .execute(
                r#"
                UPDATE multiplayer_games
                SET status = 'in_progress', has_bots = 1, started_at = ?, version = version + 1
                WHERE id = ? AND version = ?
                "#,
                params![sql_time(at), game.id, game.version],
            )
            .await?;

        if affected == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for (slot, name) in bots {
            tx.execute(
                r#"
                INSERT INTO multiplayer_players (game_id, slot, player_name, is_bot)
                VALUES (?, ?, ?, 1)
                "#,
                params![game.id, *slot, name.as_str()],
            )
            .await?;
        }

        tx.commit().await?;

        game.status = MultiplayerStatus::InProgress;
        game.has_bots = true;
        game.started_at = Some(at);
        game.version += 1;

        tracing::info!("{} bots added to game {}", bots.len(), game.game_code);
        Ok(true)
    }

    /// Marks the slot as answered for this turn. `false` when it already answered.
    pub async fn record_player_answer(
        &self,
        game_id: i64,
        slot: i64,
        points: i64,
        response_ms: Option<i64>,
    ) -> Result<bool> {
        let conn = self.connect()?;
        let affected = conn
            .execute(
                r#"
                UPDATE multiplayer_players
                SET answered = 1, score = score + ?, last_response_ms = ?
                WHERE game_id = ? AND slot = ? AND answered = 0
                "#,
                params![points, optional_integer(response_ms), game_id, slot],
            )
            .await?;
        Ok(affected > 0)
    }

    pub async fn reset_answers(&self, game_id: i64) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE multiplayer_players SET answered = 0 WHERE game_id = ?",
            params![game_id],
        )
        .await?;
        Ok(())
    }

    /// Version-checked write of the game row's mutable columns.
    pub async fn save_multiplayer_game(&self, game: &mut MultiplayerGameRow) -> Result<bool> {
        let conn = self.connect()?;
        let affected = conn
            .execute(
                r#"
                UPDATE multiplayer_games SET
                    status = ?, current_turn = ?, current_real_image = ?, current_ai_image = ?,
                    left_is_real = ?, shown_images = ?, has_bots = ?, started_at = ?,
                    version = version + 1
                WHERE id = ? AND version = ?
                "#,
                params![
                    game.status.as_str(),
                    game.current_turn,
                    optional_integer(game.current_real_image),
                    optional_integer(game.current_ai_image),
                    bool_value(game.left_is_real),
                    game.shown_images.join(),
                    bool_value(game.has_bots),
                    optional_text(game.started_at.map(sql_time).as_deref()),
                    game.id,
                    game.version
                ],
            )
            .await?;

        if affected == 0 {
            tracing::warn!("stale write rejected for multiplayer game {}", game.game_code);
            return Ok(false);
        }

        game.version += 1;
        Ok(true)
    }

    pub async fn bot_usernames(&self) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query("SELECT username FROM bot_usernames ORDER BY id", ())
            .await?;
        let mut names = Vec::new();
        while let Some(row) = rows.next().await? {
            names.push(row.get::<String>(0)?);
        }
        Ok(names)
    }

    /// Stores a chest layout for the slot unless one exists, then returns the stored one.
    pub async fn bonus_chests(
        &self,
        game_id: i64,
        slot: i64,
        layout: &[i64],
    ) -> Result<BonusChestRow> {
        let conn = self.connect()?;
        let joined = layout
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");

        conn.execute(
            r#"
            INSERT OR IGNORE INTO multiplayer_bonus_games (game_id, slot, chest_values)
            VALUES (?, ?, ?)
            "#,
            params![game_id, slot, joined],
        )
        .await?;

        query_optional(
            &conn,
            r#"
            SELECT slot, chest_values, chosen_chest, bonus_points
            FROM multiplayer_bonus_games WHERE game_id = ? AND slot = ?
            "#,
            params![game_id, slot],
        )
        .await?
        .ok_or_else(|| color_eyre::eyre::eyre!("bonus chests missing for game {game_id}"))
    }

    /// Records the opened chest once; `false` if the slot already opened one.
    pub async fn claim_bonus_chest(
        &self,
        game_id: i64,
        slot: i64,
        chest: i64,
        points: i64,
    ) -> Result<bool> {
        let conn = self.connect()?;
        let tx = conn.transaction().await?;

        let affected = tx
            .execute(
                r#"
                UPDATE multiplayer_bonus_games SET chosen_chest = ?, bonus_points = ?
                WHERE game_id = ? AND slot = ? AND chosen_chest IS NULL
                "#,
                params![chest, points, game_id, slot],
            )
            .await?;

        if affected == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.execute(
            "UPDATE multiplayer_players SET bonus_claimed = 1 WHERE game_id = ? AND slot = ?",
            params![game_id, slot],
        )
        .await?;
        tx.commit().await?;

        tracing::info!("slot {slot} of game {game_id} opened chest {chest} for {points} points");
        Ok(true)
    }
}
