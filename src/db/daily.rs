use chrono::NaiveDateTime;
use color_eyre::Result;
use libsql::params;

use super::helpers::{optional_text, query_optional, sql_time, SQL_DATE_FORMAT};
use super::models::{DailyChallengeRecord, DailyHistory};
use super::Db;

impl Db {
    pub async fn daily_record(&self, username: &str) -> Result<Option<DailyChallengeRecord>> {
        let conn = self.connect()?;
        query_optional(
            &conn,
            r#"
            SELECT username, date_last_challenge, next_challenge_date, games_completed, streak
            FROM daily_challenge WHERE username = ?
            "#,
            params![username],
        )
        .await
    }

    pub async fn save_daily_record(&self, record: &DailyChallengeRecord) -> Result<()> {
        let conn = self.connect()?;
        let last = record
            .date_last_challenge
            .map(|d| d.format(SQL_DATE_FORMAT).to_string());

        conn.execute(
            r#"
            INSERT INTO daily_challenge
                (username, date_last_challenge, next_challenge_date, games_completed, streak)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(username) DO UPDATE SET
                date_last_challenge = excluded.date_last_challenge,
                next_challenge_date = excluded.next_challenge_date,
                games_completed = excluded.games_completed,
                streak = excluded.streak
            "#,
            params![
                record.username.as_str(),
                optional_text(last.as_deref()),
                sql_time(record.next_challenge_date),
                record.games_completed,
                record.streak
            ],
        )
        .await?;
        Ok(())
    }

    /// Marks today's attempt as taken by moving the unlock to `next`, but only if
    /// the challenge was unlocked at `now`. Returns false when another attempt
    /// already holds the day.
    pub async fn claim_daily_attempt(
        &self,
        username: &str,
        now: NaiveDateTime,
        next: NaiveDateTime,
    ) -> Result<bool> {
        let conn = self.connect()?;
        let affected = conn
            .execute(
                r#"
                INSERT INTO daily_challenge (username, next_challenge_date)
                VALUES (?, ?)
                ON CONFLICT(username) DO UPDATE SET
                    next_challenge_date = excluded.next_challenge_date
                WHERE daily_challenge.next_challenge_date <= ?
                "#,
                params![username, sql_time(next), sql_time(now)],
            )
            .await?;
        Ok(affected > 0)
    }

    pub async fn daily_history(&self, username: &str) -> Result<DailyHistory> {
        let conn = self.connect()?;
        Ok(query_optional(
            &conn,
            r#"
            SELECT seen_real_images, seen_ai_images
            FROM daily_challenge_history WHERE username = ?
            "#,
            params![username],
        )
        .await?
        .unwrap_or_default())
    }

    pub async fn save_daily_history(&self, username: &str, history: &DailyHistory) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO daily_challenge_history (username, seen_real_images, seen_ai_images)
            VALUES (?, ?, ?)
            ON CONFLICT(username) DO UPDATE SET
                seen_real_images = excluded.seen_real_images,
                seen_ai_images = excluded.seen_ai_images
            "#,
            params![
                username,
                history.seen_real_images.join(),
                history.seen_ai_images.join()
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn user_avatars(&self, user_id: i64) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT avatar FROM user_avatars WHERE user_id = ? ORDER BY id",
                params![user_id],
            )
            .await?;
        let mut avatars = Vec::new();
        while let Some(row) = rows.next().await? {
            avatars.push(row.get::<String>(0)?);
        }
        Ok(avatars)
    }

    pub async fn grant_avatar(&self, user_id: i64, avatar: &str, at: NaiveDateTime) -> Result<bool> {
        let conn = self.connect()?;
        let affected = conn
            .execute(
                r#"
                INSERT OR IGNORE INTO user_avatars (user_id, avatar, unlocked_at)
                VALUES (?, ?, ?)
                "#,
                params![user_id, avatar, sql_time(at)],
            )
            .await?;
        Ok(affected > 0)
    }
}
