use chrono::NaiveDateTime;
use color_eyre::Result;
use libsql::params;

use super::helpers::{query_all, query_i64, sql_time};
use super::models::{Achievement, UserAchievement};
use super::Db;

impl Db {
    pub async fn achievements(&self) -> Result<Vec<Achievement>> {
        let conn = self.connect()?;
        query_all(
            &conn,
            "SELECT id, criteria, name, description FROM achievements ORDER BY id",
            (),
        )
        .await
    }

    pub async fn user_achievements(&self, user_id: i64) -> Result<Vec<UserAchievement>> {
        let conn = self.connect()?;
        query_all(
            &conn,
            r#"
            SELECT a.criteria, a.name, ua.unlocked_at
            FROM user_achievements ua
            JOIN achievements a ON a.id = ua.achievement_id
            WHERE ua.user_id = ?
            ORDER BY ua.unlocked_at, a.id
            "#,
            params![user_id],
        )
        .await
    }

    pub async fn has_achievement(&self, user_id: i64, criteria: &str) -> Result<bool> {
        let conn = self.connect()?;
        let count = query_i64(
            &conn,
            r#"
            SELECT COUNT(*) FROM user_achievements ua
            JOIN achievements a ON a.id = ua.achievement_id
            WHERE ua.user_id = ? AND a.criteria = ?
            "#,
            params![user_id, criteria],
        )
        .await?;
        Ok(count > 0)
    }

    /// Inserts the junction row unless it exists. `true` only when a row was added;
    /// an unknown criteria tag adds nothing.
    pub async fn grant_achievement(
        &self,
        user_id: i64,
        criteria: &str,
        at: NaiveDateTime,
    ) -> Result<bool> {
        let conn = self.connect()?;
        let affected = conn
            .execute(
                r#"
                INSERT OR IGNORE INTO user_achievements (user_id, achievement_id, unlocked_at)
                SELECT ?, id, ? FROM achievements WHERE criteria = ?
                "#,
                params![user_id, sql_time(at), criteria],
            )
            .await?;

        if affected > 0 {
            tracing::info!("achievement unlocked: user_id={user_id}, criteria={criteria}");
        }
        Ok(affected > 0)
    }

    pub async fn held_criteria(&self, user_id: i64) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                r#"
                SELECT a.criteria FROM user_achievements ua
                JOIN achievements a ON a.id = ua.achievement_id
                WHERE ua.user_id = ?
                "#,
                params![user_id],
            )
            .await?;

        let mut criteria = Vec::new();
        while let Some(row) = rows.next().await? {
            criteria.push(row.get::<String>(0)?);
        }
        Ok(criteria)
    }

    pub async fn catalog_criteria(&self) -> Result<Vec<String>> {
        Ok(self
            .achievements()
            .await?
            .into_iter()
            .map(|a| a.criteria)
            .collect())
    }
}
