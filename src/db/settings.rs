use color_eyre::Result;
use libsql::params;

use super::Db;

impl Db {
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.connect()?;
        let row = conn
            .query("SELECT value FROM settings WHERE key = ?", params![key])
            .await?
            .next()
            .await?;

        match row {
            Some(row) => Ok(Some(row.get::<String>(0)?)),
            None => Ok(None),
        }
    }

    pub async fn update_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![key, value],
        )
        .await?;

        tracing::info!("setting updated: {key}={value}");
        Ok(())
    }

    /// Integer setting, or `default` when unset or unparsable.
    pub async fn setting_i64(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self
            .get_setting(key)
            .await?
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default))
    }
}
