use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::NaiveDateTime;
use color_eyre::Result;
use libsql::params;

use super::helpers::{bool_value, query_i64, query_optional, sql_time};
use super::models::{AuthUser, USER_COLUMNS};
use super::Db;

impl Db {
    pub async fn create_user(&self, username: &str, email: &str, password: &str) -> Result<i64> {
        let password_hash = hash_password(password)?;
        let conn = self.connect()?;

        let user_id = query_i64(
            &conn,
            "INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?) RETURNING id",
            params![username, email, password_hash],
        )
        .await?;

        tracing::info!("new user created: id={user_id}, username={username}");
        Ok(user_id)
    }

    pub async fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool> {
        let conn = self.connect()?;
        let count = query_i64(
            &conn,
            "SELECT COUNT(*) FROM users WHERE username = ? OR email = ?",
            params![username, email],
        )
        .await?;
        Ok(count > 0)
    }

    pub async fn find_user(&self, user_id: i64) -> Result<Option<AuthUser>> {
        let conn = self.connect()?;
        query_optional(
            &conn,
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
            params![user_id],
        )
        .await
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<AuthUser>> {
        let conn = self.connect()?;
        query_optional(
            &conn,
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"),
            params![username],
        )
        .await
    }

    /// Inactive accounts never verify.
    pub async fn verify_user_password(&self, username: &str, password: &str) -> Result<bool> {
        let conn = self.connect()?;
        let row = conn
            .query(
                "SELECT password_hash FROM users WHERE username = ? AND active = 1",
                params![username],
            )
            .await?
            .next()
            .await?;

        match row {
            Some(row) => {
                let stored_hash = row.get::<String>(0)?;
                Ok(verify_password(password, &stored_hash))
            }
            None => Ok(false),
        }
    }

    pub async fn set_admin(&self, user_id: i64, is_admin: bool) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE users SET is_admin = ? WHERE id = ?",
            params![bool_value(is_admin), user_id],
        )
        .await?;
        Ok(())
    }

    pub async fn set_vip(&self, user_id: i64, vip: bool) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE users SET vip = ? WHERE id = ?",
            params![bool_value(vip), user_id],
        )
        .await?;
        tracing::info!("user {user_id} vip={vip}");
        Ok(())
    }

    pub async fn complete_tutorial(&self, user_id: i64) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE users SET tutorial_completed = 1 WHERE id = ?",
            params![user_id],
        )
        .await?;
        Ok(())
    }

    pub async fn deactivate_user(&self, user_id: i64) -> Result<()> {
        let conn = self.connect()?;
        conn.execute("UPDATE users SET active = 0 WHERE id = ?", params![user_id])
            .await?;
        tracing::info!("user {user_id} deactivated");
        Ok(())
    }

    /// Upserts the address, bumping `last_seen` when it was seen before.
    pub async fn record_ip(&self, user_id: i64, ip_address: &str, at: NaiveDateTime) -> Result<()> {
        let conn = self.connect()?;
        let at = sql_time(at);
        conn.execute(
            r#"
            INSERT INTO user_ip_addresses (user_id, ip_address, first_seen, last_seen)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, ip_address) DO UPDATE SET last_seen = excluded.last_seen
            "#,
            params![user_id, ip_address, at.clone(), at],
        )
        .await?;
        Ok(())
    }

    pub async fn ip_addresses(&self, user_id: i64) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT ip_address FROM user_ip_addresses WHERE user_id = ? ORDER BY last_seen DESC",
                params![user_id],
            )
            .await?;
        let mut addresses = Vec::new();
        while let Some(row) = rows.next().await? {
            addresses.push(row.get::<String>(0)?);
        }
        Ok(addresses)
    }
}

/// Run argon2 hashing on a dedicated thread with a large stack to avoid
/// stack overflow in debug builds.
pub fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();
    std::thread::Builder::new()
        .stack_size(4 * 1024 * 1024)
        .spawn(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|h| h.to_string())
                .map_err(|e| color_eyre::eyre::eyre!("failed to hash password: {e}"))
        })?
        .join()
        .map_err(|_| color_eyre::eyre::eyre!("hash thread panicked"))?
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let password = password.to_string();
    let hash = hash.to_string();
    std::thread::Builder::new()
        .stack_size(4 * 1024 * 1024)
        .spawn(move || match PasswordHash::new(&hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        })
        .map(|h| h.join().unwrap_or(false))
        .unwrap_or(false)
}
