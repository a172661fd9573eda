// Database module - provides data access layer

use std::sync::Arc;

use color_eyre::{eyre::OptionExt, Result};

// Re-export models for convenience
pub mod models;
pub use models::*;

pub mod helpers;

// Internal modules
mod achievement;
mod daily;
mod game;
mod image;
mod leaderboard;
mod migrations;
mod multiplayer;
mod settings;
mod user;

pub use game::NewGame;
pub use multiplayer::NewMultiplayerGame;
pub use user::{hash_password, verify_password};

// Main database handle
#[derive(Clone)]
pub struct Db {
    db: Arc<libsql::Database>,
}

impl Db {
    /// `file:` urls open a local SQLite file, anything else a remote libSQL server.
    pub async fn new(url: String, auth_token: String) -> Result<Self> {
        let db = if let Some(path) = url.strip_prefix("file:") {
            libsql::Builder::new_local(path).build().await?
        } else {
            libsql::Builder::new_remote(url, auth_token).build().await?
        };

        let conn = db.connect()?;

        // Verify connection
        let one = conn
            .query("SELECT 1", ())
            .await?
            .next()
            .await?
            .ok_or_eyre("connection check failed")?
            .get::<i32>(0)?;
        if one != 1 {
            color_eyre::eyre::bail!("connection check returned {one}");
        }

        migrations::run(&conn).await?;

        tracing::info!("database connection has been verified");

        Ok(Self { db: Arc::new(db) })
    }

    pub(crate) fn connect(&self) -> Result<libsql::Connection> {
        let conn = self.db.connect()?;
        Ok(conn)
    }

    pub async fn migration_applied(&self, version: &str) -> Result<bool> {
        let conn = self.connect()?;
        migrations::is_applied(&conn, version).await
    }
}
