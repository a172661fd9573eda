use color_eyre::Result;
use libsql::params;

use super::helpers::{optional_text, query_all, query_i64, query_optional};
use super::models::{Image, IMAGE_COLUMNS};
use super::Db;
use crate::models::{Difficulty, ImageKind};

impl Db {
    pub async fn insert_image(
        &self,
        filename: &str,
        kind: ImageKind,
        difficulty: Option<Difficulty>,
        category: Option<&str>,
        description: Option<&str>,
    ) -> Result<i64> {
        let conn = self.connect()?;
        let id = query_i64(
            &conn,
            r#"INSERT INTO images (filename, type, difficulty, category, description)
               VALUES (?, ?, ?, ?, ?) RETURNING id"#,
            params![
                filename,
                kind.as_str(),
                optional_text(difficulty.map(Difficulty::as_str)),
                optional_text(category),
                optional_text(description)
            ],
        )
        .await?;

        tracing::debug!("image registered: id={id}, filename={filename}, type={}", kind.as_str());
        Ok(id)
    }

    pub async fn image(&self, image_id: i64) -> Result<Option<Image>> {
        let conn = self.connect()?;
        query_optional(
            &conn,
            &format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id = ?"),
            params![image_id],
        )
        .await
    }

    /// Every image stored under the kind's directory, whatever type the row claims.
    pub async fn images_in_bucket(&self, kind: ImageKind) -> Result<Vec<Image>> {
        let conn = self.connect()?;
        query_all(
            &conn,
            &format!("SELECT {IMAGE_COLUMNS} FROM images WHERE filename LIKE ? ORDER BY id"),
            params![format!("{}%", kind.bucket())],
        )
        .await
    }

    pub async fn image_count(&self, kind: ImageKind) -> Result<i64> {
        let conn = self.connect()?;
        query_i64(
            &conn,
            "SELECT COUNT(*) FROM images WHERE type = ?",
            params![kind.as_str()],
        )
        .await
    }

    pub async fn set_image_difficulty(&self, image_id: i64, difficulty: Difficulty) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE images SET difficulty = ? WHERE id = ?",
            params![difficulty.as_str(), image_id],
        )
        .await?;
        Ok(())
    }

    pub async fn set_image_description(&self, image_id: i64, description: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE images SET description = ? WHERE id = ?",
            params![description, image_id],
        )
        .await?;
        Ok(())
    }
}
