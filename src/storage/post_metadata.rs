use anyhow::Result;

use super::schema::Database;
use super::types::PostMetadata;

/// Page size of [`Database::get_hidden_post_metadatas`].
pub const HIDDEN_PAGE_SIZE: i64 = 10;

impl Database {
    // ========================================================================
    // Post Metadata Operations
    // ========================================================================

    /// Insert or replace the metadata of one post.
    ///
    /// A replaced row moves to the end of the insertion order, so the
    /// most recently changed posts sort first in hidden-post listings.
    pub async fn upsert_post_metadata(&self, metadata: &PostMetadata) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM post_metadata WHERE post_id = ? AND user_handle = ?")
            .bind(metadata.post_id)
            .bind(&metadata.user_handle)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO post_metadata (post_id, user_handle, hidden, updated_at)
            VALUES (?, ?, ?, ?)
        "#,
        )
        .bind(metadata.post_id)
        .bind(&metadata.user_handle)
        .bind(metadata.hidden)
        .bind(metadata.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Metadata for the given posts. Posts with no stored row are absent.
    pub async fn get_post_metadatas(
        &self,
        post_ids: &[i64],
        user_handle: &str,
    ) -> Result<Vec<PostMetadata>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; post_ids.len()].join(", ");
        let sql = format!(
            "SELECT post_id, user_handle, hidden, updated_at FROM post_metadata \
             WHERE user_handle = ? AND post_id IN ({}) ORDER BY post_id",
            placeholders
        );

        let mut query = sqlx::query_as::<_, PostMetadata>(&sql).bind(user_handle);
        for id in post_ids {
            query = query.bind(*id);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Ids of every post the user has hidden.
    pub async fn get_hidden_post_ids(&self, user_handle: &str) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT post_id FROM post_metadata WHERE user_handle = ? AND hidden = 1",
        )
        .bind(user_handle)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// One page (1-based) of hidden posts, most recently hidden first.
    pub async fn get_hidden_post_metadatas(
        &self,
        user_handle: &str,
        page: u32,
    ) -> Result<Vec<PostMetadata>> {
        let offset = i64::from(page.max(1) - 1) * HIDDEN_PAGE_SIZE;
        let rows = sqlx::query_as::<_, PostMetadata>(
            r#"
            SELECT post_id, user_handle, hidden, updated_at FROM post_metadata
            WHERE user_handle = ? AND hidden = 1
            ORDER BY rowid DESC
            LIMIT ? OFFSET ?
        "#,
        )
        .bind(user_handle)
        .bind(HIDDEN_PAGE_SIZE)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
