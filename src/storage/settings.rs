use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};

use super::schema::Database;
use super::types::SettingScope;

impl Database {
    // ========================================================================
    // Settings Operations
    // ========================================================================

    /// Look up a setting, falling back to broader scopes.
    ///
    /// The order is community-and-user, user only, community only, then
    /// global. A stored value that no longer deserializes as `T` is logged
    /// and treated as missing.
    pub async fn get_setting<T: DeserializeOwned>(
        &self,
        key: &str,
        scope: &SettingScope,
    ) -> Result<Option<T>> {
        let (user_handle, community) = scope.columns();
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT value FROM settings
            WHERE key = ?
              AND user_handle IN (?, '')
              AND community IN (?, '')
            ORDER BY (user_handle = '') ASC, (community = '') ASC
            LIMIT 1
        "#,
        )
        .bind(key)
        .bind(user_handle)
        .bind(community)
        .fetch_optional(&self.pool)
        .await?;

        let Some((raw,)) = row else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Ignoring unreadable stored setting");
                Ok(None)
            }
        }
    }

    /// Store a setting for exactly `scope` (UPSERT).
    pub async fn set_setting<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        scope: &SettingScope,
    ) -> Result<()> {
        let (user_handle, community) = scope.columns();
        let value = serde_json::to_string(value)?;
        sqlx::query(
            r#"
            INSERT INTO settings (key, user_handle, community, value, updated_at)
            VALUES (?, ?, ?, ?, datetime('now'))
            ON CONFLICT(key, user_handle, community)
            DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(user_handle)
        .bind(community)
        .bind(&value)
        .execute(&self.pool)
        .await?;

        tracing::debug!(key = %key, user_handle, community, "Setting saved");
        Ok(())
    }

    /// Remove the setting stored for exactly `scope`; broader scopes are untouched.
    pub async fn delete_setting(&self, key: &str, scope: &SettingScope) -> Result<()> {
        let (user_handle, community) = scope.columns();
        sqlx::query("DELETE FROM settings WHERE key = ? AND user_handle = ? AND community = ?")
            .bind(key)
            .bind(user_handle)
            .bind(community)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::lemmy::SortType;
    use crate::storage::{Database, SettingScope};
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_missing_setting_is_none() {
        let db = test_db().await;
        let value: Option<bool> = db
            .get_setting("infinite_scrolling", &SettingScope::global())
            .await
            .unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_set_setting_upserts() {
        let db = test_db().await;
        let scope = SettingScope::global();
        db.set_setting("post_sort", &SortType::Hot, &scope).await.unwrap();
        db.set_setting("post_sort", &SortType::New, &scope).await.unwrap();

        let value: Option<SortType> = db.get_setting("post_sort", &scope).await.unwrap();
        assert_eq!(value, Some(SortType::New));
    }

    #[tokio::test]
    async fn test_scope_fallback_order() {
        let db = test_db().await;
        let global = SettingScope::global();
        let user = SettingScope::user("alice@lemmy.world");
        let community = SettingScope::user("alice@lemmy.world").community("rust@lemmy.ml");

        db.set_setting("post_sort", &SortType::Active, &global).await.unwrap();
        let value: Option<SortType> = db.get_setting("post_sort", &community).await.unwrap();
        assert_eq!(value, Some(SortType::Active));

        db.set_setting("post_sort", &SortType::Hot, &user).await.unwrap();
        let value: Option<SortType> = db.get_setting("post_sort", &community).await.unwrap();
        assert_eq!(value, Some(SortType::Hot));

        db.set_setting("post_sort", &SortType::TopDay, &community).await.unwrap();
        let value: Option<SortType> = db.get_setting("post_sort", &community).await.unwrap();
        assert_eq!(value, Some(SortType::TopDay));

        // Another user only sees the global value
        let other = SettingScope::user("bob@lemmy.world").community("rust@lemmy.ml");
        let value: Option<SortType> = db.get_setting("post_sort", &other).await.unwrap();
        assert_eq!(value, Some(SortType::Active));

        // Deleting the specific value exposes the user-wide one again
        db.delete_setting("post_sort", &community).await.unwrap();
        let value: Option<SortType> = db.get_setting("post_sort", &community).await.unwrap();
        assert_eq!(value, Some(SortType::Hot));
    }

    #[tokio::test]
    async fn test_unreadable_setting_is_ignored() {
        let db = test_db().await;
        let scope = SettingScope::global();
        db.set_setting("post_sort", "Sideways", &scope).await.unwrap();

        let value: Option<SortType> = db.get_setting("post_sort", &scope).await.unwrap();
        assert_eq!(value, None);
    }
}
