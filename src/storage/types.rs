use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of voyager appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Classify a sqlx error, mapping lock contention to `InstanceLocked`.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Where a setting applies.
///
/// Lookups fall back from the most specific scope to the user-wide one and
/// then to the global one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingScope {
    pub user_handle: Option<String>,
    pub community: Option<String>,
}

impl SettingScope {
    pub fn global() -> Self {
        Self::default()
    }

    pub fn user(handle: impl Into<String>) -> Self {
        Self {
            user_handle: Some(handle.into()),
            community: None,
        }
    }

    pub fn community(mut self, community: impl Into<String>) -> Self {
        self.community = Some(community.into());
        self
    }

    /// Column values as stored; unset parts are empty strings.
    pub(crate) fn columns(&self) -> (&str, &str) {
        (
            self.user_handle.as_deref().unwrap_or_default(),
            self.community.as_deref().unwrap_or_default(),
        )
    }
}

// ============================================================================
// Post Metadata
// ============================================================================

/// Per-user flags stored for a post.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PostMetadata {
    pub post_id: i64,
    pub user_handle: String,
    pub hidden: bool,
    /// Unix seconds of the last change.
    pub updated_at: i64,
}

impl PostMetadata {
    pub fn hidden(post_id: i64, user_handle: &str, hidden: bool) -> Self {
        Self {
            post_id,
            user_handle: user_handle.to_string(),
            hidden,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }
}
