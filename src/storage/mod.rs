mod post_metadata;
mod schema;
mod settings;
mod types;

pub use post_metadata::HIDDEN_PAGE_SIZE;
pub use schema::Database;
pub use types::{DatabaseError, PostMetadata, SettingScope};
