//! DocChat Store: SQLite chats, messages and vector-searchable document chunks.

pub mod embedding;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::SqliteStore;
pub use types::*;
