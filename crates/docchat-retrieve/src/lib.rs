//! DocChat Retrieve: semantic search over a chat's document chunks.
//!
//! `search_in_rag` embeds a query, ranks stored chunks by cosine distance
//! and shapes the hits for the model. Failures never propagate: they come
//! back as a `Failed` outcome the model can read.

pub mod search;
pub mod tool;
pub mod types;

pub use search::search_in_rag;
pub use tool::SearchInRagTool;
pub use types::*;
