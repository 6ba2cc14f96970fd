//! DocChat Core: shared error type and configuration.

pub mod config;
pub mod error;

pub use config::{DataPaths, DocChatConfig, ProviderSettings};
pub use error::{Error, Result};
