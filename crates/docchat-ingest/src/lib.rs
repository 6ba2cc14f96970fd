//! DocChat Ingest: turns uploaded files into embedded chunks.

pub mod chunking;
pub mod file;
pub mod ingest;

pub use chunking::{SmartChunker, TextChunk};
pub use file::{extract_text, DocumentFormat};
pub use ingest::{IngestReport, Ingester};
