//! # libragen-ingest
//!
//! The front half of the pack build pipeline: walking source trees into
//! text files and splitting those files into overlapping chunks with line
//! metadata.

mod chunker;
mod error;
mod language;
mod reader;

pub use chunker::{Chunk, ChunkerConfig, chunk_text};
pub use error::IngestError;
pub use language::language_for_path;
pub use reader::{ReaderConfig, SourceFile, read_sources};
