//! kbchat indexing - document ingestion into tenant knowledge bases
//!
//! Uploaded files are parsed by type ([`loader`]), split into overlapping chunks
//! ([`splitter`]), embedded and written to the tenant's vector index ([`pipeline`]).

pub mod loader;
pub mod pipeline;
pub mod splitter;

pub use loader::*;
pub use pipeline::*;
pub use splitter::*;
