/// Ingestion side: windowed chunking and the indexing pipeline.
pub mod chunker;
pub mod core;
