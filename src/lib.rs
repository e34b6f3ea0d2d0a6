//! # ragdex — local document question answering
//!
//! Splits page text into overlapping windows, embeds them, and keeps the
//! vectors in an append-only exact nearest-neighbor index next to a
//! parallel metadata store. Questions are embedded the same way and
//! answered from the closest passages.
//!
//! ## Architecture
//!
//! - **[`indexer`]** — Character-window chunker and the ingestion pipeline
//! - **[`store`]** — Vector index, metadata store and the shared `Store` handle
//! - **[`retrieval`]** — Query embedding, nearest-neighbor search, passage resolution
//! - **[`embedder`]** — Embedding gateway trait (Ollama, offline mock)
//! - **[`answer`]** — Prompt building and answer generation
//! - **[`config`]** — Configuration loading and validation
//! - **[`extract`]** — Page text from PDF or form-feed separated text files
//!
//! The central invariant: vector ordinal id `i` and metadata entry `i`
//! always describe the same chunk. Only [`indexer::core::Indexer`] writes
//! to the store, one ingestion at a time.

pub mod answer;
pub mod config;
pub mod embedder;
pub mod error;
pub mod extract;
pub mod indexer;
pub mod retrieval;
pub mod store;

pub use error::{RagError, Result};
