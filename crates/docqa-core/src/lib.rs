//! # docqa core
//!
//! Retrieval-augmented question answering over a single document:
//! chunking, the embedding / generation / vector index capability traits,
//! an exhaustive cosine index, retrieval, prompt assembly, and the
//! build-once, query-many pipeline.
//!
//! This crate contains no model runtimes, network clients, or filesystem
//! I/O. Concrete backends live in the `docqa` app crate; tests use
//! deterministic fakes.
//!
//! ```text
//! text ──▶ chunk ──▶ Embedder ──▶ VectorIndex::build      (build phase)
//! question ──▶ Retriever ──▶ prompt ──▶ GenerationModel   (query phase)
//! ```

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod pipeline;
pub mod prompt;
pub mod retrieve;
