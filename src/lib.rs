//! # docqa
//!
//! Ask questions about a single document with retrieval-augmented
//! generation.
//!
//! The RAG pipeline itself (chunking, the vector index, retrieval, prompt
//! assembly) lives in [`docqa_core`]. This crate supplies what the core
//! leaves to its callers: configuration, text extraction, and the concrete
//! embedding and generation backends.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌───────────────────────┐
//! │ PDF/text │──▶│    extract    │──▶│  docqa_core pipeline  │
//! └──────────┘   └───────────────┘   │ chunk → embed → index │
//!                                    └──────────┬────────────┘
//!                   ┌─────────────┐             │ question
//!                   │   models    │────────────▶▼
//!                   │ embed + gen │   retrieve → prompt → answer
//!                   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docqa ask report.pdf "What were the main findings?"
//! docqa ask report.pdf "Who funded the study?" --sources
//! docqa chat report.pdf           # one question per line on stdin
//! docqa chunks report.pdf         # inspect chunk boundaries
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF and plain-text extraction |
//! | [`embedding`] | Embedding backends (fastembed, Ollama, OpenAI) |
//! | [`generation`] | Generation backends (candle T5, Ollama, OpenAI) |
//! | [`models`] | Load-once model handles |
//! | [`http`] | JSON POST with retry and backoff |
//! | [`progress`] | Build progress on stderr |

pub mod config;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod http;
pub mod models;
pub mod progress;
