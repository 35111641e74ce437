//! # docqa CLI
//!
//! Answers questions about one document. The document is extracted,
//! chunked, embedded and indexed once; every question is then answered
//! from the top-K most similar chunks.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa ask <file> <question>` | Answer one question |
//! | `docqa chat <file>` | Answer each line read from stdin |
//! | `docqa chunks <file>` | Print the chunks a document splits into |
//!
//! Answers go to stdout. Logs (`RUST_LOG`, default `info`) and progress go
//! to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use docqa::config::{self, Config};
use docqa::extract::extract_file;
use docqa::models::{load_models, model_labels};
use docqa::progress::{BuildStage, ProgressMode, ProgressReporter};
use docqa_core::chunk::chunk_text;
use docqa_core::error::PipelineError;
use docqa_core::pipeline::{build_pipeline, ensure_document, Pipeline};

const DEFAULT_CONFIG: &str = "./config/docqa.toml";

/// docqa: ask questions about a PDF or text document.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docqa.example.toml` for every setting.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Ask questions about a document with retrieval-augmented generation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docqa.toml`; built-in defaults are used when
    /// that file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Build progress on stderr. Defaults to `human` on a terminal,
    /// `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question about a document.
    Ask {
        /// PDF, text, or Markdown file.
        file: PathBuf,

        /// The question. Multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Also print the retrieved chunks and their scores.
        #[arg(long)]
        sources: bool,

        /// Chunks to retrieve (overrides `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Index a document once, then answer each line read from stdin.
    ///
    /// Empty lines are skipped; `exit`, `quit`, or end of input stops.
    Chat {
        /// PDF, text, or Markdown file.
        file: PathBuf,

        /// Chunks to retrieve (overrides `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Print the chunks a document is split into. Loads no models.
    Chunks {
        /// PDF, text, or Markdown file.
        file: PathBuf,

        /// Overrides `chunking.chunk_size`.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Overrides `chunking.chunk_overlap`.
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut cfg = resolve_config(cli.config.as_deref())?;
    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Ask {
            file,
            question,
            sources,
            top_k,
        } => {
            if let Some(k) = top_k {
                cfg.retrieval.top_k = k;
            }
            let question = question.join(" ");
            run_ask(&cfg, &file, &question, sources, progress.as_ref())?;
        }
        Commands::Chat { file, top_k } => {
            if let Some(k) = top_k {
                cfg.retrieval.top_k = k;
            }
            run_chat(&cfg, &file, progress.as_ref())?;
        }
        Commands::Chunks {
            file,
            chunk_size,
            chunk_overlap,
        } => {
            if let Some(size) = chunk_size {
                cfg.chunking.chunk_size = size;
            }
            if let Some(overlap) = chunk_overlap {
                cfg.chunking.chunk_overlap = overlap;
            }
            run_chunks(&cfg, &file)?;
        }
    }

    Ok(())
}

/// An explicit `--config` must exist; the default path is optional.
fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => config::load_config(path),
        None => {
            let path = Path::new(DEFAULT_CONFIG);
            if path.exists() {
                config::load_config(path)
            } else {
                Ok(Config::default())
            }
        }
    }
}

/// Extract, load models, and index `file`.
///
/// Empty documents are rejected before any model is loaded.
fn prepare(cfg: &Config, file: &Path, progress: &dyn ProgressReporter) -> Result<Pipeline> {
    let pipeline_config = cfg.pipeline_config();
    pipeline_config.validate()?;

    progress.report(BuildStage::Extracting {
        path: file.display().to_string(),
    });
    let text = extract_file(file).map_err(PipelineError::from)?;
    ensure_document(&text)?;

    let (embedder, generator) = model_labels(cfg);
    progress.report(BuildStage::LoadingModels {
        embedder,
        generator,
    });
    let models = load_models(cfg)?;

    let started = Instant::now();
    progress.report(BuildStage::Indexing {
        chars: text.chars().count() as u64,
    });
    let pipeline = build_pipeline(&text, &pipeline_config, &models)
        .with_context(|| format!("Failed to index {}", file.display()))?;
    progress.report(BuildStage::Ready {
        chunks: pipeline.chunk_count() as u64,
        elapsed_ms: started.elapsed().as_millis() as u64,
    });

    Ok(pipeline)
}

fn run_ask(
    cfg: &Config,
    file: &Path,
    question: &str,
    show_sources: bool,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let pipeline = prepare(cfg, file, progress)?;
    let answer = pipeline.answer(question)?;

    println!("{}", answer.text);

    if show_sources {
        println!();
        for (rank, hit) in answer.sources.iter().enumerate() {
            let marker = if rank < answer.chunks_used { "" } else { " (not in prompt)" };
            println!(
                "── source {} · chunk {} · score {:.3}{} ──",
                rank + 1,
                hit.chunk.index,
                hit.score,
                marker
            );
            println!("{}", hit.chunk.text.trim());
        }
    }

    Ok(())
}

fn run_chat(cfg: &Config, file: &Path, progress: &dyn ProgressReporter) -> Result<()> {
    let pipeline = prepare(cfg, file, progress)?;
    let interactive = atty::is(atty::Stream::Stdin);

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if interactive {
            print!("> ");
            std::io::stdout().flush()?;
        }
        let line = match lines.next() {
            Some(line) => line.context("Failed to read question from stdin")?,
            None => break,
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        // A failed question is reported and the session continues.
        match pipeline.answer(question) {
            Ok(answer) => println!("{}", answer.text),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    Ok(())
}

fn run_chunks(cfg: &Config, file: &Path) -> Result<()> {
    let pipeline_config = cfg.pipeline_config();
    pipeline_config.validate()?;

    let text = extract_file(file).map_err(PipelineError::from)?;
    ensure_document(&text)?;

    let mut count = 0usize;
    for chunk in chunk_text(&text, pipeline_config.chunk_size, pipeline_config.chunk_overlap) {
        println!(
            "── chunk {} · bytes {}..{} · {} chars ──",
            chunk.index,
            chunk.start_offset,
            chunk.end_offset,
            chunk.char_len()
        );
        println!("{}", chunk.text);
        count += 1;
    }
    eprintln!("{} chunks", count);

    Ok(())
}
