//! Build progress reporting for the CLI.
//!
//! Loading models and indexing a large PDF can take a while, so the CLI
//! reports each stage of preparing a document. Progress is emitted on
//! **stderr** so stdout carries only answers and stays parseable for
//! scripts.

use std::io::Write;

/// A stage of preparing a document for questions.
#[derive(Clone, Debug, PartialEq)]
pub enum BuildStage {
    /// Reading and extracting text from the input file.
    Extracting { path: String },
    /// Loading the embedding and generation models.
    LoadingModels { embedder: String, generator: String },
    /// Chunking and embedding the extracted text.
    Indexing { chars: u64 },
    /// Index built; ready for questions.
    Ready { chunks: u64, elapsed_ms: u64 },
}

/// Reports build progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, stage: BuildStage);
}

/// Human-friendly progress on stderr: "docqa  indexing  12,345 chars".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, stage: BuildStage) {
        let line = match &stage {
            BuildStage::Extracting { path } => format!("docqa  extracting  {}\n", path),
            BuildStage::LoadingModels {
                embedder,
                generator,
            } => format!("docqa  loading models  {} + {}\n", embedder, generator),
            BuildStage::Indexing { chars } => {
                format!("docqa  indexing  {} chars\n", format_number(*chars))
            }
            BuildStage::Ready { chunks, elapsed_ms } => format!(
                "docqa  ready  {} chunks in {} ms\n",
                format_number(*chunks),
                format_number(*elapsed_ms)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, stage: BuildStage) {
        let obj = stage_json(&stage);
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

fn stage_json(stage: &BuildStage) -> serde_json::Value {
    match stage {
        BuildStage::Extracting { path } => serde_json::json!({
            "event": "progress",
            "phase": "extracting",
            "path": path
        }),
        BuildStage::LoadingModels {
            embedder,
            generator,
        } => serde_json::json!({
            "event": "progress",
            "phase": "loading_models",
            "embedder": embedder,
            "generator": generator
        }),
        BuildStage::Indexing { chars } => serde_json::json!({
            "event": "progress",
            "phase": "indexing",
            "chars": chars
        }),
        BuildStage::Ready { chunks, elapsed_ms } => serde_json::json!({
            "event": "progress",
            "phase": "ready",
            "chunks": chunks,
            "elapsed_ms": elapsed_ms
        }),
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _stage: BuildStage) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
