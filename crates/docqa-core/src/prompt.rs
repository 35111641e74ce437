//! Prompt assembly under a token budget.
//!
//! The prompt is a fixed instruction, the retrieved chunk texts in rank
//! order, and the question. When the result exceeds the model's input
//! limit, retrieved chunks are dropped starting from the lowest-ranked one;
//! the question is only truncated once no context is left.

use tracing::warn;

use crate::chunk::Chunk;
use crate::error::PipelineError;
use crate::generation::GenerationModel;

/// Instruction placed before the retrieved context.
pub const INSTRUCTION: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Context line used when retrieval returned nothing.
pub const NO_CONTEXT: &str = "No relevant context was found in the document.";

/// A prompt ready for the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    /// How many of the retrieved chunks made it into the prompt.
    pub chunks_used: usize,
    /// Whether the question had to be cut to fit.
    pub question_truncated: bool,
}

/// Render the template without any budget checks.
pub fn render(contexts: &[&str], question: &str) -> String {
    let context = if contexts.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        contexts.join("\n\n")
    };
    format!(
        "{}\n\n{}\n\nQuestion: {}\nHelpful Answer:",
        INSTRUCTION, context, question
    )
}

/// Build the prompt for `question` from ranked `chunks`, fitting it into
/// `model.max_input_tokens()`.
///
/// # Errors
///
/// [`PipelineError::Generation`] if even the instruction with an empty
/// question does not fit.
pub fn assemble(
    chunks: &[&Chunk],
    question: &str,
    model: &dyn GenerationModel,
) -> Result<Prompt, PipelineError> {
    let budget = model.max_input_tokens();
    let fits = |text: &str| model.count_tokens(text) <= budget;

    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    for used in (0..=texts.len()).rev() {
        let text = render(&texts[..used], question);
        if fits(&text) {
            if used < texts.len() {
                warn!(
                    dropped = texts.len() - used,
                    budget, "prompt over budget, dropped lowest-ranked chunks"
                );
            }
            return Ok(Prompt {
                text,
                chunks_used: used,
                question_truncated: false,
            });
        }
    }

    if !fits(&render(&[], "")) {
        return Err(PipelineError::Generation(format!(
            "prompt template alone exceeds the model input limit of {} tokens",
            budget
        )));
    }

    // Longest question prefix that fits, by binary search over char counts.
    let boundaries: Vec<usize> = question
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(question.len()))
        .collect();
    let (mut lo, mut hi) = (0usize, boundaries.len() - 1);
    while lo < hi {
        let mid = (lo + hi).div_ceil(2);
        if fits(&render(&[], &question[..boundaries[mid]])) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }

    let truncated = question[..boundaries[lo]].trim_end();
    warn!(kept_chars = lo, budget, "question over budget, truncated");
    Ok(Prompt {
        text: render(&[], truncated),
        chunks_used: 0,
        question_truncated: true,
    })
}
