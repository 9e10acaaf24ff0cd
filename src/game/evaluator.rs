// Semantic guess evaluation. Runs only after exact matching failed, and
// never surfaces an error: the worst outcome is "not correct".

use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::CompletionBackend;
use crate::seeds::prompts;

const EVALUATION_TEMPERATURE: f32 = 0.0;
const EVALUATION_MAX_TOKENS: u32 = 10;
/// Answers listed in the prompt beyond the correct event itself.
const MAX_OTHER_ANSWERS: usize = 10;

pub struct GuessEvaluator {
    backend: Arc<dyn CompletionBackend>,
}

impl GuessEvaluator {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Ask the model whether the guess means the same thing as the
    /// correct answer. Every failure mode resolves to `false`.
    pub async fn is_equivalent(
        &self,
        guess: &str,
        correct_event: &str,
        acceptable: &[String],
    ) -> bool {
        let guess = guess.trim();
        if guess.is_empty() {
            return false;
        }
        if !self.backend.is_configured() {
            debug!("completion backend not configured, treating guess as incorrect");
            return false;
        }

        let others = other_answers(acceptable, correct_event);
        let prompt = prompts::build_guess_prompt(guess, correct_event, &others);
        match self
            .backend
            .complete(&prompt, EVALUATION_TEMPERATURE, EVALUATION_MAX_TOKENS)
            .await
        {
            Ok(text) => is_affirmative(&text),
            Err(err) => {
                warn!(error = %err, "guess evaluation failed");
                false
            }
        }
    }
}

fn other_answers(acceptable: &[String], correct_event: &str) -> String {
    let correct = correct_event.trim().to_lowercase();
    let others: Vec<&str> = acceptable
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty() && a.to_lowercase() != correct)
        .take(MAX_OTHER_ANSWERS)
        .collect();
    if others.is_empty() {
        "none".to_string()
    } else {
        others.join(", ")
    }
}

/// Affirmative when "true" or "yes" appears as a standalone word, or the
/// whole reply is the digit one.
fn is_affirmative(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    if lowered == "1" {
        return true;
    }
    lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| token == "true" || token == "yes")
}
