// Single-slot game session state machine. One round is active at a time;
// a new round replaces the old one outright.

use tracing::info;

use crate::error::GameError;
use crate::metrics::{ACTIVE_GAME, GAMES_FINISHED_TOTAL, GAMES_STARTED_TOTAL, GUESSES_TOTAL};
use crate::puzzles::Puzzle;
use crate::seeds::SeedOrigin;

pub const MAX_ATTEMPTS: usize = 4;

/// The puzzle in play plus its guess bookkeeping.
#[derive(Debug, Clone)]
pub struct ActiveRound {
    pub puzzle: Puzzle,
    pub hints: [String; 4],
    pub attempts_remaining: usize,
    pub origin: SeedOrigin,
    /// Set once the round has been guessed correctly, so a repeat
    /// correct guess does not finish the game twice.
    resolved: bool,
}

impl ActiveRound {
    pub fn new(puzzle: Puzzle, hints: [String; 4], origin: SeedOrigin) -> Self {
        Self {
            puzzle,
            hints,
            attempts_remaining: MAX_ATTEMPTS,
            origin,
            resolved: false,
        }
    }

    fn reveal(&self) -> Reveal {
        Reveal {
            correct_event: self.puzzle.correct_event.clone(),
            explanation: self.puzzle.explanation.clone(),
        }
    }
}

/// The answer disclosure, sent on a win or once attempts run out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reveal {
    pub correct_event: String,
    pub explanation: String,
}

/// What one guess did to the session.
#[derive(Debug, Clone)]
pub struct GuessOutcome {
    pub correct: bool,
    pub attempts_remaining: usize,
    pub hint: Option<String>,
    pub reveal: Option<Reveal>,
}

#[derive(Default)]
pub struct GameSession {
    round: Option<ActiveRound>,
}

impl GameSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn round(&self) -> Option<&ActiveRound> {
        self.round.as_ref()
    }

    /// Install a new round, discarding any previous one.
    pub fn install(&mut self, round: ActiveRound) {
        GAMES_STARTED_TOTAL
            .with_label_values(&[round.origin.label()])
            .inc();
        ACTIVE_GAME.set(1);
        self.round = Some(round);
    }

    /// Apply an already-resolved guess verdict to the active round.
    /// Exhausted rounds repeat the reveal without consuming anything.
    pub fn apply_guess(&mut self, correct: bool) -> Result<GuessOutcome, GameError> {
        let round = self.round.as_mut().ok_or(GameError::NoActiveGame)?;

        if round.attempts_remaining == 0 {
            GUESSES_TOTAL.with_label_values(&["exhausted"]).inc();
            return Ok(GuessOutcome {
                correct: false,
                attempts_remaining: 0,
                hint: None,
                reveal: Some(round.reveal()),
            });
        }

        if correct {
            GUESSES_TOTAL.with_label_values(&["correct"]).inc();
            if !round.resolved {
                round.resolved = true;
                GAMES_FINISHED_TOTAL.with_label_values(&["won"]).inc();
                ACTIVE_GAME.set(0);
                info!(id = %round.puzzle.id, "game won");
            }
            return Ok(GuessOutcome {
                correct: true,
                attempts_remaining: round.attempts_remaining,
                hint: None,
                reveal: Some(round.reveal()),
            });
        }

        GUESSES_TOTAL.with_label_values(&["wrong"]).inc();
        round.attempts_remaining -= 1;
        let hint_index = MAX_ATTEMPTS - round.attempts_remaining - 1;
        let hint = round.hints.get(hint_index).cloned();
        let reveal = if round.attempts_remaining == 0 {
            GAMES_FINISHED_TOTAL.with_label_values(&["lost"]).inc();
            ACTIVE_GAME.set(0);
            info!(id = %round.puzzle.id, "game lost");
            Some(round.reveal())
        } else {
            None
        };
        Ok(GuessOutcome {
            correct: false,
            attempts_remaining: round.attempts_remaining,
            hint,
            reveal,
        })
    }
}

/// Case- and whitespace-insensitive membership test against the answer
/// set plus the correct event itself.
pub fn matches_answer(guess: &str, acceptable: &[String], correct_event: &str) -> bool {
    let guess = guess.trim().to_lowercase();
    if guess.is_empty() {
        return false;
    }
    correct_event.trim().to_lowercase() == guess
        || acceptable.iter().any(|a| a.trim().to_lowercase() == guess)
}
