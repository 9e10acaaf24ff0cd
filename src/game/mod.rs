// Game orchestration: the session state machine, the semantic guess
// evaluator, and the server tying seed generation to playable rounds.

pub mod evaluator;
pub mod server;
pub mod session;

pub use evaluator::GuessEvaluator;
pub use server::{GameServer, NewGame};
pub use session::{matches_answer, ActiveRound, GameSession, GuessOutcome, Reveal, MAX_ATTEMPTS};
