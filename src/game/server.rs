// Round orchestration: drives the seed pipeline into a playable round
// and resolves guesses against it.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::diversity::DiversityTracker;
use crate::error::GameError;
use crate::game::evaluator::GuessEvaluator;
use crate::game::session::{matches_answer, ActiveRound, GameSession, GuessOutcome};
use crate::metrics::{PUZZLE_BUILD_DURATION_SECONDS, SEED_CANDIDATES_REJECTED_TOTAL};
use crate::puzzles::{puzzle_id, AdapterRegistry, DataSource, PuzzleMeta};
use crate::render;
use crate::seeds::{Seed, SeedGenerator, SeedOrigin};
use crate::sources::{FredClient, NberClient};

/// How many seed candidates one round build may burn through before
/// reporting the service unavailable.
const MAX_BUILD_ATTEMPTS: usize = 5;

/// Everything the client needs to start playing a fresh round.
#[derive(Debug, Clone)]
pub struct NewGame {
    pub id: String,
    pub title: String,
    pub svg: String,
    pub origin: SeedOrigin,
}

pub struct GameServer {
    session: Mutex<GameSession>,
    diversity: DiversityTracker,
    generator: SeedGenerator,
    registry: AdapterRegistry,
    evaluator: GuessEvaluator,
    fred: Arc<FredClient>,
    nber: Arc<NberClient>,
}

impl GameServer {
    pub fn new(
        generator: SeedGenerator,
        registry: AdapterRegistry,
        evaluator: GuessEvaluator,
        fred: Arc<FredClient>,
        nber: Arc<NberClient>,
    ) -> Self {
        Self {
            session: Mutex::new(GameSession::new()),
            diversity: DiversityTracker::new(),
            generator,
            registry,
            evaluator,
            fred,
            nber,
        }
    }

    /// Build and install a new round, replacing any round in progress.
    pub async fn start_game(&self) -> Result<NewGame, GameError> {
        let timer = PUZZLE_BUILD_DURATION_SECONDS.start_timer();
        let result = self.build_round().await;
        timer.observe_duration();
        result
    }

    async fn build_round(&self) -> Result<NewGame, GameError> {
        let mut last_error = String::from("no seed candidates tried");

        for attempt in 1..=MAX_BUILD_ATTEMPTS {
            let avoid = self.diversity.avoid_hints();
            let seed = match self.generator.next_seed(&avoid).await {
                Ok(seed) => seed,
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    warn!(attempt, error = %err, "seed candidate rejected");
                    SEED_CANDIDATES_REJECTED_TOTAL
                        .with_label_values(&["seed"])
                        .inc();
                    last_error = err.to_string();
                    continue;
                }
            };

            if !self.diversity.accepts(&seed) {
                info!(attempt, metric = %seed.metric_key(), "seed repeats session history");
                SEED_CANDIDATES_REJECTED_TOTAL
                    .with_label_values(&["diversity"])
                    .inc();
                last_error = format!("seed repeats session history: {}", seed.metric_key());
                continue;
            }

            let meta = PuzzleMeta {
                id: puzzle_id(seed.source, &seed.series_key, seed.start_date, seed.end_date),
                source: seed.source,
                title: self.title_for(&seed).await,
                correct_event: seed.correct_event.clone(),
                acceptable_answers: seed.acceptable_answers.clone(),
                explanation: seed.explanation.clone(),
                data: Some(seed.to_query()),
                chart_type: None,
                y_label: None,
                y_limits: None,
            };

            let puzzle = match self.registry.build_puzzle(&meta).await {
                Ok(puzzle) => puzzle,
                Err(err) => {
                    warn!(attempt, id = %meta.id, error = %err, "puzzle build failed");
                    SEED_CANDIDATES_REJECTED_TOTAL
                        .with_label_values(&["build"])
                        .inc();
                    last_error = err.to_string();
                    continue;
                }
            };

            let svg = match render::render_svg(&puzzle) {
                Ok(svg) => svg,
                Err(err) => {
                    warn!(attempt, id = %puzzle.id, error = %err, "chart render failed");
                    SEED_CANDIDATES_REJECTED_TOTAL
                        .with_label_values(&["render"])
                        .inc();
                    last_error = err.to_string();
                    continue;
                }
            };

            // Only rounds that actually reach the player count against
            // the session's diversity history.
            self.diversity.record(&seed);

            let origin = seed.origin;
            let id = puzzle.id.clone();
            let title = puzzle.title.clone();
            let round = ActiveRound::new(puzzle, seed.hints.clone(), origin);
            self.session.lock().unwrap().install(round);
            info!(id = %id, origin = origin.label(), attempt, "game started");
            return Ok(NewGame {
                id,
                title,
                svg,
                origin,
            });
        }

        Err(GameError::Unavailable {
            attempts: MAX_BUILD_ATTEMPTS,
            last: last_error,
        })
    }

    /// Chart title for a seed, best effort: the series key itself is the
    /// fallback when the upstream lookup fails.
    async fn title_for(&self, seed: &Seed) -> String {
        match seed.source {
            DataSource::Fred => match self.fred.series_info(&seed.series_key).await {
                Ok(info) => info.title,
                Err(err) => {
                    warn!(series = %seed.series_key, error = %err, "series title lookup failed");
                    seed.series_key.clone()
                }
            },
            DataSource::Nber => match self.nber.series_title(&seed.series_key).await {
                Ok(Some(title)) => title,
                Ok(None) => seed.series_key.clone(),
                Err(err) => {
                    warn!(series = %seed.series_key, error = %err, "series title lookup failed");
                    seed.series_key.clone()
                }
            },
            DataSource::GoogleTrends => {
                format!("Search interest: \"{}\"", seed.series_key)
            }
        }
    }

    /// Resolve one guess against the active round. Exact matches and
    /// exhausted rounds resolve locally; everything else is referred to
    /// the completion backend with the session lock released.
    pub async fn submit_guess(&self, guess: &str) -> Result<GuessOutcome, GameError> {
        let (round_id, correct_event, acceptable) = {
            let mut session = self.session.lock().unwrap();
            let round = session.round().ok_or(GameError::NoActiveGame)?;
            let exhausted = round.attempts_remaining == 0;
            let exact = matches_answer(
                guess,
                &round.puzzle.acceptable_answers,
                &round.puzzle.correct_event,
            );
            if exhausted || exact {
                return session.apply_guess(exact && !exhausted);
            }
            (
                round.puzzle.id.clone(),
                round.puzzle.correct_event.clone(),
                round.puzzle.acceptable_answers.clone(),
            )
        };

        let equivalent = self
            .evaluator
            .is_equivalent(guess, &correct_event, &acceptable)
            .await;

        // The round may have been replaced while the model was thinking.
        // A verdict only applies to the round it was computed for.
        let mut session = self.session.lock().unwrap();
        let still_active = session
            .round()
            .is_some_and(|round| round.puzzle.id == round_id);
        if !still_active {
            return Err(GameError::NoActiveGame);
        }
        session.apply_guess(equivalent)
    }
}
