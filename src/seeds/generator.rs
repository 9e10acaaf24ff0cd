// Seed generation orchestration: ask the model for a candidate, validate
// it, and degrade to the static pool when generation cannot deliver.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::diversity::AvoidHints;
use crate::error::SeedError;
use crate::llm::CompletionBackend;
use crate::metrics::SEEDS_PRODUCED_TOTAL;
use crate::puzzles::DataSource;
use crate::seeds::{prompts, RawSeed, Seed, SeedOrigin, SeedPool, SeedValidator};
use crate::sources::FredClient;

const GENERATION_TEMPERATURE: f32 = 0.7;
const GENERATION_MAX_TOKENS: u32 = 1024;
/// Releases shown to the model for release discovery. Keeps the prompt
/// bounded; FRED has hundreds of releases.
const RELEASES_PROMPT_LIMIT: usize = 40;

pub struct SeedGenerator {
    backend: Arc<dyn CompletionBackend>,
    validator: SeedValidator,
    pool: SeedPool,
    fred: Arc<FredClient>,
}

impl SeedGenerator {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        validator: SeedValidator,
        pool: SeedPool,
        fred: Arc<FredClient>,
    ) -> Self {
        Self {
            backend,
            validator,
            pool,
            fred,
        }
    }

    /// Produce one validated seed. Generation failures of any kind fall
    /// back to the static pool, except a rejected credential, which
    /// propagates: silently degrading every request would hide a
    /// persistent configuration problem.
    pub async fn next_seed(&self, avoid: &AvoidHints) -> Result<Seed, SeedError> {
        if !self.backend.is_configured() {
            info!("completion backend not configured, drawing from the fallback pool");
            return self.fallback_seed(avoid).await;
        }
        match self.generate(avoid).await {
            Ok(seed) => {
                SEEDS_PRODUCED_TOTAL
                    .with_label_values(&[seed.origin.label()])
                    .inc();
                info!(
                    origin = seed.origin.label(),
                    source = %seed.source,
                    series = %seed.series_key,
                    start = %seed.start_date,
                    end = %seed.end_date,
                    event = %seed.correct_event,
                    "seed produced"
                );
                Ok(seed)
            }
            Err(err) => {
                if let SeedError::Completion(ref completion) = err {
                    if completion.is_auth() {
                        warn!(error = %err, "completion credentials rejected");
                        return Err(err);
                    }
                }
                warn!(error = %err, "seed generation failed, drawing from the fallback pool");
                self.fallback_seed(avoid).await
            }
        }
    }

    async fn generate(&self, avoid: &AvoidHints) -> Result<Seed, SeedError> {
        let source = pick_source();
        let releases = match source {
            DataSource::Fred => self.releases_for_prompt().await,
            _ => None,
        };
        let prompt = prompts::build_seed_prompt(source, releases.as_deref(), avoid);
        let text = self
            .backend
            .complete(&prompt, GENERATION_TEMPERATURE, GENERATION_MAX_TOKENS)
            .await?;
        let cleaned = strip_code_fence(&text);
        let raw: RawSeed = serde_json::from_str(cleaned)
            .map_err(|e| SeedError::Invalid(format!("unparseable seed JSON: {e}")))?;
        self.validator.validate(raw, SeedOrigin::Generated).await
    }

    async fn fallback_seed(&self, avoid: &AvoidHints) -> Result<Seed, SeedError> {
        let raw = self.pool.pick(avoid)?;
        let seed = self.validator.validate(raw, SeedOrigin::Fallback).await?;
        SEEDS_PRODUCED_TOTAL
            .with_label_values(&[seed.origin.label()])
            .inc();
        info!(
            origin = seed.origin.label(),
            source = %seed.source,
            series = %seed.series_key,
            start = %seed.start_date,
            end = %seed.end_date,
            event = %seed.correct_event,
            "seed produced"
        );
        Ok(seed)
    }

    /// Best-effort release listing for the prompt; generation works
    /// without it, it just loses the release-discovery option.
    async fn releases_for_prompt(&self) -> Option<String> {
        match self.fred.releases(RELEASES_PROMPT_LIMIT).await {
            Ok(releases) if !releases.is_empty() => Some(
                releases
                    .iter()
                    .map(|r| format!("{}: {}", r.id, r.name))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            Ok(_) => None,
            Err(err) => {
                debug!(error = %err, "could not list releases for the prompt");
                None
            }
        }
    }
}

fn pick_source() -> DataSource {
    let idx = rand::thread_rng().gen_range(0..DataSource::ALL.len());
    DataSource::ALL[idx]
}

/// Strip a markdown code fence if the response carries one. A fence
/// without a closing marker leaves the text unchanged, like any other
/// formatting noise the JSON parser will reject.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[open + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    match after.find("```") {
        Some(close) => after[..close].trim(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::llm::CompletionError;

    struct ScriptedBackend {
        responses: Mutex<VecDeque<Result<String, CompletionError>>>,
        calls: AtomicUsize,
        configured: bool,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<String, CompletionError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                configured: true,
            }
        }

        fn unconfigured() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                calls: AtomicUsize::new(0),
                configured: false,
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn complete(
            &self,
            _prompt: &str,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(CompletionError::MissingApiKey))
        }
    }

    const POOL_JSON: &str = r#"[{
        "source": "google_trends",
        "searchTerm": "foreclosure",
        "startDate": "2008-01-01",
        "endDate": "2010-12-31",
        "correctEvent": "2008 housing crash",
        "acceptableAnswers": ["housing crash", "2008"],
        "explanation": "Foreclosure searches spiked during the housing collapse.",
        "hints": ["a", "b", "c", "2008 housing crash"]
    }]"#;

    const GENERATED_JSON: &str = r#"{
        "seriesId": "HOUST",
        "startDate": "2006-01-01",
        "endDate": "2009-12-31",
        "correctEvent": "2008 housing crash",
        "acceptableAnswers": ["housing crash"],
        "explanation": "Housing starts collapsed.",
        "hints": ["one", "two", "three", "2008 housing crash"]
    }"#;

    fn generator_with(
        backend: Arc<ScriptedBackend>,
        pool_json: &str,
    ) -> SeedGenerator {
        let fred = Arc::new(FredClient::new("http://unused.invalid", vec!["key".into()]));
        SeedGenerator::new(
            backend,
            SeedValidator::new(Arc::clone(&fred)),
            SeedPool::from_json_str(pool_json).unwrap(),
            fred,
        )
    }

    #[tokio::test]
    async fn test_generated_seed_round_trip() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(GENERATED_JSON.to_string())]));
        let generator = generator_with(Arc::clone(&backend), POOL_JSON);
        let seed = generator.next_seed(&AvoidHints::default()).await.unwrap();
        assert_eq!(seed.origin, SeedOrigin::Generated);
        assert_eq!(seed.series_key, "HOUST");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fenced_response_is_parsed() {
        let fenced = format!("Here is the puzzle:\n```json\n{GENERATED_JSON}\n```\nEnjoy!");
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(fenced)]));
        let generator = generator_with(backend, POOL_JSON);
        let seed = generator.next_seed(&AvoidHints::default()).await.unwrap();
        assert_eq!(seed.origin, SeedOrigin::Generated);
    }

    #[tokio::test]
    async fn test_unparseable_response_falls_back() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(
            "Sorry, I cannot help with that.".to_string(),
        )]));
        let generator = generator_with(backend, POOL_JSON);
        let seed = generator.next_seed(&AvoidHints::default()).await.unwrap();
        assert_eq!(seed.origin, SeedOrigin::Fallback);
        assert_eq!(seed.series_key, "foreclosure");
    }

    #[tokio::test]
    async fn test_validation_failure_falls_back() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(
            r#"{"seriesId": "HOUST", "startDate": "2006-01-01"}"#.to_string(),
        )]));
        let generator = generator_with(backend, POOL_JSON);
        let seed = generator.next_seed(&AvoidHints::default()).await.unwrap();
        assert_eq!(seed.origin, SeedOrigin::Fallback);
    }

    #[tokio::test]
    async fn test_rate_limit_falls_back() {
        let backend = Arc::new(ScriptedBackend::new(vec![Err(
            CompletionError::RateLimitExceeded,
        )]));
        let generator = generator_with(backend, POOL_JSON);
        let seed = generator.next_seed(&AvoidHints::default()).await.unwrap();
        assert_eq!(seed.origin, SeedOrigin::Fallback);
    }

    #[tokio::test]
    async fn test_auth_failure_propagates() {
        let backend = Arc::new(ScriptedBackend::new(vec![Err(
            CompletionError::AuthenticationFailed("invalid key".into()),
        )]));
        let generator = generator_with(backend, POOL_JSON);
        let err = generator
            .next_seed(&AvoidHints::default())
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            SeedError::Completion(CompletionError::AuthenticationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_backend_never_calls_complete() {
        let backend = Arc::new(ScriptedBackend::unconfigured());
        let generator = generator_with(Arc::clone(&backend), POOL_JSON);
        let seed = generator.next_seed(&AvoidHints::default()).await.unwrap();
        assert_eq!(seed.origin, SeedOrigin::Fallback);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_with_empty_pool_is_fatal() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("garbage".to_string())]));
        let generator = generator_with(backend, "[]");
        let err = generator
            .next_seed(&AvoidHints::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SeedError::EmptyPool));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence(r#"{"a": 1}"#), r#"{"a": 1}"#);
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(
            strip_code_fence("Sure!\n```json\n{\"a\": 1}\n```\nDone."),
            "{\"a\": 1}"
        );
        // No closing fence: leave the text alone.
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}"), "```json\n{\"a\": 1}");
    }
}
