// Prometheus metrics definitions for the Causal Guessr backend.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Whether a round is currently in progress (0 or 1; one game at a time).
    pub static ref ACTIVE_GAME: IntGauge =
        IntGauge::new("guessr_active_game", "Whether a round is in progress").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Total games started, by seed origin (generated, fallback).
    pub static ref GAMES_STARTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("guessr_games_started_total", "Total games started"),
        &["origin"],
    )
    .unwrap();

    /// Total games finished, by result (won, lost).
    pub static ref GAMES_FINISHED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("guessr_games_finished_total", "Total games finished"),
        &["result"],
    )
    .unwrap();

    /// Total guesses submitted, by outcome (correct, wrong, exhausted).
    pub static ref GUESSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("guessr_guesses_total", "Total guesses submitted"),
        &["outcome"],
    )
    .unwrap();

    /// Total puzzle seeds produced, by origin (generated, fallback).
    pub static ref SEEDS_PRODUCED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("guessr_seeds_produced_total", "Total puzzle seeds produced"),
        &["origin"],
    )
    .unwrap();

    /// Total seed candidates discarded during the build loop, by reason
    /// (seed, diversity, build, render).
    pub static ref SEED_CANDIDATES_REJECTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "guessr_seed_candidates_rejected_total",
            "Seed candidates discarded during the build loop",
        ),
        &["reason"],
    )
    .unwrap();

    /// Total upstream data requests, by source and result (ok, error).
    pub static ref UPSTREAM_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("guessr_upstream_requests_total", "Total upstream data requests"),
        &["source", "result"],
    )
    .unwrap();

    /// Observation cache hits.
    pub static ref CACHE_HITS_TOTAL: IntCounter = IntCounter::new(
        "guessr_cache_hits_total",
        "Observation cache hits",
    )
    .unwrap();

    /// Observation cache misses.
    pub static ref CACHE_MISSES_TOTAL: IntCounter = IntCounter::new(
        "guessr_cache_misses_total",
        "Observation cache misses",
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Completion backend request duration in seconds.
    pub static ref COMPLETION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "guessr_completion_duration_seconds",
            "Completion backend request duration in seconds",
        )
        .buckets(vec![0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0]),
    )
    .unwrap();

    /// End-to-end puzzle build duration in seconds (seed through render).
    pub static ref PUZZLE_BUILD_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "guessr_puzzle_build_duration_seconds",
            "End-to-end puzzle build duration in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]),
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(ACTIVE_GAME.clone()),
        Box::new(GAMES_STARTED_TOTAL.clone()),
        Box::new(GAMES_FINISHED_TOTAL.clone()),
        Box::new(GUESSES_TOTAL.clone()),
        Box::new(SEEDS_PRODUCED_TOTAL.clone()),
        Box::new(SEED_CANDIDATES_REJECTED_TOTAL.clone()),
        Box::new(UPSTREAM_REQUESTS_TOTAL.clone()),
        Box::new(CACHE_HITS_TOTAL.clone()),
        Box::new(CACHE_MISSES_TOTAL.clone()),
        Box::new(COMPLETION_DURATION_SECONDS.clone()),
        Box::new(PUZZLE_BUILD_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        REGISTRY.register(c).expect("failed to register metric");
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
