use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use causal_guessr_backend::api;
use causal_guessr_backend::cache::ObservationCache;
use causal_guessr_backend::config::Config;
use causal_guessr_backend::game::{GameServer, GuessEvaluator};
use causal_guessr_backend::llm::OpenAiClient;
use causal_guessr_backend::metrics;
use causal_guessr_backend::puzzles::AdapterRegistry;
use causal_guessr_backend::seeds::{SeedGenerator, SeedPool, SeedValidator};
use causal_guessr_backend::sources::{FredClient, NberClient, TrendsClient};

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "causal-guessr-backend" }))
}

async fn metrics_text() -> String {
    metrics::gather_metrics()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::load();
    metrics::register_metrics();

    let fred = Arc::new(FredClient::new(
        config.fred_base_url.clone(),
        config.fred_api_keys.clone(),
    ));
    let trends = Arc::new(TrendsClient::new(config.trends_base_url.clone()));
    let nber = Arc::new(NberClient::new(config.nber_base_url.clone()));
    let registry = AdapterRegistry::with_default_adapters(
        fred.clone(),
        trends,
        nber.clone(),
        ObservationCache::new(),
    );

    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY not set; puzzles will come from the fallback pool");
    }
    let backend = Arc::new(OpenAiClient::new(
        config.openai_base_url.clone(),
        config.openai_api_key.clone(),
        config.openai_model.clone(),
    ));

    let pool = SeedPool::load(&config.seeds_path);
    let generator = SeedGenerator::new(
        backend.clone(),
        SeedValidator::new(fred.clone()),
        pool,
        fred.clone(),
    );
    let evaluator = GuessEvaluator::new(backend);
    let server = Arc::new(GameServer::new(generator, registry, evaluator, fred, nber));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_text))
        .merge(api::router(server))
        .layer(CorsLayer::permissive());

    if let Some(dir) = &config.static_dir {
        if dir.is_dir() {
            tracing::info!("Serving frontend from {}", dir.display());
            app = app.fallback_service(ServeDir::new(dir));
        } else {
            tracing::warn!("Static directory {} not found, API only", dir.display());
        }
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("Failed to bind to port");

    tracing::info!("Causal Guessr backend listening on port {}", config.port);
    axum::serve(listener, app)
        .await
        .expect("Server failed");
}
