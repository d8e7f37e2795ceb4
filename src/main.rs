use std::sync::Arc;
use std::time::Duration;

use trip_assist::annotate::{AnnotatorPipeline, RemoteAnnotator, RemoteAnnotatorConfig};
use trip_assist::api::engine_routes;
use trip_assist::config::{EngineConfig, PersonalityConfig};
use trip_assist::engine::DialogueEngine;
use trip_assist::persist::{ContextRepository, LibSqlRepository, MemoryRepository};
use trip_assist::tone::{AdaptationSpeed, TonePreference};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let port: u16 = std::env::var("TRIP_ASSIST_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    let db_path = std::env::var("TRIP_ASSIST_DB_PATH")
        .unwrap_or_else(|_| "./data/trip-assist.db".to_string());

    let annotator_timeout_ms: u64 = std::env::var("TRIP_ASSIST_ANNOTATOR_TIMEOUT_MS")
        .unwrap_or_else(|_| "800".to_string())
        .parse()
        .unwrap_or(800);

    let personality = PersonalityConfig {
        preference: TonePreference::parse(
            &std::env::var("TRIP_ASSIST_TONE_MODE").unwrap_or_default(),
        ),
        context_aware: std::env::var("TRIP_ASSIST_CONTEXT_AWARE")
            .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true),
        adaptation_speed: AdaptationSpeed::parse(
            &std::env::var("TRIP_ASSIST_ADAPTATION_SPEED").unwrap_or_default(),
        ),
    };

    let config = EngineConfig {
        annotator_timeout: Duration::from_millis(annotator_timeout_ms),
        personality,
        ..EngineConfig::default()
    };

    eprintln!("🧭 Trip Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Turn API: http://0.0.0.0:{}/api/turns", port);
    eprintln!("   Live feed: ws://0.0.0.0:{}/ws", port);
    eprintln!("   Analytics: http://0.0.0.0:{}/api/analytics", port);

    // ── Annotators ───────────────────────────────────────────────────
    // A configured annotator service takes over every contract; otherwise
    // the built-in heuristics run.
    let pipeline = match std::env::var("TRIP_ASSIST_ANNOTATOR_URL") {
        Ok(base_url) if !base_url.is_empty() => {
            let api_key = std::env::var("TRIP_ASSIST_ANNOTATOR_KEY").unwrap_or_default();
            let remote = Arc::new(RemoteAnnotator::new(RemoteAnnotatorConfig {
                base_url: base_url.clone(),
                api_key: secrecy::SecretString::from(api_key),
                request_timeout: config.annotator_timeout,
            })?);
            eprintln!("   Annotators: remote ({})", base_url);
            AnnotatorPipeline::new(
                remote.clone(),
                remote.clone(),
                remote.clone(),
                remote,
                config.annotator_timeout,
            )
        }
        _ => {
            eprintln!("   Annotators: built-in heuristics");
            AnnotatorPipeline::heuristic(config.annotator_timeout)
        }
    };

    // ── Session store ────────────────────────────────────────────────
    let repo: Arc<dyn ContextRepository> =
        match LibSqlRepository::new_local(std::path::Path::new(&db_path)).await {
            Ok(repo) => {
                eprintln!("   Session store: {}", db_path);
                Arc::new(repo)
            }
            Err(e) => {
                // Store failures degrade to in-memory operation, at boot as
                // on every turn.
                tracing::warn!(error = %e, path = %db_path, "Session store unavailable, running in-memory only");
                eprintln!("   Session store: in-memory (could not open {})", db_path);
                Arc::new(MemoryRepository::new())
            }
        };

    let engine = Arc::new(DialogueEngine::new(pipeline, repo, config));
    let app = engine_routes(engine);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "Trip Assist listening");
    axum::serve(listener, app).await?;

    Ok(())
}
