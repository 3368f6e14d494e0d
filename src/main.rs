// src/main.rs

use dotenvy::dotenv;
use quizbot::config::Config;
use quizbot::orchestrator::{AssessmentOrchestrator, Stores, assistant::AssistantLease};
use quizbot::provider::OpenAiClient;
use quizbot::routes;
use quizbot::state::AppState;
use quizbot::store::{PgAssessmentStore, PgAssessmentTypeStore, PgUserStore};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    let stores = Stores {
        assessments: Arc::new(PgAssessmentStore::new(pool.clone())),
        users: Arc::new(PgUserStore::new(pool.clone())),
        types: Arc::new(PgAssessmentTypeStore::new(pool.clone())),
    };

    let provider = Arc::new(OpenAiClient::new(
        reqwest::Client::new(),
        &config.openai_base_url,
        config.openai_api_key.clone(),
        config.openai_model.clone(),
    ));

    // Reuse a configured assistant, otherwise create one for this process
    let assistant = AssistantLease::acquire(provider.as_ref(), config.assistant_id.as_deref())
        .await
        .expect("Failed to create assistant");

    let orchestrator = AssessmentOrchestrator::new(
        stores,
        provider.clone(),
        assistant.id.clone(),
        config.run_polling,
    );

    // Create AppState
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Start the server
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    if let Err(e) = assistant.release(provider.as_ref()).await {
        tracing::error!("Failed to delete assistant: {}", e);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down...");
}
