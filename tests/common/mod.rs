// tests/common/mod.rs

use std::sync::Arc;
use std::time::Duration;

use quizbot::{
    config::{Config, PollSettings},
    orchestrator::{AssessmentOrchestrator, Stores},
    provider::scripted::ScriptedProvider,
    routes,
    state::AppState,
    store::{MemoryAssessmentStore, MemoryAssessmentTypeStore, MemoryUserStore},
};
use serde_json::{Value, json};

pub struct TestApp {
    /// Base URL (e.g., "http://127.0.0.1:12345").
    pub address: String,
    pub provider: Arc<ScriptedProvider>,
}

#[allow(dead_code)]
pub fn test_polling() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(1),
        max_polls: 10,
    }
}

/// Spawns the app on a random port, backed by in-memory stores and a
/// scripted assistant.
#[allow(dead_code)]
pub async fn spawn_app() -> TestApp {
    let provider = Arc::new(ScriptedProvider::new());
    let stores = Stores {
        assessments: Arc::new(MemoryAssessmentStore::new()),
        users: Arc::new(MemoryUserStore::new()),
        types: Arc::new(MemoryAssessmentTypeStore::default()),
    };

    let config = Config {
        database_url: "postgres://unused".to_string(),
        rust_log: "error".to_string(),
        server_port: 0,
        cors_origins: vec!["http://localhost:8100".to_string()],
        openai_api_key: "sk-test".to_string(),
        openai_model: "gpt-test".to_string(),
        openai_base_url: "http://127.0.0.1:9".to_string(),
        assistant_id: Some("asst_test".to_string()),
        run_polling: test_polling(),
    };

    let orchestrator = AssessmentOrchestrator::new(
        stores,
        provider.clone(),
        "asst_test".to_string(),
        config.run_polling,
    );
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        config,
    };

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp { address, provider }
}

/// Starts an assessment of `kind` over HTTP and returns its id.
#[allow(dead_code)]
pub async fn start_assessment(app: &TestApp, client: &reqwest::Client, kind: &str) -> String {
    let response = client
        .post(format!("{}/api/assessments/{}", app.address, kind))
        .json(&json!({ "userDeviceId": "device-1" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);

    let body: Value = response.json().await.unwrap();
    body["assessmentId"].as_str().unwrap().to_string()
}
