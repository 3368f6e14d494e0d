// src/config.rs

use std::env;
use std::time::Duration;

use dotenvy::dotenv;

use crate::provider::openai::DEFAULT_BASE_URL;

/// Delay between two polls of a remote status.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Polls allowed before giving up with a timeout.
pub const DEFAULT_MAX_POLLS: u32 = 120;

pub const DEFAULT_MODEL: &str = "gpt-4-1106-preview";

/// Fixed-delay polling, bounded by a maximum number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub rust_log: String,
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    /// When unset, an assistant is created on startup and deleted on shutdown.
    pub assistant_id: Option<String>,
    pub run_polling: PollSettings,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let openai_api_key = env::var("OPENAI_API_KEY")
            .expect("OPENAI_API_KEY must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let openai_model = env::var("OPENAI_MODEL")
            .unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let openai_base_url = env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let assistant_id = env::var("OPENAI_ASSISTANT_ID")
            .ok()
            .filter(|id| !id.trim().is_empty());

        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|s| parse_list(&s))
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:8100".to_string(),
                    "http://localhost:4200".to_string(),
                ]
            });

        let run_polling = PollSettings {
            interval: Duration::from_millis(
                env::var("RUN_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            max_polls: env::var("RUN_MAX_POLLS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_POLLS),
        };

        Self {
            database_url,
            rust_log,
            server_port,
            cors_origins,
            openai_api_key,
            openai_model,
            openai_base_url,
            assistant_id,
            run_polling,
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
