// src/store/mod.rs

//! Persistence boundary for assessments, users and assessment types.
//!
//! The orchestrator only sees the traits. `postgres` is used by the server,
//! `memory` by tests and local runs without a database.

pub mod mapper;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::models::{
    assessment::Assessment,
    assessment_type::AssessmentType,
    question::Question,
    user::{NewUser, User},
};

pub use memory::{MemoryAssessmentStore, MemoryAssessmentTypeStore, MemoryUserStore};
pub use postgres::{PgAssessmentStore, PgAssessmentTypeStore, PgUserStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    Conflict(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Durable storage of assessments and their questions.
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    async fn load(&self, assessment_id: &str) -> Result<Option<Assessment>, StoreError>;

    /// Upsert. Overwrites the whole record, question list included.
    async fn save(&self, assessment: &Assessment) -> Result<(), StoreError>;

    async fn append_question(
        &self,
        assessment_id: &str,
        question: &Question,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn find_by_device_id(&self, device_id: &str) -> Result<Option<User>, StoreError>;

    async fn find_all(&self) -> Result<Vec<User>, StoreError>;

    /// Inserts a user; fails with `Conflict` if the device id is taken.
    async fn save(&self, user: NewUser) -> Result<User, StoreError>;

    /// Returns false if there was nothing to delete.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait AssessmentTypeStore: Send + Sync {
    async fn find(&self, id: &str) -> Result<Option<AssessmentType>, StoreError>;

    async fn find_all(&self) -> Result<Vec<AssessmentType>, StoreError>;
}
