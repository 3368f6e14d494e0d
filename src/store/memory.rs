// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{AssessmentStore, AssessmentTypeStore, StoreError, UserStore};
use crate::models::{
    assessment::Assessment,
    assessment_type::AssessmentType,
    question::Question,
    user::{NewUser, User},
};

#[derive(Default)]
pub struct MemoryAssessmentStore {
    records: RwLock<HashMap<String, Assessment>>,
}

impl MemoryAssessmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssessmentStore for MemoryAssessmentStore {
    async fn load(&self, assessment_id: &str) -> Result<Option<Assessment>, StoreError> {
        Ok(self.records.read().await.get(assessment_id).cloned())
    }

    async fn save(&self, assessment: &Assessment) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(assessment.assessment_id.clone(), assessment.clone());
        Ok(())
    }

    async fn append_question(
        &self,
        assessment_id: &str,
        question: &Question,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(assessment_id)
            .ok_or_else(|| StoreError::NotFound(format!("assessment {}", assessment_id)))?;
        record.questions.push(question.clone());
        Ok(())
    }
}

#[derive(Default)]
struct UserTable {
    next_id: i64,
    rows: Vec<User>,
}

#[derive(Default)]
pub struct MemoryUserStore {
    table: RwLock<UserTable>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find(&self, id: i64) -> Result<Option<User>, StoreError> {
        let table = self.table.read().await;
        Ok(table.rows.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_device_id(&self, device_id: &str) -> Result<Option<User>, StoreError> {
        let table = self.table.read().await;
        Ok(table.rows.iter().find(|u| u.device_id == device_id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        let table = self.table.read().await;
        let mut users = table.rows.clone();
        users.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(users)
    }

    async fn save(&self, user: NewUser) -> Result<User, StoreError> {
        let mut table = self.table.write().await;
        if table.rows.iter().any(|u| u.device_id == user.device_id) {
            return Err(StoreError::Conflict(format!("device '{}'", user.device_id)));
        }

        table.next_id += 1;
        let user = User {
            id: table.next_id,
            device_id: user.device_id,
            name: user.name,
            status: user.status,
            created_at: Utc::now(),
        };
        table.rows.push(user.clone());
        Ok(user)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut table = self.table.write().await;
        let before = table.rows.len();
        table.rows.retain(|u| u.id != id);
        Ok(table.rows.len() != before)
    }
}

pub struct MemoryAssessmentTypeStore {
    types: Vec<AssessmentType>,
}

impl MemoryAssessmentTypeStore {
    pub fn new(types: Vec<AssessmentType>) -> Self {
        Self { types }
    }
}

impl Default for MemoryAssessmentTypeStore {
    fn default() -> Self {
        Self::new(AssessmentType::defaults())
    }
}

#[async_trait]
impl AssessmentTypeStore for MemoryAssessmentTypeStore {
    async fn find(&self, id: &str) -> Result<Option<AssessmentType>, StoreError> {
        Ok(self.types.iter().find(|t| t.id == id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<AssessmentType>, StoreError> {
        Ok(self.types.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::assessment::Difficulty;

    #[tokio::test]
    async fn test_save_overwrites_and_append_requires_record() {
        let store = MemoryAssessmentStore::new();
        let mut a = Assessment::new(
            "a1".to_string(),
            "open_question".to_string(),
            "open_question".to_string(),
            "device-1".to_string(),
            Difficulty::Beginner,
            Utc::now(),
        );
        store.save(&a).await.unwrap();

        let q = Question::new("Why?".to_string(), vec![], "Because".to_string(), Utc::now());
        store.append_question("a1", &q).await.unwrap();
        assert_eq!(store.load("a1").await.unwrap().unwrap().questions.len(), 1);

        // Full overwrite drops the appended question.
        a.feedback = None;
        store.save(&a).await.unwrap();
        assert!(store.load("a1").await.unwrap().unwrap().questions.is_empty());

        let err = store.append_question("missing", &q).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_user_device_ids_are_unique() {
        let store = MemoryUserStore::new();
        let user = store.save(NewUser::active("dev-1", "Ann")).await.unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.status, "active");

        let err = store.save(NewUser::active("dev-1", "Bob")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        assert_eq!(
            store.find_by_device_id("dev-1").await.unwrap().map(|u| u.id),
            Some(1)
        );
        assert!(store.delete(1).await.unwrap());
        assert!(!store.delete(1).await.unwrap());
        assert!(store.find(1).await.unwrap().is_none());
    }
}
