// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::PgPool;

use super::{
    AssessmentStore, AssessmentTypeStore, StoreError, UserStore,
    mapper::{AssessmentRow, QuestionRow, assessment_row, question_row, to_domain},
};
use crate::models::{
    assessment::Assessment,
    assessment_type::AssessmentType,
    question::Question,
    user::{NewUser, User},
};

const SELECT_QUESTIONS: &str = r#"
    SELECT assessment_id, position, content, options, correct_answer,
           user_answer, is_correct, explanation, taken_time_ms, asked_at
    FROM questions
    WHERE assessment_id = $1
    ORDER BY position
"#;

#[derive(Clone)]
pub struct PgAssessmentStore {
    pool: PgPool,
}

impl PgAssessmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssessmentStore for PgAssessmentStore {
    async fn load(&self, assessment_id: &str) -> Result<Option<Assessment>, StoreError> {
        let row = sqlx::query_as::<_, AssessmentRow>(
            r#"
            SELECT id, assessment_type_id, assessment_type_name, user_device_id,
                   category_id, language_id, difficulty_at_start, difficulty_at_end,
                   start_time, end_time, feedback, state, thread_id
            FROM assessments
            WHERE id = $1
            "#,
        )
        .bind(assessment_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let questions = sqlx::query_as::<_, QuestionRow>(SELECT_QUESTIONS)
            .bind(assessment_id)
            .fetch_all(&self.pool)
            .await?;

        to_domain(row, questions).map(Some)
    }

    async fn save(&self, assessment: &Assessment) -> Result<(), StoreError> {
        let row = assessment_row(assessment);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO assessments (
                id, assessment_type_id, assessment_type_name, user_device_id,
                category_id, language_id, difficulty_at_start, difficulty_at_end,
                start_time, end_time, feedback, state, thread_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                assessment_type_id = EXCLUDED.assessment_type_id,
                assessment_type_name = EXCLUDED.assessment_type_name,
                user_device_id = EXCLUDED.user_device_id,
                category_id = EXCLUDED.category_id,
                language_id = EXCLUDED.language_id,
                difficulty_at_start = EXCLUDED.difficulty_at_start,
                difficulty_at_end = EXCLUDED.difficulty_at_end,
                start_time = EXCLUDED.start_time,
                end_time = EXCLUDED.end_time,
                feedback = EXCLUDED.feedback,
                state = EXCLUDED.state,
                thread_id = EXCLUDED.thread_id
            "#,
        )
        .bind(&row.id)
        .bind(&row.assessment_type_id)
        .bind(&row.assessment_type_name)
        .bind(&row.user_device_id)
        .bind(&row.category_id)
        .bind(&row.language_id)
        .bind(&row.difficulty_at_start)
        .bind(&row.difficulty_at_end)
        .bind(row.start_time)
        .bind(row.end_time)
        .bind(&row.feedback)
        .bind(&row.state)
        .bind(&row.thread_id)
        .execute(&mut *tx)
        .await?;

        // Full overwrite: the question list is replaced as a whole.
        sqlx::query("DELETE FROM questions WHERE assessment_id = $1")
            .bind(&row.id)
            .execute(&mut *tx)
            .await?;

        for (position, question) in assessment.questions.iter().enumerate() {
            insert_question(&mut tx, question_row(&row.id, position as i32, question)).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn append_question(
        &self,
        assessment_id: &str,
        question: &Question,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock keeps positions dense when two appends race.
        sqlx::query_scalar::<_, String>("SELECT id FROM assessments WHERE id = $1 FOR UPDATE")
            .bind(assessment_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("assessment {}", assessment_id)))?;

        let position = sqlx::query_scalar::<_, i32>(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM questions WHERE assessment_id = $1",
        )
        .bind(assessment_id)
        .fetch_one(&mut *tx)
        .await?;

        insert_question(&mut tx, question_row(assessment_id, position, question)).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn insert_question(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    row: QuestionRow,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO questions (
            assessment_id, position, content, options, correct_answer,
            user_answer, is_correct, explanation, taken_time_ms, asked_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(row.assessment_id)
    .bind(row.position)
    .bind(row.content)
    .bind(row.options)
    .bind(row.correct_answer)
    .bind(row.user_answer)
    .bind(row.is_correct)
    .bind(row.explanation)
    .bind(row.taken_time_ms)
    .bind(row.asked_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, device_id, name, status, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_device_id(&self, device_id: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, device_id, name, status, created_at FROM users WHERE device_id = $1",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, device_id, name, status, created_at FROM users ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn save(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (device_id, name, status)
            VALUES ($1, $2, $3)
            RETURNING id, device_id, name, status, created_at
            "#,
        )
        .bind(&user.device_id)
        .bind(&user.name)
        .bind(&user.status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // Postgres error code for unique violation is 23505
            if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
                StoreError::Conflict(format!("device '{}'", user.device_id))
            } else {
                StoreError::from(e)
            }
        })
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Clone)]
pub struct PgAssessmentTypeStore {
    pool: PgPool,
}

impl PgAssessmentTypeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssessmentTypeStore for PgAssessmentTypeStore {
    async fn find(&self, id: &str) -> Result<Option<AssessmentType>, StoreError> {
        let found = sqlx::query_as::<_, AssessmentType>(
            "SELECT id, name FROM assessment_types WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found)
    }

    async fn find_all(&self) -> Result<Vec<AssessmentType>, StoreError> {
        let types =
            sqlx::query_as::<_, AssessmentType>("SELECT id, name FROM assessment_types ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(types)
    }
}
