//! Document Store: relational persistence for users, resumes, their
//! sub-collections, the conversation log and feedback.
//!
//! Handlers and the generation orchestrator only ever see `Arc<dyn DocumentStore>`;
//! `PgDocumentStore` is the production backend. Every multi-row mutation of a
//! resume runs in a single transaction, so partial writes are never observable.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::conversation::ConversationTurnRow;
use crate::models::feedback::FeedbackRow;
use crate::models::resume::{ResumeRow, ResumeSnapshot};
use crate::models::user::User;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgDocumentStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint rejected the write. Carries the constraint name.
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::Conflict(db.constraint().unwrap_or("unique").to_string());
            }
        }
        StoreError::Database(e)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Write models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperienceInput {
    pub company_name: String,
    pub job_title: String,
    pub duration: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EducationInput {
    pub institution: String,
    pub degree: String,
    pub graduated_year: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CertificationInput {
    pub name: String,
    pub issuer: String,
    pub date_issued: Option<NaiveDate>,
    pub deployed_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectInput {
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    pub tech_stack: Vec<String>,
}

/// The four owned sub-collections, in display order.
#[derive(Debug, Clone, Default)]
pub struct Sections {
    pub experience: Vec<ExperienceInput>,
    pub education: Vec<EducationInput>,
    pub certifications: Vec<CertificationInput>,
    pub projects: Vec<ProjectInput>,
}

/// Scalar profile fields. `None` leaves the stored value untouched on update.
#[derive(Debug, Clone, Default)]
pub struct ProfileFields {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub working_profession: Option<String>,
    pub career_summary: Option<String>,
    pub skills: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct NewResume {
    pub user_id: Uuid,
    pub template_name: String,
    pub template_id: Option<String>,
    pub profile: ProfileFields,
    pub sections: Sections,
}

/// Replaces scalar fields that are `Some` and every sub-collection wholesale.
#[derive(Debug, Clone, Default)]
pub struct ResumeChanges {
    pub template_name: Option<String>,
    pub profile: ProfileFields,
    pub sections: Sections,
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub external_user_id: String,
    pub author: Option<String>,
    pub avatar: Option<String>,
    pub role: String,
    pub content: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_user_by_external_id(&self, external_id: &str)
        -> Result<Option<User>, StoreError>;

    async fn template_name_exists(
        &self,
        user_id: Uuid,
        template_name: &str,
    ) -> Result<bool, StoreError>;

    /// Creates the resume and its sub-collections atomically.
    async fn create_resume(&self, resume: NewResume) -> Result<ResumeSnapshot, StoreError>;

    /// Applies scalar changes and delete-then-recreates every sub-collection
    /// in one transaction. `StoreError::NotFound` if the resume is gone.
    async fn update_resume(
        &self,
        resume_id: Uuid,
        changes: ResumeChanges,
    ) -> Result<ResumeSnapshot, StoreError>;

    async fn find_resume(&self, resume_id: Uuid) -> Result<Option<ResumeRow>, StoreError>;

    async fn load_snapshot(&self, resume_id: Uuid) -> Result<Option<ResumeSnapshot>, StoreError>;

    /// All of a user's resumes, newest first.
    async fn list_snapshots(&self, user_id: Uuid) -> Result<Vec<ResumeSnapshot>, StoreError>;

    /// Returns `false` if nothing was deleted. Cascades to sub-collections and turns.
    async fn delete_resume(&self, resume_id: Uuid) -> Result<bool, StoreError>;

    async fn list_turns(&self, resume_id: Uuid) -> Result<Vec<ConversationTurnRow>, StoreError>;

    /// One transaction: optionally set the theme color, append the user's
    /// instruction turn, then load the snapshot (which therefore reflects both).
    /// `Ok(None)` if the resume does not exist; nothing is written in that case.
    async fn open_turn(
        &self,
        resume_id: Uuid,
        color: Option<&str>,
        instruction: &str,
    ) -> Result<Option<ResumeSnapshot>, StoreError>;

    /// One transaction: append the assistant turn and store `html` as the
    /// resume's rendered payload.
    async fn record_reply(&self, resume_id: Uuid, html: &str) -> Result<(), StoreError>;

    async fn insert_feedback(&self, feedback: NewFeedback) -> Result<FeedbackRow, StoreError>;

    /// Each author's most recent entry, newest first, at most `limit` rows.
    async fn latest_feedback_per_author(&self, limit: i64)
        -> Result<Vec<FeedbackRow>, StoreError>;
}
