use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::conversation::ConversationTurnRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub template_name: String,
    pub template_id: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub working_profession: Option<String>,
    pub career_summary: Option<String>,
    pub skills: Vec<String>,
    pub color: Option<String>,
    pub rendered_html: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub position: i32,
    pub company_name: String,
    pub job_title: String,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EducationRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub position: i32,
    pub institution: String,
    pub degree: String,
    pub graduated_year: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CertificationRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub position: i32,
    pub name: String,
    pub issuer: String,
    pub date_issued: Option<NaiveDate>,
    pub deployed_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub position: i32,
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    pub tech_stack: Vec<String>,
}

/// A resume joined with its four sub-collections and its conversation,
/// each ordered the way it was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSnapshot {
    #[serde(flatten)]
    pub resume: ResumeRow,
    pub experience: Vec<ExperienceRow>,
    pub education: Vec<EducationRow>,
    pub certifications: Vec<CertificationRow>,
    pub projects: Vec<ProjectRow>,
    pub conversation: Vec<ConversationTurnRow>,
}
