//! Axum route handlers for the Resume API.

use axum::extract::{Path, State};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::conversation::ConversationTurnRow;
use crate::models::resume::ResumeSnapshot;
use crate::resume::service::{self, CreateResume, UpdateResume};
use crate::response::{ApiResponse, AppJson};
use crate::state::AppState;
use crate::store::{
    CertificationInput, EducationInput, ExperienceInput, ProfileFields, ProjectInput, Sections,
};

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperiencePayload {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub duration: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationPayload {
    #[serde(default)]
    pub university: String,
    #[serde(default)]
    pub degree: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub graduation_year: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificationPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub issued_by: String,
    pub issue_date: Option<String>,
    pub deployed_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub deployed_link: Option<String>,
    #[serde(default, deserialize_with = "list_or_csv")]
    pub technologies: Vec<String>,
}

/// Profile fields and sub-collections shared by create and update.
/// Omitted sub-collections are treated as empty.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeFieldsPayload {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub working_profession: Option<String>,
    pub career_summary: Option<String>,
    #[serde(default, deserialize_with = "optional_list_or_csv")]
    pub skills: Option<Vec<String>>,
    #[serde(default)]
    pub experience: Vec<ExperiencePayload>,
    #[serde(default)]
    pub education: Vec<EducationPayload>,
    #[serde(default)]
    pub certification: Vec<CertificationPayload>,
    #[serde(default)]
    pub projects: Vec<ProjectPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResumeRequest {
    pub user_id: Option<String>,
    pub template_id: Option<String>,
    pub resume_name: Option<String>,
    #[serde(flatten)]
    pub fields: ResumeFieldsPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResumeRequest {
    pub resume_id: Option<Uuid>,
    pub user_id: Option<String>,
    pub resume_name: Option<String>,
    #[serde(flatten)]
    pub fields: ResumeFieldsPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueTemplateNameRequest {
    pub user_id: Option<String>,
    pub template_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedResume {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateNameStatus {
    pub template_name: String,
    pub unique: bool,
}

impl ResumeFieldsPayload {
    fn into_parts(self) -> Result<(ProfileFields, Sections), AppError> {
        let profile = ProfileFields {
            full_name: self.full_name,
            email: self.email,
            phone_number: self.phone_number,
            working_profession: self.working_profession,
            career_summary: self.career_summary,
            skills: self.skills,
        };

        let certifications = self
            .certification
            .into_iter()
            .map(|c| {
                Ok(CertificationInput {
                    name: c.name,
                    issuer: c.issued_by,
                    date_issued: parse_issue_date(c.issue_date.as_deref())?,
                    deployed_url: non_blank(c.deployed_link),
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        let sections = Sections {
            experience: self
                .experience
                .into_iter()
                .map(|e| ExperienceInput {
                    company_name: e.company_name,
                    job_title: e.job_title,
                    duration: e.duration,
                })
                .collect(),
            education: self
                .education
                .into_iter()
                .map(|e| EducationInput {
                    institution: e.university,
                    degree: e.degree,
                    graduated_year: e.graduation_year,
                })
                .collect(),
            certifications,
            projects: self
                .projects
                .into_iter()
                .map(|p| ProjectInput {
                    title: p.name,
                    description: p.description,
                    link: non_blank(p.deployed_link),
                    tech_stack: p.technologies,
                })
                .collect(),
        };

        Ok((profile, sections))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/resume/create
pub async fn handle_create_resume(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateResumeRequest>,
) -> Result<ApiResponse<ResumeSnapshot>, AppError> {
    if request.user_id.as_deref().map_or(true, |id| id.trim().is_empty()) {
        return Err(AppError::Unauthorized);
    }
    let template_name = non_blank(request.resume_name)
        .ok_or_else(|| AppError::Validation("resumeName is required".to_string()))?;
    let (profile, sections) = request.fields.into_parts()?;

    let snapshot = service::create_resume(
        state.store.as_ref(),
        CreateResume {
            external_user_id: request.user_id,
            template_name,
            template_id: non_blank(request.template_id),
            profile,
            sections,
        },
    )
    .await?;

    Ok(ApiResponse::created(snapshot, "Resume created successfully"))
}

/// PUT /api/v1/resume/update
pub async fn handle_update_resume(
    State(state): State<AppState>,
    AppJson(request): AppJson<UpdateResumeRequest>,
) -> Result<ApiResponse<ResumeSnapshot>, AppError> {
    if request.user_id.as_deref().map_or(true, |id| id.trim().is_empty()) {
        return Err(AppError::Unauthorized);
    }
    let resume_id = request
        .resume_id
        .ok_or_else(|| AppError::Validation("resumeId is required".to_string()))?;
    let (profile, sections) = request.fields.into_parts()?;

    let snapshot = service::update_resume(
        state.store.as_ref(),
        UpdateResume {
            resume_id,
            external_user_id: request.user_id,
            template_name: non_blank(request.resume_name),
            profile,
            sections,
        },
    )
    .await?;

    Ok(ApiResponse::ok(snapshot, "Resume updated successfully"))
}

/// GET /api/v1/resume/get-all-resume/:userId
pub async fn handle_get_all_resumes(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<ApiResponse<Vec<ResumeSnapshot>>, AppError> {
    let resumes = service::list_resumes(state.store.as_ref(), &user_id).await?;
    let message = if resumes.is_empty() {
        "No resumes found for this user"
    } else {
        "Resumes retrieved successfully"
    };
    Ok(ApiResponse::ok(resumes, message))
}

/// GET /api/v1/resume/get-resume-by-id/:resumeId
pub async fn handle_get_resume_by_id(
    State(state): State<AppState>,
    Path(resume_id): Path<String>,
) -> Result<ApiResponse<ResumeSnapshot>, AppError> {
    let snapshot = service::get_resume(state.store.as_ref(), parse_resume_id(&resume_id)?).await?;
    Ok(ApiResponse::ok(snapshot, "Resume retrieved successfully"))
}

/// GET /api/v1/resume/get-all-conversation/:resumeId
pub async fn handle_get_all_conversation(
    State(state): State<AppState>,
    Path(resume_id): Path<String>,
) -> Result<ApiResponse<Vec<ConversationTurnRow>>, AppError> {
    let turns =
        service::get_conversation(state.store.as_ref(), parse_resume_id(&resume_id)?).await?;
    Ok(ApiResponse::ok(turns, "Conversation retrieved successfully"))
}

/// POST /api/v1/resume/unique-template-name
pub async fn handle_unique_template_name(
    State(state): State<AppState>,
    AppJson(request): AppJson<UniqueTemplateNameRequest>,
) -> Result<ApiResponse<TemplateNameStatus>, AppError> {
    let (Some(user_id), Some(template_name)) =
        (non_blank(request.user_id), non_blank(request.template_name))
    else {
        return Err(AppError::Validation(
            "userId and templateName are required".to_string(),
        ));
    };

    if !service::template_name_is_unique(state.store.as_ref(), &user_id, &template_name).await? {
        return Err(AppError::Conflict("Template name already exists".to_string()));
    }

    Ok(ApiResponse::ok(
        TemplateNameStatus {
            template_name,
            unique: true,
        },
        "Template name is unique",
    ))
}

/// DELETE /api/v1/resume/delete-resume-by-id/:id
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<DeletedResume>, AppError> {
    if id.trim().is_empty() {
        return Err(AppError::Validation("Resume ID is required".to_string()));
    }
    let id = parse_resume_id(&id)?;
    service::delete_resume(state.store.as_ref(), id).await?;
    Ok(ApiResponse::ok(DeletedResume { id }, "Resume deleted successfully"))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// An id that is not a UUID cannot name a stored resume.
fn parse_resume_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::NotFound("Resume not found".to_string()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM` (first of the month) or an RFC 3339 timestamp.
fn parse_issue_date(raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d"))
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map(Some)
        .map_err(|_| AppError::Validation(format!("issueDate '{raw}' is not a valid date")))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Text(String),
    Number(serde_json::Number),
    List(Vec<String>),
}

fn text_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Option::<Lenient>::deserialize(deserializer)? {
        Some(Lenient::Text(text)) => text,
        Some(Lenient::Number(n)) => n.to_string(),
        Some(Lenient::List(items)) => items.join(", "),
        None => String::new(),
    })
}

fn list_or_csv<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(optional_list_or_csv(deserializer)?.unwrap_or_default())
}

/// `["a", "b"]` or `"a, b"`.
fn optional_list_or_csv<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<String>>, D::Error> {
    Ok(match Option::<Lenient>::deserialize(deserializer)? {
        Some(Lenient::List(items)) => Some(items),
        Some(Lenient::Text(text)) => Some(
            text.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        Some(Lenient::Number(n)) => Some(vec![n.to_string()]),
        None => None,
    })
}
