//! Axum route handlers for the Generation API.

use axum::extract::{multipart::MultipartRejection, Multipart, State};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::compiler::Theme;
use crate::generation::orchestrator::{FreshRequest, ImageUpload, RefineRequest};
use crate::response::{ApiResponse, AppJson};
use crate::state::AppState;

const IMAGE_FIELD: &str = "image";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHtmlTemplateRequest {
    pub user_input: Option<String>,
    #[serde(rename = "IsDark", default)]
    pub is_dark: bool,
    #[serde(default)]
    pub with_template: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHtmlWithTemplateRequest {
    pub resume_id: Option<Uuid>,
    pub user_input: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HtmlResponse {
    pub html: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/openAi/createHtmlTemplate
///
/// Cold start from a free-text brief. Returns `{html}` or, with
/// `withTemplate`, the structured template fields.
pub async fn handle_create_html_template(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateHtmlTemplateRequest>,
) -> Result<ApiResponse<Map<String, Value>>, AppError> {
    let brief = required(request.user_input, "userInput")?;

    let fields = state
        .orchestrator
        .generate_fresh(FreshRequest {
            brief,
            theme: Theme::from_dark_flag(request.is_dark),
            with_template: request.with_template,
        })
        .await?;

    Ok(ApiResponse::ok(fields, "HTML template generated successfully"))
}

/// POST /api/v1/openAi/createHtmlWithTemplate
///
/// Refines a stored resume; the optional `color` is applied before the prompt
/// is compiled.
pub async fn handle_create_html_with_template(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateHtmlWithTemplateRequest>,
) -> Result<ApiResponse<HtmlResponse>, AppError> {
    let resume_id = request
        .resume_id
        .ok_or_else(|| AppError::Validation("resumeId is required".to_string()))?;
    let instruction = required(request.user_input, "userInput")?;

    let html = state
        .orchestrator
        .refine_with_context(RefineRequest {
            resume_id,
            instruction,
            color: request.color,
        })
        .await?;

    Ok(ApiResponse::ok(HtmlResponse { html }, "HTML generated successfully"))
}

/// POST /api/v1/openAi/convert-image (multipart, field `image`)
pub async fn handle_convert_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<HtmlResponse>, AppError> {
    let mut multipart = multipart?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        upload = Some(ImageUpload {
            bytes,
            content_type,
        });
        break;
    }
    let upload = upload.ok_or_else(|| AppError::Validation("image is required".to_string()))?;

    let html = state.orchestrator.convert_image(upload).await?;

    Ok(ApiResponse::ok(
        HtmlResponse { html },
        "Image converted to HTML successfully",
    ))
}

fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))
}
