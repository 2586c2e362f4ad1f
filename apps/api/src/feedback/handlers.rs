//! Axum route handlers for the Feedback API.

use axum::extract::State;
use serde::Deserialize;

use crate::errors::AppError;
use crate::feedback::service;
use crate::models::feedback::FeedbackRow;
use crate::response::{ApiResponse, AppJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddFeedbackRequest {
    /// External user id.
    pub id: Option<String>,
    pub role: Option<String>,
    pub content: Option<String>,
}

/// POST /api/v1/feedback/AddFeedback
pub async fn handle_add_feedback(
    State(state): State<AppState>,
    AppJson(request): AppJson<AddFeedbackRequest>,
) -> Result<ApiResponse<FeedbackRow>, AppError> {
    let present = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let (Some(id), Some(role), Some(content)) = (
        present(&request.id),
        present(&request.role),
        present(&request.content),
    ) else {
        return Err(AppError::Validation(
            "All fields (id, role, content) are required".to_string(),
        ));
    };

    let row = service::add_feedback(state.store.as_ref(), &id, &role, &content).await?;
    Ok(ApiResponse::created(row, "Feedback added successfully"))
}

/// POST /api/v1/feedback/GetFeedback
pub async fn handle_get_feedback(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<FeedbackRow>>, AppError> {
    let feedback = service::latest_feedback(state.store.as_ref()).await?;
    let message = if feedback.is_empty() {
        "No feedback yet"
    } else {
        "Latest feedback retrieved successfully"
    };
    Ok(ApiResponse::ok(feedback, message))
}
