use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Author name and avatar are copied from the user at submission time so
/// historical feedback is unaffected by later profile edits.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRow {
    pub id: Uuid,
    /// Insertion order; breaks `created_at` ties.
    #[serde(skip)]
    pub seq: i64,
    pub external_user_id: String,
    pub author: Option<String>,
    pub avatar: Option<String>,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
