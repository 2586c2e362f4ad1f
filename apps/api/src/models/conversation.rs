use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

/// One append-only message in a resume's generation dialogue.
/// Ordered by `created_at`, ties broken by `seq` (insertion order).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurnRow {
    pub id: Uuid,
    #[serde(skip)]
    pub seq: i64,
    pub resume_id: Uuid,
    pub role: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurnRow {
    pub fn is_user(&self) -> bool {
        self.role == TurnRole::User.as_str()
    }
}
