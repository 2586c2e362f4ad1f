//! Feedback Aggregator: short free-text feedback tied to a known user and a
//! "latest entry per author" feed.

use tracing::info;

use crate::errors::AppError;
use crate::models::feedback::FeedbackRow;
use crate::store::{DocumentStore, NewFeedback};

/// Maximum number of entries in the public feed.
pub const FEED_LIMIT: i64 = 18;

pub async fn add_feedback(
    store: &dyn DocumentStore,
    external_user_id: &str,
    role: &str,
    content: &str,
) -> Result<FeedbackRow, AppError> {
    let user = store
        .find_user_by_external_id(external_user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    // Author name and avatar are snapshotted, not referenced.
    let row = store
        .insert_feedback(NewFeedback {
            external_user_id: external_user_id.to_string(),
            author: user.full_name.or(user.username),
            avatar: user.avatar_url,
            role: role.to_string(),
            content: content.to_string(),
        })
        .await?;

    info!("Recorded feedback {} from user {}", row.id, user.id);
    Ok(row)
}

/// Each author's most recent entry, newest first. An empty feed is not an error.
pub async fn latest_feedback(store: &dyn DocumentStore) -> Result<Vec<FeedbackRow>, AppError> {
    Ok(store.latest_feedback_per_author(FEED_LIMIT).await?)
}
