//! Resume CRUD on top of the Document Store.
//!
//! Callers are identified by their external (identity provider) id; every
//! operation that acts on behalf of a user resolves it first.

use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::conversation::ConversationTurnRow;
use crate::models::resume::ResumeSnapshot;
use crate::models::user::User;
use crate::store::{DocumentStore, NewResume, ProfileFields, ResumeChanges, Sections};

pub struct CreateResume {
    pub external_user_id: Option<String>,
    pub template_name: String,
    pub template_id: Option<String>,
    pub profile: ProfileFields,
    pub sections: Sections,
}

pub struct UpdateResume {
    pub resume_id: Uuid,
    pub external_user_id: Option<String>,
    pub template_name: Option<String>,
    pub profile: ProfileFields,
    pub sections: Sections,
}

/// Missing id → `Unauthorized`; unknown id → `NotFound`.
pub async fn resolve_user(
    store: &dyn DocumentStore,
    external_user_id: Option<&str>,
) -> Result<User, AppError> {
    let external_user_id = external_user_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(AppError::Unauthorized)?;

    store
        .find_user_by_external_id(external_user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn create_resume(
    store: &dyn DocumentStore,
    request: CreateResume,
) -> Result<ResumeSnapshot, AppError> {
    let user = resolve_user(store, request.external_user_id.as_deref()).await?;

    if store
        .template_name_exists(user.id, &request.template_name)
        .await?
    {
        return Err(AppError::DuplicateTemplateName);
    }

    // A concurrent create that wins the race is caught by the unique
    // constraint and surfaces as StoreError::Conflict → DuplicateTemplateName.
    let snapshot = store
        .create_resume(NewResume {
            user_id: user.id,
            template_name: request.template_name,
            template_id: request.template_id,
            profile: request.profile,
            sections: request.sections,
        })
        .await?;

    info!(
        "Created resume {} ('{}') for user {}",
        snapshot.resume.id, snapshot.resume.template_name, user.id
    );
    Ok(snapshot)
}

pub async fn update_resume(
    store: &dyn DocumentStore,
    request: UpdateResume,
) -> Result<ResumeSnapshot, AppError> {
    let user = resolve_user(store, request.external_user_id.as_deref()).await?;

    let existing = store
        .find_resume(request.resume_id)
        .await?
        .filter(|r| r.user_id == user.id)
        .ok_or_else(|| AppError::NotFound("Resume not found".to_string()))?;

    let template_name = request
        .template_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    if let Some(name) = &template_name {
        if *name != existing.template_name && store.template_name_exists(user.id, name).await? {
            return Err(AppError::DuplicateTemplateName);
        }
    }

    let snapshot = store
        .update_resume(
            existing.id,
            ResumeChanges {
                template_name,
                profile: request.profile,
                sections: request.sections,
            },
        )
        .await?;

    info!("Updated resume {} for user {}", snapshot.resume.id, user.id);
    Ok(snapshot)
}

pub async fn list_resumes(
    store: &dyn DocumentStore,
    external_user_id: &str,
) -> Result<Vec<ResumeSnapshot>, AppError> {
    let user = resolve_user(store, Some(external_user_id)).await?;
    Ok(store.list_snapshots(user.id).await?)
}

pub async fn get_resume(
    store: &dyn DocumentStore,
    resume_id: Uuid,
) -> Result<ResumeSnapshot, AppError> {
    store
        .load_snapshot(resume_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Resume not found".to_string()))
}

pub async fn get_conversation(
    store: &dyn DocumentStore,
    resume_id: Uuid,
) -> Result<Vec<ConversationTurnRow>, AppError> {
    if store.find_resume(resume_id).await?.is_none() {
        return Err(AppError::NotFound("Resume not found".to_string()));
    }
    Ok(store.list_turns(resume_id).await?)
}

/// `Ok(true)` when the name is free. A user that cannot be resolved owns no
/// resumes, so every name is free for them.
pub async fn template_name_is_unique(
    store: &dyn DocumentStore,
    external_user_id: &str,
    template_name: &str,
) -> Result<bool, AppError> {
    match store.find_user_by_external_id(external_user_id).await? {
        Some(user) => Ok(!store.template_name_exists(user.id, template_name).await?),
        None => Ok(true),
    }
}

pub async fn delete_resume(store: &dyn DocumentStore, resume_id: Uuid) -> Result<(), AppError> {
    if !store.delete_resume(resume_id).await? {
        return Err(AppError::NotFound("Resume not found".to_string()));
    }
    info!("Deleted resume {resume_id}");
    Ok(())
}
