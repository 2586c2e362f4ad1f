use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::models::conversation::{ConversationTurnRow, TurnRole};
use crate::models::feedback::FeedbackRow;
use crate::models::resume::{
    CertificationRow, EducationRow, ExperienceRow, ProjectRow, ResumeRow, ResumeSnapshot,
};
use crate::models::user::User;
use crate::store::{
    DocumentStore, NewFeedback, NewResume, ResumeChanges, Sections, StoreError,
};

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE external_id = $1")
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn template_name_exists(
        &self,
        user_id: Uuid,
        template_name: &str,
    ) -> Result<bool, StoreError> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM resumes WHERE user_id = $1 AND template_name = $2)",
        )
        .bind(user_id)
        .bind(template_name)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn create_resume(&self, resume: NewResume) -> Result<ResumeSnapshot, StoreError> {
        let resume_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO resumes
                (id, user_id, template_name, template_id, full_name, email, phone_number,
                 working_profession, career_summary, skills)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(resume_id)
        .bind(resume.user_id)
        .bind(&resume.template_name)
        .bind(&resume.template_id)
        .bind(&resume.profile.full_name)
        .bind(&resume.profile.email)
        .bind(&resume.profile.phone_number)
        .bind(&resume.profile.working_profession)
        .bind(&resume.profile.career_summary)
        .bind(resume.profile.skills.clone().unwrap_or_default())
        .execute(&mut *tx)
        .await?;

        insert_sections(&mut tx, resume_id, &resume.sections).await?;

        let snapshot = fetch_snapshot(&mut tx, resume_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        tx.commit().await?;

        debug!(
            "Created resume {resume_id} ('{}') for user {}",
            resume.template_name, resume.user_id
        );
        Ok(snapshot)
    }

    async fn update_resume(
        &self,
        resume_id: Uuid,
        changes: ResumeChanges,
    ) -> Result<ResumeSnapshot, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE resumes SET
                template_name      = COALESCE($2, template_name),
                full_name          = COALESCE($3, full_name),
                email              = COALESCE($4, email),
                phone_number       = COALESCE($5, phone_number),
                working_profession = COALESCE($6, working_profession),
                career_summary     = COALESCE($7, career_summary),
                skills             = COALESCE($8, skills),
                updated_at         = now()
            WHERE id = $1
            "#,
        )
        .bind(resume_id)
        .bind(&changes.template_name)
        .bind(&changes.profile.full_name)
        .bind(&changes.profile.email)
        .bind(&changes.profile.phone_number)
        .bind(&changes.profile.working_profession)
        .bind(&changes.profile.career_summary)
        .bind(&changes.profile.skills)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(StoreError::NotFound);
        }

        for table in ["experiences", "educations", "certifications", "projects"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE resume_id = $1"))
                .bind(resume_id)
                .execute(&mut *tx)
                .await?;
        }
        insert_sections(&mut tx, resume_id, &changes.sections).await?;

        let snapshot = fetch_snapshot(&mut tx, resume_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        tx.commit().await?;

        debug!("Updated resume {resume_id}");
        Ok(snapshot)
    }

    async fn find_resume(&self, resume_id: Uuid) -> Result<Option<ResumeRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1")
                .bind(resume_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn load_snapshot(&self, resume_id: Uuid) -> Result<Option<ResumeSnapshot>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(fetch_snapshot(&mut conn, resume_id).await?)
    }

    async fn list_snapshots(&self, user_id: Uuid) -> Result<Vec<ResumeSnapshot>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM resumes WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut snapshots = Vec::with_capacity(ids.len());
        for id in ids {
            // A concurrent delete between the two reads just drops the row.
            if let Some(snapshot) = fetch_snapshot(&mut conn, id).await? {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }

    async fn delete_resume(&self, resume_id: Uuid) -> Result<bool, StoreError> {
        let deleted = sqlx::query("DELETE FROM resumes WHERE id = $1")
            .bind(resume_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn list_turns(&self, resume_id: Uuid) -> Result<Vec<ConversationTurnRow>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(fetch_turns(&mut conn, resume_id).await?)
    }

    async fn open_turn(
        &self,
        resume_id: Uuid,
        color: Option<&str>,
        instruction: &str,
    ) -> Result<Option<ResumeSnapshot>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM resumes WHERE id = $1")
            .bind(resume_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            // Dropping the transaction rolls it back.
            return Ok(None);
        }

        if let Some(color) = color {
            sqlx::query("UPDATE resumes SET color = $2, updated_at = now() WHERE id = $1")
                .bind(resume_id)
                .bind(color)
                .execute(&mut *tx)
                .await?;
        }

        insert_turn(&mut tx, resume_id, TurnRole::User, instruction).await?;
        let snapshot = fetch_snapshot(&mut tx, resume_id).await?;
        tx.commit().await?;

        Ok(snapshot)
    }

    async fn record_reply(&self, resume_id: Uuid, html: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE resumes SET rendered_html = $2, updated_at = now() WHERE id = $1",
        )
        .bind(resume_id)
        .bind(html)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(StoreError::NotFound);
        }

        insert_turn(&mut tx, resume_id, TurnRole::Assistant, html).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_feedback(&self, feedback: NewFeedback) -> Result<FeedbackRow, StoreError> {
        Ok(sqlx::query_as::<_, FeedbackRow>(
            r#"
            INSERT INTO feedback (id, external_user_id, author, avatar, role, content)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&feedback.external_user_id)
        .bind(&feedback.author)
        .bind(&feedback.avatar)
        .bind(&feedback.role)
        .bind(&feedback.content)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn latest_feedback_per_author(
        &self,
        limit: i64,
    ) -> Result<Vec<FeedbackRow>, StoreError> {
        Ok(sqlx::query_as::<_, FeedbackRow>(
            r#"
            SELECT * FROM (
                SELECT DISTINCT ON (external_user_id) *
                FROM feedback
                ORDER BY external_user_id, created_at DESC, seq DESC
            ) latest
            ORDER BY created_at DESC, seq DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Connection-level helpers (usable inside or outside a transaction)
// ────────────────────────────────────────────────────────────────────────────

async fn insert_sections(
    conn: &mut PgConnection,
    resume_id: Uuid,
    sections: &Sections,
) -> Result<(), sqlx::Error> {
    for (position, exp) in sections.experience.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO experiences (id, resume_id, position, company_name, job_title, duration)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resume_id)
        .bind(position as i32)
        .bind(&exp.company_name)
        .bind(&exp.job_title)
        .bind(&exp.duration)
        .execute(&mut *conn)
        .await?;
    }

    for (position, edu) in sections.education.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO educations (id, resume_id, position, institution, degree, graduated_year)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resume_id)
        .bind(position as i32)
        .bind(&edu.institution)
        .bind(&edu.degree)
        .bind(&edu.graduated_year)
        .execute(&mut *conn)
        .await?;
    }

    for (position, cert) in sections.certifications.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO certifications
                (id, resume_id, position, name, issuer, date_issued, deployed_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resume_id)
        .bind(position as i32)
        .bind(&cert.name)
        .bind(&cert.issuer)
        .bind(cert.date_issued)
        .bind(&cert.deployed_url)
        .execute(&mut *conn)
        .await?;
    }

    for (position, proj) in sections.projects.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO projects (id, resume_id, position, title, description, link, tech_stack)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resume_id)
        .bind(position as i32)
        .bind(&proj.title)
        .bind(&proj.description)
        .bind(&proj.link)
        .bind(&proj.tech_stack)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn insert_turn(
    conn: &mut PgConnection,
    resume_id: Uuid,
    role: TurnRole,
    message: &str,
) -> Result<ConversationTurnRow, sqlx::Error> {
    let turn = sqlx::query_as::<_, ConversationTurnRow>(
        r#"
        INSERT INTO conversation_turns (id, resume_id, role, message)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(resume_id)
    .bind(role.as_str())
    .bind(message)
    .fetch_one(&mut *conn)
    .await?;

    debug!("Appended {} turn {} to resume {resume_id}", role.as_str(), turn.id);
    Ok(turn)
}

async fn fetch_turns(
    conn: &mut PgConnection,
    resume_id: Uuid,
) -> Result<Vec<ConversationTurnRow>, sqlx::Error> {
    sqlx::query_as::<_, ConversationTurnRow>(
        "SELECT * FROM conversation_turns WHERE resume_id = $1 ORDER BY created_at ASC, seq ASC",
    )
    .bind(resume_id)
    .fetch_all(&mut *conn)
    .await
}

/// Loads a resume joined with its sub-collections and conversation.
async fn fetch_snapshot(
    conn: &mut PgConnection,
    resume_id: Uuid,
) -> Result<Option<ResumeSnapshot>, sqlx::Error> {
    let Some(resume) = sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1")
        .bind(resume_id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let experience = sqlx::query_as::<_, ExperienceRow>(
        "SELECT * FROM experiences WHERE resume_id = $1 ORDER BY position",
    )
    .bind(resume_id)
    .fetch_all(&mut *conn)
    .await?;

    let education = sqlx::query_as::<_, EducationRow>(
        "SELECT * FROM educations WHERE resume_id = $1 ORDER BY position",
    )
    .bind(resume_id)
    .fetch_all(&mut *conn)
    .await?;

    let certifications = sqlx::query_as::<_, CertificationRow>(
        "SELECT * FROM certifications WHERE resume_id = $1 ORDER BY position",
    )
    .bind(resume_id)
    .fetch_all(&mut *conn)
    .await?;

    let projects = sqlx::query_as::<_, ProjectRow>(
        "SELECT * FROM projects WHERE resume_id = $1 ORDER BY position",
    )
    .bind(resume_id)
    .fetch_all(&mut *conn)
    .await?;

    let conversation = fetch_turns(conn, resume_id).await?;

    Ok(Some(ResumeSnapshot {
        resume,
        experience,
        education,
        certifications,
        projects,
        conversation,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests (need a live Postgres: DATABASE_URL=... cargo test -- --ignored)
// ────────────────────────────────────────────────────────────────────────────
