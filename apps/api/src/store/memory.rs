//! In-memory `DocumentStore` for tests.
//!
//! Mutations run against a cloned copy of the state that is swapped in only on
//! success, mirroring transaction semantics. Faults can be injected to exercise
//! rollback and race handling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
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

const UNIQUE_NAME_CONSTRAINT: &str = "resumes_user_template_name_key";

#[derive(Clone, Default)]
struct State {
    users: Vec<User>,
    resumes: Vec<ResumeSnapshot>,
    feedback: Vec<FeedbackRow>,
    next_seq: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    /// Fail `update_resume` after the old sections were removed.
    fail_update_mid_replace: AtomicBool,
    /// Make `template_name_exists` always answer `false`, as if another
    /// request inserted the name between the check and the write.
    stale_name_checks: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, external_id: &str, full_name: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            external_id: Some(external_id.to_string()),
            username: None,
            full_name: Some(full_name.to_string()),
            email: format!("{external_id}@example.com"),
            phone_number: None,
            avatar_url: Some(format!("https://avatars.example.com/{external_id}.png")),
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().users.push(user.clone());
        user
    }

    pub fn rename_user(&self, external_id: &str, full_name: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state
            .users
            .iter_mut()
            .find(|u| u.external_id.as_deref() == Some(external_id))
        {
            user.full_name = Some(full_name.to_string());
        }
    }

    pub fn fail_next_update_mid_replace(&self) {
        self.fail_update_mid_replace.store(true, Ordering::SeqCst);
    }

    pub fn serve_stale_name_checks(&self) {
        self.stale_name_checks.store(true, Ordering::SeqCst);
    }

    pub fn snapshot(&self, resume_id: Uuid) -> Option<ResumeSnapshot> {
        self.state
            .lock()
            .unwrap()
            .resumes
            .iter()
            .find(|r| r.resume.id == resume_id)
            .cloned()
    }

    pub fn resume_count(&self) -> usize {
        self.state.lock().unwrap().resumes.len()
    }
}

impl State {
    fn resume_mut(&mut self, resume_id: Uuid) -> Option<&mut ResumeSnapshot> {
        self.resumes.iter_mut().find(|r| r.resume.id == resume_id)
    }

    fn name_taken(&self, user_id: Uuid, template_name: &str, except: Option<Uuid>) -> bool {
        self.resumes.iter().any(|r| {
            r.resume.user_id == user_id
                && r.resume.template_name == template_name
                && Some(r.resume.id) != except
        })
    }

    fn push_turn(&mut self, resume_id: Uuid, role: TurnRole, message: &str) -> Result<(), StoreError> {
        self.next_seq += 1;
        let turn = ConversationTurnRow {
            id: Uuid::new_v4(),
            seq: self.next_seq,
            resume_id,
            role: role.as_str().to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
        };
        self.resume_mut(resume_id)
            .ok_or(StoreError::NotFound)?
            .conversation
            .push(turn);
        Ok(())
    }
}

fn build_sections(resume_id: Uuid, sections: &Sections, snapshot: &mut ResumeSnapshot) {
    snapshot.experience = sections
        .experience
        .iter()
        .enumerate()
        .map(|(i, e)| ExperienceRow {
            id: Uuid::new_v4(),
            resume_id,
            position: i as i32,
            company_name: e.company_name.clone(),
            job_title: e.job_title.clone(),
            duration: e.duration.clone(),
        })
        .collect();
    snapshot.education = sections
        .education
        .iter()
        .enumerate()
        .map(|(i, e)| EducationRow {
            id: Uuid::new_v4(),
            resume_id,
            position: i as i32,
            institution: e.institution.clone(),
            degree: e.degree.clone(),
            graduated_year: e.graduated_year.clone(),
        })
        .collect();
    snapshot.certifications = sections
        .certifications
        .iter()
        .enumerate()
        .map(|(i, c)| CertificationRow {
            id: Uuid::new_v4(),
            resume_id,
            position: i as i32,
            name: c.name.clone(),
            issuer: c.issuer.clone(),
            date_issued: c.date_issued,
            deployed_url: c.deployed_url.clone(),
        })
        .collect();
    snapshot.projects = sections
        .projects
        .iter()
        .enumerate()
        .map(|(i, p)| ProjectRow {
            id: Uuid::new_v4(),
            resume_id,
            position: i as i32,
            title: p.title.clone(),
            description: p.description.clone(),
            link: p.link.clone(),
            tech_stack: p.tech_stack.clone(),
        })
        .collect();
}

fn injected_fault() -> StoreError {
    StoreError::Database(sqlx::Error::Protocol("injected fault".to_string()))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn template_name_exists(
        &self,
        user_id: Uuid,
        template_name: &str,
    ) -> Result<bool, StoreError> {
        if self.stale_name_checks.load(Ordering::SeqCst) {
            return Ok(false);
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .name_taken(user_id, template_name, None))
    }

    async fn create_resume(&self, resume: NewResume) -> Result<ResumeSnapshot, StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.name_taken(resume.user_id, &resume.template_name, None) {
            return Err(StoreError::Conflict(UNIQUE_NAME_CONSTRAINT.to_string()));
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        let mut snapshot = ResumeSnapshot {
            resume: ResumeRow {
                id,
                user_id: resume.user_id,
                template_name: resume.template_name,
                template_id: resume.template_id,
                full_name: resume.profile.full_name,
                email: resume.profile.email,
                phone_number: resume.profile.phone_number,
                working_profession: resume.profile.working_profession,
                career_summary: resume.profile.career_summary,
                skills: resume.profile.skills.unwrap_or_default(),
                color: None,
                rendered_html: None,
                created_at: now,
                updated_at: now,
            },
            experience: vec![],
            education: vec![],
            certifications: vec![],
            projects: vec![],
            conversation: vec![],
        };
        build_sections(id, &resume.sections, &mut snapshot);
        state.resumes.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn update_resume(
        &self,
        resume_id: Uuid,
        changes: ResumeChanges,
    ) -> Result<ResumeSnapshot, StoreError> {
        let mut state = self.state.lock().unwrap();
        let mut draft = state.clone();

        let user_id = draft
            .resume_mut(resume_id)
            .ok_or(StoreError::NotFound)?
            .resume
            .user_id;
        if let Some(name) = &changes.template_name {
            if draft.name_taken(user_id, name, Some(resume_id)) {
                return Err(StoreError::Conflict(UNIQUE_NAME_CONSTRAINT.to_string()));
            }
        }

        let snapshot = draft.resume_mut(resume_id).ok_or(StoreError::NotFound)?;
        let row = &mut snapshot.resume;
        let profile = changes.profile;
        if let Some(name) = changes.template_name {
            row.template_name = name;
        }
        row.full_name = profile.full_name.or(row.full_name.take());
        row.email = profile.email.or(row.email.take());
        row.phone_number = profile.phone_number.or(row.phone_number.take());
        row.working_profession = profile.working_profession.or(row.working_profession.take());
        row.career_summary = profile.career_summary.or(row.career_summary.take());
        if let Some(skills) = profile.skills {
            row.skills = skills;
        }
        row.updated_at = Utc::now();

        snapshot.experience.clear();
        snapshot.education.clear();
        snapshot.certifications.clear();
        snapshot.projects.clear();
        if self.fail_update_mid_replace.swap(false, Ordering::SeqCst) {
            return Err(injected_fault());
        }
        build_sections(resume_id, &changes.sections, snapshot);

        let updated = snapshot.clone();
        *state = draft;
        Ok(updated)
    }

    async fn find_resume(&self, resume_id: Uuid) -> Result<Option<ResumeRow>, StoreError> {
        Ok(self.snapshot(resume_id).map(|s| s.resume))
    }

    async fn load_snapshot(&self, resume_id: Uuid) -> Result<Option<ResumeSnapshot>, StoreError> {
        Ok(self.snapshot(resume_id))
    }

    async fn list_snapshots(&self, user_id: Uuid) -> Result<Vec<ResumeSnapshot>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut snapshots: Vec<_> = state
            .resumes
            .iter()
            .filter(|r| r.resume.user_id == user_id)
            .cloned()
            .collect();
        snapshots.sort_by(|a, b| b.resume.created_at.cmp(&a.resume.created_at));
        Ok(snapshots)
    }

    async fn delete_resume(&self, resume_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap();
        let before = state.resumes.len();
        state.resumes.retain(|r| r.resume.id != resume_id);
        Ok(state.resumes.len() != before)
    }

    async fn list_turns(&self, resume_id: Uuid) -> Result<Vec<ConversationTurnRow>, StoreError> {
        Ok(self
            .snapshot(resume_id)
            .map(|s| s.conversation)
            .unwrap_or_default())
    }

    async fn open_turn(
        &self,
        resume_id: Uuid,
        color: Option<&str>,
        instruction: &str,
    ) -> Result<Option<ResumeSnapshot>, StoreError> {
        let mut state = self.state.lock().unwrap();
        let mut draft = state.clone();
        let Some(snapshot) = draft.resume_mut(resume_id) else {
            return Ok(None);
        };
        if let Some(color) = color {
            snapshot.resume.color = Some(color.to_string());
            snapshot.resume.updated_at = Utc::now();
        }
        draft.push_turn(resume_id, TurnRole::User, instruction)?;

        let loaded = draft.resume_mut(resume_id).cloned();
        *state = draft;
        Ok(loaded)
    }

    async fn record_reply(&self, resume_id: Uuid, html: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let mut draft = state.clone();
        let snapshot = draft.resume_mut(resume_id).ok_or(StoreError::NotFound)?;
        snapshot.resume.rendered_html = Some(html.to_string());
        snapshot.resume.updated_at = Utc::now();
        draft.push_turn(resume_id, TurnRole::Assistant, html)?;
        *state = draft;
        Ok(())
    }

    async fn insert_feedback(&self, feedback: NewFeedback) -> Result<FeedbackRow, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.next_seq += 1;
        let row = FeedbackRow {
            id: Uuid::new_v4(),
            seq: state.next_seq,
            external_user_id: feedback.external_user_id,
            author: feedback.author,
            avatar: feedback.avatar,
            role: feedback.role,
            content: feedback.content,
            created_at: Utc::now(),
        };
        state.feedback.push(row.clone());
        Ok(row)
    }

    async fn latest_feedback_per_author(
        &self,
        limit: i64,
    ) -> Result<Vec<FeedbackRow>, StoreError> {
        let state = self.state.lock().unwrap();
        let recency = |row: &FeedbackRow| (row.created_at, row.seq);
        let mut latest: Vec<FeedbackRow> = Vec::new();
        for row in &state.feedback {
            match latest
                .iter_mut()
                .find(|l| l.external_user_id == row.external_user_id)
            {
                Some(existing) if recency(row) > recency(existing) => *existing = row.clone(),
                Some(_) => {}
                None => latest.push(row.clone()),
            }
        }
        latest.sort_by(|a, b| recency(b).cmp(&recency(a)));
        latest.truncate(limit.max(0) as usize);
        Ok(latest)
    }
}
