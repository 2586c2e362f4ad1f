//! Generation Orchestrator: drives one generation request through
//! validating → (loading-context) → compiling-prompt → generating →
//! post-processing → persisting → done.
//!
//! Every collaborator is injected, so the whole pipeline runs against the
//! in-memory store and a scripted gateway in tests.
//!
//! Failure policy: validation errors are raised before any side effect. On the
//! context-aware path the user's instruction turn is committed during
//! loading-context and deliberately survives a later gateway failure; the
//! assistant turn and the rendered payload are only written together after a
//! successful generation.

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::compiler::{
    compile_cold_start, compile_image_conversion, compile_with_context, CompiledPrompt, Theme,
};
use crate::generation::snapshot::{snapshot_key, SnapshotSink};
use crate::generation::token::TokenSource;
use crate::llm_client::fences::strip_fences;
use crate::llm_client::gateway::{
    Completion, CompletionRequest, GatewayError, GenerationGateway, ImageAttachment,
    OutputShape,
};
use crate::store::DocumentStore;

const FALLBACK_IMAGE_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    LoadingContext,
    CompilingPrompt,
    Generating,
    PostProcessing,
    Persisting,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::LoadingContext => "loading-context",
            Stage::CompilingPrompt => "compiling-prompt",
            Stage::Generating => "generating",
            Stage::PostProcessing => "post-processing",
            Stage::Persisting => "persisting",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Requests
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FreshRequest {
    pub brief: String,
    pub theme: Theme,
    pub with_template: bool,
}

#[derive(Debug, Clone)]
pub struct RefineRequest {
    pub resume_id: Uuid,
    pub instruction: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Bytes,
    /// Content type declared by the client, used only when sniffing fails.
    pub content_type: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ────────────────────────────────────────────────────────────────────────────

pub struct Orchestrator {
    store: Arc<dyn DocumentStore>,
    gateway: Arc<dyn GenerationGateway>,
    snapshots: Arc<dyn SnapshotSink>,
    tokens: Arc<dyn TokenSource>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn GenerationGateway>,
        snapshots: Arc<dyn SnapshotSink>,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            store,
            gateway,
            snapshots,
            tokens,
        }
    }

    /// Cold start. Returns the requested fields (`html`, or the template
    /// fields) with fences stripped from each.
    pub async fn generate_fresh(
        &self,
        request: FreshRequest,
    ) -> Result<Map<String, Value>, AppError> {
        info!(stage = %Stage::Validating, "Cold-start generation requested");
        if request.brief.trim().is_empty() {
            return Err(AppError::Validation("userInput is required".to_string()));
        }

        let token = self.tokens.next_token();
        info!(stage = %Stage::CompilingPrompt, token, with_template = request.with_template);
        let prompt = compile_cold_start(&request.brief, request.theme, request.with_template, token);
        let shape = prompt.output_shape.clone();

        let completion = self.generate(prompt, None).await?;

        info!(stage = %Stage::PostProcessing, token);
        let fields = match &shape {
            Some(shape) => extract_fields(completion, shape)?,
            None => {
                let mut fields = Map::new();
                fields.insert("html".to_string(), Value::String(into_html(completion)?));
                fields
            }
        };

        info!(stage = %Stage::Persisting, token);
        let archived: String = fields
            .values()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        self.archive(token, &archived).await;

        info!(stage = %Stage::Done, token, "Cold-start generation complete");
        Ok(fields)
    }

    /// Refines a stored resume. The instruction turn (and any color change)
    /// is committed before generation; the reply and the rendered payload are
    /// committed together afterwards.
    pub async fn refine_with_context(&self, request: RefineRequest) -> Result<String, AppError> {
        let resume_id = request.resume_id;
        info!(stage = %Stage::Validating, %resume_id, "Context-aware generation requested");
        let instruction = request.instruction.trim();
        if instruction.is_empty() {
            return Err(AppError::Validation("userInput is required".to_string()));
        }
        let color = request
            .color
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        info!(stage = %Stage::LoadingContext, %resume_id, color_change = color.is_some());
        let snapshot = self
            .store
            .open_turn(resume_id, color, instruction)
            .await?
            .ok_or_else(|| AppError::NotFound("Resume not found".to_string()))?;

        let token = self.tokens.next_token();
        info!(stage = %Stage::CompilingPrompt, %resume_id, token);
        let prompt = compile_with_context(&snapshot, instruction, token);

        let completion = match self.generate(prompt, None).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!(
                    stage = %Stage::Generating,
                    %resume_id,
                    "Generation failed; instruction turn kept, rendered payload unchanged"
                );
                return Err(e);
            }
        };

        info!(stage = %Stage::PostProcessing, %resume_id);
        let html = into_html(completion)?;

        info!(stage = %Stage::Persisting, %resume_id, bytes = html.len());
        self.store.record_reply(resume_id, &html).await?;

        info!(stage = %Stage::Done, %resume_id, "Context-aware generation complete");
        Ok(html)
    }

    /// Converts an uploaded template image into an HTML replica.
    pub async fn convert_image(&self, upload: ImageUpload) -> Result<String, AppError> {
        info!(stage = %Stage::Validating, bytes = upload.bytes.len(), "Image conversion requested");
        if upload.bytes.is_empty() {
            return Err(AppError::Validation("image is required".to_string()));
        }

        let media_type = detect_media_type(&upload.bytes, upload.content_type.as_deref());
        let image = ImageAttachment {
            media_type,
            base64_data: BASE64.encode(&upload.bytes),
        };

        let token = self.tokens.next_token();
        info!(stage = %Stage::CompilingPrompt, token, media_type = %image.media_type);
        let prompt = compile_image_conversion();

        let completion = self.generate(prompt, Some(image)).await?;

        info!(stage = %Stage::PostProcessing, token);
        let html = into_html(completion)?;

        info!(stage = %Stage::Persisting, token);
        self.archive(token, &html).await;

        info!(stage = %Stage::Done, token, "Image conversion complete");
        Ok(html)
    }

    async fn generate(
        &self,
        prompt: CompiledPrompt,
        image: Option<ImageAttachment>,
    ) -> Result<Completion, AppError> {
        info!(
            stage = %Stage::Generating,
            structured = prompt.output_shape.is_some(),
            with_image = image.is_some()
        );
        let request = CompletionRequest {
            instructions: prompt.instructions,
            user_message: prompt.user_message,
            image,
            output_shape: prompt.output_shape,
        };
        Ok(self.gateway.complete(request).await?)
    }

    /// Best-effort: a failed upload is logged and otherwise ignored.
    async fn archive(&self, token: u64, html: &str) {
        let key = snapshot_key(token);
        if let Err(e) = self.snapshots.save(&key, html).await {
            warn!(stage = %Stage::Persisting, %key, "Snapshot upload failed: {e:#}");
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Post-processing
// ────────────────────────────────────────────────────────────────────────────

fn into_html(completion: Completion) -> Result<String, AppError> {
    let html = match completion {
        Completion::Text(text) => strip_fences(&text).to_string(),
        Completion::Structured(_) => {
            return Err(GatewayError::Unavailable(
                "provider returned structured output where text was expected".to_string(),
            )
            .into())
        }
    };
    if html.is_empty() {
        return Err(GatewayError::Unavailable("provider returned an empty document".to_string()).into());
    }
    Ok(html)
}

/// Picks the shape's fields out of the structured payload. Required fields
/// must be present as strings; optional ones are dropped when absent or blank.
fn extract_fields(
    completion: Completion,
    shape: &OutputShape,
) -> Result<Map<String, Value>, AppError> {
    let payload = match completion {
        Completion::Structured(value) => value,
        // Some providers answer a shaped request with fenced JSON text.
        Completion::Text(text) => serde_json::from_str(strip_fences(&text)).map_err(|e| {
            GatewayError::Unavailable(format!("unparseable structured output: {e}"))
        })?,
    };
    let Value::Object(mut payload) = payload else {
        return Err(GatewayError::Unavailable("structured output is not an object".to_string()).into());
    };

    let mut fields = Map::new();
    for field in &shape.fields {
        let value = payload
            .remove(field.name)
            .and_then(|v| v.as_str().map(|s| strip_fences(s).to_string()))
            .filter(|s| !s.is_empty());
        match value {
            Some(value) => {
                fields.insert(field.name.to_string(), Value::String(value));
            }
            None if field.required => {
                return Err(GatewayError::Unavailable(format!(
                    "structured output is missing '{}'",
                    field.name
                ))
                .into())
            }
            None => {}
        }
    }
    Ok(fields)
}

fn detect_media_type(bytes: &[u8], declared: Option<&str>) -> String {
    infer::get(bytes)
        .map(|kind| kind.mime_type())
        .filter(|mime| mime.starts_with("image/"))
        .or_else(|| declared.filter(|mime| mime.starts_with("image/")))
        .unwrap_or(FALLBACK_IMAGE_TYPE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::compiler::{html_shape, template_shape};
    use crate::store::memory::MemoryStore;
    use crate::testing::{MockGateway, RecordingSnapshots, SequenceTokens};
    use serde_json::json;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn orchestrator(
        store: Arc<MemoryStore>,
        gateway: Arc<MockGateway>,
        snapshots: Arc<RecordingSnapshots>,
    ) -> Orchestrator {
        Orchestrator::new(store, gateway, snapshots, Arc::new(SequenceTokens::starting_at(100)))
    }

    fn fresh(brief: &str, with_template: bool) -> FreshRequest {
        FreshRequest {
            brief: brief.to_string(),
            theme: Theme::Dark,
            with_template,
        }
    }

    #[tokio::test]
    async fn test_fresh_strips_fences_and_archives() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_structured(json!({ "html": "```html\n<div id=\"resume-100-container\"></div>\n```" }));
        let snapshots = Arc::new(RecordingSnapshots::default());
        let orch = orchestrator(Arc::new(MemoryStore::new()), gateway.clone(), snapshots.clone());

        let fields = orch.generate_fresh(fresh("Backend engineer", false)).await.unwrap();

        assert_eq!(fields["html"], "<div id=\"resume-100-container\"></div>");
        assert_eq!(
            snapshots.saved(),
            vec![(
                "generated/100.html".to_string(),
                "<div id=\"resume-100-container\"></div>".to_string()
            )]
        );
        assert_eq!(gateway.requests()[0].output_shape, Some(html_shape()));
    }

    #[tokio::test]
    async fn test_fresh_rejects_blank_brief_without_calling_gateway() {
        let gateway = Arc::new(MockGateway::new());
        let orch = orchestrator(
            Arc::new(MemoryStore::new()),
            gateway.clone(),
            Arc::new(RecordingSnapshots::default()),
        );

        let err = orch.generate_fresh(fresh("   ", false)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fresh_template_fields_drop_blank_optional() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_structured(json!({
            "jobtitle": "<h1>Ada</h1>",
            "aboutme": "<p>About</p>",
            "experience": "<ul></ul>",
            "education": "<ul></ul>",
            "skills": "```\n<ul><li>Rust</li></ul>\n```",
            "projects": ""
        }));
        let orch = orchestrator(
            Arc::new(MemoryStore::new()),
            gateway.clone(),
            Arc::new(RecordingSnapshots::default()),
        );

        let fields = orch.generate_fresh(fresh("Ada", true)).await.unwrap();
        assert_eq!(fields["skills"], "<ul><li>Rust</li></ul>");
        assert!(!fields.contains_key("projects"));
        assert_eq!(gateway.requests()[0].output_shape, Some(template_shape()));
    }

    #[tokio::test]
    async fn test_fresh_missing_required_field_is_unavailable() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_structured(json!({ "jobtitle": "<h1>Ada</h1>" }));
        let orch = orchestrator(
            Arc::new(MemoryStore::new()),
            gateway,
            Arc::new(RecordingSnapshots::default()),
        );

        let err = orch.generate_fresh(fresh("Ada", true)).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Generation(GatewayError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_fresh_accepts_fenced_json_text() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_text("```json\n{\"html\": \"<div></div>\"}\n```");
        let orch = orchestrator(
            Arc::new(MemoryStore::new()),
            gateway,
            Arc::new(RecordingSnapshots::default()),
        );

        let fields = orch.generate_fresh(fresh("Ada", false)).await.unwrap();
        assert_eq!(fields["html"], "<div></div>");
    }

    #[tokio::test]
    async fn test_snapshot_failure_does_not_fail_request() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_structured(json!({ "html": "<div></div>" }));
        let orch = orchestrator(
            Arc::new(MemoryStore::new()),
            gateway,
            Arc::new(RecordingSnapshots::failing()),
        );

        assert!(orch.generate_fresh(fresh("Ada", false)).await.is_ok());
    }

    #[tokio::test]
    async fn test_refine_unknown_resume_is_not_found() {
        let gateway = Arc::new(MockGateway::new());
        let orch = orchestrator(
            Arc::new(MemoryStore::new()),
            gateway.clone(),
            Arc::new(RecordingSnapshots::default()),
        );

        let err = orch
            .refine_with_context(RefineRequest {
                resume_id: Uuid::new_v4(),
                instruction: "bigger name".to_string(),
                color: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(gateway.call_count(), 0);
    }

    #[test]
    fn test_detect_media_type_prefers_sniffed_bytes() {
        assert_eq!(detect_media_type(&PNG_HEADER, Some("image/jpeg")), "image/png");
        assert_eq!(detect_media_type(b"not an image", Some("image/webp")), "image/webp");
        assert_eq!(detect_media_type(b"not an image", Some("text/plain")), "image/jpeg");
        assert_eq!(detect_media_type(b"not an image", None), "image/jpeg");
    }

    #[tokio::test]
    async fn test_convert_image_sends_base64_attachment() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_text("```html\n<main>replica</main>\n```");
        let snapshots = Arc::new(RecordingSnapshots::default());
        let orch = orchestrator(Arc::new(MemoryStore::new()), gateway.clone(), snapshots.clone());

        let html = orch
            .convert_image(ImageUpload {
                bytes: Bytes::from_static(&PNG_HEADER),
                content_type: None,
            })
            .await
            .unwrap();

        assert_eq!(html, "<main>replica</main>");
        let request = &gateway.requests()[0];
        let image = request.image.as_ref().unwrap();
        assert_eq!(image.media_type, "image/png");
        assert_eq!(image.base64_data, BASE64.encode(PNG_HEADER));
        assert!(request.output_shape.is_none());
        assert_eq!(snapshots.saved().len(), 1);
    }

    #[tokio::test]
    async fn test_convert_image_rejects_empty_upload() {
        let gateway = Arc::new(MockGateway::new());
        let orch = orchestrator(
            Arc::new(MemoryStore::new()),
            gateway.clone(),
            Arc::new(RecordingSnapshots::default()),
        );

        let err = orch
            .convert_image(ImageUpload {
                bytes: Bytes::new(),
                content_type: Some("image/png".to_string()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(gateway.call_count(), 0);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::LoadingContext.to_string(), "loading-context");
        assert_eq!(Stage::PostProcessing.to_string(), "post-processing");
    }
}
