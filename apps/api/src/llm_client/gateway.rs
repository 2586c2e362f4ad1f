//! The contract every text/vision completion provider satisfies.
//!
//! The orchestrator holds an `Arc<dyn GenerationGateway>`; `LlmClient` is the
//! production implementation and tests substitute a scripted double.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    /// Transport failure, provider outage or an unusable provider payload.
    #[error("generation provider unavailable: {0}")]
    Unavailable(String),

    /// The provider refused the request (safety policy, quota, oversized input).
    #[error("generation request rejected: {0}")]
    Rejected(String),
}

/// One base64-encoded image attached to a vision request.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub media_type: String,
    pub base64_data: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeField {
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub required: bool,
}

/// A flat record of named string fields the provider must return.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputShape {
    pub name: &'static str,
    pub fields: Vec<ShapeField>,
}

impl OutputShape {
    /// JSON Schema for the record: an object of string properties with no extras.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut property = json!({ "type": "string" });
            if let Some(description) = field.description {
                property["description"] = json!(description);
            }
            properties.insert(field.name.to_string(), property);
        }
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub instructions: String,
    pub user_message: String,
    pub image: Option<ImageAttachment>,
    pub output_shape: Option<OutputShape>,
}

/// Raw text when no shape was requested, otherwise the parsed structured record.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Text(String),
    Structured(Value),
}

#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, GatewayError>;
}
