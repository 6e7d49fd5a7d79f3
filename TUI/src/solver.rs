// Solver client: one structured-output request per solve against the
// Gemini generateContent endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::AiConfig;
use crate::error::SolverError;
use crate::types::AiResponse;

pub const SYSTEM_INSTRUCTION: &str = "You are NeoCalc, an elite AI mathematician.
Analyze the input (text or image) and solve the problem.
Provide:
1. A clear, concise final answer.
2. Logical step-by-step breakdown.
3. A brief intuitive explanation.
4. If the query involves a function (e.g., y = x^2), provide 10-20 data points for plotting.

Always return valid JSON matching the schema provided.";

/// Sent when the user gave an image but no words.
pub const DEFAULT_IMAGE_QUERY: &str = "Explain this problem";

/// Base64 image payload attached to a solve.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

#[async_trait]
pub trait MathSolver: Send + Sync {
    async fn solve(
        &self,
        query: &str,
        image: Option<&InlineImage>,
    ) -> Result<AiResponse, SolverError>;
}

/// Used when no credential is configured or `--offline` is given.
pub struct OfflineSolver;

#[async_trait]
impl MathSolver for OfflineSolver {
    async fn solve(
        &self,
        _query: &str,
        _image: Option<&InlineImage>,
    ) -> Result<AiResponse, SolverError> {
        Err(SolverError::MissingCredential)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

/// The structured-output contract every reply must follow.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "answer": { "type": "STRING" },
            "steps": {
                "type": "ARRAY",
                "items": { "type": "STRING" }
            },
            "explanation": { "type": "STRING" },
            "graphableData": {
                "type": "OBJECT",
                "properties": {
                    "label": { "type": "STRING" },
                    "points": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "x": { "type": "NUMBER" },
                                "y": { "type": "NUMBER" }
                            },
                            "required": ["x", "y"]
                        }
                    }
                }
            }
        },
        "required": ["answer", "steps", "explanation"]
    })
}

fn text_part(text: String) -> Part {
    Part { text: Some(text), inline_data: None }
}

fn build_request(query: &str, image: Option<&InlineImage>) -> GenerateRequest {
    let parts = match image {
        Some(img) => vec![
            Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: img.mime_type.clone(),
                    data: img.data.clone(),
                }),
            },
            text_part(format!(
                "Solve this math problem. If it's a function, provide points for a graph. Query: {}",
                query
            )),
        ],
        None => vec![text_part(query.to_string())],
    };

    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![text_part(SYSTEM_INSTRUCTION.to_string())],
        },
        contents: vec![Content { role: Some("user".to_string()), parts }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: response_schema(),
        },
    }
}

/// Pull the answer JSON out of a generateContent reply body.
fn parse_reply(reply: GenerateResponse) -> Result<AiResponse, SolverError> {
    let text: String = reply
        .candidates
        .into_iter()
        .next()
        .map(|c| c.content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
    Ok(serde_json::from_str(text)?)
}

pub struct GeminiSolver {
    http: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl GeminiSolver {
    pub fn new(config: &AiConfig, api_key: impl Into<String>) -> Result<Self, SolverError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl MathSolver for GeminiSolver {
    async fn solve(
        &self,
        query: &str,
        image: Option<&InlineImage>,
    ) -> Result<AiResponse, SolverError> {
        let body = build_request(query, image);
        debug!(model = %self.model, with_image = image.is_some(), "sending solve request");

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "model rejected request");
            return Err(SolverError::Api { status: status.as_u16(), message });
        }

        let reply: GenerateResponse = serde_json::from_slice(&response.bytes().await?)?;
        let parsed = parse_reply(reply)?;
        info!(
            steps = parsed.steps.len(),
            graph = parsed.graphable_data.is_some(),
            "solve finished"
        );
        Ok(parsed)
    }
}

/// Build the configured solver, falling back to offline when there is no key.
pub fn from_config(config: &AiConfig, offline: bool) -> Result<Arc<dyn MathSolver>, SolverError> {
    match (&config.api_key, offline) {
        (Some(key), false) => Ok(Arc::new(GeminiSolver::new(config, key.clone())?)),
        _ => {
            info!("no solver credential, running offline");
            Ok(Arc::new(OfflineSolver))
        }
    }
}
