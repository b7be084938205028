use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::classifier::similarity::SimilarityClassifier;
use crate::classifier::{ClassifierResult, FieldClassifier, ORACLE};
use crate::error::FormError;
use crate::field::{CandidateField, DetectionMethod, FieldType};

const ORACLE_CONFIDENCE: f32 = 0.8;

// ============================================================================
// Oracle client boundary
// ============================================================================

/// External AI collaborator. May be absent or unreachable.
#[async_trait]
pub trait OracleClient: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn generate(&self, field: &CandidateField) -> Result<String, FormError>;
}

/// Understand an oracle answer: a bare type name or `{"type": "..."}`.
pub fn parse_oracle_answer(answer: &str) -> Option<FieldType> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(answer) {
        let named = value
            .get("type")
            .or_else(|| value.get("field_type"))
            .and_then(|t| t.as_str());
        if let Some(name) = named {
            return name.parse().ok();
        }
        if let Some(name) = value.as_str() {
            return name.parse().ok();
        }
    }

    answer
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '`')
        .parse()
        .ok()
}

// ============================================================================
// Ollama Backend
// ============================================================================

pub struct OllamaOracle {
    pub endpoint: String,
    pub model: String,
    client: reqwest::Client,
}

impl Default for OllamaOracle {
    fn default() -> Self {
        Self::new("http://localhost:11434/api/generate", "qwen2.5:1.5b")
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    format: &'static str,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaOracle {
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn tags_endpoint(&self) -> String {
        match self.endpoint.strip_suffix("/api/generate") {
            Some(base) => format!("{}/api/tags", base),
            None => self.endpoint.clone(),
        }
    }

    pub fn build_prompt(field: &CandidateField) -> String {
        let types = FieldType::ALL
            .iter()
            .map(FieldType::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        format!(
r#"You classify web form fields. Pick the semantic type of this field.

FIELD:
- Tag: {}
- Input type: {}
- Label: {}
- Name: {}
- Id: {}
- Placeholder: {}
- Autocomplete: {}

ALLOWED TYPES: {}

Respond with ONLY valid JSON like {{"type":"email"}}, no explanation."#,
            field.tag,
            field.input_type.as_deref().unwrap_or("(none)"),
            field.label.as_deref().unwrap_or("(none)"),
            field.name.as_deref().unwrap_or("(none)"),
            field.id.as_deref().unwrap_or("(none)"),
            field.placeholder.as_deref().unwrap_or("(none)"),
            field.autocomplete.as_deref().unwrap_or("(none)"),
            types
        )
    }
}

#[async_trait]
impl OracleClient for OllamaOracle {
    async fn is_available(&self) -> bool {
        self.client
            .get(self.tags_endpoint())
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn generate(&self, field: &CandidateField) -> Result<String, FormError> {
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: Self::build_prompt(field),
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| FormError::Http {
                context: "ollama generate".into(),
                source: e,
            })?;

        let body: OllamaResponse = response.json().await.map_err(|e| FormError::Http {
            context: "ollama response body".into(),
            source: e,
        })?;
        if body.response.trim().is_empty() {
            return Err(FormError::Oracle("empty response".into()));
        }
        Ok(body.response)
    }
}

// ============================================================================
// Oracle strategy
// ============================================================================

/// Async-only strategy deferring to an `OracleClient`.
///
/// Availability is probed once per session; an unavailable oracle abstains
/// from then on. Concrete answers are fed back as learned entries.
pub struct OracleClassifier {
    client: Arc<dyn OracleClient>,
    timeout: Duration,
    availability: OnceCell<bool>,
    learner: Option<Arc<SimilarityClassifier>>,
}

impl OracleClassifier {
    pub fn new(client: Arc<dyn OracleClient>) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(8),
            availability: OnceCell::new(),
            learner: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_learning(mut self, similarity: Arc<SimilarityClassifier>) -> Self {
        self.learner = Some(similarity);
        self
    }

    pub fn client(&self) -> Arc<dyn OracleClient> {
        Arc::clone(&self.client)
    }
}

#[async_trait]
impl FieldClassifier for OracleClassifier {
    fn name(&self) -> &'static str {
        ORACLE
    }

    fn detect(&self, _field: &CandidateField) -> Option<ClassifierResult> {
        None
    }

    async fn detect_async(&self, field: &CandidateField) -> Option<ClassifierResult> {
        let available = *self
            .availability
            .get_or_init(|| async { self.client.is_available().await })
            .await;
        if !available {
            return None;
        }

        let answer = match tokio::time::timeout(self.timeout, self.client.generate(field)).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                debug!(selector = %field.selector, error = %e, "oracle failed");
                return None;
            }
            Err(_) => {
                warn!(selector = %field.selector, timeout_ms = self.timeout.as_millis() as u64, "oracle timed out");
                return None;
            }
        };

        let field_type = parse_oracle_answer(&answer).filter(|t| *t != FieldType::Unknown)?;

        if !field_type.is_generic() && !field.signals.is_empty() {
            if let Some(learner) = &self.learner {
                learner.record_correction(&field.signals, field_type).await;
            }
        }

        Some(ClassifierResult::new(field_type, ORACLE_CONFIDENCE, DetectionMethod::Oracle))
    }
}
