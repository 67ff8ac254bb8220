use crate::types::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Structured result of the external content-analysis stage.
///
/// `api_error` carries the error marker when the collaborator failed; the
/// remaining fields are then empty. Timing/SLA fields are never produced
/// here — the pipeline computes those itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentAnalysis {
    pub intent_summary: String,
    pub quality_review: String,
    pub improvement_actions: String,
    pub sales_opportunity: String,
    pub negative_sentiment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_error: Option<String>,
}

impl ContentAnalysis {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            api_error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Collaborator boundary: receives a plain-text transcript keyed by
/// conversation id and returns a structured result or an error marker.
/// Implementations never abort the batch.
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    async fn analyze(&self, conversation_id: &str, transcript: &str) -> ContentAnalysis;

    /// Whether calls reach a live external service (drives rate-limit delays).
    fn is_live(&self) -> bool {
        false
    }
}

/// Stub used when no API key is configured.
pub struct NoopAnalyzer;

#[async_trait]
impl ContentAnalyzer for NoopAnalyzer {
    async fn analyze(&self, _conversation_id: &str, _transcript: &str) -> ContentAnalysis {
        ContentAnalysis::error("content analysis skipped: no API key configured")
    }
}

/// Render the chronological `[time] Sender: content` transcript handed to
/// the analyzer.
pub fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|message| format!("[{}] {}: {}", message.time, message.sender, message.content))
        .collect::<Vec<_>>()
        .join("\n")
}

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini-backed analyzer over HTTP.
pub struct GeminiAnalyzer {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiAnalyzer {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Build from `GEMINI_API_KEY`/`GOOGLE_API_KEY`; `None` when neither is
    /// set, so the caller can fall back to the no-op stub.
    pub fn from_env(model: &str) -> Option<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty())?;
        info!("Content analyzer configured with model {}", model);
        Some(Self::new(api_key, model))
    }

    fn prompt(transcript: &str) -> String {
        format!(
            "You are a professional chat analyst. Analyze the customer service \
             conversation below and respond with a single valid JSON object and \
             nothing else (no markdown fences, no commentary).\n\
             Use exactly these keys, with empty strings where nothing applies:\n\
             \"intent_summary\": concise summary of why the customer made contact;\n\
             \"quality_review\": assessment of the agent's communication and \
             problem solving, with concrete examples;\n\
             \"improvement_actions\": specific, actionable follow-ups;\n\
             \"sales_opportunity\": whether the conversation shows a sales or \
             upgrade opportunity, and why;\n\
             \"negative_sentiment\": whether the customer showed negative \
             emotion, and to what degree.\n\
             \n---BEGIN TRANSCRIPT---\n{}\n---END TRANSCRIPT---\n",
            transcript
        )
    }

    async fn call(&self, conversation_id: &str, transcript: &str) -> crate::error::Result<ContentAnalysis> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_ENDPOINT, self.model, self.api_key
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": Self::prompt(transcript) }] }]
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| crate::error::PipelineError::Api {
                message: format!("request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(crate::error::PipelineError::Api {
                message: format!("HTTP {} from analysis API", status.as_u16()),
            });
        }

        let payload: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|e| crate::error::PipelineError::Api {
                    message: format!("invalid response body: {}", e),
                })?;

        let text = payload
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| crate::error::PipelineError::Api {
                message: "empty response from analysis API".to_string(),
            })?;

        parse_analysis_text(&text).map_err(|e| {
            warn!(
                conversation_id = %conversation_id,
                "Analysis response was not valid JSON: {}", e
            );
            crate::error::PipelineError::Api {
                message: format!("unparsable analysis result: {}", e),
            }
        })
    }
}

#[async_trait]
impl ContentAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, conversation_id: &str, transcript: &str) -> ContentAnalysis {
        match self.call(conversation_id, transcript).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(conversation_id = %conversation_id, "Content analysis failed: {}", e);
                ContentAnalysis::error(e.to_string())
            }
        }
    }

    fn is_live(&self) -> bool {
        true
    }
}

/// Parse the model's JSON payload, tolerating stray markdown fences.
fn parse_analysis_text(text: &str) -> serde_json::Result<ContentAnalysis> {
    let trimmed = text.trim();
    match serde_json::from_str(trimmed) {
        Ok(analysis) => Ok(analysis),
        Err(first_err) => {
            let cleaned = trimmed
                .trim_start_matches("```json")
                .trim_start_matches("```")
                .trim_end_matches("```")
                .trim();
            serde_json::from_str(cleaned).map_err(|_| first_err)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CandidatePart {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sender;

    #[test]
    fn test_format_transcript() {
        let messages = vec![
            Message {
                time: "2025-08-01 10:00:00".to_string(),
                timestamp: None,
                sender: Sender::Customer,
                content: "Hello".to_string(),
            },
            Message {
                time: "2025-08-01 10:00:05".to_string(),
                timestamp: None,
                sender: Sender::Agent,
                content: "Hi, how can I help?".to_string(),
            },
        ];
        assert_eq!(
            format_transcript(&messages),
            "[2025-08-01 10:00:00] Customer: Hello\n[2025-08-01 10:00:05] Agent: Hi, how can I help?"
        );
    }

    #[test]
    fn test_parse_analysis_text_plain_json() {
        let parsed =
            parse_analysis_text(r#"{"intent_summary":"pricing question"}"#).unwrap();
        assert_eq!(parsed.intent_summary, "pricing question");
        assert!(parsed.api_error.is_none());
    }

    #[test]
    fn test_parse_analysis_text_strips_fences() {
        let parsed = parse_analysis_text(
            "```json\n{\"intent_summary\":\"repair request\"}\n```",
        )
        .unwrap();
        assert_eq!(parsed.intent_summary, "repair request");
    }

    #[tokio::test]
    async fn test_noop_analyzer_emits_error_marker() {
        let analysis = NoopAnalyzer.analyze("chat-1", "[t] Customer: hi").await;
        assert!(analysis.api_error.is_some());
        assert!(analysis.intent_summary.is_empty());
        assert!(!NoopAnalyzer.is_live());
    }
}
