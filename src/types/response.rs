//! Canonical response types
//!
//! Deserialized from the canonical (snake_case) tree the from-wire
//! converters produce, never directly from backend payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::content::{Content, FunctionCall};

/// Response from content generation, complete or one streamed chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GenerateContentResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<PromptFeedback>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    /// Synthetic turns from automatic function calling; present only when
    /// the caller opted in via `ignore_call_history = false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automatic_function_calling_history: Option<Vec<Content>>,
    /// Raw body echo, attached when `http_options.response_payload` was
    /// set. Local bookkeeping, never serialized.
    #[serde(skip)]
    pub sdk_http_response: Option<Value>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's text parts, `None` when
    /// there is no textual content.
    pub fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let content = candidate.content.as_ref()?;
        let mut out = String::new();
        let mut any = false;
        for part in &content.parts {
            if let Some(text) = &part.text {
                out.push_str(text);
                any = true;
            }
        }
        any.then_some(out)
    }

    /// Function calls across the first candidate's parts, in part order.
    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.function_call.as_ref())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Candidate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_ratings: Option<Vec<SafetyRating>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_metadata: Option<CitationMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_logprobs: Option<f64>,
}

/// Source citations. The two backends use different wire field names for
/// the list; the canonical name is `citations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CitationMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Citation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SafetyRating {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PromptFeedback {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_reason_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_ratings: Option<Vec<SafetyRating>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UsageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_token_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates_token_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_token_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_content_token_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thoughts_token_count: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CountTokensResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_content_token_count: Option<i32>,
    #[serde(skip)]
    pub sdk_http_response: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EmbedContentResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeddings: Vec<ContentEmbedding>,
    #[serde(skip)]
    pub sdk_http_response: Option<Value>,
}

/// A model-tuning job. States use the Vertex `JOB_STATE_*` vocabulary on
/// both backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TuningJob {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<chrono::DateTime<chrono::Utc>>,
    /// Failure detail; Vertex only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tuned_model: Option<TunedModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tuned_model_display_name: Option<String>,
    #[serde(skip)]
    pub sdk_http_response: Option<Value>,
}

/// The model a finished tuning job produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TunedModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContentEmbedding {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::content::Part;

    #[test]
    fn text_concatenates_first_candidate_text_parts() {
        let response = GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content::model(vec![
                    Part::from_text("Hello"),
                    Part::from_function_call("f", serde_json::json!({})),
                    Part::from_text(", world"),
                ])),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(response.text(), Some("Hello, world".to_string()));
    }

    #[test]
    fn text_is_none_without_text_parts() {
        let response = GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content::model(vec![Part::from_function_call(
                    "f",
                    serde_json::json!({}),
                )])),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(response.text(), None);
        assert_eq!(GenerateContentResponse::default().text(), None);
    }

    #[test]
    fn function_calls_come_from_first_candidate_in_order() {
        let response = GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content::model(vec![
                    Part::from_function_call("first", serde_json::json!({})),
                    Part::from_text("between"),
                    Part::from_function_call("second", serde_json::json!({})),
                ])),
                ..Default::default()
            }],
            ..Default::default()
        };
        let calls = response.function_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name.as_deref(), Some("first"));
        assert_eq!(calls[1].name.as_deref(), Some("second"));
    }
}
