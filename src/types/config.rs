//! Per-call configuration types
//!
//! Every operation takes explicit required arguments plus one optional
//! config. Configs deserialize from plain JSON mappings too, validated
//! against the same strict field set (`deny_unknown_fields`), so a typo'd
//! key fails at construction instead of being silently dropped.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transformers::ContentUnion;
use crate::types::schema::{FunctionDeclaration, Schema};

/// Configuration for content generation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GenerateContentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_logprobs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
    /// Vertex-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_timestamp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_settings: Option<Vec<SafetySetting>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<ContentUnion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolUnion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<ToolConfig>,
    /// Vertex-only request labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automatic_function_calling: Option<AutomaticFunctionCallingConfig>,
    /// Per-call HTTP overrides; never sent on the wire.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_options: Option<HttpOptions>,
}

impl GenerateContentConfig {
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_top_k(mut self, top_k: i32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: i32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<ContentUnion>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_response_schema(mut self, schema: Schema) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_tool(mut self, tool: impl Into<ToolUnion>) -> Self {
        self.tools.push(tool.into());
        self
    }

    pub fn with_safety_setting(mut self, setting: SafetySetting) -> Self {
        self.safety_settings
            .get_or_insert_with(Vec::new)
            .push(setting);
        self
    }

    pub fn with_automatic_function_calling(
        mut self,
        config: AutomaticFunctionCallingConfig,
    ) -> Self {
        self.automatic_function_calling = Some(config);
        self
    }

    pub fn with_http_options(mut self, options: HttpOptions) -> Self {
        self.http_options = Some(options);
        self
    }
}

/// A tool entry: either a declaration-only [`Tool`] or a host callable
/// that automatic function calling can execute.
///
/// `Callable` is listed first: [`Tool`]'s fields are all optional, so it
/// would otherwise match callable-shaped mappings during untagged
/// deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolUnion {
    Callable(CallableTool),
    Tool(Tool),
}

impl ToolUnion {
    pub(crate) fn as_callable(&self) -> Option<&CallableTool> {
        match self {
            ToolUnion::Callable(callable) => Some(callable),
            ToolUnion::Tool(_) => None,
        }
    }
}

impl From<Tool> for ToolUnion {
    fn from(tool: Tool) -> Self {
        ToolUnion::Tool(tool)
    }
}

impl From<CallableTool> for ToolUnion {
    fn from(callable: CallableTool) -> Self {
        ToolUnion::Callable(callable)
    }
}

/// Declaration-only tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_declarations: Option<Vec<FunctionDeclaration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_execution: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_search: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<Value>,
}

impl Tool {
    pub fn with_function_declarations(declarations: Vec<FunctionDeclaration>) -> Self {
        Tool {
            function_declarations: Some(declarations),
            ..Default::default()
        }
    }
}

type ToolResult = std::result::Result<Value, Box<dyn std::error::Error + Send + Sync>>;
type BoxedToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// The host function behind a [`CallableTool`].
#[derive(Clone)]
pub enum ToolHandler {
    Sync(Arc<dyn Fn(Value) -> ToolResult + Send + Sync>),
    Async(Arc<dyn Fn(Value) -> BoxedToolFuture + Send + Sync>),
}

impl std::fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolHandler::Sync(_) => f.write_str("ToolHandler::Sync"),
            ToolHandler::Async(_) => f.write_str("ToolHandler::Async"),
        }
    }
}

/// A declared function paired with the host callable that implements it.
///
/// The handler never serializes; a round-tripped callable degrades to a
/// declaration-only entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallableTool {
    pub declaration: FunctionDeclaration,
    #[serde(skip)]
    pub handler: Option<ToolHandler>,
}

impl CallableTool {
    pub fn new<F>(declaration: FunctionDeclaration, handler: F) -> Self
    where
        F: Fn(Value) -> ToolResult + Send + Sync + 'static,
    {
        CallableTool {
            declaration,
            handler: Some(ToolHandler::Sync(Arc::new(handler))),
        }
    }

    pub fn new_async<F, Fut>(declaration: FunctionDeclaration, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        CallableTool {
            declaration,
            handler: Some(ToolHandler::Async(Arc::new(move |args| {
                Box::pin(handler(args))
            }))),
        }
    }
}

/// Controls the automatic function-calling loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AutomaticFunctionCallingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable: Option<bool>,
    /// Upper bound on model round-trips. Defaults to 10; zero or negative
    /// still performs one model call but executes nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_remote_calls: Option<i32>,
    /// Synthetic history is attached to the response only when this is
    /// explicitly `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_call_history: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SafetySetting {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<String>,
    /// Vertex-only: probability vs severity scoring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_calling_config: Option<FunctionCallingConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FunctionCallingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_function_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SpeechConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_config: Option<VoiceConfig>,
    /// Vertex-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct VoiceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prebuilt_voice_config: Option<PrebuiltVoiceConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PrebuiltVoiceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ThinkingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_thoughts: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<i32>,
}

/// HTTP behavior overrides, settable per client and per call. Per-call
/// values win field-wise; headers merge shallowly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct HttpOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Request timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Vertex: skip the `projects/{p}/locations/{l}/` path prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_project_and_location_in_path: Option<bool>,
    /// Echo the raw response body on the typed response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_payload: Option<bool>,
}

impl HttpOptions {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }
}

/// Configuration for token counting.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CountTokensConfig {
    /// Vertex-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<ContentUnion>,
    /// Vertex-only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    /// Vertex-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_options: Option<HttpOptions>,
}

/// Configuration for embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct EmbedContentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dimensionality: Option<i32>,
    /// Vertex-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Vertex-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_truncate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_options: Option<HttpOptions>,
}

/// Configuration for uploading to the file store.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct UploadFileConfig {
    /// Resource name, `files/...`. Assigned by the server when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Required when uploading raw bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_options: Option<HttpOptions>,
}

/// One inline prompt/response pair of a tuning dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TuningExample {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Training data for a tuning job. Inline examples exist on the Developer
/// API only; Cloud Storage datasets exist on Vertex only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TuningDataset {
    /// `gs://` URI of a JSONL training file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gcs_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<TuningExample>>,
}

/// Validation data for a tuning job; Vertex only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TuningValidationDataset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gcs_uri: Option<String>,
}

/// Configuration for starting a tuning job.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CreateTuningJobConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tuned_model_display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epoch_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_rate_multiplier: Option<f64>,
    /// Adapter size enum, e.g. `ADAPTER_SIZE_FOUR`. Vertex only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_dataset: Option<TuningValidationDataset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_options: Option<HttpOptions>,
}

/// Configuration for a live (bidirectional streaming) session.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LiveConnectConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<ContentUnion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolUnion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_resumption: Option<SessionResumptionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realtime_input_config: Option<RealtimeInputConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window_compression: Option<ContextWindowCompressionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<AudioTranscriptionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<AudioTranscriptionConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SessionResumptionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Vertex-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transparent: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RealtimeInputConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automatic_activity_detection: Option<AutomaticActivityDetection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_handling: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_coverage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AutomaticActivityDetection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_of_speech_sensitivity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_of_speech_sensitivity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix_padding_ms: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silence_duration_ms: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ContextWindowCompressionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sliding_window: Option<SlidingWindow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SlidingWindow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_tokens: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AudioTranscriptionConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_config_key_is_rejected() {
        let err = serde_json::from_value::<GenerateContentConfig>(json!({
            "temperature": 0.5,
            "temprature": 0.5
        }));
        assert!(err.is_err());
    }

    #[test]
    fn plain_mapping_validates_against_field_set() {
        let config: GenerateContentConfig = serde_json::from_value(json!({
            "temperature": 0.7,
            "top_k": 2,
            "stop_sequences": ["END"]
        }))
        .unwrap();
        assert_eq!(config.temperature, Some(0.7));
        assert_eq!(config.top_k, Some(2));
        assert_eq!(config.stop_sequences, Some(vec!["END".to_string()]));
    }

    #[test]
    fn top_k_round_trips_as_integer() {
        let config = GenerateContentConfig::default().with_top_k(2);
        let v = serde_json::to_value(&config).unwrap();
        assert_eq!(v, json!({"top_k": 2}));
    }

    #[test]
    fn callable_tool_handler_survives_clone_but_not_serde() {
        let tool = CallableTool::new(
            FunctionDeclaration::builder("f").build().unwrap(),
            |_args| Ok(json!(null)),
        );
        assert!(tool.clone().handler.is_some());
        let v = serde_json::to_value(&tool).unwrap();
        let back: CallableTool = serde_json::from_value(v).unwrap();
        assert!(back.handler.is_none());
        assert_eq!(back.declaration.name, "f");
    }

    #[test]
    fn only_the_callable_variant_exposes_a_handler() {
        let decl = FunctionDeclaration::builder("f").build().unwrap();
        let plain = ToolUnion::from(Tool::with_function_declarations(vec![decl.clone()]));
        let callable = ToolUnion::from(CallableTool::new(decl, |_| Ok(json!(null))));
        assert!(plain.as_callable().is_none());
        assert!(callable.as_callable().is_some());
    }

    #[test]
    fn http_options_builder_sets_headers() {
        let options = HttpOptions::default()
            .with_base_url("https://example.test/")
            .with_api_version("v1beta")
            .with_header("x-test", "1")
            .with_timeout(5_000);
        assert_eq!(options.headers.get("x-test").map(String::as_str), Some("1"));
        assert_eq!(options.timeout, Some(5_000));
    }
}
