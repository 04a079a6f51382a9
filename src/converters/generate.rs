//! Wire conversion for content generation
//!
//! Tables describe every entity of the generateContent surface. Generation
//! parameters gather into the request's `generationConfig` object while
//! the remaining config fields scatter onto the request root, which is why
//! the config mapper writes through a parent tree.

use serde_json::{Map, Value};

use crate::common::set_value_by_path;
use crate::error::{Error, Result};
use crate::transformers::{t_content, t_model, t_schema, ContentUnion};
use crate::types::config::{GenerateContentConfig, ToolUnion};
use crate::types::content::Content;
use crate::types::response::GenerateContentResponse;
use crate::types::schema::Schema;

use super::engine::{
    enum_rule, enum_to_wire, from_backend, rule, to_backend, Context, EntityMapper, FieldRule,
    Target, Transform,
};

pub(crate) static BLOB: EntityMapper = EntityMapper {
    name: "Blob",
    rules: &[rule("data", "data"), rule("mime_type", "mimeType")],
};

pub(crate) static FILE_DATA: EntityMapper = EntityMapper {
    name: "FileData",
    rules: &[rule("file_uri", "fileUri"), rule("mime_type", "mimeType")],
};

pub(crate) static FUNCTION_CALL: EntityMapper = EntityMapper {
    name: "FunctionCall",
    rules: &[
        // Call ids exist on the Developer API only.
        FieldRule {
            canonical: "id",
            mldev: Target::Wire("id"),
            vertex: Target::Unsupported,
            transform: None,
        },
        rule("name", "name"),
        rule("args", "args"),
    ],
};

pub(crate) static FUNCTION_RESPONSE: EntityMapper = EntityMapper {
    name: "FunctionResponse",
    rules: &[
        FieldRule {
            canonical: "id",
            mldev: Target::Wire("id"),
            vertex: Target::Unsupported,
            transform: None,
        },
        rule("name", "name"),
        rule("response", "response"),
    ],
};

static EXECUTABLE_CODE: EntityMapper = EntityMapper {
    name: "ExecutableCode",
    rules: &[rule("code", "code"), rule("language", "language")],
};

static CODE_EXECUTION_RESULT: EntityMapper = EntityMapper {
    name: "CodeExecutionResult",
    rules: &[rule("outcome", "outcome"), rule("output", "output")],
};

static VIDEO_METADATA: EntityMapper = EntityMapper {
    name: "VideoMetadata",
    rules: &[
        rule("start_offset", "startOffset"),
        rule("end_offset", "endOffset"),
    ],
};

pub(crate) static PART: EntityMapper = EntityMapper {
    name: "Part",
    rules: &[
        rule("text", "text"),
        FieldRule {
            canonical: "inline_data",
            mldev: Target::Wire("inlineData"),
            vertex: Target::Wire("inlineData"),
            transform: Some(Transform::Entity(&BLOB)),
        },
        FieldRule {
            canonical: "file_data",
            mldev: Target::Wire("fileData"),
            vertex: Target::Wire("fileData"),
            transform: Some(Transform::Entity(&FILE_DATA)),
        },
        FieldRule {
            canonical: "function_call",
            mldev: Target::Wire("functionCall"),
            vertex: Target::Wire("functionCall"),
            transform: Some(Transform::Entity(&FUNCTION_CALL)),
        },
        FieldRule {
            canonical: "function_response",
            mldev: Target::Wire("functionResponse"),
            vertex: Target::Wire("functionResponse"),
            transform: Some(Transform::Entity(&FUNCTION_RESPONSE)),
        },
        FieldRule {
            canonical: "executable_code",
            mldev: Target::Wire("executableCode"),
            vertex: Target::Wire("executableCode"),
            transform: Some(Transform::Entity(&EXECUTABLE_CODE)),
        },
        FieldRule {
            canonical: "code_execution_result",
            mldev: Target::Wire("codeExecutionResult"),
            vertex: Target::Wire("codeExecutionResult"),
            transform: Some(Transform::Entity(&CODE_EXECUTION_RESULT)),
        },
        FieldRule {
            canonical: "video_metadata",
            mldev: Target::Unsupported,
            vertex: Target::Wire("videoMetadata"),
            transform: Some(Transform::Entity(&VIDEO_METADATA)),
        },
        rule("thought", "thought"),
    ],
};

pub(crate) static CONTENT: EntityMapper = EntityMapper {
    name: "Content",
    rules: &[
        rule("role", "role"),
        FieldRule {
            canonical: "parts",
            mldev: Target::Wire("parts"),
            vertex: Target::Wire("parts"),
            transform: Some(Transform::Entity(&PART)),
        },
    ],
};

static SAFETY_SETTING: EntityMapper = EntityMapper {
    name: "SafetySetting",
    rules: &[
        enum_rule("category", "category"),
        enum_rule("threshold", "threshold"),
        FieldRule {
            canonical: "method",
            mldev: Target::Unsupported,
            vertex: Target::Wire("method"),
            transform: Some(Transform::ToOnly(enum_to_wire)),
        },
    ],
};

static FUNCTION_DECLARATION: EntityMapper = EntityMapper {
    name: "FunctionDeclaration",
    rules: &[
        rule("name", "name"),
        rule("description", "description"),
        FieldRule {
            canonical: "parameters",
            mldev: Target::Wire("parameters"),
            vertex: Target::Wire("parameters"),
            transform: Some(Transform::ToOnly(schema_to_wire)),
        },
        FieldRule {
            canonical: "response",
            mldev: Target::Unsupported,
            vertex: Target::Wire("response"),
            transform: Some(Transform::ToOnly(schema_to_wire)),
        },
    ],
};

pub(crate) static TOOL: EntityMapper = EntityMapper {
    name: "Tool",
    rules: &[
        FieldRule {
            canonical: "function_declarations",
            mldev: Target::Wire("functionDeclarations"),
            vertex: Target::Wire("functionDeclarations"),
            transform: Some(Transform::Entity(&FUNCTION_DECLARATION)),
        },
        rule("code_execution", "codeExecution"),
        rule("google_search", "googleSearch"),
        rule("retrieval", "retrieval"),
    ],
};

static FUNCTION_CALLING_CONFIG: EntityMapper = EntityMapper {
    name: "FunctionCallingConfig",
    rules: &[
        enum_rule("mode", "mode"),
        rule("allowed_function_names", "allowedFunctionNames"),
    ],
};

pub(crate) static TOOL_CONFIG: EntityMapper = EntityMapper {
    name: "ToolConfig",
    rules: &[FieldRule {
        canonical: "function_calling_config",
        mldev: Target::Wire("functionCallingConfig"),
        vertex: Target::Wire("functionCallingConfig"),
        transform: Some(Transform::Entity(&FUNCTION_CALLING_CONFIG)),
    }],
};

static PREBUILT_VOICE_CONFIG: EntityMapper = EntityMapper {
    name: "PrebuiltVoiceConfig",
    rules: &[rule("voice_name", "voiceName")],
};

static VOICE_CONFIG: EntityMapper = EntityMapper {
    name: "VoiceConfig",
    rules: &[FieldRule {
        canonical: "prebuilt_voice_config",
        mldev: Target::Wire("prebuiltVoiceConfig"),
        vertex: Target::Wire("prebuiltVoiceConfig"),
        transform: Some(Transform::Entity(&PREBUILT_VOICE_CONFIG)),
    }],
};

pub(crate) static SPEECH_CONFIG: EntityMapper = EntityMapper {
    name: "SpeechConfig",
    rules: &[
        FieldRule {
            canonical: "voice_config",
            mldev: Target::Wire("voiceConfig"),
            vertex: Target::Wire("voiceConfig"),
            transform: Some(Transform::Entity(&VOICE_CONFIG)),
        },
        FieldRule {
            canonical: "language_code",
            mldev: Target::Unsupported,
            vertex: Target::Wire("languageCode"),
            transform: None,
        },
    ],
};

static THINKING_CONFIG: EntityMapper = EntityMapper {
    name: "ThinkingConfig",
    rules: &[
        rule("include_thoughts", "includeThoughts"),
        rule("thinking_budget", "thinkingBudget"),
    ],
};

/// Generation parameters map into the entity's own object (which becomes
/// `generationConfig`); everything else scatters onto the request root.
static GENERATE_CONTENT_CONFIG: EntityMapper = EntityMapper {
    name: "GenerateContentConfig",
    rules: &[
        rule("temperature", "temperature"),
        rule("top_p", "topP"),
        rule("top_k", "topK"),
        rule("candidate_count", "candidateCount"),
        rule("max_output_tokens", "maxOutputTokens"),
        rule("stop_sequences", "stopSequences"),
        rule("response_logprobs", "responseLogprobs"),
        rule("logprobs", "logprobs"),
        rule("presence_penalty", "presencePenalty"),
        rule("frequency_penalty", "frequencyPenalty"),
        rule("seed", "seed"),
        rule("response_mime_type", "responseMimeType"),
        FieldRule {
            canonical: "response_schema",
            mldev: Target::Wire("responseSchema"),
            vertex: Target::Wire("responseSchema"),
            transform: Some(Transform::ToOnly(schema_to_wire)),
        },
        enum_rule("response_modalities", "responseModalities"),
        enum_rule("media_resolution", "mediaResolution"),
        FieldRule {
            canonical: "speech_config",
            mldev: Target::Wire("speechConfig"),
            vertex: Target::Wire("speechConfig"),
            transform: Some(Transform::Entity(&SPEECH_CONFIG)),
        },
        FieldRule {
            canonical: "audio_timestamp",
            mldev: Target::Unsupported,
            vertex: Target::Wire("audioTimestamp"),
            transform: None,
        },
        FieldRule {
            canonical: "thinking_config",
            mldev: Target::Wire("thinkingConfig"),
            vertex: Target::Wire("thinkingConfig"),
            transform: Some(Transform::Entity(&THINKING_CONFIG)),
        },
        FieldRule {
            canonical: "routing_config",
            mldev: Target::Unsupported,
            vertex: Target::Wire("routingConfig"),
            transform: None,
        },
        FieldRule {
            canonical: "system_instruction",
            mldev: Target::Parent("systemInstruction"),
            vertex: Target::Parent("systemInstruction"),
            transform: Some(Transform::ToOnly(system_instruction_to_wire)),
        },
        FieldRule {
            canonical: "tools",
            mldev: Target::Parent("tools"),
            vertex: Target::Parent("tools"),
            transform: Some(Transform::ToOnly(tools_to_wire)),
        },
        FieldRule {
            canonical: "tool_config",
            mldev: Target::Parent("toolConfig"),
            vertex: Target::Parent("toolConfig"),
            transform: Some(Transform::Entity(&TOOL_CONFIG)),
        },
        FieldRule {
            canonical: "safety_settings",
            mldev: Target::Parent("safetySettings"),
            vertex: Target::Parent("safetySettings"),
            transform: Some(Transform::Entity(&SAFETY_SETTING)),
        },
        // Request labels are a Vertex resource-management feature.
        FieldRule {
            canonical: "labels",
            mldev: Target::Unsupported,
            vertex: Target::Parent("labels"),
            transform: None,
        },
        FieldRule {
            canonical: "cached_content",
            mldev: Target::Parent("cachedContent"),
            vertex: Target::Parent("cachedContent"),
            transform: None,
        },
        // Client-side controls, never wire fields.
        FieldRule {
            canonical: "automatic_function_calling",
            mldev: Target::Skip,
            vertex: Target::Skip,
            transform: None,
        },
        FieldRule {
            canonical: "http_options",
            mldev: Target::Skip,
            vertex: Target::Skip,
            transform: None,
        },
    ],
};

static SAFETY_RATING: EntityMapper = EntityMapper {
    name: "SafetyRating",
    rules: &[
        rule("category", "category"),
        rule("probability", "probability"),
        rule("severity", "severity"),
        rule("blocked", "blocked"),
    ],
};

static CITATION: EntityMapper = EntityMapper {
    name: "Citation",
    rules: &[
        rule("start_index", "startIndex"),
        rule("end_index", "endIndex"),
        rule("uri", "uri"),
        rule("title", "title"),
        rule("license", "license"),
    ],
};

/// The citation list has two wire names: `citationSources` on the
/// Developer API, `citations` on Vertex.
static CITATION_METADATA: EntityMapper = EntityMapper {
    name: "CitationMetadata",
    rules: &[FieldRule {
        canonical: "citations",
        mldev: Target::Wire("citationSources"),
        vertex: Target::Wire("citations"),
        transform: Some(Transform::Entity(&CITATION)),
    }],
};

static CANDIDATE: EntityMapper = EntityMapper {
    name: "Candidate",
    rules: &[
        FieldRule {
            canonical: "content",
            mldev: Target::Wire("content"),
            vertex: Target::Wire("content"),
            transform: Some(Transform::Entity(&CONTENT)),
        },
        rule("finish_reason", "finishReason"),
        FieldRule {
            canonical: "safety_ratings",
            mldev: Target::Wire("safetyRatings"),
            vertex: Target::Wire("safetyRatings"),
            transform: Some(Transform::Entity(&SAFETY_RATING)),
        },
        FieldRule {
            canonical: "citation_metadata",
            mldev: Target::Wire("citationMetadata"),
            vertex: Target::Wire("citationMetadata"),
            transform: Some(Transform::Entity(&CITATION_METADATA)),
        },
        rule("token_count", "tokenCount"),
        rule("index", "index"),
        rule("avg_logprobs", "avgLogprobs"),
    ],
};

static PROMPT_FEEDBACK: EntityMapper = EntityMapper {
    name: "PromptFeedback",
    rules: &[
        rule("block_reason", "blockReason"),
        rule("block_reason_message", "blockReasonMessage"),
        FieldRule {
            canonical: "safety_ratings",
            mldev: Target::Wire("safetyRatings"),
            vertex: Target::Wire("safetyRatings"),
            transform: Some(Transform::Entity(&SAFETY_RATING)),
        },
    ],
};

static USAGE_METADATA: EntityMapper = EntityMapper {
    name: "UsageMetadata",
    rules: &[
        rule("prompt_token_count", "promptTokenCount"),
        rule("candidates_token_count", "candidatesTokenCount"),
        rule("total_token_count", "totalTokenCount"),
        rule("cached_content_token_count", "cachedContentTokenCount"),
        rule("thoughts_token_count", "thoughtsTokenCount"),
    ],
};

static GENERATE_CONTENT_RESPONSE: EntityMapper = EntityMapper {
    name: "GenerateContentResponse",
    rules: &[
        FieldRule {
            canonical: "candidates",
            mldev: Target::Wire("candidates"),
            vertex: Target::Wire("candidates"),
            transform: Some(Transform::Entity(&CANDIDATE)),
        },
        FieldRule {
            canonical: "prompt_feedback",
            mldev: Target::Wire("promptFeedback"),
            vertex: Target::Wire("promptFeedback"),
            transform: Some(Transform::Entity(&PROMPT_FEEDBACK)),
        },
        FieldRule {
            canonical: "usage_metadata",
            mldev: Target::Wire("usageMetadata"),
            vertex: Target::Wire("usageMetadata"),
            transform: Some(Transform::Entity(&USAGE_METADATA)),
        },
        rule("model_version", "modelVersion"),
        rule("response_id", "responseId"),
    ],
};

/// Canonical schema to wire form: backend capability check, then a
/// recursive key rename (snake aliases to the camelCase wire names).
pub(crate) fn schema_to_wire(ctx: &Context, value: &Value) -> Result<Value> {
    let schema: Schema = serde_json::from_value(value.clone())?;
    let checked = t_schema(ctx.backend, &schema)?;
    Ok(rename_schema_keys(&serde_json::to_value(checked)?))
}

fn rename_schema_keys(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return value.clone();
    };
    let mut out = Map::new();
    for (key, sub) in obj {
        let renamed = match key.as_str() {
            "any_of" => "anyOf",
            "property_ordering" => "propertyOrdering",
            other => other,
        };
        let converted = match renamed {
            "items" => rename_schema_keys(sub),
            "anyOf" => match sub {
                Value::Array(branches) => {
                    Value::Array(branches.iter().map(rename_schema_keys).collect())
                }
                other => other.clone(),
            },
            "properties" => match sub.as_object() {
                Some(props) => Value::Object(
                    props
                        .iter()
                        .map(|(name, prop)| (name.clone(), rename_schema_keys(prop)))
                        .collect(),
                ),
                None => sub.clone(),
            },
            _ => sub.clone(),
        };
        out.insert(renamed.to_string(), converted);
    }
    Value::Object(out)
}

pub(crate) fn system_instruction_to_wire(ctx: &Context, value: &Value) -> Result<Value> {
    let union: ContentUnion = serde_json::from_value(value.clone())?;
    let content = t_content(union)?;
    to_backend(ctx, &CONTENT, &serde_json::to_value(content)?, None)
}

/// Tool entries become declaration-only wire tools. A callable contributes
/// its single declaration; its handler stays client-side.
pub(crate) fn tools_to_wire(ctx: &Context, value: &Value) -> Result<Value> {
    let tools: Vec<ToolUnion> = serde_json::from_value(value.clone())?;
    let mut out = Vec::with_capacity(tools.len());
    for tool in &tools {
        let wire_tool = match tool {
            ToolUnion::Tool(tool) => serde_json::to_value(tool)?,
            ToolUnion::Callable(callable) => serde_json::json!({
                "function_declarations": [callable.declaration]
            }),
        };
        out.push(to_backend(ctx, &TOOL, &wire_tool, None)?);
    }
    Ok(Value::Array(out))
}

/// Build the full generateContent request body. The `_url` subtree carries
/// path parameters and is stripped before the body goes on the wire.
pub(crate) fn generate_content_request(
    ctx: &Context,
    model: &str,
    contents: &[Content],
    config: Option<&GenerateContentConfig>,
) -> Result<Value> {
    let mut body = Value::Object(Map::new());
    set_value_by_path(
        &mut body,
        &["_url", "model"],
        Value::String(t_model(ctx.backend, model)),
    );

    let mut wire_contents = Vec::with_capacity(contents.len());
    for content in contents {
        wire_contents.push(to_backend(
            ctx,
            &CONTENT,
            &serde_json::to_value(content)?,
            None,
        )?);
    }
    set_value_by_path(&mut body, &["contents"], Value::Array(wire_contents));

    if let Some(config) = config {
        let config_value = serde_json::to_value(config)?;
        let generation_config =
            to_backend(ctx, &GENERATE_CONTENT_CONFIG, &config_value, Some(&mut body))?;
        if generation_config
            .as_object()
            .is_some_and(|obj| !obj.is_empty())
        {
            set_value_by_path(&mut body, &["generationConfig"], generation_config);
        }
    }
    Ok(body)
}

/// Parse a raw backend response into the canonical response type.
pub(crate) fn generate_content_response(
    ctx: &Context,
    raw: &Value,
) -> Result<GenerateContentResponse> {
    let canonical = from_backend(ctx, &GENERATE_CONTENT_RESPONSE, raw);
    serde_json::from_value(canonical).map_err(|e| Error::Parse(e.to_string()))
}
