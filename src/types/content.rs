//! Canonical content model
//!
//! Backend-agnostic representation of conversation turns. Conversion to and
//! from the two wire formats happens in `converters`; these types only hold
//! data. Field names are snake_case in the canonical JSON form; the wire
//! trees use the backends' camelCase names.

use serde::{Deserialize, Serialize};

/// One conversation turn: a role plus an ordered sequence of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Content {
    /// Producer of the content: `user` or `model`. Optional on
    /// construction; normalization defaults it to `user`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Ordered parts making up this turn.
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// A `user`-role turn.
    pub fn user(parts: Vec<Part>) -> Self {
        Content {
            role: Some("user".to_string()),
            parts,
        }
    }

    /// A `model`-role turn.
    pub fn model(parts: Vec<Part>) -> Self {
        Content {
            role: Some("model".to_string()),
            parts,
        }
    }
}

/// A single piece of a turn.
///
/// Exactly one payload field should be set; constructing a part with zero or
/// multiple payloads is a caller error, rejected where parts enter the
/// client (see the content normalizer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Inline binary data (base64 on the wire).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
    /// Reference to an uploaded or cloud-hosted file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_data: Option<FileData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable_code: Option<ExecutableCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_execution_result: Option<CodeExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_metadata: Option<VideoMetadata>,
    /// Marks model thought summaries; carried alongside `text`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl Part {
    pub fn from_text(text: impl Into<String>) -> Self {
        Part {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn from_bytes(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Part {
            inline_data: Some(Blob {
                data,
                mime_type: mime_type.into(),
            }),
            ..Default::default()
        }
    }

    pub fn from_uri(file_uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Part {
            file_data: Some(FileData {
                file_uri: Some(file_uri.into()),
                mime_type: Some(mime_type.into()),
            }),
            ..Default::default()
        }
    }

    pub fn from_function_call(name: impl Into<String>, args: serde_json::Value) -> Self {
        Part {
            function_call: Some(FunctionCall {
                id: None,
                name: Some(name.into()),
                args: Some(args),
            }),
            ..Default::default()
        }
    }

    pub fn from_function_response(name: impl Into<String>, response: serde_json::Value) -> Self {
        Part {
            function_response: Some(FunctionResponse {
                id: None,
                name: Some(name.into()),
                response: Some(response),
            }),
            ..Default::default()
        }
    }

    pub fn from_executable_code(code: impl Into<String>, language: impl Into<String>) -> Self {
        Part {
            executable_code: Some(ExecutableCode {
                code: Some(code.into()),
                language: Some(language.into()),
            }),
            ..Default::default()
        }
    }

    pub fn from_code_execution_result(outcome: impl Into<String>, output: impl Into<String>) -> Self {
        Part {
            code_execution_result: Some(CodeExecutionResult {
                outcome: Some(outcome.into()),
                output: Some(output.into()),
            }),
            ..Default::default()
        }
    }

    /// Whether this part carries a function call or function response.
    /// Function parts are never merged with neighboring text parts by the
    /// content normalizer.
    pub(crate) fn is_function_part(&self) -> bool {
        self.function_call.is_some() || self.function_response.is_some()
    }

    pub(crate) fn payload_count(&self) -> usize {
        [
            self.text.is_some(),
            self.inline_data.is_some(),
            self.file_data.is_some(),
            self.function_call.is_some(),
            self.function_response.is_some(),
            self.executable_code.is_some(),
            self.code_execution_result.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

/// Raw bytes plus their MIME type. Bytes are base64 in any JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Blob {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// URI-based file reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FileData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// A function call emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FunctionCall {
    /// Correlation id; only the ML Dev backend round-trips it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
}

/// The result of a function call, sent back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FunctionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

/// Code generated by the model for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExecutableCode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Outcome of executing model-generated code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CodeExecutionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Clipping window for video inputs. Offsets are duration strings
/// (e.g. `"3.5s"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VideoMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_offset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_offset: Option<String>,
}

/// A file managed by the files service; usable as conversation input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct File {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<chrono::DateTime<chrono::Utc>>,
    /// Lifecycle state, e.g. `PROCESSING` or `ACTIVE`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}
