//! Input normalization
//!
//! Callers hand in contents in many shapes: a bare string, a part, a full
//! content, a file reference, or arbitrarily nested lists of those. The
//! accepted shapes are a closed union ([`ContentUnion`]) with one explicit
//! conversion path, not runtime type sniffing. Normalization happens once
//! per call, before any wire conversion.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::converters::Backend;
use crate::error::{Error, Result};
use crate::types::content::{Blob, Content, File, Part};
use crate::types::schema::Schema;

/// Any value accepted where contents are expected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContentUnion {
    Text(String),
    Blob(Blob),
    Part(Part),
    Content(Content),
    File(File),
    Items(Vec<ContentUnion>),
}

impl From<&str> for ContentUnion {
    fn from(text: &str) -> Self {
        ContentUnion::Text(text.to_string())
    }
}

impl From<String> for ContentUnion {
    fn from(text: String) -> Self {
        ContentUnion::Text(text)
    }
}

impl From<Blob> for ContentUnion {
    fn from(blob: Blob) -> Self {
        ContentUnion::Blob(blob)
    }
}

impl From<Part> for ContentUnion {
    fn from(part: Part) -> Self {
        ContentUnion::Part(part)
    }
}

impl From<Content> for ContentUnion {
    fn from(content: Content) -> Self {
        ContentUnion::Content(content)
    }
}

impl From<File> for ContentUnion {
    fn from(file: File) -> Self {
        ContentUnion::File(file)
    }
}

impl<T: Into<ContentUnion>> From<Vec<T>> for ContentUnion {
    fn from(items: Vec<T>) -> Self {
        ContentUnion::Items(items.into_iter().map(Into::into).collect())
    }
}

/// Mappings disambiguate by shape: an explicit role or a `parts` list
/// means Content; a part payload key means Part; `data` means Blob; a
/// file-ish key means File. Strings and sequences map directly.
impl<'de> Deserialize<'de> for ContentUnion {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        use serde::de::Error as _;
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(text) => Ok(ContentUnion::Text(text)),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(
                        serde_json::from_value(item).map_err(D::Error::custom)?,
                    );
                }
                Ok(ContentUnion::Items(out))
            }
            Value::Object(ref obj) => {
                const PART_KEYS: &[&str] = &[
                    "text",
                    "inline_data",
                    "file_data",
                    "function_call",
                    "function_response",
                    "executable_code",
                    "code_execution_result",
                    "video_metadata",
                    "thought",
                ];
                if obj.contains_key("parts") || obj.contains_key("role") {
                    serde_json::from_value(value)
                        .map(ContentUnion::Content)
                        .map_err(D::Error::custom)
                } else if PART_KEYS.iter().any(|k| obj.contains_key(*k)) {
                    serde_json::from_value(value)
                        .map(ContentUnion::Part)
                        .map_err(D::Error::custom)
                } else if obj.contains_key("data") {
                    serde_json::from_value(value)
                        .map(ContentUnion::Blob)
                        .map_err(D::Error::custom)
                } else if obj.contains_key("uri") || obj.contains_key("name") {
                    serde_json::from_value(value)
                        .map(ContentUnion::File)
                        .map_err(D::Error::custom)
                } else {
                    Err(D::Error::custom("mapping is not content-shaped"))
                }
            }
            other => Err(D::Error::custom(format!(
                "cannot interpret {other} as content"
            ))),
        }
    }
}

/// Normalize arbitrary content input into the content list sent to the
/// model.
///
/// Consecutive loose items (strings, blobs, parts, files) accumulate into
/// one synthetic `user` content. An explicit [`Content`] flushes the
/// accumulator and is emitted as-is. A nested list flushes and becomes
/// exactly one merged content. Function call/response parts never share a
/// synthetic content with text parts, though consecutive function parts do
/// merge. Input order is always preserved.
pub(crate) fn t_contents(contents: ContentUnion) -> Result<Vec<Content>> {
    let items = match contents {
        ContentUnion::Items(items) => items,
        single => vec![single],
    };
    if items.is_empty() {
        return Err(Error::InvalidArgument("contents are required".to_string()));
    }

    let mut out: Vec<Content> = Vec::new();
    // Pending loose parts plus whether they are function parts; a kind
    // switch flushes.
    let mut acc: Vec<Part> = Vec::new();
    let mut acc_is_function = false;

    fn flush(out: &mut Vec<Content>, acc: &mut Vec<Part>) {
        if !acc.is_empty() {
            out.push(Content::user(std::mem::take(acc)));
        }
    }

    for item in items {
        match item {
            ContentUnion::Content(content) => {
                flush(&mut out, &mut acc);
                out.push(content);
            }
            ContentUnion::Items(inner) => {
                flush(&mut out, &mut acc);
                out.push(merge_inner_list(inner)?);
            }
            loose => {
                let part = loose_part(loose)?;
                let is_function = part.is_function_part();
                if !acc.is_empty() && is_function != acc_is_function {
                    flush(&mut out, &mut acc);
                }
                acc_is_function = is_function;
                acc.push(part);
            }
        }
    }
    flush(&mut out, &mut acc);

    if out.is_empty() {
        return Err(Error::InvalidArgument("contents are required".to_string()));
    }
    Ok(out)
}

/// A nested list becomes one merged user content. Only loose items are
/// allowed inside; deeper nesting or an explicit content is a caller
/// error.
fn merge_inner_list(inner: Vec<ContentUnion>) -> Result<Content> {
    let mut parts = Vec::with_capacity(inner.len());
    for item in inner {
        match item {
            ContentUnion::Content(_) | ContentUnion::Items(_) => {
                return Err(Error::InvalidArgument(
                    "a nested content list may only contain strings, parts, blobs and files"
                        .to_string(),
                ));
            }
            loose => parts.push(loose_part(loose)?),
        }
    }
    if parts.is_empty() {
        return Err(Error::InvalidArgument("contents are required".to_string()));
    }
    Ok(Content::user(parts))
}

fn loose_part(item: ContentUnion) -> Result<Part> {
    let part = match item {
        ContentUnion::Text(text) => Part::from_text(text),
        ContentUnion::Blob(blob) => Part {
            inline_data: Some(blob),
            ..Default::default()
        },
        ContentUnion::Part(part) => part,
        ContentUnion::File(file) => {
            let uri = file.uri.ok_or_else(|| {
                Error::InvalidArgument("file uri is required as content input".to_string())
            })?;
            let mime_type = file.mime_type.ok_or_else(|| {
                Error::InvalidArgument(
                    "file mime_type is required as content input".to_string(),
                )
            })?;
            Part::from_uri(uri, mime_type)
        }
        ContentUnion::Content(_) | ContentUnion::Items(_) => unreachable!(),
    };
    if part.payload_count() == 0 && part.thought.is_none() {
        return Err(Error::InvalidArgument(
            "part has no payload".to_string(),
        ));
    }
    Ok(part)
}

/// Normalize a single-content input (system instruction and the like).
pub(crate) fn t_content(content: ContentUnion) -> Result<Content> {
    match content {
        ContentUnion::Content(content) => Ok(content),
        other => {
            let mut contents = t_contents(other)?;
            if contents.len() != 1 {
                return Err(Error::InvalidArgument(
                    "expected exactly one content".to_string(),
                ));
            }
            Ok(contents.remove(0))
        }
    }
}

/// Resolve a model name for the wire.
///
/// Recognized resource prefixes pass through unchanged. A bare Vertex id
/// gets the publisher prefix here; the transport layer prepends the
/// project/location segment. A partially qualified `publisher/model` pair
/// expands to a publisher resource path.
pub(crate) fn t_model(backend: Backend, model: &str) -> String {
    match backend {
        Backend::Vertex => {
            if model.starts_with("projects/")
                || model.starts_with("publishers/")
                || model.starts_with("models/")
                || model.starts_with("tunedModels/")
            {
                model.to_string()
            } else if let Some((publisher, rest)) = model.split_once('/') {
                format!("publishers/{publisher}/models/{rest}")
            } else {
                format!("publishers/google/models/{model}")
            }
        }
        Backend::MlDev => {
            if model.starts_with("models/") || model.starts_with("tunedModels/") {
                model.to_string()
            } else {
                format!("models/{model}")
            }
        }
    }
}

/// Map the Developer API's tuned-model lifecycle states onto the job-state
/// names Vertex reports, so callers see one vocabulary. Unrecognized
/// states pass through.
pub(crate) fn t_tuning_job_state(state: &str) -> &str {
    match state {
        "STATE_UNSPECIFIED" => "JOB_STATE_UNSPECIFIED",
        "CREATING" => "JOB_STATE_RUNNING",
        "ACTIVE" => "JOB_STATE_SUCCEEDED",
        "FAILED" => "JOB_STATE_FAILED",
        other => other,
    }
}

/// Enforce backend schema capability. Building a schema never fails for
/// backend reasons; this conversion-time walk does.
pub(crate) fn t_schema(backend: Backend, schema: &Schema) -> Result<Schema> {
    check_schema_support(backend, schema)?;
    Ok(schema.clone())
}

fn check_schema_support(backend: Backend, schema: &Schema) -> Result<()> {
    if backend == Backend::MlDev {
        if schema.any_of.is_some() {
            return Err(Error::unsupported_field("any_of", backend));
        }
        if schema.default.is_some() {
            return Err(Error::unsupported_field("default", backend));
        }
    }
    if let Some(items) = &schema.items {
        check_schema_support(backend, items)?;
    }
    if let Some(branches) = &schema.any_of {
        for branch in branches {
            check_schema_support(backend, branch)?;
        }
    }
    if let Some(properties) = &schema.properties {
        for value in properties.values() {
            let sub: Schema = serde_json::from_value(value.clone())?;
            check_schema_support(backend, &sub)?;
        }
    }
    Ok(())
}
