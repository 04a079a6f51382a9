//! Wire conversion for the file store. Only the Gemini Developer API has
//! one; the surface module rejects Vertex before conversion runs.

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::types::content::File;

use super::engine::{from_backend, rule, to_backend, Context, EntityMapper};

static FILE: EntityMapper = EntityMapper {
    name: "File",
    rules: &[
        rule("name", "name"),
        rule("display_name", "displayName"),
        rule("mime_type", "mimeType"),
        rule("size_bytes", "sizeBytes"),
        rule("create_time", "createTime"),
        rule("state", "state"),
        rule("uri", "uri"),
    ],
};

/// Body of the resumable-upload start request.
pub(crate) fn create_file_request(ctx: &Context, file: &File) -> Result<Value> {
    let canonical = serde_json::to_value(file)?;
    let wire = to_backend(ctx, &FILE, &canonical, None)?;
    Ok(json!({ "file": wire }))
}

/// Parse the finalize response, which nests the file under a `file` key.
pub(crate) fn file_from_response(ctx: &Context, raw: &Value) -> Result<File> {
    let wire = raw
        .get("file")
        .ok_or_else(|| Error::Parse("upload response is missing the file object".to_string()))?;
    let canonical = from_backend(ctx, &FILE, wire);
    Ok(serde_json::from_value(canonical)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::Backend;

    const MLDEV: Context = Context {
        backend: Backend::MlDev,
        has_api_key: true,
    };

    #[test]
    fn create_request_uses_wire_names() {
        let file = File {
            display_name: Some("notes.txt".to_string()),
            mime_type: Some("text/plain".to_string()),
            size_bytes: Some(11),
            ..Default::default()
        };
        let body = create_file_request(&MLDEV, &file).unwrap();
        assert_eq!(
            body,
            json!({"file": {"displayName": "notes.txt", "mimeType": "text/plain", "sizeBytes": 11}})
        );
    }

    #[test]
    fn finalize_response_round_trips_to_canonical() {
        let raw = json!({
            "file": {
                "name": "files/abc",
                "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc",
                "mimeType": "text/plain",
                "state": "ACTIVE",
                "unknownField": true
            }
        });
        let file = file_from_response(&MLDEV, &raw).unwrap();
        assert_eq!(file.name.as_deref(), Some("files/abc"));
        assert_eq!(file.mime_type.as_deref(), Some("text/plain"));
        assert_eq!(file.state.as_deref(), Some("ACTIVE"));
    }

    #[test]
    fn missing_file_object_is_a_parse_error() {
        assert!(file_from_response(&MLDEV, &json!({})).is_err());
    }
}
