//! Wire conversion for token counting
//!
//! The Developer API's countTokens endpoint takes contents only; the
//! Vertex variant additionally accepts the generation knobs that influence
//! token accounting.

use serde_json::{Map, Value};

use crate::common::set_value_by_path;
use crate::error::{Error, Result};
use crate::transformers::t_model;
use crate::types::config::CountTokensConfig;
use crate::types::content::Content;
use crate::types::response::CountTokensResponse;

use super::engine::{
    from_backend, rule, to_backend, Context, EntityMapper, FieldRule, Target, Transform,
};
use super::generate::{system_instruction_to_wire, CONTENT, TOOL};

static COUNT_TOKENS_CONFIG: EntityMapper = EntityMapper {
    name: "CountTokensConfig",
    rules: &[
        FieldRule {
            canonical: "system_instruction",
            mldev: Target::Unsupported,
            vertex: Target::Parent("systemInstruction"),
            transform: Some(Transform::ToOnly(system_instruction_to_wire)),
        },
        FieldRule {
            canonical: "tools",
            mldev: Target::Unsupported,
            vertex: Target::Parent("tools"),
            transform: Some(Transform::Entity(&TOOL)),
        },
        FieldRule {
            canonical: "generation_config",
            mldev: Target::Unsupported,
            vertex: Target::Parent("generationConfig"),
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

static COUNT_TOKENS_RESPONSE: EntityMapper = EntityMapper {
    name: "CountTokensResponse",
    rules: &[
        rule("total_tokens", "totalTokens"),
        rule("cached_content_token_count", "cachedContentTokenCount"),
    ],
};

pub(crate) fn count_tokens_request(
    ctx: &Context,
    model: &str,
    contents: &[Content],
    config: Option<&CountTokensConfig>,
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
        to_backend(ctx, &COUNT_TOKENS_CONFIG, &config_value, Some(&mut body))?;
    }
    Ok(body)
}

pub(crate) fn count_tokens_response(ctx: &Context, raw: &Value) -> Result<CountTokensResponse> {
    let canonical = from_backend(ctx, &COUNT_TOKENS_RESPONSE, raw);
    serde_json::from_value(canonical).map_err(|e| Error::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::Backend;
    use crate::transformers::t_contents;
    use serde_json::json;

    const MLDEV: Context = Context {
        backend: Backend::MlDev,
        has_api_key: true,
    };
    const VERTEX: Context = Context {
        backend: Backend::Vertex,
        has_api_key: false,
    };

    #[test]
    fn request_carries_contents_and_model() {
        let contents = t_contents("count me".into()).unwrap();
        let body = count_tokens_request(&MLDEV, "gemini-2.0-flash", &contents, None).unwrap();
        assert_eq!(
            body,
            json!({
                "_url": {"model": "models/gemini-2.0-flash"},
                "contents": [{"role": "user", "parts": [{"text": "count me"}]}]
            })
        );
    }

    #[test]
    fn system_instruction_is_vertex_only() {
        let contents = t_contents("x".into()).unwrap();
        let config = CountTokensConfig {
            system_instruction: Some("be brief".into()),
            ..Default::default()
        };
        let err = count_tokens_request(&MLDEV, "m", &contents, Some(&config)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "system_instruction parameter is not supported in Gemini API."
        );

        let body = count_tokens_request(&VERTEX, "m", &contents, Some(&config)).unwrap();
        assert_eq!(
            body["systemInstruction"],
            json!({"role": "user", "parts": [{"text": "be brief"}]})
        );
    }

    #[test]
    fn response_parses_token_counts() {
        let raw = json!({"totalTokens": 10, "cachedContentTokenCount": 4});
        let response = count_tokens_response(&MLDEV, &raw).unwrap();
        assert_eq!(response.total_tokens, Some(10));
        assert_eq!(response.cached_content_token_count, Some(4));
    }
}
