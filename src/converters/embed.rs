//! Wire conversion for embedding
//!
//! The two backends diverge structurally here, not just in field names:
//! the Developer API batches full content objects under `requests`, while
//! Vertex takes text instances under `instances` plus a shared
//! `parameters` object. Written as explicit functions instead of rule
//! tables for that reason.

use serde_json::{json, Map, Value};

use crate::common::set_value_by_path;
use crate::error::{Error, Result};
use crate::transformers::t_model;
use crate::types::config::EmbedContentConfig;
use crate::types::content::Content;
use crate::types::response::EmbedContentResponse;

use super::engine::{to_backend, Backend, Context};
use super::generate::CONTENT;

pub(crate) fn embed_content_request(
    ctx: &Context,
    model: &str,
    contents: &[Content],
    config: Option<&EmbedContentConfig>,
) -> Result<Value> {
    match ctx.backend {
        Backend::MlDev => mldev_request(ctx, model, contents, config),
        Backend::Vertex => vertex_request(ctx, model, contents, config),
    }
}

fn mldev_request(
    ctx: &Context,
    model: &str,
    contents: &[Content],
    config: Option<&EmbedContentConfig>,
) -> Result<Value> {
    if let Some(config) = config {
        if config.mime_type.is_some() {
            return Err(Error::unsupported_field("mime_type", ctx.backend));
        }
        if config.auto_truncate.is_some() {
            return Err(Error::unsupported_field("auto_truncate", ctx.backend));
        }
    }
    let resolved = t_model(ctx.backend, model);
    let mut requests = Vec::with_capacity(contents.len());
    for content in contents {
        let mut request = Map::new();
        request.insert("model".to_string(), Value::String(resolved.clone()));
        request.insert(
            "content".to_string(),
            to_backend(ctx, &CONTENT, &serde_json::to_value(content)?, None)?,
        );
        if let Some(config) = config {
            if let Some(task_type) = &config.task_type {
                request.insert("taskType".to_string(), json!(task_type));
            }
            if let Some(title) = &config.title {
                request.insert("title".to_string(), json!(title));
            }
            if let Some(dim) = config.output_dimensionality {
                request.insert("outputDimensionality".to_string(), json!(dim));
            }
        }
        requests.push(Value::Object(request));
    }

    let mut body = Value::Object(Map::new());
    set_value_by_path(&mut body, &["_url", "model"], Value::String(resolved));
    set_value_by_path(&mut body, &["requests"], Value::Array(requests));
    Ok(body)
}

fn vertex_request(
    ctx: &Context,
    model: &str,
    contents: &[Content],
    config: Option<&EmbedContentConfig>,
) -> Result<Value> {
    let mut instances = Vec::with_capacity(contents.len());
    for content in contents {
        let mut instance = Map::new();
        instance.insert(
            "content".to_string(),
            Value::String(content_text(content)),
        );
        if let Some(config) = config {
            if let Some(task_type) = &config.task_type {
                instance.insert("task_type".to_string(), json!(task_type));
            }
            if let Some(title) = &config.title {
                instance.insert("title".to_string(), json!(title));
            }
            if let Some(mime_type) = &config.mime_type {
                instance.insert("mimeType".to_string(), json!(mime_type));
            }
        }
        instances.push(Value::Object(instance));
    }

    let mut body = Value::Object(Map::new());
    set_value_by_path(
        &mut body,
        &["_url", "model"],
        Value::String(t_model(ctx.backend, model)),
    );
    set_value_by_path(&mut body, &["instances"], Value::Array(instances));

    let mut parameters = Map::new();
    if let Some(config) = config {
        if let Some(dim) = config.output_dimensionality {
            parameters.insert("outputDimensionality".to_string(), json!(dim));
        }
        if let Some(auto_truncate) = config.auto_truncate {
            parameters.insert("autoTruncate".to_string(), json!(auto_truncate));
        }
    }
    if !parameters.is_empty() {
        set_value_by_path(&mut body, &["parameters"], Value::Object(parameters));
    }
    Ok(body)
}

/// Vertex embedding instances take plain text.
fn content_text(content: &Content) -> String {
    content
        .parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect()
}

pub(crate) fn embed_content_response(
    ctx: &Context,
    raw: &Value,
) -> Result<EmbedContentResponse> {
    let embeddings = match ctx.backend {
        Backend::MlDev => raw
            .get("embeddings")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| json!({"values": item.get("values").cloned().unwrap_or(json!([]))}))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default(),
        Backend::Vertex => raw
            .get("predictions")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("embeddings"))
                    .map(|e| {
                        json!({
                            "values": e.get("values").cloned().unwrap_or(json!([])),
                            "statistics": e.get("statistics").cloned().unwrap_or(Value::Null)
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default(),
    };
    serde_json::from_value(json!({"embeddings": embeddings}))
        .map_err(|e| Error::Parse(e.to_string()))
}
