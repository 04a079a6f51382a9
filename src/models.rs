//! Model operations
//!
//! One dispatcher per call shape: assemble canonical parameters, convert
//! for the active backend, pull path/query parameters out of the wire
//! tree, call the transport, convert the response back. Generation routes
//! through the automatic function-calling loop.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::afc;
use crate::client::ApiClient;
use crate::converters::{self, Backend};
use crate::error::{Error, Result};
use crate::http::retry::with_retry;
use crate::http::sse;
use crate::http::transport::raise_for_response;
use crate::transformers::{t_contents, ContentUnion};
use crate::types::config::{
    CountTokensConfig, EmbedContentConfig, GenerateContentConfig, HttpOptions,
    LiveConnectConfig,
};
use crate::types::content::Content;
use crate::types::response::{
    CountTokensResponse, EmbedContentResponse, GenerateContentResponse,
};

/// Stream of response chunks; owns everything it needs.
pub type ResponseStream =
    std::pin::Pin<Box<dyn Stream<Item = Result<GenerateContentResponse>> + Send>>;

/// Dispatcher for model-level operations.
#[derive(Clone)]
pub struct Models {
    api: Arc<ApiClient>,
}

impl Models {
    pub(crate) fn new(api: Arc<ApiClient>) -> Self {
        Models { api }
    }

    /// Generate content, executing registered tools automatically when the
    /// model requests them.
    pub async fn generate_content(
        &self,
        model: &str,
        contents: impl Into<ContentUnion>,
        config: Option<GenerateContentConfig>,
    ) -> Result<GenerateContentResponse> {
        let contents = t_contents(contents.into())?;
        afc::generate_with_afc(self, model, contents, config.as_ref()).await
    }

    /// Generate content as a stream of chunks. Registered tools are still
    /// executed between model turns; chunks of every turn are forwarded.
    pub async fn generate_content_stream(
        &self,
        model: &str,
        contents: impl Into<ContentUnion>,
        config: Option<GenerateContentConfig>,
    ) -> Result<ResponseStream> {
        let contents = t_contents(contents.into())?;
        Ok(Box::pin(afc::generate_stream_with_afc(
            self.clone(),
            model.to_string(),
            contents,
            config,
        )))
    }

    pub async fn count_tokens(
        &self,
        model: &str,
        contents: impl Into<ContentUnion>,
        config: Option<CountTokensConfig>,
    ) -> Result<CountTokensResponse> {
        let contents = t_contents(contents.into())?;
        let ctx = self.api.ctx();
        let body =
            converters::count_tokens_request(&ctx, model, &contents, config.as_ref())?;
        let (body, url_model, query) = split_request(body)?;
        let options = self
            .api
            .http_options(config.as_ref().and_then(|c| c.http_options.as_ref()));
        let raw = self
            .send(
                &format!("{url_model}:countTokens"),
                query.as_deref(),
                &body,
                &options,
            )
            .await?;
        let mut response = converters::count_tokens_response(&ctx, &raw)?;
        if options.response_payload == Some(true) {
            response.sdk_http_response = Some(raw);
        }
        Ok(response)
    }

    pub async fn embed_content(
        &self,
        model: &str,
        contents: impl Into<ContentUnion>,
        config: Option<EmbedContentConfig>,
    ) -> Result<EmbedContentResponse> {
        let contents = t_contents(contents.into())?;
        let ctx = self.api.ctx();
        let body =
            converters::embed_content_request(&ctx, model, &contents, config.as_ref())?;
        let (body, url_model, query) = split_request(body)?;
        let options = self
            .api
            .http_options(config.as_ref().and_then(|c| c.http_options.as_ref()));
        let verb = match ctx.backend {
            Backend::MlDev => "batchEmbedContents",
            Backend::Vertex => "predict",
        };
        let raw = self
            .send(&format!("{url_model}:{verb}"), query.as_deref(), &body, &options)
            .await?;
        let mut response = converters::embed_content_response(&ctx, &raw)?;
        if options.response_payload == Some(true) {
            response.sdk_http_response = Some(raw);
        }
        Ok(response)
    }

    /// One model call, no function execution.
    pub(crate) async fn generate_content_once(
        &self,
        model: &str,
        contents: &[Content],
        config: Option<&GenerateContentConfig>,
    ) -> Result<GenerateContentResponse> {
        let ctx = self.api.ctx();
        let body = converters::generate_content_request(&ctx, model, contents, config)?;
        let (body, url_model, query) = split_request(body)?;
        let options = self
            .api
            .http_options(config.and_then(|c| c.http_options.as_ref()));
        let raw = self
            .send(
                &format!("{url_model}:generateContent"),
                query.as_deref(),
                &body,
                &options,
            )
            .await?;
        let mut response = converters::generate_content_response(&ctx, &raw)?;
        if options.response_payload == Some(true) {
            response.sdk_http_response = Some(raw);
        }
        Ok(response)
    }

    /// One streamed model call.
    pub(crate) async fn generate_stream_once(
        &self,
        model: &str,
        contents: &[Content],
        config: Option<&GenerateContentConfig>,
    ) -> Result<impl Stream<Item = Result<GenerateContentResponse>> + Send> {
        let ctx = self.api.ctx();
        let body = converters::generate_content_request(&ctx, model, contents, config)?;
        let (body, url_model, query) = split_request(body)?;
        let options = self
            .api
            .http_options(config.and_then(|c| c.http_options.as_ref()));
        let query = match query {
            Some(query) => format!("{query}&alt=sse"),
            None => "alt=sse".to_string(),
        };
        let request = self.api.build_request(
            &format!("{url_model}:streamGenerateContent"),
            Some(&query),
            &body,
            &options,
        )?;
        let bytes = self.api.transport().request_stream(request).await?;
        Ok(sse::json_chunks(bytes)
            .map(move |chunk| chunk.and_then(|c| converters::generate_content_response(&ctx, &c))))
    }

    /// Build the `setup` message that opens a live session over the
    /// bidirectional API. The WebSocket connection itself is not managed
    /// here; callers send this as the first message on their own socket.
    pub fn live_connect_setup(
        &self,
        model: &str,
        config: Option<&LiveConnectConfig>,
    ) -> Result<Value> {
        converters::live_connect_setup(&self.api.ctx(), model, config)
    }

    async fn send(
        &self,
        path: &str,
        query: Option<&str>,
        body: &Value,
        options: &HttpOptions,
    ) -> Result<Value> {
        let response = with_retry(|| async {
            let request = self.api.build_request(path, query, body, options)?;
            let response = self.api.transport().request(request).await?;
            raise_for_response(response)
        })
        .await?;
        serde_json::from_str(&response.body).map_err(|e| Error::Parse(e.to_string()))
    }
}

/// Pull the private `_url`/`_query` subtrees out of a converted request
/// body. Private keys never reach the wire.
fn split_request(mut body: Value) -> Result<(Value, String, Option<String>)> {
    let obj = body
        .as_object_mut()
        .ok_or_else(|| Error::InvalidArgument("request body must be an object".to_string()))?;
    let model = obj
        .remove("_url")
        .as_ref()
        .and_then(|url| url.get("model"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidArgument("request is missing a model".to_string()))?;
    let query = obj.remove("_query").and_then(|q| match q {
        Value::String(s) => Some(s),
        _ => None,
    });
    obj.retain(|key, _| !key.starts_with('_'));
    Ok((body, model, query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_request_strips_private_subtrees() {
        let body = json!({
            "_url": {"model": "models/m"},
            "_query": "alt=sse",
            "contents": [],
            "_internal": true
        });
        let (body, model, query) = split_request(body).unwrap();
        assert_eq!(model, "models/m");
        assert_eq!(query.as_deref(), Some("alt=sse"));
        assert_eq!(body, json!({"contents": []}));
    }

    #[test]
    fn split_request_requires_model() {
        assert!(split_request(json!({"contents": []})).is_err());
    }
}
