//! Automatic function calling
//!
//! When a config registers host callables, generation becomes a loop:
//! call the model, execute any requested functions, append the synthetic
//! model and user turns, call again. A host function's failure becomes a
//! model-visible `{"error": ...}` payload, never an SDK error; only
//! resolution failures (unknown name, an async tool on the blocking
//! surface) abort the loop.

use std::collections::HashMap;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde_json::json;
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::Models;
use crate::types::config::{GenerateContentConfig, ToolHandler};
use crate::types::content::{Content, FunctionCall, Part};
use crate::types::response::GenerateContentResponse;

const DEFAULT_MAX_REMOTE_CALLS: i32 = 10;

/// Name-to-handler map over the config's callable tools. Later
/// registrations shadow earlier ones of the same name.
pub(crate) fn function_map(
    config: Option<&GenerateContentConfig>,
) -> HashMap<String, ToolHandler> {
    let mut map = HashMap::new();
    let Some(config) = config else {
        return map;
    };
    for tool in &config.tools {
        if let Some(callable) = tool.as_callable() {
            if let Some(handler) = &callable.handler {
                map.insert(callable.declaration.name.clone(), handler.clone());
            }
        }
    }
    map
}

/// Whether any registered tool is async; the blocking surface cannot
/// drive those.
pub(crate) fn has_async_handlers(config: Option<&GenerateContentConfig>) -> Option<String> {
    function_map(config)
        .into_iter()
        .find(|(_, handler)| matches!(handler, ToolHandler::Async(_)))
        .map(|(name, _)| name)
}

fn max_remote_calls(config: Option<&GenerateContentConfig>) -> i32 {
    config
        .and_then(|c| c.automatic_function_calling.as_ref())
        .and_then(|afc| afc.maximum_remote_calls)
        .unwrap_or(DEFAULT_MAX_REMOTE_CALLS)
}

/// AFC runs when at least one callable is registered, it is not disabled,
/// and the remote-call budget is positive. A zero or negative budget still
/// performs one plain model call.
fn afc_enabled(
    config: Option<&GenerateContentConfig>,
    map: &HashMap<String, ToolHandler>,
) -> bool {
    if map.is_empty() {
        return false;
    }
    let disabled = config
        .and_then(|c| c.automatic_function_calling.as_ref())
        .and_then(|afc| afc.disable)
        .unwrap_or(false);
    !disabled && max_remote_calls(config) > 0
}

fn keep_history(config: Option<&GenerateContentConfig>) -> bool {
    config
        .and_then(|c| c.automatic_function_calling.as_ref())
        .and_then(|afc| afc.ignore_call_history)
        == Some(false)
}

/// Execute the model's function calls, in call order.
///
/// An unregistered name is a resolution error and aborts. A handler that
/// returns an error produces an error payload the model sees on the next
/// turn.
pub(crate) async fn execute_calls(
    calls: &[FunctionCall],
    map: &HashMap<String, ToolHandler>,
) -> Result<Vec<Part>> {
    let mut parts = Vec::with_capacity(calls.len());
    for call in calls {
        let name = call.name.clone().unwrap_or_default();
        let handler = map
            .get(&name)
            .ok_or_else(|| Error::UnknownFunction(name.clone()))?;
        let args = call.args.clone().unwrap_or_else(|| json!({}));
        let outcome = match handler {
            ToolHandler::Sync(f) => f(args),
            ToolHandler::Async(f) => f(args).await,
        };
        let payload = match outcome {
            Ok(value) => json!({"result": value}),
            Err(e) => json!({"error": e.to_string()}),
        };
        let mut part = Part::from_function_response(name, payload);
        // Call ids round-trip so the backend can correlate responses.
        if let Some(response) = part.function_response.as_mut() {
            response.id = call.id.clone();
        }
        parts.push(part);
    }
    Ok(parts)
}

pub(crate) async fn generate_with_afc(
    models: &Models,
    model: &str,
    mut contents: Vec<Content>,
    config: Option<&GenerateContentConfig>,
) -> Result<GenerateContentResponse> {
    let map = function_map(config);
    if !afc_enabled(config, &map) {
        return models.generate_content_once(model, &contents, config).await;
    }
    let mut remaining = max_remote_calls(config);

    let mut response = loop {
        let response = models.generate_content_once(model, &contents, config).await?;
        remaining -= 1;
        if remaining == 0 {
            warn!("reached max remote calls for automatic function calling");
            break response;
        }
        let calls: Vec<FunctionCall> =
            response.function_calls().into_iter().cloned().collect();
        if calls.is_empty() {
            break response;
        }
        let response_parts = execute_calls(&calls, &map).await?;
        let model_turn = response
            .candidates
            .first()
            .and_then(|c| c.content.clone())
            .unwrap_or_else(|| Content::model(Vec::new()));
        contents.push(model_turn);
        contents.push(Content::user(response_parts));
    };

    if keep_history(config) {
        response.automatic_function_calling_history = Some(contents);
    }
    Ok(response)
}

/// Streaming variant of the loop. All chunks of every model turn are
/// forwarded; function calls are gathered across chunks, since one call
/// may arrive split over several.
pub(crate) fn generate_stream_with_afc(
    models: Models,
    model: String,
    contents: Vec<Content>,
    config: Option<GenerateContentConfig>,
) -> impl Stream<Item = Result<GenerateContentResponse>> + Send {
    try_stream! {
        let map = function_map(config.as_ref());
        let enabled = afc_enabled(config.as_ref(), &map);
        let mut remaining = max_remote_calls(config.as_ref());
        let mut contents = contents;

        loop {
            let mut calls: Vec<FunctionCall> = Vec::new();
            let mut model_parts: Vec<Part> = Vec::new();
            {
                let stream = models
                    .generate_stream_once(&model, &contents, config.as_ref())
                    .await?;
                futures::pin_mut!(stream);
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    if enabled {
                        if let Some(content) =
                            chunk.candidates.first().and_then(|c| c.content.as_ref())
                        {
                            for part in &content.parts {
                                if part.function_call.is_some() {
                                    calls.extend(part.function_call.clone());
                                    model_parts.push(part.clone());
                                }
                            }
                        }
                    }
                    yield chunk;
                }
            }
            if !enabled || calls.is_empty() {
                break;
            }
            remaining -= 1;
            if remaining <= 0 {
                warn!("reached max remote calls for automatic function calling");
                break;
            }
            let response_parts = execute_calls(&calls, &map).await?;
            contents.push(Content::model(model_parts));
            contents.push(Content::user(response_parts));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::http::transport::{ByteStream, HttpRequest, HttpResponse, Transport};
    use crate::types::config::{
        AutomaticFunctionCallingConfig, CallableTool, GenerateContentConfig,
    };
    use crate::types::schema::FunctionDeclaration;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    struct ScriptedTransport {
        requests: Mutex<Vec<serde_json::Value>>,
        responses: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<serde_json::Value>) -> Arc<Self> {
            Arc::new(ScriptedTransport {
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(
                    responses.into_iter().rev().map(|r| r.to_string()).collect(),
                ),
            })
        }

        fn request_bodies(&self) -> Vec<serde_json::Value> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn request(&self, request: HttpRequest) -> crate::error::Result<HttpResponse> {
            let body = request
                .body
                .as_deref()
                .map(|b| serde_json::from_slice(b).unwrap())
                .unwrap_or(serde_json::Value::Null);
            self.requests.lock().unwrap().push(body);
            let body = self.responses.lock().unwrap().pop().expect("no scripted response");
            Ok(HttpResponse {
                status: 200,
                headers: BTreeMap::new(),
                body,
            })
        }

        async fn request_stream(
            &self,
            _request: HttpRequest,
        ) -> crate::error::Result<ByteStream> {
            unimplemented!("streaming is not scripted in these tests")
        }
    }

    fn client_with(transport: Arc<ScriptedTransport>) -> Client {
        Client::builder()
            .api_key("test-key")
            .transport(transport)
            .build()
            .unwrap()
    }

    fn function_call_response(name: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"functionCall": {"name": name, "args": {"city": "Paris"}}}]
                }
            }]
        })
    }

    fn text_response(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]}
            }]
        })
    }

    fn weather_tool() -> CallableTool {
        CallableTool::new(
            FunctionDeclaration::builder("get_weather").build().unwrap(),
            |args| {
                let city = args["city"].as_str().unwrap_or("nowhere").to_string();
                Ok(json!(format!("sunny in {city}")))
            },
        )
    }

    #[tokio::test]
    async fn executes_function_and_feeds_result_back() {
        let transport = ScriptedTransport::new(vec![
            function_call_response("get_weather"),
            text_response("It is sunny in Paris."),
        ]);
        let client = client_with(transport.clone());
        let config = GenerateContentConfig::default().with_tool(weather_tool());

        let response = client
            .models()
            .generate_content("gemini-2.0-flash", "weather in Paris?", Some(config))
            .await
            .unwrap();
        assert_eq!(response.text(), Some("It is sunny in Paris.".to_string()));
        // Not requested, so no history on the response.
        assert!(response.automatic_function_calling_history.is_none());

        let bodies = transport.request_bodies();
        assert_eq!(bodies.len(), 2);
        let second = &bodies[1]["contents"];
        assert_eq!(second[1]["parts"][0]["functionCall"]["name"], json!("get_weather"));
        assert_eq!(
            second[2]["parts"][0]["functionResponse"]["response"],
            json!({"result": "sunny in Paris"})
        );
        assert_eq!(second[2]["role"], json!("user"));
    }

    #[tokio::test]
    async fn history_is_attached_only_when_requested() {
        let transport = ScriptedTransport::new(vec![
            function_call_response("get_weather"),
            text_response("done"),
        ]);
        let client = client_with(transport);
        let config = GenerateContentConfig::default()
            .with_tool(weather_tool())
            .with_automatic_function_calling(AutomaticFunctionCallingConfig {
                ignore_call_history: Some(false),
                ..Default::default()
            });

        let response = client
            .models()
            .generate_content("m", "q", Some(config))
            .await
            .unwrap();
        let history = response.automatic_function_calling_history.unwrap();
        // Input turn, model call turn, function response turn.
        assert_eq!(history.len(), 3);
        assert!(history[1].parts[0].function_call.is_some());
        assert!(history[2].parts[0].function_response.is_some());
    }

    #[tokio::test]
    async fn failing_function_becomes_error_payload() {
        let transport = ScriptedTransport::new(vec![
            function_call_response("get_weather"),
            text_response("sorry"),
        ]);
        let client = client_with(transport.clone());
        let tool = CallableTool::new(
            FunctionDeclaration::builder("get_weather").build().unwrap(),
            |_| Err("sensor offline".into()),
        );
        let config = GenerateContentConfig::default().with_tool(tool);

        let response = client
            .models()
            .generate_content("m", "q", Some(config))
            .await
            .unwrap();
        assert_eq!(response.text(), Some("sorry".to_string()));
        let bodies = transport.request_bodies();
        assert_eq!(
            bodies[1]["contents"][2]["parts"][0]["functionResponse"]["response"],
            json!({"error": "sensor offline"})
        );
    }

    #[tokio::test]
    async fn unknown_function_name_is_a_resolution_error() {
        let transport =
            ScriptedTransport::new(vec![function_call_response("not_registered")]);
        let client = client_with(transport);
        let config = GenerateContentConfig::default().with_tool(weather_tool());

        let err = client
            .models()
            .generate_content("m", "q", Some(config))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownFunction(name) if name == "not_registered"));
    }

    #[tokio::test]
    async fn zero_budget_disables_execution_but_still_calls_once() {
        let transport =
            ScriptedTransport::new(vec![function_call_response("get_weather")]);
        let client = client_with(transport.clone());
        let config = GenerateContentConfig::default()
            .with_tool(weather_tool())
            .with_automatic_function_calling(AutomaticFunctionCallingConfig {
                maximum_remote_calls: Some(0),
                ..Default::default()
            });

        let response = client
            .models()
            .generate_content("m", "q", Some(config))
            .await
            .unwrap();
        // The function call comes back unexecuted.
        assert_eq!(response.function_calls().len(), 1);
        assert_eq!(transport.request_bodies().len(), 1);
    }

    #[tokio::test]
    async fn budget_exhaustion_returns_last_response() {
        // The model asks for the function on every turn; budget of two
        // means two model calls and one execution round.
        let transport = ScriptedTransport::new(vec![
            function_call_response("get_weather"),
            function_call_response("get_weather"),
        ]);
        let client = client_with(transport.clone());
        let config = GenerateContentConfig::default()
            .with_tool(weather_tool())
            .with_automatic_function_calling(AutomaticFunctionCallingConfig {
                maximum_remote_calls: Some(2),
                ..Default::default()
            });

        let response = client
            .models()
            .generate_content("m", "q", Some(config))
            .await
            .unwrap();
        assert_eq!(response.function_calls().len(), 1);
        assert_eq!(transport.request_bodies().len(), 2);
    }

    #[tokio::test]
    async fn declaration_only_tools_do_not_loop() {
        let transport =
            ScriptedTransport::new(vec![function_call_response("get_weather")]);
        let client = client_with(transport.clone());
        let config = GenerateContentConfig::default().with_tool(
            crate::types::config::Tool::with_function_declarations(vec![
                FunctionDeclaration::builder("get_weather").build().unwrap(),
            ]),
        );

        let response = client
            .models()
            .generate_content("m", "q", Some(config))
            .await
            .unwrap();
        assert_eq!(response.function_calls().len(), 1);
        assert_eq!(transport.request_bodies().len(), 1);
    }

    #[test]
    fn async_handlers_are_detected() {
        let config = GenerateContentConfig::default().with_tool(CallableTool::new_async(
            FunctionDeclaration::builder("slow").build().unwrap(),
            |_| async { Ok(json!(1)) },
        ));
        assert_eq!(has_async_handlers(Some(&config)).as_deref(), Some("slow"));
        assert!(has_async_handlers(None).is_none());
    }
}
