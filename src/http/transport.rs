//! Transport collaborator
//!
//! The conversion core never touches the network directly; it hands fully
//! built [`HttpRequest`]s to a [`Transport`]. Tests substitute the trait,
//! production uses [`ReqwestTransport`].

use std::collections::BTreeMap;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use tracing::debug;

use crate::error::{ApiError, Error, Result};

/// One fully built HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub(crate) fn post_json(
        url: String,
        headers: BTreeMap<String, String>,
        body: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut headers = headers;
        headers
            .entry("content-type".to_string())
            .or_insert_with(|| "application/json".to_string());
        Ok(HttpRequest {
            method: reqwest::Method::POST,
            url,
            headers,
            body: Some(Bytes::from(serde_json::to_vec(body)?)),
            timeout,
        })
    }
}

/// A completed response. Header names are lowercase.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Boundary between the conversion core and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a request, returning the response whatever its status.
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Execute a request, returning the body as a byte stream. Non-2xx
    /// responses surface as [`Error::Api`] before any bytes flow.
    async fn request_stream(&self, request: HttpRequest) -> Result<ByteStream>;
}

/// Fail on non-2xx, normalizing the body into an [`ApiError`].
pub(crate) fn raise_for_response(response: HttpResponse) -> Result<HttpResponse> {
    if (200..300).contains(&response.status) {
        Ok(response)
    } else {
        Err(ApiError::from_response(response.status, &response.body).into())
    }
}

/// Production transport over a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn build(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        debug!(method = %request.method, url = %request.url, "sending request");
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.build(request).send().await?;
        let status = response.status().as_u16();
        let headers = lowercase_headers(response.headers());
        let body = response.text().await?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn request_stream(&self, request: HttpRequest) -> Result<ByteStream> {
        let response = self.build(request).send().await?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status, &body).into());
        }
        use futures::StreamExt;
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::from));
        Ok(Box::pin(stream))
    }
}

fn lowercase_headers(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

const UPLOAD_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Drive a resumable upload session to completion.
///
/// Chunks go out with `X-Goog-Upload-Command: upload` (the last one adds
/// `finalize`) and an explicit byte offset. The server reports session
/// state in `x-goog-upload-status`; anything other than `active` stops the
/// loop, and a session that ends without reaching `final` is an error.
pub(crate) async fn upload_bytes(
    transport: &dyn Transport,
    upload_url: &str,
    data: &[u8],
    headers: &BTreeMap<String, String>,
) -> Result<serde_json::Value> {
    let mut offset = 0usize;
    let mut status = String::new();
    let mut last_body = String::new();

    loop {
        let end = usize::min(offset + UPLOAD_CHUNK_SIZE, data.len());
        let last_chunk = end == data.len();

        let mut chunk_headers = headers.clone();
        chunk_headers.insert(
            "x-goog-upload-command".to_string(),
            if last_chunk {
                "upload, finalize".to_string()
            } else {
                "upload".to_string()
            },
        );
        chunk_headers.insert("x-goog-upload-offset".to_string(), offset.to_string());
        chunk_headers.insert("content-length".to_string(), (end - offset).to_string());

        let response = raise_for_response(
            transport
                .request(HttpRequest {
                    method: reqwest::Method::POST,
                    url: upload_url.to_string(),
                    headers: chunk_headers,
                    body: Some(Bytes::copy_from_slice(&data[offset..end])),
                    timeout: None,
                })
                .await?,
        )?;

        status = response
            .headers
            .get("x-goog-upload-status")
            .cloned()
            .unwrap_or_default();
        last_body = response.body;
        offset = end;

        if status != "active" || last_chunk {
            break;
        }
    }

    if status != "final" {
        return Err(Error::Http(format!(
            "upload ended with status {status:?} before all bytes were sent"
        )));
    }
    if last_body.is_empty() {
        Ok(serde_json::Value::Null)
    } else {
        Ok(serde_json::from_str(&last_body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records requests and plays back scripted responses.
    struct ScriptedTransport {
        requests: Mutex<Vec<HttpRequest>>,
        responses: Mutex<Vec<HttpResponse>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<HttpResponse>) -> Self {
            ScriptedTransport {
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn request(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push(request);
            Ok(self.responses.lock().unwrap().remove(0))
        }

        async fn request_stream(&self, _request: HttpRequest) -> Result<ByteStream> {
            unimplemented!("not used in these tests")
        }
    }

    fn upload_response(status: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: [("x-goog-upload-status".to_string(), status.to_string())].into(),
            body: if status == "final" {
                r#"{"file": {"name": "files/abc"}}"#.to_string()
            } else {
                String::new()
            },
        }
    }

    #[test]
    fn raise_for_response_passes_2xx_and_normalizes_errors() {
        assert!(raise_for_response(HttpResponse {
            status: 200,
            headers: BTreeMap::new(),
            body: "{}".to_string(),
        })
        .is_ok());

        let err = raise_for_response(HttpResponse {
            status: 429,
            headers: BTreeMap::new(),
            body: r#"{"error": {"message": "slow down", "status": "RESOURCE_EXHAUSTED"}}"#
                .to_string(),
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "429 RESOURCE_EXHAUSTED. slow down");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn small_upload_finalizes_in_one_chunk() {
        let transport = ScriptedTransport::new(vec![upload_response("final")]);
        let info = upload_bytes(&transport, "https://upload.test/u", b"hello", &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(info["file"]["name"], serde_json::json!("files/abc"));

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].headers.get("x-goog-upload-command").unwrap(),
            "upload, finalize"
        );
        assert_eq!(requests[0].headers.get("x-goog-upload-offset").unwrap(), "0");
    }

    #[tokio::test]
    async fn upload_stopping_before_final_is_an_error() {
        // Server kills the session on the first chunk.
        let transport = ScriptedTransport::new(vec![upload_response("cancelled")]);
        let err = upload_bytes(&transport, "https://upload.test/u", b"hello", &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }
}
