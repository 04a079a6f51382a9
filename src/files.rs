//! File store operations
//!
//! Uploads follow the resumable protocol: a start request carrying the
//! file metadata opens a session, the server answers with a session URL,
//! and the bytes stream to that URL in chunks. Only the Gemini Developer
//! API exposes a file store.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::client::ApiClient;
use crate::converters::{self, Backend};
use crate::error::{Error, Result};
use crate::http::transport::{raise_for_response, upload_bytes};
use crate::types::config::UploadFileConfig;
use crate::types::content::File;

/// Dispatcher for file-store operations.
#[derive(Clone)]
pub struct Files {
    api: Arc<ApiClient>,
}

impl Files {
    pub(crate) fn new(api: Arc<ApiClient>) -> Self {
        Files { api }
    }

    /// Upload raw bytes, returning the stored file. `config.mime_type` is
    /// required since bytes carry no type of their own.
    pub async fn upload_bytes(
        &self,
        data: &[u8],
        config: UploadFileConfig,
    ) -> Result<File> {
        let ctx = self.api.ctx();
        if ctx.backend == Backend::Vertex {
            return Err(Error::InvalidArgument(
                "the file store is only supported in the Gemini Developer API".to_string(),
            ));
        }
        let mime_type = config.mime_type.clone().ok_or_else(|| {
            Error::InvalidArgument("a mime_type is required to upload bytes".to_string())
        })?;
        let options = self.api.http_options(config.http_options.as_ref());

        let meta = File {
            name: config.name.clone(),
            display_name: config.display_name.clone(),
            mime_type: Some(mime_type.clone()),
            size_bytes: Some(data.len() as i64),
            ..Default::default()
        };
        let body = converters::create_file_request(&ctx, &meta)?;

        let start_headers: BTreeMap<String, String> = [
            ("x-goog-upload-protocol", "resumable".to_string()),
            ("x-goog-upload-command", "start".to_string()),
            ("x-goog-upload-header-content-length", data.len().to_string()),
            ("x-goog-upload-header-content-type", mime_type),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        let request =
            self.api
                .build_upload_start_request("files", &body, &start_headers, &options)?;
        let response = raise_for_response(self.api.transport().request(request).await?)?;
        let upload_url = response
            .headers
            .get("x-goog-upload-url")
            .cloned()
            .ok_or_else(|| {
                Error::Parse("upload start response is missing x-goog-upload-url".to_string())
            })?;

        let info = upload_bytes(
            self.api.transport(),
            &upload_url,
            data,
            &self.api.request_headers(&options),
        )
        .await?;
        converters::file_from_response(&ctx, &info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::http::transport::{ByteStream, HttpRequest, HttpResponse, Transport};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct UploadTransport {
        requests: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl Transport for UploadTransport {
        async fn request(&self, request: HttpRequest) -> Result<HttpResponse> {
            let first = self.requests.lock().unwrap().is_empty();
            self.requests.lock().unwrap().push(request);
            if first {
                Ok(HttpResponse {
                    status: 200,
                    headers: [(
                        "x-goog-upload-url".to_string(),
                        "https://upload.test/session".to_string(),
                    )]
                    .into(),
                    body: String::new(),
                })
            } else {
                Ok(HttpResponse {
                    status: 200,
                    headers: [("x-goog-upload-status".to_string(), "final".to_string())].into(),
                    body: json!({"file": {"name": "files/abc", "mimeType": "text/plain"}})
                        .to_string(),
                })
            }
        }

        async fn request_stream(&self, _request: HttpRequest) -> Result<ByteStream> {
            unimplemented!("not used in upload tests")
        }
    }

    #[tokio::test]
    async fn upload_opens_session_then_streams_bytes() {
        let transport = Arc::new(UploadTransport {
            requests: Mutex::new(Vec::new()),
        });
        let client = Client::builder()
            .api_key("k")
            .transport(transport.clone())
            .build()
            .unwrap();

        let file = client
            .files()
            .upload_bytes(
                b"hello world",
                UploadFileConfig {
                    display_name: Some("notes.txt".to_string()),
                    mime_type: Some("text/plain".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(file.name.as_deref(), Some("files/abc"));

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let start = &requests[0];
        assert_eq!(
            start.url,
            "https://generativelanguage.googleapis.com/upload/v1beta/files"
        );
        assert_eq!(
            start.headers.get("x-goog-upload-command").map(String::as_str),
            Some("start")
        );
        let body: serde_json::Value =
            serde_json::from_slice(start.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["file"]["displayName"], json!("notes.txt"));
        assert_eq!(body["file"]["sizeBytes"], json!(11));

        let chunk = &requests[1];
        assert_eq!(chunk.url, "https://upload.test/session");
        assert_eq!(
            chunk.headers.get("x-goog-upload-command").map(String::as_str),
            Some("upload, finalize")
        );
    }

    #[tokio::test]
    async fn upload_requires_mime_type() {
        let transport = Arc::new(UploadTransport {
            requests: Mutex::new(Vec::new()),
        });
        let client = Client::builder()
            .api_key("k")
            .transport(transport)
            .build()
            .unwrap();
        let err = client
            .files()
            .upload_bytes(b"x", UploadFileConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("mime_type"));
    }

    #[tokio::test]
    async fn upload_is_rejected_on_vertex() {
        let transport = Arc::new(UploadTransport {
            requests: Mutex::new(Vec::new()),
        });
        let client = Client::builder()
            .vertexai(true)
            .project("p")
            .location("us-central1")
            .transport(transport)
            .build()
            .unwrap();
        let err = client
            .files()
            .upload_bytes(
                b"x",
                UploadFileConfig {
                    mime_type: Some("text/plain".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
