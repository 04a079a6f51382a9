//! Client construction and request building
//!
//! A client binds one backend, its credentials and its HTTP defaults for
//! its whole lifetime. Missing settings fall back to the standard
//! environment variables; conflicting explicit settings fail fast.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

use crate::converters::{Backend, Context};
use crate::error::{Error, Result};
use crate::http::options::{append_library_version_headers, patch_http_options};
use crate::http::transport::{HttpRequest, ReqwestTransport, Transport};
use crate::files::Files;
use crate::models::Models;
use crate::tunings::Tunings;
use crate::types::config::HttpOptions;

const MLDEV_BASE_URL: &str = "https://generativelanguage.googleapis.com/";
const MLDEV_API_VERSION: &str = "v1beta";
const VERTEX_API_VERSION: &str = "v1beta1";

/// Entry point. Cheap to clone; all state is shared and immutable.
#[derive(Clone)]
pub struct Client {
    api: Arc<ApiClient>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Model operations: generation, counting, embedding.
    pub fn models(&self) -> Models {
        Models::new(self.api.clone())
    }

    /// File store operations (Gemini Developer API only).
    pub fn files(&self) -> Files {
        Files::new(self.api.clone())
    }

    /// Model tuning operations.
    pub fn tunings(&self) -> Tunings {
        Tunings::new(self.api.clone())
    }
}

#[derive(Default)]
pub struct ClientBuilder {
    vertexai: Option<bool>,
    project: Option<String>,
    location: Option<String>,
    api_key: Option<SecretString>,
    http_options: Option<HttpOptions>,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// Target Vertex AI instead of the Gemini Developer API.
    pub fn vertexai(mut self, vertexai: bool) -> Self {
        self.vertexai = Some(vertexai);
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn http_options(mut self, http_options: HttpOptions) -> Self {
        self.http_options = Some(http_options);
        self
    }

    /// Substitute the transport; tests use this to avoid the network.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<Client> {
        let transport = self
            .transport
            .clone()
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        let settings = self.resolve(|name| std::env::var(name).ok())?;
        debug!(
            backend = settings.ctx.backend.api_name(),
            express = settings.ctx.has_api_key,
            "client configured"
        );
        Ok(Client {
            api: Arc::new(ApiClient {
                settings,
                transport,
            }),
        })
    }

    /// Resolve backend, credentials and HTTP defaults against an
    /// environment lookup.
    fn resolve(self, env: impl Fn(&str) -> Option<String>) -> Result<ResolvedSettings> {
        let vertexai = self.vertexai.unwrap_or_else(|| {
            env("GOOGLE_GENAI_USE_VERTEXAI")
                .map(|v| {
                    let v = v.to_ascii_lowercase();
                    v == "true" || v == "1"
                })
                .unwrap_or(false)
        });

        if vertexai {
            if (self.project.is_some() || self.location.is_some()) && self.api_key.is_some() {
                return Err(Error::InvalidArgument(
                    "project/location and api_key are mutually exclusive in the client \
                     initializer"
                        .to_string(),
                ));
            }
            let explicit_api_key = self.api_key.is_some();
            let project = self.project.clone().or_else(|| env("GOOGLE_CLOUD_PROJECT"));
            let location = self
                .location
                .clone()
                .or_else(|| env("GOOGLE_CLOUD_LOCATION"));
            // Project and location from the environment take precedence
            // over an environment API key.
            if let (Some(project), Some(location)) = (project.clone(), location.clone()) {
                if !explicit_api_key {
                    let base_url = if location == "global" {
                        "https://aiplatform.googleapis.com/".to_string()
                    } else {
                        format!("https://{location}-aiplatform.googleapis.com/")
                    };
                    return Ok(ResolvedSettings::regular_vertex(
                        project,
                        location,
                        self.resolved_http_options(base_url, VERTEX_API_VERSION),
                    ));
                }
            }
            let api_key = self
                .api_key
                .clone()
                .or_else(|| env("GOOGLE_API_KEY").map(SecretString::from));
            let Some(api_key) = api_key else {
                return Err(Error::InvalidArgument(
                    "project and location, or an api_key, are required for Vertex AI"
                        .to_string(),
                ));
            };
            let http_options = self.resolved_http_options(
                "https://aiplatform.googleapis.com/".to_string(),
                VERTEX_API_VERSION,
            );
            Ok(ResolvedSettings {
                ctx: Context {
                    backend: Backend::Vertex,
                    has_api_key: true,
                },
                project: None,
                location: None,
                api_key: Some(api_key),
                http_options,
            })
        } else {
            let api_key = self
                .api_key
                .clone()
                .or_else(|| env("GOOGLE_API_KEY").map(SecretString::from));
            let Some(api_key) = api_key else {
                return Err(Error::InvalidArgument(
                    "an api_key is required for the Gemini Developer API".to_string(),
                ));
            };
            let http_options =
                self.resolved_http_options(MLDEV_BASE_URL.to_string(), MLDEV_API_VERSION);
            Ok(ResolvedSettings {
                ctx: Context {
                    backend: Backend::MlDev,
                    has_api_key: true,
                },
                project: None,
                location: None,
                api_key: Some(api_key),
                http_options,
            })
        }
    }

    fn resolved_http_options(&self, base_url: String, api_version: &str) -> HttpOptions {
        let mut options = self.http_options.clone().unwrap_or_default();
        options.base_url.get_or_insert(base_url);
        options.api_version.get_or_insert_with(|| api_version.to_string());
        options
    }
}

#[derive(Debug)]
struct ResolvedSettings {
    ctx: Context,
    project: Option<String>,
    location: Option<String>,
    api_key: Option<SecretString>,
    http_options: HttpOptions,
}

impl ResolvedSettings {
    fn regular_vertex(project: String, location: String, http_options: HttpOptions) -> Self {
        ResolvedSettings {
            ctx: Context {
                backend: Backend::Vertex,
                has_api_key: false,
            },
            project: Some(project),
            location: Some(location),
            api_key: None,
            http_options,
        }
    }
}

/// Shared internals behind all operation dispatchers.
pub(crate) struct ApiClient {
    settings: ResolvedSettings,
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub(crate) fn ctx(&self) -> Context {
        self.settings.ctx
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub(crate) fn http_options(&self, overlay: Option<&HttpOptions>) -> HttpOptions {
        patch_http_options(&self.settings.http_options, overlay)
    }

    /// Build a POST request for an API path like
    /// `models/gemini-2.0-flash:generateContent`.
    pub(crate) fn build_request(
        &self,
        path: &str,
        query: Option<&str>,
        body: &Value,
        options: &HttpOptions,
    ) -> Result<HttpRequest> {
        HttpRequest::post_json(
            self.request_url(path, query, options),
            self.request_headers(options),
            body,
            options.timeout.map(Duration::from_millis),
        )
    }

    /// Build a GET request for a resource path like `tuningJobs/123`.
    pub(crate) fn build_get_request(
        &self,
        path: &str,
        options: &HttpOptions,
    ) -> HttpRequest {
        HttpRequest {
            method: reqwest::Method::GET,
            url: self.request_url(path, None, options),
            headers: self.request_headers(options),
            body: None,
            timeout: options.timeout.map(Duration::from_millis),
        }
    }

    /// Resolve a path into a full URL: project/location prefix for regular
    /// Vertex, then base URL, API version and query string.
    fn request_url(&self, path: &str, query: Option<&str>, options: &HttpOptions) -> String {
        let mut path = path.to_string();
        if self.settings.ctx.backend == Backend::Vertex && !self.settings.ctx.has_api_key {
            let skip = options.skip_project_and_location_in_path.unwrap_or(false);
            if !skip && !path.starts_with("projects/") {
                let project = self.settings.project.as_deref().unwrap_or_default();
                let location = self.settings.location.as_deref().unwrap_or_default();
                path = format!("projects/{project}/locations/{location}/{path}");
            }
        }

        let base_url = options.base_url.as_deref().unwrap_or(MLDEV_BASE_URL);
        let api_version = options.api_version.as_deref().unwrap_or(MLDEV_API_VERSION);
        let mut url = format!(
            "{}/{}/{}",
            base_url.trim_end_matches('/'),
            api_version.trim_matches('/'),
            path
        );
        let mut query_parts: Vec<String> = Vec::new();
        if let Some(query) = query {
            if !query.is_empty() {
                query_parts.push(query.to_string());
            }
        }
        // Vertex express mode authenticates through the query string.
        if self.settings.ctx.backend == Backend::Vertex && self.settings.ctx.has_api_key {
            if let Some(api_key) = &self.settings.api_key {
                query_parts.push(format!("key={}", api_key.expose_secret()));
            }
        }
        if !query_parts.is_empty() {
            url.push('?');
            url.push_str(&query_parts.join("&"));
        }
        url
    }

    /// Build the start request of a resumable upload session. The upload
    /// endpoint sits under an `upload/` segment ahead of the API version.
    pub(crate) fn build_upload_start_request(
        &self,
        path: &str,
        body: &Value,
        extra_headers: &BTreeMap<String, String>,
        options: &HttpOptions,
    ) -> Result<HttpRequest> {
        let base_url = options.base_url.as_deref().unwrap_or(MLDEV_BASE_URL);
        let api_version = options.api_version.as_deref().unwrap_or(MLDEV_API_VERSION);
        let url = format!(
            "{}/upload/{}/{}",
            base_url.trim_end_matches('/'),
            api_version.trim_matches('/'),
            path
        );
        let mut headers = self.request_headers(options);
        headers.extend(extra_headers.clone());
        HttpRequest::post_json(url, headers, body, options.timeout.map(Duration::from_millis))
    }

    /// Default headers plus authentication for every outgoing request.
    pub(crate) fn request_headers(&self, options: &HttpOptions) -> BTreeMap<String, String> {
        let mut headers = options.headers.clone();
        append_library_version_headers(&mut headers);
        if self.settings.ctx.backend == Backend::MlDev {
            if let Some(api_key) = &self.settings.api_key {
                headers.insert(
                    "x-goog-api-key".to_string(),
                    api_key.expose_secret().to_string(),
                );
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn mldev_requires_api_key() {
        let err = ClientBuilder::default().resolve(env_from(&[])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let settings = ClientBuilder::default()
            .api_key("k")
            .resolve(env_from(&[]))
            .unwrap();
        assert_eq!(settings.ctx.backend, Backend::MlDev);
        assert_eq!(
            settings.http_options.base_url.as_deref(),
            Some(MLDEV_BASE_URL)
        );
        assert_eq!(settings.http_options.api_version.as_deref(), Some("v1beta"));
    }

    #[test]
    fn api_key_falls_back_to_environment() {
        let settings = ClientBuilder::default()
            .resolve(env_from(&[("GOOGLE_API_KEY", "env-key")]))
            .unwrap();
        assert_eq!(
            settings.api_key.unwrap().expose_secret(),
            "env-key"
        );
    }

    #[test]
    fn vertexai_flag_comes_from_environment() {
        let settings = ClientBuilder::default()
            .resolve(env_from(&[
                ("GOOGLE_GENAI_USE_VERTEXAI", "true"),
                ("GOOGLE_CLOUD_PROJECT", "p"),
                ("GOOGLE_CLOUD_LOCATION", "us-central1"),
            ]))
            .unwrap();
        assert_eq!(settings.ctx.backend, Backend::Vertex);
        assert!(!settings.ctx.has_api_key);
        assert_eq!(
            settings.http_options.base_url.as_deref(),
            Some("https://us-central1-aiplatform.googleapis.com/")
        );
        assert_eq!(
            settings.http_options.api_version.as_deref(),
            Some("v1beta1")
        );
    }

    #[test]
    fn global_location_uses_locationless_host() {
        let settings = ClientBuilder::default()
            .vertexai(true)
            .project("p")
            .location("global")
            .resolve(env_from(&[]))
            .unwrap();
        assert_eq!(
            settings.http_options.base_url.as_deref(),
            Some("https://aiplatform.googleapis.com/")
        );
    }

    #[test]
    fn explicit_project_and_api_key_conflict() {
        let err = ClientBuilder::default()
            .vertexai(true)
            .project("p")
            .api_key("k")
            .resolve(env_from(&[]))
            .unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn env_project_wins_over_env_api_key() {
        let settings = ClientBuilder::default()
            .vertexai(true)
            .resolve(env_from(&[
                ("GOOGLE_CLOUD_PROJECT", "p"),
                ("GOOGLE_CLOUD_LOCATION", "l"),
                ("GOOGLE_API_KEY", "k"),
            ]))
            .unwrap();
        assert!(!settings.ctx.has_api_key);
        assert_eq!(settings.project.as_deref(), Some("p"));
    }

    #[test]
    fn vertex_express_mode_uses_api_key() {
        let settings = ClientBuilder::default()
            .vertexai(true)
            .api_key("k")
            .resolve(env_from(&[]))
            .unwrap();
        assert_eq!(settings.ctx.backend, Backend::Vertex);
        assert!(settings.ctx.has_api_key);
        assert_eq!(
            settings.http_options.base_url.as_deref(),
            Some("https://aiplatform.googleapis.com/")
        );
    }

    fn api_client(settings: ResolvedSettings) -> ApiClient {
        ApiClient {
            settings,
            transport: Arc::new(ReqwestTransport::new()),
        }
    }

    #[test]
    fn vertex_paths_get_project_and_location_prefix() {
        let settings = ClientBuilder::default()
            .vertexai(true)
            .project("p")
            .location("us-central1")
            .resolve(env_from(&[]))
            .unwrap();
        let client = api_client(settings);
        let options = client.http_options(None);
        let request = client
            .build_request(
                "publishers/google/models/m:generateContent",
                None,
                &serde_json::json!({}),
                &options,
            )
            .unwrap();
        assert_eq!(
            request.url,
            "https://us-central1-aiplatform.googleapis.com/v1beta1/projects/p/locations/\
             us-central1/publishers/google/models/m:generateContent"
        );
    }

    #[test]
    fn prefix_is_skipped_when_requested_or_already_present() {
        let settings = ClientBuilder::default()
            .vertexai(true)
            .project("p")
            .location("l")
            .resolve(env_from(&[]))
            .unwrap();
        let client = api_client(settings);

        let mut options = client.http_options(None);
        options.skip_project_and_location_in_path = Some(true);
        let request = client
            .build_request("publishers/google/models/m:x", None, &serde_json::json!({}), &options)
            .unwrap();
        assert!(request.url.ends_with("/v1beta1/publishers/google/models/m:x"));

        let options = client.http_options(None);
        let request = client
            .build_request(
                "projects/other/locations/l/publishers/google/models/m:x",
                None,
                &serde_json::json!({}),
                &options,
            )
            .unwrap();
        assert!(request
            .url
            .contains("/v1beta1/projects/other/locations/l/"));
    }

    #[test]
    fn express_mode_appends_key_query_parameter() {
        let settings = ClientBuilder::default()
            .vertexai(true)
            .api_key("secret")
            .resolve(env_from(&[]))
            .unwrap();
        let client = api_client(settings);
        let options = client.http_options(None);
        let request = client
            .build_request(
                "publishers/google/models/m:generateContent",
                Some("alt=sse"),
                &serde_json::json!({}),
                &options,
            )
            .unwrap();
        assert_eq!(
            request.url,
            "https://aiplatform.googleapis.com/v1beta1/publishers/google/models/\
             m:generateContent?alt=sse&key=secret"
        );
    }

    #[test]
    fn get_requests_carry_auth_but_no_body() {
        let settings = ClientBuilder::default()
            .api_key("secret")
            .resolve(env_from(&[]))
            .unwrap();
        let client = api_client(settings);
        let options = client.http_options(None);
        let request = client.build_get_request("tunedModels/abc", &options);
        assert_eq!(request.method, reqwest::Method::GET);
        assert_eq!(
            request.url,
            "https://generativelanguage.googleapis.com/v1beta/tunedModels/abc"
        );
        assert_eq!(
            request.headers.get("x-goog-api-key").map(String::as_str),
            Some("secret")
        );
        assert!(request.body.is_none());
    }

    #[test]
    fn mldev_authenticates_with_header() {
        let settings = ClientBuilder::default()
            .api_key("secret")
            .resolve(env_from(&[]))
            .unwrap();
        let client = api_client(settings);
        let options = client.http_options(None);
        let request = client
            .build_request("models/m:generateContent", None, &serde_json::json!({}), &options)
            .unwrap();
        assert_eq!(
            request.url,
            "https://generativelanguage.googleapis.com/v1beta/models/m:generateContent"
        );
        assert_eq!(
            request.headers.get("x-goog-api-key").map(String::as_str),
            Some("secret")
        );
        assert!(request
            .headers
            .get("user-agent")
            .unwrap()
            .contains("google-genai-sdk/"));
        assert_eq!(
            request.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
    }
}
