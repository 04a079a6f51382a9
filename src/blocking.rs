//! Blocking surface
//!
//! A thin wrapper that drives the async client on a private runtime.
//! Async-registered tools cannot run here: the runtime is blocked on the
//! very call that would need to poll them, so they are rejected up front
//! rather than deadlocking.

use std::sync::Arc;

use futures::StreamExt;
use tokio::runtime::Runtime;

use crate::afc;
use crate::error::{Error, Result};
use crate::transformers::ContentUnion;
use crate::types::config::{CountTokensConfig, EmbedContentConfig, GenerateContentConfig};
use crate::types::response::{
    CountTokensResponse, EmbedContentResponse, GenerateContentResponse,
};

/// Blocking counterpart of [`crate::Client`].
#[derive(Clone)]
pub struct Client {
    inner: crate::client::Client,
    runtime: Arc<Runtime>,
}

impl Client {
    /// Wrap an async client. The runtime lives as long as the wrapper.
    pub fn new(inner: crate::client::Client) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Client {
            inner,
            runtime: Arc::new(runtime),
        })
    }

    pub fn models(&self) -> Models {
        Models {
            inner: self.inner.models(),
            runtime: self.runtime.clone(),
        }
    }

    pub fn files(&self) -> Files {
        Files {
            inner: self.inner.files(),
            runtime: self.runtime.clone(),
        }
    }

    pub fn tunings(&self) -> Tunings {
        Tunings {
            inner: self.inner.tunings(),
            runtime: self.runtime.clone(),
        }
    }
}

/// Blocking model operations.
#[derive(Clone)]
pub struct Models {
    inner: crate::models::Models,
    runtime: Arc<Runtime>,
}

impl Models {
    pub fn generate_content(
        &self,
        model: &str,
        contents: impl Into<ContentUnion>,
        config: Option<GenerateContentConfig>,
    ) -> Result<GenerateContentResponse> {
        reject_async_tools(config.as_ref())?;
        self.runtime
            .block_on(self.inner.generate_content(model, contents, config))
    }

    /// Streamed generation as a blocking iterator over chunks.
    pub fn generate_content_stream(
        &self,
        model: &str,
        contents: impl Into<ContentUnion>,
        config: Option<GenerateContentConfig>,
    ) -> Result<ResponseIterator> {
        reject_async_tools(config.as_ref())?;
        let stream = self
            .runtime
            .block_on(self.inner.generate_content_stream(model, contents, config))?;
        Ok(ResponseIterator {
            stream,
            runtime: self.runtime.clone(),
        })
    }

    pub fn count_tokens(
        &self,
        model: &str,
        contents: impl Into<ContentUnion>,
        config: Option<CountTokensConfig>,
    ) -> Result<CountTokensResponse> {
        self.runtime
            .block_on(self.inner.count_tokens(model, contents, config))
    }

    pub fn embed_content(
        &self,
        model: &str,
        contents: impl Into<ContentUnion>,
        config: Option<EmbedContentConfig>,
    ) -> Result<EmbedContentResponse> {
        self.runtime
            .block_on(self.inner.embed_content(model, contents, config))
    }
}

/// Blocking file-store operations.
#[derive(Clone)]
pub struct Files {
    inner: crate::files::Files,
    runtime: Arc<Runtime>,
}

impl Files {
    pub fn upload_bytes(
        &self,
        data: &[u8],
        config: crate::types::config::UploadFileConfig,
    ) -> Result<crate::types::content::File> {
        self.runtime.block_on(self.inner.upload_bytes(data, config))
    }
}

/// Blocking tuning operations.
#[derive(Clone)]
pub struct Tunings {
    inner: crate::tunings::Tunings,
    runtime: Arc<Runtime>,
}

impl Tunings {
    pub fn tune(
        &self,
        base_model: &str,
        training_dataset: &crate::types::config::TuningDataset,
        config: Option<crate::types::config::CreateTuningJobConfig>,
    ) -> Result<crate::types::response::TuningJob> {
        self.runtime
            .block_on(self.inner.tune(base_model, training_dataset, config))
    }

    pub fn get(&self, name: &str) -> Result<crate::types::response::TuningJob> {
        self.runtime.block_on(self.inner.get(name))
    }
}

fn reject_async_tools(config: Option<&GenerateContentConfig>) -> Result<()> {
    match afc::has_async_handlers(config) {
        Some(name) => Err(Error::UnsupportedFunction(name)),
        None => Ok(()),
    }
}

/// Iterator over streamed response chunks, pumping the private runtime on
/// each step.
pub struct ResponseIterator {
    stream: crate::models::ResponseStream,
    runtime: Arc<Runtime>,
}

impl Iterator for ResponseIterator {
    type Item = Result<GenerateContentResponse>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.stream.next())
    }
}
