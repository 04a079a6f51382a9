//! Model tuning operations
//!
//! Supervised fine-tuning runs as a server-side job: `tune` starts it and
//! returns immediately, `get` polls it by name. The Gemini Developer API
//! tunes from inline examples under `tunedModels`, Vertex from Cloud
//! Storage datasets under `tuningJobs`.

use std::sync::Arc;

use serde_json::Value;

use crate::client::ApiClient;
use crate::converters::{self, Backend};
use crate::error::{Error, Result};
use crate::http::retry::with_retry;
use crate::http::transport::raise_for_response;
use crate::types::config::{CreateTuningJobConfig, TuningDataset};
use crate::types::response::TuningJob;

/// Dispatcher for tuning operations.
#[derive(Clone)]
pub struct Tunings {
    api: Arc<ApiClient>,
}

impl Tunings {
    pub(crate) fn new(api: Arc<ApiClient>) -> Self {
        Tunings { api }
    }

    /// Start a tuning job on `base_model`. The returned job is usually
    /// still running; poll it with [`Tunings::get`].
    pub async fn tune(
        &self,
        base_model: &str,
        training_dataset: &TuningDataset,
        config: Option<CreateTuningJobConfig>,
    ) -> Result<TuningJob> {
        let ctx = self.api.ctx();
        let body = converters::create_tuning_job_request(
            &ctx,
            base_model,
            training_dataset,
            config.as_ref(),
        )?;
        let options = self
            .api
            .http_options(config.as_ref().and_then(|c| c.http_options.as_ref()));
        let collection = match ctx.backend {
            Backend::MlDev => "tunedModels",
            Backend::Vertex => "tuningJobs",
        };
        let raw: Value = {
            let response = with_retry(|| async {
                let request = self.api.build_request(collection, None, &body, &options)?;
                raise_for_response(self.api.transport().request(request).await?)
            })
            .await?;
            serde_json::from_str(&response.body).map_err(|e| Error::Parse(e.to_string()))?
        };
        let mut job = converters::tuning_job_from_response(&ctx, &raw)?;
        if options.response_payload == Some(true) {
            job.sdk_http_response = Some(raw);
        }
        Ok(job)
    }

    /// Fetch a tuning job by its full resource name, e.g.
    /// `tunedModels/my-model-abc` or
    /// `projects/p/locations/l/tuningJobs/123`.
    pub async fn get(&self, name: &str) -> Result<TuningJob> {
        let ctx = self.api.ctx();
        let options = self.api.http_options(None);
        let response = with_retry(|| async {
            let request = self.api.build_get_request(name, &options);
            raise_for_response(self.api.transport().request(request).await?)
        })
        .await?;
        let raw: Value =
            serde_json::from_str(&response.body).map_err(|e| Error::Parse(e.to_string()))?;
        let mut job = converters::tuning_job_from_response(&ctx, &raw)?;
        if options.response_payload == Some(true) {
            job.sdk_http_response = Some(raw);
        }
        Ok(job)
    }
}
