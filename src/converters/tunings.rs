//! Wire conversion for model tuning
//!
//! The two backends expose tuning through different resources: the
//! Developer API tunes `tunedModels` from inline examples, Vertex creates
//! `tuningJobs` from Cloud Storage datasets. Hyperparameters nest under
//! `tuningTask.hyperparameters` and `supervisedTuningSpec.hyperParameters`
//! respectively, so every config field scatters onto the request root
//! through a parent tree.

use serde_json::{Map, Value};

use crate::common::set_value_by_path;
use crate::error::{Error, Result};
use crate::transformers::t_tuning_job_state;
use crate::types::config::{CreateTuningJobConfig, TuningDataset};
use crate::types::response::TuningJob;

use super::engine::{
    enum_to_wire, from_backend, rule, to_backend, Backend, Context, EntityMapper, FieldRule,
    Target, Transform,
};

static TUNING_EXAMPLE: EntityMapper = EntityMapper {
    name: "TuningExample",
    rules: &[
        FieldRule {
            canonical: "text_input",
            mldev: Target::Wire("textInput"),
            vertex: Target::Unsupported,
            transform: None,
        },
        FieldRule {
            canonical: "output",
            mldev: Target::Wire("output"),
            vertex: Target::Unsupported,
            transform: None,
        },
    ],
};

static TUNING_DATASET: EntityMapper = EntityMapper {
    name: "TuningDataset",
    rules: &[
        FieldRule {
            canonical: "gcs_uri",
            mldev: Target::Unsupported,
            vertex: Target::Parent("supervisedTuningSpec.trainingDatasetUri"),
            transform: None,
        },
        FieldRule {
            canonical: "examples",
            mldev: Target::Wire("examples.examples"),
            vertex: Target::Unsupported,
            transform: Some(Transform::Entity(&TUNING_EXAMPLE)),
        },
    ],
};

static TUNING_VALIDATION_DATASET: EntityMapper = EntityMapper {
    name: "TuningValidationDataset",
    rules: &[FieldRule {
        canonical: "gcs_uri",
        mldev: Target::Unsupported,
        vertex: Target::Wire("validationDatasetUri"),
        transform: None,
    }],
};

static CREATE_TUNING_JOB_CONFIG: EntityMapper = EntityMapper {
    name: "CreateTuningJobConfig",
    rules: &[
        FieldRule {
            canonical: "validation_dataset",
            mldev: Target::Unsupported,
            vertex: Target::Parent("supervisedTuningSpec"),
            transform: Some(Transform::Entity(&TUNING_VALIDATION_DATASET)),
        },
        FieldRule {
            canonical: "tuned_model_display_name",
            mldev: Target::Parent("displayName"),
            vertex: Target::Parent("tunedModelDisplayName"),
            transform: None,
        },
        FieldRule {
            canonical: "description",
            mldev: Target::Unsupported,
            vertex: Target::Parent("description"),
            transform: None,
        },
        FieldRule {
            canonical: "epoch_count",
            mldev: Target::Parent("tuningTask.hyperparameters.epochCount"),
            vertex: Target::Parent("supervisedTuningSpec.hyperParameters.epochCount"),
            transform: None,
        },
        FieldRule {
            canonical: "learning_rate_multiplier",
            mldev: Target::Parent("tuningTask.hyperparameters.learningRateMultiplier"),
            vertex: Target::Parent(
                "supervisedTuningSpec.hyperParameters.learningRateMultiplier",
            ),
            transform: None,
        },
        FieldRule {
            canonical: "adapter_size",
            mldev: Target::Unsupported,
            vertex: Target::Parent("supervisedTuningSpec.hyperParameters.adapterSize"),
            transform: Some(Transform::ToOnly(enum_to_wire)),
        },
        FieldRule {
            canonical: "batch_size",
            mldev: Target::Parent("tuningTask.hyperparameters.batchSize"),
            vertex: Target::Unsupported,
            transform: None,
        },
        FieldRule {
            canonical: "learning_rate",
            mldev: Target::Parent("tuningTask.hyperparameters.learningRate"),
            vertex: Target::Unsupported,
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

static TUNED_MODEL: EntityMapper = EntityMapper {
    name: "TunedModel",
    rules: &[rule("model", "model"), rule("endpoint", "endpoint")],
};

/// The Developer API reports tuning-task timestamps nested under
/// `tuningTask`; Vertex reports them at the job root.
static TUNING_JOB: EntityMapper = EntityMapper {
    name: "TuningJob",
    rules: &[
        rule("name", "name"),
        rule("state", "state"),
        rule("create_time", "createTime"),
        FieldRule {
            canonical: "start_time",
            mldev: Target::Wire("tuningTask.startTime"),
            vertex: Target::Wire("startTime"),
            transform: None,
        },
        FieldRule {
            canonical: "end_time",
            mldev: Target::Wire("tuningTask.completeTime"),
            vertex: Target::Wire("endTime"),
            transform: None,
        },
        rule("update_time", "updateTime"),
        FieldRule {
            canonical: "error",
            mldev: Target::Skip,
            vertex: Target::Wire("error"),
            transform: None,
        },
        rule("description", "description"),
        rule("base_model", "baseModel"),
        FieldRule {
            canonical: "tuned_model",
            mldev: Target::Skip,
            vertex: Target::Wire("tunedModel"),
            transform: Some(Transform::Entity(&TUNED_MODEL)),
        },
        rule("tuned_model_display_name", "tunedModelDisplayName"),
    ],
};

/// Build the request body that starts a tuning job.
pub(crate) fn create_tuning_job_request(
    ctx: &Context,
    base_model: &str,
    training_dataset: &TuningDataset,
    config: Option<&CreateTuningJobConfig>,
) -> Result<Value> {
    let mut body = Value::Object(Map::new());
    set_value_by_path(
        &mut body,
        &["baseModel"],
        Value::String(base_model.to_string()),
    );

    let dataset = to_backend(
        ctx,
        &TUNING_DATASET,
        &serde_json::to_value(training_dataset)?,
        Some(&mut body),
    )?;
    // On Vertex the dataset URI already landed on the request root.
    if ctx.backend == Backend::MlDev {
        set_value_by_path(&mut body, &["tuningTask", "trainingData"], dataset);
    }

    if let Some(config) = config {
        // Every config field has a parent target; the entity's own wire
        // object stays empty.
        to_backend(
            ctx,
            &CREATE_TUNING_JOB_CONFIG,
            &serde_json::to_value(config)?,
            Some(&mut body),
        )?;
    }
    Ok(body)
}

/// Parse a raw backend tuning job into the canonical type.
pub(crate) fn tuning_job_from_response(ctx: &Context, raw: &Value) -> Result<TuningJob> {
    let mut canonical = from_backend(ctx, &TUNING_JOB, raw);
    if let Some(state) = canonical.get("state").and_then(Value::as_str) {
        let mapped = t_tuning_job_state(state).to_string();
        set_value_by_path(&mut canonical, &["state"], Value::String(mapped));
    }
    // The Developer API has no separate tuned-model resource; the job name
    // doubles as model and endpoint.
    if ctx.backend == Backend::MlDev {
        if let Some(name) = raw.get("name").and_then(Value::as_str) {
            set_value_by_path(
                &mut canonical,
                &["tuned_model"],
                serde_json::json!({"model": name, "endpoint": name}),
            );
        }
    }
    serde_json::from_value(canonical).map_err(|e| Error::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::config::{TuningExample, TuningValidationDataset};
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
    fn mldev_request_nests_examples_under_tuning_task() {
        let dataset = TuningDataset {
            examples: Some(vec![TuningExample {
                text_input: Some("q".to_string()),
                output: Some("a".to_string()),
            }]),
            ..Default::default()
        };
        let config = CreateTuningJobConfig {
            tuned_model_display_name: Some("my model".to_string()),
            epoch_count: Some(3),
            batch_size: Some(4),
            ..Default::default()
        };
        let body =
            create_tuning_job_request(&MLDEV, "gemini-1.0-pro", &dataset, Some(&config))
                .unwrap();
        assert_eq!(
            body,
            json!({
                "baseModel": "gemini-1.0-pro",
                "displayName": "my model",
                "tuningTask": {
                    "trainingData": {
                        "examples": {"examples": [{"textInput": "q", "output": "a"}]}
                    },
                    "hyperparameters": {"epochCount": 3, "batchSize": 4}
                }
            })
        );
    }

    #[test]
    fn vertex_request_scatters_into_supervised_tuning_spec() {
        let dataset = TuningDataset {
            gcs_uri: Some("gs://bucket/train.jsonl".to_string()),
            ..Default::default()
        };
        let config = CreateTuningJobConfig {
            tuned_model_display_name: Some("my model".to_string()),
            epoch_count: Some(3),
            adapter_size: Some("adapter_size_four".to_string()),
            validation_dataset: Some(TuningValidationDataset {
                gcs_uri: Some("gs://bucket/val.jsonl".to_string()),
            }),
            ..Default::default()
        };
        let body =
            create_tuning_job_request(&VERTEX, "gemini-1.0-pro", &dataset, Some(&config))
                .unwrap();
        assert_eq!(
            body,
            json!({
                "baseModel": "gemini-1.0-pro",
                "tunedModelDisplayName": "my model",
                "supervisedTuningSpec": {
                    "trainingDatasetUri": "gs://bucket/train.jsonl",
                    "validationDatasetUri": "gs://bucket/val.jsonl",
                    "hyperParameters": {
                        "epochCount": 3,
                        "adapterSize": "ADAPTER_SIZE_FOUR"
                    }
                }
            })
        );
    }

    #[test]
    fn datasets_are_backend_exclusive() {
        let gcs = TuningDataset {
            gcs_uri: Some("gs://bucket/train.jsonl".to_string()),
            ..Default::default()
        };
        let err = create_tuning_job_request(&MLDEV, "m", &gcs, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "gcs_uri parameter is not supported in Gemini API."
        );

        let inline = TuningDataset {
            examples: Some(vec![TuningExample::default()]),
            ..Default::default()
        };
        let err = create_tuning_job_request(&VERTEX, "m", &inline, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "examples parameter is not supported in Vertex AI API."
        );
    }

    #[test]
    fn batch_size_is_mldev_only() {
        let dataset = TuningDataset {
            gcs_uri: Some("gs://b/t".to_string()),
            ..Default::default()
        };
        let config = CreateTuningJobConfig {
            batch_size: Some(4),
            ..Default::default()
        };
        let err =
            create_tuning_job_request(&VERTEX, "m", &dataset, Some(&config)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "batch_size parameter is not supported in Vertex AI API."
        );
    }

    #[test]
    fn mldev_job_normalizes_state_and_synthesizes_tuned_model() {
        let raw = json!({
            "name": "tunedModels/my-model-abc",
            "state": "CREATING",
            "createTime": "2025-01-01T00:00:00Z",
            "tuningTask": {"startTime": "2025-01-01T00:00:05Z"},
            "baseModel": "models/gemini-1.0-pro",
            "tunedModelDisplayName": "my model"
        });
        let job = tuning_job_from_response(&MLDEV, &raw).unwrap();
        assert_eq!(job.state.as_deref(), Some("JOB_STATE_RUNNING"));
        let tuned = job.tuned_model.unwrap();
        assert_eq!(tuned.model.as_deref(), Some("tunedModels/my-model-abc"));
        assert_eq!(tuned.endpoint.as_deref(), Some("tunedModels/my-model-abc"));
        assert!(job.start_time.is_some());
    }

    #[test]
    fn vertex_job_reads_flat_timestamps_and_tuned_model() {
        let raw = json!({
            "name": "projects/p/locations/l/tuningJobs/1",
            "state": "JOB_STATE_SUCCEEDED",
            "startTime": "2025-01-01T00:00:00Z",
            "endTime": "2025-01-01T01:00:00Z",
            "tunedModel": {"model": "projects/p/models/m", "endpoint": "projects/p/endpoints/e"}
        });
        let job = tuning_job_from_response(&VERTEX, &raw).unwrap();
        assert_eq!(job.state.as_deref(), Some("JOB_STATE_SUCCEEDED"));
        assert_eq!(
            job.tuned_model.unwrap().endpoint.as_deref(),
            Some("projects/p/endpoints/e")
        );
        assert!(job.end_time.is_some());
    }
}
