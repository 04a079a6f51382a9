//! Wire conversion for live session setup
//!
//! A live connection opens with a single `setup` message. Generation knobs
//! nest under `setup.generationConfig`, expressed here as dotted wire
//! paths rather than a separate sub-entity.

use serde_json::{Map, Value};

use crate::common::set_value_by_path;
use crate::error::Result;
use crate::transformers::t_model;
use crate::types::config::LiveConnectConfig;

use super::engine::{
    enum_rule, rule, to_backend, Context, EntityMapper, FieldRule, Target, Transform,
};
use super::generate::{system_instruction_to_wire, tools_to_wire, SPEECH_CONFIG};

static SESSION_RESUMPTION: EntityMapper = EntityMapper {
    name: "SessionResumptionConfig",
    rules: &[
        rule("handle", "handle"),
        FieldRule {
            canonical: "transparent",
            mldev: Target::Unsupported,
            vertex: Target::Wire("transparent"),
            transform: None,
        },
    ],
};

static AUTOMATIC_ACTIVITY_DETECTION: EntityMapper = EntityMapper {
    name: "AutomaticActivityDetection",
    rules: &[
        rule("disabled", "disabled"),
        enum_rule("start_of_speech_sensitivity", "startOfSpeechSensitivity"),
        enum_rule("end_of_speech_sensitivity", "endOfSpeechSensitivity"),
        rule("prefix_padding_ms", "prefixPaddingMs"),
        rule("silence_duration_ms", "silenceDurationMs"),
    ],
};

static REALTIME_INPUT_CONFIG: EntityMapper = EntityMapper {
    name: "RealtimeInputConfig",
    rules: &[
        FieldRule {
            canonical: "automatic_activity_detection",
            mldev: Target::Wire("automaticActivityDetection"),
            vertex: Target::Wire("automaticActivityDetection"),
            transform: Some(Transform::Entity(&AUTOMATIC_ACTIVITY_DETECTION)),
        },
        enum_rule("activity_handling", "activityHandling"),
        enum_rule("turn_coverage", "turnCoverage"),
    ],
};

static SLIDING_WINDOW: EntityMapper = EntityMapper {
    name: "SlidingWindow",
    rules: &[rule("target_tokens", "targetTokens")],
};

static CONTEXT_WINDOW_COMPRESSION: EntityMapper = EntityMapper {
    name: "ContextWindowCompressionConfig",
    rules: &[
        rule("trigger_tokens", "triggerTokens"),
        FieldRule {
            canonical: "sliding_window",
            mldev: Target::Wire("slidingWindow"),
            vertex: Target::Wire("slidingWindow"),
            transform: Some(Transform::Entity(&SLIDING_WINDOW)),
        },
    ],
};

static LIVE_CONNECT_CONFIG: EntityMapper = EntityMapper {
    name: "LiveConnectConfig",
    rules: &[
        rule("generation_config", "generationConfig"),
        enum_rule("response_modalities", "generationConfig.responseModalities"),
        rule("temperature", "generationConfig.temperature"),
        rule("top_p", "generationConfig.topP"),
        rule("top_k", "generationConfig.topK"),
        rule("max_output_tokens", "generationConfig.maxOutputTokens"),
        rule("seed", "generationConfig.seed"),
        FieldRule {
            canonical: "speech_config",
            mldev: Target::Wire("generationConfig.speechConfig"),
            vertex: Target::Wire("generationConfig.speechConfig"),
            transform: Some(Transform::Entity(&SPEECH_CONFIG)),
        },
        FieldRule {
            canonical: "system_instruction",
            mldev: Target::Wire("systemInstruction"),
            vertex: Target::Wire("systemInstruction"),
            transform: Some(Transform::ToOnly(system_instruction_to_wire)),
        },
        FieldRule {
            canonical: "tools",
            mldev: Target::Wire("tools"),
            vertex: Target::Wire("tools"),
            transform: Some(Transform::ToOnly(tools_to_wire)),
        },
        FieldRule {
            canonical: "session_resumption",
            mldev: Target::Wire("sessionResumption"),
            vertex: Target::Wire("sessionResumption"),
            transform: Some(Transform::Entity(&SESSION_RESUMPTION)),
        },
        FieldRule {
            canonical: "realtime_input_config",
            mldev: Target::Wire("realtimeInputConfig"),
            vertex: Target::Wire("realtimeInputConfig"),
            transform: Some(Transform::Entity(&REALTIME_INPUT_CONFIG)),
        },
        FieldRule {
            canonical: "context_window_compression",
            mldev: Target::Wire("contextWindowCompression"),
            vertex: Target::Wire("contextWindowCompression"),
            transform: Some(Transform::Entity(&CONTEXT_WINDOW_COMPRESSION)),
        },
        // Input transcription has no Developer API equivalent yet.
        FieldRule {
            canonical: "input_audio_transcription",
            mldev: Target::Unsupported,
            vertex: Target::Wire("inputAudioTranscription"),
            transform: None,
        },
        rule("output_audio_transcription", "outputAudioTranscription"),
    ],
};

/// Build the `setup` message that opens a live session.
pub(crate) fn live_connect_setup(
    ctx: &Context,
    model: &str,
    config: Option<&LiveConnectConfig>,
) -> Result<Value> {
    let mut setup = match config {
        Some(config) => to_backend(
            ctx,
            &LIVE_CONNECT_CONFIG,
            &serde_json::to_value(config)?,
            None,
        )?,
        None => Value::Object(Map::new()),
    };
    set_value_by_path(
        &mut setup,
        &["model"],
        Value::String(t_model(ctx.backend, model)),
    );
    let mut message = Value::Object(Map::new());
    set_value_by_path(&mut message, &["setup"], setup);
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::Backend;
    use crate::types::config::{SessionResumptionConfig, SlidingWindow};
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
    fn generation_knobs_nest_under_setup_generation_config() {
        let config = LiveConnectConfig {
            temperature: Some(0.5),
            top_k: Some(2),
            response_modalities: Some(vec!["AUDIO".to_string()]),
            ..Default::default()
        };
        let message = live_connect_setup(&MLDEV, "gemini-2.0-flash", Some(&config)).unwrap();
        assert_eq!(
            message,
            json!({
                "setup": {
                    "model": "models/gemini-2.0-flash",
                    "generationConfig": {
                        "responseModalities": ["AUDIO"],
                        "temperature": 0.5,
                        "topK": 2
                    }
                }
            })
        );
    }

    #[test]
    fn lowercase_modalities_are_upper_cased() {
        let config = LiveConnectConfig {
            response_modalities: Some(vec!["audio".to_string()]),
            ..Default::default()
        };
        let message = live_connect_setup(&MLDEV, "m", Some(&config)).unwrap();
        assert_eq!(
            message["setup"]["generationConfig"]["responseModalities"],
            json!(["AUDIO"])
        );
    }

    #[test]
    fn no_config_still_sets_model() {
        let message = live_connect_setup(&VERTEX, "gemini-2.0-flash", None).unwrap();
        assert_eq!(
            message,
            json!({"setup": {"model": "publishers/google/models/gemini-2.0-flash"}})
        );
    }

    #[test]
    fn transparent_resumption_is_vertex_only() {
        let config = LiveConnectConfig {
            session_resumption: Some(SessionResumptionConfig {
                handle: Some("h".to_string()),
                transparent: Some(true),
            }),
            ..Default::default()
        };
        let err = live_connect_setup(&MLDEV, "m", Some(&config)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "transparent parameter is not supported in Gemini API."
        );
        let message = live_connect_setup(&VERTEX, "m", Some(&config)).unwrap();
        assert_eq!(
            message["setup"]["sessionResumption"],
            json!({"handle": "h", "transparent": true})
        );
    }

    #[test]
    fn context_window_compression_converts() {
        let config = LiveConnectConfig {
            context_window_compression: Some(
                crate::types::config::ContextWindowCompressionConfig {
                    trigger_tokens: Some(1000),
                    sliding_window: Some(SlidingWindow {
                        target_tokens: Some(10),
                    }),
                },
            ),
            ..Default::default()
        };
        let message = live_connect_setup(&MLDEV, "m", Some(&config)).unwrap();
        assert_eq!(
            message["setup"]["contextWindowCompression"],
            json!({"triggerTokens": 1000, "slidingWindow": {"targetTokens": 10}})
        );
    }

    #[test]
    fn input_transcription_is_vertex_only() {
        let config = LiveConnectConfig {
            input_audio_transcription: Some(Default::default()),
            ..Default::default()
        };
        assert!(live_connect_setup(&MLDEV, "m", Some(&config)).is_err());
        assert!(live_connect_setup(&VERTEX, "m", Some(&config)).is_ok());
    }
}
