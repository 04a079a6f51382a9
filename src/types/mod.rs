//! Canonical data model shared by both backends.

pub mod config;
pub mod content;
pub mod response;
pub mod schema;

pub use config::{
    AutomaticFunctionCallingConfig, CallableTool, CountTokensConfig, CreateTuningJobConfig,
    EmbedContentConfig, FunctionCallingConfig, GenerateContentConfig, HttpOptions,
    LiveConnectConfig, SafetySetting, SpeechConfig, ThinkingConfig, Tool, ToolConfig,
    ToolHandler, ToolUnion, TuningDataset, TuningExample, TuningValidationDataset,
    UploadFileConfig,
};
pub use content::{
    Blob, CodeExecutionResult, Content, ExecutableCode, File, FileData, FunctionCall,
    FunctionResponse, Part, VideoMetadata,
};
pub use response::{
    Candidate, Citation, CitationMetadata, ContentEmbedding, CountTokensResponse,
    EmbedContentResponse, GenerateContentResponse, PromptFeedback, SafetyRating,
    TunedModel, TuningJob, UsageMetadata,
};
pub use schema::{
    build_schema, from_json_schema, schema_for_type, FieldDecl, FunctionDeclaration,
    FunctionDeclarationBuilder, JsonType, RecordDecl, Schema, TypeDecl,
};
