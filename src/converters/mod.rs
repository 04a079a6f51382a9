//! Canonical-to-wire conversion for both backends.

mod count;
mod embed;
mod engine;
mod files;
mod generate;
mod live;
mod tunings;

pub use engine::{Backend, Context};

pub(crate) use count::{count_tokens_request, count_tokens_response};
pub(crate) use embed::{embed_content_request, embed_content_response};
pub(crate) use files::{create_file_request, file_from_response};
pub(crate) use generate::{generate_content_request, generate_content_response};
pub(crate) use live::live_connect_setup;
pub(crate) use tunings::{create_tuning_job_request, tuning_job_from_response};
