//! Rust client for the Gemini Developer API and Vertex AI.
//!
//! One canonical request/response model serves two backends. The client
//! resolves which backend to talk to from explicit settings or the
//! environment, converts canonical types to each backend's wire shape,
//! and normalizes responses back. Registered host functions are executed
//! automatically when the model calls them.
//!
//! # Example
//!
//! ```no_run
//! use google_genai::Client;
//!
//! # async fn run() -> google_genai::Result<()> {
//! let client = Client::builder().api_key("...").build()?;
//! let response = client
//!     .models()
//!     .generate_content("gemini-2.0-flash", "Why is the sky blue?", None)
//!     .await?;
//! println!("{}", response.text().unwrap_or_default());
//! # Ok(())
//! # }
//! ```
//!
//! Vertex AI is selected by providing a project and location (or via
//! `GOOGLE_GENAI_USE_VERTEXAI=true` plus `GOOGLE_CLOUD_PROJECT` and
//! `GOOGLE_CLOUD_LOCATION`); the Gemini Developer API is selected by an
//! API key. A synchronous surface lives in [`blocking`].

mod afc;
pub mod blocking;
mod client;
mod common;
mod converters;
pub mod error;
mod files;
mod http;
mod models;
mod transformers;
mod tunings;
pub mod types;

pub use client::{Client, ClientBuilder};
pub use converters::Backend;
pub use error::{ApiError, Error, Result};
pub use files::Files;
pub use http::{ByteStream, HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use models::{Models, ResponseStream};
pub use transformers::ContentUnion;
pub use tunings::Tunings;
