//! HTTP plumbing: transport trait, SSE framing, retry, options merging.

pub(crate) mod options;
pub(crate) mod retry;
pub(crate) mod sse;
pub mod transport;

pub use transport::{ByteStream, HttpRequest, HttpResponse, ReqwestTransport, Transport};
