//! Remote object store clients for the build cache.
//!
//! A [`Transport`] reads and writes opaque objects by URL. Backends are
//! interchangeable and selected by the scheme of the configured base URL:
//! `http`/`https` use a pooled HTTP client, `file` uses a shared directory.
//! All calls are synchronous on the calling thread.

#![warn(missing_docs)]

pub mod error;
pub mod factory;
pub mod file;
pub mod http;
pub mod layout;

pub use error::TransportError;
pub use factory::{create_transport, TransportOptions};
pub use file::FileTransport;
pub use http::HttpTransport;
pub use layout::{join_url, resource_path};

use std::path::Path;

/// Content uploaded by [`Transport::put`].
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// In-memory bytes.
    Bytes(&'a [u8]),
    /// A file streamed from disk.
    File(&'a Path),
}

/// A remote object store client.
///
/// URLs are either absolute or relative to the transport's base URL.
pub trait Transport: Send + Sync {
    /// Base URL relative URLs are resolved against.
    fn base_url(&self) -> &str;

    /// Returns whether an object exists. A missing object is `Ok(false)`.
    fn exists(&self, url: &str) -> Result<bool, TransportError>;

    /// Downloads an object. A missing object is [`TransportError::NotFound`].
    fn get(&self, url: &str) -> Result<Vec<u8>, TransportError>;

    /// Uploads an object, replacing any existing one.
    fn put(&self, payload: Payload<'_>, url: &str) -> Result<(), TransportError>;

    /// Resolves a URL against the base URL.
    fn resolve(&self, url: &str) -> String {
        join_url(self.base_url(), url)
    }
}
