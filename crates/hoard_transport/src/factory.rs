//! Backend selection by URL scheme.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TransportError;
use crate::file::FileTransport;
use crate::http::HttpTransport;
use crate::Transport;

/// Settings shared by all backends.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Extra headers sent with every HTTP request.
    pub headers: BTreeMap<String, String>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            headers: BTreeMap::new(),
        }
    }
}

/// Creates the transport serving `url`.
pub fn create_transport(
    url: &str,
    options: &TransportOptions,
) -> Result<Arc<dyn Transport>, TransportError> {
    let scheme = url.split_once("://").map(|(s, _)| s.to_ascii_lowercase());
    match scheme.as_deref() {
        Some("http") | Some("https") => {
            let headers = options
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Ok(Arc::new(HttpTransport::new(url, options.timeout, headers)))
        }
        Some("file") => Ok(Arc::new(FileTransport::from_url(url)?)),
        _ => Err(TransportError::UnsupportedScheme {
            url: url.to_string(),
        }),
    }
}
