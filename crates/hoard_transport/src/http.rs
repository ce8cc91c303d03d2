//! HTTP(S) backend.

use std::io::Read;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::TransportError;
use crate::{Payload, Transport};

/// HTTP transport with a pool of reusable clients.
///
/// Clients are created on first demand and returned to the pool after each
/// request, so concurrent workers never share one and connection setup is
/// amortized across requests.
pub struct HttpTransport {
    base_url: String,
    timeout: Duration,
    headers: Vec<(String, String)>,
    pool: Mutex<Vec<ureq::Agent>>,
}

/// A client checked out of the pool. Returned on drop.
struct PooledAgent<'a> {
    pool: &'a Mutex<Vec<ureq::Agent>>,
    agent: ureq::Agent,
}

impl Drop for PooledAgent<'_> {
    fn drop(&mut self) {
        self.pool.lock().push(self.agent.clone());
    }
}

impl HttpTransport {
    /// Creates a transport for `base_url`.
    pub fn new(base_url: &str, timeout: Duration, headers: Vec<(String, String)>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            headers,
            pool: Mutex::new(Vec::new()),
        }
    }

    fn checkout(&self) -> PooledAgent<'_> {
        let agent = self.pool.lock().pop().unwrap_or_else(|| {
            tracing::debug!(base = %self.base_url, "creating HTTP client");
            ureq::AgentBuilder::new().timeout(self.timeout).build()
        });
        PooledAgent {
            pool: &self.pool,
            agent,
        }
    }

    fn request(&self, agent: &ureq::Agent, method: &str, url: &str) -> ureq::Request {
        self.headers
            .iter()
            .fold(agent.request(method, url), |req, (k, v)| req.set(k, v))
    }
}

fn map_error(url: &str, err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Status(404, _) => TransportError::NotFound {
            url: url.to_string(),
        },
        ureq::Error::Status(code, _) => TransportError::Status {
            url: url.to_string(),
            code,
        },
        ureq::Error::Transport(t) => TransportError::Http {
            url: url.to_string(),
            reason: t.to_string(),
        },
    }
}

impl Transport for HttpTransport {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn exists(&self, url: &str) -> Result<bool, TransportError> {
        let url = self.resolve(url);
        let client = self.checkout();
        match self.request(&client.agent, "HEAD", &url).call() {
            Ok(_) => Ok(true),
            Err(e) => match map_error(&url, e) {
                TransportError::NotFound { .. } => Ok(false),
                other => Err(other),
            },
        }
    }

    fn get(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let url = self.resolve(url);
        let client = self.checkout();
        let response = self
            .request(&client.agent, "GET", &url)
            .call()
            .map_err(|e| map_error(&url, e))?;
        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| TransportError::Http {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!(url = %url, bytes = body.len(), "downloaded");
        Ok(body)
    }

    fn put(&self, payload: Payload<'_>, url: &str) -> Result<(), TransportError> {
        let url = self.resolve(url);
        let client = self.checkout();
        let request = self.request(&client.agent, "PUT", &url);
        let result = match payload {
            Payload::Bytes(bytes) => request.send_bytes(bytes),
            Payload::File(path) => {
                let file = std::fs::File::open(path).map_err(|e| TransportError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                request.send(file)
            }
        };
        result.map_err(|e| map_error(&url, e))?;
        tracing::debug!(url = %url, "uploaded");
        Ok(())
    }
}
