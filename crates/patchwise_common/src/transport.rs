//! HTTP transport
//!
//! The updater only needs two things from the network: read a small body
//! (the catalog) and stream a package to disk. `ReqwestTransport` does both
//! with a blocking client; `FakeTransport` serves canned bodies for tests.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Connect timeout for every request
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("patchwise/", env!("CARGO_PKG_VERSION"));

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} returned an empty body")]
    Empty { url: String },

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Blocking HTTP GET
pub trait HttpTransport {
    /// GET `url` and return the whole body
    fn get(&self, url: &str, bearer: Option<&str>) -> Result<Vec<u8>, TransportError>;

    /// GET `url` into `dest`, returning the number of bytes written
    fn download(
        &self,
        url: &str,
        bearer: Option<&str>,
        dest: &Path,
    ) -> Result<u64, TransportError> {
        let body = self.get(url, bearer)?;
        fs::write(dest, &body).map_err(|source| TransportError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        Ok(body.len() as u64)
    }
}

impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    fn get(&self, url: &str, bearer: Option<&str>) -> Result<Vec<u8>, TransportError> {
        (**self).get(url, bearer)
    }

    fn download(
        &self,
        url: &str,
        bearer: Option<&str>,
        dest: &Path,
    ) -> Result<u64, TransportError> {
        (**self).download(url, bearer, dest)
    }
}

/// Real transport backed by `reqwest::blocking`
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Build a client with the fixed connect timeout and an overall `timeout`.
    ///
    /// With `verify_tls = false` invalid certificates and host names are
    /// accepted.
    pub fn new(verify_tls: bool, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .danger_accept_invalid_hostnames(!verify_tls)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    fn send(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<reqwest::blocking::Response, TransportError> {
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| map_reqwest_error(url, e))?;
        if !response.status().is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

fn map_reqwest_error(url: &str, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Request {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str, bearer: Option<&str>) -> Result<Vec<u8>, TransportError> {
        debug!("GET {}", url);
        let response = self.send(url, bearer)?;
        let body = response.bytes().map_err(|e| map_reqwest_error(url, e))?;
        Ok(body.to_vec())
    }

    // Streams straight to disk instead of buffering the package
    fn download(
        &self,
        url: &str,
        bearer: Option<&str>,
        dest: &Path,
    ) -> Result<u64, TransportError> {
        debug!("GET {} -> {}", url, dest.display());
        let mut response = self.send(url, bearer)?;

        let io_err = |source| TransportError::Io {
            path: dest.to_path_buf(),
            source,
        };
        let mut file = File::create(dest).map_err(io_err)?;
        let written = response.copy_to(&mut file).map_err(|e| map_reqwest_error(url, e))?;
        file.flush().map_err(io_err)?;
        Ok(written)
    }
}

/// Canned response for `FakeTransport`
#[derive(Debug, Clone)]
enum FakeResponse {
    Body(Vec<u8>),
    Status(u16),
    Timeout,
}

/// Fake transport for testing: serves fixed responses per URL and records
/// every request.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, FakeResponse>>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`
    pub fn with_body(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.route(url, FakeResponse::Body(body.into()));
        self
    }

    /// Answer `url` with an HTTP error status
    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.route(url, FakeResponse::Status(status));
        self
    }

    /// Make requests to `url` time out
    pub fn with_timeout(self, url: &str) -> Self {
        self.route(url, FakeResponse::Timeout);
        self
    }

    /// Replace the body served for `url`
    pub fn set_body(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.route(url, FakeResponse::Body(body.into()));
    }

    fn route(&self, url: &str, response: FakeResponse) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(url.to_string(), response);
        }
    }

    /// URLs requested so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.iter().map(|(url, _)| url.clone()).collect())
            .unwrap_or_default()
    }

    /// Bearer tokens sent so far, in order
    pub fn bearers(&self) -> Vec<Option<String>> {
        self.calls
            .lock()
            .map(|calls| calls.iter().map(|(_, bearer)| bearer.clone()).collect())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    /// Number of requests made to `url`
    pub fn calls_to(&self, url: &str) -> usize {
        self.calls().iter().filter(|called| called.as_str() == url).count()
    }
}

impl HttpTransport for FakeTransport {
    fn get(&self, url: &str, bearer: Option<&str>) -> Result<Vec<u8>, TransportError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((url.to_string(), bearer.map(str::to_string)));
        }

        let response = self
            .routes
            .lock()
            .ok()
            .and_then(|routes| routes.get(url).cloned())
            .unwrap_or(FakeResponse::Status(404));

        match response {
            FakeResponse::Body(body) => Ok(body),
            FakeResponse::Status(status) => Err(TransportError::Status {
                url: url.to_string(),
                status,
            }),
            FakeResponse::Timeout => Err(TransportError::Timeout {
                url: url.to_string(),
            }),
        }
    }
}
