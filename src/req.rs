//! HTTP seam between the engine and the wire.
//!
//! The engine only ever needs `GET` (directory), `HEAD` (new nonce) and
//! `POST` (everything signed). Any client implementing [`HttpClient`] can be
//! plugged in; [`UReq`] is the default.
//!
//! [`UReq`]: ../struct.UReq.html
use crate::api::ApiProblem;
use crate::{Error, Result};

/// Trait for the blocking HTTP client used by the engine.
///
/// A client only fails with `Err` on connection level problems. Any response
/// the server sends, including 4xx/5xx, is returned as an `HttpResponse` so the
/// caller can still pick up the replay nonce.
pub trait HttpClient: Clone + Send + Sync + 'static {
    fn get(&self, url: &str) -> Result<HttpResponse>;
    fn head(&self, url: &str) -> Result<HttpResponse>;
    fn post(&self, url: &str, body: &str) -> Result<HttpResponse>;
}

/// A fully read HTTP response.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        HttpResponse {
            status,
            headers: vec![],
            body: body.into(),
        }
    }

    /// Header names are stored lower case.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First value of the named header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers(name).next()
    }

    /// All values of the named header, in order received.
    pub fn headers<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .filter(move |(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn expect_header(&self, name: &str) -> Result<&str> {
        self.header(name).ok_or_else(|| {
            Error::Api(ApiProblem {
                _type: format!("Missing header: {}", name),
                ..Default::default()
            })
        })
    }

    fn content_type(&self) -> &str {
        self.header("content-type")
            .and_then(|c| c.split(';').next())
            .map(|c| c.trim())
            .unwrap_or("")
    }

    /// Turn non-2xx responses into `Error::Api`.
    pub fn handle_errors(self) -> Result<Self> {
        // ok responses pass through
        if self.is_success() {
            return Ok(self);
        }

        let problem = if self.content_type() == "application/problem+json" {
            // if we were sent a problem+json, deserialize it
            serde_json::from_str(&self.body).unwrap_or_else(|e| ApiProblem {
                _type: "problemJsonFail".into(),
                detail: Some(format!(
                    "Failed to deserialize application/problem+json ({}) body: {}",
                    e, self.body
                )),
                status: Some(self.status),
                subproblems: None,
            })
        } else {
            // some other problem
            ApiProblem {
                _type: "httpReqError".into(),
                detail: Some(format!("{} body: {}", self.status, self.body)),
                status: Some(self.status),
                subproblems: None,
            }
        };

        Err(Error::Api(problem))
    }
}
