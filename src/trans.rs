use serde::Serialize;
use std::sync::Arc;

use crate::clock::{Cancel, Clock};
use crate::config::RetryPolicy;
use crate::jwt::Signer;
use crate::nonce::NoncePool;
use crate::req::{HttpClient, HttpResponse};
use crate::{Error, Result};

/// JWS payload and nonce handling for requests to the API.
///
/// Setup is:
///
/// 1. `Transport::new()`
/// 2. `post_jwk()` against newAccount url
/// 3. `set_kid` from the returned `Location` header.
/// 4. `post()` / `post_as_get()` for all calls after that.
///
/// A request the CA rejects with `badNonce` is re-signed with a new nonce and
/// retried with exponential backoff until the retry budget runs out. Every
/// other failure is returned as is.
#[derive(Debug)]
pub(crate) struct Transport<H: HttpClient> {
    client: H,
    signer: Signer<H>,
    nonce_pool: Arc<NoncePool<H>>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl<H: HttpClient> Transport<H> {
    pub fn new(
        client: H,
        nonce_pool: Arc<NoncePool<H>>,
        signer: Signer<H>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Transport {
            client,
            signer,
            nonce_pool,
            retry,
            clock,
        }
    }

    pub fn signer(&self) -> &Signer<H> {
        &self.signer
    }

    /// Make call using the key id (or the jwk if the kid is not yet known).
    pub fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<HttpResponse> {
        let content = serde_json::to_string(body)?;
        self.retrying_post(url, &content, false)
    }

    /// POST-as-GET, the signed replacement for GET on ACME resources.
    pub fn post_as_get(&self, url: &str) -> Result<HttpResponse> {
        self.retrying_post(url, "", false)
    }

    /// Make call using the full jwk. Only for newAccount.
    pub fn post_jwk<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<HttpResponse> {
        let content = serde_json::to_string(body)?;
        self.retrying_post(url, &content, true)
    }

    fn retrying_post(&self, url: &str, content: &str, use_jwk: bool) -> Result<HttpResponse> {
        let start = self.clock.now();
        let mut interval = self.retry.initial_interval();
        let never = Cancel::new();

        loop {
            let err = match self.signed_post(url, content, use_jwk) {
                Ok(res) => return Ok(res),
                Err(Error::Api(problem)) if problem.is_bad_nonce() => problem,
                Err(e) => return Err(e),
            };

            let elapsed = self.clock.now() - start;
            if elapsed + interval > self.retry.max_elapsed() {
                return Err(Error::Timeout {
                    what: format!("retrying {} after nonce error ({})", url, err),
                    elapsed,
                });
            }

            info!("nonce error retry: {}", err);
            self.clock.sleep(interval, &never);
            interval = self.retry.next_interval(interval);
        }
    }

    fn signed_post(&self, url: &str, content: &str, use_jwk: bool) -> Result<HttpResponse> {
        // A new nonce is popped on every attempt, never reused.
        let body = if use_jwk {
            self.signer.sign_content_jwk(url, content)?
        } else {
            self.signer.sign_content(url, content)?
        };

        debug!("Call endpoint {}", url);

        let response = self.client.post(url, &body)?;

        // Regardless of the request being a success or not, there might be
        // a nonce in the response.
        self.nonce_pool.extract_nonce(&response);

        response.handle_errors()
    }
}
