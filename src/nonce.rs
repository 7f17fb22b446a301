use std::collections::VecDeque;
use std::sync::Mutex;

use crate::req::{HttpClient, HttpResponse};
use crate::Result;

pub(crate) const REPLAY_NONCE: &str = "replay-nonce";

/// Shared pool of nonces.
///
/// Every response from the CA carries a fresh nonce, so the pool is refilled
/// as a side effect of normal traffic. Only when it runs dry is the
/// `newNonce` endpoint asked for one. A nonce leaves the pool exactly once.
#[derive(Debug)]
pub(crate) struct NoncePool<H: HttpClient> {
    nonce_url: String,
    client: H,
    pool: Mutex<VecDeque<String>>,
}

impl<H: HttpClient> NoncePool<H> {
    pub fn new(client: H, nonce_url: &str) -> Self {
        NoncePool {
            nonce_url: nonce_url.into(),
            client,
            pool: Default::default(),
        }
    }

    /// Add a nonce to the pool.
    pub fn push(&self, nonce: String) {
        trace!("Push nonce");
        self.pool.lock().unwrap().push_back(nonce);
    }

    /// Pick up the nonce in any response, successful or not.
    pub fn extract_nonce(&self, res: &HttpResponse) {
        if let Some(nonce) = res.header(REPLAY_NONCE) {
            self.push(nonce.to_string());
        }
    }

    /// Take a nonce, fetching a new one if the pool is empty.
    pub fn pop(&self) -> Result<String> {
        if let Some(nonce) = self.pool.lock().unwrap().pop_front() {
            trace!("Use previous nonce");
            return Ok(nonce);
        }
        debug!("Request new nonce");
        let res = self.client.head(&self.nonce_url)?.handle_errors()?;
        Ok(res.expect_header(REPLAY_NONCE)?.to_string())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pool.lock().unwrap().len()
    }
}
