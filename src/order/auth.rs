//
use std::time::Duration;

use crate::api::{ApiAuth, ApiChallenge, ApiEmptyObject, ApiStatusUpdate};
use crate::dir::Directory;
use crate::req::HttpClient;
use crate::util::{link_rel, read_json, retry_after};
use crate::Result;

/// An authorization ([ownership proof]) for a domain name.
///
/// Each authorization for an order must be progressed to a valid state
/// before the CA will issue a certificate. The CA may consider a domain
/// already proven from a previous order, in which case the authorization
/// arrives as `valid`.
///
/// [ownership proof]: ../index.html#domain-ownership
#[derive(Debug)]
pub struct AuthorizationService<'a, H: HttpClient> {
    dir: &'a Directory<H>,
}

impl<'a, H: HttpClient> AuthorizationService<'a, H> {
    pub(crate) fn new(dir: &'a Directory<H>) -> Self {
        AuthorizationService { dir }
    }

    pub fn get(&self, url: &str) -> Result<ApiAuth> {
        Ok(self.get_with_retry_after(url)?.0)
    }

    /// The authorization and the server's `Retry-After` hint, if any.
    pub fn get_with_retry_after(&self, url: &str) -> Result<(ApiAuth, Option<Duration>)> {
        let res = self.dir.transport().post_as_get(url)?;
        let auth: ApiAuth = read_json(&res)?;
        Ok((auth, retry_after(&res)))
    }

    /// Give up a pending authorization so it doesn't linger at the CA.
    pub fn deactivate(&self, url: &str) -> Result<ApiAuth> {
        let res = self.dir.transport().post(url, &ApiStatusUpdate::deactivated())?;
        read_json(&res)
    }
}

/// Result of telling the CA a challenge is ready.
#[derive(Debug, Clone)]
pub struct ChallengeResponse {
    pub challenge: ApiChallenge,
    /// Suggested wait before polling the authorization.
    pub retry_after: Option<Duration>,
    /// The authorization the challenge belongs to (`Link: <..>;rel="up"`).
    pub authz_url: Option<String>,
}

/// A DNS, HTTP, or TLS-ALPN challenge.
#[derive(Debug)]
pub struct ChallengeService<'a, H: HttpClient> {
    dir: &'a Directory<H>,
}

impl<'a, H: HttpClient> ChallengeService<'a, H> {
    pub(crate) fn new(dir: &'a Directory<H>) -> Self {
        ChallengeService { dir }
    }

    pub fn get(&self, url: &str) -> Result<ApiChallenge> {
        let res = self.dir.transport().post_as_get(url)?;
        read_json(&res)
    }

    /// Tell the CA to attempt validating the proof of this challenge.
    ///
    /// The proof must already be in place. The body is the empty object `{}`,
    /// not the empty POST-as-GET payload.
    pub fn ready(&self, url: &str) -> Result<ChallengeResponse> {
        let res = self.dir.transport().post(url, &ApiEmptyObject)?;
        Ok(ChallengeResponse {
            challenge: read_json(&res)?,
            retry_after: retry_after(&res),
            authz_url: link_rel(&res, "up"),
        })
    }
}
