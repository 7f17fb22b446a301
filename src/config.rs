//! Configuration surface.
//!
//! Everything here is plain data that can be deserialized from JSON by an
//! outer tool. Durations are given in whole seconds or milliseconds, as the
//! field name says.
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::challenge::ChallengeType;
use crate::{Error, Result};

/// HTTP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_http_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("acme-issuer/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Exponential backoff used when the CA rejects a nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_initial_interval")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_max_interval")]
    pub max_interval_ms: u64,
    /// Total budget across all attempts of one request.
    #[serde(default = "default_max_elapsed")]
    pub max_elapsed_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_initial_interval() -> u64 {
    200
}

fn default_max_interval() -> u64 {
    5_000
}

fn default_max_elapsed() -> u64 {
    20_000
}

fn default_multiplier() -> f64 {
    1.5
}

impl RetryPolicy {
    pub(crate) fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub(crate) fn max_elapsed(&self) -> Duration {
        Duration::from_millis(self.max_elapsed_ms)
    }

    /// The interval following `current`.
    pub(crate) fn next_interval(&self, current: Duration) -> Duration {
        current
            .mul_f64(self.multiplier)
            .min(Duration::from_millis(self.max_interval_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            initial_interval_ms: default_initial_interval(),
            max_interval_ms: default_max_interval(),
            max_elapsed_ms: default_max_elapsed(),
            multiplier: default_multiplier(),
        }
    }
}

/// DNS-01 propagation checking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dns01Config {
    /// Wait for the record on the authoritative servers before telling the
    /// CA the challenge is ready.
    #[serde(default = "default_true")]
    pub check_propagation: bool,
    /// Every queried server must serve the record. When off, one matching
    /// answer is enough.
    #[serde(default = "default_true")]
    pub require_complete_propagation: bool,
    /// Recursive resolvers (`ip` or `ip:port`). When set they replace the
    /// system resolvers and are also polled for the TXT record.
    #[serde(default)]
    pub recursive_nameservers: Vec<String>,
    #[serde(default = "default_propagation_timeout")]
    pub propagation_timeout_secs: u64,
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,
    /// Timeout of a single DNS query.
    #[serde(default = "default_dns_timeout")]
    pub dns_timeout_secs: u64,
    /// Attempts for the SOA/NS lookups before the zone is given up on.
    #[serde(default = "default_lookup_attempts")]
    pub lookup_attempts: u32,
    /// Follow a CNAME on `_acme-challenge.<domain>`.
    #[serde(default = "default_true")]
    pub follow_cname: bool,
}

fn default_true() -> bool {
    true
}

fn default_propagation_timeout() -> u64 {
    60
}

fn default_polling_interval() -> u64 {
    2
}

fn default_dns_timeout() -> u64 {
    10
}

fn default_lookup_attempts() -> u32 {
    3
}

impl Dns01Config {
    pub fn propagation_timeout(&self) -> Duration {
        Duration::from_secs(self.propagation_timeout_secs)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }
}

impl Default for Dns01Config {
    fn default() -> Self {
        Dns01Config {
            check_propagation: true,
            require_complete_propagation: true,
            recursive_nameservers: vec![],
            propagation_timeout_secs: default_propagation_timeout(),
            polling_interval_secs: default_polling_interval(),
            dns_timeout_secs: default_dns_timeout(),
            lookup_attempts: default_lookup_attempts(),
            follow_cname: true,
        }
    }
}

/// Knobs for the order orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueConfig {
    /// Challenge types in order of preference.
    #[serde(default = "default_challenge_types")]
    pub challenge_types: Vec<ChallengeType>,
    /// Used when the CA sends no `Retry-After`.
    #[serde(default = "default_authz_poll_interval")]
    pub authz_poll_interval_secs: u64,
    #[serde(default = "default_authz_poll_attempts")]
    pub authz_poll_attempts: u32,
    #[serde(default = "default_order_poll_interval")]
    pub order_poll_interval_ms: u64,
    #[serde(default = "default_order_timeout")]
    pub order_timeout_secs: u64,
    /// Keep the issuer chain in `CertificateResource::certificate`.
    #[serde(default = "default_true")]
    pub bundle: bool,
    #[serde(default)]
    pub dns01: Dns01Config,
}

fn default_challenge_types() -> Vec<ChallengeType> {
    vec![ChallengeType::Dns01, ChallengeType::Http01, ChallengeType::TlsAlpn01]
}

fn default_authz_poll_interval() -> u64 {
    5
}

fn default_authz_poll_attempts() -> u32 {
    60
}

fn default_order_poll_interval() -> u64 {
    500
}

fn default_order_timeout() -> u64 {
    30
}

impl Default for IssueConfig {
    fn default() -> Self {
        IssueConfig {
            challenge_types: default_challenge_types(),
            authz_poll_interval_secs: default_authz_poll_interval(),
            authz_poll_attempts: default_authz_poll_attempts(),
            order_poll_interval_ms: default_order_poll_interval(),
            order_timeout_secs: default_order_timeout(),
            bundle: true,
            dns01: Dns01Config::default(),
        }
    }
}

/// Parse nameserver addresses. A bare IP gets port 53.
pub fn parse_nameservers(servers: &[String]) -> Result<Vec<SocketAddr>> {
    servers
        .iter()
        .map(|s| {
            let s = s.trim();
            if let Ok(addr) = s.parse::<SocketAddr>() {
                return Ok(addr);
            }
            s.trim_start_matches('[')
                .trim_end_matches(']')
                .parse::<IpAddr>()
                .map(|ip| SocketAddr::new(ip, 53))
                .map_err(|_| Error::Config(format!("invalid nameserver address: {}", s)))
        })
        .collect()
}
