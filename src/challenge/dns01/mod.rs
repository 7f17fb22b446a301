//! DNS-01 record naming and propagation checking.
use openssl::sha::sha256;

use crate::util::base64url;

mod exchange;
mod propagation;
mod zone;

pub use self::exchange::{DnsExchange, HickoryExchange};
pub use self::propagation::PropagationVerifier;

/// Label under which the proof is published.
pub const ACME_CHALLENGE: &str = "_acme-challenge";

/// The TXT record for a challenge: fully qualified name and value.
///
/// The value is `base64url(SHA-256(key_auth))`. A wildcard domain shares the
/// record of its base domain.
pub fn get_record(domain: &str, key_auth: &str) -> (String, String) {
    let value = base64url(&sha256(key_auth.as_bytes()));
    (challenge_fqdn(domain), value)
}

/// `_acme-challenge.<domain>.`
pub fn challenge_fqdn(domain: &str) -> String {
    to_fqdn(&format!("{}.{}", ACME_CHALLENGE, base_domain(domain)))
}

/// Drop a leading `*.`.
pub(crate) fn base_domain(domain: &str) -> &str {
    domain.strip_prefix("*.").unwrap_or(domain)
}

pub(crate) fn to_fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}
