#![warn(clippy::all)]
//! acme-issuer obtains certificates from ACME (Automatic Certificate Management Environment)
//! services such as [Let's Encrypt](https://letsencrypt.org/).
//!
//! Uses ACME v2 to issue certificates, and checks that DNS-01 proofs are visible on the
//! authoritative nameservers before the CA is asked to look at them.
//!
//! Install it like so:
//!
//! ```toml
//! [dependencies]
//! acme-issuer = "0.1"
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use acme_issuer::{create_p256_key, AcmeKey, ChallengeType, Directory, DirectoryUrl};
//! use acme_issuer::{Error, IssueConfig, Issuer, ObtainRequest, ProviderRegistry, UReq};
//!
//! fn request_cert() -> Result<(), Error> {
//!
//! // Use DirectoryUrl::LetsEncryptStaging for dev/testing.
//! let url = DirectoryUrl::LetsEncrypt;
//!
//! // The account key is yours to keep. Store it to reuse the account.
//! let key = AcmeKey::from_pkey(create_p256_key()?)?;
//!
//! // Fetch the directory. No account id yet.
//! let dir = Directory::from_url(UReq::default(), url, key, None)?;
//!
//! // Register (or find) the account. This records the account URL
//! // used to sign every following request.
//! let acc = dir.accounts().new_account(&["mailto:foo@bar.com".to_string()], true)?;
//! println!("account: {}", acc.location);
//!
//! // Providers are picked by name. "manual" only logs the record
//! // you need to create.
//! let registry = ProviderRegistry::new();
//! let provider = registry.create("manual")?;
//!
//! let mut issuer = Issuer::new(dir, IssueConfig::default());
//! issuer.set_provider(ChallengeType::Dns01, provider);
//!
//! // Creates the order, presents the proofs, waits for DNS propagation,
//! // validates, finalizes and downloads the certificate.
//! let cert = issuer.obtain(&ObtainRequest::new(&["myfancydomain.com"]))?;
//! println!("{} days left", cert.valid_days_left()?);
//!
//! Ok(())
//! }
//! ```
//!
//! ## Domain ownership
//!
//! Most website TLS certificates try to prove ownership/control over the domain they
//! are issued for. For ACME, this means proving you control either a web server answering
//! HTTP requests to the domain, or the DNS server answering name lookups against the domain.
//!
//! The proof is put in place by a [`Provider`]. The engine itself never touches a web
//! server or a DNS zone.
//!
//! ### DNS-01 propagation
//!
//! The CA looks at a DNS-01 record once. Asking too early wastes the attempt and counts
//! against rate limits, so by default the [`PropagationVerifier`] first finds the zone
//! of the record, then polls every authoritative nameserver of that zone until all of
//! them serve the expected value. See [`Dns01Config`].
//!
//! ### Multiple domains
//!
//! An order for several domains has one authorization per domain. They are validated
//! concurrently, and any one failing fails the whole order.
//!
//! [`PropagationVerifier`]: challenge/dns01/struct.PropagationVerifier.html
//!
//! ## Rate limits
//!
//! The ACME API provider Let's Encrypt uses [rate limits] to ensure the API is not being
//! abused. It might be tempting to put the polling intervals really low, but balance this
//! against the real risk of having access cut off.
//!
//! [rate limits]: https://letsencrypt.org/docs/rate-limits/
//!
//! ### Use staging for dev!
//!
//! Especially take care to use the Let's Encrypt staging environment for development
//! where the rate limits are more relaxed.
//!
//! See [`DirectoryUrl::LetsEncryptStaging`].
//!
//! [`DirectoryUrl::LetsEncryptStaging`]: enum.DirectoryUrl.html#variant.LetsEncryptStaging
//!
//! ## Implementation details
//!
//! Synchronous I/O and blocking calls, with plain threads for the concurrent
//! authorizations. All waiting goes through a [`Clock`] so tests run on virtual time.
//!
//! It is written by following [RFC 8555](https://tools.ietf.org/html/rfc8555), and relies
//! heavily on the [openssl](https://docs.rs/openssl/) crate to make JWK/JWT and sign requests
//! to the API.
//!
#[macro_use]
extern crate log;

mod acc;
mod cert;
mod clock;
mod config;
mod dir;
mod error;
mod issue;
mod jwt;
mod nonce;
mod req;
mod trans;
mod ureq;
mod util;

pub mod api;
pub mod challenge;
pub mod order;

#[cfg(test)]
mod test;

pub use crate::acc::{AccountResource, AccountService, AcmeKey};
pub use crate::cert::{
    create_p256_key, create_p384_key, create_rsa_key, CertificateChain, CertificateResource,
    CertificateService,
};
pub use crate::challenge::{ChallengeType, ManualProvider, Provider, ProviderRegistry};
pub use crate::clock::{Cancel, Clock, ManualClock, SystemClock};
pub use crate::config::{parse_nameservers, Dns01Config, HttpConfig, IssueConfig, RetryPolicy};
pub use crate::dir::{Directory, DirectoryUrl};
pub use crate::error::{Error, Result};
pub use crate::issue::{Issuer, ObtainRequest};
pub use crate::req::{HttpClient, HttpResponse};
pub use crate::ureq::UReq;
