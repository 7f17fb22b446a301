//! Challenge providers.
//!
//! A provider puts the proof for one domain in place (`present`) and takes
//! it away again (`clean_up`). What "in place" means depends on the
//! challenge type: a TXT record for `dns-01`, a file for `http-01`, a
//! certificate for `tls-alpn-01`. The engine never does this itself.
//!
//! Providers are picked by name through a [`ProviderRegistry`].
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::{Error, Result};

pub mod dns01;

/// The proof mechanisms of ACME.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChallengeType {
    #[serde(rename = "dns-01")]
    Dns01,
    #[serde(rename = "http-01")]
    Http01,
    #[serde(rename = "tls-alpn-01")]
    TlsAlpn01,
}

impl ChallengeType {
    /// The `type` string used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeType::Dns01 => "dns-01",
            ChallengeType::Http01 => "http-01",
            ChallengeType::TlsAlpn01 => "tls-alpn-01",
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Puts and removes the proof for one domain.
///
/// Implementations must be idempotent and must tolerate `clean_up` being
/// called when `present` never succeeded.
pub trait Provider: Send + Sync {
    /// Make the proof for `domain` visible. For `dns-01` the record is
    /// given by [`dns01::get_record`].
    fn present(&self, domain: &str, token: &str, key_auth: &str) -> Result<()>;

    /// Remove what `present` created.
    fn clean_up(&self, domain: &str, token: &str, key_auth: &str) -> Result<()>;

    /// Propagation timeout and polling interval, when the provider knows
    /// better than the configured defaults.
    fn timeout(&self) -> Option<(Duration, Duration)> {
        None
    }
}

/// Builds a provider from nothing but its name. Providers read their own
/// settings.
pub type ProviderConstructor = Box<dyn Fn() -> Result<Arc<dyn Provider>> + Send + Sync>;

/// Name to constructor lookup.
pub struct ProviderRegistry {
    constructors: BTreeMap<String, ProviderConstructor>,
}

impl ProviderRegistry {
    /// A registry with the built-in `manual` provider.
    pub fn new() -> Self {
        let mut reg = ProviderRegistry {
            constructors: BTreeMap::new(),
        };
        reg.register("manual", || Ok(Arc::new(ManualProvider) as Arc<dyn Provider>));
        reg
    }

    /// Add or replace a provider.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn() -> Result<Arc<dyn Provider>> + Send + Sync + 'static,
    {
        self.constructors.insert(name.to_string(), Box::new(constructor));
    }

    pub fn create(&self, name: &str) -> Result<Arc<dyn Provider>> {
        match self.constructors.get(name) {
            Some(constructor) => constructor(),
            None => Err(Error::Config(format!("unrecognized DNS provider: {}", name))),
        }
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(|k| k.as_str()).collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        ProviderRegistry::new()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Asks a human to create the record. Only logs; the operator is expected to
/// have the record in place before propagation checking starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualProvider;

impl Provider for ManualProvider {
    fn present(&self, domain: &str, _token: &str, key_auth: &str) -> Result<()> {
        let (fqdn, value) = dns01::get_record(domain, key_auth);
        info!(
            "[{}] Please deploy a DNS TXT record under the name {} with the value: {}",
            domain, fqdn, value
        );
        Ok(())
    }

    fn clean_up(&self, domain: &str, _token: &str, key_auth: &str) -> Result<()> {
        let (fqdn, _) = dns01::get_record(domain, key_auth);
        info!("[{}] You can now remove the TXT record {}", domain, fqdn);
        Ok(())
    }
}
