//! Driving an order from identifiers to a downloaded certificate.
use openssl::pkey::{PKey, Private};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::api::{ApiChallenge, ApiOrder, ApiProblem};
use crate::cert::{create_csr, create_p256_key, CertificateResource};
use crate::challenge::dns01::PropagationVerifier;
use crate::challenge::{ChallengeType, Provider};
use crate::clock::{Cancel, Clock, SystemClock};
use crate::config::IssueConfig;
use crate::dir::Directory;
use crate::order::OrderResource;
use crate::req::HttpClient;
use crate::{Error, Result};

/// What to issue.
#[derive(Clone, Default)]
pub struct ObtainRequest {
    /// Identifiers of the certificate. The first one becomes the subject CN.
    pub domains: Vec<String>,
    /// Key for the certificate. A P-256 key is generated when `None`.
    pub private_key: Option<PKey<Private>>,
}

impl ObtainRequest {
    pub fn new<S: AsRef<str>>(domains: &[S]) -> Self {
        ObtainRequest {
            domains: domains.iter().map(|d| d.as_ref().to_string()).collect(),
            private_key: None,
        }
    }
}

impl std::fmt::Debug for ObtainRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ObtainRequest")
            .field("domains", &self.domains)
            .field("private_key", &self.private_key.is_some())
            .finish()
    }
}

/// One challenge picked for one authorization.
struct Selected {
    domain: String,
    authz_url: String,
    kind: ChallengeType,
    challenge: ApiChallenge,
    key_auth: String,
    provider: Arc<dyn Provider>,
}

/// Issues certificates for an account.
///
/// For every pending authorization of an order, one challenge is picked by
/// the configured preference among the types a provider is registered for.
/// All proofs are presented first, then the authorizations are validated
/// concurrently, one thread each. The first failure cancels the others, and
/// the order fails as a whole. Every presented proof is cleaned up before
/// `obtain` returns, whatever the outcome.
pub struct Issuer<H: HttpClient> {
    dir: Directory<H>,
    providers: HashMap<ChallengeType, Arc<dyn Provider>>,
    config: IssueConfig,
    verifier: Option<Arc<PropagationVerifier>>,
    clock: Arc<dyn Clock>,
}

impl<H: HttpClient> Issuer<H> {
    /// The directory must have an account (`kid`) for `obtain` to work.
    pub fn new(dir: Directory<H>, config: IssueConfig) -> Self {
        Self::with_clock(dir, config, Arc::new(SystemClock))
    }

    pub fn with_clock(dir: Directory<H>, config: IssueConfig, clock: Arc<dyn Clock>) -> Self {
        Issuer {
            dir,
            providers: HashMap::new(),
            config,
            verifier: None,
            clock,
        }
    }

    pub fn directory(&self) -> &Directory<H> {
        &self.dir
    }

    /// Register the provider solving challenges of type `kind`.
    pub fn set_provider(&mut self, kind: ChallengeType, provider: Arc<dyn Provider>) {
        self.providers.insert(kind, provider);
    }

    /// Use this verifier for `dns-01` instead of one talking to the real DNS.
    pub fn set_verifier(&mut self, verifier: PropagationVerifier) {
        self.verifier = Some(Arc::new(verifier));
    }

    /// Run a complete order and return the certificate.
    pub fn obtain(&self, req: &ObtainRequest) -> Result<CertificateResource> {
        self.check_preconditions(req)?;
        let verifier = self.verifier()?;

        let domains: Vec<&str> = req.domains.iter().map(|d| d.as_str()).collect();
        info!("[{}] acme: Obtaining certificate", domains.join(", "));
        let ord = self.dir.orders().new_order(&domains)?;

        let mut selected = vec![];
        let res = self
            .present_all(&ord, &mut selected)
            .and_then(|_| self.validate_all(&selected, verifier.as_deref()));

        if res.is_err() {
            self.deactivate_pending(&ord);
        }
        self.clean_up(&selected);
        res?;

        self.finish(&ord, req, &domains)
    }

    fn check_preconditions(&self, req: &ObtainRequest) -> Result<()> {
        if req.domains.is_empty() {
            return Err(Error::Config("no domains to obtain a certificate for".into()));
        }
        for domain in &req.domains {
            check_domain(domain)?;
        }
        if self.dir.kid().is_none() {
            return Err(Error::Config("no account: register or look up an account first".into()));
        }
        if self.providers.is_empty() {
            return Err(Error::Config("no challenge provider configured".into()));
        }
        Ok(())
    }

    fn verifier(&self) -> Result<Option<Arc<PropagationVerifier>>> {
        if !self.config.dns01.check_propagation || !self.providers.contains_key(&ChallengeType::Dns01) {
            return Ok(None);
        }
        if let Some(v) = &self.verifier {
            return Ok(Some(v.clone()));
        }
        let v = PropagationVerifier::new(self.config.dns01.clone(), self.clock.clone())?;
        Ok(Some(Arc::new(v)))
    }

    /// Pick a challenge per pending authorization and present its proof.
    ///
    /// An entry is recorded before `present` is called, so a half done
    /// presentation is still cleaned up.
    fn present_all(&self, ord: &OrderResource, selected: &mut Vec<Selected>) -> Result<()> {
        for authz_url in authorizations(&ord.order) {
            let auth = self.dir.authorizations().get(authz_url)?;
            let domain = if auth.wildcard() {
                format!("*.{}", auth.identifier.value)
            } else {
                auth.identifier.value.clone()
            };

            if auth.is_status_valid() {
                info!("[{}] acme: authorization already valid; skipping challenge", domain);
                continue;
            }
            if !auth.is_status_pending() && !auth.is_status_processing() {
                return Err(Error::Challenge {
                    domain,
                    problem: auth_problem(&auth),
                });
            }

            let (kind, challenge) = self
                .config
                .challenge_types
                .iter()
                .filter(|t| self.providers.contains_key(*t))
                .find_map(|t| auth.challenge(t.as_str()).map(|c| (*t, c.clone())))
                .ok_or_else(|| Error::Provider {
                    domain: domain.clone(),
                    message: "no configured provider for any offered challenge".into(),
                })?;
            let provider = self.providers[&kind].clone();
            let key_auth = self.dir.key_authorization(&challenge.token)?;

            info!("[{}] acme: use {} solver", domain, kind);
            selected.push(Selected {
                domain: domain.clone(),
                authz_url: authz_url.clone(),
                kind,
                challenge,
                key_auth,
                provider: provider.clone(),
            });

            let entry = &selected[selected.len() - 1];
            provider
                .present(&domain, &entry.challenge.token, &entry.key_auth)
                .map_err(|e| Error::Provider {
                    domain: domain.clone(),
                    message: e.to_string(),
                })?;
        }
        Ok(())
    }

    /// One thread per authorization. The first failure cancels the rest.
    fn validate_all(&self, selected: &[Selected], verifier: Option<&PropagationVerifier>) -> Result<()> {
        let cancel = Cancel::new();

        let results: Vec<Result<()>> = thread::scope(|s| {
            let handles: Vec<_> = selected
                .iter()
                .map(|sel| {
                    let cancel = cancel.clone();
                    s.spawn(move || {
                        let res = self.validate(sel, verifier, &cancel);
                        if res.is_err() {
                            cancel.cancel();
                        }
                        res
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .unwrap_or_else(|_| Err(Error::Other("validation thread panicked".into())))
                })
                .collect()
        });

        // report the cause, not the cancellations it triggered
        let mut cancelled = false;
        for res in results {
            match res {
                Ok(()) => {}
                Err(Error::Cancelled) => cancelled = true,
                Err(e) => return Err(e),
            }
        }
        if cancelled {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn validate(&self, sel: &Selected, verifier: Option<&PropagationVerifier>, cancel: &Cancel) -> Result<()> {
        if let (ChallengeType::Dns01, Some(verifier)) = (sel.kind, verifier) {
            match sel.provider.timeout() {
                Some((timeout, interval)) => verifier.wait_for_propagation_with(
                    &sel.domain,
                    &sel.key_auth,
                    timeout,
                    interval,
                    cancel,
                )?,
                None => verifier.wait_for_propagation(&sel.domain, &sel.key_auth, cancel)?,
            }
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        info!("[{}] acme: Trying to solve {}", sel.domain, sel.kind);
        let res = self.dir.challenges().ready(&sel.challenge.url)?;

        let default_wait = Duration::from_secs(self.config.authz_poll_interval_secs);
        let mut wait = res.retry_after.unwrap_or(default_wait);
        let start = self.clock.now();

        for _ in 0..self.config.authz_poll_attempts {
            if !self.clock.sleep(wait, cancel) {
                return Err(Error::Cancelled);
            }
            let (auth, hint) = self.dir.authorizations().get_with_retry_after(&sel.authz_url)?;
            if auth.is_status_valid() {
                info!("[{}] The server validated our request", sel.domain);
                return Ok(());
            }
            if !auth.is_status_pending() && !auth.is_status_processing() {
                return Err(Error::Challenge {
                    domain: sel.domain.clone(),
                    problem: auth_problem(&auth),
                });
            }
            wait = hint.unwrap_or(default_wait);
        }

        Err(Error::Timeout {
            what: format!("waiting for authorization of {}", sel.domain),
            elapsed: self.clock.now() - start,
        })
    }

    /// Give up authorizations still pending so they don't linger at the CA.
    fn deactivate_pending(&self, ord: &OrderResource) {
        for authz_url in authorizations(&ord.order) {
            let auth = match self.dir.authorizations().get(authz_url) {
                Ok(auth) => auth,
                Err(e) => {
                    warn!("Unable to fetch authorization {}: {}", authz_url, e);
                    continue;
                }
            };
            if !auth.is_status_pending() {
                continue;
            }
            debug!("Deactivating authorization for {}", auth.identifier.value);
            if let Err(e) = self.dir.authorizations().deactivate(authz_url) {
                warn!("Unable to deactivate authorization {}: {}", authz_url, e);
            }
        }
    }

    fn clean_up(&self, selected: &[Selected]) {
        for sel in selected {
            if let Err(e) = sel.provider.clean_up(&sel.domain, &sel.challenge.token, &sel.key_auth) {
                warn!("[{}] acme: cleaning up failed: {}", sel.domain, e);
            }
        }
    }

    fn finish(&self, ord: &OrderResource, req: &ObtainRequest, domains: &[&str]) -> Result<CertificateResource> {
        let ready = self.poll_order(&ord.location, ApiOrder::is_status_ready, "order to become ready")?;

        let pkey = match &req.private_key {
            Some(pkey) => pkey.clone(),
            None => create_p256_key()?,
        };
        let csr = create_csr(&pkey, domains)?;

        debug!("[{}] Finalize order {}", domains[0], ord.location);
        let finalized = self.dir.orders().finalize(&ready.finalize, &csr.to_der()?)?;
        let valid = if finalized.is_status_valid() {
            finalized
        } else {
            self.poll_order(&ord.location, ApiOrder::is_status_valid, "certificate issuance")?
        };

        let cert_url = valid
            .certificate
            .ok_or_else(|| Error::Other(format!("valid order {} has no certificate URL", ord.location)))?;
        let chain = self.dir.certificates().get(&cert_url, self.config.bundle)?;
        info!("[{}] Server responded with a certificate", domains[0]);

        Ok(CertificateResource {
            domain: domains[0].to_string(),
            cert_url,
            private_key: String::from_utf8_lossy(&pkey.private_key_to_pem_pkcs8()?).into_owned(),
            certificate: chain.certificate,
            issuer_certificate: chain.issuer,
            csr: String::from_utf8_lossy(&csr.to_pem()?).into_owned(),
        })
    }

    /// Poll the order until `done`. An invalid order is a CA error.
    fn poll_order(&self, url: &str, done: fn(&ApiOrder) -> bool, what: &str) -> Result<ApiOrder> {
        let interval = Duration::from_millis(self.config.order_poll_interval_ms);
        let timeout = Duration::from_secs(self.config.order_timeout_secs);
        let never = Cancel::new();
        let start = self.clock.now();

        loop {
            let order = self.dir.orders().get(url)?.order;
            if done(&order) {
                return Ok(order);
            }
            if order.is_status_invalid() {
                let problem = order.error.unwrap_or_else(|| {
                    ApiProblem::new("orderInvalid", format!("order {} is invalid", url))
                });
                return Err(Error::Api(problem));
            }

            let elapsed = self.clock.now() - start;
            if elapsed + interval > timeout {
                return Err(Error::Timeout {
                    what: format!("waiting for {}", what),
                    elapsed,
                });
            }
            trace!("Order {} is {:?}, waiting", url, order.status);
            self.clock.sleep(interval, &never);
        }
    }
}

impl<H: HttpClient> std::fmt::Debug for Issuer<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.providers.keys().collect();
        kinds.sort();
        f.debug_struct("Issuer")
            .field("dir", &self.dir)
            .field("providers", &kinds)
            .field("config", &self.config)
            .finish()
    }
}

fn authorizations(order: &ApiOrder) -> impl Iterator<Item = &String> {
    order.authorizations.iter().flatten()
}

fn auth_problem(auth: &crate::api::ApiAuth) -> ApiProblem {
    auth.problem().cloned().unwrap_or_else(|| {
        ApiProblem::new(
            "authorizationFailed",
            format!("authorization for {} is {}", auth.identifier.value, auth.status()),
        )
    })
}

/// Hostname syntax, with an optional leading `*.`.
fn check_domain(domain: &str) -> Result<()> {
    let name = domain.strip_prefix("*.").unwrap_or(domain);
    let name = name.strip_suffix('.').unwrap_or(name);
    let valid = !name.is_empty()
        && name.len() <= 253
        && name.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(Error::Config(format!("invalid domain: {:?}", domain)))
    }
}
