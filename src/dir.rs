//
use std::sync::Arc;

use crate::acc::{AccountService, AcmeKey};
use crate::api::ApiDirectory;
use crate::cert::CertificateService;
use crate::clock::{Clock, SystemClock};
use crate::config::RetryPolicy;
use crate::jwt::Signer;
use crate::nonce::NoncePool;
use crate::order::{AuthorizationService, ChallengeService, OrderService};
use crate::req::HttpClient;
use crate::trans::Transport;
use crate::util::read_json;
use crate::{Error, Result};

const LETSENCRYPT: &str = "https://acme-v02.api.letsencrypt.org/directory";
const LETSENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Enumeration of known ACME API directories.
#[derive(Debug, Clone)]
pub enum DirectoryUrl<'a> {
    /// The main Let's Encrypt directory. Not appropriate for testing and dev.
    LetsEncrypt,
    /// The staging Let's Encrypt directory. Use for testing and dev. Doesn't issue
    /// "valid" certificates. The root signing certificate is not supposed
    /// to be in any trust chains.
    LetsEncryptStaging,
    /// Provide an arbitrary director URL to connect to.
    Other(&'a str),
}

impl<'a> DirectoryUrl<'a> {
    fn to_url(&self) -> &str {
        match self {
            DirectoryUrl::LetsEncrypt => LETSENCRYPT,
            DirectoryUrl::LetsEncryptStaging => LETSENCRYPT_STAGING,
            DirectoryUrl::Other(s) => s,
        }
    }
}

/// Entry point for accessing an ACME API.
///
/// The directory is fetched once and never refreshed. It owns the nonce pool
/// and the signing transport shared by all resource services, so one
/// `Directory` can be used from many threads at once.
pub struct Directory<H: HttpClient> {
    api_directory: ApiDirectory,
    transport: Arc<Transport<H>>,
}

impl<H: HttpClient> Clone for Directory<H> {
    fn clone(&self) -> Self {
        Directory {
            api_directory: self.api_directory.clone(),
            transport: self.transport.clone(),
        }
    }
}

impl<H: HttpClient> Directory<H> {
    /// Fetch the directory and prepare signing with the account key.
    ///
    /// `kid` is the account URL if the account is already registered. Without
    /// it, only [`accounts`] calls can succeed until an account is created or
    /// looked up.
    ///
    /// [`accounts`]: #method.accounts
    pub fn from_url(client: H, url: DirectoryUrl, key: AcmeKey, kid: Option<String>) -> Result<Directory<H>> {
        Self::from_url_with(
            client,
            url,
            key,
            kid,
            RetryPolicy::default(),
            Arc::new(SystemClock),
        )
    }

    /// Like `from_url`, with an explicit bad-nonce retry policy and clock.
    pub fn from_url_with(
        client: H,
        url: DirectoryUrl,
        key: AcmeKey,
        kid: Option<String>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Directory<H>> {
        let dir_url = url.to_url();
        debug!("Get directory {}", dir_url);
        let res = client.get(dir_url)?.handle_errors()?;
        let api_directory: ApiDirectory = read_json(&res)?;

        if api_directory.newAccount.is_empty() {
            return Err(Error::Config("directory is missing the newAccount URL".into()));
        }
        if api_directory.newOrder.is_empty() {
            return Err(Error::Config("directory is missing the newOrder URL".into()));
        }
        if api_directory.newNonce.is_empty() {
            return Err(Error::Config("directory is missing the newNonce URL".into()));
        }

        let nonce_pool = Arc::new(NoncePool::new(client.clone(), &api_directory.newNonce));
        let signer = Signer::new(key, kid, nonce_pool.clone());
        let transport = Transport::new(client, nonce_pool, signer, retry, clock);

        Ok(Directory {
            api_directory,
            transport: Arc::new(transport),
        })
    }

    /// Access the underlying JSON object.
    pub fn api_directory(&self) -> &ApiDirectory {
        &self.api_directory
    }

    /// The account URL once it's known.
    pub fn kid(&self) -> Option<String> {
        self.transport.signer().kid()
    }

    /// `token || "." || thumbprint(account key)`.
    pub fn key_authorization(&self, token: &str) -> Result<String> {
        self.transport.signer().key_authorization(token)
    }

    pub fn accounts(&self) -> AccountService<'_, H> {
        AccountService::new(self)
    }

    pub fn orders(&self) -> OrderService<'_, H> {
        OrderService::new(self)
    }

    pub fn authorizations(&self) -> AuthorizationService<'_, H> {
        AuthorizationService::new(self)
    }

    pub fn challenges(&self) -> ChallengeService<'_, H> {
        ChallengeService::new(self)
    }

    pub fn certificates(&self) -> CertificateService<'_, H> {
        CertificateService::new(self)
    }

    pub(crate) fn transport(&self) -> &Transport<H> {
        &self.transport
    }
}

impl<H: HttpClient> std::fmt::Debug for Directory<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("api_directory", &self.api_directory)
            .field("kid", &self.kid())
            .finish()
    }
}
