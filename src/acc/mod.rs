//
use crate::api::{ApiAccount, ApiStatusUpdate};
use crate::dir::Directory;
use crate::req::HttpClient;
use crate::util::{base64url_decode, read_json};
use crate::{Error, Result};

mod akey;

pub use self::akey::AcmeKey;

/// An account as returned by the CA, with the URL that identifies it.
///
/// The `location` doubles as the `kid` in all signed requests after
/// registration.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountResource {
    pub location: String,
    pub account: ApiAccount,
}

/// Account registration and management.
///
/// Registering (or looking up) an account records its URL in the directory's
/// signer, so every later request is signed with the `kid` instead of the
/// full JWK.
#[derive(Debug)]
pub struct AccountService<'a, H: HttpClient> {
    dir: &'a Directory<H>,
}

impl<'a, H: HttpClient> AccountService<'a, H> {
    pub(crate) fn new(dir: &'a Directory<H>) -> Self {
        AccountService { dir }
    }

    /// Create an account, or get the existing one for the key.
    ///
    /// Fails with a `Config` error before any request if the CA requires
    /// external account binding.
    pub fn new_account(&self, contact: &[String], terms_agreed: bool) -> Result<AccountResource> {
        let eab_required = self
            .dir
            .api_directory()
            .meta
            .as_ref()
            .map(|m| m.externalAccountRequired())
            .unwrap_or(false);
        if eab_required {
            return Err(Error::Config(
                "the CA requires external account binding".into(),
            ));
        }
        let acc = ApiAccount {
            contact: contact.to_vec(),
            termsOfServiceAgreed: Some(terms_agreed),
            ..Default::default()
        };
        self.register(&acc)
    }

    /// Create an account bound to an account at the CA's side.
    ///
    /// `hmac_key` is the base64url encoded key handed out by the CA together
    /// with `eab_kid`.
    pub fn new_account_with_eab(
        &self,
        contact: &[String],
        terms_agreed: bool,
        eab_kid: &str,
        hmac_key: &str,
    ) -> Result<AccountResource> {
        let hmac = base64url_decode(hmac_key)?;
        let new_account_url = &self.dir.api_directory().newAccount;
        let eab = self
            .dir
            .transport()
            .signer()
            .sign_eab_content(new_account_url, eab_kid, &hmac)?;
        let acc = ApiAccount {
            contact: contact.to_vec(),
            termsOfServiceAgreed: Some(terms_agreed),
            externalAccountBinding: Some(eab),
            ..Default::default()
        };
        self.register(&acc)
    }

    /// Look up the account for the key without creating one.
    pub fn find_existing(&self) -> Result<AccountResource> {
        let acc = ApiAccount {
            onlyReturnExisting: Some(true),
            ..Default::default()
        };
        self.register(&acc)
    }

    fn register(&self, acc: &ApiAccount) -> Result<AccountResource> {
        let transport = self.dir.transport();
        let res = transport.post_jwk(&self.dir.api_directory().newAccount, acc)?;
        let location = res.expect_header("location")?.to_string();
        debug!("Key id is: {}", location);
        // fill in the server returned key id
        transport.signer().set_kid(&location);
        let account: ApiAccount = read_json(&res)?;
        Ok(AccountResource { location, account })
    }

    /// Fetch the current state of an account.
    pub fn get(&self, url: &str) -> Result<ApiAccount> {
        let res = self.dir.transport().post_as_get(url)?;
        read_json(&res)
    }

    /// Replace the contact list.
    pub fn update(&self, url: &str, contact: &[String]) -> Result<ApiAccount> {
        let acc = ApiAccount {
            contact: contact.to_vec(),
            ..Default::default()
        };
        let res = self.dir.transport().post(url, &acc)?;
        read_json(&res)
    }

    /// Deactivate the account. There is no way back.
    pub fn deactivate(&self, url: &str) -> Result<ApiAccount> {
        let res = self.dir.transport().post(url, &ApiStatusUpdate::deactivated())?;
        read_json(&res)
    }
}
