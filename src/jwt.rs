use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::sha::sha256;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

use crate::acc::AcmeKey;
use crate::nonce::NoncePool;
use crate::req::HttpClient;
use crate::util::base64url;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Default)]
pub(crate) struct JwsProtected {
    alg: String,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jwk: Option<Jwk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
}

impl JwsProtected {
    fn new_jwk(alg: &str, jwk: Jwk, url: &str, nonce: String) -> Self {
        JwsProtected {
            alg: alg.into(),
            url: url.into(),
            nonce: Some(nonce),
            jwk: Some(jwk),
            ..Default::default()
        }
    }
    fn new_kid(alg: &str, kid: &str, url: &str, nonce: String) -> Self {
        JwsProtected {
            alg: alg.into(),
            url: url.into(),
            nonce: Some(nonce),
            kid: Some(kid.into()),
            ..Default::default()
        }
    }
}

/// Public part of the account key.
///
/// LEXICAL ORDER OF FIELDS MATTER! The serialization doubles as the
/// RFC 7638 thumbprint input, which only holds the required members
/// in sorted order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub(crate) enum Jwk {
    Ec {
        crv: String,
        kty: String,
        x: String,
        y: String,
    },
    Rsa {
        e: String,
        kty: String,
        n: String,
    },
}

impl Jwk {
    /// base64url(SHA-256(canonical JWK)).
    pub fn thumbprint(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(base64url(&sha256(json.as_bytes())))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Jws {
    protected: String,
    payload: String,
    signature: String,
}

/// Signs requests as flattened JWS, binding each one to a fresh nonce.
///
/// Until the account's key id (`kid`) is known, requests carry the full JWK.
#[derive(Debug)]
pub(crate) struct Signer<H: HttpClient> {
    key: AcmeKey,
    kid: RwLock<Option<String>>,
    nonce_pool: Arc<NoncePool<H>>,
}

impl<H: HttpClient> Signer<H> {
    pub fn new(key: AcmeKey, kid: Option<String>, nonce_pool: Arc<NoncePool<H>>) -> Self {
        Signer {
            key,
            kid: RwLock::new(kid),
            nonce_pool,
        }
    }

    #[cfg(test)]
    pub fn key(&self) -> &AcmeKey {
        &self.key
    }

    pub fn kid(&self) -> Option<String> {
        self.kid.read().unwrap().clone()
    }

    pub fn set_kid(&self, kid: &str) {
        *self.kid.write().unwrap() = Some(kid.to_string());
    }

    /// Sign `payload` (JSON text, or `""` for POST-as-GET) for `url`.
    pub fn sign_content(&self, url: &str, payload: &str) -> Result<String> {
        match self.kid() {
            Some(kid) => {
                let nonce = self.nonce_pool.pop()?;
                let protected = JwsProtected::new_kid(self.key.alg(), &kid, url, nonce);
                self.sign(protected, payload)
            }
            None => self.sign_content_jwk(url, payload),
        }
    }

    /// Sign with the embedded JWK. Required for `newAccount`.
    pub fn sign_content_jwk(&self, url: &str, payload: &str) -> Result<String> {
        let jwk = self.key.jwk()?;
        let nonce = self.nonce_pool.pop()?;
        let protected = JwsProtected::new_jwk(self.key.alg(), jwk, url, nonce);
        self.sign(protected, payload)
    }

    fn sign(&self, protected: JwsProtected, payload: &str) -> Result<String> {
        let jws = make_jws(&protected, payload, |data| self.key.sign(data))?;
        Ok(serde_json::to_string(&jws)?)
    }

    /// External account binding: the account JWK signed with the CA
    /// provided HMAC key. Carries no nonce.
    pub fn sign_eab_content(
        &self,
        new_account_url: &str,
        eab_kid: &str,
        hmac_key: &[u8],
    ) -> Result<serde_json::Value> {
        let protected = JwsProtected {
            alg: "HS256".into(),
            url: new_account_url.into(),
            kid: Some(eab_kid.into()),
            ..Default::default()
        };
        let jwk = serde_json::to_string(&self.key.jwk()?)?;
        let hmac = PKey::hmac(hmac_key)?;
        let jws = make_jws(&protected, &jwk, |data| {
            let mut signer = openssl::sign::Signer::new(MessageDigest::sha256(), &hmac)?;
            signer.update(data)?;
            Ok(signer.sign_to_vec()?)
        })?;
        Ok(serde_json::to_value(&jws)?)
    }

    /// `token || "." || thumbprint(account key)`.
    pub fn key_authorization(&self, token: &str) -> Result<String> {
        key_authorization(token, &self.key)
    }
}

fn make_jws<F>(protected: &JwsProtected, payload: &str, sign: F) -> Result<Jws>
where
    F: FnOnce(&[u8]) -> Result<Vec<u8>>,
{
    let protected = {
        let pro_json = serde_json::to_string(protected)?;
        base64url(pro_json.as_bytes())
    };
    // POST-as-GET has an empty payload, not an encoded empty string.
    let payload = if payload.is_empty() {
        "".to_string()
    } else {
        base64url(payload.as_bytes())
    };

    let to_sign = format!("{}.{}", protected, payload);
    let signature = base64url(&sign(to_sign.as_bytes())?);

    Ok(Jws {
        protected,
        payload,
        signature,
    })
}

pub(crate) fn key_authorization(token: &str, key: &AcmeKey) -> Result<String> {
    let thumb = key.jwk()?.thumbprint()?;
    Ok(format!("{}.{}", token, thumb))
}
