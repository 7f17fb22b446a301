use openssl::bn::BigNumContext;
use openssl::ecdsa::EcdsaSig;
use openssl::hash::{hash, MessageDigest};
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, Private};

use crate::jwt::Jwk;
use crate::util::base64url;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAlg {
    Es256,
    Es384,
    Rs256,
}

/// The account private key used to sign every request to the ACME API.
///
/// Supported are EC P-256 (`ES256`), EC P-384 (`ES384`) and RSA (`RS256`).
/// The key is owned by the caller; the engine never generates or persists it.
#[derive(Clone)]
pub struct AcmeKey {
    private_key: PKey<Private>,
    alg: KeyAlg,
}

impl AcmeKey {
    /// Wrap an openssl private key. Fails for key types that have no JWS algorithm.
    pub fn from_pkey(private_key: PKey<Private>) -> Result<Self> {
        let alg = match private_key.id() {
            Id::EC => {
                let ec = private_key.ec_key()?;
                match ec.group().curve_name() {
                    Some(Nid::X9_62_PRIME256V1) => KeyAlg::Es256,
                    Some(Nid::SECP384R1) => KeyAlg::Es384,
                    other => {
                        return Err(Error::UnsupportedKey(format!("EC curve {:?}", other)));
                    }
                }
            }
            Id::RSA => KeyAlg::Rs256,
            other => return Err(Error::UnsupportedKey(format!("key type {:?}", other))),
        };
        Ok(AcmeKey { private_key, alg })
    }

    /// Read a PEM encoded private key (PKCS#8, SEC1 or PKCS#1).
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let private_key = PKey::private_key_from_pem(pem)?;
        Self::from_pkey(private_key)
    }

    pub fn to_pem(&self) -> Result<String> {
        let pem = self.private_key.private_key_to_pem_pkcs8()?;
        Ok(String::from_utf8_lossy(&pem).into_owned())
    }

    #[cfg(test)]
    pub(crate) fn private_key(&self) -> &PKey<Private> {
        &self.private_key
    }

    /// JWS `alg` header value.
    pub(crate) fn alg(&self) -> &'static str {
        match self.alg {
            KeyAlg::Es256 => "ES256",
            KeyAlg::Es384 => "ES384",
            KeyAlg::Rs256 => "RS256",
        }
    }

    /// Byte length of one EC coordinate / signature half.
    fn ec_len(&self) -> i32 {
        match self.alg {
            KeyAlg::Es384 => 48,
            _ => 32,
        }
    }

    pub(crate) fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.alg {
            KeyAlg::Es256 | KeyAlg::Es384 => {
                let md = if self.alg == KeyAlg::Es256 {
                    MessageDigest::sha256()
                } else {
                    MessageDigest::sha384()
                };
                let digest = hash(md, data)?;
                let sig = EcdsaSig::sign(&digest, &*self.private_key.ec_key()?)?;
                // JWS wants fixed width r || s, not DER.
                let mut v = sig.r().to_vec_padded(self.ec_len())?;
                v.extend_from_slice(&sig.s().to_vec_padded(self.ec_len())?);
                Ok(v)
            }
            KeyAlg::Rs256 => {
                let mut signer = openssl::sign::Signer::new(MessageDigest::sha256(), &self.private_key)?;
                signer.update(data)?;
                Ok(signer.sign_to_vec()?)
            }
        }
    }

    pub(crate) fn jwk(&self) -> Result<Jwk> {
        match self.alg {
            KeyAlg::Es256 | KeyAlg::Es384 => {
                let ec = self.private_key.ec_key()?;
                let mut ctx = BigNumContext::new()?;
                let mut x = openssl::bn::BigNum::new()?;
                let mut y = openssl::bn::BigNum::new()?;
                ec.public_key()
                    .affine_coordinates_gfp(ec.group(), &mut x, &mut y, &mut ctx)?;
                let crv = if self.alg == KeyAlg::Es256 { "P-256" } else { "P-384" };
                Ok(Jwk::Ec {
                    crv: crv.into(),
                    kty: "EC".into(),
                    x: base64url(&x.to_vec_padded(self.ec_len())?),
                    y: base64url(&y.to_vec_padded(self.ec_len())?),
                })
            }
            KeyAlg::Rs256 => {
                let rsa = self.private_key.rsa()?;
                Ok(Jwk::Rsa {
                    e: base64url(&rsa.e().to_vec()),
                    kty: "RSA".into(),
                    n: base64url(&rsa.n().to_vec()),
                })
            }
        }
    }
}

impl std::fmt::Debug for AcmeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "AcmeKey({})", self.alg())
    }
}
