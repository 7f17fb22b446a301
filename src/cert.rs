use openssl::asn1::Asn1Time;
use openssl::ec::{Asn1Flag, EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{self, PKey};
use openssl::rsa::Rsa;
use openssl::stack::Stack;
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509NameBuilder, X509Req, X509ReqBuilder, X509};

use crate::api::ApiRevocation;
use crate::dir::Directory;
use crate::req::HttpClient;
use crate::util::base64url;
use crate::{Error, Result};

fn ec_group(nid: Nid) -> Result<EcGroup> {
    let mut g = EcGroup::from_curve_name(nid)?;
    // this is required for openssl 1.0.x (but not 1.1.x)
    g.set_asn1_flag(Asn1Flag::NAMED_CURVE);
    Ok(g)
}

/// Make an RSA private key (from which we can derive a public key).
///
/// This library does not check the number of bits used to create the key pair.
/// For Let's Encrypt, the bits must be between 2048 and 4096.
pub fn create_rsa_key(bits: u32) -> Result<PKey<pkey::Private>> {
    let pri_key_rsa = Rsa::generate(bits)?;
    Ok(PKey::from_rsa(pri_key_rsa)?)
}

/// Make a P-256 private key (from which we can derive a public key).
pub fn create_p256_key() -> Result<PKey<pkey::Private>> {
    let group = ec_group(Nid::X9_62_PRIME256V1)?;
    let pri_key_ec = EcKey::generate(&group)?;
    Ok(PKey::from_ec_key(pri_key_ec)?)
}

/// Make a P-384 private key pair (from which we can derive a public key).
pub fn create_p384_key() -> Result<PKey<pkey::Private>> {
    let group = ec_group(Nid::SECP384R1)?;
    let pri_key_ec = EcKey::generate(&group)?;
    Ok(PKey::from_ec_key(pri_key_ec)?)
}

/// CSR with every domain as a DNS SAN. The first domain also becomes the
/// subject CN when it fits (64 characters).
pub(crate) fn create_csr(pkey: &PKey<pkey::Private>, domains: &[&str]) -> Result<X509Req> {
    if domains.is_empty() {
        return Err(Error::Config("a CSR needs at least one domain".into()));
    }

    let mut req_bld = X509ReqBuilder::new()?;
    req_bld.set_pubkey(pkey)?;

    if domains[0].len() <= 64 {
        let mut name = X509NameBuilder::new()?;
        name.append_entry_by_nid(Nid::COMMONNAME, domains[0])?;
        req_bld.set_subject_name(&name.build())?;
    }

    // set all domains as alt names
    let mut stack = Stack::new()?;
    let ctx = req_bld.x509v3_context(None);
    let mut an = SubjectAlternativeName::new();
    for domain in domains {
        an.dns(domain);
    }
    let ext = an.build(&ctx)?;
    stack.push(ext)?;
    req_bld.add_extensions(&stack)?;

    req_bld.sign(pkey, MessageDigest::sha256())?;

    Ok(req_bld.build())
}

/// An issued certificate as downloaded from the CA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
    /// PEM. The leaf only, or the leaf followed by the issuers when bundled.
    pub certificate: String,
    /// PEM of the issuer chain, without the leaf.
    pub issuer: String,
}

/// Downloading and revoking certificates.
#[derive(Debug)]
pub struct CertificateService<'a, H: HttpClient> {
    dir: &'a Directory<H>,
}

impl<'a, H: HttpClient> CertificateService<'a, H> {
    pub(crate) fn new(dir: &'a Directory<H>) -> Self {
        CertificateService { dir }
    }

    /// Download the `application/pem-certificate-chain` at `url`.
    ///
    /// With `bundle` the full chain is kept in `certificate`, otherwise only
    /// the leaf.
    pub fn get(&self, url: &str, bundle: bool) -> Result<CertificateChain> {
        let res = self.dir.transport().post_as_get(url)?;
        let pem = res.into_body();

        let certs = X509::stack_from_pem(pem.as_bytes())?;
        let (leaf, issuers) = certs
            .split_first()
            .ok_or_else(|| Error::Other(format!("no certificate in response from {}", url)))?;

        let mut issuer = String::new();
        for cert in issuers {
            issuer.push_str(&String::from_utf8_lossy(&cert.to_pem()?));
        }
        let certificate = if bundle {
            pem
        } else {
            String::from_utf8_lossy(&leaf.to_pem()?).into_owned()
        };

        Ok(CertificateChain { certificate, issuer })
    }

    /// Revoke a DER encoded certificate, optionally with an RFC 5280 reason code.
    pub fn revoke(&self, cert_der: &[u8], reason: Option<usize>) -> Result<()> {
        let url = &self.dir.api_directory().revokeCert;
        if url.is_empty() {
            return Err(Error::Config("directory has no revokeCert URL".into()));
        }
        let revocation = ApiRevocation {
            certificate: base64url(cert_der),
            reason,
        };
        self.dir.transport().post(url, &revocation)?;
        Ok(())
    }
}

/// The outcome of a successful issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateResource {
    /// First domain of the order.
    pub domain: String,
    pub cert_url: String,
    /// PEM (PKCS#8) of the certificate key.
    pub private_key: String,
    /// PEM, bundled with the issuers unless turned off.
    pub certificate: String,
    /// PEM of the issuer chain.
    pub issuer_certificate: String,
    /// PEM of the CSR that was finalized.
    pub csr: String,
}

impl CertificateResource {
    /// The private key as DER.
    pub fn private_key_der(&self) -> Result<Vec<u8>> {
        let pkey = PKey::private_key_from_pem(self.private_key.as_bytes())?;
        Ok(pkey.private_key_to_der()?)
    }

    /// The leaf certificate as DER.
    pub fn certificate_der(&self) -> Result<Vec<u8>> {
        let x509 = X509::from_pem(self.certificate.as_bytes())?;
        Ok(x509.to_der()?)
    }

    /// Inspect the certificate to count the number of (whole) valid days left.
    ///
    /// It's up to the CA to decide how long an issued certificate is valid.
    /// Let's Encrypt sets the validity to 90 days. This function reports 89 days
    /// for a newly issued cert, since it counts _whole_ days.
    ///
    /// It is possible to get negative days for an expired certificate.
    pub fn valid_days_left(&self) -> Result<i64> {
        let x509 = X509::from_pem(self.certificate.as_bytes())?;
        let now = Asn1Time::days_from_now(0)?;
        let diff = now.diff(x509.not_after())?;
        Ok(diff.days as i64)
    }
}
