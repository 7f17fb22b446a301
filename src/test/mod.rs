//! In-process mock CA, mock DNS and a recording challenge provider.
#![allow(clippy::trivial_regex)]

use hickory_client::op::{Message, MessageType, ResponseCode};
use hickory_client::rr::rdata::{A, AAAA, CNAME, NS, SOA, TXT};
use hickory_client::rr::{Name, RData, Record, RecordType};
use lazy_static::lazy_static;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::acc::AcmeKey;
use crate::api::BAD_NONCE;
use crate::cert::create_p256_key;
use crate::challenge::dns01::{get_record, to_fqdn, DnsExchange};
use crate::challenge::Provider;
use crate::clock::ManualClock;
use crate::config::RetryPolicy;
use crate::dir::{Directory, DirectoryUrl};
use crate::req::{HttpClient, HttpResponse};
use crate::util::base64url_decode;
use crate::{Error, Result};

lazy_static! {
    static ref RE_URL: regex::Regex = regex::Regex::new("<URL>").unwrap();
}

const BASE: &str = "http://ca.test";

const DIRECTORY: &str = r#"{
    "keyChange": "<URL>/acme/key-change",
    "newAccount": "<URL>/acme/new-acct",
    "newNonce": "<URL>/acme/new-nonce",
    "newOrder": "<URL>/acme/new-order",
    "revokeCert": "<URL>/acme/revoke-cert",
    "meta": {
        "caaIdentities": [
        "testdir.org"
        ]
    }
}"#;

const ACCOUNT: &str = r#"{
    "id": 7728515,
    "initialIp": "90.171.37.12",
    "createdAt": "2018-12-31T17:15:40.399104457Z",
    "status": "valid"
}"#;

pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct CaState {
    directory: String,
    nonce_counter: u64,
    nonce_fetches: usize,
    seen_nonces: Vec<String>,
    bad_nonce: usize,
    last_payload: HashMap<String, Value>,
    last_protected: HashMap<String, Value>,
    order_domains: Vec<String>,
    order_status: Option<String>,
    finalized: bool,
    // domain -> authorization status
    authz: HashMap<String, String>,
    // domain -> status after the challenge is posted
    outcomes: HashMap<String, String>,
    retry_after: Option<u64>,
    deactivated: Vec<String>,
    chain: Option<String>,
}

impl CaState {
    fn next_nonce(&mut self) -> String {
        self.nonce_counter += 1;
        format!("nonce-{:08}", self.nonce_counter)
    }

    fn authz_status(&self, domain: &str) -> &str {
        self.authz.get(domain).map(|s| s.as_str()).unwrap_or("pending")
    }

    fn derived_order_status(&self) -> String {
        if let Some(status) = &self.order_status {
            return status.clone();
        }
        if self.finalized {
            return "valid".into();
        }
        let statuses: Vec<&str> = self.order_domains.iter().map(|d| self.authz_status(d)).collect();
        if statuses.iter().any(|s| *s == "invalid" || *s == "deactivated") {
            "invalid".into()
        } else if statuses.iter().all(|s| *s == "valid") {
            "ready".into()
        } else {
            "pending".into()
        }
    }

    fn order_json(&self, status: &str) -> Value {
        let mut order = json!({
            "status": status,
            "expires": "2019-01-09T08:26:43.570360537Z",
            "identifiers": self.order_domains.iter()
                .map(|d| json!({"type": "dns", "value": d}))
                .collect::<Vec<_>>(),
            "authorizations": self.order_domains.iter()
                .map(|d| format!("{}/acme/authz/{}", BASE, d))
                .collect::<Vec<_>>(),
            "finalize": format!("{}/acme/finalize/1", BASE),
        });
        if status == "valid" {
            order["certificate"] = json!(format!("{}/acme/cert/1", BASE));
        }
        order
    }

    fn challenge_json(&self, domain: &str, kind: &str, status: &str) -> Value {
        let mut chall = json!({
            "type": kind,
            "status": status,
            "url": format!("{}/acme/chall/{}/{}", BASE, domain, kind),
            "token": "token",
        });
        if status == "invalid" {
            chall["error"] = json!({
                "type": "urn:ietf:params:acme:error:unauthorized",
                "detail": format!("Incorrect TXT record found at _acme-challenge.{}", domain),
                "status": 403,
            });
        }
        chall
    }

    fn authz_json(&self, domain: &str) -> Value {
        let status = self.authz_status(domain);
        let (value, wildcard) = match domain.strip_prefix("*.") {
            Some(base) => (base, true),
            None => (domain, false),
        };
        let kinds: &[&str] = if wildcard {
            &["dns-01"]
        } else {
            &["http-01", "tls-alpn-01", "dns-01"]
        };
        let chall_status = match status {
            "valid" | "invalid" => status,
            _ => "pending",
        };
        json!({
            "identifier": {"type": "dns", "value": value},
            "status": status,
            "expires": "2019-01-09T08:26:43Z",
            "wildcard": wildcard,
            "challenges": kinds.iter()
                .map(|k| self.challenge_json(domain, k, chall_status))
                .collect::<Vec<_>>(),
        })
    }
}

/// A CA answering through [`TestClient`] without any network.
#[derive(Clone)]
pub struct TestCa {
    inner: Arc<Mutex<CaState>>,
    clock: ManualClock,
}

impl TestCa {
    pub fn new() -> Self {
        init_log();
        let state = CaState {
            directory: DIRECTORY.to_string(),
            nonce_counter: 0,
            nonce_fetches: 0,
            seen_nonces: vec![],
            bad_nonce: 0,
            last_payload: HashMap::new(),
            last_protected: HashMap::new(),
            order_domains: vec!["acmetest.example.com".to_string()],
            order_status: None,
            finalized: false,
            authz: HashMap::new(),
            outcomes: HashMap::new(),
            retry_after: None,
            deactivated: vec![],
            chain: None,
        };
        TestCa {
            inner: Arc::new(Mutex::new(state)),
            clock: ManualClock::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", BASE, path)
    }

    pub fn client(&self) -> TestClient {
        TestClient {
            inner: self.inner.clone(),
        }
    }

    /// The virtual clock handed to directories made by this CA.
    pub fn clock(&self) -> ManualClock {
        self.clock.clone()
    }

    /// A directory with a fresh P-256 account key.
    pub fn directory(&self, kid: Option<&str>) -> Result<Directory<TestClient>> {
        let key = AcmeKey::from_pkey(create_p256_key()?)?;
        let url = self.url("/directory");
        Directory::from_url_with(
            self.client(),
            DirectoryUrl::Other(&url),
            key,
            kid.map(|k| k.to_string()),
            RetryPolicy::default(),
            Arc::new(self.clock.clone()),
        )
    }

    /// A directory with a registered account.
    pub fn account_directory(&self) -> Result<Directory<TestClient>> {
        let dir = self.directory(None)?;
        dir.accounts().new_account(&["mailto:foo@bar.com".to_string()], true)?;
        Ok(dir)
    }

    /// Replace the directory document. `<URL>` is the CA base URL.
    pub fn set_directory(&self, json: &str) {
        self.inner.lock().unwrap().directory = json.to_string();
    }

    /// Answer the next `n` signed requests with `badNonce`.
    pub fn fail_bad_nonce(&self, n: usize) {
        self.inner.lock().unwrap().bad_nonce = n;
    }

    /// Fixed order status instead of the one derived from the authorizations.
    pub fn set_order_status(&self, status: &str) {
        self.inner.lock().unwrap().order_status = Some(status.to_string());
    }

    pub fn set_authz_status(&self, domain: &str, status: &str) {
        let mut st = self.inner.lock().unwrap();
        st.authz.insert(domain.to_string(), status.to_string());
    }

    /// Status the authorization moves to once its challenge is posted.
    /// Defaults to `valid`.
    pub fn set_authz_outcome(&self, domain: &str, status: &str) {
        let mut st = self.inner.lock().unwrap();
        st.outcomes.insert(domain.to_string(), status.to_string());
    }

    pub fn set_retry_after(&self, secs: u64) {
        self.inner.lock().unwrap().retry_after = Some(secs);
    }

    pub fn nonce_fetches(&self) -> usize {
        self.inner.lock().unwrap().nonce_fetches
    }

    /// Nonces of all signed requests, in order received.
    pub fn seen_nonces(&self) -> Vec<String> {
        self.inner.lock().unwrap().seen_nonces.clone()
    }

    pub fn last_payload(&self, path: &str) -> Option<Value> {
        self.inner.lock().unwrap().last_payload.get(path).cloned()
    }

    pub fn last_protected(&self, path: &str) -> Option<Value> {
        self.inner.lock().unwrap().last_protected.get(path).cloned()
    }

    /// Domains whose authorization was deactivated.
    pub fn deactivated(&self) -> Vec<String> {
        self.inner.lock().unwrap().deactivated.clone()
    }
}

#[derive(Clone)]
pub struct TestClient {
    inner: Arc<Mutex<CaState>>,
}

impl TestClient {
    fn path(url: &str) -> &str {
        url.strip_prefix(BASE).unwrap_or("")
    }

    fn respond(st: &mut CaState, res: HttpResponse) -> HttpResponse {
        let nonce = st.next_nonce();
        res.with_header("Replay-Nonce", nonce)
    }

    fn route(st: &mut CaState, path: &str, payload: &Value) -> HttpResponse {
        if path == "/acme/new-acct" {
            let mut acc: Value = serde_json::from_str(ACCOUNT).unwrap();
            acc["contact"] = payload.get("contact").cloned().unwrap_or_else(|| json!([]));
            return HttpResponse::new(201, acc.to_string())
                .with_header("Location", format!("{}/acme/acct/7728515", BASE));
        }

        if path == "/acme/acct/7728515" {
            let mut acc: Value = serde_json::from_str(ACCOUNT).unwrap();
            if payload["status"] == "deactivated" {
                acc["status"] = json!("deactivated");
            }
            if let Some(contact) = payload.get("contact") {
                acc["contact"] = contact.clone();
            }
            return HttpResponse::new(200, acc.to_string());
        }

        if path == "/acme/new-order" {
            let domains: Vec<String> = payload["identifiers"]
                .as_array()
                .map(|ids| {
                    ids.iter()
                        .filter_map(|i| i["value"].as_str().map(|v| v.to_string()))
                        .collect()
                })
                .unwrap_or_default();
            if domains.iter().any(|d| d == "rejected.example.com") {
                return problem(
                    400,
                    "urn:ietf:params:acme:error:rejectedIdentifier",
                    "Error creating new order :: Cannot issue for \"rejected.example.com\"",
                );
            }
            st.order_domains = domains;
            st.finalized = false;
            st.chain = None;
            let status = st.derived_order_status();
            let body = st.order_json(&status).to_string();
            return HttpResponse::new(201, body).with_header("Location", format!("{}/acme/order/1", BASE));
        }

        if path == "/acme/order/1" {
            let status = st.derived_order_status();
            return HttpResponse::new(200, st.order_json(&status).to_string());
        }

        if let Some(domain) = path.strip_prefix("/acme/authz/") {
            if payload["status"] == "deactivated" {
                st.authz.insert(domain.to_string(), "deactivated".into());
                st.deactivated.push(domain.to_string());
            }
            let res = HttpResponse::new(200, st.authz_json(domain).to_string());
            return match st.retry_after {
                Some(secs) => res.with_header("Retry-After", secs.to_string()),
                None => res,
            };
        }

        if let Some(rest) = path.strip_prefix("/acme/chall/") {
            let (domain, kind) = match rest.rsplit_once('/') {
                Some(v) => v,
                None => return HttpResponse::new(404, "no such challenge"),
            };
            if payload.is_object() {
                // ready: validation happens at once
                let outcome = st.outcomes.get(domain).cloned().unwrap_or_else(|| "valid".into());
                st.authz.insert(domain.to_string(), outcome);
                let body = st.challenge_json(domain, kind, "processing").to_string();
                return HttpResponse::new(200, body)
                    .with_header("Link", format!("<{}/acme/authz/{}>;rel=\"up\"", BASE, domain));
            }
            let status = match st.authz_status(domain) {
                s @ ("valid" | "invalid") => s.to_string(),
                _ => "pending".to_string(),
            };
            return HttpResponse::new(200, st.challenge_json(domain, kind, &status).to_string());
        }

        if path == "/acme/finalize/1" {
            st.finalized = true;
            return HttpResponse::new(200, st.order_json("processing").to_string());
        }

        if path == "/acme/cert/1" {
            if st.chain.is_none() {
                let domains: Vec<&str> = st.order_domains.iter().map(|d| d.as_str()).collect();
                let (chain, _) = certificate_chain(&domains, 90).unwrap();
                st.chain = Some(chain);
            }
            let chain = st.chain.clone().unwrap_or_default();
            return HttpResponse::new(200, chain)
                .with_header("Content-Type", "application/pem-certificate-chain");
        }

        if path == "/acme/revoke-cert" {
            return HttpResponse::new(200, "");
        }

        if path == "/acme/unauthorized" {
            return problem(
                403,
                "urn:ietf:params:acme:error:unauthorized",
                "Account is not authorized",
            );
        }

        HttpResponse::new(404, "not found")
    }
}

fn problem(status: u16, _type: &str, detail: &str) -> HttpResponse {
    let body = json!({"type": _type, "detail": detail, "status": status});
    HttpResponse::new(status, body.to_string()).with_header("Content-Type", "application/problem+json")
}

fn decode_part(part: &Value) -> Value {
    match part.as_str() {
        Some("") | None => Value::Null,
        Some(s) => base64url_decode(s)
            .ok()
            .and_then(|b| serde_json::from_slice(&b).ok())
            .unwrap_or(Value::Null),
    }
}

impl HttpClient for TestClient {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        let st = self.inner.lock().unwrap();
        if Self::path(url) == "/directory" {
            let body = RE_URL.replace_all(&st.directory, BASE).into_owned();
            return Ok(HttpResponse::new(200, body).with_header("Content-Type", "application/json"));
        }
        Ok(HttpResponse::new(404, "not found"))
    }

    fn head(&self, url: &str) -> Result<HttpResponse> {
        let mut st = self.inner.lock().unwrap();
        if Self::path(url) == "/acme/new-nonce" {
            st.nonce_fetches += 1;
            return Ok(Self::respond(&mut st, HttpResponse::new(200, "")));
        }
        Ok(HttpResponse::new(404, ""))
    }

    fn post(&self, url: &str, body: &str) -> Result<HttpResponse> {
        let mut st = self.inner.lock().unwrap();
        let jws: Value = match serde_json::from_str(body) {
            Ok(jws) => jws,
            Err(_) => {
                let res = problem(400, "urn:ietf:params:acme:error:malformed", "not a JWS");
                return Ok(Self::respond(&mut st, res));
            }
        };
        let protected = decode_part(&jws["protected"]);
        let payload = decode_part(&jws["payload"]);
        if let Some(nonce) = protected["nonce"].as_str() {
            st.seen_nonces.push(nonce.to_string());
        }

        if st.bad_nonce > 0 {
            st.bad_nonce -= 1;
            let res = problem(400, BAD_NONCE, "JWS has an invalid anti-replay nonce");
            return Ok(Self::respond(&mut st, res));
        }

        let path = Self::path(url).to_string();
        st.last_protected.insert(path.clone(), protected);
        st.last_payload.insert(path.clone(), payload.clone());
        let res = Self::route(&mut st, &path, &payload);
        Ok(Self::respond(&mut st, res))
    }
}

/// A leaf for `domains` valid for `days`, followed by its issuer. Returns
/// the PEM chain and the leaf key.
pub fn certificate_chain(domains: &[&str], days: u32) -> Result<(String, PKey<Private>)> {
    let ca_key = create_p256_key()?;
    let ca = build_cert(&ca_key, &ca_key, None, "Test Issuer", &[], days + 365, 1)?;
    let leaf_key = create_p256_key()?;
    let leaf = build_cert(&leaf_key, &ca_key, Some(&ca), domains[0], domains, days, 2)?;

    let mut pem = String::from_utf8_lossy(&leaf.to_pem()?).into_owned();
    pem.push_str(&String::from_utf8_lossy(&ca.to_pem()?));
    Ok((pem, leaf_key))
}

fn build_cert(
    key: &PKey<Private>,
    signer: &PKey<Private>,
    issuer: Option<&X509>,
    cn: &str,
    sans: &[&str],
    days: u32,
    serial: u32,
) -> Result<X509> {
    let mut name = X509NameBuilder::new()?;
    name.append_entry_by_nid(Nid::COMMONNAME, cn)?;
    let name = name.build();

    let mut bld = X509Builder::new()?;
    bld.set_version(2)?;
    let serial = BigNum::from_u32(serial)?.to_asn1_integer()?;
    bld.set_serial_number(&serial)?;
    bld.set_subject_name(&name)?;
    match issuer {
        Some(issuer) => bld.set_issuer_name(issuer.subject_name())?,
        None => bld.set_issuer_name(&name)?,
    }
    bld.set_pubkey(key)?;
    // Like Let's Encrypt, the validity ends one second short of the full days.
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::Other(e.to_string()))?
        .as_secs() as i64;
    let not_before = Asn1Time::from_unix(now as _)?;
    let not_after = Asn1Time::from_unix((now + i64::from(days) * 86_400 - 1) as _)?;
    bld.set_not_before(&not_before)?;
    bld.set_not_after(&not_after)?;

    if !sans.is_empty() {
        let mut an = SubjectAlternativeName::new();
        for san in sans {
            an.dns(san);
        }
        let ext = an.build(&bld.x509v3_context(issuer.map(|i| &**i), None))?;
        bld.append_extension(ext)?;
    }

    bld.sign(signer, MessageDigest::sha256())?;
    Ok(bld.build())
}

#[derive(Debug, Default)]
struct DnsState {
    // zone -> nameserver hosts
    zones: HashMap<String, Vec<String>>,
    glue: HashSet<String>,
    hosts: HashMap<String, IpAddr>,
    cnames: HashMap<String, String>,
    // (server, fqdn) -> (value, queries to answer NXDOMAIN first)
    txt: HashMap<(IpAddr, String), (String, usize)>,
    txt_queries: HashMap<IpAddr, usize>,
    fail_next: usize,
    queries: usize,
}

/// Serves a toy DNS: every server knows every zone, TXT records are per
/// server.
#[derive(Debug, Default)]
pub struct MockDns {
    inner: Mutex<DnsState>,
}

fn norm(name: &str) -> String {
    to_fqdn(name).to_ascii_lowercase()
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn name(s: &str) -> Name {
    Name::from_ascii(s).unwrap()
}

impl MockDns {
    pub fn new() -> Self {
        MockDns::default()
    }

    fn zone(&self, zone: &str, nameservers: &[(&str, &str)], glue: bool) {
        let mut st = self.inner.lock().unwrap();
        let zone = norm(zone);
        let mut hosts = vec![];
        for (host, addr) in nameservers {
            hosts.push(norm(host));
            st.hosts.insert(norm(host), ip(addr));
        }
        if glue {
            st.glue.insert(zone.clone());
        }
        st.zones.insert(zone, hosts);
    }

    /// A zone whose NS answer carries the addresses in the additional section.
    pub fn add_zone(&self, zone: &str, nameservers: &[(&str, &str)]) {
        self.zone(zone, nameservers, true);
    }

    /// A zone whose nameserver addresses need their own A/AAAA lookup.
    pub fn add_zone_without_glue(&self, zone: &str, nameservers: &[(&str, &str)]) {
        self.zone(zone, nameservers, false);
    }

    pub fn add_cname(&self, from: &str, to: &str) {
        self.inner.lock().unwrap().cnames.insert(norm(from), norm(to));
    }

    pub fn set_txt(&self, server: &str, fqdn: &str, value: &str) {
        self.set_txt_after(server, fqdn, value, 0);
    }

    /// The record shows up on `server` after `hidden` TXT queries to it.
    pub fn set_txt_after(&self, server: &str, fqdn: &str, value: &str, hidden: usize) {
        let mut st = self.inner.lock().unwrap();
        st.txt.insert((ip(server), norm(fqdn)), (value.to_string(), hidden));
    }

    pub fn remove_txt(&self, server: &str, fqdn: &str) {
        self.inner.lock().unwrap().txt.remove(&(ip(server), norm(fqdn)));
    }

    /// Answer SERVFAIL to the next `n` queries.
    pub fn fail_next(&self, n: usize) {
        self.inner.lock().unwrap().fail_next = n;
    }

    pub fn query_count(&self) -> usize {
        self.inner.lock().unwrap().queries
    }

    pub fn txt_queries(&self, server: &str) -> usize {
        let st = self.inner.lock().unwrap();
        st.txt_queries.get(&ip(server)).copied().unwrap_or(0)
    }
}

fn address_record(host: &str, addr: IpAddr) -> Record {
    let rdata = match addr {
        IpAddr::V4(v4) => RData::A(A(v4)),
        IpAddr::V6(v6) => RData::AAAA(AAAA(v6)),
    };
    Record::from_rdata(name(host), 300, rdata)
}

impl DnsExchange for MockDns {
    fn exchange(&self, server: SocketAddr, qname: &Name, rtype: RecordType) -> Result<Message> {
        let mut st = self.inner.lock().unwrap();
        st.queries += 1;

        let mut msg = Message::new();
        msg.set_message_type(MessageType::Response);
        if st.fail_next > 0 {
            st.fail_next -= 1;
            msg.set_response_code(ResponseCode::ServFail);
            return Ok(msg);
        }

        let q = norm(&qname.to_ascii());
        let mut found = true;
        match rtype {
            RecordType::SOA => {
                if st.zones.contains_key(&q) {
                    let soa = SOA::new(
                        name(&format!("ns.{}", q)),
                        name(&format!("hostmaster.{}", q)),
                        1,
                        3600,
                        600,
                        86400,
                        300,
                    );
                    msg.add_answer(Record::from_rdata(name(&q), 300, RData::SOA(soa)));
                } else if let Some(target) = st.cnames.get(&q) {
                    msg.add_answer(Record::from_rdata(name(&q), 300, RData::CNAME(CNAME(name(target)))));
                } else {
                    found = false;
                }
            }
            RecordType::NS => match st.zones.get(&q) {
                Some(hosts) => {
                    for host in hosts {
                        msg.add_answer(Record::from_rdata(name(&q), 300, RData::NS(NS(name(host)))));
                        if st.glue.contains(&q) {
                            if let Some(addr) = st.hosts.get(host) {
                                msg.add_additional(address_record(host, *addr));
                            }
                        }
                    }
                }
                None => found = false,
            },
            RecordType::A | RecordType::AAAA => match st.hosts.get(&q) {
                Some(addr) => {
                    if addr.is_ipv4() == (rtype == RecordType::A) {
                        msg.add_answer(address_record(&q, *addr));
                    }
                }
                None => found = false,
            },
            RecordType::CNAME => match st.cnames.get(&q) {
                Some(target) => {
                    msg.add_answer(Record::from_rdata(name(&q), 300, RData::CNAME(CNAME(name(target)))));
                }
                None => found = false,
            },
            RecordType::TXT => {
                *st.txt_queries.entry(server.ip()).or_insert(0) += 1;
                match st.txt.get_mut(&(server.ip(), q.clone())) {
                    Some((_, hidden)) if *hidden > 0 => {
                        *hidden -= 1;
                        found = false;
                    }
                    Some((value, _)) => {
                        let txt = TXT::new(vec![value.clone()]);
                        msg.add_answer(Record::from_rdata(name(&q), 300, RData::TXT(txt)));
                    }
                    None => found = false,
                }
            }
            _ => return Err(Error::Dns(format!("mock can't answer {}", rtype))),
        }

        if !found {
            msg.set_response_code(ResponseCode::NXDomain);
        }
        Ok(msg)
    }
}

/// Records every call. Optionally publishes the DNS-01 record on the given
/// mock servers.
#[derive(Default)]
pub struct RecordingProvider {
    presented: Mutex<Vec<(String, String, String)>>,
    cleaned_up: Mutex<Vec<(String, String, String)>>,
    failing: Mutex<HashSet<String>>,
    withheld: Mutex<HashSet<String>>,
    dns: Option<(Arc<MockDns>, Vec<String>)>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        RecordingProvider::default()
    }

    pub fn with_dns(dns: Arc<MockDns>, servers: &[&str]) -> Self {
        RecordingProvider {
            dns: Some((dns, servers.iter().map(|s| s.to_string()).collect())),
            ..Default::default()
        }
    }

    pub fn fail_present_for(&self, domain: &str) {
        self.failing.lock().unwrap().insert(domain.to_string());
    }

    /// Accept `present` for the domain but never publish its record.
    pub fn withhold(&self, domain: &str) {
        self.withheld.lock().unwrap().insert(domain.to_string());
    }

    pub fn presented(&self) -> Vec<(String, String, String)> {
        self.presented.lock().unwrap().clone()
    }

    pub fn cleaned_up(&self) -> Vec<(String, String, String)> {
        self.cleaned_up.lock().unwrap().clone()
    }
}

impl Provider for RecordingProvider {
    fn present(&self, domain: &str, token: &str, key_auth: &str) -> Result<()> {
        let call = (domain.to_string(), token.to_string(), key_auth.to_string());
        self.presented.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(domain) {
            return Err(Error::Other(format!("registrar refused record for {}", domain)));
        }
        if self.withheld.lock().unwrap().contains(domain) {
            return Ok(());
        }
        if let Some((dns, servers)) = &self.dns {
            let (fqdn, value) = get_record(domain, key_auth);
            for server in servers {
                dns.set_txt(server, &fqdn, &value);
            }
        }
        Ok(())
    }

    fn clean_up(&self, domain: &str, token: &str, key_auth: &str) -> Result<()> {
        let call = (domain.to_string(), token.to_string(), key_auth.to_string());
        self.cleaned_up.lock().unwrap().push(call);
        if let Some((dns, servers)) = &self.dns {
            let (fqdn, _) = get_record(domain, key_auth);
            for server in servers {
                dns.remove_txt(server, &fqdn);
            }
        }
        Ok(())
    }
}

#[test]
fn test_make_directory() {
    let ca = TestCa::new();
    let res = ca.client().get(&ca.url("/directory")).unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.body().contains("http://ca.test/acme/new-order"));
}
