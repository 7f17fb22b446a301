use hickory_client::op::{Message, ResponseCode};
use hickory_client::rr::{Name, RData, Record, RecordType};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::exchange::DnsExchange;
use super::{base_domain, to_fqdn};
use crate::clock::{Cancel, Clock};
use crate::{Error, Result};

const MAX_CNAME_HOPS: usize = 50;
const LOOKUP_BACKOFF: Duration = Duration::from_millis(500);

/// Lookups through the recursive resolvers: zone apex, authoritative
/// nameservers and CNAME chains.
#[derive(Debug)]
pub(crate) struct ZoneResolver {
    exchange: Arc<dyn DnsExchange>,
    recursive: Vec<SocketAddr>,
    attempts: u32,
    clock: Arc<dyn Clock>,
    // fqdn -> zone apex
    zones: Mutex<HashMap<String, Name>>,
}

impl ZoneResolver {
    pub fn new(
        exchange: Arc<dyn DnsExchange>,
        recursive: Vec<SocketAddr>,
        attempts: u32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        ZoneResolver {
            exchange,
            recursive,
            attempts: attempts.max(1),
            clock,
            zones: Mutex::new(HashMap::new()),
        }
    }

    /// Ask the resolvers in order. The first answer carrying records wins,
    /// otherwise the last response is returned.
    fn query_once(&self, name: &Name, rtype: RecordType) -> Result<Message> {
        let mut last = None;
        for server in &self.recursive {
            match self.exchange.exchange(*server, name, rtype) {
                Ok(msg)
                    if msg.response_code() == ResponseCode::NoError && !msg.answers().is_empty() =>
                {
                    return Ok(msg);
                }
                r => last = Some(r),
            }
        }
        last.unwrap_or_else(|| Err(Error::Dns("no recursive nameservers configured".into())))
    }

    /// `query_once`, retried with backoff while no resolver answers or they
    /// answer SERVFAIL.
    fn query(&self, name: &Name, rtype: RecordType, cancel: &Cancel) -> Result<Message> {
        let mut wait = LOOKUP_BACKOFF;
        let mut attempt = 1;
        loop {
            let res = self.query_once(name, rtype);
            let transient = match &res {
                Ok(msg) => msg.response_code() == ResponseCode::ServFail,
                Err(_) => true,
            };
            if !transient || attempt >= self.attempts {
                return res;
            }
            debug!("Lookup {} {} failed (attempt {}), retrying", name, rtype, attempt);
            if !self.clock.sleep(wait, cancel) {
                return Err(Error::Cancelled);
            }
            wait *= 2;
            attempt += 1;
        }
    }

    /// Walk up from `fqdn` until a resolver hands out an SOA. The owner of
    /// that SOA is the zone apex.
    pub fn find_zone(&self, fqdn: &str, cancel: &Cancel) -> Result<Name> {
        let fqdn = to_fqdn(base_domain(fqdn)).to_ascii_lowercase();
        if let Some(zone) = self.zones.lock().unwrap().get(&fqdn) {
            return Ok(zone.clone());
        }

        let mut name = parse_name(&fqdn)?;
        while !name.is_root() {
            let msg = self.query(&name, RecordType::SOA, cancel)?;
            match msg.response_code() {
                ResponseCode::NXDomain => {}
                ResponseCode::NoError => {
                    // a CNAME can't exist at a zone apex
                    let aliased = msg
                        .answers()
                        .iter()
                        .any(|r| r.record_type() == RecordType::CNAME);
                    let soa = msg
                        .answers()
                        .iter()
                        .find(|r| r.record_type() == RecordType::SOA);
                    if let (false, Some(soa)) = (aliased, soa) {
                        let zone = soa.name().clone();
                        debug!("Zone of {} is {}", fqdn, zone);
                        self.zones.lock().unwrap().insert(fqdn, zone.clone());
                        return Ok(zone);
                    }
                }
                rcode => {
                    return Err(Error::Dns(format!(
                        "unexpected response code '{}' for {}",
                        rcode, name
                    )));
                }
            }
            name = name.base_name();
        }

        Err(Error::Dns(format!("could not find the start of authority for {}", fqdn)))
    }

    /// Addresses of the zone's nameservers, one per NS host. Glue records are
    /// used when the resolver sends them.
    pub fn nameservers(&self, zone: &Name, cancel: &Cancel) -> Result<Vec<SocketAddr>> {
        let msg = self.query(zone, RecordType::NS, cancel)?;
        let hosts: Vec<Name> = msg
            .answers()
            .iter()
            .filter_map(|r| match r.data() {
                Some(RData::NS(ns)) => Some(ns.0.clone()),
                _ => None,
            })
            .collect();
        if hosts.is_empty() {
            return Err(Error::Dns(format!(
                "could not determine authoritative nameservers for {}",
                zone
            )));
        }

        let mut servers = vec![];
        for host in &hosts {
            let mut ips = addresses(msg.additionals(), host);
            if ips.is_empty() {
                ips = self.resolve_host(host, cancel)?;
            }
            match ips.first() {
                Some(ip) => {
                    let addr = SocketAddr::new(*ip, 53);
                    if !servers.contains(&addr) {
                        servers.push(addr);
                    }
                }
                None => warn!("No address for nameserver {} of {}", host, zone),
            }
        }

        if servers.is_empty() {
            return Err(Error::Dns(format!("no nameserver of {} has an address", zone)));
        }
        Ok(servers)
    }

    fn resolve_host(&self, host: &Name, cancel: &Cancel) -> Result<Vec<IpAddr>> {
        let msg = self.query(host, RecordType::A, cancel)?;
        let ips = addresses(msg.answers(), host);
        if !ips.is_empty() {
            return Ok(ips);
        }
        let msg = self.query(host, RecordType::AAAA, cancel)?;
        Ok(addresses(msg.answers(), host))
    }

    /// Follow the CNAME chain starting at `fqdn`.
    pub fn follow_cname(&self, fqdn: &str, cancel: &Cancel) -> Result<String> {
        let mut current = parse_name(fqdn)?;
        for _ in 0..MAX_CNAME_HOPS {
            let msg = self.query(&current, RecordType::CNAME, cancel)?;
            let target = msg
                .answers()
                .iter()
                .filter(|r| r.name() == &current)
                .find_map(|r| match r.data() {
                    Some(RData::CNAME(cname)) => Some(cname.0.clone()),
                    _ => None,
                });
            match target {
                Some(target) => {
                    debug!("{} is an alias for {}", current, target);
                    current = target;
                }
                None => break,
            }
        }
        Ok(to_fqdn(&current.to_ascii()))
    }
}

pub(crate) fn parse_name(name: &str) -> Result<Name> {
    Name::from_ascii(to_fqdn(name)).map_err(|e| Error::Dns(format!("invalid name {}: {}", name, e)))
}

/// A then AAAA addresses for `host` among `records`.
fn addresses(records: &[Record], host: &Name) -> Vec<IpAddr> {
    let mut v4 = vec![];
    let mut v6 = vec![];
    for r in records.iter().filter(|r| r.name() == host) {
        match r.data() {
            Some(RData::A(a)) => v4.push(IpAddr::V4(a.0)),
            Some(RData::AAAA(aaaa)) => v6.push(IpAddr::V6(aaaa.0)),
            _ => {}
        }
    }
    v4.extend(v6);
    v4
}
