use hickory_client::op::ResponseCode;
use hickory_client::rr::{Name, RData, RecordType};
use lazy_static::lazy_static;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use super::exchange::{DnsExchange, HickoryExchange};
use super::get_record;
use super::zone::{parse_name, ZoneResolver};
use crate::clock::{Cancel, Clock};
use crate::config::{parse_nameservers, Dns01Config};
use crate::{Error, Result};

lazy_static! {
    static ref SYSTEM_NAMESERVERS: Vec<SocketAddr> = system_nameservers();
}

/// Resolvers from the system configuration, or Google's public ones.
fn system_nameservers() -> Vec<SocketAddr> {
    match hickory_resolver::system_conf::read_system_conf() {
        Ok((conf, _)) => {
            let mut servers = vec![];
            for ns in conf.name_servers() {
                if !servers.contains(&ns.socket_addr) {
                    servers.push(ns.socket_addr);
                }
            }
            if !servers.is_empty() {
                return servers;
            }
        }
        Err(e) => debug!("No system resolver configuration: {}", e),
    }
    vec![
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 53),
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 4, 4)), 53),
    ]
}

/// Decides whether a DNS-01 record is visible at the authoritative layer.
///
/// The zone of the record is found through the recursive resolvers, then
/// every nameserver of the zone is asked directly. Recursive resolvers that
/// were configured explicitly are asked as well. Servers that disagree mean
/// "not yet", never an error, so polling goes on until the timeout.
#[derive(Debug)]
pub struct PropagationVerifier {
    resolver: ZoneResolver,
    exchange: Arc<dyn DnsExchange>,
    explicit: Vec<SocketAddr>,
    config: Dns01Config,
    clock: Arc<dyn Clock>,
}

impl PropagationVerifier {
    /// Verifier talking real DNS.
    pub fn new(config: Dns01Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let exchange = Arc::new(HickoryExchange::new(config.dns_timeout()));
        Self::with_exchange(config, exchange, clock)
    }

    pub fn with_exchange(
        config: Dns01Config,
        exchange: Arc<dyn DnsExchange>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let explicit = parse_nameservers(&config.recursive_nameservers)?;
        let recursive = if explicit.is_empty() {
            SYSTEM_NAMESERVERS.clone()
        } else {
            explicit.clone()
        };
        let resolver = ZoneResolver::new(
            exchange.clone(),
            recursive,
            config.lookup_attempts,
            clock.clone(),
        );
        Ok(PropagationVerifier {
            resolver,
            exchange,
            explicit,
            config,
            clock,
        })
    }

    /// Zone apex for `fqdn`, e.g. `example.com.` for `_acme-challenge.www.example.com.`.
    pub fn find_zone(&self, fqdn: &str, cancel: &Cancel) -> Result<String> {
        Ok(self.resolver.find_zone(fqdn, cancel)?.to_ascii())
    }

    /// The servers polled for `fqdn`: the zone's nameservers plus any
    /// explicitly configured resolvers.
    pub fn authoritative_nameservers(&self, fqdn: &str, cancel: &Cancel) -> Result<Vec<SocketAddr>> {
        let zone = self.resolver.find_zone(fqdn, cancel)?;
        let mut servers = self.resolver.nameservers(&zone, cancel)?;
        for ns in &self.explicit {
            if !servers.contains(ns) {
                servers.push(*ns);
            }
        }
        Ok(servers)
    }

    /// Block until the record for `domain` is propagated, using the
    /// configured timeout and interval.
    pub fn wait_for_propagation(&self, domain: &str, key_auth: &str, cancel: &Cancel) -> Result<()> {
        self.wait_for_propagation_with(
            domain,
            key_auth,
            self.config.propagation_timeout(),
            self.config.polling_interval(),
            cancel,
        )
    }

    pub fn wait_for_propagation_with(
        &self,
        domain: &str,
        key_auth: &str,
        timeout: Duration,
        interval: Duration,
        cancel: &Cancel,
    ) -> Result<()> {
        let (fqdn, value) = get_record(domain, key_auth);
        let fqdn = if self.config.follow_cname {
            self.resolver.follow_cname(&fqdn, cancel)?
        } else {
            fqdn
        };
        let servers = self.authoritative_nameservers(&fqdn, cancel)?;
        let name = parse_name(&fqdn)?;
        debug!("[{}] Checking DNS record propagation of {} on {:?}", domain, fqdn, servers);

        let start = self.clock.now();
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let last = match self.check(&name, &value, &servers) {
                None => {
                    info!("[{}] The DNS record {} is propagated", domain, fqdn);
                    return Ok(());
                }
                Some(reason) => reason,
            };

            let elapsed = self.clock.now() - start;
            if elapsed + interval > timeout {
                return Err(Error::Propagation {
                    fqdn,
                    elapsed,
                    last,
                });
            }
            info!("[{}] Waiting for DNS record propagation", domain);
            if !self.clock.sleep(interval, cancel) {
                return Err(Error::Cancelled);
            }
        }
    }

    /// One poll round. `None` when propagated, otherwise what's missing.
    fn check(&self, name: &Name, value: &str, servers: &[SocketAddr]) -> Option<String> {
        let mut matched = 0;
        let mut missing = vec![];
        for server in servers {
            match self.has_txt(*server, name, value) {
                Ok(true) => matched += 1,
                Ok(false) => missing.push(format!(
                    "NS {} did not return the expected TXT record [fqdn: {}, value: {}]",
                    server, name, value
                )),
                Err(e) => missing.push(e.to_string()),
            }
        }

        let propagated = if self.config.require_complete_propagation {
            missing.is_empty()
        } else {
            matched > 0
        };
        if propagated {
            None
        } else {
            Some(missing.join("; "))
        }
    }

    fn has_txt(&self, server: SocketAddr, name: &Name, value: &str) -> Result<bool> {
        let msg = self.exchange.exchange(server, name, RecordType::TXT)?;
        match msg.response_code() {
            ResponseCode::NoError | ResponseCode::NXDomain => {}
            rcode => {
                return Err(Error::Dns(format!("NS {} returned {} for {}", server, rcode, name)));
            }
        }
        Ok(msg.answers().iter().any(|r| match r.data() {
            Some(RData::TXT(txt)) => {
                let found: String = txt
                    .txt_data()
                    .iter()
                    .map(|d| String::from_utf8_lossy(d))
                    .collect();
                found == value
            }
            _ => false,
        }))
    }
}
