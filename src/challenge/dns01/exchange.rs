use hickory_client::client::{Client, SyncClient};
use hickory_client::op::Message;
use hickory_client::rr::{DNSClass, Name, RecordType};
use hickory_client::tcp::TcpClientConnection;
use hickory_client::udp::UdpClientConnection;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::time::Duration;

use crate::{Error, Result};

/// One DNS question to one server.
///
/// A response with an error code (NXDOMAIN, SERVFAIL, ...) is a successful
/// exchange; `Err` is reserved for not getting an answer at all.
pub trait DnsExchange: Send + Sync + Debug {
    fn exchange(&self, server: SocketAddr, name: &Name, rtype: RecordType) -> Result<Message>;
}

/// Plain UDP queries, retried over TCP when the answer is truncated.
#[derive(Debug, Clone)]
pub struct HickoryExchange {
    timeout: Duration,
}

impl HickoryExchange {
    pub fn new(timeout: Duration) -> Self {
        HickoryExchange { timeout }
    }
}

impl DnsExchange for HickoryExchange {
    fn exchange(&self, server: SocketAddr, name: &Name, rtype: RecordType) -> Result<Message> {
        trace!("Query {} {} @{}", name, rtype, server);
        let conn = UdpClientConnection::with_timeout(server, self.timeout)
            .map_err(|e| Error::Dns(format!("{}: {}", server, e)))?;
        let res = SyncClient::new(conn)
            .query(name, DNSClass::IN, rtype)
            .map_err(|e| Error::Dns(format!("{} {} @{}: {}", name, rtype, server, e)))?;
        if !res.truncated() {
            return Ok(res.into_message());
        }

        debug!("Truncated answer for {} {} @{}, retry over TCP", name, rtype, server);
        let conn = TcpClientConnection::with_timeout(server, self.timeout)
            .map_err(|e| Error::Dns(format!("{}: {}", server, e)))?;
        let res = SyncClient::new(conn)
            .query(name, DNSClass::IN, rtype)
            .map_err(|e| Error::Dns(format!("{} {} @{}: {}", name, rtype, server, e)))?;
        Ok(res.into_message())
    }
}
