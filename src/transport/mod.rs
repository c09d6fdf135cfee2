//! Collaborators the probing engine consumes: name resolution and the ICMP
//! transport. The engine only talks to the traits; [`SystemResolver`] and
//! [`SocketTransport`] are the implementations the agent ships with.

#[cfg(test)]
pub(crate) mod fake;
mod ping_socket;
mod resolver;
mod socket_transport;

pub use resolver::SystemResolver;
pub use socket_transport::SocketTransport;

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub const ALL: [Family; 2] = [Family::V4, Family::V6];

    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Family::V4,
            IpAddr::V6(_) => Family::V6,
        }
    }
}

/// Which addresses a measurement accepts when a name resolves to several.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPreference {
    /// First IPv4 address, falling back to IPv6.
    PreferV4,
    /// IPv6 addresses only.
    V6Only,
}

impl AddressPreference {
    /// Picks an address out of a resolver answer, keeping answer order.
    pub fn pick<I>(&self, addrs: I) -> Option<IpAddr>
    where
        I: IntoIterator<Item = IpAddr>,
    {
        let mut fallback = None;
        for addr in addrs {
            match (self, Family::of(&addr)) {
                (AddressPreference::PreferV4, Family::V4) => return Some(addr),
                (AddressPreference::PreferV4, Family::V6) => {
                    fallback.get_or_insert(addr);
                }
                (AddressPreference::V6Only, Family::V6) => return Some(addr),
                (AddressPreference::V6Only, Family::V4) => (),
            }
        }
        fallback
    }
}

#[async_trait]
pub trait Resolver: Send + Sync {
    /// `None` when the name cannot be resolved to an acceptable address.
    async fn resolve(&self, name: &str, preference: AddressPreference) -> Option<IpAddr>;
}

pub trait Transport: Send + Sync {
    /// Fire and forget. Failures are the transport's to log; nothing is returned.
    fn send_echo_request(&self, addr: IpAddr, family: Family);

    /// Takes every reply buffered for `family` since the previous drain.
    /// Values are round trip times in milliseconds, rendered as text.
    fn drain_results(&self, family: Family) -> HashMap<IpAddr, String>;

    fn is_available(&self) -> bool;

    fn supports(&self, family: Family) -> bool {
        let _ = family;
        self.is_available()
    }
}
