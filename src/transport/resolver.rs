use super::{AddressPreference, Resolver};
use async_trait::async_trait;
use std::net::IpAddr;
use tokio::net;
use tokio::time::{self, Duration};
use tracing::debug;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Resolves through the operating system resolver without blocking the runtime.
/// Literal addresses skip the lookup entirely.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, name: &str, preference: AddressPreference) -> Option<IpAddr> {
        if let Ok(ip) = name.parse::<IpAddr>() {
            return preference.pick([ip]);
        }

        match time::timeout(LOOKUP_TIMEOUT, net::lookup_host((name, 0))).await {
            Ok(Ok(addrs)) => preference.pick(addrs.map(|a| a.ip())),
            Ok(Err(e)) => {
                debug!(name, "Resolve host fail, {}", e);
                None
            }
            Err(_) => {
                debug!(name, "Resolve host timeout after {:?}", LOOKUP_TIMEOUT);
                None
            }
        }
    }
}
