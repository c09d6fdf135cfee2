use super::{AddressPreference, Family, Resolver, Transport};
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;

/// Table driven resolver. Names missing from the table do not resolve.
#[derive(Default)]
pub(crate) struct FakeResolver {
    pub(crate) names: HashMap<String, IpAddr>,
}

impl FakeResolver {
    pub(crate) fn with(mut self, name: &str, addr: &str) -> Self {
        self.names.insert(name.into(), addr.parse().unwrap());
        self
    }
}

#[async_trait]
impl Resolver for FakeResolver {
    async fn resolve(&self, name: &str, preference: AddressPreference) -> Option<IpAddr> {
        preference.pick(self.names.get(name).copied())
    }
}

/// Records sent probes. Replies are either queued by the test directly or
/// produced on send for addresses listed in `echoes`, and handed out by the
/// next drain of their family. Probes for a family without a socket are
/// dropped, like the real transport does.
pub(crate) struct FakeTransport {
    pub(crate) available: bool,
    pub(crate) v6: bool,
    pub(crate) sent: Mutex<Vec<(IpAddr, Family)>>,
    pub(crate) echoes: Mutex<HashMap<IpAddr, String>>,
    pub(crate) replies: Mutex<HashMap<IpAddr, String>>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self {
            available: true,
            v6: true,
            sent: Mutex::default(),
            echoes: Mutex::default(),
            replies: Mutex::default(),
        }
    }
}

impl FakeTransport {
    pub(crate) fn reply(&self, addr: &str, value: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(addr.parse().unwrap(), value.into());
    }

    /// Answers every later probe to `addr` with `value`.
    pub(crate) fn echo(&self, addr: &str, value: &str) {
        self.echoes
            .lock()
            .unwrap()
            .insert(addr.parse().unwrap(), value.into());
    }
}

impl Transport for FakeTransport {
    fn send_echo_request(&self, addr: IpAddr, family: Family) {
        if !self.supports(family) {
            return;
        }
        self.sent.lock().unwrap().push((addr, family));
        if let Some(value) = self.echoes.lock().unwrap().get(&addr) {
            self.replies.lock().unwrap().insert(addr, value.clone());
        }
    }

    fn drain_results(&self, family: Family) -> HashMap<IpAddr, String> {
        let mut replies = self.replies.lock().unwrap();
        let (drained, kept): (HashMap<_, _>, HashMap<_, _>) = replies
            .drain()
            .partition(|(addr, _)| Family::of(addr) == family);
        *replies = kept;
        drained
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn supports(&self, family: Family) -> bool {
        self.available && (family == Family::V4 || self.v6)
    }
}
