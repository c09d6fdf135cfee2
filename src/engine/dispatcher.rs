use super::{MeasurementState, ProbeEngine};
use crate::structures::{Granularity, HostSet};
use crate::transport::{Family, Resolver, Transport};
use futures::future;
use tracing::{debug, info, trace, warn};
use tracing_attributes::instrument;

impl<R: Resolver, T: Transport> ProbeEngine<R, T> {
    /// Starts a cycle: resolves every host, forgets the previous cycle, then
    /// pings every resolved address without waiting for replies. Returns how
    /// many probes went out.
    ///
    /// Hosts whose name does not resolve are skipped for this cycle and never
    /// appear in the results. Replies still buffered from earlier cycles are
    /// thrown away before anything is sent.
    #[instrument(skip_all, fields(measurement = state.def().key, granularity = %granularity))]
    pub async fn dispatch(
        &self,
        state: &mut MeasurementState,
        hosts: &HostSet,
        granularity: Granularity,
    ) -> usize {
        let preference = state.def().address_preference;
        let resolver = &self.resolver;
        let resolved = future::join_all(hosts.iter().map(move |(key, host)| async move {
            (key, host, resolver.resolve(&host.host, preference).await)
        }))
        .await;

        self.discard_stale_replies();
        state.begin_cycle();

        let mut sent = 0;
        for (key, host, addr) in resolved {
            let Some(addr) = addr else {
                debug!(%key, host = %host.host, "Resolve host fail, skip this cycle");
                continue;
            };

            let family = Family::of(&addr);
            if self.transport.supports(family) {
                self.transport.send_echo_request(addr, family);
                sent += 1;
            } else {
                warn!(%key, %addr, ?family, "No socket for address family, report unreachable");
            }
            state.track(key.clone(), addr);
        }

        info!("Dispatch {} probes for {} hosts", sent, hosts.len());
        sent
    }

    /// Replies that arrive after a collect stay buffered in the transport. None
    /// of them can answer a probe that has not been sent yet.
    fn discard_stale_replies(&self) {
        for family in Family::ALL {
            for (addr, raw) in self.transport.drain_results(family) {
                trace!(%addr, raw = %raw, "Reply matches no pending probe, discard");
            }
        }
    }
}
