use super::{MeasurementState, Phase, ProbeEngine};
use crate::structures::{Granularity, HostKey, HostResult};
use crate::transport::{Family, Resolver, Transport};
use std::collections::HashMap;
use tracing::{debug, info, trace};
use tracing_attributes::instrument;

/// Reads a transport value as milliseconds. Anything that is not a finite
/// number counts as no value.
pub fn parse_value(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl<R: Resolver, T: Transport> ProbeEngine<R, T> {
    /// Drains whatever replies have arrived for both families, files them
    /// under the hosts of the last dispatch, and returns the full table.
    ///
    /// Never waits for outstanding probes and never adds entries: a host
    /// without a reply keeps `value == None`. Only the first collect after a
    /// dispatch drains the transport; later calls return the same table.
    #[instrument(skip_all, fields(measurement = state.def().key, granularity = %granularity))]
    pub fn collect(
        &self,
        state: &mut MeasurementState,
        granularity: Granularity,
    ) -> HashMap<HostKey, HostResult> {
        if state.phase() != Phase::Dispatched {
            debug!(phase = ?state.phase(), "No cycle awaiting replies, keep results");
            return state.results().clone();
        }

        let mut matched = 0;
        for family in Family::ALL {
            for (addr, raw) in self.transport.drain_results(family) {
                let value = parse_value(&raw);
                if value.is_none() {
                    debug!(%addr, raw = %raw, "Collected value is not numeric, treat as no reply");
                }
                match state.record(&addr, value) {
                    Some(key) => {
                        trace!(%key, %addr, ?value, "Match reply");
                        matched += 1;
                    }
                    None => trace!(%addr, "Reply matches no pending probe, discard"),
                }
            }
        }
        state.finish_cycle();

        let results = state.results();
        info!(
            "Collect {} replies, {} of {} hosts reachable",
            matched,
            results.values().filter(|r| r.is_reachable()).count(),
            results.len()
        );
        results.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_value_accepts_numbers_only() {
        assert_eq!(parse_value("12.5"), Some(12.5));
        assert_eq!(parse_value(" 3 "), Some(3.0));
        assert_eq!(parse_value(""), None);
        assert_eq!(parse_value("timeout"), None);
        assert_eq!(parse_value("NaN"), None);
        assert_eq!(parse_value("inf"), None);
    }
}
