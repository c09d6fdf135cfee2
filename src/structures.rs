use crate::grpc::collector_grpc::{GrpcCycleReport, GrpcHostResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Caller-assigned identifier of a monitored target. Stable across cycles,
/// independent of whatever address the target resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct HostKey(String);

impl From<&str> for HostKey {
    fn from(v: &str) -> Self {
        Self(v.to_owned())
    }
}

impl From<String> for HostKey {
    fn from(v: String) -> Self {
        Self(v)
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDescriptor {
    /// Host name or literal address to resolve each cycle.
    pub host: String,
}

impl HostDescriptor {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

/// Hosts of one cycle. Ordered, so address collisions resolve the same way
/// every cycle.
pub type HostSet = BTreeMap<HostKey, HostDescriptor>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum Granularity {
    #[serde(rename = "min")]
    Min,
    #[serde(rename = "5mins")]
    FiveMins,
    #[serde(rename = "hour")]
    Hour,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Min, Granularity::FiveMins, Granularity::Hour];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Min => "min",
            Granularity::FiveMins => "5mins",
            Granularity::Hour => "hour",
        }
    }

    /// Scheduling period of one cycle at this granularity.
    pub fn period(&self) -> Duration {
        match self {
            Granularity::Min => Duration::from_secs(60),
            Granularity::FiveMins => Duration::from_secs(300),
            Granularity::Hour => Duration::from_secs(3600),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown granularity: {0}")]
pub struct UnknownGranularity(pub String);

impl FromStr for Granularity {
    type Err = UnknownGranularity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Granularity::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| UnknownGranularity(s.to_owned()))
    }
}

/// Outcome of one host for one cycle.
///
/// `value == None` means the host resolved but nothing usable came back. A host
/// that failed to resolve has no `HostResult` at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostResult {
    pub resolved_addr: IpAddr,
    /// Round trip time in milliseconds.
    pub value: Option<f64>,
}

impl HostResult {
    pub fn pending(resolved_addr: IpAddr) -> Self {
        Self {
            resolved_addr,
            value: None,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub measurement: String,
    pub granularity: Granularity,
    pub collected_at: DateTime<Utc>,
    pub results: HashMap<HostKey, HostResult>,
}

impl CycleReport {
    pub fn unreachable(&self) -> impl Iterator<Item = (&HostKey, &HostResult)> {
        self.results.iter().filter(|(_, r)| !r.is_reachable())
    }
}

impl From<(HostKey, HostResult)> for GrpcHostResult {
    fn from((key, v): (HostKey, HostResult)) -> Self {
        let mut rtt_ms = 0.0;
        if let Some(value) = v.value {
            rtt_ms = value;
        }
        GrpcHostResult {
            key: key.0,
            resolved_addr: v.resolved_addr.to_string(),
            is_reachable: v.is_reachable(),
            rtt_ms,
        }
    }
}

impl From<CycleReport> for GrpcCycleReport {
    fn from(v: CycleReport) -> Self {
        GrpcCycleReport {
            measurement: v.measurement,
            granularity: v.granularity.to_string(),
            collected_at: v.collected_at.timestamp(),
            results: v.results.into_iter().map(|x| x.into()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn granularity_labels() {
        for g in Granularity::ALL {
            assert_eq!(g.as_str().parse::<Granularity>(), Ok(g));
        }
        assert_eq!(
            "daily".parse::<Granularity>(),
            Err(UnknownGranularity("daily".into()))
        );
        assert_eq!(Granularity::FiveMins.period(), Duration::from_secs(300));
    }

    #[test]
    fn unreachable_host_maps_to_zero_rtt() {
        let addr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let r: GrpcHostResult = (HostKey::from("gw"), HostResult::pending(addr)).into();
        assert_eq!(r.key, "gw");
        assert_eq!(r.resolved_addr, "10.0.0.1");
        assert!(!r.is_reachable);
        assert_eq!(r.rtt_ms, 0.0);
    }

    #[test]
    fn report_keeps_collected_timestamp() {
        let addr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let collected_at = Utc::now();
        let mut results = HashMap::new();
        results.insert(
            HostKey::from("gw"),
            HostResult {
                resolved_addr: addr,
                value: Some(3.5),
            },
        );
        let report = CycleReport {
            measurement: "icmp".into(),
            granularity: Granularity::Hour,
            collected_at,
            results,
        };
        assert_eq!(report.unreachable().count(), 0);

        let r: GrpcCycleReport = report.into();
        assert_eq!(r.granularity, "hour");
        assert_eq!(r.collected_at, collected_at.timestamp());
        assert_eq!(r.results[0].rtt_ms, 3.5);
    }
}
