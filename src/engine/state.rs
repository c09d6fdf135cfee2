use crate::measurements::MeasurementDef;
use crate::structures::{HostKey, HostResult};
use std::collections::HashMap;
use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Dispatched,
    Collected,
}

/// Per-measurement cycle state: which key each probed address belongs to, and
/// the result table handed back by collect.
///
/// One instance per measurement, living as long as the process. Every dispatch
/// replaces its contents wholesale.
#[derive(Debug)]
pub struct MeasurementState {
    def: &'static MeasurementDef,
    pending: HashMap<IpAddr, HostKey>,
    results: HashMap<HostKey, HostResult>,
    phase: Phase,
}

impl MeasurementState {
    pub fn new(def: &'static MeasurementDef) -> Self {
        Self {
            def,
            pending: HashMap::new(),
            results: HashMap::new(),
            phase: Phase::Idle,
        }
    }

    pub fn def(&self) -> &'static MeasurementDef {
        self.def
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn results(&self) -> &HashMap<HostKey, HostResult> {
        &self.results
    }

    pub(super) fn begin_cycle(&mut self) {
        self.pending.clear();
        self.results.clear();
        self.phase = Phase::Dispatched;
    }

    /// Last writer wins: a later key resolving to the same address takes over
    /// the pending entry, the earlier key keeps a valueless result.
    pub(super) fn track(&mut self, key: HostKey, addr: IpAddr) {
        self.results.insert(key.clone(), HostResult::pending(addr));
        self.pending.insert(addr, key);
    }

    /// Returns the key the value was filed under, `None` for an unknown address
    /// or when no cycle is awaiting replies.
    pub(super) fn record(&mut self, addr: &IpAddr, value: Option<f64>) -> Option<&HostKey> {
        if self.phase != Phase::Dispatched {
            return None;
        }
        let key = self.pending.get(addr)?;
        let result = self.results.get_mut(key)?;
        result.value = value;
        Some(key)
    }

    pub(super) fn finish_cycle(&mut self) {
        self.phase = Phase::Collected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurements::ICMP;
    use std::net::Ipv4Addr;

    static DEF: MeasurementDef = ICMP;
    const ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1));

    #[test]
    fn record_fills_tracked_host() {
        let mut state = MeasurementState::new(&DEF);
        state.begin_cycle();
        state.track("a".into(), ADDR);

        assert_eq!(state.record(&ADDR, Some(2.0)), Some(&HostKey::from("a")));
        assert_eq!(state.results()[&HostKey::from("a")].value, Some(2.0));
    }

    #[test]
    fn unknown_address_is_ignored() {
        let mut state = MeasurementState::new(&DEF);
        state.begin_cycle();
        let other = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 2));

        assert!(state.record(&other, Some(1.0)).is_none());
        assert!(state.results().is_empty());
    }

    #[test]
    fn begin_cycle_drops_previous_entries() {
        let mut state = MeasurementState::new(&DEF);
        assert_eq!(state.phase(), Phase::Idle);
        state.begin_cycle();
        state.track("a".into(), ADDR);
        state.finish_cycle();
        assert_eq!(state.phase(), Phase::Collected);

        state.begin_cycle();
        assert!(state.results().is_empty());
        assert!(state.record(&ADDR, Some(1.0)).is_none());
        assert_eq!(state.phase(), Phase::Dispatched);
    }

    #[test]
    fn finished_cycle_rejects_late_values() {
        let mut state = MeasurementState::new(&DEF);
        assert!(state.record(&ADDR, Some(1.0)).is_none());

        state.begin_cycle();
        state.track("a".into(), ADDR);
        state.record(&ADDR, Some(2.0));
        state.finish_cycle();

        assert!(state.record(&ADDR, Some(9.0)).is_none());
        assert_eq!(state.results()[&HostKey::from("a")].value, Some(2.0));
    }
}
