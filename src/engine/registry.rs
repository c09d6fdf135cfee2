use super::{MeasurementState, ProbeError};
use crate::measurements::MeasurementDef;
use crate::transport::Transport;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// One measurement's state. The lock is meant to be held from dispatch through
/// collect, so overlapping cycles of one measurement queue up instead of
/// resetting each other's state.
pub type Slot = Arc<Mutex<MeasurementState>>;

#[derive(Default)]
pub struct MeasurementRegistry {
    slots: BTreeMap<&'static str, Slot>,
}

impl MeasurementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the measurement's slot once the transport proves usable for it.
    /// Registering the same measurement again hands back the existing slot.
    pub fn register<T: Transport>(
        &mut self,
        def: &'static MeasurementDef,
        transport: &T,
    ) -> Result<Slot, ProbeError> {
        if let Some(slot) = self.slots.get(def.key) {
            return Ok(slot.clone());
        }

        let family = def.required_family();
        if !transport.is_available() || !transport.supports(family) {
            return Err(ProbeError::TransportUnavailable {
                measurement: def.key,
                family,
            });
        }

        let slot = Arc::new(Mutex::new(MeasurementState::new(def)));
        self.slots.insert(def.key, slot.clone());
        info!(measurement = def.key, "Register measurement");
        Ok(slot)
    }

    pub fn slot(&self, key: &str) -> Option<Slot> {
        self.slots.get(key).cloned()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.keys().copied()
    }
}
