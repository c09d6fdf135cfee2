//! The probing engine: a fire-and-forget dispatch phase and a batched collect
//! phase, joined by per-measurement [`MeasurementState`].
//!
//! Neither phase fails. Unresolvable hosts are left out of the result table,
//! silent hosts stay in it without a value, and replies nobody asked for are
//! dropped.

mod collector;
mod dispatcher;
mod registry;
mod state;

pub use collector::parse_value;
pub use registry::{MeasurementRegistry, Slot};
pub use state::{MeasurementState, Phase};

use crate::transport::{Family, Resolver, Transport};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("icmp probing over {family:?} is not available, measurement {measurement} disabled")]
    TransportUnavailable {
        measurement: &'static str,
        family: Family,
    },
}

pub struct ProbeEngine<R, T> {
    resolver: R,
    transport: T,
}

impl<R: Resolver, T: Transport> ProbeEngine<R, T> {
    pub fn new(resolver: R, transport: T) -> Self {
        Self {
            resolver,
            transport,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
