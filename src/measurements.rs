//! Built-in measurement definitions.
//!
//! Everything here except the key and the address preference is pass-through
//! configuration for alerting and charting. The engine never interprets it.

use crate::structures::Granularity;
use crate::transport::{AddressPreference, Family};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Alert when the value exceeds the threshold.
    Gt,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Gt => f.write_str("gt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementDef {
    /// Unique measurement name, also the key of its state slot.
    pub key: &'static str,
    pub granularities: &'static [Granularity],
    pub unit: &'static str,
    pub operator: Operator,
    pub default_threshold: Option<f64>,
    pub min_threshold: Option<f64>,
    pub max_threshold: Option<f64>,
    pub chart_scaling: f64,
    pub address_preference: AddressPreference,
}

impl MeasurementDef {
    pub fn supports(&self, granularity: Granularity) -> bool {
        self.granularities.contains(&granularity)
    }

    /// Socket family that must be usable before this measurement may run.
    pub fn required_family(&self) -> Family {
        match self.address_preference {
            AddressPreference::PreferV4 => Family::V4,
            AddressPreference::V6Only => Family::V6,
        }
    }
}

pub const ICMP: MeasurementDef = MeasurementDef {
    key: "icmp",
    granularities: &Granularity::ALL,
    unit: "ms",
    operator: Operator::Gt,
    default_threshold: Some(100.0),
    min_threshold: Some(1.0),
    max_threshold: Some(10_000.0),
    chart_scaling: 1.0,
    address_preference: AddressPreference::PreferV4,
};

pub const ICMP6: MeasurementDef = MeasurementDef {
    key: "icmp6",
    address_preference: AddressPreference::V6Only,
    ..ICMP
};

pub static BUILTIN: [MeasurementDef; 2] = [ICMP, ICMP6];

pub fn find(key: &str) -> Option<&'static MeasurementDef> {
    BUILTIN.iter().find(|m| m.key == key)
}
