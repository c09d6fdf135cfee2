use crate::measurements::{self, MeasurementDef};
use crate::structures::{Granularity, HostDescriptor, HostKey, HostSet};
use clap::Parser;
use serde::Deserialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const DEFAULT_COLLECT_DELAY_SECS: u64 = 5;

/// Probe hosts over ICMP and report their reachability.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Path of the agent config file
    #[clap(short, long, default_value = "./config.toml")]
    pub conf: String,

    /// Most verbose log level to print
    #[clap(short, long, default_value = "info")]
    pub log_level: tracing::Level,
}

#[derive(Debug, Error)]
pub enum ConfError {
    #[error("read conf fail: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse conf fail: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("host {key}: unknown measurement {measurement}")]
    UnknownMeasurement { key: HostKey, measurement: String },

    #[error("host {key}: measurement {measurement} does not run at granularity {granularity}")]
    UnsupportedGranularity {
        key: HostKey,
        measurement: &'static str,
        granularity: Granularity,
    },

    #[error("host {key} listed twice for {measurement} at granularity {granularity}")]
    DuplicateHost {
        key: HostKey,
        measurement: &'static str,
        granularity: Granularity,
    },

    #[error("collect delay {0:?} must be non zero and shorter than every granularity period")]
    CollectDelay(Duration),
}

#[derive(Deserialize, Debug)]
pub struct Conf {
    pub agent: Agent,
    pub collector: Option<Collector>,
    #[serde(default)]
    pub hosts: Vec<HostEntry>,
}

#[derive(Deserialize, Debug)]
pub struct Agent {
    pub id: u32,
    /// Wait between sending a cycle's probes and collecting its replies.
    #[serde(default = "default_collect_delay_secs")]
    pub collect_delay_secs: u64,
}

fn default_collect_delay_secs() -> u64 {
    DEFAULT_COLLECT_DELAY_SECS
}

#[derive(Deserialize, Debug)]
pub struct Collector {
    pub url: String,
}

#[derive(Deserialize, Debug)]
pub struct HostEntry {
    pub key: HostKey,
    pub host: String,
    pub measurement: String,
    pub granularity: Granularity,
}

/// Hosts to probe, grouped by measurement and granularity.
pub type Schedule = BTreeMap<(&'static str, Granularity), HostSet>;

impl Conf {
    pub fn parse(s: &str) -> Result<Self, ConfError> {
        let conf = toml::from_str::<Conf>(s)?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn collect_delay(&self) -> Duration {
        Duration::from_secs(self.agent.collect_delay_secs)
    }

    fn measurement(entry: &HostEntry) -> Result<&'static MeasurementDef, ConfError> {
        let def = measurements::find(&entry.measurement).ok_or_else(|| {
            ConfError::UnknownMeasurement {
                key: entry.key.clone(),
                measurement: entry.measurement.clone(),
            }
        })?;
        if !def.supports(entry.granularity) {
            return Err(ConfError::UnsupportedGranularity {
                key: entry.key.clone(),
                measurement: def.key,
                granularity: entry.granularity,
            });
        }
        Ok(def)
    }

    fn validate(&self) -> Result<(), ConfError> {
        let delay = self.collect_delay();
        let shortest = self.hosts.iter().map(|h| h.granularity.period()).min();
        if delay.is_zero() || shortest.is_some_and(|p| delay >= p) {
            return Err(ConfError::CollectDelay(delay));
        }
        self.schedule().map(|_| ())
    }

    /// Measurements in use, each once.
    pub fn measurements(&self) -> Result<Vec<&'static MeasurementDef>, ConfError> {
        let mut defs: Vec<&'static MeasurementDef> = Vec::new();
        for entry in &self.hosts {
            let def = Self::measurement(entry)?;
            if !defs.iter().any(|d| d.key == def.key) {
                defs.push(def);
            }
        }
        Ok(defs)
    }

    pub fn schedule(&self) -> Result<Schedule, ConfError> {
        let mut schedule = Schedule::new();
        for entry in &self.hosts {
            let def = Self::measurement(entry)?;
            let hosts = schedule.entry((def.key, entry.granularity)).or_default();
            match hosts.entry(entry.key.clone()) {
                Entry::Occupied(_) => {
                    return Err(ConfError::DuplicateHost {
                        key: entry.key.clone(),
                        measurement: def.key,
                        granularity: entry.granularity,
                    });
                }
                Entry::Vacant(v) => {
                    v.insert(HostDescriptor::new(entry.host.clone()));
                }
            }
        }
        Ok(schedule)
    }
}

pub async fn read_conf(path: &str) -> Result<Conf, ConfError> {
    use tokio::fs;

    info!("read conf from {}", path);
    let conf = fs::read_to_string(path).await?;
    Conf::parse(&conf)
}
