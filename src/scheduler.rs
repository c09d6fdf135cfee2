//! Drives dispatch → wait → collect cycles on a fixed cadence per
//! (measurement, granularity) and forwards every finished cycle.

use crate::engine::{ProbeEngine, Slot};
use crate::structures::{CycleReport, Granularity, HostSet};
use crate::transport::{Resolver, Transport};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio::sync::Mutex;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{error, info};
use tracing_attributes::instrument;

pub struct Job {
    pub measurement: &'static str,
    pub slot: Slot,
    pub granularity: Granularity,
    pub hosts: HostSet,
}

pub struct CycleRunner<R, T> {
    engine: Arc<ProbeEngine<R, T>>,
    /// The transport buffers replies for every measurement together, so only
    /// one cycle may be between dispatch and collect at a time.
    gate: Arc<Mutex<()>>,
    collect_delay: Duration,
}

impl<R, T> Clone for CycleRunner<R, T> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            gate: self.gate.clone(),
            collect_delay: self.collect_delay,
        }
    }
}

impl<R, T> CycleRunner<R, T>
where
    R: Resolver + 'static,
    T: Transport + 'static,
{
    pub fn new(engine: Arc<ProbeEngine<R, T>>, collect_delay: Duration) -> Self {
        Self {
            engine,
            gate: Arc::new(Mutex::new(())),
            collect_delay,
        }
    }

    #[instrument(skip_all, fields(granularity = %granularity))]
    pub async fn run_cycle(
        &self,
        slot: &Slot,
        hosts: &HostSet,
        granularity: Granularity,
    ) -> CycleReport {
        let _gate = self.gate.lock().await;
        let mut state = slot.lock().await;

        self.engine.dispatch(&mut state, hosts, granularity).await;
        time::sleep(self.collect_delay).await;
        let results = self.engine.collect(&mut state, granularity);

        CycleReport {
            measurement: state.def().key.to_owned(),
            granularity,
            collected_at: Utc::now(),
            results,
        }
    }

    pub async fn run_job(self, job: Job, report_tx: Sender<CycleReport>) {
        let mut interval = time::interval(job.granularity.period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "Start job, {} hosts every {:?}",
            job.hosts.len(),
            job.granularity.period()
        );

        loop {
            interval.tick().await;
            let report = self.run_cycle(&job.slot, &job.hosts, job.granularity).await;
            if let Err(e) = report_tx.send(report).await {
                error!("Send cycle report fail, {}", e);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MeasurementRegistry;
    use crate::measurements::{MeasurementDef, ICMP};
    use crate::structures::{HostDescriptor, HostKey};
    use crate::transport::fake::{FakeResolver, FakeTransport};
    use tokio::sync::mpsc;

    static DEF: MeasurementDef = ICMP;
    const DELAY: Duration = Duration::from_millis(20);

    fn runner() -> (CycleRunner<FakeResolver, FakeTransport>, Slot) {
        let resolver = FakeResolver::default()
            .with("a.example", "10.0.0.1")
            .with("b.example", "10.0.0.2");
        let engine = Arc::new(ProbeEngine::new(resolver, FakeTransport::default()));
        let slot = MeasurementRegistry::new()
            .register(&DEF, engine.transport())
            .unwrap();
        (CycleRunner::new(engine, DELAY), slot)
    }

    fn hosts(key: &str, host: &str) -> HostSet {
        [(HostKey::from(key), HostDescriptor::new(host))].into_iter().collect()
    }

    #[tokio::test]
    async fn cycle_reports_measurement_results() {
        let (runner, slot) = runner();
        runner.engine.transport().echo("10.0.0.1", "0.8");

        let report = runner
            .run_cycle(&slot, &hosts("a", "a.example"), Granularity::Min)
            .await;
        assert_eq!(report.measurement, "icmp");
        assert_eq!(report.granularity, Granularity::Min);
        assert_eq!(report.results[&HostKey::from("a")].value, Some(0.8));
    }

    #[tokio::test]
    async fn reply_buffered_between_cycles_is_dropped() {
        let (runner, slot) = runner();
        let hosts = hosts("a", "a.example");
        runner.engine.transport().echo("10.0.0.1", "0.8");
        runner.run_cycle(&slot, &hosts, Granularity::Min).await;

        runner.engine.transport().echoes.lock().unwrap().clear();
        runner.engine.transport().reply("10.0.0.1", "950.0");
        let report = runner.run_cycle(&slot, &hosts, Granularity::Min).await;
        assert_eq!(report.results[&HostKey::from("a")].value, None);
    }

    #[tokio::test]
    async fn overlapping_cycles_do_not_mix() {
        let (runner, slot) = runner();
        let first = {
            let (runner, slot) = (runner.clone(), slot.clone());
            tokio::spawn(async move {
                runner
                    .run_cycle(&slot, &hosts("a", "a.example"), Granularity::Min)
                    .await
            })
        };
        let second = {
            let (runner, slot) = (runner.clone(), slot.clone());
            tokio::spawn(async move {
                runner
                    .run_cycle(&slot, &hosts("b", "b.example"), Granularity::Hour)
                    .await
            })
        };

        let first = first.await.unwrap();
        let second = second.await.unwrap();
        assert_eq!(first.results.len(), 1);
        assert!(first.results.contains_key(&HostKey::from("a")));
        assert_eq!(second.results.len(), 1);
        assert!(second.results.contains_key(&HostKey::from("b")));
    }

    #[tokio::test]
    async fn job_reports_on_first_tick() {
        let (runner, slot) = runner();
        let (tx, mut rx) = mpsc::channel(1);
        let job = Job {
            measurement: "icmp",
            slot,
            granularity: Granularity::Min,
            hosts: hosts("a", "a.example"),
        };
        let handle = tokio::spawn(runner.run_job(job, tx));

        // first tick fires immediately
        let report = rx.recv().await.unwrap();
        assert_eq!(report.results.len(), 1);
        // the next send happens a full period later; abort instead of waiting
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
