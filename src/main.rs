use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::future;
use icmp_probe::conf::{self, Args, Conf, ConfError};
use icmp_probe::engine::{MeasurementRegistry, ProbeEngine, ProbeError};
use icmp_probe::reporter::{self, Reporter};
use icmp_probe::scheduler::{CycleRunner, Job};
use icmp_probe::transport::{Family, SocketTransport, SystemResolver, Transport};
use std::process;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tracing::{error, info, info_span, warn};
use tracing_futures::Instrument;

const REPORT_CHANNEL_SIZE: usize = 1024;

fn exit_code(e: &anyhow::Error) -> exitcode::ExitCode {
    if e.downcast_ref::<ConfError>().is_some() {
        exitcode::CONFIG
    } else if e.downcast_ref::<ProbeError>().is_some() {
        exitcode::UNAVAILABLE
    } else {
        exitcode::SOFTWARE
    }
}

fn build_jobs(
    conf: &Conf,
    registry: &mut MeasurementRegistry,
    transport: &SocketTransport,
) -> Result<Vec<Job>> {
    let mut unavailable = None;
    for def in conf.measurements()? {
        if let Err(e) = registry.register(def, transport) {
            warn!("{}, skip its hosts", e);
            unavailable = Some(e);
        }
    }

    let mut jobs = vec![];
    for ((measurement, granularity), hosts) in conf.schedule()? {
        let Some(slot) = registry.slot(measurement) else {
            continue;
        };
        jobs.push(Job {
            measurement,
            slot,
            granularity,
            hosts,
        });
    }

    match unavailable {
        Some(e) if jobs.is_empty() => Err(e.into()),
        _ => Ok(jobs),
    }
}

async fn start(args: &Args) -> Result<Vec<JoinHandle<()>>> {
    let conf = conf::read_conf(&args.conf).await?;

    let transport = SocketTransport::open();
    if !transport.is_available() {
        bail!(ProbeError::TransportUnavailable {
            measurement: "icmp",
            family: Family::V4,
        });
    }

    let mut registry = MeasurementRegistry::new();
    let jobs = build_jobs(&conf, &mut registry, &transport)?;
    if jobs.is_empty() {
        warn!("No hosts configured, nothing to probe");
    } else {
        let measurements: Vec<_> = registry.keys().collect();
        info!("Probe {} jobs for measurements {:?}", jobs.len(), measurements);
    }

    let engine = Arc::new(ProbeEngine::new(SystemResolver, transport));
    let runner = CycleRunner::new(engine, conf.collect_delay());
    let (report_tx, report_rx) = mpsc::channel(REPORT_CHANNEL_SIZE);

    let mut handlers = vec![];
    match &conf.collector {
        Some(collector) => {
            let reporter = Reporter::new(&collector.url, conf.agent.id)
                .with_context(|| format!("Invalid collector url {}", collector.url))?;
            handlers.push(task::spawn(
                reporter
                    .report_cycle_results(report_rx)
                    .instrument(info_span!("reporter")),
            ));
        }
        None => {
            info!("No collector configured, log cycle results only");
            handlers.push(task::spawn(
                reporter::log_cycle_results(report_rx).instrument(info_span!("reporter")),
            ));
        }
    }

    for job in jobs {
        let span = info_span!(
            "job",
            measurement = job.measurement,
            granularity = %job.granularity
        );
        handlers.push(task::spawn(
            runner.clone().run_job(job, report_tx.clone()).instrument(span),
        ));
    }

    Ok(handlers)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt().with_max_level(args.log_level).init();

    let handlers = match start(&args).await {
        Ok(h) => h,
        Err(e) => {
            error!("Start agent fail, {:#}", e);
            process::exit(exit_code(&e));
        }
    };
    info!("Agent started, {} tasks", handlers.len());

    future::join_all(handlers).await;
}
