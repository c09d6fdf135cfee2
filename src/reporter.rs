use crate::grpc::collector_grpc::collector_client::CollectorClient;
use crate::grpc::collector_grpc::ReportReq;
use crate::structures::CycleReport;
use std::mem;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time;
use tokio::time::MissedTickBehavior;
use tonic::codegen::http::uri::InvalidUri;
use tonic::transport::{Channel, Uri};
use tracing::{info, warn};

const RETRY_MIN_SEC: u64 = 10;
const RETRY_MAX_SEC: u64 = 15;
const BATCH_SIZE: usize = 64;
const BATCH_INTERVAL: Duration = Duration::from_secs(1);
/// Reports kept for retry while the collector is unreachable.
const MAX_PENDING_REPORTS: usize = 1024;

type ReportRx = mpsc::Receiver<CycleReport>;
type Client = CollectorClient<Channel>;

#[derive(Clone)]
pub struct Reporter {
    channel: Channel,
    agent_id: u32,
}

impl Reporter {
    pub fn new(server_add: &str, agent_id: u32) -> Result<Self, InvalidUri> {
        let uri = Uri::from_str(server_add)?;
        let channel = Channel::builder(uri).connect_lazy();
        Ok(Self { channel, agent_id })
    }

    fn build_request(&self, reports: Vec<CycleReport>) -> ReportReq {
        let r = reports.into_iter().map(|x| x.into()).collect();
        ReportReq {
            agent_id: self.agent_id,
            reports: r,
        }
    }

    /// Queues a failed request for retry, merging with whatever is already
    /// waiting and dropping the oldest reports past the cap.
    fn keep_failed(failed: &mut Option<ReportReq>, mut req: ReportReq) {
        if let Some(prev) = failed.take() {
            let mut reports = prev.reports;
            reports.append(&mut req.reports);
            req.reports = reports;
        }
        if req.reports.len() > MAX_PENDING_REPORTS {
            let dropped = req.reports.len() - MAX_PENDING_REPORTS;
            warn!("Too many pending reports, drop oldest {}", dropped);
            req.reports.drain(..dropped);
        }
        *failed = Some(req);
    }

    /// Moves batched reports into the retry queue so they share its cap while
    /// the collector is unreachable.
    fn park_buffered(&self, failed: &mut Option<ReportReq>, buff: &mut Vec<CycleReport>) {
        if buff.is_empty() {
            return;
        }
        let req = self.build_request(mem::take(buff));
        Self::keep_failed(failed, req);
    }

    fn push_report(buff: &mut Vec<CycleReport>, report: CycleReport) {
        if buff.len() >= MAX_PENDING_REPORTS {
            warn!("Too many buffered reports, drop oldest");
            buff.remove(0);
        }
        buff.push(report);
    }

    async fn send(client: &mut Client, failed: &mut Option<ReportReq>, req: ReportReq) -> bool {
        match client.report(req.clone()).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Send cycle report fail, err:{}", e.message());
                Self::keep_failed(failed, req);
                false
            }
        }
    }

    pub async fn report_cycle_results(self, mut rx: ReportRx) {
        let mut client = Client::new(self.channel.clone());
        let mut failed: Option<ReportReq> = None;
        let mut buff = Vec::with_capacity(BATCH_SIZE);
        let mut timer = time::interval(BATCH_INTERVAL);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = timer.tick() => {
                    if let Some(req) = failed.take() {
                        if !Self::send(&mut client, &mut failed, req).await {
                            self.park_buffered(&mut failed, &mut buff);
                            crate::backoff!(RETRY_MIN_SEC, RETRY_MAX_SEC);
                            continue;
                        }
                        info!("Resend failed cycle reports success");
                    }
                    if buff.is_empty() {
                        continue;
                    }

                    let req = self.build_request(mem::take(&mut buff));
                    Self::send(&mut client, &mut failed, req).await;
                }
                r = rx.recv() => {
                    let Some(r) = r else {
                        info!("Report channel closed, flush and stop");
                        if !buff.is_empty() {
                            let req = self.build_request(mem::take(&mut buff));
                            Self::send(&mut client, &mut failed, req).await;
                        }
                        return;
                    };
                    Self::push_report(&mut buff, r);
                }
            }
        }
    }
}

/// Report sink used when no collector is configured.
pub async fn log_cycle_results(mut rx: ReportRx) {
    while let Some(report) = rx.recv().await {
        info!(
            measurement = %report.measurement,
            granularity = %report.granularity,
            "Cycle finished, {} hosts, {} unreachable",
            report.results.len(),
            report.unreachable().count()
        );
        for (key, result) in &report.results {
            match result.value {
                Some(rtt_ms) => info!(%key, addr = %result.resolved_addr, rtt_ms, "Host reachable"),
                None => warn!(%key, addr = %result.resolved_addr, "Host unreachable"),
            }
        }
    }
}
