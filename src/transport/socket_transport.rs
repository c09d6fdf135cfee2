use super::ping_socket::PingSocket;
use super::{Family, Transport};
use std::collections::HashMap;
use std::mem;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, info_span, trace, warn};
use tracing_futures::Instrument;

const RECV_RETRY_INTERVAL: Duration = Duration::from_millis(100);

type Replies = Arc<Mutex<HashMap<IpAddr, String>>>;

struct Channel {
    sock: Arc<PingSocket>,
    replies: Replies,
    receiver: JoinHandle<()>,
}

/// ICMP transport over one datagram socket per family.
///
/// Sends go straight to the non-blocking socket. A receiver task per family
/// files every echo reply into a buffer keyed by source address, which
/// [`Transport::drain_results`] empties.
pub struct SocketTransport {
    epoch: Instant,
    seq: AtomicU16,
    v4: Option<Channel>,
    v6: Option<Channel>,
}

fn lock(replies: &Replies) -> MutexGuard<'_, HashMap<IpAddr, String>> {
    replies.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SocketTransport {
    /// Opens both sockets and starts their receivers. Must run inside a tokio
    /// runtime. A family whose socket cannot be opened stays unsupported.
    pub fn open() -> Self {
        let epoch = Instant::now();
        Self {
            v4: Self::open_channel(Family::V4, epoch),
            v6: Self::open_channel(Family::V6, epoch),
            epoch,
            seq: AtomicU16::new(0),
        }
    }

    fn open_channel(family: Family, epoch: Instant) -> Option<Channel> {
        let sock = match PingSocket::new(family) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                warn!(?family, "Open icmp socket fail, {}", e);
                return None;
            }
        };
        let replies = Replies::default();
        let receiver = tokio::spawn(
            Self::receive_loop(sock.clone(), replies.clone(), epoch)
                .instrument(info_span!("icmp_receiver", ?family)),
        );
        Some(Channel {
            sock,
            replies,
            receiver,
        })
    }

    async fn receive_loop(sock: Arc<PingSocket>, replies: Replies, epoch: Instant) {
        loop {
            let reply = match sock.recv_reply().await {
                Ok(r) => r,
                Err(e) => {
                    warn!("Socket recv fail! {}", e);
                    time::sleep(RECV_RETRY_INTERVAL).await;
                    continue;
                }
            };
            let now = epoch.elapsed().as_nanos() as u64;
            let Some(rtt) = now.checked_sub(reply.sent_nanos) else {
                debug!(source = %reply.source, "Recv reply stamped in the future, skip");
                continue;
            };
            let rtt_ms = Duration::from_nanos(rtt).as_secs_f64() * 1000.0;
            trace!(source = %reply.source, seq = reply.seq, rtt_ms, "Recv echo reply");
            lock(&replies).insert(reply.source, format!("{:.3}", rtt_ms));
        }
    }

    fn channel(&self, family: Family) -> Option<&Channel> {
        match family {
            Family::V4 => self.v4.as_ref(),
            Family::V6 => self.v6.as_ref(),
        }
    }

    fn next_seq(&self) -> u16 {
        loop {
            let seq = self.seq.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            if seq != 0 {
                return seq;
            }
        }
    }
}

impl Transport for SocketTransport {
    fn send_echo_request(&self, addr: IpAddr, family: Family) {
        let Some(channel) = self.channel(family) else {
            warn!(%addr, ?family, "No icmp socket for family, drop probe");
            return;
        };
        let seq = self.next_seq();
        let sent_nanos = self.epoch.elapsed().as_nanos() as u64;
        if let Err(e) = channel.sock.try_send_request(seq, sent_nanos, addr) {
            warn!(%addr, "Send echo request fail, {}", e);
        }
    }

    fn drain_results(&self, family: Family) -> HashMap<IpAddr, String> {
        self.channel(family)
            .map(|c| mem::take(&mut *lock(&c.replies)))
            .unwrap_or_default()
    }

    fn is_available(&self) -> bool {
        self.v4.is_some()
    }

    fn supports(&self, family: Family) -> bool {
        self.channel(family).is_some()
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        for channel in [&self.v4, &self.v6].into_iter().flatten() {
            channel.receiver.abort();
        }
    }
}
