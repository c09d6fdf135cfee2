use super::Family;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use socket2::{Protocol, Socket, Type};
use std::io::Result;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use tokio::io::unix::AsyncFd;
use tracing::{debug, info};

pub(super) const PING_PACKET_LEN: usize = 64;
const ICMP_HEADER_LEN: usize = 8;
const TIMESTAMP_LEN: usize = 8;
const RECV_BUF_LEN: usize = 1500;

#[derive(Debug, PartialEq, Eq)]
pub(super) struct EchoReply {
    pub(super) source: IpAddr,
    pub(super) seq: u16,
    /// Transport-relative send time echoed back in the payload.
    pub(super) sent_nanos: u64,
}

/// Unprivileged ICMP datagram socket. The kernel fills in the identifier and
/// checksum, and only hands back replies addressed to this socket. Once
/// created it is driven through the std datagram socket API.
pub(super) struct PingSocket {
    inner: AsyncFd<UdpSocket>,
    family: Family,
}

impl PingSocket {
    pub(super) fn new(family: Family) -> Result<Self> {
        let (domain, protocol) = match family {
            Family::V4 => (socket2::Domain::IPV4, Protocol::ICMPV4),
            Family::V6 => (socket2::Domain::IPV6, Protocol::ICMPV6),
        };
        let inner = Socket::new(domain, Type::DGRAM, Some(protocol))?;
        inner.set_nonblocking(true)?;
        let inner = AsyncFd::new(UdpSocket::from(inner))?;
        Ok(Self { inner, family })
    }

    fn echo_request_type(family: Family) -> u8 {
        match family {
            Family::V4 => 8,
            Family::V6 => 128,
        }
    }

    fn echo_reply_type(family: Family) -> u8 {
        match family {
            Family::V4 => 0,
            Family::V6 => 129,
        }
    }

    fn build_request(family: Family, seq: u16, sent_nanos: u64, len: usize) -> Bytes {
        let mut buf = BytesMut::with_capacity(len);
        // set icmp type and code
        buf.put_u8(Self::echo_request_type(family));
        buf.put_u8(0);
        // set icmp check sum and id. linux kernel will handle it, so just put 0.
        buf.put_u16(0);
        buf.put_u16(0);
        // set seq
        buf.put_u16(seq);
        buf.put_u64(sent_nanos);
        // fill
        buf.resize(len, 1);
        buf.freeze()
    }

    fn parse_reply(family: Family, source: IpAddr, mut buf: Bytes) -> Option<EchoReply> {
        if buf.len() < ICMP_HEADER_LEN + TIMESTAMP_LEN {
            info!(
                "Recv packet len:{} less than expect len:{}",
                buf.len(),
                ICMP_HEADER_LEN + TIMESTAMP_LEN
            );
            return None;
        }
        let kind = buf.get_u8();
        if kind != Self::echo_reply_type(family) {
            debug!("Recv icmp type:{} is not echo reply, skip", kind);
            return None;
        }
        // code, check sum, id
        buf.advance(5);
        let seq = buf.get_u16();
        let sent_nanos = buf.get_u64();
        Some(EchoReply {
            source,
            seq,
            sent_nanos,
        })
    }

    /// Single non-blocking write. A full socket buffer surfaces as `WouldBlock`.
    pub(super) fn try_send_request(&self, seq: u16, sent_nanos: u64, addr: IpAddr) -> Result<()> {
        let buf = Self::build_request(self.family, seq, sent_nanos, PING_PACKET_LEN);
        let dst = SocketAddr::new(addr, 0);
        let result = self.inner.get_ref().send_to(&buf, dst)?;
        if result != buf.len() {
            info!("Send packet len:{} less than buf len:{}", result, buf.len());
        }
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        loop {
            let mut guard = self.inner.readable().await?;
            match guard.try_io(|inner| inner.get_ref().recv_from(buf)) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    pub(super) async fn recv_reply(&self) -> Result<EchoReply> {
        let mut buf = [0u8; RECV_BUF_LEN];
        loop {
            let (len, addr) = self.recv_from(&mut buf).await?;
            let packet = Bytes::copy_from_slice(&buf[..len]);
            if let Some(reply) = Self::parse_reply(self.family, addr.ip(), packet) {
                return Ok(reply);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use tokio::time::{self, Duration};

    fn as_reply(request: Bytes, reply_type: u8) -> Bytes {
        let mut buf = BytesMut::from(&request[..]);
        buf[0] = reply_type;
        buf.freeze()
    }

    #[test]
    fn request_layout() {
        let buf = PingSocket::build_request(Family::V4, 0x0102, 42, PING_PACKET_LEN);
        assert_eq!(buf.len(), PING_PACKET_LEN);
        assert_eq!(&buf[..8], &[8, 0, 0, 0, 0, 0, 0x01, 0x02]);
        assert_eq!((&buf[8..16]).get_u64(), 42);
        assert!(buf[16..].iter().all(|b| *b == 1));

        let buf = PingSocket::build_request(Family::V6, 1, 0, PING_PACKET_LEN);
        assert_eq!(buf[0], 128);
    }

    #[test]
    fn parse_echoed_request() {
        let source = IpAddr::V6(Ipv6Addr::LOCALHOST);
        let request = PingSocket::build_request(Family::V6, 7, 1_500_000, PING_PACKET_LEN);
        let reply = PingSocket::parse_reply(Family::V6, source, as_reply(request, 129));
        assert_eq!(
            reply,
            Some(EchoReply {
                source,
                seq: 7,
                sent_nanos: 1_500_000,
            })
        );
    }

    #[test]
    fn parse_rejects_non_reply_and_short_packets() {
        let source = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let request = PingSocket::build_request(Family::V4, 7, 1, PING_PACKET_LEN);
        // destination unreachable
        assert!(PingSocket::parse_reply(Family::V4, source, as_reply(request.clone(), 3)).is_none());
        assert!(PingSocket::parse_reply(Family::V4, source, request.slice(..12)).is_none());
        assert!(PingSocket::parse_reply(Family::V4, source, as_reply(request, 0)).is_some());
    }

    #[tokio::test]
    async fn loopback_echo_comes_back_through_receive_buffer() {
        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let Ok(sock) = PingSocket::new(Family::V4) else {
            // unprivileged icmp sockets not permitted here
            return;
        };
        if sock.try_send_request(9, 77, localhost).is_err() {
            return;
        }
        let Ok(reply) = time::timeout(Duration::from_secs(2), sock.recv_reply()).await else {
            // kernel set to ignore echo requests
            return;
        };
        assert_eq!(
            reply.unwrap(),
            EchoReply {
                source: localhost,
                seq: 9,
                sent_nanos: 77,
            }
        );
    }
}
