use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::{lookup_host, UdpSocket};
use tokio::time::{timeout_at, Instant};

use crate::error::SourceQueryError;
use crate::handshake::{Handshake, Reply, Step};
use crate::packet::MAX_PACKET_SIZE;

/// One UDP socket and one deadline, alive for exactly one query.
///
/// The socket closes when the session is dropped, so every exit from
/// [QuerySession::run] releases it.
#[derive(Debug)]
pub struct QuerySession {
    sock: UdpSocket,
    deadline: Instant,
}

impl QuerySession {
    /// Bind an ephemeral port and connect it to `host:port`.
    ///
    /// The deadline starts now; name resolution and every later
    /// send and receive all count against it.
    pub async fn open(host: &str, port: u16, timeout_dur: Duration) -> Result<Self, SourceQueryError> {
        // just arbitrarily bind any port, doesn't matter really
        let sock: UdpSocket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(SourceQueryError::FailedPortBind)?;
        let deadline: Instant = Instant::now() + timeout_dur;

        let addr: SocketAddr = timeout_at(deadline, resolve_v4(host, port)).await??;
        sock.connect(addr)
            .await
            .map_err(SourceQueryError::UnreachableHost)?;
        log::trace!("session bound to {:?}, talking to {}", sock.local_addr().ok(), addr);

        Ok(QuerySession { sock, deadline })
    }

    /// Drive `handshake` to a terminal state, or fail at the deadline.
    pub async fn run(self, mut handshake: Handshake) -> Result<Reply, SourceQueryError> {
        log::debug!("sending {:?} request", handshake.kind());
        self.send(&handshake.initial_request()).await?;

        let mut buf: [u8; MAX_PACKET_SIZE] = [0u8; MAX_PACKET_SIZE];
        loop {
            let len: usize = timeout_at(self.deadline, self.sock.recv(&mut buf))
                .await?
                .map_err(SourceQueryError::ReceiveError)?;
            log::trace!("received {} byte datagram", len);

            match handshake.on_datagram(&buf[..len])? {
                Step::Resend(request) => self.send(&request).await?,
                Step::Done(reply) => return Ok(reply),
            }
        }
    }

    async fn send(&self, packet: &[u8]) -> Result<(), SourceQueryError> {
        timeout_at(self.deadline, self.sock.send(packet))
            .await?
            .map_err(SourceQueryError::SendError)?;
        Ok(())
    }
}

/// First IPv4 address `host` resolves to.
async fn resolve_v4(host: &str, port: u16) -> Result<SocketAddr, SourceQueryError> {
    let mut addrs = lookup_host((host, port))
        .await
        .map_err(SourceQueryError::UnreachableHost)?;
    addrs
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| SourceQueryError::NoIpv4Address(host.to_owned()))
}
