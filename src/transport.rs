//! Bus transports.
//!
//! The bus is a point-to-multipoint, unreliable datagram medium: every
//! attached endpoint sees every frame, including the ones it sent itself.
//! Sends are fire-and-forget.

use crate::config::BusConfig;
use crate::error::TransportError;
use crate::protocol::{Frame, DATAGRAM_LEN};
use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

const LOOPBACK_CAPACITY: usize = 256;
// Room for oversized datagrams so they are rejected, not truncated.
const RECV_BUFFER_SIZE: usize = 64;

#[async_trait]
pub trait FrameBus: Send + Sync {
    /// Emit one frame. No acknowledgement and no retry.
    async fn send(&self, frame: &Frame) -> Result<(), TransportError>;

    /// Wait for the next frame on the bus.
    async fn recv(&self) -> Result<Frame, TransportError>;

    /// Human-readable transport name for logging.
    fn name(&self) -> &'static str;
}

/// Bus realized as a UDP multicast group. Several processes on one host
/// can share the group because the port is bound with address reuse and
/// multicast loopback stays on.
///
/// Each datagram carries one frame in the 13-byte layout of
/// [`Frame::encode`]. This is not python-can's msgpack-based
/// `udp_multicast` encoding, so tools built on python-can cannot share a
/// group with this bus.
#[derive(Debug)]
pub struct UdpMulticastBus {
    socket: UdpSocket,
    target: SocketAddrV4,
}

impl UdpMulticastBus {
    pub async fn bind(config: &BusConfig) -> Result<Self, TransportError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        let local = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port);
        socket.bind(&SocketAddr::V4(local).into())?;

        let socket = UdpSocket::from_std(socket.into())?;
        socket.join_multicast_v4(config.group, config.interface)?;
        socket.set_multicast_loop_v4(config.multicast_loop)?;

        info!(
            group = %config.group,
            port = config.port,
            interface = %config.interface,
            "joined multicast bus"
        );

        Ok(Self {
            socket,
            target: SocketAddrV4::new(config.group, config.port),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait]
impl FrameBus for UdpMulticastBus {
    async fn send(&self, frame: &Frame) -> Result<(), TransportError> {
        self.socket.send_to(&frame.encode(), self.target).await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Frame, TransportError> {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let (len, peer) = self.socket.recv_from(&mut buf).await?;
        if len != DATAGRAM_LEN {
            debug!(%peer, len, "unexpected datagram size");
        }
        Ok(Frame::decode(&buf[..len])?)
    }

    fn name(&self) -> &'static str {
        "udp_multicast"
    }
}

/// In-process bus backed by a broadcast channel. Each endpoint receives
/// every frame sent by any endpoint, its own included.
#[derive(Debug)]
pub struct LoopbackBus {
    tx: broadcast::Sender<Frame>,
    rx: Mutex<broadcast::Receiver<Frame>>,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::with_capacity(LOOPBACK_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = broadcast::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Attach another endpoint to the same bus. It only sees frames sent
    /// after it was created.
    pub fn endpoint(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: Mutex::new(self.tx.subscribe()),
        }
    }

    /// Non-blocking receive, `None` when nothing is queued.
    pub async fn try_recv(&self) -> Option<Frame> {
        self.rx.lock().await.try_recv().ok()
    }
}

impl Default for LoopbackBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameBus for LoopbackBus {
    async fn send(&self, frame: &Frame) -> Result<(), TransportError> {
        self.tx
            .send(frame.clone())
            .map(|_| ())
            .map_err(|_| TransportError::Closed)
    }

    async fn recv(&self) -> Result<Frame, TransportError> {
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Ok(frame) => Ok(frame),
            Err(broadcast::error::RecvError::Closed) => Err(TransportError::Closed),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                Err(TransportError::Lagged(skipped))
            }
        }
    }

    fn name(&self) -> &'static str {
        "loopback"
    }
}
