//! Radio transport adapters.
//!
//! The radio itself is external: all the dispatchers need is "send these bytes to
//! that address" and "give me whatever arrived". Two adapters ship here: an
//! in-memory shared medium for tests and simulation, and UDP datagrams as a bench
//! stand-in for the radio.

use crate::error::LinkError;
use async_trait::async_trait;
use boatwatch_wire::NodeId;
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, trace};

/// Largest datagram the radio carries
pub const MAX_DATAGRAM_SIZE: usize = 255;

/// Delivery guarantee requested for one send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Fire and forget
    BestEffort,
    /// The transport confirms receipt (retrying as it sees fit) or reports failure
    Acknowledged,
}

/// One received datagram
#[derive(Debug, Clone, PartialEq)]
pub struct RadioFrame {
    /// Link-layer sender
    pub from: NodeId,
    /// Raw bytes as received
    pub bytes: Bytes,
    /// Receiver-measured signal strength (dBm)
    pub rssi_dbm: Option<i16>,
    /// Receiver-measured signal-to-noise ratio (dB)
    pub snr_db: Option<f32>,
}

/// Send/receive keyed by small integer addresses
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// This endpoint's address
    fn local_address(&self) -> NodeId;

    /// Send `bytes` to `to`; [`NodeId::BROADCAST`] reaches every other endpoint
    async fn send(&self, to: NodeId, bytes: &[u8], delivery: Delivery) -> Result<(), LinkError>;

    /// Next received datagram, or `None` if nothing is waiting
    async fn poll(&self) -> Result<Option<RadioFrame>, LinkError>;
}

/// Shared in-memory medium connecting [`ChannelTransport`] endpoints
#[derive(Debug, Clone, Default)]
pub struct ChannelAir {
    endpoints: Arc<DashMap<NodeId, mpsc::UnboundedSender<RadioFrame>>>,
}

impl ChannelAir {
    /// Create an empty medium
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an endpoint at `address`, replacing any previous one
    pub fn attach(&self, address: NodeId) -> ChannelTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        self.endpoints.insert(address, tx);
        debug!("Attached endpoint {} to channel air", address);
        ChannelTransport {
            address,
            air: self.clone(),
            rx: Mutex::new(rx),
            rssi_dbm: -60,
        }
    }

    /// Number of attached endpoints
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether nothing is attached
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// In-memory transport endpoint
#[derive(Debug)]
pub struct ChannelTransport {
    address: NodeId,
    air: ChannelAir,
    rx: Mutex<mpsc::UnboundedReceiver<RadioFrame>>,
    rssi_dbm: i16,
}

impl ChannelTransport {
    /// Signal strength stamped on frames sent from this endpoint
    pub fn with_rssi(mut self, rssi_dbm: i16) -> Self {
        self.rssi_dbm = rssi_dbm;
        self
    }

    fn frame(&self, bytes: &[u8]) -> RadioFrame {
        RadioFrame {
            from: self.address,
            bytes: Bytes::copy_from_slice(bytes),
            rssi_dbm: Some(self.rssi_dbm),
            snr_db: Some(9.5),
        }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    fn local_address(&self) -> NodeId {
        self.address
    }

    async fn send(&self, to: NodeId, bytes: &[u8], delivery: Delivery) -> Result<(), LinkError> {
        if to.is_broadcast() {
            for entry in self.air.endpoints.iter() {
                if *entry.key() != self.address {
                    let _ = entry.value().send(self.frame(bytes));
                }
            }
            trace!("{} broadcast {} bytes", self.address, bytes.len());
            return Ok(());
        }

        let delivered = self
            .air
            .endpoints
            .get(&to)
            .map(|endpoint| endpoint.send(self.frame(bytes)).is_ok())
            .unwrap_or(false);

        match (delivered, delivery) {
            (true, _) => Ok(()),
            (false, Delivery::Acknowledged) => Err(LinkError::NotAcknowledged(to)),
            (false, Delivery::BestEffort) => {
                debug!("No endpoint at {}, frame lost", to);
                Ok(())
            }
        }
    }

    async fn poll(&self) -> Result<Option<RadioFrame>, LinkError> {
        let mut rx = self.rx.lock().await;
        match rx.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(LinkError::Closed),
        }
    }
}

/// UDP transport with a static address book
#[derive(Debug)]
pub struct UdpTransport {
    address: NodeId,
    socket: Arc<UdpSocket>,
    peers: DashMap<NodeId, SocketAddr>,
    reverse: DashMap<SocketAddr, NodeId>,
}

impl UdpTransport {
    /// Bind `bind_addr` as node `address`, knowing `peers`
    pub async fn bind(
        address: NodeId,
        bind_addr: SocketAddr,
        peers: HashMap<NodeId, SocketAddr>,
    ) -> Result<Self, LinkError> {
        let socket = UdpSocket::bind(bind_addr).await?;
        info!(
            "UDP transport for {} bound on {} with {} peers",
            address,
            socket.local_addr()?,
            peers.len()
        );

        let transport = Self {
            address,
            socket: Arc::new(socket),
            peers: DashMap::new(),
            reverse: DashMap::new(),
        };
        for (id, addr) in peers {
            transport.add_peer(id, addr);
        }
        Ok(transport)
    }

    /// Add or replace a peer address
    pub fn add_peer(&self, id: NodeId, addr: SocketAddr) {
        if let Some(old) = self.peers.insert(id, addr) {
            self.reverse.remove(&old);
        }
        self.reverse.insert(addr, id);
    }

    /// Bound socket address
    pub fn local_addr(&self) -> Result<SocketAddr, LinkError> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn local_address(&self) -> NodeId {
        self.address
    }

    async fn send(&self, to: NodeId, bytes: &[u8], _delivery: Delivery) -> Result<(), LinkError> {
        if to.is_broadcast() {
            // Copy addresses out so no map guard is held across an await
            let targets: Vec<SocketAddr> = self.peers.iter().map(|e| *e.value()).collect();
            for addr in targets {
                self.socket.send_to(bytes, addr).await?;
            }
            return Ok(());
        }

        let addr = self
            .peers
            .get(&to)
            .map(|e| *e.value())
            .ok_or(LinkError::UnknownPeer(to))?;
        self.socket.send_to(bytes, addr).await?;
        Ok(())
    }

    async fn poll(&self) -> Result<Option<RadioFrame>, LinkError> {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (len, addr) = match self.socket.try_recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) => return Err(e.into()),
            };

            match self.reverse.get(&addr).map(|e| *e.value()) {
                Some(from) => {
                    return Ok(Some(RadioFrame {
                        from,
                        bytes: Bytes::copy_from_slice(&buf[..len]),
                        rssi_dbm: None,
                        snr_db: None,
                    }))
                }
                None => debug!("Ignoring {} bytes from unknown address {}", len, addr),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_channel_unicast_and_broadcast() {
        let air = ChannelAir::new();
        let hub = air.attach(NodeId::HUB);
        let node1 = air.attach(NodeId(1)).with_rssi(-72);
        let node2 = air.attach(NodeId(2));
        assert_eq!(air.len(), 3);

        node1.send(NodeId::HUB, &[1, 2, 3], Delivery::BestEffort).await.unwrap();
        let frame = hub.poll().await.unwrap().unwrap();
        assert_eq!(frame.from, NodeId(1));
        assert_eq!(frame.bytes.as_ref(), &[1, 2, 3]);
        assert_eq!(frame.rssi_dbm, Some(-72));
        assert!(hub.poll().await.unwrap().is_none());

        hub.send(NodeId::BROADCAST, &[9], Delivery::BestEffort).await.unwrap();
        assert!(node1.poll().await.unwrap().is_some());
        assert!(node2.poll().await.unwrap().is_some());
        assert!(hub.poll().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_channel_missing_peer() {
        let air = ChannelAir::new();
        let hub = air.attach(NodeId::HUB);
        assert!(hub.send(NodeId(7), &[0], Delivery::BestEffort).await.is_ok());
        assert!(matches!(
            hub.send(NodeId(7), &[0], Delivery::Acknowledged).await,
            Err(LinkError::NotAcknowledged(NodeId(7)))
        ));
    }

    #[tokio::test]
    async fn test_udp_round_trip() {
        let localhost: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let a = UdpTransport::bind(NodeId(1), localhost, HashMap::new()).await.unwrap();
        let b = UdpTransport::bind(NodeId(2), localhost, HashMap::new()).await.unwrap();
        a.add_peer(NodeId(2), b.local_addr().unwrap());
        b.add_peer(NodeId(1), a.local_addr().unwrap());

        a.send(NodeId(2), &[0xAB, 0xCD], Delivery::Acknowledged).await.unwrap();

        let mut received = None;
        for _ in 0..100 {
            if let Some(frame) = b.poll().await.unwrap() {
                received = Some(frame);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let frame = received.expect("datagram not received");
        assert_eq!(frame.from, NodeId(1));
        assert_eq!(frame.bytes.as_ref(), &[0xAB, 0xCD]);

        assert!(matches!(
            a.send(NodeId(9), &[0], Delivery::BestEffort).await,
            Err(LinkError::UnknownPeer(NodeId(9)))
        ));
    }
}
