//! Outbound gossip seam used by the transaction pool.
//!
//! Delivery is fire-and-forget; nothing in the ledger waits on peers.

use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Handshake,
    Disconnect,
    Ping,
    Pong,
    GetPeers,
    Peers,
    Tx,
    Block,
    GetChain,
    NotInChain,
    GetTxs,
}

impl MessageType {
    /// Wire code of the message type.
    pub fn code(self) -> u8 {
        match self {
            MessageType::Handshake => 0x00,
            MessageType::Disconnect => 0x01,
            MessageType::Ping => 0x02,
            MessageType::Pong => 0x03,
            MessageType::GetPeers => 0x10,
            MessageType::Peers => 0x11,
            MessageType::Tx => 0x12,
            MessageType::Block => 0x13,
            MessageType::GetChain => 0x14,
            MessageType::NotInChain => 0x15,
            MessageType::GetTxs => 0x16,
        }
    }
}

pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, kind: MessageType, payload: Vec<u8>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub kind: MessageType,
    pub payload: Vec<u8>,
}

/// Hands every broadcast to whoever holds the receiving end.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    sender: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelBroadcaster {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ChannelBroadcaster { sender }, receiver)
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn broadcast(&self, kind: MessageType, payload: Vec<u8>) {
        if self.sender.send(OutboundMessage { kind, payload }).is_err() {
            debug!("Dropping {:?} broadcast: no receiver", kind);
        }
    }
}

/// Broadcaster for nodes without peers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBroadcaster;

impl Broadcaster for NullBroadcaster {
    fn broadcast(&self, kind: MessageType, payload: Vec<u8>) {
        debug!("Discarding {:?} broadcast of {} bytes", kind, payload.len());
    }
}
