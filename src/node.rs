use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::network::{NodeId, Packet};

// 802.11 defaults; overridden by the initial CW broadcast or the agent.
pub const DEFAULT_CW_MIN: u32 = 15;
pub const DEFAULT_CW_MAX: u32 = 1023;

/// What the node's single net device is. Only Wi-Fi devices carry a MAC
/// transmission queue and a configurable contention window; addressing
/// anything else with a CW write is a configuration error, not a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    WifiSta,
    WifiAp,
    Wired,
}

pub struct WifiMac {
    queue: Mutex<VecDeque<Packet>>,
    capacity: usize,
    cw_min: AtomicU32,
    cw_max: AtomicU32,
}

impl WifiMac {
    fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity,
            cw_min: AtomicU32::new(DEFAULT_CW_MIN),
            cw_max: AtomicU32::new(DEFAULT_CW_MAX),
        }
    }

    /// Drop-tail: returns false when the queue is full and the packet
    /// was not admitted.
    pub fn enqueue(&self, packet: Packet) -> bool {
        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity {
            return false;
        }
        queue.push_back(packet);
        true
    }

    pub fn dequeue(&self) -> Option<Packet> {
        self.queue.lock().pop_front()
    }

    pub fn head_size_bytes(&self) -> Option<u32> {
        self.queue.lock().front().map(|p| p.size_bytes)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn cw_min(&self) -> u32 {
        self.cw_min.load(Ordering::Relaxed)
    }

    pub fn cw_max(&self) -> u32 {
        self.cw_max.load(Ordering::Relaxed)
    }

    pub fn set_cw_min(&self, value: u32) {
        self.cw_min.store(value, Ordering::Relaxed);
    }

    pub fn set_cw_max(&self, value: u32) {
        self.cw_max.store(value, Ordering::Relaxed);
    }
}

pub struct Node {
    id: NodeId,
    kind: DeviceKind,
    mac: Option<WifiMac>,
}

impl Node {
    pub fn wifi_sta(id: NodeId, queue_capacity: usize) -> Self {
        Self {
            id,
            kind: DeviceKind::WifiSta,
            mac: Some(WifiMac::new(queue_capacity)),
        }
    }

    pub fn wifi_ap(id: NodeId, queue_capacity: usize) -> Self {
        Self {
            id,
            kind: DeviceKind::WifiAp,
            mac: Some(WifiMac::new(queue_capacity)),
        }
    }

    pub fn wired(id: NodeId) -> Self {
        Self {
            id,
            kind: DeviceKind::Wired,
            mac: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Capability lookup for the configurable contention window. Absent
    /// when the device is not a Wi-Fi MAC; the caller decides whether
    /// absence is fatal.
    pub fn contention_window(&self) -> Option<&WifiMac> {
        self.mac.as_ref()
    }

    /// Current MAC transmission queue depth. Devices without a MAC queue
    /// have nothing pending by definition.
    pub fn backlog(&self) -> usize {
        self.mac.as_ref().map(|m| m.queue_len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::PacketId;

    #[test]
    fn drop_tail_at_capacity() {
        let node = Node::wifi_sta(0, 2);
        let mac = node.contention_window().unwrap();
        assert!(mac.enqueue(Packet::new(PacketId::new(0), 0, 1500)));
        assert!(mac.enqueue(Packet::new(PacketId::new(1), 0, 1500)));
        assert!(!mac.enqueue(Packet::new(PacketId::new(2), 0, 1500)));
        assert_eq!(node.backlog(), 2);
    }

    #[test]
    fn wired_node_has_no_contention_window() {
        let node = Node::wired(3);
        assert!(node.contention_window().is_none());
        assert_eq!(node.backlog(), 0);
    }

    #[test]
    fn default_window_is_80211() {
        let node = Node::wifi_sta(0, 16);
        let mac = node.contention_window().unwrap();
        assert_eq!(mac.cw_min(), DEFAULT_CW_MIN);
        assert_eq!(mac.cw_max(), DEFAULT_CW_MAX);
    }
}
