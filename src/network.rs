use serde::{Deserialize, Serialize};

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PacketId(pub u64);

impl PacketId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: PacketId,
    pub src: NodeId,
    pub size_bytes: u32,
}

impl Packet {
    pub fn new(id: PacketId, src: NodeId, size_bytes: u32) -> Self {
        Self { id, src, size_bytes }
    }
}
