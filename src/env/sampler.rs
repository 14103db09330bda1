use std::sync::Arc;

use crate::node::Node;

/// Reads backlog off every node's MAC transmission queue. Pure reads, no
/// side effects. The enumeration order is the node registration order and
/// is identical on every call, so observation index i always refers to
/// the same node for the whole run.
pub struct QueueSampler {
    nodes: Vec<Arc<Node>>,
}

impl QueueSampler {
    pub fn new(nodes: Vec<Arc<Node>>) -> Self {
        Self { nodes }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn sample_all(&self) -> Vec<u32> {
        self.nodes.iter().map(|n| n.backlog() as u32).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Packet, PacketId};

    #[test]
    fn samples_in_registration_order() {
        let nodes: Vec<Arc<Node>> = (0..3).map(|id| Arc::new(Node::wifi_sta(id, 16))).collect();
        for _ in 0..4 {
            nodes[1]
                .contention_window()
                .unwrap()
                .enqueue(Packet::new(PacketId::new(0), 1, 1500));
        }
        nodes[2]
            .contention_window()
            .unwrap()
            .enqueue(Packet::new(PacketId::new(1), 2, 1500));

        let sampler = QueueSampler::new(nodes);
        assert_eq!(sampler.sample_all(), vec![0, 4, 1]);
        // Sampling is read-only; a second call sees the same state.
        assert_eq!(sampler.sample_all(), vec![0, 4, 1]);
    }

    #[test]
    fn length_is_invariant() {
        let nodes: Vec<Arc<Node>> = (0..5).map(|id| Arc::new(Node::wifi_sta(id, 16))).collect();
        let sampler = QueueSampler::new(nodes);
        for _ in 0..10 {
            assert_eq!(sampler.sample_all().len(), 5);
        }
    }
}
