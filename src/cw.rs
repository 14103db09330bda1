// Contention-window control. Zero is not a legal CW value; it is the
// "leave this bound unchanged" sentinel, so set_cw(_, 0, 0) is a no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Result;
use tracing::debug;

use crate::network::NodeId;
use crate::node::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CwTarget {
    Node(NodeId),
    Broadcast,
}

/// Last CW accepted by the controller, kept for diagnostic reporting only.
/// The controller is the sole writer; the environment's info string reads it.
#[derive(Debug, Default)]
pub struct CwState(AtomicU32);

impl CwState {
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    fn set(&self, value: u32) {
        self.0.store(value, Ordering::Relaxed);
    }
}

pub struct CwController {
    nodes: Vec<Arc<Node>>,
    state: Arc<CwState>,
}

impl CwController {
    pub fn new(nodes: Vec<Arc<Node>>, state: Arc<CwState>) -> Self {
        Self { nodes, state }
    }

    /// Set cw_min / cw_max on one node or on all of them. A zero bound is
    /// left unchanged. Addressing a device without a configurable
    /// contention window is a configuration error and fails the run; a
    /// silently skipped write would leave the agent's action with no
    /// effect and corrupt the reward signal.
    pub fn set_cw(&self, target: CwTarget, min_value: u32, max_value: u32) -> Result<()> {
        match target {
            CwTarget::Broadcast => {
                for node in &self.nodes {
                    Self::apply(node, min_value, max_value)?;
                }
            }
            CwTarget::Node(id) => {
                let node = self
                    .nodes
                    .iter()
                    .find(|n| n.id() == id)
                    .ok_or_else(|| anyhow::anyhow!("no node with id {id}"))?;
                Self::apply(node, min_value, max_value)?;
            }
        }
        if min_value != 0 {
            self.state.set(min_value);
        }
        Ok(())
    }

    fn apply(node: &Node, min_value: u32, max_value: u32) -> Result<()> {
        let Some(mac) = node.contention_window() else {
            anyhow::bail!(
                "node {} ({:?}) has no configurable contention window",
                node.id(),
                node.kind()
            );
        };
        if min_value != 0 {
            debug!(node = node.id(), cw_min = min_value, "set CW min");
            mac.set_cw_min(min_value);
        }
        if max_value != 0 {
            debug!(node = node.id(), cw_max = max_value, "set CW max");
            mac.set_cw_max(max_value);
        }
        Ok(())
    }

    pub fn last_applied(&self) -> u32 {
        self.state.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{DEFAULT_CW_MAX, DEFAULT_CW_MIN};

    fn controller(n: usize) -> (CwController, Vec<Arc<Node>>) {
        let nodes: Vec<Arc<Node>> = (0..n).map(|id| Arc::new(Node::wifi_sta(id, 16))).collect();
        let controller = CwController::new(nodes.clone(), Arc::new(CwState::default()));
        (controller, nodes)
    }

    #[test]
    fn zero_zero_broadcast_is_a_noop() {
        let (controller, nodes) = controller(3);
        controller.set_cw(CwTarget::Broadcast, 0, 0).unwrap();
        assert_eq!(controller.last_applied(), 0);
        for node in &nodes {
            let mac = node.contention_window().unwrap();
            assert_eq!(mac.cw_min(), DEFAULT_CW_MIN);
            assert_eq!(mac.cw_max(), DEFAULT_CW_MAX);
        }
    }

    #[test]
    fn broadcast_sets_fixed_window_on_every_node() {
        let (controller, nodes) = controller(3);
        controller.set_cw(CwTarget::Broadcast, 8, 8).unwrap();
        assert_eq!(controller.last_applied(), 8);
        // Read back on at least two distinct nodes.
        for node in [&nodes[0], &nodes[2]] {
            let mac = node.contention_window().unwrap();
            assert_eq!(mac.cw_min(), 8);
            assert_eq!(mac.cw_max(), 8);
        }
    }

    #[test]
    fn zero_bound_leaves_that_bound_unchanged() {
        let (controller, nodes) = controller(1);
        controller.set_cw(CwTarget::Node(0), 0, 64).unwrap();
        let mac = nodes[0].contention_window().unwrap();
        assert_eq!(mac.cw_min(), DEFAULT_CW_MIN);
        assert_eq!(mac.cw_max(), 64);
        // Max-only writes are not reflected in the diagnostic state.
        assert_eq!(controller.last_applied(), 0);

        controller.set_cw(CwTarget::Node(0), 32, 0).unwrap();
        assert_eq!(mac.cw_min(), 32);
        assert_eq!(mac.cw_max(), 64);
        assert_eq!(controller.last_applied(), 32);
    }

    #[test]
    fn unsupported_device_fails_loudly() {
        let nodes = vec![
            Arc::new(Node::wifi_sta(0, 16)),
            Arc::new(Node::wired(1)),
        ];
        let controller = CwController::new(nodes, Arc::new(CwState::default()));
        let err = controller
            .set_cw(CwTarget::Broadcast, 16, 16)
            .unwrap_err();
        assert!(err.to_string().contains("no configurable contention window"));

        let err = controller.set_cw(CwTarget::Node(1), 16, 16).unwrap_err();
        assert!(err.to_string().contains("no configurable contention window"));
    }

    #[test]
    fn unknown_node_id_is_an_error() {
        let (controller, _) = controller(2);
        assert!(controller.set_cw(CwTarget::Node(9), 16, 16).is_err());
    }
}
