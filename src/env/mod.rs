// The RL-facing side of the simulation: spaces, observations, reward and
// action application. The step cadence itself lives in the run loop; see
// Simulation::run for the reschedule-before-consume ordering.

mod reward;
mod sampler;
mod spaces;

pub use reward::RewardAccumulator;
pub use sampler::QueueSampler;
pub use spaces::{BoxSpace, SpaceDtype};

use std::sync::Arc;

use anyhow::Result;

use crate::cw::{CwController, CwTarget};
use crate::metrics::MetricsCollector;
use crate::node::Node;

pub struct WirelessEnv {
    sampler: QueueSampler,
    reward: RewardAccumulator,
    controller: CwController,
}

impl WirelessEnv {
    pub fn new(
        nodes: Vec<Arc<Node>>,
        metrics: MetricsCollector,
        payload_bytes: u32,
        controller: CwController,
    ) -> Self {
        Self {
            sampler: QueueSampler::new(nodes),
            reward: RewardAccumulator::new(metrics, payload_bytes),
            controller,
        }
    }

    pub fn observation_space(&self) -> BoxSpace {
        BoxSpace::observation(self.sampler.num_nodes())
    }

    pub fn action_space(&self) -> BoxSpace {
        BoxSpace::action()
    }

    /// The episode never terminates from inside; the driver decides when
    /// to stop stepping.
    pub fn is_done(&self) -> bool {
        false
    }

    /// Current backlog vector plus the diagnostic info string.
    pub fn observe(&self) -> (Vec<u32>, String) {
        let observation = self.sampler.sample_all();
        let info = format!("CW: {}", self.controller.last_applied());
        (observation, info)
    }

    pub fn step_reward(&mut self) -> f64 {
        self.reward.step_reward()
    }

    /// Validate the action payload and broadcast it as a uniform window
    /// (cw_min == cw_max) to every node. Zero is the no-op sentinel and
    /// is accepted; a malformed payload is a protocol violation and
    /// aborts the step.
    pub fn apply(&mut self, action: &[f64]) -> Result<()> {
        let [value] = action else {
            anyhow::bail!(
                "action payload must contain exactly one element, got {}",
                action.len()
            );
        };
        if !value.is_finite() || *value < 0.0 {
            anyhow::bail!("action value {value} is not a usable CW");
        }
        let cw = value.round() as u32;
        self.controller.set_cw(CwTarget::Broadcast, cw, cw)
    }
}
