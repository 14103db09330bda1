// Offered-load generation. Sources don't own timers; they tell the event
// loop when the next arrival lands and the loop schedules it.

use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};

use crate::network::NodeId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrafficPattern {
    Constant { rate_pps: f64 },
    Bursty { avg_rate_pps: f64, burst_size: u32 },
    Poisson { lambda: f64 },
}

impl TrafficPattern {
    /// Constant-rate pattern carrying the given offered load in Mbit/s of
    /// application payload.
    pub fn constant_load_mbps(mbps: f64, payload_bytes: u32) -> Self {
        let rate_pps = mbps * 1_000_000.0 / (payload_bytes as f64 * 8.0);
        TrafficPattern::Constant { rate_pps }
    }
}

pub struct TrafficSource {
    node: NodeId,
    pattern: TrafficPattern,
    exp: Option<Exp<f64>>,
    start_delay: Duration,
}

impl TrafficSource {
    /// The source starts one second in plus a uniform sub-second fuzz, so
    /// stations never fire their first arrival in lockstep.
    pub fn new(node: NodeId, pattern: TrafficPattern, rng: &mut StdRng) -> Result<Self> {
        let exp = match &pattern {
            TrafficPattern::Poisson { lambda } => {
                if *lambda <= 0.0 {
                    anyhow::bail!("poisson lambda must be positive, got {lambda}");
                }
                Some(Exp::new(*lambda)?)
            }
            TrafficPattern::Constant { rate_pps } => {
                if *rate_pps <= 0.0 {
                    anyhow::bail!("constant rate must be positive, got {rate_pps}");
                }
                None
            }
            TrafficPattern::Bursty { avg_rate_pps, burst_size } => {
                if *avg_rate_pps <= 0.0 || *burst_size == 0 {
                    anyhow::bail!("bursty pattern needs a positive rate and burst size");
                }
                None
            }
        };
        let start_delay = Duration::from_secs_f64(1.0 + rng.gen_range(0.0..1.0));
        Ok(Self { node, pattern, exp, start_delay })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn start_delay(&self) -> Duration {
        self.start_delay
    }

    /// Packets enqueued per arrival event.
    pub fn arrival_burst(&self) -> u32 {
        match &self.pattern {
            TrafficPattern::Bursty { burst_size, .. } => *burst_size,
            _ => 1,
        }
    }

    pub fn next_delay(&self, rng: &mut StdRng) -> Duration {
        match (&self.pattern, &self.exp) {
            (TrafficPattern::Poisson { .. }, Some(exp)) => {
                Duration::from_secs_f64(exp.sample(rng))
            }
            (TrafficPattern::Constant { rate_pps }, _) => {
                Duration::from_secs_f64(1.0 / rate_pps)
            }
            (TrafficPattern::Bursty { avg_rate_pps, burst_size }, _) => {
                Duration::from_secs_f64(*burst_size as f64 / avg_rate_pps)
            }
            (TrafficPattern::Poisson { lambda }, None) => {
                // Unreachable by construction; fall back to the mean gap.
                Duration::from_secs_f64(1.0 / lambda)
            }
        }
    }
}
