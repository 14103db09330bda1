use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::traffic::TrafficPattern;

// IPv4 + UDP + LLC/SNAP headers; what is left of a frame is app payload.
pub const HEADER_OVERHEAD_BYTES: u32 = 20 + 8 + 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub name: String,
    pub num_stations: u32,
    pub sim_duration: Duration,
    pub step_interval: Duration,
    /// Broadcast to every node at setup when non-zero; zero keeps the
    /// 802.11 device defaults.
    pub initial_cw: u32,
    /// On-air frame size in bytes, headers included.
    pub packet_size: u32,
    pub queue_capacity: usize,
    pub phy_rate_bps: u64,
    pub slot_time: Duration,
    pub difs: Duration,
    pub seed: u64,
    pub traffic_pattern: TrafficPattern,
}

impl SimConfig {
    /// Application payload carried per delivered frame. The reward is
    /// denominated in these bytes, not raw frame bytes.
    pub fn payload_bytes(&self) -> u32 {
        self.packet_size - HEADER_OVERHEAD_BYTES
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_stations == 0 {
            anyhow::bail!("at least one station is required");
        }
        if self.packet_size <= HEADER_OVERHEAD_BYTES {
            anyhow::bail!(
                "packet size {} does not fit {} header bytes",
                self.packet_size,
                HEADER_OVERHEAD_BYTES
            );
        }
        if self.step_interval.is_zero() {
            anyhow::bail!("step interval must be positive");
        }
        if self.sim_duration.is_zero() {
            anyhow::bail!("simulation duration must be positive");
        }
        if self.phy_rate_bps == 0 {
            anyhow::bail!("phy rate must be positive");
        }
        Ok(())
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        let packet_size = 1500;
        Self {
            name: "airlink".to_string(),
            num_stations: 5,
            sim_duration: Duration::from_secs(10),
            step_interval: Duration::from_secs(1),
            initial_cw: 0,
            packet_size,
            queue_capacity: 1024,
            phy_rate_bps: 143_000_000,
            slot_time: Duration::from_micros(9),
            difs: Duration::from_micros(34),
            seed: 1,
            traffic_pattern: TrafficPattern::constant_load_mbps(
                150.0,
                packet_size - HEADER_OVERHEAD_BYTES,
            ),
        }
    }
}
