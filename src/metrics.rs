use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use serde::Serialize;

use crate::network::NodeId;

// Cheap cloneable handle; every subsystem gets its own copy. The delivery
// counter has exactly one writer (the reception hook) and the reward
// accumulator only ever reads it.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    delivered_packets: AtomicU64,
    dropped_packets: AtomicU64,
    collisions: AtomicU64,
    flows: Mutex<HashMap<NodeId, FlowStats>>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FlowStats {
    pub rx_packets: u64,
    pub rx_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub src: NodeId,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub throughput_mbps: f64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                delivered_packets: AtomicU64::new(0),
                dropped_packets: AtomicU64::new(0),
                collisions: AtomicU64::new(0),
                flows: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn packet_delivered(&self, src: NodeId, bytes: u32) {
        self.inner.delivered_packets.fetch_add(1, Ordering::Relaxed);
        let mut flows = self.inner.flows.lock();
        let stats = flows.entry(src).or_default();
        stats.rx_packets += 1;
        stats.rx_bytes += bytes as u64;
    }

    /// Monotonic system-wide count of successfully received packets.
    pub fn delivered_packets(&self) -> u64 {
        self.inner.delivered_packets.load(Ordering::Relaxed)
    }

    pub fn packet_dropped(&self) {
        self.inner.dropped_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_packets(&self) -> u64 {
        self.inner.dropped_packets.load(Ordering::Relaxed)
    }

    pub fn collision(&self) {
        self.inner.collisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn collisions(&self) -> u64 {
        self.inner.collisions.load(Ordering::Relaxed)
    }

    /// Per-flow throughput over the whole run, sorted by source node.
    pub fn flow_report(&self, sim_duration: Duration) -> Vec<FlowReport> {
        let secs = sim_duration.as_secs_f64();
        let flows = self.inner.flows.lock();
        let mut report: Vec<FlowReport> = flows
            .iter()
            .map(|(src, stats)| FlowReport {
                src: *src,
                rx_packets: stats.rx_packets,
                rx_bytes: stats.rx_bytes,
                throughput_mbps: stats.rx_bytes as f64 * 8.0 / secs / 1_000_000.0,
            })
            .collect();
        report.sort_by_key(|r| r.src);
        report
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Append one CSV row per flow: timestamp, applied CW, station count, seed,
/// source node, throughput in Mbit/s.
pub fn append_flow_csv(
    path: &Path,
    reports: &[FlowReport],
    cw: u32,
    num_stations: u32,
    seed: u64,
) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let mut writer = csv::Writer::from_writer(file);
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();
    for report in reports {
        writer.write_record(&[
            timestamp.clone(),
            cw.to_string(),
            num_stations.to_string(),
            seed.to_string(),
            report.src.to_string(),
            format!("{:.4}", report.throughput_mbps),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_counter_is_monotonic_and_per_flow() {
        let metrics = MetricsCollector::new();
        metrics.packet_delivered(0, 1500);
        metrics.packet_delivered(0, 1500);
        metrics.packet_delivered(2, 1500);
        assert_eq!(metrics.delivered_packets(), 3);

        let report = metrics.flow_report(Duration::from_secs(1));
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].src, 0);
        assert_eq!(report[0].rx_packets, 2);
        assert_eq!(report[1].src, 2);
        assert_eq!(report[1].rx_packets, 1);
    }

    #[test]
    fn throughput_uses_run_duration() {
        let metrics = MetricsCollector::new();
        for _ in 0..10 {
            metrics.packet_delivered(1, 1500);
        }
        let report = metrics.flow_report(Duration::from_secs(10));
        // 10 packets * 1500 B * 8 / 10 s = 12 kbit/s
        assert!((report[0].throughput_mbps - 0.012).abs() < 1e-9);
    }

    #[test]
    fn drops_and_collisions_do_not_touch_deliveries() {
        let metrics = MetricsCollector::new();
        metrics.packet_dropped();
        metrics.collision();
        assert_eq!(metrics.delivered_packets(), 0);
        assert_eq!(metrics.dropped_packets(), 1);
        assert_eq!(metrics.collisions(), 1);
    }
}
