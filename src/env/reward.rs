use crate::metrics::MetricsCollector;

/// Turns the monotonic delivery counter into a per-step throughput reward.
/// Stateful and order-dependent: each call banks the counter as the next
/// call's baseline, so two calls with no delivery in between return 0.0
/// the second time.
pub struct RewardAccumulator {
    metrics: MetricsCollector,
    payload_bytes: u32,
    baseline: u64,
}

impl RewardAccumulator {
    pub fn new(metrics: MetricsCollector, payload_bytes: u32) -> Self {
        Self {
            metrics,
            payload_bytes,
            baseline: 0,
        }
    }

    /// Mbit of application payload delivered since the previous call.
    pub fn step_reward(&mut self) -> f64 {
        let delivered = self.metrics.delivered_packets();
        let delta = delivered - self.baseline;
        self.baseline = delivered;
        delta as f64 * self.payload_bytes as f64 * 8.0 / 1_000_000.0
    }

    #[cfg(test)]
    fn baseline(&self) -> u64 {
        self.baseline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ten_packets_of_reference_payload() {
        let metrics = MetricsCollector::new();
        let mut reward = RewardAccumulator::new(metrics.clone(), 1464);
        for _ in 0..10 {
            metrics.packet_delivered(0, 1500);
        }
        let value = reward.step_reward();
        assert!((value - 0.11712).abs() < 1e-12);
    }

    #[test]
    fn second_call_without_deliveries_is_zero() {
        let metrics = MetricsCollector::new();
        let mut reward = RewardAccumulator::new(metrics.clone(), 1464);
        metrics.packet_delivered(0, 1500);
        assert!(reward.step_reward() > 0.0);
        assert_eq!(reward.step_reward(), 0.0);
        assert_eq!(reward.baseline(), metrics.delivered_packets());
    }

    #[test]
    fn zero_delta_before_any_delivery() {
        let metrics = MetricsCollector::new();
        let mut reward = RewardAccumulator::new(metrics, 1464);
        assert_eq!(reward.step_reward(), 0.0);
    }

    proptest! {
        // Rewards partition the counter: however deliveries are spread
        // across steps, the per-step deltas sum back to the total, and
        // the baseline always equals the counter as of the last call.
        #[test]
        fn rewards_conserve_delivered_packets(deliveries in proptest::collection::vec(0u64..50, 1..20)) {
            let metrics = MetricsCollector::new();
            let mut reward = RewardAccumulator::new(metrics.clone(), 1464);
            let mut total_reward = 0.0;
            for batch in &deliveries {
                for _ in 0..*batch {
                    metrics.packet_delivered(0, 1500);
                }
                total_reward += reward.step_reward();
                prop_assert_eq!(reward.baseline(), metrics.delivered_packets());
            }
            let total: u64 = deliveries.iter().sum();
            let expected = total as f64 * 1464.0 * 8.0 / 1_000_000.0;
            prop_assert!((total_reward - expected).abs() < 1e-9);
        }
    }
}
