// Slotted contention model for the shared medium. One transmission (or
// collision) at a time; whoever draws the lowest backoff count wins the
// round. The window doubles on collision and snaps back to cw_min on
// success, so min == max pins a fixed window regardless of history.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::engine::{Event, EventQueue};
use crate::metrics::MetricsCollector;
use crate::network::{NodeId, Packet};
use crate::node::Node;

pub type DeliveryHook = Arc<dyn Fn(&Packet) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediumState {
    Idle,
    Contending,
    Busy,
}

pub struct Medium {
    state: MediumState,
    slot_time: Duration,
    difs: Duration,
    phy_rate_bps: u64,
    // Current window per station, tracked between rounds for the
    // exponential ramp. Always clamped into [cw_min, cw_max] at draw
    // time so agent writes take effect immediately.
    current_cw: HashMap<NodeId, u32>,
    in_flight: Vec<NodeId>,
    delivery_hook: Option<DeliveryHook>,
    metrics: MetricsCollector,
}

impl Medium {
    pub fn new(
        slot_time: Duration,
        difs: Duration,
        phy_rate_bps: u64,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            state: MediumState::Idle,
            slot_time,
            difs,
            phy_rate_bps,
            current_cw: HashMap::new(),
            in_flight: Vec::new(),
            delivery_hook: None,
            metrics,
        }
    }

    /// Registered once at setup; fires for every successful reception.
    pub fn set_delivery_hook(&mut self, hook: DeliveryHook) {
        self.delivery_hook = Some(hook);
    }

    pub fn is_idle(&self) -> bool {
        self.state == MediumState::Idle
    }

    /// Kick a contention round if the medium is sitting idle. Called when
    /// a packet lands on a previously drained network.
    pub fn on_packet_queued(&mut self, queue: &mut EventQueue) {
        if self.state == MediumState::Idle {
            self.state = MediumState::Contending;
            queue.schedule(self.difs, Event::ContentionRound);
        }
    }

    pub fn contention_round(
        &mut self,
        nodes: &[Arc<Node>],
        rng: &mut StdRng,
        queue: &mut EventQueue,
    ) {
        let mut draws: Vec<(NodeId, u32)> = Vec::new();
        for node in nodes {
            let Some(mac) = node.contention_window() else {
                continue;
            };
            if mac.queue_len() == 0 {
                continue;
            }
            let lo = mac.cw_min();
            let hi = mac.cw_max().max(lo);
            let cw = self.current_cw.entry(node.id()).or_insert(lo);
            *cw = (*cw).clamp(lo, hi);
            draws.push((node.id(), rng.gen_range(0..=*cw)));
        }

        let Some(&(_, min_slots)) = draws.iter().min_by_key(|(_, slots)| *slots) else {
            // Nothing backlogged; the next arrival restarts contention.
            self.state = MediumState::Idle;
            return;
        };

        self.in_flight = draws
            .iter()
            .filter(|(_, slots)| *slots == min_slots)
            .map(|(id, _)| *id)
            .collect();
        self.state = MediumState::Busy;

        let frame_bytes = self
            .in_flight
            .iter()
            .filter_map(|id| nodes[*id].contention_window()?.head_size_bytes())
            .max()
            .unwrap_or(0);
        let airtime = self.tx_duration(frame_bytes);
        debug!(
            winners = self.in_flight.len(),
            slots = min_slots,
            "contention round resolved"
        );
        queue.schedule(self.slot_time * min_slots + airtime, Event::TxEnd);
    }

    pub fn tx_end(&mut self, nodes: &[Arc<Node>], queue: &mut EventQueue) {
        let transmitters = std::mem::take(&mut self.in_flight);
        match transmitters[..] {
            [] => {}
            [winner] => {
                let mac = nodes[winner]
                    .contention_window()
                    .expect("winner was drawn from wifi nodes");
                if let Some(packet) = mac.dequeue() {
                    if let Some(hook) = &self.delivery_hook {
                        hook(&packet);
                    }
                }
                self.current_cw.insert(winner, mac.cw_min());
            }
            _ => {
                // Everyone who hit the same slot loses; frames stay queued
                // head-of-line and the windows open up.
                self.metrics.collision();
                for &id in &transmitters {
                    let mac = nodes[id]
                        .contention_window()
                        .expect("collider was drawn from wifi nodes");
                    let hi = mac.cw_max().max(mac.cw_min());
                    let cw = self.current_cw.entry(id).or_insert_with(|| mac.cw_min());
                    *cw = (*cw * 2 + 1).min(hi);
                }
            }
        }

        self.state = MediumState::Contending;
        queue.schedule(self.difs, Event::ContentionRound);
    }

    fn tx_duration(&self, frame_bytes: u32) -> Duration {
        Duration::from_secs_f64(frame_bytes as f64 * 8.0 / self.phy_rate_bps as f64)
    }
}
