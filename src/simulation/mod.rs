// Ties the pieces together: builds the topology from config, seeds the
// event timeline and drives the single-task event loop. All simulation
// state is touched from this one logical thread of control.

pub mod config;

pub use config::SimConfig;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::agent::{AgentChannel, EnvMessage};
use crate::cw::{CwController, CwState, CwTarget};
use crate::engine::{Event, EventQueue};
use crate::env::WirelessEnv;
use crate::mac::Medium;
use crate::metrics::{FlowReport, MetricsCollector};
use crate::network::{NodeId, Packet, PacketId};
use crate::node::Node;
use crate::traffic::TrafficSource;

#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub name: String,
    pub sim_duration: Duration,
    pub flows: Vec<FlowReport>,
    pub delivered_packets: u64,
    pub dropped_packets: u64,
    pub collisions: u64,
    pub final_cw: u32,
    pub steps: u64,
}

pub struct Simulation {
    config: SimConfig,
    // Station i is nodes[i]; the AP is registered last. Event handlers
    // index straight into this, so ids and positions must stay equal.
    nodes: Vec<Arc<Node>>,
    queue: EventQueue,
    medium: Medium,
    sources: Vec<TrafficSource>,
    agent: Option<(WirelessEnv, AgentChannel)>,
    pub metrics: MetricsCollector,
    cw_state: Arc<CwState>,
    rng: StdRng,
    cancel: CancellationToken,
    packet_seq: u64,
    steps: u64,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let metrics = MetricsCollector::new();

        let num_stations = config.num_stations as usize;
        let mut nodes: Vec<Arc<Node>> = (0..num_stations)
            .map(|id| Arc::new(Node::wifi_sta(id, config.queue_capacity)))
            .collect();
        nodes.push(Arc::new(Node::wifi_ap(num_stations, config.queue_capacity)));

        let mut medium = Medium::new(
            config.slot_time,
            config.difs,
            config.phy_rate_bps,
            metrics.clone(),
        );
        let hook_metrics = metrics.clone();
        medium.set_delivery_hook(Arc::new(move |packet: &Packet| {
            hook_metrics.packet_delivered(packet.src, packet.size_bytes);
        }));

        let sources = (0..num_stations)
            .map(|id| {
                TrafficSource::new(id, config.traffic_pattern.clone(), &mut rng)
                    .with_context(|| format!("traffic source for station {id}"))
            })
            .collect::<Result<Vec<_>>>()?;

        let cw_state = Arc::new(CwState::default());
        if config.initial_cw != 0 {
            info!(cw = config.initial_cw, "applying initial contention window");
            CwController::new(nodes.clone(), cw_state.clone()).set_cw(
                CwTarget::Broadcast,
                config.initial_cw,
                config.initial_cw,
            )?;
        }

        Ok(Self {
            config,
            nodes,
            queue: EventQueue::new(),
            medium,
            sources,
            agent: None,
            metrics,
            cw_state,
            rng,
            cancel: CancellationToken::new(),
            packet_seq: 0,
            steps: 0,
        })
    }

    /// Attach the RL control loop. Without an agent the run is a plain
    /// fixed-CW simulation.
    pub fn with_agent(mut self, channel: AgentChannel) -> Self {
        let env = WirelessEnv::new(
            self.nodes.clone(),
            self.metrics.clone(),
            self.config.payload_bytes(),
            CwController::new(self.nodes.clone(), self.cw_state.clone()),
        );
        self.agent = Some((env, channel));
        self
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn last_applied_cw(&self) -> u32 {
        self.cw_state.get()
    }

    /// Token for stopping the run from outside; cancelling halts the
    /// step scheduler and releases the agent channel cleanly.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&mut self) -> Result<SimReport> {
        info!(
            stations = self.config.num_stations,
            duration_s = self.config.sim_duration.as_secs_f64(),
            step_s = self.config.step_interval.as_secs_f64(),
            "starting simulation"
        );

        for source in &self.sources {
            self.queue
                .schedule(source.start_delay(), Event::TrafficArrival { node: source.node() });
        }
        if let Some((env, channel)) = &mut self.agent {
            // Space descriptors go out once, at connection setup.
            channel
                .send(&EnvMessage::Init {
                    observation_space: env.observation_space(),
                    action_space: env.action_space(),
                })
                .await?;
            // First state read fires at t = 0, before any traffic.
            self.queue.schedule(Duration::ZERO, Event::EnvStep);
        }

        let result = self.event_loop().await;

        if let Some((_, channel)) = &mut self.agent {
            // Best effort; the agent may already be gone.
            let _ = channel.send(&EnvMessage::Stop).await;
        }
        result?;

        let report = self.report();
        info!(
            delivered = report.delivered_packets,
            dropped = report.dropped_packets,
            collisions = report.collisions,
            steps = report.steps,
            "simulation finished"
        );
        Ok(report)
    }

    async fn event_loop(&mut self) -> Result<()> {
        while let Some((at, event)) = self.queue.pop() {
            if at > self.config.sim_duration {
                break;
            }
            if self.cancel.is_cancelled() {
                info!("simulation cancelled");
                break;
            }
            match event {
                Event::TrafficArrival { node } => self.handle_arrival(node),
                Event::ContentionRound => {
                    self.medium
                        .contention_round(&self.nodes, &mut self.rng, &mut self.queue)
                }
                Event::TxEnd => self.medium.tx_end(&self.nodes, &mut self.queue),
                Event::EnvStep => self.handle_env_step().await?,
            }
        }
        Ok(())
    }

    fn handle_arrival(&mut self, node: NodeId) {
        let source = &self.sources[node];
        let mac = self.nodes[node]
            .contention_window()
            .expect("traffic sources only attach to wifi stations");

        for _ in 0..source.arrival_burst() {
            let packet = Packet::new(PacketId::new(self.packet_seq), node, self.config.packet_size);
            self.packet_seq += 1;
            if !mac.enqueue(packet) {
                self.metrics.packet_dropped();
            }
        }
        self.medium.on_packet_queued(&mut self.queue);

        let delay = source.next_delay(&mut self.rng);
        self.queue.schedule(delay, Event::TrafficArrival { node });
    }

    async fn handle_env_step(&mut self) -> Result<()> {
        let Some((env, channel)) = &mut self.agent else {
            return Ok(());
        };

        // Publish the current state first...
        let (observation, info) = env.observe();
        let reward = env.step_reward();
        let done = env.is_done();
        debug!(step = self.steps, reward, "publishing state");
        channel
            .send(&EnvMessage::Step { observation, reward, done, info })
            .await?;

        // ...then re-arm before the reply is consumed. Firing N+1 is on
        // the timeline before action N applies, so a new window takes
        // effect inside the already-ticking interval and its effect shows
        // up one observation later.
        self.queue
            .schedule(self.config.step_interval, Event::EnvStep);

        let action = tokio::select! {
            _ = self.cancel.cancelled() => {
                anyhow::bail!("cancelled while waiting for the agent");
            }
            action = channel.recv_action() => action?,
        };
        env.apply(&action)?;
        self.steps += 1;
        Ok(())
    }

    fn report(&self) -> SimReport {
        SimReport {
            name: self.config.name.clone(),
            sim_duration: self.config.sim_duration,
            flows: self.metrics.flow_report(self.config.sim_duration),
            delivered_packets: self.metrics.delivered_packets(),
            dropped_packets: self.metrics.dropped_packets(),
            collisions: self.metrics.collisions(),
            final_cw: self.cw_state.get(),
            steps: self.steps,
        }
    }
}
