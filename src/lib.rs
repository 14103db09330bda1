pub mod agent;
pub mod cw;
pub mod engine;
pub mod env;
pub mod mac;
pub mod metrics;
pub mod network;
pub mod node;
pub mod simulation;
pub mod traffic;

pub use agent::{AgentChannel, AgentListener};
pub use cw::CwController;
pub use env::WirelessEnv;
pub use metrics::MetricsCollector;
pub use simulation::{SimConfig, Simulation};

pub mod prelude {
    pub use crate::agent::{local_channel, AgentChannel, AgentListener, EnvMessage};
    pub use crate::cw::{CwController, CwTarget};
    pub use crate::env::{BoxSpace, WirelessEnv};
    pub use crate::metrics::{FlowReport, MetricsCollector};
    pub use crate::network::Packet;
    pub use crate::simulation::{SimConfig, SimReport, Simulation};
    pub use crate::traffic::TrafficPattern;
}
