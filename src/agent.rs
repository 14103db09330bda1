// Request/response channel to the external RL agent. One step message out,
// one action back, in lockstep. Framing is newline-delimited JSON so the
// agent side can be written in anything that speaks a socket.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;

use crate::env::BoxSpace;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnvMessage {
    /// Sent once at connection setup.
    Init {
        observation_space: BoxSpace,
        action_space: BoxSpace,
    },
    /// One per step: the state published to the agent.
    Step {
        observation: Vec<u32>,
        reward: f64,
        done: bool,
        info: String,
    },
    /// The run is over; no reply expected.
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    Action { action: Vec<f64> },
}

pub enum AgentChannel {
    Tcp(TcpAgentChannel),
    Local(LocalAgentChannel),
}

impl AgentChannel {
    pub async fn send(&mut self, message: &EnvMessage) -> Result<()> {
        match self {
            AgentChannel::Tcp(chan) => chan.send(message).await,
            AgentChannel::Local(chan) => chan.send(message).await,
        }
    }

    /// Blocks until the agent answers the step just published. An error
    /// here means the protocol contract is broken (disconnect or garbage)
    /// and the run must halt rather than continue on stale actions.
    pub async fn recv_action(&mut self) -> Result<Vec<f64>> {
        match self {
            AgentChannel::Tcp(chan) => chan.recv_action().await,
            AgentChannel::Local(chan) => chan.recv_action().await,
        }
    }
}

pub struct AgentListener {
    listener: TcpListener,
}

impl AgentListener {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding agent listener on {addr}"))?;
        info!("waiting for agent on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept exactly one agent.
    pub async fn accept(&self) -> Result<AgentChannel> {
        let (socket, peer) = self.listener.accept().await?;
        info!("agent connected from {peer}");
        let (read, write) = socket.into_split();
        Ok(AgentChannel::Tcp(TcpAgentChannel {
            reader: BufReader::new(read),
            writer: write,
        }))
    }
}

pub struct TcpAgentChannel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TcpAgentChannel {
    async fn send(&mut self, message: &EnvMessage) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn recv_action(&mut self) -> Result<Vec<f64>> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            anyhow::bail!("agent disconnected mid-step");
        }
        let message: AgentMessage =
            serde_json::from_str(line.trim_end()).context("malformed agent reply")?;
        let AgentMessage::Action { action } = message;
        Ok(action)
    }
}

/// In-process transport with the same lockstep contract, for tests and
/// programmatic drivers.
pub struct LocalAgentChannel {
    tx: mpsc::Sender<EnvMessage>,
    rx: mpsc::Receiver<AgentMessage>,
}

pub struct LocalAgentHandle {
    rx: mpsc::Receiver<EnvMessage>,
    tx: mpsc::Sender<AgentMessage>,
}

pub fn local_channel(buffer: usize) -> (AgentChannel, LocalAgentHandle) {
    let (env_tx, env_rx) = mpsc::channel(buffer);
    let (agent_tx, agent_rx) = mpsc::channel(buffer);
    (
        AgentChannel::Local(LocalAgentChannel {
            tx: env_tx,
            rx: agent_rx,
        }),
        LocalAgentHandle {
            rx: env_rx,
            tx: agent_tx,
        },
    )
}

impl LocalAgentChannel {
    async fn send(&mut self, message: &EnvMessage) -> Result<()> {
        self.tx
            .send(message.clone())
            .await
            .map_err(|_| anyhow::anyhow!("agent side of local channel is gone"))
    }

    async fn recv_action(&mut self) -> Result<Vec<f64>> {
        match self.rx.recv().await {
            Some(AgentMessage::Action { action }) => Ok(action),
            None => anyhow::bail!("agent disconnected mid-step"),
        }
    }
}

impl LocalAgentHandle {
    pub async fn recv(&mut self) -> Option<EnvMessage> {
        self.rx.recv().await
    }

    pub async fn send_action(&self, action: Vec<f64>) -> Result<()> {
        self.tx
            .send(AgentMessage::Action { action })
            .await
            .map_err(|_| anyhow::anyhow!("environment side of local channel is gone"))
    }
}
