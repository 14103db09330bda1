use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceDtype {
    Uint32,
    Float32,
}

/// Gym-style box descriptor, sent to the agent once at connection setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSpace {
    pub low: f64,
    pub high: f64,
    pub shape: Vec<usize>,
    pub dtype: SpaceDtype,
}

impl BoxSpace {
    /// Backlog vector, one entry per node. `high` is a normalization hint,
    /// not a hard limit: a growing queue may legally exceed it and the
    /// reported value is never clipped.
    pub fn observation(num_nodes: usize) -> Self {
        Self {
            low: 0.0,
            high: 10.0,
            shape: vec![num_nodes],
            dtype: SpaceDtype::Uint32,
        }
    }

    /// Single CW scalar.
    pub fn action() -> Self {
        Self {
            low: 0.0,
            high: 10.0,
            shape: vec![1],
            dtype: SpaceDtype::Float32,
        }
    }
}
