//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::selector::{DefaultNode, Node, ServiceInstance};

/// Root configuration for node selection.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SelectorConfig {
    /// Load balancing algorithm.
    pub balancer: BalancerKind,

    /// EWMA node tuning (P2C).
    pub ewma: EwmaConfig,

    /// P2C tuning.
    pub p2c: P2cConfig,

    /// Direct node tuning (WRR, random).
    pub direct: DirectConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Static seed nodes.
    pub nodes: Vec<NodeConfig>,
}

/// Supported balancing algorithms.
///
/// Names are matched case-insensitively when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum BalancerKind {
    /// Power of two choices over EWMA nodes.
    #[default]
    P2c,
    /// Smooth weighted round robin over direct nodes.
    Wrr,
    /// Uniform random over direct nodes.
    Random,
}

/// EWMA statistics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EwmaConfig {
    /// Decay time constant in milliseconds.
    pub tau_ms: u64,

    /// Latency assumed for nodes without samples, in milliseconds.
    pub penalty_ms: u64,
}

impl Default for EwmaConfig {
    fn default() -> Self {
        Self {
            tau_ms: 600,
            penalty_ms: 10_000,
        }
    }
}

/// P2C configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct P2cConfig {
    /// Idle time after which a losing node is force-picked, in milliseconds.
    pub force_pick_ms: u64,
}

impl Default for P2cConfig {
    fn default() -> Self {
        Self { force_pick_ms: 3_000 }
    }
}

/// Direct node configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectConfig {
    /// Weight of nodes without an initial weight.
    pub default_weight: i64,
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self { default_weight: 100 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Record selection metrics.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}

/// A statically configured node.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
    /// Protocol scheme (default: grpc).
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Node address (e.g., "127.0.0.1:9000").
    pub address: String,

    #[serde(default)]
    pub service_name: String,

    #[serde(default)]
    pub version: String,

    /// Initial weight; overrides a `weight` metadata entry.
    #[serde(default)]
    pub weight: Option<i64>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_scheme() -> String {
    "grpc".to_string()
}

impl NodeConfig {
    /// Build the node this entry describes.
    pub fn to_node(&self) -> Arc<dyn Node> {
        let mut metadata = self.metadata.clone();
        if let Some(weight) = self.weight {
            metadata.insert("weight".to_string(), weight.to_string());
        }
        let instance = ServiceInstance {
            id: self.address.clone(),
            name: self.service_name.clone(),
            version: self.version.clone(),
            metadata,
            endpoints: vec![format!("{}://{}", self.scheme, self.address)],
        };
        Arc::new(DefaultNode::new(&self.scheme, &self.address, Some(&instance)))
    }
}

impl SelectorConfig {
    /// All configured nodes.
    pub fn build_nodes(&self) -> Vec<Arc<dyn Node>> {
        self.nodes.iter().map(NodeConfig::to_node).collect()
    }
}
