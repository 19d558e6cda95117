//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Selector::select
//!     → candidate snapshot (weighted nodes)
//!     → Apply load balancing algorithm:
//!         - p2c.rs (two random candidates, keep the heavier; EWMA nodes)
//!         - wrr.rs (smooth weighted round robin; direct nodes)
//!         - random.rs (uniform; direct nodes)
//!     → WeightedNode::pick() → DoneFunc
//!     → DoneFunc feeds latency/outcome back (ewma.rs)
//! ```
//!
//! # Design Decisions
//! - Weight is recomputed on every call, never cached
//! - Per-node counters are atomics; locks only guard short scans
//! - Algorithm and node kind are paired at startup through builders

pub mod direct;
pub mod ewma;
pub mod p2c;
pub mod random;
pub mod wrr;

use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crate::config::{BalancerKind, SelectorConfig};
use crate::selector::{Builder, DefaultBuilder, SelectorError};

impl BalancerKind {
    /// Name the algorithm is registered under.
    pub fn name(&self) -> &'static str {
        match self {
            BalancerKind::P2c => p2c::NAME,
            BalancerKind::Wrr => wrr::NAME,
            BalancerKind::Random => random::NAME,
        }
    }
}

impl FromStr for BalancerKind {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            p2c::NAME => Ok(BalancerKind::P2c),
            wrr::NAME => Ok(BalancerKind::Wrr),
            random::NAME => Ok(BalancerKind::Random),
            other => Err(SelectorError::UnknownBalancer(other.to_string())),
        }
    }
}

impl TryFrom<String> for BalancerKind {
    type Error = SelectorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Build the selector builder described by `config`.
pub fn builder_from_config(config: &SelectorConfig) -> Arc<dyn Builder> {
    let direct = Arc::new(direct::DirectBuilder::new(config.direct.default_weight));
    let builder = match config.balancer {
        BalancerKind::P2c => DefaultBuilder::new(
            Arc::new(
                ewma::EwmaBuilder::new()
                    .with_tau(Duration::from_millis(config.ewma.tau_ms))
                    .with_penalty(Duration::from_millis(config.ewma.penalty_ms)),
            ),
            Arc::new(p2c::P2cBuilder::new(Duration::from_millis(config.p2c.force_pick_ms))),
        ),
        BalancerKind::Wrr => DefaultBuilder::new(direct, Arc::new(wrr::WrrBuilder)),
        BalancerKind::Random => DefaultBuilder::new(direct, Arc::new(random::RandomBuilder)),
    };

    tracing::info!(balancer = config.balancer.name(), "Selector builder configured");
    Arc::new(builder)
}

/// Monotonic nanoseconds since the first call in this process.
///
/// Never returns 0, which marks "never picked" in node timestamps.
pub(crate) fn monotonic_nanos() -> i64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let elapsed = EPOCH.get_or_init(Instant::now).elapsed().as_nanos();
    i64::try_from(elapsed).unwrap_or(i64::MAX).saturating_add(1)
}

/// Elapsed time since a `monotonic_nanos` stamp. A zero stamp yields
/// `Duration::MAX`.
pub(crate) fn elapsed_since(stamp: i64) -> Duration {
    if stamp == 0 {
        return Duration::MAX;
    }
    let delta = monotonic_nanos().saturating_sub(stamp).max(0);
    Duration::from_nanos(delta as u64)
}

/// Implement `Node` for a weighted wrapper by delegating to its `node` field.
macro_rules! delegate_node {
    ($ty:ty) => {
        impl $crate::selector::Node for $ty {
            fn scheme(&self) -> &str {
                self.node.scheme()
            }

            fn address(&self) -> &str {
                self.node.address()
            }

            fn service_name(&self) -> &str {
                self.node.service_name()
            }

            fn initial_weight(&self) -> Option<i64> {
                self.node.initial_weight()
            }

            fn version(&self) -> &str {
                self.node.version()
            }

            fn metadata(&self) -> &std::collections::HashMap<String, String> {
                self.node.metadata()
            }
        }
    };
}
pub(crate) use delegate_node;
