//! Power-of-two-choices load balancing strategy.
//!
//! Samples two distinct candidates and keeps the one with the higher
//! weight. A candidate that keeps losing would never receive traffic to
//! prove itself again, so once it has gone unpicked for `force_pick` it
//! is chosen anyway (one caller at a time).

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::load_balancer::ewma::EwmaBuilder;
use crate::observability::metrics;
use crate::selector::{
    Balancer, BalancerBuilder, CallContext, DefaultBuilder, DoneFunc, Node, SelectorError,
    SelectorResult, WeightedNode,
};

/// Balancer name.
pub const NAME: &str = "p2c";

/// Idle time after which a losing candidate is picked regardless of weight.
pub const DEFAULT_FORCE_PICK: Duration = Duration::from_secs(3);

/// P2C selector.
#[derive(Debug)]
pub struct P2c {
    rng: Mutex<StdRng>,
    /// Single-flight guard for force picks.
    picked: AtomicBool,
    force_pick: Duration,
}

impl P2c {
    pub fn new() -> Self {
        Self::with_force_pick(DEFAULT_FORCE_PICK)
    }

    pub fn with_force_pick(force_pick: Duration) -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            picked: AtomicBool::new(false),
            force_pick,
        }
    }

    fn pre_pick(&self, len: usize) -> (usize, usize) {
        let mut rng = self.rng.lock();
        distinct_pair(&mut *rng, len)
    }
}

impl Default for P2c {
    fn default() -> Self {
        Self::new()
    }
}

/// Draw two distinct indices in `[0, len)`; `len` must be at least 2.
pub(crate) fn distinct_pair<R: Rng + ?Sized>(rng: &mut R, len: usize) -> (usize, usize) {
    let a = rng.gen_range(0..len);
    let mut b = rng.gen_range(0..len - 1);
    if b >= a {
        b += 1;
    }
    (a, b)
}

impl Balancer for P2c {
    fn name(&self) -> &'static str {
        NAME
    }

    fn pick(
        &self,
        _ctx: &CallContext,
        nodes: &[Arc<dyn WeightedNode>],
    ) -> SelectorResult<(Arc<dyn WeightedNode>, DoneFunc)> {
        match nodes {
            [] => return Err(SelectorError::NoAvailableNode),
            [only] => {
                let done = only.pick();
                return Ok((only.clone(), done));
            }
            _ => {}
        }

        let (a, b) = self.pre_pick(nodes.len());
        let (node_a, node_b) = (&nodes[a], &nodes[b]);

        // pc: preferred choice, upc: unpreferred choice
        let (mut pc, upc) = if node_b.weight() > node_a.weight() {
            (node_b, node_a)
        } else {
            (node_a, node_b)
        };

        let elapsed = upc.pick_elapsed();
        if elapsed > self.force_pick
            && self
                .picked
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            tracing::debug!(
                address = upc.address(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Force picking starved node"
            );
            metrics::record_force_pick();
            pc = upc;
            self.picked.store(false, Ordering::Release);
        }

        let done = pc.pick();
        Ok((pc.clone(), done))
    }
}

/// Builds `P2c` balancers.
#[derive(Debug, Clone)]
pub struct P2cBuilder {
    force_pick: Duration,
}

impl P2cBuilder {
    pub fn new(force_pick: Duration) -> Self {
        Self { force_pick }
    }
}

impl Default for P2cBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_FORCE_PICK)
    }
}

impl BalancerBuilder for P2cBuilder {
    fn build(&self) -> Box<dyn Balancer> {
        Box::new(P2c::with_force_pick(self.force_pick))
    }
}

/// Selector builder pairing P2C with EWMA nodes.
pub fn new_builder() -> DefaultBuilder {
    DefaultBuilder::new(Arc::new(EwmaBuilder::new()), Arc::new(P2cBuilder::default()))
}
