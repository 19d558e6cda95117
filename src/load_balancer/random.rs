//! Uniform random load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::direct::DirectBuilder;
use crate::selector::{
    Balancer, BalancerBuilder, CallContext, DefaultBuilder, DoneFunc, SelectorError, SelectorResult,
    WeightedNode,
};

/// Balancer name.
pub const NAME: &str = "random";

/// Random selector. Weights are ignored.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl Balancer for Random {
    fn name(&self) -> &'static str {
        NAME
    }

    fn pick(
        &self,
        _ctx: &CallContext,
        nodes: &[Arc<dyn WeightedNode>],
    ) -> SelectorResult<(Arc<dyn WeightedNode>, DoneFunc)> {
        if nodes.is_empty() {
            return Err(SelectorError::NoAvailableNode);
        }
        let selected = &nodes[fastrand::usize(..nodes.len())];
        let done = selected.pick();
        Ok((selected.clone(), done))
    }
}

/// Builds `Random` balancers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomBuilder;

impl BalancerBuilder for RandomBuilder {
    fn build(&self) -> Box<dyn Balancer> {
        Box::new(Random::new())
    }
}

/// Selector builder pairing random selection with direct nodes.
pub fn new_builder() -> DefaultBuilder {
    DefaultBuilder::new(Arc::new(DirectBuilder::default()), Arc::new(RandomBuilder))
}
