//! Smooth weighted round-robin load balancing strategy (Nginx style).

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::load_balancer::direct::DirectBuilder;
use crate::selector::{
    Balancer, BalancerBuilder, CallContext, DefaultBuilder, DoneFunc, Node, SelectorError,
    SelectorResult, WeightedNode,
};

/// Balancer name.
pub const NAME: &str = "wrr";

/// Weighted round-robin selector.
///
/// Keeps a running "current weight" per address. Every pick adds each
/// node's weight to its current weight, selects the largest and pays the
/// total back from the winner. Picks interleave in proportion to weight.
#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    /// Address -> current weight. Held for the whole pick.
    current_weight: Mutex<HashMap<String, f64>>,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Balancer for WeightedRoundRobin {
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

        let mut current = self.current_weight.lock();

        // Drop addresses that left the candidate set
        if current.len() > nodes.len() {
            let live: HashSet<&str> = nodes.iter().map(|n| n.address()).collect();
            current.retain(|addr, _| live.contains(addr.as_str()));
        }

        let mut total_weight = 0.0;
        let mut selected: Option<(&Arc<dyn WeightedNode>, f64)> = None;
        for node in nodes {
            let weight = node.weight();
            total_weight += weight;

            let cwt = match current.get_mut(node.address()) {
                Some(cwt) => {
                    *cwt += weight;
                    *cwt
                }
                None => {
                    current.insert(node.address().to_string(), weight);
                    weight
                }
            };

            // Strictly greater: ties go to the first node seen
            if selected.map_or(true, |(_, best)| cwt > best) {
                selected = Some((node, cwt));
            }
        }

        let Some((node, cwt)) = selected else {
            return Err(SelectorError::NoAvailableNode);
        };
        if let Some(winner) = current.get_mut(node.address()) {
            *winner = cwt - total_weight;
        }
        drop(current);

        let done = node.pick();
        Ok((node.clone(), done))
    }
}

/// Builds `WeightedRoundRobin` balancers.
#[derive(Debug, Clone, Copy, Default)]
pub struct WrrBuilder;

impl BalancerBuilder for WrrBuilder {
    fn build(&self) -> Box<dyn Balancer> {
        Box::new(WeightedRoundRobin::new())
    }
}

/// Selector builder pairing WRR with direct (static weight) nodes.
pub fn new_builder() -> DefaultBuilder {
    DefaultBuilder::new(Arc::new(DirectBuilder::default()), Arc::new(WrrBuilder))
}
