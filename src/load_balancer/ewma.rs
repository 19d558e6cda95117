//! EWMA node: weight derived from live latency and success feedback.
//!
//! # Responsibilities
//! - Track a time-decayed moving average of latency and success rate
//! - Track in-flight calls and predict latency regressions from them
//! - Penalise nodes that have produced no samples yet
//!
//! # Weight
//! ```text
//! load   = max(avg_lag, predict) * inflight      (avg_lag > 0)
//!        = penalty * inflight                    (cold start)
//! weight = success(‰) * 1e9 / load
//! ```
//!
//! # Design Decisions
//! - Scalars are atomics; the in-flight map has its own narrow lock
//! - Decay is by wall time between completions (tau), not by sample count
//! - The predictive scan is single-flighted and rate limited

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::load_balancer::{delegate_node, elapsed_since, monotonic_nanos};
use crate::observability::metrics;
use crate::selector::{
    CallContext, CallError, DoneFunc, DoneInfo, Node, WeightedNode, WeightedNodeBuilder,
};

/// Decay time constant; half-life is `tau * ln 2`.
pub const DEFAULT_TAU: Duration = Duration::from_millis(600);

/// Latency assumed for a node with no samples.
pub const DEFAULT_PENALTY: Duration = Duration::from_secs(10);

/// Success rate scale (per mille).
const SUCCESS_SCALE: f64 = 1000.0;

const NANOS_PER_SEC: f64 = 1e9;

const MIN_PREDICT_INTERVAL: i64 = 5_000_000;
const MAX_PREDICT_INTERVAL: i64 = 200_000_000;

/// Caller-supplied failure classifier. Returns `true` when the error
/// should count against the node.
pub type ErrorClassifier = Arc<dyn Fn(&CallError) -> bool + Send + Sync>;

/// Shared statistics, referenced by the node and its outstanding `DoneFunc`s.
struct Stats {
    /// Moving average latency, ns.
    lag: AtomicI64,
    /// Moving average success rate, ‰, stored as `f64` bits. Kept
    /// fractional so that small steps at high call rates still add up.
    success: AtomicU64,
    /// In-flight calls plus a baseline of one.
    inflight: AtomicI64,
    /// Start stamps of in-flight calls keyed by request sequence.
    inflights: RwLock<BTreeMap<u64, i64>>,
    /// Last completion stamp.
    stamp: AtomicI64,
    predict_ts: AtomicI64,
    predict: AtomicI64,
    reqs: AtomicU64,
    last_pick: AtomicI64,
    tau: f64,
    penalty: u64,
    classifier: Option<ErrorClassifier>,
}

impl Stats {
    fn new(tau: Duration, penalty: Duration, classifier: Option<ErrorClassifier>) -> Self {
        Self {
            lag: AtomicI64::new(0),
            success: AtomicU64::new(SUCCESS_SCALE.to_bits()),
            inflight: AtomicI64::new(1),
            inflights: RwLock::new(BTreeMap::new()),
            stamp: AtomicI64::new(0),
            predict_ts: AtomicI64::new(0),
            predict: AtomicI64::new(0),
            reqs: AtomicU64::new(0),
            last_pick: AtomicI64::new(0),
            tau: tau.as_nanos() as f64,
            penalty: u64::try_from(penalty.as_nanos()).unwrap_or(u64::MAX),
            classifier,
        }
    }

    /// Register a call starting at `now`; returns its sequence number.
    fn begin(&self, now: i64) -> u64 {
        self.last_pick.store(now, Ordering::Relaxed);
        self.inflight.fetch_add(1, Ordering::AcqRel);
        let seq = self.reqs.fetch_add(1, Ordering::Relaxed);
        self.inflights.write().insert(seq, now);
        seq
    }

    /// Fold the outcome of call `seq`, finished at `now`, into the averages.
    /// Returns the call latency and whether it counted as a failure.
    fn finish(&self, seq: u64, now: i64, info: &DoneInfo) -> (i64, bool) {
        let start = self.inflights.write().remove(&seq).unwrap_or(now);
        self.inflight.fetch_sub(1, Ordering::AcqRel);

        let stamp = self.stamp.swap(now, Ordering::AcqRel);
        let td = now.saturating_sub(stamp).max(0);
        let mut w = (-(td as f64) / self.tau).exp();

        let sample = now.saturating_sub(start).max(0);
        let old_lag = self.lag.load(Ordering::Acquire);
        if old_lag == 0 {
            // First sample seeds the average outright
            w = 0.0;
        }
        let lag = (old_lag as f64 * w + sample as f64 * (1.0 - w)) as i64;
        self.lag.store(lag, Ordering::Release);

        let failed = self.is_failure(info);
        let target = if failed { 0.0 } else { SUCCESS_SCALE };
        let success = self.health() * w + target * (1.0 - w);
        self.success.store(success.to_bits(), Ordering::Release);

        (sample, failed)
    }

    fn is_failure(&self, info: &DoneInfo) -> bool {
        let Some(err) = info.err.as_ref() else {
            return false;
        };
        match &self.classifier {
            Some(classify) => classify(err),
            None => err.is_node_failure(),
        }
    }

    fn health(&self) -> f64 {
        f64::from_bits(self.success.load(Ordering::Acquire))
    }

    /// Current load estimate (ns × concurrency) as seen at `now`.
    fn load(&self, now: i64) -> u64 {
        let avg_lag = self.lag.load(Ordering::Acquire);
        let last_predict = self.predict_ts.load(Ordering::Acquire);

        if now.saturating_sub(last_predict) > predict_interval(avg_lag)
            && self
                .predict_ts
                .compare_exchange(last_predict, now, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            let predict = self.predict_lag(now, avg_lag);
            self.predict.store(predict, Ordering::Release);
        }

        let inflight = self.inflight.load(Ordering::Acquire).max(0) as u64;
        if avg_lag == 0 {
            return self.penalty.saturating_mul(inflight);
        }
        let lag = avg_lag.max(self.predict.load(Ordering::Acquire));
        (lag as u64).saturating_mul(inflight)
    }

    /// Mean age of in-flight calls older than `avg_lag`, when enough of
    /// them are; 0 otherwise.
    fn predict_lag(&self, now: i64, avg_lag: i64) -> i64 {
        let inflights = self.inflights.read();
        let (mut total, mut count) = (0i64, 0usize);
        for &start in inflights.values() {
            let age = now.saturating_sub(start);
            if age > avg_lag {
                count += 1;
                total = total.saturating_add(age);
            }
        }
        if count > inflights.len() / 2 + 1 {
            total / count as i64
        } else {
            0
        }
    }

    fn weight(&self, now: i64) -> f64 {
        let load = self.load(now);
        if load == 0 {
            return f64::MIN_POSITIVE;
        }
        self.health() * NANOS_PER_SEC / load as f64
    }
}

/// Minimum spacing between in-flight scans for a node averaging `avg_lag` ns.
fn predict_interval(avg_lag: i64) -> i64 {
    (avg_lag / 5).clamp(MIN_PREDICT_INTERVAL, MAX_PREDICT_INTERVAL)
}

/// Adaptive weighted node.
pub struct EwmaNode {
    node: Arc<dyn Node>,
    stats: Arc<Stats>,
}

impl EwmaNode {
    pub fn new(node: Arc<dyn Node>) -> Self {
        EwmaBuilder::new().new_node(node)
    }

    /// Moving average latency.
    pub fn lag(&self) -> Duration {
        Duration::from_nanos(self.stats.lag.load(Ordering::Acquire).max(0) as u64)
    }

    /// Moving average success rate in per mille, rounded.
    pub fn success_rate(&self) -> u64 {
        self.stats.health().round() as u64
    }

    /// Calls picked but not yet completed.
    pub fn inflight(&self) -> i64 {
        self.stats.inflight.load(Ordering::Acquire) - 1
    }

    /// Total calls picked through this node.
    pub fn requests(&self) -> u64 {
        self.stats.reqs.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for EwmaNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EwmaNode")
            .field("address", &self.node.address())
            .field("lag", &self.lag())
            .field("success", &self.success_rate())
            .field("inflight", &self.inflight())
            .finish()
    }
}

delegate_node!(EwmaNode);

impl WeightedNode for EwmaNode {
    fn raw(&self) -> Arc<dyn Node> {
        self.node.clone()
    }

    fn weight(&self) -> f64 {
        self.stats.weight(monotonic_nanos())
    }

    fn pick(&self) -> DoneFunc {
        let seq = self.stats.begin(monotonic_nanos());
        let stats = self.stats.clone();
        let address = self.node.address().to_string();

        Box::new(move |_: &CallContext, info: DoneInfo| {
            let (latency, failed) = stats.finish(seq, monotonic_nanos(), &info);
            if let Some(err) = info.err.as_ref().filter(|_| failed) {
                tracing::debug!(address = %address, error = %err, "Call counted as node failure");
            }
            metrics::record_call_duration(&address, Duration::from_nanos(latency as u64));
        })
    }

    fn pick_elapsed(&self) -> Duration {
        elapsed_since(self.stats.last_pick.load(Ordering::Relaxed))
    }
}

/// Builds `EwmaNode`s.
#[derive(Clone)]
pub struct EwmaBuilder {
    tau: Duration,
    penalty: Duration,
    classifier: Option<ErrorClassifier>,
}

impl EwmaBuilder {
    pub fn new() -> Self {
        Self {
            tau: DEFAULT_TAU,
            penalty: DEFAULT_PENALTY,
            classifier: None,
        }
    }

    pub fn with_tau(mut self, tau: Duration) -> Self {
        self.tau = tau;
        self
    }

    pub fn with_penalty(mut self, penalty: Duration) -> Self {
        self.penalty = penalty;
        self
    }

    /// Replace the default failure classification.
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    fn new_node(&self, node: Arc<dyn Node>) -> EwmaNode {
        EwmaNode {
            node,
            stats: Arc::new(Stats::new(self.tau, self.penalty, self.classifier.clone())),
        }
    }
}

impl Default for EwmaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightedNodeBuilder for EwmaBuilder {
    fn build(&self, node: Arc<dyn Node>) -> Arc<dyn WeightedNode> {
        Arc::new(self.new_node(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::DefaultNode;

    const MS: i64 = 1_000_000;

    fn node() -> EwmaNode {
        EwmaNode::new(Arc::new(DefaultNode::new("grpc", "10.0.0.1:9000", None)))
    }

    /// Run one call on `stats` starting at `start` lasting `latency`.
    fn call(stats: &Stats, start: i64, latency: i64, info: DoneInfo) {
        let seq = stats.begin(start);
        stats.finish(seq, start + latency, &info);
    }

    #[test]
    fn test_first_sample_seeds_lag() {
        let n = node();
        call(&n.stats, 1_000 * MS, 40 * MS, DoneInfo::default());
        assert_eq!(n.lag(), Duration::from_millis(40));
        assert_eq!(n.success_rate(), 1000);
        assert_eq!(n.inflight(), 0);
        assert_eq!(n.requests(), 1);
    }

    #[test]
    fn test_lag_converges() {
        let n = node();
        let mut t = 1_000 * MS;
        call(&n.stats, t, 100 * MS, DoneInfo::default());

        let target = 10 * MS;
        let mut last_gap = i64::MAX;
        for _ in 0..50 {
            t += 100 * MS;
            call(&n.stats, t, target, DoneInfo::default());
            let gap = (n.stats.lag.load(Ordering::Relaxed) - target).abs();
            assert!(gap <= last_gap, "gap must not grow: {gap} > {last_gap}");
            last_gap = gap;
        }
        // 90ms * exp(-50 * 100/600) is far below 0.1ms
        assert!(last_gap < MS / 10, "lag did not converge, gap = {last_gap}ns");
    }

    #[test]
    fn test_failures_lower_success() {
        let n = node();
        let mut t = 1_000 * MS;
        call(&n.stats, t, 10 * MS, DoneInfo::default());

        for _ in 0..5 {
            t += 300 * MS;
            let info = DoneInfo::failed(CallError::ServiceUnavailable("down".into()));
            call(&n.stats, t, 10 * MS, info);
        }
        assert!(n.success_rate() < 100, "success = {}", n.success_rate());
    }

    #[test]
    fn test_unrecognised_error_counts_as_success() {
        let n = node();
        call(&n.stats, 1_000 * MS, 10 * MS, DoneInfo::default());
        call(
            &n.stats,
            1_500 * MS,
            10 * MS,
            DoneInfo::failed(CallError::Status { code: 400, message: "bad".into() }),
        );
        assert_eq!(n.success_rate(), 1000);
    }

    #[test]
    fn test_custom_classifier_overrides_default() {
        let builder = EwmaBuilder::new().with_classifier(Arc::new(|err: &CallError| {
            matches!(err, CallError::Status { code: 429, .. })
        }));
        let n = builder.new_node(Arc::new(DefaultNode::new("grpc", "10.0.0.1:9000", None)));

        call(&n.stats, 1_000 * MS, 10 * MS, DoneInfo::default());
        // Default-failure error ignored by the classifier
        call(&n.stats, 3_000 * MS, 10 * MS, DoneInfo::failed(CallError::DeadlineExceeded));
        assert_eq!(n.success_rate(), 1000);

        call(
            &n.stats,
            6_000 * MS,
            10 * MS,
            DoneInfo::failed(CallError::Status { code: 429, message: "slow down".into() }),
        );
        assert!(n.success_rate() < 10);
    }

    #[test]
    fn test_classifier_runs_once_per_done() {
        use std::sync::atomic::AtomicUsize;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let builder = EwmaBuilder::new().with_classifier(Arc::new(move |_: &CallError| {
            counter.fetch_add(1, Ordering::Relaxed);
            true
        }));
        let n = builder.build(Arc::new(DefaultNode::new("grpc", "10.0.0.1:9000", None)));

        let done = n.pick();
        done(&CallContext::new(), DoneInfo::failed(CallError::Canceled));
        assert_eq!(calls.load(Ordering::Relaxed), 1);

        // No error, no classification
        let done = n.pick();
        done(&CallContext::new(), DoneInfo::default());
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_success_recovers_at_high_call_rate() {
        let n = node();
        let mut t = 1_000 * MS;
        call(&n.stats, t, 10 * MS, DoneInfo::default());
        for _ in 0..5 {
            t += 300 * MS;
            call(&n.stats, t, 10 * MS, DoneInfo::failed(CallError::DeadlineExceeded));
        }
        let degraded = n.success_rate();
        assert!(degraded < 100, "success = {degraded}");

        // 10k calls per second for two seconds: each step is a tiny
        // fraction of a unit, but the steps must still accumulate
        t += 10 * MS;
        for _ in 0..20_000 {
            t += MS / 10;
            call(&n.stats, t, MS / 20, DoneInfo::default());
        }
        assert!(n.success_rate() > 900, "success stuck at {}", n.success_rate());
    }

    #[test]
    fn test_predict_interval_bounds() {
        assert_eq!(predict_interval(0), 5 * MS);
        assert_eq!(predict_interval(MS), 5 * MS);
        assert_eq!(predict_interval(100 * MS), 20 * MS);
        assert_eq!(predict_interval(2_000 * MS), 200 * MS);
    }

    #[test]
    fn test_prediction_rate_limited_at_lower_bound() {
        let n = node();
        // 1ms average: the interval clamps up to 5ms
        call(&n.stats, 1_000 * MS, MS, DoneInfo::default());
        for _ in 0..4 {
            n.stats.begin(2_000 * MS);
        }
        n.stats.load(2_100 * MS);
        assert_eq!(n.stats.predict.load(Ordering::Relaxed), 100 * MS);

        // Fresh calls would dilute the slow ones below the threshold
        for _ in 0..10 {
            n.stats.begin(2_106 * MS);
        }
        n.stats.load(2_104 * MS);
        assert_eq!(n.stats.predict.load(Ordering::Relaxed), 100 * MS);

        n.stats.load(2_106 * MS);
        assert_eq!(n.stats.predict.load(Ordering::Relaxed), 0);
        assert_eq!(n.stats.predict_ts.load(Ordering::Relaxed), 2_106 * MS);
    }

    #[test]
    fn test_prediction_rate_limited_at_upper_bound() {
        let n = node();
        // 2s average: the interval clamps down to 200ms
        call(&n.stats, 1_000 * MS, 2_000 * MS, DoneInfo::default());
        for _ in 0..4 {
            n.stats.begin(4_000 * MS);
        }
        n.stats.load(9_000 * MS);
        assert_eq!(n.stats.predict.load(Ordering::Relaxed), 5_000 * MS);

        for _ in 0..10 {
            n.stats.begin(9_190 * MS);
        }
        n.stats.load(9_150 * MS);
        assert_eq!(n.stats.predict.load(Ordering::Relaxed), 5_000 * MS);

        n.stats.load(9_250 * MS);
        assert_eq!(n.stats.predict.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_cold_start_penalty() {
        let cold = node();
        let warm = node();
        call(&warm.stats, 1_000 * MS, 50 * MS, DoneInfo::default());

        // Equal inflight (baseline) on both
        let now = 2_000 * MS;
        assert_eq!(cold.stats.load(now), DEFAULT_PENALTY.as_nanos() as u64);
        assert!(cold.stats.load(now) > warm.stats.load(now));
        assert!(warm.stats.weight(now) > cold.stats.weight(now));
    }

    #[test]
    fn test_cold_start_penalty_scales_with_inflight() {
        let n = node();
        n.stats.begin(1_000 * MS);
        n.stats.begin(1_000 * MS);
        assert_eq!(n.stats.load(1_001 * MS), 3 * DEFAULT_PENALTY.as_nanos() as u64);
    }

    #[test]
    fn test_prediction_from_slow_inflight() {
        let n = node();
        call(&n.stats, 1_000 * MS, 10 * MS, DoneInfo::default());

        for _ in 0..4 {
            n.stats.begin(2_000 * MS);
        }
        // All four are 100ms old against a 10ms average
        let load = n.stats.load(2_100 * MS);
        assert_eq!(n.stats.predict.load(Ordering::Relaxed), 100 * MS);
        assert_eq!(load, (100 * MS) as u64 * 5);
    }

    #[test]
    fn test_no_prediction_when_few_are_slow() {
        let n = node();
        call(&n.stats, 1_000 * MS, 10 * MS, DoneInfo::default());

        // One old call among four fresh ones
        n.stats.begin(2_000 * MS);
        for _ in 0..4 {
            n.stats.begin(2_099 * MS);
        }
        let load = n.stats.load(2_100 * MS);
        assert_eq!(n.stats.predict.load(Ordering::Relaxed), 0);
        assert_eq!(load, (10 * MS) as u64 * 6);
    }

    #[test]
    fn test_weight_prefers_fast_node() {
        let fast = node();
        let slow = node();
        call(&fast.stats, 1_000 * MS, 5 * MS, DoneInfo::default());
        call(&slow.stats, 1_000 * MS, 80 * MS, DoneInfo::default());

        let now = 1_500 * MS;
        assert!(fast.stats.weight(now) > slow.stats.weight(now));
    }

    #[test]
    fn test_zero_load_has_positive_weight() {
        let stats = Stats::new(DEFAULT_TAU, DEFAULT_PENALTY, None);
        stats.inflight.store(0, Ordering::Relaxed);
        assert_eq!(stats.weight(1_000 * MS), f64::MIN_POSITIVE);
    }

    #[test]
    fn test_pick_and_done() {
        let n = node();
        assert_eq!(n.pick_elapsed(), Duration::MAX);

        let done = n.pick();
        assert_eq!(n.inflight(), 1);
        assert!(n.pick_elapsed() < Duration::from_secs(1));

        done(&CallContext::new(), DoneInfo::default());
        assert_eq!(n.inflight(), 0);
        assert!(n.stats.inflights.read().is_empty());
        assert!(n.weight() > 0.0);
    }
}
