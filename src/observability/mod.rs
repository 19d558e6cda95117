//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Selector, balancers, EWMA nodes produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms via metrics)
//!
//! Consumers:
//!     → whatever subscriber / recorder the host process installs
//! ```
//!
//! # Design Decisions
//! - The library never installs a metrics recorder; without one, recording is a no-op
//! - Hot-path events are trace level
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
