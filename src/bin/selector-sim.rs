//! Drive a selector against simulated nodes and report the pick distribution.
//!
//! Per-node behaviour comes from node metadata:
//! - `sim.latency_ms`: call latency (default 10)
//! - `sim.error_rate`: probability in [0, 1] of a `ServiceUnavailable` outcome

use clap::Parser;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rpc_selector::config::load_config;
use rpc_selector::observability::{logging, metrics};
use rpc_selector::selector::{global_selector, set_global_selector};
use rpc_selector::{
    builder_from_config, Builder, CallContext, CallError, DoneInfo, Node, Peer, Rebalancer,
    Selector,
};

#[derive(Parser)]
#[command(name = "selector-sim")]
#[command(about = "Simulate node selection against a static node set", long_about = None)]
struct Cli {
    /// Selector configuration file (TOML).
    #[arg(short, long)]
    config: PathBuf,

    /// Total number of simulated calls.
    #[arg(short, long, default_value_t = 1000)]
    requests: usize,

    /// Number of concurrent callers.
    #[arg(short = 'n', long, default_value_t = 16)]
    concurrency: usize,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

type SimError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Default, serde::Serialize)]
struct NodeReport {
    picks: usize,
    failures: usize,
}

fn sim_latency(node: &dyn Node) -> Duration {
    let ms = node
        .metadata()
        .get("sim.latency_ms")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(10);
    Duration::from_millis(ms)
}

fn sim_error_rate(node: &dyn Node) -> f64 {
    node.metadata()
        .get("sim.error_rate")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0)
}

async fn run_caller(
    selector: Arc<dyn Selector>,
    calls: usize,
) -> Result<HashMap<String, NodeReport>, SimError> {
    let mut report: HashMap<String, NodeReport> = HashMap::new();
    for _ in 0..calls {
        let peer = Arc::new(Peer::new());
        let ctx = CallContext::new().with_peer(peer);

        let (node, done) = selector.select(&ctx)?;
        tokio::time::sleep(sim_latency(node.as_ref())).await;

        let failed = fastrand::f64() < sim_error_rate(node.as_ref());
        let info = if failed {
            DoneInfo::failed(CallError::ServiceUnavailable(node.address().to_string()))
        } else {
            DoneInfo {
                bytes_sent: true,
                bytes_received: true,
                ..DoneInfo::default()
            }
        };
        done(&ctx, info);

        let entry = report.entry(node.address().to_string()).or_default();
        entry.picks += 1;
        if failed {
            entry.failures += 1;
        }
    }
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<(), SimError> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init(&config.observability);
    metrics::set_enabled(config.observability.metrics_enabled);

    set_global_selector(builder_from_config(&config))?;
    let builder = global_selector().ok_or("global selector not configured")?;
    let selector: Arc<dyn Selector> = Arc::from(builder.build());
    selector.apply(config.build_nodes());

    tracing::info!(
        balancer = config.balancer.name(),
        nodes = config.nodes.len(),
        requests = cli.requests,
        concurrency = cli.concurrency,
        "Simulation starting"
    );

    let concurrency = cli.concurrency.max(1);
    let start = Instant::now();
    let mut tasks = Vec::with_capacity(concurrency);
    for i in 0..concurrency {
        let calls = cli.requests / concurrency + usize::from(i < cli.requests % concurrency);
        tasks.push(tokio::spawn(run_caller(selector.clone(), calls)));
    }

    let mut totals: BTreeMap<String, NodeReport> = BTreeMap::new();
    for task in tasks {
        for (address, report) in task.await?? {
            let entry = totals.entry(address).or_default();
            entry.picks += report.picks;
            entry.failures += report.failures;
        }
    }
    let elapsed = start.elapsed();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&totals)?);
    } else {
        println!("\n--- Selection Results ({}) ---", config.balancer.name());
        println!("{:<24} {:>8} {:>8} {:>8}", "address", "picks", "share", "errors");
        for (address, report) in &totals {
            let share = report.picks as f64 * 100.0 / cli.requests.max(1) as f64;
            println!("{:<24} {:>8} {:>7.1}% {:>8}", address, report.picks, share, report.failures);
        }
        println!("Total Duration: {:?}", elapsed);
        println!("------------------------------\n");
    }
    Ok(())
}
