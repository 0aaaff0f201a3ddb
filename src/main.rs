use anyhow::Context;
use chord::config::SimulationConfig;
use chord::Network;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    setup_tracing("info");

    let config = SimulationConfig::parse();
    config.validate().context("invalid simulation config")?;
    let node_ids = config.resolved_node_ids()?;
    let mut network =
        Network::new(config.bits, &node_ids)?.with_max_settle_rounds(config.max_settle_rounds);

    let rounds = network.join_pending()?;
    info!(
        nodes = network.active_count(),
        ring_size = network.ring_size(),
        rounds,
        "ring built"
    );
    if !network.is_consistent() {
        warn!("ring pointers did not converge");
    }

    for id in network.active_ids() {
        if let Some(node) = network.node(id) {
            info!(
                node = %id,
                predecessor = %node.predecessor(),
                successor = %node.successor(),
                "ring member"
            );
        }
    }

    for key in &config.keys {
        let id = network.hash_function(key);
        let placed = network.put(key, key.as_bytes().to_vec())?;
        info!(key = %key, id = %id, owner = %placed.owner, hops = placed.hops, "placed key");
    }
    Ok(())
}

/// Respects `RUST_LOG` if set, otherwise logs at `level`.
fn setup_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
