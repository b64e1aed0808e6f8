//! ChainDNS Node
//!
//! Main entry point for running a ChainDNS node. Configuration comes from
//! `CHAINDNS_*` environment variables; see `chaindns::config`.

use std::sync::Arc;

use chaindns::api::{serve, AppState};
use chaindns::config::NodeConfig;
use chaindns::dns::DnsResolver;
use chaindns::node::generate_node_id;
use chaindns::p2p::HttpChainSource;
use chaindns::security::HttpClassifier;
use chaindns::storage::{Blockchain, ChainDb};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "chaindns=info,chaindns_node=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let config = NodeConfig::from_env().map_err(|e| format!("invalid configuration: {e}"))?;
    let node_id = generate_node_id();
    info!(%node_id, difficulty = %config.difficulty, "starting node");

    let blockchain = match &config.data_dir {
        Some(dir) => {
            let db = ChainDb::open(dir)
                .map_err(|e| format!("failed to open chain store at {}: {e}", dir.display()))?;
            Blockchain::open(&node_id, config.difficulty, db)
        }
        None => Blockchain::new(&node_id, config.difficulty),
    };
    let blockchain = Arc::new(blockchain);

    let chain_source = HttpChainSource::new(config.peer_timeout)
        .map_err(|e| format!("failed to create peer client: {e}"))?;
    let mut dns = DnsResolver::new(blockchain, Arc::new(chain_source));

    if config.classifier.enabled {
        let classifier = HttpClassifier::new(
            config.classifier.base_url.clone(),
            config.classifier.timeout,
        )
        .map_err(|e| format!("failed to create classifier client: {e}"))?;
        info!(url = %config.classifier.base_url, "domain classifier enabled");
        dns = dns.with_classifier(Arc::new(classifier));
    }

    let report = dns.register_nodes(config.peers.iter().map(String::as_str));
    for address in &report.rejected {
        warn!(%address, "ignoring configured peer");
    }
    if report.total_nodes > 0 {
        info!(peers = report.total_nodes, "registered configured peers");
    }

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", config.listen_addr))?;
    let listen_addr = listener
        .local_addr()
        .map_err(|e| format!("failed to read listen address: {e}"))?;

    let state = Arc::new(AppState { dns, listen_addr });

    serve(listener, state, async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received, stopping node"),
            Err(e) => {
                warn!(error = %e, "cannot listen for shutdown signal");
                std::future::pending::<()>().await
            }
        }
    })
    .await
    .map_err(|e| format!("server error: {e}"))
}
