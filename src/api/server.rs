//! HTTP Server
//!
//! Axum router exposing the node's ledger and DNS operations, plus the
//! chain route peers pull from during consensus.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::constants::{CHAIN_NAME, CHAIN_ROUTE};
use crate::dns::DnsResolver;
use super::handlers;

/// Shared handler state
pub struct AppState {
    pub dns: DnsResolver,
    /// Address this node serves on, as reported to clients
    pub listen_addr: SocketAddr,
}

pub type SharedState = Arc<AppState>;

/// Build the router with every route mounted
pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/debug/alive", get(handlers::alive))
        .route("/debug/dump_chain", get(handlers::dump_chain))
        .route("/debug/dump_buffer", get(handlers::dump_buffer))
        .route("/debug/force_block", get(handlers::force_block))
        .route("/debug/get_quota", get(handlers::get_quota))
        .route("/nodes/new", post(handlers::register_nodes))
        .route("/nodes/resolve", get(handlers::resolve))
        .route(CHAIN_ROUTE, get(handlers::dump_chain))
        .route("/dns/new", post(handlers::new_entries))
        .route("/dns/request", post(handlers::lookup))
        .route("/api/add-dns-record", post(handlers::add_dns_record))
        .route("/api/stats", get(handlers::stats))
        .route("/api/dns-records", get(handlers::dns_records))
        .route("/api/transactions", get(handlers::transactions))
        .route("/api/security-feed", get(handlers::security_feed))
        .route("/api/threat-stats", get(handlers::threat_stats))
        .route("/api/pending-transactions", get(handlers::pending_transactions))
        .route("/api/network-info", get(handlers::network_info))
        .route("/api/ml-blockchain-integration", get(handlers::integration_status))
        .layer(cors)
        .with_state(state)
}

/// Serve on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: SharedState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%addr, "{CHAIN_NAME} node listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
