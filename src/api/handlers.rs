//! Route handlers
//!
//! Thin adapters from HTTP requests to `DnsResolver` calls. Proof-of-work
//! runs on the blocking pool and consensus runs as a background task, so
//! no handler holds a request worker for long.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::constants::{CHAIN_NAME, SECURITY_FEED_LIMIT};
use crate::dns::{
    DnsError, FeedEntry, IntegrationStatus, LedgerStats, NetworkInfo, RecordView, ThreatStats,
    TransactionView,
};
use crate::p2p::ChainResponse;
use crate::security::SecurityVerdict;
use crate::validation::Transaction;
use super::SharedState;

type Reply = (StatusCode, Json<Value>);

fn reply(status: StatusCode, body: Value) -> Reply {
    (status, Json(body))
}

/// `GET /debug/alive`
pub async fn alive() -> Json<String> {
    Json(format!("The {CHAIN_NAME} node is alive"))
}

/// `GET /nodes/chain`, `GET /debug/dump_chain`
pub async fn dump_chain(State(state): State<SharedState>) -> Json<ChainResponse> {
    Json(state.dns.dump_chain())
}

/// `GET /debug/dump_buffer`
pub async fn dump_buffer(State(state): State<SharedState>) -> Json<Vec<Transaction>> {
    Json(state.dns.dump_buffer())
}

/// `GET /debug/get_quota`
pub async fn get_quota(State(state): State<SharedState>) -> Json<u32> {
    Json(state.dns.chain_quota())
}

/// `GET /debug/force_block`
///
/// Refuses to mine an empty buffer.
pub async fn force_block(State(state): State<SharedState>) -> Reply {
    let pending = state.dns.blockchain().pending_len();
    if pending == 0 {
        return reply(
            StatusCode::BAD_REQUEST,
            json!({
                "error": "No pending transactions to mine. Add DNS records first.",
                "pending_transactions": 0,
            }),
        );
    }

    let miner = state.clone();
    match tokio::task::spawn_blocking(move || miner.dns.mine_block()).await {
        Ok(block) => reply(
            StatusCode::OK,
            json!({
                "message": format!("New block mined with proof {}", block.proof),
                "proof": block.proof,
                "index": block.index,
                "transactions_included": block.transactions.len(),
            }),
        ),
        Err(e) => {
            error!(error = %e, "mining task failed");
            reply(StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Mining failed" }))
        }
    }
}

/// `POST /nodes/new` with `{"nodes": [...]}`
pub async fn register_nodes(State(state): State<SharedState>, Json(body): Json<Value>) -> Reply {
    let Some(nodes) = body.get("nodes").and_then(Value::as_array) else {
        return reply(StatusCode::BAD_REQUEST, json!({ "error": "No node supplied" }));
    };

    let (addresses, mut not_strings): (Vec<&Value>, Vec<&Value>) =
        nodes.iter().partition(|node| node.is_string());
    let mut report = state
        .dns
        .register_nodes(addresses.iter().filter_map(|node| node.as_str()));
    report
        .rejected
        .extend(not_strings.drain(..).map(Value::to_string));

    reply(
        StatusCode::CREATED,
        json!({
            "message": "New nodes have been added",
            "total_nodes": report.total_nodes,
            "rejected": report.rejected,
        }),
    )
}

/// `GET /nodes/resolve`
///
/// Starts a consensus round in the background and returns immediately.
/// The outcome is observable later through the chain route.
pub async fn resolve(State(state): State<SharedState>) -> Reply {
    tokio::spawn(async move {
        let outcome = state.dns.resolve().await;
        info!(
            replaced = outcome.replaced,
            length = outcome.length,
            skipped = ?outcome.skipped_peers(),
            "background consensus finished"
        );
    });

    reply(StatusCode::ACCEPTED, json!({ "message": "Consensus round started" }))
}

/// `POST /dns/new` with `{"<key>": {"hostname", "ip", "port"}, ...}`
pub async fn new_entries(State(state): State<SharedState>, Json(body): Json<Value>) -> Reply {
    let Some(batch) = body.as_object() else {
        return reply(
            StatusCode::BAD_REQUEST,
            json!({ "error": "Expected an object of entries" }),
        );
    };

    let report = state.dns.admit_batch(batch).await;
    if report.is_clean() {
        reply(
            StatusCode::CREATED,
            json!({
                "message": "New DNS entries added",
                "accepted": report.accepted,
            }),
        )
    } else {
        reply(
            StatusCode::BAD_REQUEST,
            json!({
                "error": "Some entries failed",
                "bad_entries": report.rejected,
                "accepted": report.accepted,
            }),
        )
    }
}

/// `POST /api/add-dns-record` with `{"hostname", "ip", "port"}`
pub async fn add_dns_record(State(state): State<SharedState>, Json(body): Json<Value>) -> Reply {
    match state.dns.add_record(&body).await {
        Ok(security) => reply(
            StatusCode::CREATED,
            json!({
                "message": "DNS record added successfully with security analysis",
                "security_analysis": security,
            }),
        ),
        Err(e) => reply(StatusCode::BAD_REQUEST, json!({ "error": e.to_string() })),
    }
}

#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    hostname: Option<String>,
    /// Let buffered records shadow mined ones
    #[serde(default)]
    include_pending: bool,
}

#[derive(Debug, Serialize)]
struct LookupReply {
    ip: String,
    port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    security: Option<SecurityVerdict>,
}

/// `POST /dns/request` with `{"hostname": ...}`
pub async fn lookup(State(state): State<SharedState>, Json(body): Json<LookupRequest>) -> Reply {
    let Some(hostname) = body.hostname else {
        return reply(StatusCode::BAD_REQUEST, json!({ "error": "Missing values" }));
    };

    let resolved = if body.include_pending {
        state.dns.lookup_including_pending(&hostname)
    } else {
        state.dns.lookup(&hostname)
    };
    // Display only; lookups never write annotations
    let security = state.dns.classify(&hostname).await;

    match resolved {
        Ok(resolved) => reply(
            StatusCode::OK,
            json!(LookupReply {
                ip: resolved.ip,
                port: resolved.port,
                security,
            }),
        ),
        Err(DnsError::NotFound(_)) => {
            let mut body = json!({ "error": "No existing entry" });
            if let Some(verdict) = security {
                body["security"] = json!(verdict);
            }
            reply(StatusCode::NOT_FOUND, body)
        }
        Err(e) => reply(StatusCode::BAD_REQUEST, json!({ "error": e.to_string() })),
    }
}

/// `GET /api/stats`
pub async fn stats(State(state): State<SharedState>) -> Json<LedgerStats> {
    Json(state.dns.stats())
}

/// `GET /api/dns-records`
pub async fn dns_records(State(state): State<SharedState>) -> Json<Vec<RecordView>> {
    Json(state.dns.dns_records())
}

/// `GET /api/transactions`
pub async fn transactions(State(state): State<SharedState>) -> Json<Vec<TransactionView>> {
    Json(state.dns.transactions())
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    limit: Option<usize>,
}

/// `GET /api/security-feed?limit=N`
pub async fn security_feed(
    State(state): State<SharedState>,
    Query(query): Query<FeedQuery>,
) -> Json<Vec<FeedEntry>> {
    Json(state.dns.security_feed(query.limit.unwrap_or(SECURITY_FEED_LIMIT)))
}

/// `GET /api/threat-stats`
pub async fn threat_stats(State(state): State<SharedState>) -> Json<ThreatStats> {
    Json(state.dns.threat_stats())
}

/// `GET /api/pending-transactions`
pub async fn pending_transactions(State(state): State<SharedState>) -> Reply {
    let pending = state.dns.dump_buffer();
    reply(
        StatusCode::OK,
        json!({
            "total_pending": pending.len(),
            "pending_transactions": pending,
        }),
    )
}

/// `GET /api/ml-blockchain-integration`
pub async fn integration_status(State(state): State<SharedState>) -> Json<IntegrationStatus> {
    Json(state.dns.integration_status().await)
}

#[derive(Debug, Serialize)]
pub struct NetworkReply {
    current_node: String,
    #[serde(flatten)]
    info: NetworkInfo,
}

/// `GET /api/network-info`
pub async fn network_info(State(state): State<SharedState>) -> Json<NetworkReply> {
    Json(NetworkReply {
        current_node: state.listen_addr.to_string(),
        info: state.dns.network_info(),
    })
}
