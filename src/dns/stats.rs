//! Read-only ledger statistics
//!
//! Aggregates computed from mined blocks for dashboards and reporting
//! consumers. Each call works on one consistent snapshot of the chain.

use serde::Serialize;

use crate::consensus::{Block, Chain};
use crate::constants::RECENT_THREATS;
use crate::node::unix_timestamp;
use crate::validation::{SecurityAnnotation, Transaction};
use super::{ClassifierStatus, DnsResolver};

/// Chain-wide counters
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStats {
    pub total_blocks: usize,
    pub total_transactions: usize,
    pub pending_transactions: usize,
    pub dns_records: usize,
    pub network_size: usize,
    pub node_quota: u32,
    pub latest_block: Block,
    pub connected_nodes: Vec<String>,
    pub ml_analyzed: usize,
    pub malicious_domains: usize,
    pub safe_domains: usize,
    pub threat_percentage: f64,
}

/// A mined DNS record with its position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordView {
    pub hostname: String,
    pub ip: String,
    pub port: u16,
    pub block_index: u64,
    pub timestamp: u64,
}

/// A mined transaction with the block it landed in
#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub block_index: u64,
    pub block_timestamp: u64,
    pub block_source: String,
}

/// A mined security annotation
#[derive(Debug, Clone, Serialize)]
pub struct FeedEntry {
    #[serde(flatten)]
    pub annotation: SecurityAnnotation,
    pub block_index: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreatStats {
    pub total_analyzed: usize,
    pub malicious_domains: usize,
    pub safe_domains: usize,
    pub threat_percentage: f64,
    /// Most recent malicious verdicts, newest first
    pub recent_threats: Vec<FeedEntry>,
    pub blockchain_blocks: usize,
    pub network_nodes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkInfo {
    /// Short form of the local node identifier
    pub node_id: String,
    pub connected_nodes: Vec<String>,
    /// Peers plus this node
    pub total_nodes: usize,
}

/// How the classifier and the ledger are working together
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationStatus {
    pub ml_service_status: ClassifierStatus,
    pub blockchain_status: &'static str,
    /// Mined security annotations
    pub security_transactions: usize,
    pub integration_active: bool,
    pub last_analysis_time: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct SecurityTally {
    analyzed: usize,
    malicious: usize,
}

impl SecurityTally {
    fn of(chain: &Chain) -> Self {
        let mut tally = Self::default();
        for annotation in annotations(chain) {
            tally.analyzed += 1;
            if annotation.is_malicious() {
                tally.malicious += 1;
            }
        }
        tally
    }

    fn safe(&self) -> usize {
        self.analyzed - self.malicious
    }

    fn threat_percentage(&self) -> f64 {
        if self.analyzed == 0 {
            return 0.0;
        }
        self.malicious as f64 / self.analyzed as f64 * 100.0
    }
}

fn annotations(chain: &Chain) -> impl Iterator<Item = &SecurityAnnotation> {
    chain
        .iter()
        .flat_map(|block| block.transactions.iter())
        .filter_map(Transaction::as_annotation)
}

/// Annotations newest first, paired with their block index
fn feed(chain: &Chain) -> impl Iterator<Item = FeedEntry> + '_ {
    chain.iter().rev().flat_map(|block| {
        block
            .transactions
            .iter()
            .rev()
            .filter_map(Transaction::as_annotation)
            .map(move |annotation| FeedEntry {
                annotation: annotation.clone(),
                block_index: block.index,
            })
    })
}

impl DnsResolver {
    pub fn stats(&self) -> LedgerStats {
        let pending_transactions = self.blockchain().pending_len();
        let connected_nodes = self.blockchain().nodes();

        self.blockchain().with_chain(|chain| {
            let tally = SecurityTally::of(chain);
            let dns_records = chain
                .iter()
                .flat_map(|block| block.transactions.iter())
                .filter(|tx| tx.as_record().is_some())
                .count();

            LedgerStats {
                total_blocks: chain.len(),
                total_transactions: chain.iter().map(|block| block.transactions.len()).sum(),
                pending_transactions,
                dns_records,
                network_size: connected_nodes.len(),
                node_quota: self.chain_quota(),
                latest_block: chain.tail().clone(),
                connected_nodes,
                ml_analyzed: tally.analyzed,
                malicious_domains: tally.malicious,
                safe_domains: tally.safe(),
                threat_percentage: tally.threat_percentage(),
            }
        })
    }

    /// Every mined record in chain order
    pub fn dns_records(&self) -> Vec<RecordView> {
        self.blockchain().with_chain(|chain| {
            chain
                .iter()
                .flat_map(|block| {
                    block
                        .transactions
                        .iter()
                        .filter_map(Transaction::as_record)
                        .map(move |record| RecordView {
                            hostname: record.hostname.clone(),
                            ip: record.ip.clone(),
                            port: record.port,
                            block_index: block.index,
                            timestamp: block.timestamp,
                        })
                })
                .collect()
        })
    }

    /// Every mined transaction, newest block first
    pub fn transactions(&self) -> Vec<TransactionView> {
        self.blockchain().with_chain(|chain| {
            chain
                .iter()
                .rev()
                .flat_map(|block| {
                    block.transactions.iter().map(move |tx| TransactionView {
                        transaction: tx.clone(),
                        block_index: block.index,
                        block_timestamp: block.timestamp,
                        block_source: block.source.clone(),
                    })
                })
                .collect()
        })
    }

    /// Up to `limit` mined annotations, newest first
    pub fn security_feed(&self, limit: usize) -> Vec<FeedEntry> {
        self.blockchain()
            .with_chain(|chain| feed(chain).take(limit).collect())
    }

    pub fn threat_stats(&self) -> ThreatStats {
        let network_nodes = self.network_size();
        self.blockchain().with_chain(|chain| {
            let tally = SecurityTally::of(chain);
            ThreatStats {
                total_analyzed: tally.analyzed,
                malicious_domains: tally.malicious,
                safe_domains: tally.safe(),
                threat_percentage: tally.threat_percentage(),
                recent_threats: feed(chain)
                    .filter(|entry| entry.annotation.is_malicious())
                    .take(RECENT_THREATS)
                    .collect(),
                blockchain_blocks: chain.len(),
                network_nodes,
            }
        })
    }

    /// Check the classifier and count mined annotations
    pub async fn integration_status(&self) -> IntegrationStatus {
        let ml_service_status = self.classifier_status().await;
        let security_transactions = self
            .blockchain()
            .with_chain(|chain| annotations(chain).count());

        IntegrationStatus {
            ml_service_status,
            blockchain_status: "online",
            security_transactions,
            integration_active: ml_service_status == ClassifierStatus::Online,
            last_analysis_time: unix_timestamp(),
        }
    }

    pub fn network_info(&self) -> NetworkInfo {
        let connected_nodes = self.blockchain().nodes();
        NetworkInfo {
            node_id: self.blockchain().node_id().chars().take(8).collect(),
            total_nodes: connected_nodes.len() + 1,
            connected_nodes,
        }
    }
}
