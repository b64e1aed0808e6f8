//! DNS resolution on top of the ledger
//!
//! `DnsResolver` is the only entry point request handlers use. It turns
//! admission requests into buffered transactions and answers lookups
//! from mined blocks.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::consensus::{Block, Chain};
use crate::node::unix_timestamp;
use crate::p2p::{resolve_conflicts, ChainResponse, ChainSource, RegistryError, ResolveOutcome};
use crate::security::{DomainClassifier, SecurityVerdict};
use crate::storage::Blockchain;
use crate::validation::{DnsRecord, SecurityAnnotation, Transaction, TransactionError};

/// DNS layer errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DnsError {
    #[error("No existing entry for {0:?}")]
    NotFound(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(#[from] TransactionError),
}

/// Address a hostname resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    pub ip: String,
    pub port: u16,
}

impl From<&DnsRecord> for Resolved {
    fn from(record: &DnsRecord) -> Self {
        Self {
            ip: record.ip.clone(),
            port: record.port,
        }
    }
}

/// An admitted batch entry
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedEntry {
    pub key: String,
    pub hostname: String,
    /// Present when a classifier is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityVerdict>,
}

/// A batch entry that was turned away
#[derive(Debug, Clone, Serialize)]
pub struct RejectedEntry {
    pub key: String,
    pub value: Value,
    pub reason: String,
}

/// Per-entry outcome of [`DnsResolver::admit_batch`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdmissionReport {
    pub accepted: Vec<AcceptedEntry>,
    pub rejected: Vec<RejectedEntry>,
}

impl AdmissionReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Reachability of the domain classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierStatus {
    Online,
    Offline,
    /// No classifier configured
    Disabled,
}

/// Outcome of registering a list of peers
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistrationReport {
    pub added: usize,
    pub rejected: Vec<String>,
    pub total_nodes: usize,
}

/// Find the most recent record for `hostname`, newest transaction first
pub(crate) fn latest_record<'a, I>(transactions: I, hostname: &str) -> Option<&'a DnsRecord>
where
    I: DoubleEndedIterator<Item = &'a Transaction>,
{
    transactions
        .rev()
        .filter_map(Transaction::as_record)
        .find(|record| record.hostname == hostname)
}

fn lookup_in_chain(chain: &Chain, hostname: &str) -> Option<Resolved> {
    latest_record(chain.iter().flat_map(|block| block.transactions.iter()), hostname)
        .map(Resolved::from)
}

/// Hostname resolver backed by the replicated ledger
pub struct DnsResolver {
    blockchain: Arc<Blockchain>,
    chain_source: Arc<dyn ChainSource>,
    classifier: Option<Arc<dyn DomainClassifier>>,
}

impl DnsResolver {
    pub fn new(blockchain: Arc<Blockchain>, chain_source: Arc<dyn ChainSource>) -> Self {
        Self {
            blockchain,
            chain_source,
            classifier: None,
        }
    }

    /// Score every admitted hostname with `classifier`
    pub fn with_classifier(mut self, classifier: Arc<dyn DomainClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn blockchain(&self) -> &Arc<Blockchain> {
        &self.blockchain
    }

    // ---- admission ----

    /// Buffer a record for the next block
    ///
    /// Only presence is checked: empty hostname or ip strings count as
    /// missing.
    pub fn new_entry(&self, hostname: &str, ip: &str, port: u16) -> Result<(), DnsError> {
        if hostname.is_empty() {
            return Err(TransactionError::MissingField("hostname").into());
        }
        if ip.is_empty() {
            return Err(TransactionError::MissingField("ip").into());
        }
        self.blockchain.submit(DnsRecord::new(hostname, ip, port).into());
        debug!(hostname, ip, port, "record buffered");
        Ok(())
    }

    /// Buffer a security annotation for `hostname`
    pub fn annotate(&self, hostname: &str, verdict: &SecurityVerdict) -> SecurityAnnotation {
        let annotation = SecurityAnnotation {
            hostname: hostname.to_string(),
            ml_prediction: verdict.prediction,
            ml_label: verdict.label.clone(),
            confidence: verdict.confidence,
            timestamp: unix_timestamp(),
            analyzer_node: self.blockchain.node_id().to_string(),
        };
        self.blockchain.submit(annotation.clone().into());
        annotation
    }

    /// Classify a hostname, falling back to an unknown verdict on failure
    pub async fn classify(&self, hostname: &str) -> Option<SecurityVerdict> {
        let classifier = self.classifier.as_ref()?;
        let verdict = match classifier.classify(hostname).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(hostname, error = %e, "classifier unavailable, recording unknown verdict");
                SecurityVerdict::fallback()
            }
        };
        Some(verdict)
    }

    /// Buffer one record, then classify it and buffer the annotation
    async fn admit(&self, value: &Value) -> Result<(DnsRecord, Option<SecurityVerdict>), DnsError> {
        let record = DnsRecord::from_json(value)?;
        self.new_entry(&record.hostname, &record.ip, record.port)?;

        let security = self.classify(&record.hostname).await;
        if let Some(verdict) = &security {
            self.annotate(&record.hostname, verdict);
        }
        Ok((record, security))
    }

    pub async fn classifier_status(&self) -> ClassifierStatus {
        let Some(classifier) = &self.classifier else {
            return ClassifierStatus::Disabled;
        };
        if classifier.is_available().await {
            ClassifierStatus::Online
        } else {
            ClassifierStatus::Offline
        }
    }

    /// Admit a single `{hostname, ip, port}` object
    ///
    /// Returns the verdict that was buffered with it, if a classifier is
    /// configured.
    pub async fn add_record(&self, value: &Value) -> Result<Option<SecurityVerdict>, DnsError> {
        let (_, security) = self.admit(value).await?;
        Ok(security)
    }

    /// Admit a batch of `{hostname, ip, port}` objects keyed by arbitrary
    /// names
    ///
    /// Entries are buffered in the order they appear in the request. When
    /// a classifier is configured each record's annotation is buffered once
    /// the verdict arrives; a block mined while the classifier is pending
    /// seals the record without it, so the two may land in different
    /// blocks. Malformed entries are reported individually and do not
    /// affect their siblings.
    pub async fn admit_batch(&self, batch: &Map<String, Value>) -> AdmissionReport {
        let mut report = AdmissionReport::default();

        for (key, value) in batch {
            match self.admit(value).await {
                Ok((record, security)) => report.accepted.push(AcceptedEntry {
                    key: key.clone(),
                    hostname: record.hostname,
                    security,
                }),
                Err(e) => {
                    debug!(%key, error = %e, "rejected entry");
                    report.rejected.push(RejectedEntry {
                        key: key.clone(),
                        value: value.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }

    // ---- lookup ----

    /// Resolve `hostname` against mined blocks only
    ///
    /// The newest matching record wins; matching is exact and
    /// case-sensitive.
    pub fn lookup(&self, hostname: &str) -> Result<Resolved, DnsError> {
        self.blockchain
            .with_chain(|chain| lookup_in_chain(chain, hostname))
            .ok_or_else(|| DnsError::NotFound(hostname.to_string()))
    }

    /// Resolve `hostname`, letting buffered records shadow mined ones
    pub fn lookup_including_pending(&self, hostname: &str) -> Result<Resolved, DnsError> {
        let pending = self
            .blockchain
            .with_pending(|pending| latest_record(pending.iter(), hostname).map(Resolved::from));
        match pending {
            Some(resolved) => Ok(resolved),
            None => self.lookup(hostname),
        }
    }

    // ---- ledger operations ----

    /// Seal the buffer into a new block; blocks during the proof search
    pub fn mine_block(&self) -> Block {
        self.blockchain.mine_block()
    }

    /// Register every address in `nodes`, reporting the malformed ones
    pub fn register_nodes<'a, I>(&self, nodes: I) -> RegistrationReport
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut report = RegistrationReport::default();
        for node in nodes {
            match self.blockchain.register_node(node) {
                Ok(true) => report.added += 1,
                Ok(false) => {}
                Err(RegistryError::InvalidAddress(address)) => {
                    warn!(%address, "ignoring malformed peer address");
                    report.rejected.push(address);
                }
            }
        }
        report.total_nodes = self.network_size();
        report
    }

    /// Run one consensus round against every registered peer
    pub async fn resolve(&self) -> ResolveOutcome {
        resolve_conflicts(&self.blockchain, self.chain_source.as_ref()).await
    }

    // ---- diagnostics ----

    pub fn dump_chain(&self) -> ChainResponse {
        self.blockchain.with_chain(ChainResponse::from_chain)
    }

    pub fn dump_buffer(&self) -> Vec<Transaction> {
        self.blockchain.pending()
    }

    /// Difficulty parameter, in leading zero hex digits
    pub fn chain_quota(&self) -> u32 {
        self.blockchain.difficulty().digits()
    }

    /// Number of registered peers
    pub fn network_size(&self) -> usize {
        self.blockchain.node_count()
    }
}
