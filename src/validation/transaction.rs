//! Ledger transactions
//!
//! A transaction is either a DNS record (an address assertion) or a
//! security annotation produced by the external domain classifier.
//! Transactions carry no id; they are identified by their position in
//! the chain.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Encoding tag for DNS records
const TAG_DNS_RECORD: u8 = 0x01;
/// Encoding tag for security annotations
const TAG_SECURITY_ANALYSIS: u8 = 0x02;

/// Admission errors for raw transaction input
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Entry is not an object")]
    NotAnObject,
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Hostname to address assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub hostname: String,
    pub ip: String,
    pub port: u16,
}

impl DnsRecord {
    pub fn new(hostname: impl Into<String>, ip: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            ip: ip.into(),
            port,
        }
    }

    /// Parse a record from an untyped JSON object.
    ///
    /// Only presence and shape are checked. Whether `ip` is a routable
    /// address is the caller's business.
    pub fn from_json(value: &Value) -> Result<Self, TransactionError> {
        let object = value.as_object().ok_or(TransactionError::NotAnObject)?;

        let hostname = string_field(object, "hostname")?;
        let ip = string_field(object, "ip")?;
        let port = match object.get("port") {
            None | Some(Value::Null) => return Err(TransactionError::MissingField("port")),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| invalid("port", format!("{n} is not a valid port")))?,
            // Form-style clients send the port as a string
            Some(Value::String(s)) => s
                .trim()
                .parse::<u16>()
                .map_err(|_| invalid("port", format!("{s:?} is not a valid port")))?,
            Some(other) => return Err(invalid("port", format!("unexpected value {other}"))),
        };

        Ok(Self { hostname, ip, port })
    }
}

fn string_field(
    object: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<String, TransactionError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(TransactionError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(invalid(field, format!("expected a string, got {other}"))),
    }
}

fn invalid(field: &'static str, reason: String) -> TransactionError {
    TransactionError::InvalidField { field, reason }
}

/// Advisory classifier output stored alongside records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityAnnotation {
    pub hostname: String,
    /// 1 = malicious, 0 = safe or unknown
    pub ml_prediction: u8,
    pub ml_label: String,
    pub confidence: f64,
    /// Seconds since Unix epoch
    pub timestamp: u64,
    pub analyzer_node: String,
}

impl SecurityAnnotation {
    pub fn is_malicious(&self) -> bool {
        self.ml_prediction == 1
    }
}

/// A ledger transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transaction {
    DnsRecord(DnsRecord),
    SecurityAnalysis(SecurityAnnotation),
}

impl Transaction {
    /// Hostname the transaction refers to
    pub fn hostname(&self) -> &str {
        match self {
            Transaction::DnsRecord(record) => &record.hostname,
            Transaction::SecurityAnalysis(annotation) => &annotation.hostname,
        }
    }

    /// The record, if this transaction is resolvable to an address
    pub fn as_record(&self) -> Option<&DnsRecord> {
        match self {
            Transaction::DnsRecord(record) => Some(record),
            Transaction::SecurityAnalysis(_) => None,
        }
    }

    /// The annotation, if this is a security annotation
    pub fn as_annotation(&self) -> Option<&SecurityAnnotation> {
        match self {
            Transaction::SecurityAnalysis(annotation) => Some(annotation),
            Transaction::DnsRecord(_) => None,
        }
    }

    /// Append the canonical encoding of this transaction
    pub fn encode_into(&self, bytes: &mut Vec<u8>) {
        match self {
            Transaction::DnsRecord(record) => {
                bytes.push(TAG_DNS_RECORD);
                put_str(bytes, &record.hostname);
                put_str(bytes, &record.ip);
                bytes.extend_from_slice(&record.port.to_le_bytes());
            }
            Transaction::SecurityAnalysis(annotation) => {
                bytes.push(TAG_SECURITY_ANALYSIS);
                put_str(bytes, &annotation.hostname);
                bytes.push(annotation.ml_prediction);
                put_str(bytes, &annotation.ml_label);
                bytes.extend_from_slice(&annotation.confidence.to_bits().to_le_bytes());
                bytes.extend_from_slice(&annotation.timestamp.to_le_bytes());
                put_str(bytes, &annotation.analyzer_node);
            }
        }
    }

    /// Canonical encoding of this transaction alone
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.encode_into(&mut bytes);
        bytes
    }
}

impl From<DnsRecord> for Transaction {
    fn from(record: DnsRecord) -> Self {
        Transaction::DnsRecord(record)
    }
}

impl From<SecurityAnnotation> for Transaction {
    fn from(annotation: SecurityAnnotation) -> Self {
        Transaction::SecurityAnalysis(annotation)
    }
}

/// Length-prefixed UTF-8 string
pub(crate) fn put_str(bytes: &mut Vec<u8>, s: &str) {
    bytes.extend_from_slice(&(s.len() as u32).to_le_bytes());
    bytes.extend_from_slice(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn annotation() -> SecurityAnnotation {
        SecurityAnnotation {
            hostname: "example.com".into(),
            ml_prediction: 1,
            ml_label: "malicious".into(),
            confidence: 0.93,
            timestamp: 1_700_000_000,
            analyzer_node: "abc".into(),
        }
    }

    #[test]
    fn test_record_from_json() {
        let record = DnsRecord::from_json(&json!({
            "hostname": "example.com",
            "ip": "10.0.0.1",
            "port": 8080
        }))
        .unwrap();
        assert_eq!(record, DnsRecord::new("example.com", "10.0.0.1", 8080));
    }

    #[test]
    fn test_record_port_as_string() {
        let record = DnsRecord::from_json(&json!({
            "hostname": "a", "ip": "b", "port": " 443 "
        }))
        .unwrap();
        assert_eq!(record.port, 443);
    }

    #[test]
    fn test_record_missing_field() {
        let err = DnsRecord::from_json(&json!({"hostname": "a", "port": 1})).unwrap_err();
        assert_eq!(err, TransactionError::MissingField("ip"));

        let err = DnsRecord::from_json(&json!({"hostname": "a", "ip": "b"})).unwrap_err();
        assert_eq!(err, TransactionError::MissingField("port"));
    }

    #[test]
    fn test_record_invalid_port() {
        let err = DnsRecord::from_json(&json!({"hostname": "a", "ip": "b", "port": 70000}))
            .unwrap_err();
        assert!(matches!(err, TransactionError::InvalidField { field: "port", .. }));

        let err = DnsRecord::from_json(&json!({"hostname": "a", "ip": "b", "port": -1}))
            .unwrap_err();
        assert!(matches!(err, TransactionError::InvalidField { field: "port", .. }));
    }

    #[test]
    fn test_record_not_an_object() {
        let err = DnsRecord::from_json(&json!(["a", "b"])).unwrap_err();
        assert_eq!(err, TransactionError::NotAnObject);
    }

    #[test]
    fn test_wire_format_is_tagged() {
        let tx = Transaction::from(DnsRecord::new("h", "1.1.1.1", 53));
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["type"], "dns_record");
        assert_eq!(value["hostname"], "h");

        let tx = Transaction::from(annotation());
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["type"], "security_analysis");
        assert_eq!(value["ml_label"], "malicious");

        let back: Transaction = serde_json::from_value(value).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn test_encoding_distinguishes_variants() {
        let record = Transaction::from(DnsRecord::new("h", "i", 1));
        let other = Transaction::from(DnsRecord::new("hi", "", 1));
        // Length prefixes keep field boundaries unambiguous
        assert_ne!(record.to_bytes(), other.to_bytes());
        assert_eq!(record.to_bytes()[0], TAG_DNS_RECORD);
        assert_eq!(Transaction::from(annotation()).to_bytes()[0], TAG_SECURITY_ANALYSIS);
    }

    #[test]
    fn test_accessors() {
        let record = Transaction::from(DnsRecord::new("h", "i", 1));
        assert_eq!(record.hostname(), "h");
        assert!(record.as_record().is_some());
        assert!(record.as_annotation().is_none());

        let note = Transaction::from(annotation());
        assert!(note.as_record().is_none());
        assert!(note.as_annotation().unwrap().is_malicious());
    }
}
