//! Node identity and clock

use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};

/// Random 128-bit node identifier, hex encoded
pub fn generate_node_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Seconds since Unix epoch by local wall clock
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
