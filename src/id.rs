//! ID generation utilities for tabpilot
//!
//! Provides identifiers for tool executions and chains.

use std::sync::atomic::{AtomicU32, Ordering};

static SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn next_sequence() -> u16 {
    (SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0xffff) as u16
}

/// Generate a unique execution ID
///
/// Format: `exec-{timestamp_ms}-{sequence_hex}`
/// Example: `exec-1738300800123-00a1`
pub fn generate_execution_id() -> String {
    format!("exec-{}-{:04x}", now_ms(), next_sequence())
}

/// Generate a unique chain ID
///
/// Format: `chain-{timestamp_ms}-{sequence_hex}`
pub fn generate_chain_id() -> String {
    format!("chain-{}-{:04x}", now_ms(), next_sequence())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_returns_reasonable_timestamp() {
        let ts = now_ms();
        // Should be after 2020-01-01 and before 2100-01-01
        assert!(ts > 1577836800000);
        assert!(ts < 4102444800000);
    }

    #[test]
    fn test_generate_execution_id_format() {
        let id = generate_execution_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "exec");
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_execution_id_uniqueness() {
        let id1 = generate_execution_id();
        let id2 = generate_execution_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_generate_chain_id_prefix() {
        let id = generate_chain_id();
        assert!(id.starts_with("chain-"));
    }
}
