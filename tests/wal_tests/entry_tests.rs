//! Tests for WAL entry framing
//!
//! These tests verify:
//! - Header layout (LSN, CRC, length)
//! - Batches and expiry metadata survive encoding
//! - Truncated and tampered frames are rejected

use stashkv::wal::{Operation, WalEntry, HEADER_SIZE};
use stashkv::StashError;

fn batch_entry() -> WalEntry {
    WalEntry::new(
        7,
        vec![
            Operation::Put {
                key: b"order:1".to_vec(),
                value: b"100".to_vec(),
                expires_at: Some(1_700_000_000_000),
            },
            Operation::Delete { key: b"order:0".to_vec() },
        ],
    )
}

// =============================================================================
// Framing Tests
// =============================================================================

#[test]
fn test_header_layout() {
    let entry = batch_entry();
    let bytes = entry.serialize().unwrap();

    assert_eq!(&bytes[0..8], &7u64.to_le_bytes());
    assert_eq!(&bytes[8..12], &entry.compute_crc().unwrap().to_le_bytes());

    let len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
    assert_eq!(bytes.len(), HEADER_SIZE + len);
    assert_eq!(entry.serialized_size().unwrap(), bytes.len());
}

#[test]
fn test_batch_with_expiry_decodes_intact() {
    let entry = batch_entry();
    let decoded = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();

    assert_eq!(decoded, entry);
    assert_eq!(decoded.operations.len(), 2);
    assert_eq!(decoded.operations[1].key(), b"order:0");
}

#[test]
fn test_empty_key_and_value() {
    let entry = WalEntry::new(
        1,
        vec![Operation::Put {
            key: vec![],
            value: vec![],
            expires_at: None,
        }],
    );
    let decoded = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();
    assert_eq!(decoded.operations, entry.operations);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_short_buffer_rejected() {
    let err = WalEntry::deserialize(&[0u8; HEADER_SIZE - 1]).unwrap_err();
    assert!(matches!(err, StashError::WalCorruption(_)));
}

#[test]
fn test_truncated_body_rejected() {
    let bytes = batch_entry().serialize().unwrap();
    let err = WalEntry::deserialize(&bytes[..bytes.len() - 3]).unwrap_err();
    assert!(matches!(err, StashError::WalCorruption(_)));
}

#[test]
fn test_flipped_data_byte_fails_crc() {
    let mut bytes = batch_entry().serialize().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;

    match WalEntry::deserialize(&bytes).unwrap_err() {
        StashError::WalCorruption(msg) => assert!(msg.contains("CRC")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_header_lsn_must_match_body() {
    let mut bytes = batch_entry().serialize().unwrap();
    bytes[0..8].copy_from_slice(&8u64.to_le_bytes());

    match WalEntry::deserialize(&bytes).unwrap_err() {
        StashError::WalCorruption(msg) => assert!(msg.contains("LSN")),
        other => panic!("unexpected error: {other:?}"),
    }
}
