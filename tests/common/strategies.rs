#![allow(dead_code)]

use proptest::prelude::*;

/// Project ids as they appear in cache keys
pub fn project_id_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,11}"
}

/// Opaque JSON config blobs
pub fn config_blob_strategy() -> impl Strategy<Value = String> {
    (any::<u32>(), "[a-z]{1,8}")
        .prop_map(|(n, word)| serde_json::json!({ "n": n, "word": word }).to_string())
}

/// Arbitrarily ordered version numbers, duplicates included
pub fn version_sequence_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(1i64..50, 1..30)
}

/// Per-cycle click increments for one notification
pub fn click_bursts_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..6, 1..8)
}
