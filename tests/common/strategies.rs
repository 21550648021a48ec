//! Proptest strategies for record streams.

use proptest::prelude::*;

/// Ray identifiers in the producer's `Dev_RayId_NNN` shape
pub fn ray_id_strategy() -> impl Strategy<Value = String> {
    (1u32..=999).prop_map(|n| format!("Dev_RayId_{n:03}"))
}

pub fn status_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Success".to_string()),
        Just("Failed".to_string()),
        Just("Retried".to_string()),
        Just("UNKNOWN".to_string()),
    ]
}

/// A non-empty arrival sequence that may repeat ray identifiers
pub fn arrival_strategy(max_len: usize) -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec((ray_id_strategy(), status_strategy()), 1..=max_len)
}
