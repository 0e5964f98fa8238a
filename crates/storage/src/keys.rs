//! Key layout shared by storage implementations.
//!
//! ```text
//! "c"                      -> latest AgreementCheckpoint
//! "d" ++ round (u64, BE)   -> Decision
//! ```
//!
//! Rounds are big-endian so byte order matches round order and the last key
//! under [`DECISION_PREFIX`] is the latest decided round.

use concord_types::Round;

/// Key of the single checkpoint record.
pub const CHECKPOINT_KEY: &[u8] = b"c";

/// Prefix of decision records.
pub const DECISION_PREFIX: &[u8] = b"d";

/// Storage key of the decision for `round`.
pub fn decision_key(round: Round) -> Vec<u8> {
    let mut key = Vec::with_capacity(DECISION_PREFIX.len() + 8);
    key.extend_from_slice(DECISION_PREFIX);
    key.extend_from_slice(&round.0.to_be_bytes());
    key
}

/// Recover the round from a decision key.
pub fn round_from_decision_key(key: &[u8]) -> Option<Round> {
    let suffix = key.strip_prefix(DECISION_PREFIX)?;
    let bytes: [u8; 8] = suffix.try_into().ok()?;
    Some(Round(u64::from_be_bytes(bytes)))
}

/// Compute the exclusive end key for a prefix scan.
///
/// Returns `None` if the prefix is all `0xFF` bytes (no valid exclusive upper bound).
pub fn next_prefix(prefix: &[u8]) -> Option<Vec<u8>> {
    debug_assert!(!prefix.is_empty(), "next_prefix called with empty prefix");
    let mut next = prefix.to_vec();
    for i in (0..next.len()).rev() {
        if next[i] < 255 {
            next[i] += 1;
            return Some(next);
        }
        next[i] = 0;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_keys_sort_by_round() {
        let keys: Vec<_> = [0, 1, 255, 256, u64::MAX]
            .into_iter()
            .map(|r| decision_key(Round(r)))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(round_from_decision_key(&keys[3]), Some(Round(256)));
        assert_eq!(round_from_decision_key(CHECKPOINT_KEY), None);
    }

    #[test]
    fn test_next_prefix() {
        assert_eq!(next_prefix(b"d"), Some(b"e".to_vec()));
        assert_eq!(next_prefix(&[0x01, 0xFF]), Some(vec![0x02, 0x00]));
        assert_eq!(next_prefix(&[0xFF, 0xFF]), None);
    }
}
