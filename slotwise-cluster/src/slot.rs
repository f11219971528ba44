//! Hash-slot calculation and slot-targeted key labels.
//!
//! The keyspace is partitioned into 16,384 fixed slots:
//! `slot = CRC16(payload) mod 16384`, where the payload is the key itself or,
//! when the key contains a `{...}` hash tag, only the tag. Hash tags let
//! callers deliberately co-locate related keys on one slot.

use crate::crc16::crc16;
use crate::topology::SlotRange;

/// Number of hash slots in the cluster (2^14).
pub const CLUSTER_SLOTS: u16 = 16384;

/// Calculate the hash slot for a key.
///
/// Pure and stateless; safe to call from any number of threads.
///
/// # Example
///
/// ```
/// use slotwise_cluster::slot::hash_slot;
///
/// // Same tag, same slot, regardless of surrounding content.
/// assert_eq!(hash_slot(b"{user}:a"), hash_slot(b"{user}:b"));
/// ```
pub fn hash_slot(key: &[u8]) -> u16 {
    let payload = extract_hash_tag(key).unwrap_or(key);
    crc16(payload) % CLUSTER_SLOTS
}

/// Convenience wrapper for string keys.
pub fn hash_slot_str(key: &str) -> u16 {
    hash_slot(key.as_bytes())
}

/// Extract the hash tag from a key, if it has a valid one.
///
/// The tag is the substring between the first `{` and the first `}` after
/// it. An empty tag (`{}`) does not count; neither does an unclosed brace.
pub fn extract_hash_tag(key: &[u8]) -> Option<&[u8]> {
    let start = key.iter().position(|&b| b == b'{')?;
    let rest = &key[start + 1..];
    let end = rest.iter().position(|&b| b == b'}')?;
    if end == 0 {
        return None;
    }
    Some(&rest[..end])
}

/// Mint a label such that `base + label_suffix` hashes into `range`.
///
/// Suffixes over `A`–`Z` are tried shortest-first; within a length, the
/// leading letter counts up from `A` while every following letter counts
/// down from `Z` (`A`, `B`, .., `Z`, `AZ`, `AY`, .., `AA`, `BZ`, ..). The
/// first candidate whose slot falls inside `range` wins. The 26 single-letter
/// candidates almost always cover the slot space already; longer suffixes
/// exist for exhaustiveness against very narrow ranges.
///
/// The returned string includes `base`, e.g. `label_for_range("n", ..)` may
/// return `"nB"`.
pub fn label_for_range(base: &str, range: &SlotRange) -> String {
    for len in 1u32.. {
        let count = 26u64.saturating_pow(len);
        for i in 0..count {
            let mut candidate = String::with_capacity(base.len() + len as usize);
            candidate.push_str(base);
            push_alpha_suffix(&mut candidate, i, len);
            if range.contains(hash_slot(candidate.as_bytes())) {
                return candidate;
            }
        }
    }
    unreachable!("suffix enumeration is unbounded")
}

/// Append the `i`-th suffix of length `len`. The leading position maps its
/// base-26 digit onto `A..Z` ascending, every later position onto `Z..A`.
fn push_alpha_suffix(out: &mut String, mut i: u64, len: u32) {
    let mut digits = vec![0u8; len as usize];
    for pos in (0..len as usize).rev() {
        digits[pos] = (i % 26) as u8;
        i /= 26;
    }
    for (pos, d) in digits.into_iter().enumerate() {
        let c = if pos == 0 { b'A' + d } else { b'Z' - d };
        out.push(c as char);
    }
}
