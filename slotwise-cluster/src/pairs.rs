//! Typed key/value pairing and hash-tag helpers.
//!
//! Multi-set callers often hold a flat `[k1, v1, k2, v2, ..]` sequence; it is
//! validated here, once, at the boundary instead of flowing through the
//! dispatcher as an untyped bag.

use crate::error::{Error, Result};

/// One key/value pair for a multi-set call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: String,
    pub value: String,
}

impl KvPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }

    /// Convert a flat interleaved `[key, value, key, value, ..]` sequence.
    ///
    /// Rejects odd-length sequences; a dangling key has no value and almost
    /// certainly means the caller built the list wrong.
    pub fn from_flat<S: AsRef<str>>(items: &[S]) -> Result<Vec<KvPair>> {
        if items.len() % 2 != 0 {
            return Err(Error::InvalidArgument(format!(
                "key/value sequence has odd length {}",
                items.len()
            )));
        }
        Ok(items
            .chunks_exact(2)
            .map(|pair| KvPair::new(pair[0].as_ref(), pair[1].as_ref()))
            .collect())
    }
}

impl<K: Into<String>, V: Into<String>> From<(K, V)> for KvPair {
    fn from((key, value): (K, V)) -> Self {
        KvPair::new(key, value)
    }
}

/// Build a `{label}:key` co-located key for a slot label.
pub fn tagged_key(label: &str, key: &str) -> String {
    format!("{{{label}}}:{key}")
}

/// Strip one leading `{...}:` hash-tag prefix, if present.
///
/// The inverse of [`tagged_key`]; useful when co-located keys must be mapped
/// back to their caller-visible names.
pub fn strip_slot_tag(key: &str) -> &str {
    let Some(rest) = key.strip_prefix('{') else { return key };
    match rest.split_once('}') {
        Some((tag, tail)) if !tag.is_empty() => match tail.strip_prefix(':') {
            Some(bare) => bare,
            None => key,
        },
        _ => key,
    }
}

/// [`strip_slot_tag`] over a whole key list.
pub fn strip_slot_tags<'a>(keys: &'a [String]) -> Vec<&'a str> {
    keys.iter().map(|k| strip_slot_tag(k)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flat_pairs_up() {
        let pairs = KvPair::from_flat(&["k1", "v1", "k2", "v2"]).unwrap();
        assert_eq!(pairs, vec![KvPair::new("k1", "v1"), KvPair::new("k2", "v2")]);
    }

    #[test]
    fn test_from_flat_rejects_odd_length() {
        let err = KvPair::from_flat(&["k1", "v1", "dangling"]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_from_flat_empty_is_fine() {
        assert!(KvPair::from_flat::<&str>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_tagged_key_round_trips() {
        let tagged = tagged_key("nB", "user:1000");
        assert_eq!(tagged, "{nB}:user:1000");
        assert_eq!(strip_slot_tag(&tagged), "user:1000");
    }

    #[test]
    fn test_strip_leaves_untagged_keys_alone() {
        assert_eq!(strip_slot_tag("user:1000"), "user:1000");
        assert_eq!(strip_slot_tag("{}:x"), "{}:x");
        assert_eq!(strip_slot_tag("{tag}no-colon"), "{tag}no-colon");
        assert_eq!(strip_slot_tag("{unclosed"), "{unclosed");
    }

    #[test]
    fn test_strip_only_first_prefix() {
        assert_eq!(strip_slot_tag("{a}:{b}:k"), "{b}:k");
    }

    #[test]
    fn test_strip_slot_tags_bulk() {
        let keys = vec!["{nA}:x".to_string(), "y".to_string()];
        assert_eq!(strip_slot_tags(&keys), vec!["x", "y"]);
    }
}
