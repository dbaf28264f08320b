//! Object extension helper
//!
//! Shallow merge with the legacy deletion convention: a `None` mixin value
//! removes the key from the target instead of storing an absent marker.

use std::collections::HashMap;
use std::hash::Hash;

/// Merge `mixin` into `target`. `None` values delete the corresponding
/// target key; with `skip_existing` set, keys already present in the target
/// keep their current value.
pub fn extend<K, V>(
    target: &mut HashMap<K, V>,
    mixin: impl IntoIterator<Item = (K, Option<V>)>,
    skip_existing: bool,
) where
    K: Eq + Hash,
{
    for (key, value) in mixin {
        match value {
            None => {
                target.remove(&key);
            }
            Some(value) => {
                if !skip_existing || !target.contains_key(&key) {
                    target.insert(key, value);
                }
            }
        }
    }
}
