//! Collection types shared by the pdesk crates.
//!
//! Session tables are small and keyed by short ids, so FxHash is used
//! everywhere. `IndexMap`/`IndexSet` keep tab order stable.

pub use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
pub use std::collections::*;

/// Insertion-ordered hash map with FxHash.
pub type IndexMap<K, V> = indexmap::IndexMap<K, V, FxBuildHasher>;

/// Insertion-ordered hash set with FxHash.
pub type IndexSet<T> = indexmap::IndexSet<T, FxBuildHasher>;

/// Empty `IndexMap` using the Fx hasher (`IndexMap::new` needs the default hasher).
pub fn index_map<K, V>() -> IndexMap<K, V> {
    IndexMap::with_hasher(FxBuildHasher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_map_keeps_insertion_order() {
        let mut map = index_map();
        map.insert("exec", 3);
        map.insert("main", 1);
        map.insert("doctor", 2);
        let keys: Vec<_> = map.keys().copied().collect();
        assert_eq!(keys, vec!["exec", "main", "doctor"]);
    }
}
