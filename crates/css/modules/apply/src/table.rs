//! Mixin property table.

use core::mem;
use indexmap::{IndexMap, IndexSet};
use rustc_hash::{FxBuildHasher, FxHashMap};

/// What is known about one mixin.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MixinEntry {
    /// Sub-property name to declared value, in declaration order.
    pub properties: IndexMap<String, String>,
    /// Scopes that applied this mixin.
    pub dependents: IndexSet<String, FxBuildHasher>,
}

/// Mixin name (`--name`) to [`MixinEntry`].
#[derive(Clone, Debug, Default)]
pub struct MixinTable {
    entries: FxHashMap<String, MixinEntry>,
}

impl MixinTable {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&MixinEntry> {
        self.entries.get(name.trim())
    }

    #[inline]
    pub fn get_mut(&mut self, name: &str) -> Option<&mut MixinEntry> {
        self.entries.get_mut(name.trim())
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name.trim())
    }

    /// The entry for `name`, registering an empty one if it is unknown.
    #[inline]
    pub fn get_or_register(&mut self, name: &str) -> &mut MixinEntry {
        self.entries.entry(name.trim().to_owned()).or_default()
    }

    /// Replace the properties of `name`, keeping its dependents.
    ///
    /// Returns the previous properties, if the mixin was known.
    pub fn replace_properties(
        &mut self,
        name: &str,
        properties: IndexMap<String, String>,
    ) -> Option<IndexMap<String, String>> {
        let trimmed = name.trim();
        if let Some(entry) = self.entries.get_mut(trimmed) {
            return Some(mem::replace(&mut entry.properties, properties));
        }
        self.entries.insert(
            trimmed.to_owned(),
            MixinEntry {
                properties,
                dependents: IndexSet::default(),
            },
        );
        None
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered mixin names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_register_empty_entries() {
        let mut table = MixinTable::new();
        assert!(table.get("--m").is_none());
        table.get_or_register(" --m ").dependents.insert("x-foo".to_owned());
        let entry = table.get("--m");
        assert!(entry.is_some_and(|found| found.properties.is_empty()));
        assert!(entry.is_some_and(|found| found.dependents.contains("x-foo")));
    }

    #[test]
    fn replacing_keeps_dependents() {
        let mut table = MixinTable::new();
        let mut first = IndexMap::new();
        first.insert("color".to_owned(), "red".to_owned());
        assert!(table.replace_properties("--m", first.clone()).is_none());
        table.get_or_register("--m").dependents.insert("x-a".to_owned());
        let previous = table.replace_properties("--m", IndexMap::new());
        assert_eq!(previous, Some(first));
        assert_eq!(table.get("--m").map(|entry| entry.dependents.len()), Some(1));
        assert_eq!(table.names(), vec!["--m"]);
    }
}
