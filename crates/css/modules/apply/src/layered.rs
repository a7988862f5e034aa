//! Two-level map lookup.

use indexmap::IndexMap;

/// A read-only view that answers from `top` first and falls back to `base`.
#[derive(Clone, Copy, Debug)]
pub struct LayeredMap<'map> {
    top: &'map IndexMap<String, String>,
    base: Option<&'map IndexMap<String, String>>,
}

impl<'map> LayeredMap<'map> {
    #[inline]
    pub const fn new(
        top: &'map IndexMap<String, String>,
        base: Option<&'map IndexMap<String, String>>,
    ) -> Self {
        Self { top, base }
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&'map str> {
        self.top
            .get(key)
            .or_else(|| self.base.and_then(|base| base.get(key)))
            .map(String::as_str)
    }

    /// First hit for any of `keys`, searching the whole top layer before the base.
    pub fn lookup(&self, keys: &[&str]) -> Option<&'map str> {
        let layers = [Some(self.top), self.base];
        layers.into_iter().flatten().find_map(|layer| {
            keys.iter()
                .find_map(|key| layer.get(*key))
                .map(String::as_str)
        })
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Keys of the top layer in order, then base-only keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &'map str> + '_ {
        let top = self.top;
        let base_only = self
            .base
            .into_iter()
            .flat_map(IndexMap::keys)
            .filter(move |key| !top.contains_key(key.as_str()));
        top.keys().chain(base_only).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn top_layer_wins() {
        let top = map(&[("color", "blue")]);
        let base = map(&[("color", "red"), ("size", "2px")]);
        let layered = LayeredMap::new(&top, Some(&base));
        assert_eq!(layered.get("color"), Some("blue"));
        assert_eq!(layered.get("size"), Some("2px"));
        assert!(!layered.contains_key("margin"));
        assert_eq!(layered.keys().collect::<Vec<_>>(), vec!["color", "size"]);
    }

    #[test]
    fn lookup_prefers_any_key_in_the_top_layer() {
        let top = map(&[("--m_-_color", "blue")]);
        let base = map(&[("color", "red")]);
        let layered = LayeredMap::new(&top, Some(&base));
        assert_eq!(layered.lookup(&["color", "--m_-_color"]), Some("blue"));
        assert_eq!(LayeredMap::new(&base, None).lookup(&["x"]), None);
    }
}
