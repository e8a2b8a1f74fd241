use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

/// Metadata label for the region a task descends from
pub const STATE: &str = "state";

/// Metadata label for the area a task descends from
pub const CITY: &str = "city";

/// Labels accumulated while descending the hierarchy
///
/// Immutable: [`Metadata::with`] returns a new value and leaves the original
/// untouched, so tasks in flight never share mutable state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata(Arc<BTreeMap<String, String>>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy extended with `label = value`
    ///
    /// # Example
    ///
    /// ```
    /// use nestcrawl::pipeline::Metadata;
    ///
    /// let root = Metadata::new();
    /// let state = root.with("state", "California");
    /// assert_eq!(state.get("state"), Some("California"));
    /// assert_eq!(root.get("state"), None);
    /// ```
    pub fn with(&self, label: impl Into<String>, value: impl Into<String>) -> Self {
        let mut map = BTreeMap::clone(&self.0);
        map.insert(label.into(), value.into());
        Metadata(Arc::new(map))
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.0.get(label).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One unit of work flowing through a stage queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTask {
    /// Display text of the link that led here
    pub name: String,

    /// Page to load
    pub url: Url,

    /// Labels inherited from the parent tasks
    pub meta: Metadata,
}

impl PageTask {
    pub fn new(name: impl Into<String>, url: Url, meta: Metadata) -> Self {
        Self {
            name: name.into(),
            url,
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_does_not_touch_original() {
        let state = Metadata::new().with(STATE, "California");
        let oakland = state.with(CITY, "Oakland");
        let berkeley = state.with(CITY, "Berkeley");

        assert_eq!(state.get(CITY), None);
        assert_eq!(oakland.get(CITY), Some("Oakland"));
        assert_eq!(berkeley.get(CITY), Some("Berkeley"));
        assert_eq!(oakland.get(STATE), Some("California"));
        assert_eq!(oakland.len(), 2);
    }

    #[test]
    fn test_with_overrides_label() {
        let meta = Metadata::new().with(STATE, "Nevada").with(STATE, "Oregon");
        assert_eq!(meta.get(STATE), Some("Oregon"));
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn test_iter_is_sorted() {
        let meta = Metadata::new().with(STATE, "Texas").with(CITY, "Austin");
        let pairs: Vec<_> = meta.iter().collect();
        assert_eq!(pairs, vec![(CITY, "Austin"), (STATE, "Texas")]);
    }
}
