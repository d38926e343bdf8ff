#![forbid(unsafe_code)]

/// Message headers kept as a dense list; header counts are small and order is preserved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    entries: Vec<(String, String)>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Adds the entry or replaces the value of an existing one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Adds the entry only when the key is absent.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if self.get(&key).is_none() {
            self.entries.push((key, value.into()));
        }
    }

    /// Removes every entry with this key.
    pub fn del(&mut self, key: &str) {
        self.entries.retain(|(name, _)| name != key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Header
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut header = Header::new();
        for (key, value) in iter {
            header.set(key, value);
        }
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_and_add_keeps_existing() {
        let mut header = Header::new();
        header.set("tenant", "acme");
        header.add("tenant", "other");
        assert_eq!(header.get("tenant"), Some("acme"));

        header.set("tenant", "globex");
        assert_eq!(header.get("tenant"), Some("globex"));
        assert_eq!(header.len(), 1);
    }

    #[test]
    fn del_removes_every_match_and_keeps_order() {
        let mut header: Header = [("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
        header.del("b");
        header.del("missing");

        let entries: Vec<(&str, &str)> = header.iter().collect();
        assert_eq!(entries, vec![("a", "1"), ("c", "3")]);
        assert!(!header.is_empty());
    }
}
