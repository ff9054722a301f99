use std::collections::HashMap;

pub const DEFAULT_SIGNAL_COLOR: &str = "#2563eb";
pub const DEFAULT_SEARCH_LIMIT: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalInfo {
    pub name: String,
    pub color: String,
}

/// Signals from the latest successful distinct fetch, in store order.
#[derive(Debug, Clone, Default)]
pub struct SignalCatalog {
    signals: Vec<SignalInfo>,
    by_name: HashMap<String, usize>,
}

impl SignalCatalog {
    /// Swap in a fresh listing. Duplicates keep their first position.
    /// Returns the number of distinct signals kept.
    pub fn replace<I, S>(&mut self, names: I, color: &str) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signals.clear();
        self.by_name.clear();
        for name in names {
            let name = name.into();
            if self.by_name.contains_key(&name) {
                continue;
            }
            self.by_name.insert(name.clone(), self.signals.len());
            self.signals.push(SignalInfo {
                name,
                color: color.to_string(),
            });
        }
        self.signals.len()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&SignalInfo> {
        self.by_name.get(name).map(|&i| &self.signals[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignalInfo> {
        self.signals.iter()
    }

    /// Case-insensitive substring match, first `limit` hits in catalog order.
    /// An empty term lists everything up to `limit`.
    pub fn search(&self, term: &str, limit: usize) -> Vec<&SignalInfo> {
        let needle = term.trim().to_lowercase();
        self.signals
            .iter()
            .filter(|s| needle.is_empty() || s.name.to_lowercase().contains(&needle))
            .take(limit)
            .collect()
    }
}
