use serde::Deserialize;

use crate::error::Error;

/// Manifest group the tool cares about.
pub const TARGET_GROUP: &str = "GameData";
/// Resource suffix the tool cares about.
pub const BUNDLE_SUFFIX: &str = ".bundle";
/// Query wildcard that selects the whole catalog.
pub const QUERY_ALL: &str = "all";

/// One addressable asset row of the resource manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceEntry {
    pub group: String,
    pub resource_path: String,
}

/// Ordered bundle entries eligible for selection.
///
/// Order follows the manifest and is never re-sorted, so download order and
/// progress indices stay stable with respect to it.
#[derive(Debug, Clone, Default)]
pub struct ResourceCatalog {
    entries: Vec<ResourceEntry>,
}

/// What the operator asked for: everything, or named entries.
#[derive(Debug, Clone)]
pub enum Selection {
    All,
    Explicit(Vec<String>),
}

impl ResourceCatalog {
    /// Keep the entries in the target group whose path carries the bundle
    /// suffix, preserving manifest order.
    pub fn from_entries(all: Vec<ResourceEntry>) -> Self {
        let entries = all
            .into_iter()
            .filter(|entry| {
                entry.group == TARGET_GROUP && entry.resource_path.ends_with(BUNDLE_SUFFIX)
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[ResourceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive substring filter on `resource_path`. The literal
    /// query "all" (any case) bypasses filtering and returns the catalog
    /// unchanged. An empty result is not an error here; the selection step
    /// decides what an empty choice means.
    pub fn filter_by_query(&self, query: &str) -> ResourceCatalog {
        if query.eq_ignore_ascii_case(QUERY_ALL) {
            return self.clone();
        }
        let needle = query.to_lowercase();
        let entries = self
            .entries
            .iter()
            .filter(|entry| entry.resource_path.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        ResourceCatalog { entries }
    }

    /// Resolve a selection against this catalog, preserving catalog order.
    ///
    /// Explicit picks must name catalog entries; an unknown name is a
    /// user-input error rather than being silently dropped, and an empty
    /// resolved selection is a user-input error rather than a no-op.
    pub fn select(&self, selection: &Selection) -> Result<Vec<ResourceEntry>, Error> {
        let chosen: Vec<ResourceEntry> = match selection {
            Selection::All => self.entries.clone(),
            Selection::Explicit(picks) => {
                for pick in picks {
                    if !self.entries.iter().any(|e| e.resource_path == *pick) {
                        return Err(Error::UserInput(format!(
                            "no selectable bundle named {pick:?}"
                        )));
                    }
                }
                self.entries
                    .iter()
                    .filter(|entry| picks.iter().any(|p| p == &entry.resource_path))
                    .cloned()
                    .collect()
            }
        };
        if chosen.is_empty() {
            return Err(Error::UserInput("selection matched no bundles".into()));
        }
        Ok(chosen)
    }
}
