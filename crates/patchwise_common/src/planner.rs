//! Update planning
//!
//! Picks every catalog version newer than the installed one and orders them
//! oldest first, so each package is applied on top of its predecessor.

use crate::catalog::{Catalog, CatalogEntry};
use crate::version::Version;
use std::cmp::Ordering;

/// Versions to apply, ascending, plus the newest one found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    current: Version,
    latest: Version,
    entries: Vec<CatalogEntry>,
}

impl UpdatePlan {
    pub fn current_version(&self) -> &Version {
        &self.current
    }

    /// Newest pending version, or the baseline when nothing is pending
    pub fn latest_version(&self) -> &Version {
        &self.latest
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn versions(&self) -> Vec<Version> {
        self.entries.iter().map(|e| e.version.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn new_version_available(&self) -> bool {
        !self.entries.is_empty()
    }
}

fn compare_entries(a: &CatalogEntry, b: &CatalogEntry) -> Ordering {
    a.version.cmp(&b.version)
}

/// Build the plan for `catalog` against the installed `current` version
pub fn plan(catalog: &Catalog, current: &Version) -> UpdatePlan {
    let mut entries: Vec<CatalogEntry> = catalog
        .iter()
        .filter(|(version, _)| version.is_newer_than(current))
        .map(|(version, url)| CatalogEntry {
            version: version.clone(),
            download_url: url.clone(),
        })
        .collect();

    entries.sort_by(compare_entries);

    // Latest is the top of the plan, or the baseline when nothing is newer
    let latest = entries
        .last()
        .map(|entry| entry.version.clone())
        .unwrap_or_else(Version::baseline);

    UpdatePlan {
        current: current.clone(),
        latest,
        entries,
    }
}
