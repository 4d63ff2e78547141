//! Support index: which voucher packages cover which models.
//!
//! The index is rebuilt wholesale from every successful package fetch and
//! never patched in place. Callers swap the new index in behind an `Rc`, so a
//! reader holding the previous one never sees a half-built map.

pub mod extract;

pub use extract::{extract_model_names, LanguagePrefs};

use crate::model::PackageDefinition;
use std::collections::BTreeMap;

#[cfg(test)]
#[path = "support_tests.rs"]
mod tests;

/// Model name to ordered, deduplicated package ids.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SupportIndex {
    models: BTreeMap<String, Vec<i64>>,
    skipped_packages: usize,
}

impl SupportIndex {
    /// Number of indexed model names.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no model is indexed.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Packages left out of the build (no numeric id).
    pub fn skipped_packages(&self) -> usize {
        self.skipped_packages
    }

    /// Package ids for exactly `model_name`.
    pub fn get(&self, model_name: &str) -> Option<&[i64]> {
        self.models.get(model_name).map(Vec::as_slice)
    }

    /// Package ids for `model_name`: exact match, else case-insensitive exact
    /// match. Never a substring match.
    pub fn lookup(&self, model_name: &str) -> Option<&[i64]> {
        if let Some(ids) = self.get(model_name) {
            return Some(ids);
        }
        let wanted = model_name.to_lowercase();
        self.models
            .iter()
            .find(|(key, _)| key.to_lowercase() == wanted)
            .map(|(_, ids)| ids.as_slice())
    }

    /// Indexed names in sorted order.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    fn insert(&mut self, model_name: String, package_id: i64) {
        let ids = self.models.entry(model_name).or_default();
        if !ids.contains(&package_id) {
            ids.push(package_id);
        }
    }
}

/// Build a fresh index from `packages` with the default language preference.
pub fn build_index(packages: &[PackageDefinition]) -> SupportIndex {
    build_index_with(packages, &LanguagePrefs::default())
}

/// Build a fresh index from `packages`.
///
/// Packages without a numeric id are skipped and counted; a package without a
/// description contributes nothing. Neither aborts the build.
pub fn build_index_with(packages: &[PackageDefinition], prefs: &LanguagePrefs) -> SupportIndex {
    let mut index = SupportIndex::default();
    for package in packages {
        let Some(id) = package.id else {
            tracing::debug!("Skipping package without id");
            index.skipped_packages += 1;
            continue;
        };
        let Some(description) = package.description.as_deref() else {
            tracing::debug!(package_id = id, "Package has no description");
            continue;
        };
        for name in extract_model_names(description, prefs) {
            index.insert(name, id);
        }
    }
    tracing::info!(
        models = index.len(),
        packages = packages.len(),
        skipped = index.skipped_packages,
        "Built support index"
    );
    index
}

/// Whether `model_name` is covered by any package in `index`.
pub fn is_supported(model_name: &str, index: &SupportIndex) -> bool {
    index.lookup(model_name).is_some()
}
