//! Logical page classification.

use serde::Serialize;
use std::fmt;

/// Classification of the current logical screen, derived from a URL's path.
///
/// Carries no mutable state; see [`crate::route::RouteClassifier`] for the
/// rules that produce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    /// Expense bill screen (`/{segment}/expensebill[/...]`), hosts the balance panel.
    ExpenseBill,
    /// Model catalog screen (`/me/models`), hosts the support badges.
    ModelCatalog,
    /// Anything else, including foreign hosts and malformed URLs.
    #[default]
    Unknown,
}

impl PageKind {
    /// Stable lowercase name used in logs and status output.
    pub fn as_str(self) -> &'static str {
        match self {
            PageKind::ExpenseBill => "expense_bill",
            PageKind::ModelCatalog => "model_catalog",
            PageKind::Unknown => "unknown",
        }
    }

    /// Whether a page handler does any work for this kind.
    pub fn has_handler(self) -> bool {
        !matches!(self, PageKind::Unknown)
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unknown() {
        assert_eq!(PageKind::default(), PageKind::Unknown);
    }

    #[test]
    fn display_matches_as_str() {
        for kind in [PageKind::ExpenseBill, PageKind::ModelCatalog, PageKind::Unknown] {
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }

    #[test]
    fn only_unknown_has_no_handler() {
        assert!(PageKind::ExpenseBill.has_handler());
        assert!(PageKind::ModelCatalog.has_handler());
        assert!(!PageKind::Unknown.has_handler());
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&PageKind::ModelCatalog).unwrap();
        assert_eq!(json, "\"model_catalog\"");
    }
}
