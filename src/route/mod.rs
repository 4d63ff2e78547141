//! URL to page-kind classification.
//!
//! Pure and total: every input, including malformed URLs, maps to a
//! [`PageKind`]. Rules in priority order:
//!
//! 1. host differs from the target host -> `Unknown`
//! 2. path is `/{segment}/expensebill[/...]` with a non-empty segment -> `ExpenseBill`
//! 3. path is exactly `/me/models` (optional trailing slash) -> `ModelCatalog`
//! 4. otherwise -> `Unknown`

use crate::model::PageKind;
use url::Url;

/// Host the engine is built for.
pub const DEFAULT_TARGET_HOST: &str = "cloud.siliconflow.cn";

const EXPENSE_BILL_SEGMENT: &str = "expensebill";

/// Classifies URLs against one target host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteClassifier {
    target_host: String,
}

impl Default for RouteClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_HOST)
    }
}

impl RouteClassifier {
    /// Create a classifier for `target_host` (compared case-insensitively).
    pub fn new(target_host: impl Into<String>) -> Self {
        Self {
            target_host: target_host.into().trim().to_ascii_lowercase(),
        }
    }

    /// The host this classifier accepts.
    pub fn target_host(&self) -> &str {
        &self.target_host
    }

    /// Whether `url` parses and points at the target host.
    pub fn is_target_host(&self, url: &str) -> bool {
        Url::parse(url)
            .ok()
            .is_some_and(|parsed| self.matches_host(&parsed))
    }

    /// Classify `url`.
    pub fn classify(&self, url: &str) -> PageKind {
        let Ok(parsed) = Url::parse(url) else {
            return PageKind::Unknown;
        };
        if !self.matches_host(&parsed) {
            return PageKind::Unknown;
        }
        classify_path(parsed.path())
    }

    fn matches_host(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.target_host))
    }
}

/// Classify with the default target host.
pub fn classify(url: &str) -> PageKind {
    RouteClassifier::default().classify(url)
}

fn classify_path(path: &str) -> PageKind {
    let Some(rest) = path.strip_prefix('/') else {
        return PageKind::Unknown;
    };
    let mut segments = rest.split('/');
    let first = segments.next().unwrap_or_default();
    let second = segments.next();

    if !first.is_empty() && second == Some(EXPENSE_BILL_SEGMENT) {
        return PageKind::ExpenseBill;
    }

    if rest == "me/models" || rest == "me/models/" {
        return PageKind::ModelCatalog;
    }

    PageKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "https://cloud.siliconflow.cn";

    fn url(path: &str) -> String {
        format!("{HOST}{path}")
    }

    #[test]
    fn expense_bill_matches_any_first_segment() {
        assert_eq!(classify(&url("/me/expensebill")), PageKind::ExpenseBill);
        assert_eq!(classify(&url("/abc123/expensebill")), PageKind::ExpenseBill);
        assert_eq!(
            classify(&url("/abc123/expensebill/detail?month=3")),
            PageKind::ExpenseBill
        );
    }

    #[test]
    fn expense_bill_requires_exact_segment() {
        assert_eq!(classify(&url("/me/expensebills")), PageKind::Unknown);
        assert_eq!(classify(&url("//expensebill")), PageKind::Unknown);
        assert_eq!(classify(&url("/expensebill")), PageKind::Unknown);
    }

    #[test]
    fn model_catalog_is_exact_with_optional_trailing_slash() {
        assert_eq!(classify(&url("/me/models")), PageKind::ModelCatalog);
        assert_eq!(classify(&url("/me/models/")), PageKind::ModelCatalog);
        assert_eq!(classify(&url("/me/models?tab=chat")), PageKind::ModelCatalog);
        assert_eq!(classify(&url("/me/models/extra")), PageKind::Unknown);
        assert_eq!(classify(&url("/you/models")), PageKind::Unknown);
    }

    #[test]
    fn hash_does_not_affect_classification() {
        assert_eq!(classify(&url("/me/models#top")), PageKind::ModelCatalog);
    }

    #[test]
    fn foreign_host_is_unknown_regardless_of_path() {
        assert_eq!(
            classify("https://example.com/me/models"),
            PageKind::Unknown
        );
        assert_eq!(
            classify("https://cloud.siliconflow.cn.evil.test/me/expensebill"),
            PageKind::Unknown
        );
    }

    #[test]
    fn malformed_input_is_unknown() {
        assert_eq!(classify(""), PageKind::Unknown);
        assert_eq!(classify("not a url"), PageKind::Unknown);
        assert_eq!(classify("/me/models"), PageKind::Unknown);
        assert_eq!(classify("http://[::1"), PageKind::Unknown);
    }

    #[test]
    fn host_comparison_ignores_case() {
        let classifier = RouteClassifier::new("Cloud.SiliconFlow.CN");
        assert_eq!(
            classifier.classify("https://CLOUD.siliconflow.cn/me/models"),
            PageKind::ModelCatalog
        );
        assert!(classifier.is_target_host("https://cloud.siliconflow.cn/"));
        assert!(!classifier.is_target_host("garbage"));
    }

    #[test]
    fn custom_host_classifier() {
        let classifier = RouteClassifier::new("console.test");
        assert_eq!(
            classifier.classify("https://console.test/x/expensebill"),
            PageKind::ExpenseBill
        );
        assert_eq!(classifier.classify(&url("/me/models")), PageKind::Unknown);
    }
}
