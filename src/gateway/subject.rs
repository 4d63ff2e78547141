//! Subject identifier resolution for the `x-subject-id` request header.

use crate::host::store::SUBJECT_ID_KEY;
use crate::host::{HostPage, KeyValueStore};
use regex::Regex;
use std::rc::Rc;
use std::sync::LazyLock;
use url::Url;

/// First path segment followed by another `/`.
static PATH_SUBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/([^/]+)/").expect("static regex"));

/// `subjectId: "abc123"` and its quoting variants inside script text.
static SCRIPT_SUBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"subjectId['":\s]+['"]([a-zA-Z0-9]+)['"]"#).expect("static regex")
});

/// Path segments that are routes, never subject ids.
const RESERVED_SEGMENTS: [&str; 2] = ["me", "models"];

/// Where a subject id was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectSource {
    /// Page global.
    Global,
    /// First URL path segment.
    Path,
    /// Persisted local value.
    Store,
    /// Inline script text.
    Script,
}

/// Resolves the current subject id from the page, tried in a fixed order.
///
/// Resolution runs on every request; the answer can change as the user
/// switches between subjects inside the app.
#[derive(Clone)]
pub struct SubjectResolver {
    page: Rc<dyn HostPage>,
    store: Rc<dyn KeyValueStore>,
}

impl std::fmt::Debug for SubjectResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubjectResolver").finish_non_exhaustive()
    }
}

impl SubjectResolver {
    /// Resolver reading from `page` and `store`.
    pub fn new(page: Rc<dyn HostPage>, store: Rc<dyn KeyValueStore>) -> Self {
        Self { page, store }
    }

    /// Subject id, or `None` when no source yields one.
    pub fn resolve(&self) -> Option<String> {
        self.resolve_with_source().map(|(id, _)| id)
    }

    /// Subject id together with the source that produced it.
    pub fn resolve_with_source(&self) -> Option<(String, SubjectSource)> {
        if let Some(id) = self.page.subject_global().filter(|id| !id.is_empty()) {
            return Some((id, SubjectSource::Global));
        }
        if let Some(id) = subject_from_url(&self.page.href()) {
            return Some((id, SubjectSource::Path));
        }
        if let Some(id) = self.store.get(SUBJECT_ID_KEY).filter(|id| !id.is_empty()) {
            return Some((id, SubjectSource::Store));
        }
        self.page
            .inline_scripts()
            .iter()
            .find_map(|script| subject_from_script(script))
            .map(|id| (id, SubjectSource::Script))
    }
}

fn subject_from_url(href: &str) -> Option<String> {
    let url = Url::parse(href).ok()?;
    let segment = PATH_SUBJECT_RE.captures(url.path())?.get(1)?.as_str();
    if RESERVED_SEGMENTS.contains(&segment) {
        return None;
    }
    Some(segment.to_string())
}

fn subject_from_script(script: &str) -> Option<String> {
    SCRIPT_SUBJECT_RE
        .captures(script)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
