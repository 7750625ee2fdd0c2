//! Route matching logic.
//!
//! # Responsibilities
//! - Match exact request paths
//! - Match path prefixes (case-sensitive)
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Query strings are never part of the compared path
//! - No regex to guarantee O(n) matching

use crate::config::PathMatch;

/// Trait for matching request paths against a condition.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;

    /// Length of the matched pattern; longer patterns are more specific.
    fn specificity(&self) -> usize;
}

/// Matches one path exactly.
#[derive(Debug, Clone)]
pub struct ExactPathMatcher {
    path: String,
}

impl ExactPathMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Matcher for ExactPathMatcher {
    fn matches(&self, path: &str) -> bool {
        path == self.path
    }

    fn specificity(&self) -> usize {
        self.path.len()
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }

    fn specificity(&self) -> usize {
        self.prefix.len()
    }
}

/// Build the matcher a route config asks for.
pub fn compile(path: &str, kind: PathMatch) -> Box<dyn Matcher> {
    match kind {
        PathMatch::Exact => Box::new(ExactPathMatcher::new(path)),
        PathMatch::Prefix => Box::new(PathPrefixMatcher::new(path)),
    }
}
