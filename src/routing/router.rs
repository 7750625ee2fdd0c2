//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up matching route for a request path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Exact routes win over prefixes; among prefixes the longest wins
//! - Explicit `None` rather than a silent default

use crate::config::{RouteConfig, Upstream};
use crate::routing::matcher::{self, Matcher};

/// A compiled proxy route.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    pub upstream: Upstream,
    matcher: Box<dyn Matcher>,
    exact: bool,
}

impl Route {
    fn compile(config: &RouteConfig) -> Self {
        Self {
            name: config.name.clone(),
            upstream: config.upstream,
            matcher: matcher::compile(&config.path, config.path_match),
            exact: config.path_match == crate::config::PathMatch::Exact,
        }
    }
}

/// Immutable route table.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn from_config(routes: &[RouteConfig]) -> Self {
        Self {
            routes: routes.iter().map(Route::compile).collect(),
        }
    }

    /// Find the route for `path`.
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .filter(|route| route.matcher.matches(path))
            .max_by_key(|route| (route.exact, route.matcher.specificity()))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
