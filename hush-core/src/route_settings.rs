use crate::config::RouteLogConfig;
use crate::settings::ExchangeOverride;
use matchit::Router as MatchitRouter;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Radix-tree lookup from (method, path) to the settings configured for that route.
///
/// Method-specific entries are consulted first, then entries with no method
/// constraint. Built once at startup; lookups are lock-free.
pub struct RouteSettingsTable {
    method_routers: HashMap<String, MatchitRouter<usize>>,
    any_method_router: MatchitRouter<usize>,
    entries: Vec<(String, ExchangeOverride)>,
}

/// Result of a route lookup.
#[derive(Debug)]
pub struct RouteSettingsMatch<'a> {
    pub pattern: &'a str,
    pub settings: &'a ExchangeOverride,
}

impl RouteSettingsTable {
    pub fn new() -> Self {
        Self {
            method_routers: HashMap::new(),
            any_method_router: MatchitRouter::new(),
            entries: Vec::new(),
        }
    }

    /// Build from configuration. Entries that fail to insert (bad pattern,
    /// conflicting route) are skipped with a warning.
    pub fn from_routes(routes: &[RouteLogConfig]) -> Self {
        let mut table = Self::new();
        for route in routes {
            table.insert(route);
        }
        table
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, route: &RouteLogConfig) {
        let idx = self.entries.len();
        let mut inserted = false;

        if route.methods.is_empty() {
            match self.any_method_router.insert(route.path.as_str(), idx) {
                Ok(()) => inserted = true,
                Err(e) => {
                    warn!(path = %route.path, error = %e, "Failed to insert route settings into any-method router");
                }
            }
        } else {
            for method in &route.methods {
                let router = self
                    .method_routers
                    .entry(method.to_ascii_uppercase())
                    .or_insert_with(MatchitRouter::new);
                match router.insert(route.path.as_str(), idx) {
                    Ok(()) => inserted = true,
                    Err(e) => {
                        warn!(path = %route.path, method = %method, error = %e, "Failed to insert route settings");
                    }
                }
            }
        }

        if inserted {
            self.entries.push((route.path.clone(), route.as_override()));
        }
    }

    /// Find the settings for a request.
    pub fn match_route(&self, method: &str, path: &str) -> Option<RouteSettingsMatch<'_>> {
        if let Some(router) = self.method_routers.get(&method.to_ascii_uppercase()) {
            if let Ok(matched) = router.at(path) {
                debug!(method = %method, path = %path, "Route settings matched (method-specific)");
                return Some(self.entry(*matched.value));
            }
        }

        if let Ok(matched) = self.any_method_router.at(path) {
            debug!(method = %method, path = %path, "Route settings matched (any-method)");
            return Some(self.entry(*matched.value));
        }

        None
    }

    fn entry(&self, idx: usize) -> RouteSettingsMatch<'_> {
        let (pattern, settings) = &self.entries[idx];
        RouteSettingsMatch { pattern, settings }
    }
}

impl Default for RouteSettingsTable {
    fn default() -> Self {
        Self::new()
    }
}
