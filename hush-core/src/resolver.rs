use crate::config::{HushConfig, LoggingConfig, RouteLogConfig};
use crate::exchange::Direction;
use crate::route_settings::RouteSettingsTable;
use crate::settings::{ExchangeOverride, ExchangeSettings, LogSettings, LogSettingsOverride};
use tracing::debug;

/// Merge one side's settings: every field set in `over` wins, the rest come
/// from `defaults`. With neither supplied the side is disabled.
pub fn resolve(defaults: Option<&LogSettings>, over: Option<&LogSettingsOverride>) -> LogSettings {
    match (defaults, over) {
        (Some(d), Some(o)) => o.apply_to(d),
        (Some(d), None) => d.clone(),
        (None, Some(o)) => o.apply_to(&LogSettings::disabled()),
        (None, None) => LogSettings::disabled(),
    }
}

/// Produces the effective settings for each exchange.
///
/// Layers, highest first: the explicit override attached where the
/// middleware is mounted, the matching route entry, the global `logging`
/// section, and the built-in defaults.
pub struct SettingsResolver {
    global: ExchangeOverride,
    routes: RouteSettingsTable,
    request_defaults: LogSettings,
    response_defaults: LogSettings,
}

impl SettingsResolver {
    pub fn new(logging: &LoggingConfig, routes: &[RouteLogConfig]) -> Self {
        Self {
            global: logging.as_override(),
            routes: RouteSettingsTable::from_routes(routes),
            request_defaults: LogSettings::request_default(),
            response_defaults: LogSettings::response_default(),
        }
    }

    pub fn from_config(config: &HushConfig) -> Self {
        Self::new(&config.logging, &config.routes)
    }

    /// A resolver that logs nothing unless an explicit override turns a side on.
    pub fn disabled() -> Self {
        Self {
            global: ExchangeOverride::default(),
            routes: RouteSettingsTable::new(),
            request_defaults: LogSettings::disabled(),
            response_defaults: LogSettings::disabled(),
        }
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Resolve both sides for one exchange.
    pub fn resolve_exchange(
        &self,
        method: &str,
        path: &str,
        explicit: Option<&ExchangeOverride>,
    ) -> ExchangeSettings {
        let mut merged = self.global.clone();

        if let Some(route) = self.routes.match_route(method, path) {
            debug!(method = %method, path = %path, pattern = %route.pattern, "Applying route log settings");
            merged = route.settings.layered_over(&merged);
        }
        if let Some(explicit) = explicit {
            merged = explicit.layered_over(&merged);
        }

        if merged.enabled == Some(false) {
            return ExchangeSettings::disabled();
        }

        ExchangeSettings {
            enabled: true,
            request: resolve(
                Some(&self.request_defaults),
                Some(&merged.side(Direction::Request)),
            ),
            response: resolve(
                Some(&self.response_defaults),
                Some(&merged.side(Direction::Response)),
            ),
        }
    }
}

impl Default for SettingsResolver {
    fn default() -> Self {
        Self::new(&LoggingConfig::default(), &[])
    }
}
