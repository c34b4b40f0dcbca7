pub mod config;
pub mod error;
pub mod exchange;
pub mod resolver;
pub mod route_settings;
pub mod settings;

pub use config::{HushConfig, LoggingConfig, RecordFormat, RouteLogConfig, ServerConfig};
pub use error::HushError;
pub use exchange::{BodyCapture, Direction, HeaderList, RequestContext, ResponseContext};
pub use resolver::{SettingsResolver, resolve};
pub use route_settings::RouteSettingsTable;
pub use settings::{
    BodyType, ExchangeOverride, ExchangeSettings, LogLevel, LogSettings, LogSettingsOverride,
    MaskSettings, MaskSettingsOverride,
};
