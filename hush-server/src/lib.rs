pub mod app;
pub mod capture;
pub mod middleware;

pub use app::build_app;
pub use middleware::{HushState, log_exchange};
