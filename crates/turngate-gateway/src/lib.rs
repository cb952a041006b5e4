pub mod config;
pub mod context;
pub mod errors;
pub mod http;
pub mod moderation;
pub mod throttle;
pub mod turns;

pub use config::GatewayConfig;
pub use http::{build_router, AppState};
