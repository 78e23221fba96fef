pub mod app;
pub mod attendance;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod roster;
pub mod state;
pub mod stats;
pub mod store;
pub mod ui;

pub use app::router;
pub use config::AppConfig;
pub use state::AppState;
pub use stats::{TimePolicy, aggregate};
