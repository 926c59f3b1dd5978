pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod relay;
pub mod server;
pub mod state;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use relay::{ConnectionRegistry, RelaySession};
pub use state::AppState;
