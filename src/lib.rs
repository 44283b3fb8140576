pub mod db;
pub mod routes;
mod startup;
mod utils;

pub use db::*;
pub use routes::*;
pub use startup::{app, build_app_state, AppState};
pub use utils::{get_config_info, get_log_level, setup_logger, Cli, APP_NAME, DEFAULT_PORT};
