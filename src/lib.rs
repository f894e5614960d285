pub mod config;
pub mod error;
pub mod html_parser;
pub mod network_client;
pub mod notifier;
pub mod renewal;
pub mod utils;

pub use config::{Args, Config};
pub use error::AppError;
pub use renewal::{run, RenewalOutcome, ServerStatus};
