pub mod assessment;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod needs;
pub mod services;
