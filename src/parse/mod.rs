mod cli;
mod config;

pub use cli::Cli;
pub use config::{parser, SupervisorConfig};
