pub mod cli;
pub mod client;
pub mod config;
pub mod load_config;
pub mod table;

pub use cli::{run, Cli, Commands};
