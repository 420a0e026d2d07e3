mod initialize;
pub use initialize::Initializer;

mod config;
pub use config::Config;

pub use crate::server::frontend::Config as ServerConfig;
