use serde::Deserialize;

use crate::core;
use crate::server::frontend;

/// Whole process configuration, as read from the YAML config file.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: frontend::Config,
    #[serde(default)]
    pub guardian: core::Config,
}
