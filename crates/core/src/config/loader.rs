use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Read the TOML configuration at `path`. Individual keys can be
/// overridden through `DEBRIX_`-prefixed environment variables.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("DEBRIX_").split("_"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Parse a configuration straight from TOML text.
pub fn load_config_from_str(raw: &str) -> Result<Config, ConfigError> {
    toml::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))
}
