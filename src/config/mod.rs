pub use dp_core::config::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Default config file locations, searched in order.
pub const DEFAULT_PATHS: &[&str] = &[
    "./digipack.toml",
    "~/.config/digipack/config.toml",
    "/etc/digipack/config.toml",
];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    for path_str in DEFAULT_PATHS {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Reject configurations no run could succeed with; everything else is
/// reported by [`Config::validate`] as a warning.
fn validate_config(config: &Config) -> Result<()> {
    if config.transfer.multipart_chunksize == 0 {
        anyhow::bail!("transfer.multipart_chunksize cannot be 0");
    }

    if let Some(ref endpoint) = config.notifications.endpoint {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            anyhow::bail!("notifications.endpoint must be an http(s) URL: {}", endpoint);
        }
    }

    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    Ok(())
}
