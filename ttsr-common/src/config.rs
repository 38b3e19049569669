//! Configuration file resolution and loading
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`TTSR_CONFIG` by default)
//! 3. User config directory (`~/.config/ttsr/config.toml` on Linux)
//! 4. System-wide `/etc/ttsr/config.toml` (Linux only)
//!
//! A missing file is not an error: callers get compiled defaults and a warning.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable consulted when no config path is passed explicitly
pub const CONFIG_ENV_VAR: &str = "TTSR_CONFIG";

/// Application directory name under the platform config directory
const APP_DIR: &str = "ttsr";

/// Config file name inside the application directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolve which configuration file to load
///
/// # Arguments
/// * `cli_arg` - Path given on the command line, if any
/// * `env_var_name` - Environment variable holding an override path
///
/// # Returns
/// The first candidate path in priority order. Explicit paths (CLI, env) are
/// returned even if they do not exist, so the caller can report them; the
/// implicit locations are only returned when the file is present.
pub fn resolve_config_file(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3/4: platform locations
    default_config_locations().into_iter().find(|p| p.exists())
}

/// Candidate config file locations for the current platform
fn default_config_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();

    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join(APP_DIR).join(CONFIG_FILE_NAME));
    }

    if cfg!(target_os = "linux") {
        locations.push(PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILE_NAME));
    }

    locations
}

/// Parse a TOML document into a configuration struct
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(toml::from_str(content)?)
}

/// Load a configuration struct from a TOML file
///
/// Missing fields take their `serde(default)` values.
///
/// # Errors
/// - `Error::Io` if the file cannot be read
/// - `Error::TomlParse` if the content is not valid TOML for `T`
pub fn load_toml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    parse_toml(&content)
}

/// Load configuration with graceful degradation
///
/// Resolves the config file (see module docs) and loads it. When no file is
/// found, returns `T::default()` and logs a warning instead of failing. An
/// explicitly requested file that is missing is an error.
pub fn load_or_default<T: DeserializeOwned + Default>(
    cli_arg: Option<&Path>,
    env_var_name: &str,
) -> Result<T> {
    let explicit = cli_arg.is_some() || std::env::var(env_var_name).is_ok();

    match resolve_config_file(cli_arg, env_var_name) {
        Some(path) if path.exists() => {
            info!("Loading configuration from {}", path.display());
            load_toml_file(&path)
        }
        Some(path) if explicit => Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        ))),
        _ => {
            warn!("No configuration file found, using compiled defaults");
            Ok(T::default())
        }
    }
}
