/// Config file loading and creation for duelrank CLI.
///
/// Config lives at $XDG_CONFIG_HOME/duelrank/config.toml (~/.config/duelrank by default).
/// All fields are optional; CLI args override config values.
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::bail;

#[derive(Debug, Deserialize, Default)]
pub struct DuelrankConfig {
    pub catalog: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub k_factor: Option<f64>,
    pub debounce_ms: Option<u64>,
}

const DEFAULT_CONFIG_TEMPLATE: &str = "\
# duelrank configuration
# All values here can be overridden by CLI flags.

# Item catalog: a local JSON file or an http(s) URL.
# Expected shape: [{\"id\": 1, \"name\": \"RX-78-2 Gundam\", \"series\": \"Mobile Suit Gundam\"}, ...]
# catalog = \"/path/to/MobileWeapons.json\"

# Where ratings are stored (default: $XDG_DATA_HOME/duelrank or ~/.local/share/duelrank)
# data_dir = \"/path/to/data\"

# Elo K-factor: maximum rating swing per vote
# k_factor = 24

# Milliseconds to coalesce saves during rapid voting
# debounce_ms = 120
";

/// `<xdg>/duelrank` when the XDG variable is set and non-empty, otherwise
/// `<home>/<home_rel>/duelrank`, otherwise `<home_rel>/duelrank` relative to cwd.
fn xdg_dir(xdg: Option<OsString>, home: Option<PathBuf>, home_rel: &str) -> PathBuf {
    let base = match (xdg, home) {
        (Some(xdg), _) if !xdg.is_empty() => PathBuf::from(xdg),
        (_, Some(home)) => home.join(home_rel),
        _ => PathBuf::from(home_rel),
    };
    base.join("duelrank")
}

/// Returns the default config path: $XDG_CONFIG_HOME/duelrank/config.toml or ~/.config/duelrank/config.toml
pub fn config_path() -> PathBuf {
    xdg_dir(std::env::var_os("XDG_CONFIG_HOME"), dirs::home_dir(), ".config").join("config.toml")
}

/// Returns the default data directory: $XDG_DATA_HOME/duelrank or ~/.local/share/duelrank
pub fn default_data_dir() -> PathBuf {
    xdg_dir(std::env::var_os("XDG_DATA_HOME"), dirs::home_dir(), ".local/share")
}

/// Parse config text. Unknown keys are ignored.
pub fn parse_config(content: &str) -> Result<DuelrankConfig, toml::de::Error> {
    toml::from_str(content)
}

/// Load config from a file path. Returns default (all None) if file doesn't exist.
pub fn load_config(path: &Path) -> DuelrankConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content)
            .unwrap_or_else(|e| bail(format!("Failed to parse config at {}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => DuelrankConfig::default(),
        Err(e) => bail(format!("Failed to read config at {}: {e}", path.display())),
    }
}

/// Create the default config file. Errors if it already exists.
pub fn create_default_config() -> PathBuf {
    let path = config_path();

    if path.exists() {
        bail(format!("Config file already exists at {}", path.display()));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .unwrap_or_else(|e| bail(format!("Failed to create directory {}: {e}", parent.display())));
    }

    std::fs::write(&path, DEFAULT_CONFIG_TEMPLATE)
        .unwrap_or_else(|e| bail(format!("Failed to write config to {}: {e}", path.display())));

    path
}
