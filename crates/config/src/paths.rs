//! Locations of wtf's files

use std::path::PathBuf;

/// wtf's home directory (~/.wtf)
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".wtf"))
        .unwrap_or_else(|| PathBuf::from(".wtf"))
}

/// The JSON config file
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}
