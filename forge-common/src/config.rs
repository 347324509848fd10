//! Root folder resolution and workspace path layout
//!
//! The root folder holds the SQLite database and the artifact storage
//! tree. Resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming the root folder
pub const ROOT_ENV_VAR: &str = "FORGE_ROOT_FOLDER";

/// Resolve the root data folder.
pub fn resolve_root_folder(cli_arg: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = find_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Locate the platform config file (`<config dir>/forge/config.toml`)
pub fn find_config_file() -> Result<PathBuf> {
    let path = dirs::config_dir()
        .map(|d| d.join("forge").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("forge"))
        .unwrap_or_else(|| PathBuf::from("./forge_data"))
}

/// Create the root folder if missing and return canonical paths under it.
pub fn ensure_root_folder(root: &Path) -> Result<()> {
    std::fs::create_dir_all(root)?;
    Ok(())
}

/// Database file path under the root folder
pub fn database_path(root: &Path) -> PathBuf {
    root.join("forge.db")
}

/// Artifact storage tree under the root folder
pub fn storage_root(root: &Path) -> PathBuf {
    root.join("storage")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_argument_wins() {
        let root = resolve_root_folder(Some("/tmp/forge-cli-root"));
        assert_eq!(root, PathBuf::from("/tmp/forge-cli-root"));
    }

    #[test]
    fn derived_paths_live_under_root() {
        let root = PathBuf::from("/tmp/forge-root");
        assert_eq!(database_path(&root), root.join("forge.db"));
        assert_eq!(storage_root(&root), root.join("storage"));
    }
}
