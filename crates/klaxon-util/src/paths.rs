//! Default paths for klaxon components
//!
//! Paths are user-writable by default:
//! - Socket: `$XDG_RUNTIME_DIR/klaxon/klaxond.sock` or `/tmp/klaxon-$USER/klaxond.sock`
//! - Config: `$XDG_CONFIG_HOME/klaxon/config.toml` or `~/.config/klaxon/config.toml`
//! - Data: `$XDG_DATA_HOME/klaxon` or `~/.local/share/klaxon`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const KLAXON_SOCKET_ENV: &str = "KLAXON_SOCKET";

/// Environment variable for overriding the data directory
pub const KLAXON_DATA_DIR_ENV: &str = "KLAXON_DATA_DIR";

/// Environment variable for overriding the config file
pub const KLAXON_CONFIG_ENV: &str = "KLAXON_CONFIG";

const SOCKET_FILENAME: &str = "klaxond.sock";
const CONFIG_FILENAME: &str = "config.toml";
const APP_DIR: &str = "klaxon";

fn home_subdir(parts: &[&str]) -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    let mut path = PathBuf::from(home);
    for part in parts {
        path.push(part);
    }
    Some(path.join(APP_DIR))
}

/// Get the default socket path.
///
/// Order of precedence:
/// 1. `$KLAXON_SOCKET`
/// 2. `$XDG_RUNTIME_DIR/klaxon/klaxond.sock`
/// 3. `/tmp/klaxon-$USER/klaxond.sock`
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(KLAXON_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Socket path ignoring `$KLAXON_SOCKET`, for config defaults.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$KLAXON_CONFIG`
/// 2. `$XDG_CONFIG_HOME/klaxon/config.toml`
/// 3. `~/.config/klaxon/config.toml`
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(KLAXON_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    home_subdir(&[".config"])
        .unwrap_or_else(|| PathBuf::from("/tmp").join(APP_DIR))
        .join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$KLAXON_DATA_DIR`
/// 2. `$XDG_DATA_HOME/klaxon`
/// 3. `~/.local/share/klaxon`
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(KLAXON_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Data directory ignoring `$KLAXON_DATA_DIR`, for config defaults.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    home_subdir(&[".local", "share"]).unwrap_or_else(|| PathBuf::from("/tmp").join(APP_DIR).join("data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_contains_klaxon() {
        let path = socket_path_without_env();
        assert!(path.to_string_lossy().contains("klaxon"));
        assert!(path.to_string_lossy().ends_with(".sock"));
    }

    #[test]
    fn data_dir_contains_klaxon() {
        let path = data_dir_without_env();
        assert!(path.to_string_lossy().contains("klaxon"));
    }

    #[test]
    fn config_path_is_a_toml_file() {
        let path = default_config_path();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
    }
}
