//! Platform-specific locations for client state

use std::io;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "cipherkeep";

/// Get the platform-specific data directory for mirrors and token files
///
/// Returns:
/// - Windows: %LOCALAPPDATA%\cipherkeep
/// - macOS: ~/Library/Application Support/cipherkeep
/// - Linux/Other: ~/.local/share/cipherkeep
pub fn get_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".data")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_DIR)
}

/// Get the platform-specific config directory holding `client.toml`
pub fn get_config_dir() -> PathBuf {
    let base = dirs::config_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_DIR)
}

/// Ensure the default data directory exists with owner-only permissions
pub fn ensure_data_dir() -> io::Result<PathBuf> {
    let dir = get_data_dir();
    ensure_private_dir(&dir)?;
    Ok(dir)
}

/// Create `dir` if needed and restrict it to the current user (0700 on unix)
pub fn ensure_private_dir(dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    restrict_permissions(dir, 0o700)
}

/// Restrict a file to owner read/write (0600 on unix)
pub fn restrict_file(path: &Path) -> io::Result<()> {
    restrict_permissions(path, 0o600)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
