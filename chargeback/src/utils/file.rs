//! File utility functions

use std::path::{Path, PathBuf};

/// Expand `~` and make relative paths absolute against the current directory.
///
/// ```text
/// expand_path("~/.chargeback")  // -> /home/user/.chargeback
/// expand_path("reports")        // -> /current/dir/reports
/// expand_path("/etc/hr.csv")    // -> /etc/hr.csv
/// ```
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();

    if path.is_empty() {
        return std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    }

    let expanded = if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path))
    } else {
        PathBuf::from(path)
    };

    if expanded.is_relative() {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    } else {
        expanded
    }
}

/// Read a small text file (e.g. a token file) and trim surrounding whitespace
pub fn read_trimmed(path: &Path) -> std::io::Result<String> {
    Ok(std::fs::read_to_string(path)?.trim().to_string())
}
