//! Utility functions for path manipulation.

use std::path::PathBuf;

/// Constructs a file system path by joining a directory path with a file name.
///
/// # Arguments
///
/// * `dir_path` - The base directory path
/// * `file_name` - The file name to append
///
/// # Examples
///
/// ```
/// # use calbot::utils::get_path;
/// let path = get_path("/var/lib/calbot", "identities.db");
/// assert_eq!(path.to_string_lossy(), "/var/lib/calbot/identities.db");
/// ```
pub fn get_path(dir_path: &str, file_name: &str) -> PathBuf {
    [dir_path, file_name].iter().collect()
}
