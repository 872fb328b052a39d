/*
 * This module provides utility functions for path manipulation: deriving the
 * short name and parent folder of a path the way the browser displays them, and
 * retrieving the application's local configuration directory.
 *
 * Short names and parents are derived from the path text split into segments
 * on the host's separators: `/` everywhere, plus `\` on Windows. On Unix a
 * backslash is an ordinary file name character.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf, is_separator};

fn trim_trailing_separators(text: &str) -> &str {
    text.trim_end_matches(is_separator)
}

/*
 * Returns the last segment of `path` after stripping trailing separators.
 * `/maps/b/` and `/maps/b` both yield `b`. A path made only of separators yields
 * an empty string.
 */
pub fn short_name(path: &Path) -> String {
    short_name_of_str(&path.to_string_lossy()).to_string()
}

fn short_name_of_str(text: &str) -> &str {
    let trimmed = trim_trailing_separators(text);
    trimmed.rsplit(is_separator).next().unwrap_or(trimmed)
}

/*
 * Returns the folder containing `path`: trailing separators are stripped, the
 * last segment is dropped and the remaining segments are kept as written,
 * including the separator that preceded the dropped segment. A path with a single
 * segment has an empty parent, meaning the current directory.
 *
 * Only the final segment is removed, so a folder whose name recurs earlier in
 * the path (`/maps/maps`) resolves to `/maps/`.
 */
pub fn parent_folder(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    let trimmed = trim_trailing_separators(&text);
    match trimmed.rfind(is_separator) {
        Some(idx) => PathBuf::from(&trimmed[..=idx]),
        None => PathBuf::new(),
    }
}

/*
 * Retrieves the application's primary local configuration directory.
 * This function determines the platform-specific path for local (non-roaming)
 * application configuration data. It ensures the directory exists, creating it
 * if necessary.
 *
 * Returns `None` if the directory could not be determined or created.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Attempting to get base app config local dir for '{app_name}'");
    ProjectDirs::from("", "", app_name).and_then(|proj_dirs| {
        let config_path = proj_dirs.config_local_dir();
        if !config_path.exists() {
            if let Err(e) = fs::create_dir_all(config_path) {
                log::error!(
                    "PathUtils: Failed to create base app config directory {config_path:?}: {e}"
                );
                return None;
            }
            log::debug!("PathUtils: Created base app config directory: {config_path:?}");
        }
        Some(config_path.to_path_buf())
    })
}
