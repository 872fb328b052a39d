use super::models::EntryKind;
use super::path_utils;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/*
 * This module performs the user-requested mutations on the file tree: batch
 * copy of files and folders, single-file delete, and rename of files and
 * folders. It defines the errors specific to these operations, a trait
 * `FileTreeOperations` so callers can substitute the implementation in tests,
 * and the concrete `CoreFileTreeOperations`.
 *
 * Rename is a copy into the same parent followed by removal of the original.
 * It is never an atomic move, so a failure between the two halves leaves both
 * entries on disk; that case is reported as `DuplicateLeftBehind`.
 */

const MAP_FILE_SUFFIX: &str = ".map.gbx";
const REPLAY_FILE_SUFFIX: &str = ".replay.gbx";

/*
 * Whether a failure on one item of a batch copy should skip that item or abort
 * the whole batch.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Recoverable,
    Fatal,
}

#[derive(Debug)]
pub enum FileOperationsError {
    Io(io::Error),
    Walk(walkdir::Error),
    /// The copy half of a rename succeeded but the original could not be removed.
    DuplicateLeftBehind {
        original: PathBuf,
        duplicate: PathBuf,
        cause: io::Error,
    },
    InvalidName {
        name: String,
        reason: &'static str,
    },
    Unsupported(String),
    NameCountMismatch {
        sources: usize,
        names: usize,
    },
    DestinationInsideSource {
        source_dir: PathBuf,
        destination: PathBuf,
    },
}

impl FileOperationsError {
    pub fn class(&self) -> FailureClass {
        match self {
            FileOperationsError::Io(_) => FailureClass::Recoverable,
            FileOperationsError::Walk(e) if e.loop_ancestor().is_some() => FailureClass::Fatal,
            FileOperationsError::Walk(e) if e.io_error().is_some() => FailureClass::Recoverable,
            _ => FailureClass::Fatal,
        }
    }
}

impl From<io::Error> for FileOperationsError {
    fn from(err: io::Error) -> Self {
        FileOperationsError::Io(err)
    }
}

impl From<walkdir::Error> for FileOperationsError {
    fn from(err: walkdir::Error) -> Self {
        FileOperationsError::Walk(err)
    }
}

impl std::fmt::Display for FileOperationsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperationsError::Io(e) => write!(f, "I/O error: {e}"),
            FileOperationsError::Walk(e) => write!(f, "Directory traversal error: {e}"),
            FileOperationsError::DuplicateLeftBehind {
                original,
                duplicate,
                cause,
            } => write!(
                f,
                "Copied {original:?} to {duplicate:?} but could not remove the original ({cause}); both now exist and one must be removed manually"
            ),
            FileOperationsError::InvalidName { name, reason } => {
                write!(f, "Invalid name '{name}': {reason}")
            }
            FileOperationsError::Unsupported(what) => write!(f, "Unsupported operation: {what}"),
            FileOperationsError::NameCountMismatch { sources, names } => write!(
                f,
                "{names} new names were given for {sources} sources; the counts must match"
            ),
            FileOperationsError::DestinationInsideSource {
                source_dir,
                destination,
            } => write!(
                f,
                "Cannot copy {source_dir:?} into its own subtree {destination:?}"
            ),
        }
    }
}

impl std::error::Error for FileOperationsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileOperationsError::Io(e) => Some(e),
            FileOperationsError::Walk(e) => Some(e),
            FileOperationsError::DuplicateLeftBehind { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FileOperationsError>;

/*
 * Supplies the new name for a rename. Implementations show whatever prompt fits
 * the caller and return `None` (or an empty string) when the user cancels.
 * Implementations are expected to re-prompt on names rejected by
 * `validate_new_name` rather than returning them.
 */
pub trait RenamePrompt {
    fn prompt_new_name(&self, old_short_name: &str, kind: EntryKind) -> Option<String>;
}

/// Outcome of a batch copy. Sources skipped after a recoverable failure are listed in order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CopyReport {
    pub copied: usize,
    pub skipped: Vec<PathBuf>,
}

pub trait FileTreeOperations: Send + Sync {
    /*
     * Copies each source into `destination_folder`, under the positional name
     * from `new_names` or under its own short name. Directories are duplicated
     * recursively and existing files at the destination are overwritten.
     * Recoverable failures skip the item; fatal ones abort the batch.
     */
    fn copy_entries(
        &self,
        sources: &[PathBuf],
        destination_folder: &Path,
        new_names: Option<&[String]>,
    ) -> Result<CopyReport>;

    /// Deletes a single file. Directories are rejected as unsupported.
    fn delete_entry(&self, path: &Path) -> Result<()>;

    /// Returns the new short name, or `None` when the prompt was cancelled.
    fn rename_file(&self, path: &Path, prompt: &dyn RenamePrompt) -> Result<Option<String>>;

    /// Returns the new short name, or `None` when the prompt was cancelled.
    fn rename_folder(&self, path: &Path, prompt: &dyn RenamePrompt) -> Result<Option<String>>;
}

pub struct CoreFileTreeOperations {}

impl CoreFileTreeOperations {
    pub fn new() -> Self {
        CoreFileTreeOperations {}
    }

    fn rename_entry(
        &self,
        path: &Path,
        kind: EntryKind,
        prompt: &dyn RenamePrompt,
    ) -> Result<Option<String>> {
        let metadata = fs::metadata(path)?;
        let actual_kind = if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        if actual_kind != kind {
            return Err(FileOperationsError::Unsupported(format!(
                "{path:?} is a {actual_kind:?}, not a {kind:?}"
            )));
        }

        let old_name = path_utils::short_name(path);
        let parent = path_utils::parent_folder(path);

        let Some(new_name) = prompt
            .prompt_new_name(&old_name, kind)
            .filter(|name| !name.is_empty())
        else {
            log::debug!("FileTreeOperations: Rename of {path:?} cancelled.");
            return Ok(None);
        };
        if new_name == old_name {
            log::debug!("FileTreeOperations: Rename of {path:?} kept the same name.");
            return Ok(None);
        }
        validate_new_name(&new_name, kind)?;

        let target = parent.join(&new_name);
        if fs::symlink_metadata(&target).is_ok() {
            return Err(FileOperationsError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{target:?} already exists"),
            )));
        }

        copy_entry(path, &target)?;

        let removal = match kind {
            EntryKind::File => fs::remove_file(path),
            EntryKind::Directory => fs::remove_dir_all(path),
        };
        if let Err(cause) = removal {
            log::error!(
                "FileTreeOperations: Renamed copy {target:?} created but original {path:?} could not be removed: {cause}"
            );
            return Err(FileOperationsError::DuplicateLeftBehind {
                original: path.to_path_buf(),
                duplicate: target,
                cause,
            });
        }

        log::info!("FileTreeOperations: Renamed {path:?} to '{new_name}'.");
        Ok(Some(new_name))
    }
}

impl Default for CoreFileTreeOperations {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTreeOperations for CoreFileTreeOperations {
    fn copy_entries(
        &self,
        sources: &[PathBuf],
        destination_folder: &Path,
        new_names: Option<&[String]>,
    ) -> Result<CopyReport> {
        if let Some(names) = new_names
            && names.len() != sources.len()
        {
            return Err(FileOperationsError::NameCountMismatch {
                sources: sources.len(),
                names: names.len(),
            });
        }
        log::debug!(
            "FileTreeOperations: Copying {} entries into {destination_folder:?}",
            sources.len()
        );

        let mut report = CopyReport::default();
        for (i, source) in sources.iter().enumerate() {
            let name = match new_names {
                Some(names) => names[i].clone(),
                None => path_utils::short_name(source),
            };
            if name.is_empty() || name.contains(std::path::is_separator) {
                return Err(FileOperationsError::InvalidName {
                    name,
                    reason: "a copy target must be a single path segment",
                });
            }
            let target = destination_folder.join(&name);

            match copy_entry(source, &target) {
                Ok(()) => report.copied += 1,
                Err(e) if e.class() == FailureClass::Recoverable => {
                    log::warn!("FileTreeOperations: Skipping {source:?}: {e}");
                    report.skipped.push(source.clone());
                }
                Err(e) => {
                    log::error!("FileTreeOperations: Aborting batch copy at {source:?}: {e}");
                    return Err(e);
                }
            }
        }

        log::debug!(
            "FileTreeOperations: Batch copy finished, {} copied, {} skipped.",
            report.copied,
            report.skipped.len()
        );
        Ok(report)
    }

    fn delete_entry(&self, path: &Path) -> Result<()> {
        if path.is_dir() {
            return Err(FileOperationsError::Unsupported(format!(
                "{path:?} is a directory; only files can be deleted"
            )));
        }
        fs::remove_file(path)?;
        log::info!("FileTreeOperations: Deleted {path:?}.");
        Ok(())
    }

    fn rename_file(&self, path: &Path, prompt: &dyn RenamePrompt) -> Result<Option<String>> {
        self.rename_entry(path, EntryKind::File, prompt)
    }

    fn rename_folder(&self, path: &Path, prompt: &dyn RenamePrompt) -> Result<Option<String>> {
        self.rename_entry(path, EntryKind::Directory, prompt)
    }
}

/*
 * Checks a rename candidate. Files must keep a map or replay suffix (compared
 * without regard to ASCII case); any name must be a single non-blank segment.
 */
pub fn validate_new_name(candidate: &str, kind: EntryKind) -> Result<()> {
    let invalid = |reason| {
        Err(FileOperationsError::InvalidName {
            name: candidate.to_string(),
            reason,
        })
    };
    if candidate.trim().is_empty() {
        return invalid("name is empty");
    }
    if candidate.contains(['/', '\\']) || candidate == "." || candidate == ".." {
        return invalid("name must be a single path segment");
    }
    if kind == EntryKind::File {
        let lower = candidate.to_ascii_lowercase();
        if !lower.ends_with(MAP_FILE_SUFFIX) && !lower.ends_with(REPLAY_FILE_SUFFIX) {
            return invalid("file name must end with '.Map.Gbx' or '.Replay.Gbx'");
        }
    }
    Ok(())
}

fn copy_entry(source: &Path, target: &Path) -> Result<()> {
    let metadata = fs::metadata(source)?;
    if metadata.is_dir() {
        return copy_directory(source, target);
    }
    if let (Ok(a), Ok(b)) = (fs::canonicalize(source), fs::canonicalize(target))
        && a == b
    {
        return Err(FileOperationsError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{source:?} would be copied onto itself"),
        )));
    }
    fs::copy(source, target)?;
    Ok(())
}

/*
 * Duplicates `source_dir` into `target_dir`, depth first. Inside each directory
 * the files are copied before descending into subdirectories. Symbolic links are
 * followed, and a link cycle surfaces as a fatal walk error.
 */
fn copy_directory(source_dir: &Path, target_dir: &Path) -> Result<()> {
    let resolved_source = fs::canonicalize(source_dir)?;
    let resolved_target = resolve_through_existing_ancestor(target_dir)?;
    if resolved_target == resolved_source {
        return Err(FileOperationsError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{source_dir:?} would be copied onto itself"),
        )));
    }
    if resolved_target.starts_with(&resolved_source) {
        return Err(FileOperationsError::DestinationInsideSource {
            source_dir: source_dir.to_path_buf(),
            destination: target_dir.to_path_buf(),
        });
    }

    fs::create_dir_all(target_dir)?;
    let walker = WalkDir::new(source_dir)
        .min_depth(1)
        .follow_links(true)
        .sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        });

    for entry in walker {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| io::Error::other(format!("{:?}: {e}", entry.path())))?;
        let destination = target_dir.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)?;
        } else {
            fs::copy(entry.path(), &destination)?;
        }
    }
    log::trace!("FileTreeOperations: Duplicated {source_dir:?} into {target_dir:?}");
    Ok(())
}

/*
 * Canonicalizes the longest existing prefix of `path` and re-appends the rest,
 * so a destination that does not exist yet can still be compared with a
 * canonical source path.
 */
fn resolve_through_existing_ancestor(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(mut resolved) = fs::canonicalize(existing) {
            resolved.extend(missing.iter().rev());
            return Ok(resolved);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(absolute),
        }
    }
}

/*
 * Formats a byte count with binary multiples, at most two decimals and no
 * trailing zeros: 1536 -> "1.5 KB". Zero formats as an empty string, which the
 * browser shows as a blank size column.
 */
pub fn format_byte_size(size: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if size == 0 {
        return String::new();
    }

    let mut readable = size as f64;
    let mut unit = 0;
    while readable >= 1024.0 && unit < UNITS.len() - 1 {
        readable /= 1024.0;
        unit += 1;
    }

    let mut text = format!("{readable:.2}");
    if text.contains('.') {
        text.truncate(text.trim_end_matches('0').trim_end_matches('.').len());
    }
    format!("{text} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_byte_size_ladder() {
        assert_eq!(format_byte_size(0), "");
        assert_eq!(format_byte_size(1), "1 B");
        assert_eq!(format_byte_size(1023), "1023 B");
        assert_eq!(format_byte_size(1024), "1 KB");
        assert_eq!(format_byte_size(1536), "1.5 KB");
        assert_eq!(format_byte_size(1024 * 1024 * 5), "5 MB");
        assert_eq!(format_byte_size(1024 * 1024 * 1024), "1 GB");
    }

    #[test]
    fn test_format_byte_size_rounds_to_two_decimals() {
        // 1100 / 1024 = 1.07421875
        assert_eq!(format_byte_size(1100), "1.07 KB");
        // 10 * 1024 + 100 = 10.09765625 KB
        assert_eq!(format_byte_size(10 * 1024 + 100), "10.1 KB");
    }

    #[test]
    fn test_format_byte_size_caps_at_terabytes() {
        let size = 2048u64 * 1024 * 1024 * 1024 * 1024;
        assert_eq!(format_byte_size(size), "2048 TB");
    }

    #[test]
    fn test_validate_new_name_for_files() {
        assert!(validate_new_name("A01.Map.Gbx", EntryKind::File).is_ok());
        assert!(validate_new_name("run.replay.gbx", EntryKind::File).is_ok());
        assert!(validate_new_name("A01.txt", EntryKind::File).is_err());
        assert!(validate_new_name("Map.Gbx", EntryKind::File).is_err());
        assert!(validate_new_name("FooMap.Gbx", EntryKind::File).is_err());
        assert!(validate_new_name("FooReplay.Gbx", EntryKind::File).is_err());
        assert!(validate_new_name("sub/A01.Map.Gbx", EntryKind::File).is_err());
        assert!(validate_new_name("   ", EntryKind::File).is_err());
    }

    #[test]
    fn test_validate_new_name_for_folders() {
        assert!(validate_new_name("Summer 2024", EntryKind::Directory).is_ok());
        assert!(validate_new_name("..", EntryKind::Directory).is_err());
        assert!(validate_new_name("a\\b", EntryKind::Directory).is_err());
    }

    #[test]
    fn test_failure_classification() {
        let io_err = FileOperationsError::from(io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(io_err.class(), FailureClass::Recoverable);

        let mismatch = FileOperationsError::NameCountMismatch {
            sources: 2,
            names: 1,
        };
        assert_eq!(mismatch.class(), FailureClass::Fatal);

        let duplicate = FileOperationsError::DuplicateLeftBehind {
            original: PathBuf::from("a"),
            duplicate: PathBuf::from("b"),
            cause: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(duplicate.class(), FailureClass::Fatal);
    }
}
