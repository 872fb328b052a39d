/*
 * Plain data types shared by the file-tree and configuration parts of the core:
 * the game registry records persisted in the config files, and the file system
 * entries shown by the browser. Nothing in here performs I/O except
 * `FilesystemEntry::read`, which always reads fresh metadata from disk.
 */
use super::file_operations::format_byte_size;
use super::path_utils;
use serde::{Serialize, Serializer};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use time::OffsetDateTime;

/// Icon reference given to custom games that have no usable stored icon.
pub const DEFAULT_CUSTOM_ICON: &str = "Data/GameIcons/Custom.png";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum GameKind {
    Builtin,
    Custom { icon: String },
}

/*
 * One playable game configuration. Built-in records are created by the
 * registry bootstrap and only mutated by the config loader; custom records are
 * created by the loader (from the custom games file) or by an explicit
 * "add custom game" action.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameRecord {
    pub name: String,
    pub maps_folder: String,
    pub exe_path: String,
    pub visible_in_launch_menu: bool,
    pub visible_in_game_list: bool,
    #[serde(flatten)]
    pub kind: GameKind,
}

impl GameRecord {
    /// A built-in placeholder with empty paths and default visibility.
    pub fn builtin(name: impl Into<String>) -> Self {
        GameRecord {
            name: name.into(),
            maps_folder: String::new(),
            exe_path: String::new(),
            visible_in_launch_menu: true,
            visible_in_game_list: true,
            kind: GameKind::Builtin,
        }
    }

    pub fn custom(
        name: impl Into<String>,
        maps_folder: impl Into<String>,
        exe_path: impl Into<String>,
        icon: impl Into<String>,
    ) -> Self {
        GameRecord {
            name: name.into(),
            maps_folder: maps_folder.into(),
            exe_path: exe_path.into(),
            visible_in_launch_menu: true,
            visible_in_game_list: true,
            kind: GameKind::Custom { icon: icon.into() },
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.kind, GameKind::Builtin)
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.kind, GameKind::Custom { .. })
    }

    pub fn icon(&self) -> Option<&str> {
        match &self.kind {
            GameKind::Custom { icon } => Some(icon.as_str()),
            GameKind::Builtin => None,
        }
    }

    /// Hides the record everywhere; used when its stored paths are unusable.
    pub fn hide(&mut self) {
        self.visible_in_launch_menu = false;
        self.visible_in_game_list = false;
    }
}

/*
 * The ordered collection of all game records. Built-ins come first in the
 * order the bootstrap inserted them; customs are appended as they are loaded
 * or added. The config store works on this by `&mut` reference.
 */
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct GameRegistry {
    games: Vec<GameRecord>,
}

impl GameRegistry {
    pub fn new() -> Self {
        GameRegistry { games: Vec::new() }
    }

    /// Bootstraps a registry with one built-in placeholder per name.
    pub fn with_builtins<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GameRegistry {
            games: names.into_iter().map(GameRecord::builtin).collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameRecord> {
        self.games.iter()
    }

    pub fn builtins(&self) -> impl Iterator<Item = &GameRecord> {
        self.games.iter().filter(|g| g.is_builtin())
    }

    pub fn builtins_mut(&mut self) -> impl Iterator<Item = &mut GameRecord> {
        self.games.iter_mut().filter(|g| g.is_builtin())
    }

    pub fn customs(&self) -> impl Iterator<Item = &GameRecord> {
        self.games.iter().filter(|g| g.is_custom())
    }

    pub fn get(&self, name: &str) -> Option<&GameRecord> {
        self.games.iter().find(|g| g.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut GameRecord> {
        self.games.iter_mut().find(|g| g.name == name)
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /*
     * Appends a custom record. Names are unique among custom records (they share
     * one persistence file), so a second record with the same name is handed
     * back to the caller instead of being inserted.
     */
    pub fn add_custom(&mut self, record: GameRecord) -> std::result::Result<(), GameRecord> {
        if !record.is_custom() || self.customs().any(|g| g.name == record.name) {
            return Err(record);
        }
        self.games.push(record);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryKind {
    File,
    Directory,
}

/*
 * A file or directory as seen by the browser. Directory sizes are not computed
 * here, so `size` is `None` for directories. Timestamps are `None` when the
 * platform does not report them.
 */
#[derive(Debug, Clone, Serialize)]
pub struct FilesystemEntry {
    pub path: PathBuf,
    pub name: String,
    pub kind: EntryKind,
    pub size: Option<u64>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub modified: Option<OffsetDateTime>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created: Option<OffsetDateTime>,
}

impl FilesystemEntry {
    pub fn read(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        Ok(FilesystemEntry {
            path: path.to_path_buf(),
            name: path_utils::short_name(path),
            kind,
            size: (kind == EntryKind::File).then(|| metadata.len()),
            modified: metadata.modified().ok().map(to_offset_date_time),
            created: metadata.created().ok().map(to_offset_date_time),
        })
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn display_size(&self) -> String {
        self.size.map(format_byte_size).unwrap_or_default()
    }
}

fn to_offset_date_time(t: SystemTime) -> OffsetDateTime {
    OffsetDateTime::from(t)
}

fn serialize_timestamp<S: Serializer>(
    value: &Option<OffsetDateTime>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(t) => serializer.serialize_some(&t.unix_timestamp()),
        None => serializer.serialize_none(),
    }
}

/*
 * Lists the immediate children of `folder`, directories first and then files,
 * each group sorted by name. Entries that vanish or cannot be stat'ed between
 * the directory read and the metadata read are skipped with a warning.
 */
pub fn list_folder(folder: &Path) -> io::Result<Vec<FilesystemEntry>> {
    let mut entries = Vec::new();
    for dir_entry in fs::read_dir(folder)? {
        let path = dir_entry?.path();
        match FilesystemEntry::read(&path) {
            Ok(entry) => entries.push(entry),
            Err(e) => log::warn!("list_folder: Skipping {path:?}: {e}"),
        }
    }
    entries.sort_by(|a, b| b.is_dir().cmp(&a.is_dir()).then_with(|| a.name.cmp(&b.name)));
    log::debug!("list_folder: {} entries in {folder:?}", entries.len());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_add_custom_rejects_duplicate_names() {
        let mut registry = GameRegistry::with_builtins(["TMF"]);
        registry
            .add_custom(GameRecord::custom("Mine", "/maps", "/bin/game", DEFAULT_CUSTOM_ICON))
            .unwrap();

        let rejected = registry
            .add_custom(GameRecord::custom("Mine", "/other", "/bin/other", DEFAULT_CUSTOM_ICON))
            .unwrap_err();

        assert_eq!(rejected.maps_folder, "/other");
        assert_eq!(registry.customs().count(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_add_custom_rejects_builtin_records() {
        let mut registry = GameRegistry::new();
        assert!(registry.add_custom(GameRecord::builtin("TMF")).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_folder_orders_directories_first() -> io::Result<()> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("zeta"))?;
        fs::create_dir(dir.path().join("alpha"))?;
        let mut f = File::create(dir.path().join("a.Map.Gbx"))?;
        f.write_all(&[0u8; 1536])?;

        let entries = list_folder(dir.path())?;
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();

        assert_eq!(names, vec!["alpha", "zeta", "a.Map.Gbx"]);
        assert_eq!(entries[2].size, Some(1536));
        assert_eq!(entries[2].display_size(), "1.5 KB");
        assert_eq!(entries[0].size, None);
        assert!(entries[2].modified.is_some());
        Ok(())
    }

    #[test]
    fn test_registry_serializes_kind_inline() {
        let mut registry = GameRegistry::with_builtins(["TMF"]);
        registry
            .add_custom(GameRecord::custom("Mine", "/maps", "/bin/game", "icon.png"))
            .unwrap();

        let json = serde_json::to_value(&registry).unwrap();

        assert_eq!(json[0]["kind"], "Builtin");
        assert_eq!(json[1]["kind"], "Custom");
        assert_eq!(json[1]["icon"], "icon.png");
    }
}
