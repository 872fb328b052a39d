/*
 * This module consolidates the core, platform-agnostic logic of the map browser.
 * It re-exports the file-tree mutation engine (`FileTreeOperations`), the game
 * configuration store (`ConfigStoreOperations`), and the data types they share,
 * along with the path utilities used to derive short names and parent folders.
 */
pub mod config;
pub mod file_operations;
pub mod models;
pub mod path_utils;


// Re-export key structures and enums
pub use models::{
    DEFAULT_CUSTOM_ICON, EntryKind, FilesystemEntry, GameRecord, GameRegistry, list_folder,
};

// Re-export file operation related items
pub use file_operations::{
    CoreFileTreeOperations, FileTreeOperations, RenamePrompt, validate_new_name,
};

// Re-export config related items
pub use config::{ConfigStoreOperations, CoreConfigStore, SettingsState};
