/*
 * Persists the game registry across two line-oriented text files in the config
 * directory: `settings.dat` holds the built-in games and `customgames.dat` the
 * user-defined ones. The format is positional and pipe-delimited, and it has to
 * stay readable by hand and compatible with files written by older versions,
 * which wrote fewer fields (or, in the oldest format, only the maps folder).
 *
 * As with the other managers in the core, a trait (`ConfigStoreOperations`)
 * fronts the concrete file-backed `CoreConfigStore` so callers can be tested
 * against a substitute. Every load and save returns an explicit outcome instead
 * of updating a process-wide flag.
 */
use super::models::{DEFAULT_CUSTOM_ICON, GameKind, GameRecord, GameRegistry};
use super::path_utils;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const CONFIG_DIR_NAME: &str = "config";
pub const BUILTIN_GAMES_FILENAME: &str = "settings.dat";
pub const CUSTOM_GAMES_FILENAME: &str = "customgames.dat";

const FIELD_SEPARATOR: char = '|';
const CUSTOM_GAME_MIN_FIELDS: usize = 5;

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    NoConfigDirectory,
    Utf8Error(std::string::FromUtf8Error),
    MalformedLine {
        line_number: usize,
        reason: String,
    },
    UnencodableField {
        game: String,
        field: &'static str,
    },
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<std::string::FromUtf8Error> for ConfigError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        ConfigError::Utf8Error(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::NoConfigDirectory => {
                write!(f, "Could not determine the configuration directory")
            }
            ConfigError::Utf8Error(e) => write!(f, "Configuration file UTF-8 error: {e}"),
            ConfigError::MalformedLine {
                line_number,
                reason,
            } => write!(f, "Malformed line {line_number}: {reason}"),
            ConfigError::UnencodableField { game, field } => write!(
                f,
                "The {field} of game '{game}' contains '|' or a line break and cannot be saved"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Utf8Error(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/*
 * Where the built-in settings stand. A missing file is `NotLoaded` (first run),
 * a parsed file is `Loaded`, any completed save is `Saved`. Callers record
 * `Error` when a built-ins load or save returns an error.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettingsState {
    #[default]
    Unknown,
    NotLoaded,
    Loaded,
    Saved,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinsLoad {
    pub state: SettingsState,
    /// No usable configuration exists: the file is missing or every built-in was blank.
    pub first_run: bool,
    pub empty_games: usize,
    pub legacy_lines: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomsLoad {
    pub loaded: usize,
    /// 1-based line numbers that were malformed or duplicated.
    pub skipped_lines: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub builtins: BuiltinsLoad,
    pub customs: CustomsLoad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReport {
    pub state: SettingsState,
    pub custom_games_saved: bool,
}

pub trait ConfigStoreOperations: Send + Sync {
    fn load_all(&self, registry: &mut GameRegistry) -> Result<LoadReport>;
    fn load_builtins(&self, registry: &mut GameRegistry) -> Result<BuiltinsLoad>;
    fn load_customs(&self, registry: &mut GameRegistry) -> Result<CustomsLoad>;
    fn save_all(&self, registry: &GameRegistry) -> Result<SaveReport>;
    fn save_builtins(&self, registry: &GameRegistry) -> Result<SettingsState>;
    fn save_customs(&self, registry: &GameRegistry) -> Result<()>;
}

pub struct CoreConfigStore {
    config_dir: PathBuf,
}

impl CoreConfigStore {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        CoreConfigStore {
            config_dir: config_dir.into(),
        }
    }

    /// Stores the files in `<base_dir>/config`.
    pub fn in_base_dir(base_dir: &Path) -> Self {
        Self::new(base_dir.join(CONFIG_DIR_NAME))
    }

    /// Stores the files under the platform's local config directory for `app_name`.
    pub fn for_app(app_name: &str) -> Result<Self> {
        let base = path_utils::get_base_app_config_local_dir(app_name)
            .ok_or(ConfigError::NoConfigDirectory)?;
        Ok(Self::in_base_dir(&base))
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn builtins_path(&self) -> PathBuf {
        self.config_dir.join(BUILTIN_GAMES_FILENAME)
    }

    pub fn customs_path(&self) -> PathBuf {
        self.config_dir.join(CUSTOM_GAMES_FILENAME)
    }

    fn read_text(path: &Path) -> Result<String> {
        let bytes = fs::read(path)?;
        Ok(String::from_utf8(bytes)?)
    }

    fn write_lines(&self, path: &Path, lines: &[String]) -> Result<()> {
        fs::create_dir_all(&self.config_dir)?;
        let mut writer = BufWriter::new(File::create(path)?);
        for line in lines {
            writeln!(writer, "{line}")?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl ConfigStoreOperations for CoreConfigStore {
    fn load_all(&self, registry: &mut GameRegistry) -> Result<LoadReport> {
        let builtins = self.load_builtins(registry)?;
        let customs = match self.load_customs(registry) {
            Ok(customs) => customs,
            Err(e) => {
                log::error!("CoreConfigStore: Failed to load custom games: {e}");
                CustomsLoad::default()
            }
        };
        Ok(LoadReport { builtins, customs })
    }

    /*
     * Applies each line of the built-ins file to the pre-populated built-in
     * record whose `"<name>: "` prefix it starts with. Lines matching no record
     * are ignored.
     */
    fn load_builtins(&self, registry: &mut GameRegistry) -> Result<BuiltinsLoad> {
        let path = self.builtins_path();
        log::trace!("CoreConfigStore: Loading built-in games from {path:?}");
        if !path.exists() {
            log::info!("CoreConfigStore: {path:?} does not exist; treating as first run.");
            return Ok(BuiltinsLoad {
                state: SettingsState::NotLoaded,
                first_run: true,
                empty_games: 0,
                legacy_lines: 0,
            });
        }

        let text = Self::read_text(&path)?;
        let mut empty: HashSet<usize> = HashSet::new();
        let mut legacy_lines = 0;
        let mut builtin_count = 0;

        for (index, record) in registry.builtins_mut().enumerate() {
            builtin_count += 1;
            let prefix = format!("{}: ", record.name);
            for line in text.lines() {
                let Some(remainder) = line.strip_prefix(&prefix) else {
                    continue;
                };
                match apply_builtin_fields(record, remainder) {
                    BuiltinLine::Legacy => {
                        legacy_lines += 1;
                        empty.remove(&index);
                    }
                    BuiltinLine::Empty => {
                        empty.insert(index);
                    }
                    BuiltinLine::Applied => {
                        empty.remove(&index);
                    }
                }
            }
        }

        let first_run = empty.len() == builtin_count;
        if first_run {
            log::info!(
                "CoreConfigStore: All {builtin_count} built-in games are unconfigured; treating as first run."
            );
        }
        log::debug!(
            "CoreConfigStore: Loaded built-in games from {path:?} ({} empty, {legacy_lines} legacy lines).",
            empty.len()
        );
        Ok(BuiltinsLoad {
            state: SettingsState::Loaded,
            first_run,
            empty_games: empty.len(),
            legacy_lines,
        })
    }

    fn load_customs(&self, registry: &mut GameRegistry) -> Result<CustomsLoad> {
        let path = self.customs_path();
        if !path.exists() {
            log::debug!("CoreConfigStore: No custom games file at {path:?}.");
            return Ok(CustomsLoad::default());
        }

        let text = Self::read_text(&path)?;
        let mut report = CustomsLoad::default();
        for (index, line) in text.lines().enumerate() {
            let line_number = index + 1;
            if line.trim().is_empty() {
                continue;
            }
            let record = match parse_custom_line(line, line_number) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("CoreConfigStore: Skipping custom game in {path:?}: {e}");
                    report.skipped_lines.push(line_number);
                    continue;
                }
            };
            match registry.add_custom(record) {
                Ok(()) => report.loaded += 1,
                Err(duplicate) => {
                    log::warn!(
                        "CoreConfigStore: Skipping duplicate custom game '{}' on line {line_number}.",
                        duplicate.name
                    );
                    report.skipped_lines.push(line_number);
                }
            }
        }

        log::debug!(
            "CoreConfigStore: Loaded {} custom games from {path:?}, skipped {}.",
            report.loaded,
            report.skipped_lines.len()
        );
        Ok(report)
    }

    fn save_all(&self, registry: &GameRegistry) -> Result<SaveReport> {
        let state = self.save_builtins(registry)?;
        let custom_games_saved = match self.save_customs(registry) {
            Ok(()) => true,
            Err(e) => {
                log::error!("CoreConfigStore: Failed to save custom games: {e}");
                false
            }
        };
        Ok(SaveReport {
            state,
            custom_games_saved,
        })
    }

    fn save_builtins(&self, registry: &GameRegistry) -> Result<SettingsState> {
        let lines = registry
            .builtins()
            .map(builtin_line)
            .collect::<Result<Vec<_>>>()?;
        let path = self.builtins_path();
        self.write_lines(&path, &lines)?;
        log::debug!(
            "CoreConfigStore: Saved {} built-in games to {path:?}.",
            lines.len()
        );
        Ok(SettingsState::Saved)
    }

    fn save_customs(&self, registry: &GameRegistry) -> Result<()> {
        let lines = registry
            .customs()
            .map(custom_line)
            .collect::<Result<Vec<_>>>()?;
        let path = self.customs_path();
        self.write_lines(&path, &lines)?;
        log::debug!(
            "CoreConfigStore: Saved {} custom games to {path:?}.",
            lines.len()
        );
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum BuiltinLine {
    Legacy,
    Empty,
    Applied,
}

/*
 * Applies `maps|exe[|E|N][|V|N]` to a built-in record. The oldest format has
 * no separator and only holds the maps folder. A blank maps folder or
 * executable hides the record and leaves its paths untouched. Missing
 * visibility fields keep the current flag values.
 */
fn apply_builtin_fields(record: &mut GameRecord, remainder: &str) -> BuiltinLine {
    if !remainder.contains(FIELD_SEPARATOR) {
        record.maps_folder = remainder.to_string();
        return BuiltinLine::Legacy;
    }

    let parts: Vec<&str> = remainder.split(FIELD_SEPARATOR).collect();
    let (maps_folder, exe_path) = (parts[0], parts[1]);
    if maps_folder.trim().is_empty() || exe_path.trim().is_empty() {
        record.hide();
        return BuiltinLine::Empty;
    }

    record.maps_folder = maps_folder.to_string();
    record.exe_path = exe_path.to_string();
    if let Some(flag) = parts.get(2) {
        record.visible_in_launch_menu = *flag == "E";
    }
    if let Some(flag) = parts.get(3) {
        record.visible_in_game_list = *flag == "V";
    }
    BuiltinLine::Applied
}

/*
 * Parses `name|maps|exe|E|V[|icon]`. The icon reference is optional: files
 * written before icons were saved stop after the visibility flags, and a blank
 * icon falls back to the default custom-game icon.
 */
fn parse_custom_line(line: &str, line_number: usize) -> Result<GameRecord> {
    let parts: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    let malformed = |reason: String| ConfigError::MalformedLine {
        line_number,
        reason,
    };
    if parts.len() < CUSTOM_GAME_MIN_FIELDS {
        return Err(malformed(format!(
            "expected at least {CUSTOM_GAME_MIN_FIELDS} fields, found {}",
            parts.len()
        )));
    }
    if parts[0].trim().is_empty() {
        return Err(malformed("game name is empty".to_string()));
    }

    let icon = parts
        .get(5)
        .filter(|icon| !icon.trim().is_empty())
        .copied()
        .unwrap_or(DEFAULT_CUSTOM_ICON);
    let mut record = GameRecord::custom(parts[0], parts[1], parts[2], icon);
    record.visible_in_launch_menu = parts[3] == "E";
    record.visible_in_game_list = parts[4] == "V";
    Ok(record)
}

fn encodable<'a>(record: &GameRecord, field: &'static str, value: &'a str) -> Result<&'a str> {
    if value.contains([FIELD_SEPARATOR, '\n', '\r']) {
        return Err(ConfigError::UnencodableField {
            game: record.name.clone(),
            field,
        });
    }
    Ok(value)
}

fn flag(value: bool, set: &'static str) -> &'static str {
    if value { set } else { "N" }
}

fn builtin_line(record: &GameRecord) -> Result<String> {
    Ok(format!(
        "{}: {}|{}|{}|{}",
        encodable(record, "name", &record.name)?,
        encodable(record, "maps folder", &record.maps_folder)?,
        encodable(record, "executable path", &record.exe_path)?,
        flag(record.visible_in_launch_menu, "E"),
        flag(record.visible_in_game_list, "V"),
    ))
}

fn custom_line(record: &GameRecord) -> Result<String> {
    let icon = match &record.kind {
        GameKind::Custom { icon } => icon.as_str(),
        GameKind::Builtin => DEFAULT_CUSTOM_ICON,
    };
    Ok(format!(
        "{}|{}|{}|{}|{}|{}",
        encodable(record, "name", &record.name)?,
        encodable(record, "maps folder", &record.maps_folder)?,
        encodable(record, "executable path", &record.exe_path)?,
        flag(record.visible_in_launch_menu, "E"),
        flag(record.visible_in_game_list, "V"),
        encodable(record, "icon", icon)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const GAMES: [&str; 3] = ["TrackMania Forever", "ManiaPlanet", "TrackMania"];

    fn write_config(store: &CoreConfigStore, file_name: &str, contents: &str) {
        fs::create_dir_all(store.config_dir()).unwrap();
        fs::write(store.config_dir().join(file_name), contents).unwrap();
    }

    #[test]
    fn test_load_builtins_missing_file_is_first_run() -> Result<()> {
        let dir = tempdir()?;
        let store = CoreConfigStore::in_base_dir(dir.path());
        let mut registry = GameRegistry::with_builtins(GAMES);
        let before = registry.clone();

        let outcome = store.load_builtins(&mut registry)?;

        assert_eq!(outcome.state, SettingsState::NotLoaded);
        assert!(outcome.first_run);
        assert_eq!(
            registry.iter().collect::<Vec<_>>(),
            before.iter().collect::<Vec<_>>()
        );
        Ok(())
    }

    #[test]
    fn test_save_then_load_round_trips_builtins() -> Result<()> {
        // Arrange
        let dir = tempdir()?;
        let store = CoreConfigStore::in_base_dir(dir.path());
        let mut registry = GameRegistry::with_builtins(GAMES);
        {
            let tmf = registry.get_mut("TrackMania Forever").unwrap();
            tmf.maps_folder = "C:\\Users\\me\\Documents\\TrackMania\\Tracks".to_string();
            tmf.exe_path = "C:\\Games\\TmForever\\TmForever.exe".to_string();
            tmf.visible_in_launch_menu = false;
        }
        {
            let mp = registry.get_mut("ManiaPlanet").unwrap();
            mp.maps_folder = "/home/me/ManiaPlanet/Maps".to_string();
            mp.exe_path = "/opt/mp/ManiaPlanet.exe".to_string();
            mp.visible_in_game_list = false;
        }
        {
            let tm = registry.get_mut("TrackMania").unwrap();
            tm.maps_folder = "D:\\TM2020\\Maps".to_string();
            tm.exe_path = "D:\\TM2020\\Trackmania.exe".to_string();
        }

        // Act
        assert_eq!(store.save_builtins(&registry)?, SettingsState::Saved);
        let mut reloaded = GameRegistry::with_builtins(GAMES);
        let outcome = store.load_builtins(&mut reloaded)?;

        // Assert
        assert_eq!(outcome.state, SettingsState::Loaded);
        assert!(!outcome.first_run);
        for name in GAMES {
            assert_eq!(reloaded.get(name), registry.get(name), "mismatch for {name}");
        }
        Ok(())
    }

    #[test]
    fn test_save_builtins_writes_documented_format() -> Result<()> {
        let dir = tempdir()?;
        let store = CoreConfigStore::in_base_dir(dir.path());
        let mut registry = GameRegistry::with_builtins(["ManiaPlanet"]);
        {
            let mp = registry.get_mut("ManiaPlanet").unwrap();
            mp.maps_folder = "M".to_string();
            mp.exe_path = "X".to_string();
            mp.visible_in_game_list = false;
        }
        registry
            .add_custom(GameRecord::custom("Mine", "m", "x", "icon.png"))
            .unwrap();

        store.save_all(&registry)?;

        assert_eq!(
            fs::read_to_string(store.builtins_path())?,
            "ManiaPlanet: M|X|E|N\n"
        );
        assert_eq!(
            fs::read_to_string(store.customs_path())?,
            "Mine|m|x|E|V|icon.png\n"
        );
        Ok(())
    }

    #[test]
    fn test_all_blank_builtins_is_first_run() -> Result<()> {
        let dir = tempdir()?;
        let store = CoreConfigStore::in_base_dir(dir.path());
        write_config(
            &store,
            BUILTIN_GAMES_FILENAME,
            "TrackMania Forever: ||E|V\nManiaPlanet: C:\\maps| |E|V\nTrackMania: |C:\\tm.exe|E|V\n",
        );
        let mut registry = GameRegistry::with_builtins(GAMES);

        let outcome = store.load_builtins(&mut registry)?;

        assert_eq!(outcome.state, SettingsState::Loaded);
        assert!(outcome.first_run);
        assert_eq!(outcome.empty_games, 3);
        for game in registry.builtins() {
            assert!(!game.visible_in_launch_menu && !game.visible_in_game_list);
            assert_eq!(game.maps_folder, "", "blank entries must not assign paths");
        }
        Ok(())
    }

    #[test]
    fn test_one_populated_builtin_is_not_first_run() -> Result<()> {
        let dir = tempdir()?;
        let store = CoreConfigStore::in_base_dir(dir.path());
        write_config(
            &store,
            BUILTIN_GAMES_FILENAME,
            "TrackMania Forever: ||E|V\nManiaPlanet: C:\\maps|C:\\mp.exe|E|V\nTrackMania: ||N|N\n",
        );
        let mut registry = GameRegistry::with_builtins(GAMES);

        let outcome = store.load_builtins(&mut registry)?;

        assert!(!outcome.first_run);
        assert_eq!(outcome.empty_games, 2);
        assert_eq!(registry.get("ManiaPlanet").unwrap().exe_path, "C:\\mp.exe");
        Ok(())
    }

    #[test]
    fn test_legacy_line_sets_only_maps_folder() -> Result<()> {
        let dir = tempdir()?;
        let store = CoreConfigStore::in_base_dir(dir.path());
        write_config(
            &store,
            BUILTIN_GAMES_FILENAME,
            "ManiaPlanet: C:\\Users\\me\\Documents\\ManiaPlanet\\Maps\n",
        );
        let mut registry = GameRegistry::with_builtins(GAMES);

        let outcome = store.load_builtins(&mut registry)?;

        let mp = registry.get("ManiaPlanet").unwrap();
        assert_eq!(mp.maps_folder, "C:\\Users\\me\\Documents\\ManiaPlanet\\Maps");
        assert_eq!(mp.exe_path, "");
        assert!(mp.visible_in_launch_menu && mp.visible_in_game_list);
        assert_eq!(outcome.legacy_lines, 1);
        Ok(())
    }

    #[test]
    fn test_missing_optional_flags_keep_defaults() -> Result<()> {
        let dir = tempdir()?;
        let store = CoreConfigStore::in_base_dir(dir.path());
        write_config(
            &store,
            BUILTIN_GAMES_FILENAME,
            "ManiaPlanet: C:\\maps|C:\\mp.exe\nTrackMania: D:\\maps|D:\\tm.exe|N\n",
        );
        let mut registry = GameRegistry::with_builtins(GAMES);

        store.load_builtins(&mut registry)?;

        let mp = registry.get("ManiaPlanet").unwrap();
        assert!(mp.visible_in_launch_menu && mp.visible_in_game_list);
        let tm = registry.get("TrackMania").unwrap();
        assert!(!tm.visible_in_launch_menu);
        assert!(tm.visible_in_game_list);
        Ok(())
    }

    #[test]
    fn test_builtin_match_requires_exact_name_prefix() -> Result<()> {
        // "TrackMania" is a substring of "TrackMania Forever"; only the exact
        // "<name>: " prefix may select a record.
        let dir = tempdir()?;
        let store = CoreConfigStore::in_base_dir(dir.path());
        write_config(
            &store,
            BUILTIN_GAMES_FILENAME,
            "TrackMania Forever: C:\\tmf|C:\\tmf.exe|E|V\n",
        );
        let mut registry = GameRegistry::with_builtins(GAMES);

        store.load_builtins(&mut registry)?;

        assert_eq!(registry.get("TrackMania Forever").unwrap().maps_folder, "C:\\tmf");
        assert_eq!(registry.get("TrackMania").unwrap().maps_folder, "");
        Ok(())
    }

    #[test]
    fn test_malformed_custom_line_does_not_stop_loading() -> Result<()> {
        let dir = tempdir()?;
        let store = CoreConfigStore::in_base_dir(dir.path());
        write_config(
            &store,
            CUSTOM_GAMES_FILENAME,
            "First|/maps/a|/bin/a|E|V|a.png\nBroken|/maps/b|/bin/b\nThird|/maps/c|/bin/c|N|N\n",
        );
        let mut registry = GameRegistry::with_builtins(GAMES);

        let outcome = store.load_customs(&mut registry)?;

        assert_eq!(outcome.loaded, 2);
        assert_eq!(outcome.skipped_lines, vec![2]);
        let names: Vec<&str> = registry.customs().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Third"]);
        let third = registry.get("Third").unwrap();
        assert!(!third.visible_in_launch_menu && !third.visible_in_game_list);
        assert_eq!(third.icon(), Some(DEFAULT_CUSTOM_ICON));
        assert_eq!(registry.get("First").unwrap().icon(), Some("a.png"));
        Ok(())
    }

    #[test]
    fn test_duplicate_custom_names_keep_first() -> Result<()> {
        let dir = tempdir()?;
        let store = CoreConfigStore::in_base_dir(dir.path());
        write_config(
            &store,
            CUSTOM_GAMES_FILENAME,
            "Mine|/a|/a.exe|E|V|\n\nMine|/b|/b.exe|E|V|\n",
        );
        let mut registry = GameRegistry::new();

        let outcome = store.load_customs(&mut registry)?;

        assert_eq!(outcome.loaded, 1);
        assert_eq!(outcome.skipped_lines, vec![3]);
        assert_eq!(registry.get("Mine").unwrap().maps_folder, "/a");
        Ok(())
    }

    #[test]
    fn test_missing_customs_file_is_silent() -> Result<()> {
        let dir = tempdir()?;
        let store = CoreConfigStore::in_base_dir(dir.path());
        let mut registry = GameRegistry::with_builtins(GAMES);

        let outcome = store.load_customs(&mut registry)?;

        assert_eq!(outcome, CustomsLoad::default());
        assert_eq!(registry.len(), GAMES.len());
        Ok(())
    }

    #[test]
    fn test_load_all_survives_unreadable_customs() -> Result<()> {
        let dir = tempdir()?;
        let store = CoreConfigStore::in_base_dir(dir.path());
        write_config(&store, BUILTIN_GAMES_FILENAME, "ManiaPlanet: M|X|E|V\n");
        fs::write(store.customs_path(), b"\xff\xfe\x00")?;
        let mut registry = GameRegistry::with_builtins(GAMES);

        let report = store.load_all(&mut registry)?;

        assert_eq!(report.builtins.state, SettingsState::Loaded);
        assert_eq!(report.customs, CustomsLoad::default());
        assert_eq!(registry.get("ManiaPlanet").unwrap().exe_path, "X");
        Ok(())
    }

    #[test]
    fn test_save_refuses_pipe_in_field_and_keeps_old_file() -> Result<()> {
        let dir = tempdir()?;
        let store = CoreConfigStore::in_base_dir(dir.path());
        write_config(&store, BUILTIN_GAMES_FILENAME, "ManiaPlanet: M|X|E|V\n");
        let mut registry = GameRegistry::with_builtins(["ManiaPlanet"]);
        registry.get_mut("ManiaPlanet").unwrap().maps_folder = "C:\\a|b".to_string();

        let result = store.save_builtins(&registry);

        assert!(matches!(
            result,
            Err(ConfigError::UnencodableField { field: "maps folder", .. })
        ));
        assert_eq!(
            fs::read_to_string(store.builtins_path())?,
            "ManiaPlanet: M|X|E|V\n"
        );
        Ok(())
    }

    #[test]
    fn test_custom_games_round_trip_with_icons() -> Result<()> {
        let dir = tempdir()?;
        let store = CoreConfigStore::in_base_dir(dir.path());
        let mut registry = GameRegistry::with_builtins(GAMES);
        let mut hidden = GameRecord::custom("Hidden", "/maps/h", "/bin/h", "h.png");
        hidden.visible_in_game_list = false;
        registry.add_custom(hidden).unwrap();
        registry
            .add_custom(GameRecord::custom("Shown", "/maps/s", "/bin/s", DEFAULT_CUSTOM_ICON))
            .unwrap();

        let report = store.save_all(&registry)?;
        let mut reloaded = GameRegistry::with_builtins(GAMES);
        store.load_all(&mut reloaded)?;

        assert_eq!(report.state, SettingsState::Saved);
        assert!(report.custom_games_saved);
        assert_eq!(
            reloaded.customs().collect::<Vec<_>>(),
            registry.customs().collect::<Vec<_>>()
        );
        Ok(())
    }
}
