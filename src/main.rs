//! Command-line front end for the map browser core.
//!
//! Loads the game registry from the config directory, then lists, copies,
//! deletes or renames map files and folders, or edits game entries and saves
//! the registry back.

mod core;

use crate::core::{
    ConfigStoreOperations, CoreConfigStore, CoreFileTreeOperations, EntryKind, FileTreeOperations,
    FilesystemEntry, GameRecord, GameRegistry, RenamePrompt, SettingsState, list_folder,
    validate_new_name,
};
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use simplelog::{ColorChoice, LevelFilter, TermLogger, TerminalMode};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use time::macros::format_description;

const APP_NAME: &str = "GbxMapBrowser";

/// Built-in games, bootstrapped into the registry before the config is loaded.
const KNOWN_GAMES: [&str; 6] = [
    "TrackMania Nations Forever",
    "TrackMania United Forever",
    "ManiaPlanet",
    "TrackMania Turbo",
    "TrackMania",
    "TrackMania Sunrise",
];

#[derive(Debug, Parser)]
#[command(name = "gbx-map-browser", about = "Browse and organize Gbx map files", version)]
struct Cli {
    /// Folder holding settings.dat and customgames.dat.
    ///
    /// Defaults to the platform's local configuration directory.
    #[arg(long, env = "GBX_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Increase log output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print listings as JSON.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the configured games.
    Games,
    /// List a folder, directories first.
    Ls { folder: PathBuf },
    /// Copy files or folders into a destination folder.
    Copy {
        destination: PathBuf,
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        /// New name for each source, in order.
        #[arg(long = "name")]
        names: Vec<String>,
    },
    /// Delete a single file.
    Delete { path: PathBuf },
    /// Rename a file or folder. Prompts for the name unless --to is given.
    Rename {
        path: PathBuf,
        #[arg(long)]
        to: Option<String>,
    },
    /// Set the paths and visibility of a built-in or custom game.
    SetGame {
        name: String,
        #[arg(long)]
        maps: String,
        #[arg(long)]
        exe: String,
        #[arg(long)]
        hide_in_launch_menu: bool,
        #[arg(long)]
        hide_in_game_list: bool,
    },
    /// Add a custom game.
    AddCustom {
        name: String,
        #[arg(long)]
        maps: String,
        #[arg(long)]
        exe: String,
        #[arg(long, default_value = crate::core::DEFAULT_CUSTOM_ICON)]
        icon: String,
    },
}

/// Reads the new name from stdin, re-asking until it is valid or left empty.
struct ConsolePrompt {
    preset: Option<String>,
}

impl RenamePrompt for ConsolePrompt {
    fn prompt_new_name(&self, old_short_name: &str, kind: EntryKind) -> Option<String> {
        if let Some(name) = &self.preset {
            return Some(name.clone());
        }
        let stdin = io::stdin();
        loop {
            eprint!("New name for '{old_short_name}' (empty to cancel): ");
            io::stderr().flush().ok()?;
            let mut line = String::new();
            if stdin.lock().read_line(&mut line).ok()? == 0 {
                return None;
            }
            let candidate = line.trim();
            if candidate.is_empty() {
                return None;
            }
            match validate_new_name(candidate, kind) {
                Ok(()) => return Some(candidate.to_string()),
                Err(e) => eprintln!("{e}"),
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(
        level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context("failed to initialize logging")?;

    let store = match &cli.config_dir {
        Some(dir) => CoreConfigStore::new(dir),
        None => CoreConfigStore::for_app(APP_NAME).context("no configuration directory")?,
    };
    let mut registry = GameRegistry::with_builtins(KNOWN_GAMES);
    let state = match store.load_all(&mut registry) {
        Ok(report) => {
            if report.builtins.first_run {
                log::info!(
                    "No games configured yet; use `set-game` to point a game at its maps folder and executable."
                );
            }
            report.builtins.state
        }
        Err(e) => {
            log::error!("Could not load settings from {:?}: {e}", store.config_dir());
            SettingsState::Error
        }
    };
    log::debug!("Settings state after load: {state:?}");

    let ops = CoreFileTreeOperations::new();
    match cli.command {
        Command::Games => print_games(&registry, cli.json)?,
        Command::Ls { folder } => print_folder(&folder, cli.json)?,
        Command::Copy {
            destination,
            sources,
            names,
        } => {
            let names = (!names.is_empty()).then_some(names);
            let report = ops.copy_entries(&sources, &destination, names.as_deref())?;
            println!("Copied {}, skipped {}.", report.copied, report.skipped.len());
            for skipped in report.skipped {
                println!("  skipped {}", skipped.display());
            }
        }
        Command::Delete { path } => ops.delete_entry(&path)?,
        Command::Rename { path, to } => {
            let prompt = ConsolePrompt { preset: to };
            let renamed = if path.is_dir() {
                ops.rename_folder(&path, &prompt)?
            } else {
                ops.rename_file(&path, &prompt)?
            };
            match renamed {
                Some(name) => println!("Renamed to {name}"),
                None => println!("Rename cancelled."),
            }
        }
        Command::SetGame {
            name,
            maps,
            exe,
            hide_in_launch_menu,
            hide_in_game_list,
        } => {
            let Some(game) = registry.get_mut(&name) else {
                bail!("unknown game '{name}'");
            };
            game.maps_folder = maps;
            game.exe_path = exe;
            game.visible_in_launch_menu = !hide_in_launch_menu;
            game.visible_in_game_list = !hide_in_game_list;
            save(&store, &registry, state)?;
        }
        Command::AddCustom {
            name,
            maps,
            exe,
            icon,
        } => {
            if registry
                .add_custom(GameRecord::custom(name, maps, exe, icon))
                .is_err()
            {
                bail!("a custom game with that name already exists");
            }
            save(&store, &registry, state)?;
        }
    }
    Ok(())
}

fn save(
    store: &CoreConfigStore,
    registry: &GameRegistry,
    loaded_state: SettingsState,
) -> anyhow::Result<()> {
    if loaded_state == SettingsState::Error {
        bail!("refusing to overwrite settings that failed to load");
    }
    let report = store
        .save_all(registry)
        .with_context(|| format!("failed to save settings to {:?}", store.config_dir()))?;
    if !report.custom_games_saved {
        log::warn!("Built-in games were saved but custom games were not.");
    }
    log::debug!("Settings state after save: {:?}", report.state);
    Ok(())
}

fn print_games(registry: &GameRegistry, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(registry)?);
        return Ok(());
    }
    for game in registry.iter() {
        let kind = if game.is_custom() { "custom" } else { "built-in" };
        let flags = match (game.visible_in_launch_menu, game.visible_in_game_list) {
            (true, true) => "",
            (false, true) => " [hidden in launch menu]",
            (true, false) => " [hidden in game list]",
            (false, false) => " [hidden]",
        };
        println!("{} ({kind}){flags}", game.name);
        if !game.maps_folder.is_empty() {
            println!("  maps: {}", game.maps_folder);
        }
        if !game.exe_path.is_empty() {
            println!("  exe:  {}", game.exe_path);
        }
    }
    Ok(())
}

fn print_folder(folder: &Path, json: bool) -> anyhow::Result<()> {
    let entries = list_folder(folder).with_context(|| format!("cannot list {folder:?}"))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    for entry in &entries {
        println!("{}", describe_entry(entry));
    }
    Ok(())
}

fn describe_entry(entry: &FilesystemEntry) -> String {
    let layout = format_description!("[year]-[month]-[day] [hour]:[minute]");
    let modified = entry
        .modified
        .and_then(|t| t.format(layout).ok())
        .unwrap_or_default();
    let name = if entry.is_dir() {
        format!("{}/", entry.name)
    } else {
        entry.name.clone()
    };
    format!("{modified:16}  {:>10}  {name}", entry.display_size())
}
