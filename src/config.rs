use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};

use crate::engine::Timing;
use crate::engine::preload::AssetScheme;
use crate::engine::program::ProgramTable;

/// Environment variable that points at a config file, overriding the default
/// `~/.config/mascot-player/config.json`.
pub const CONFIG_ENV: &str = "MASCOT_PLAYER_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_asset_base")]
    pub asset_base: String,
    #[serde(default = "default_image_extension")]
    pub image_extension: String,
    #[serde(default = "default_crossfade_ms")]
    pub crossfade_ms: u64,
    #[serde(default = "default_start_delay_ms")]
    pub start_delay_ms: u64,
    #[serde(default = "default_fallback_ms")]
    pub fallback_hold_ms: u64,
    #[serde(default = "default_fallback_ms")]
    pub skip_delay_ms: u64,
    /// JSON program table replacing the built-in one. Relative paths are
    /// resolved against the config file's directory.
    #[serde(default)]
    pub programs: Option<PathBuf>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub key_bindings: KeyBindings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBindings {
    #[serde(default = "default_next_stage")]
    pub next_stage: String,
    #[serde(default = "default_idle")]
    pub idle: String,
    #[serde(default = "default_happy")]
    pub happy: String,
    #[serde(default = "default_sad")]
    pub sad: String,
    #[serde(default = "default_dead")]
    pub dead: String,
    #[serde(default = "default_interact")]
    pub interact: String,
    #[serde(default = "default_level_up")]
    pub level_up: String,
    #[serde(default = "default_level_down")]
    pub level_down: String,
    #[serde(default = "default_quit")]
    pub quit: String,
}

fn default_asset_base() -> String { "dragons".into() }
fn default_image_extension() -> String { "png".into() }
fn default_crossfade_ms() -> u64 { 100 }
fn default_start_delay_ms() -> u64 { 100 }
fn default_fallback_ms() -> u64 { 500 }

fn default_next_stage() -> String { "s".into() }
fn default_idle() -> String { "1".into() }
fn default_happy() -> String { "2".into() }
fn default_sad() -> String { "3".into() }
fn default_dead() -> String { "4".into() }
fn default_interact() -> String { "Enter|Space".into() }
fn default_level_up() -> String { "Up".into() }
fn default_level_down() -> String { "Down".into() }
fn default_quit() -> String { "q".into() }

impl Default for KeyBindings {
    fn default() -> Self {
        KeyBindings {
            next_stage: default_next_stage(),
            idle: default_idle(),
            happy: default_happy(),
            sad: default_sad(),
            dead: default_dead(),
            interact: default_interact(),
            level_up: default_level_up(),
            level_down: default_level_down(),
            quit: default_quit(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            asset_base: default_asset_base(),
            image_extension: default_image_extension(),
            crossfade_ms: default_crossfade_ms(),
            start_delay_ms: default_start_delay_ms(),
            fallback_hold_ms: default_fallback_ms(),
            skip_delay_ms: default_fallback_ms(),
            programs: None,
            log_file: None,
            key_bindings: KeyBindings::default(),
        }
    }
}

impl PlayerConfig {
    /// Load the user's config. A missing file means defaults; an unreadable
    /// or invalid one is reported and also falls back to defaults.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        if !config_path.exists() {
            return Self::default();
        }
        match Self::from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: invalid player config ({e:#}), using defaults");
                Self::default()
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config: PlayerConfig = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        if let (Some(programs), Some(dir)) = (config.programs.as_mut(), path.parent()) {
            if programs.is_relative() {
                *programs = dir.join(&*programs);
            }
        }
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        let mut path = PathBuf::from(home);
        path.push(".config");
        path.push("mascot-player");
        path.push("config.json");
        path
    }

    /// The configured program table, or the built-in one.
    pub fn load_programs(&self) -> Result<ProgramTable> {
        match &self.programs {
            Some(path) => load_program_table(path),
            None => Ok(ProgramTable::builtin()),
        }
    }

    pub fn timing(&self) -> Timing {
        Timing {
            crossfade: Duration::from_millis(self.crossfade_ms),
            start_delay: Duration::from_millis(self.start_delay_ms),
            fallback_hold: Duration::from_millis(self.fallback_hold_ms),
            skip_delay: Duration::from_millis(self.skip_delay_ms),
        }
    }

    pub fn scheme(&self) -> AssetScheme {
        AssetScheme::new(&self.asset_base, &self.image_extension)
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("mascot-player.log"))
    }
}

pub fn load_program_table(path: &Path) -> Result<ProgramTable> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    ProgramTable::from_json(&json).with_context(|| format!("Invalid program table {}", path.display()))
}

/// Check whether a crossterm `KeyEvent` matches a binding string from config.
/// `|` separates alternative keys, as in `"Enter|Space"`.
pub fn matches_binding(binding: &str, event: &KeyEvent) -> bool {
    if binding.len() > 1 && binding.contains('|') {
        return binding
            .split('|')
            .any(|alt| !alt.is_empty() && matches_binding(alt, event));
    }
    if let Some(ch) = binding.strip_prefix("Ctrl-") {
        if !event.modifiers.contains(KeyModifiers::CONTROL) {
            return false;
        }
        return match ch.chars().next() {
            Some(c) => event.code == KeyCode::Char(c),
            None => false,
        };
    }

    // Plain bindings must not fire while Ctrl or Alt is held.
    if event.modifiers.contains(KeyModifiers::CONTROL)
        || event.modifiers.contains(KeyModifiers::ALT)
    {
        return false;
    }

    match binding {
        "Right" => event.code == KeyCode::Right,
        "Left" => event.code == KeyCode::Left,
        "Up" => event.code == KeyCode::Up,
        "Down" => event.code == KeyCode::Down,
        "Enter" => event.code == KeyCode::Enter,
        "Esc" => event.code == KeyCode::Esc,
        "Space" => event.code == KeyCode::Char(' '),
        "Tab" => event.code == KeyCode::Tab,
        s => {
            if let Some(rest) = s.strip_prefix('F') {
                if let Ok(n) = rest.parse::<u8>() {
                    return event.code == KeyCode::F(n);
                }
            }
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => event.code == KeyCode::Char(c),
                _ => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: PlayerConfig =
            serde_json::from_str(r#"{ "image_extension": "txt", "key_bindings": { "quit": "Esc" } }"#)
                .unwrap();
        assert_eq!(config.image_extension, "txt");
        assert_eq!(config.asset_base, "dragons");
        assert_eq!(config.key_bindings.quit, "Esc");
        assert_eq!(config.key_bindings.interact, "Enter|Space");
        assert_eq!(config.timing(), Timing::default());
    }

    #[test]
    fn scheme_uses_configured_base_and_extension() {
        let config = PlayerConfig {
            asset_base: "sprites".into(),
            image_extension: "txt".into(),
            ..Default::default()
        };
        assert_eq!(config.scheme().frame_url("Baby", "Idle", 1), "/sprites/baby/idle/01.txt");
    }

    #[test]
    fn relative_program_path_is_resolved_next_to_the_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "programs": "programs.json" }"#).unwrap();
        std::fs::write(
            dir.path().join("programs.json"),
            r#"{ "defaultStage": "egg", "stages": { "egg": { "idle": { "totalFrames": 1, "frameDurations": [500] } } } }"#,
        )
        .unwrap();

        let config = PlayerConfig::from_file(&config_path).unwrap();
        assert_eq!(config.programs.as_deref(), Some(dir.path().join("programs.json").as_path()));
        let table = config.load_programs().unwrap();
        assert_eq!(table.default_stage(), "egg");
    }

    #[test]
    fn invalid_program_table_is_an_error_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "defaultStage": "egg", "stages": {} }"#).unwrap();
        let err = load_program_table(&path).unwrap_err();
        assert!(format!("{err:#}").contains("default program egg/idle is missing"));
    }

    #[test]
    fn bindings_match_keys() {
        let none = KeyModifiers::NONE;
        assert!(matches_binding("q", &key(KeyCode::Char('q'), none)));
        assert!(!matches_binding("q", &key(KeyCode::Char('q'), KeyModifiers::ALT)));
        assert!(matches_binding("Ctrl-c", &key(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!matches_binding("Ctrl-c", &key(KeyCode::Char('c'), none)));
        assert!(matches_binding("F5", &key(KeyCode::F(5), none)));
        assert!(matches_binding("Space", &key(KeyCode::Char(' '), none)));
        assert!(matches_binding("Enter", &key(KeyCode::Enter, none)));
        assert!(!matches_binding("qq", &key(KeyCode::Char('q'), none)));
    }

    #[test]
    fn alternatives_match_any_listed_key() {
        let none = KeyModifiers::NONE;
        let interact = KeyBindings::default().interact;
        assert!(matches_binding(&interact, &key(KeyCode::Enter, none)));
        assert!(matches_binding(&interact, &key(KeyCode::Char(' '), none)));
        assert!(!matches_binding(&interact, &key(KeyCode::Char('e'), none)));
        assert!(matches_binding("|", &key(KeyCode::Char('|'), none)));
    }
}
