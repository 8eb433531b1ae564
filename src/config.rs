/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory, the CWD, or
/// `~/.local/share/kukaroo`. Falls back to defaults if the file is missing
/// or incomplete; a broken file is logged and ignored.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::sim::world::DEFAULT_FINAL_LEVEL;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub assets_dir: PathBuf,
    pub final_level: i32,
    pub invincible: bool,
    /// `None` seeds from entropy.
    pub seed: Option<u64>,
    pub audio: AudioConfig,
    pub tick_rate_ms: u64,
    pub gamepad: GamepadConfig,
}

#[derive(Clone, Debug)]
pub struct AudioConfig {
    pub sound: bool,
    pub music: bool,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub flap: Vec<String>,
    pub start: Vec<String>,
    pub pause: Vec<String>,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    general: TomlGeneral,
    #[serde(default)]
    audio: TomlAudio,
    #[serde(default)]
    speed: TomlSpeed,
    #[serde(default)]
    gamepad: TomlGamepad,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_assets_dir")]
    assets_dir: String,
    #[serde(default = "default_final_level")]
    final_level: i32,
    #[serde(default)]
    invincible: bool,
    #[serde(default)]
    seed: u64,
}

#[derive(Deserialize, Debug)]
struct TomlAudio {
    #[serde(default = "default_true")]
    sound: bool,
    #[serde(default = "default_true")]
    music: bool,
}

#[derive(Deserialize, Debug)]
struct TomlSpeed {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_flap")]
    flap: Vec<String>,
    #[serde(default = "default_start")]
    start: Vec<String>,
    #[serde(default = "default_pause")]
    pause: Vec<String>,
}

// ── Defaults ──

fn default_assets_dir() -> String { "assets".into() }
fn default_final_level() -> i32 { DEFAULT_FINAL_LEVEL }
fn default_true() -> bool { true }
fn default_tick_rate() -> u64 { 16 } // ~60 ticks per second

fn default_flap() -> Vec<String> { vec!["A".into(), "B".into()] }
fn default_start() -> Vec<String> { vec!["Start".into()] }
fn default_pause() -> Vec<String> { vec!["Select".into()] }

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            assets_dir: default_assets_dir(),
            final_level: default_final_level(),
            invincible: false,
            seed: 0,
        }
    }
}

impl Default for TomlAudio {
    fn default() -> Self {
        TomlAudio { sound: true, music: true }
    }
}

impl Default for TomlSpeed {
    fn default() -> Self {
        TomlSpeed { tick_rate_ms: default_tick_rate() }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            flap: default_flap(),
            start: default_start(),
            pause: default_pause(),
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from the first `config.toml` found in the search dirs.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        Self::from_toml(toml_cfg, &search_dirs)
    }

    /// Parse a config document directly. Relative asset paths resolve
    /// against `base`.
    #[cfg(test)]
    pub fn parse(text: &str, base: &Path) -> Self {
        let toml_cfg = parse_toml(text, base);
        Self::from_toml(toml_cfg, &[base.to_path_buf()])
    }

    fn from_toml(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let assets_str = &toml_cfg.general.assets_dir;
        let assets_dir = if Path::new(assets_str).is_absolute() {
            PathBuf::from(assets_str)
        } else {
            search_dirs.iter()
                .map(|d| d.join(assets_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(assets_str))
        };

        let seed = match toml_cfg.general.seed {
            0 => None,
            s => Some(s),
        };

        GameConfig {
            assets_dir,
            final_level: toml_cfg.general.final_level.max(1),
            invincible: toml_cfg.general.invincible,
            seed,
            audio: AudioConfig {
                sound: toml_cfg.audio.sound,
                music: toml_cfg.audio.music,
            },
            tick_rate_ms: toml_cfg.speed.tick_rate_ms.max(1),
            gamepad: GamepadConfig {
                flap: toml_cfg.gamepad.flap,
                start: toml_cfg.gamepad.start,
                pause: toml_cfg.gamepad.pause,
            },
        }
    }
}

/// Candidate directories to search: exe dir + CWD + data home (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let data = PathBuf::from(&home).join(".local/share/kukaroo");
        if data.is_dir() && !dirs.iter().any(|d| d == &data) {
            dirs.push(data);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if !path.exists() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                log::info!("using config {}", path.display());
                return parse_toml(&text, &path);
            }
            Err(e) => log::warn!("could not read {}: {e}", path.display()),
        }
    }
    log::info!("no config.toml found, using defaults");
    TomlConfig::default()
}

fn parse_toml(text: &str, origin: &Path) -> TomlConfig {
    match toml::from_str::<TomlConfig>(text) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::warn!("{} parse error, using defaults: {e}", origin.display());
            TomlConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let base = PathBuf::from("/nonexistent");
        let cfg = GameConfig::parse("", &base);
        assert_eq!(cfg.final_level, 20);
        assert!(!cfg.invincible);
        assert_eq!(cfg.seed, None);
        assert!(cfg.audio.sound && cfg.audio.music);
        assert_eq!(cfg.tick_rate_ms, 16);
        assert_eq!(cfg.gamepad.start, vec!["Start".to_string()]);
        assert_eq!(cfg.assets_dir, PathBuf::from("assets"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let text = r#"
            [general]
            invincible = true
            seed = 1234

            [audio]
            music = false
        "#;
        let cfg = GameConfig::parse(text, Path::new("/nonexistent"));
        assert!(cfg.invincible);
        assert_eq!(cfg.seed, Some(1234));
        assert!(cfg.audio.sound);
        assert!(!cfg.audio.music);
        assert_eq!(cfg.final_level, 20);
    }

    #[test]
    fn malformed_document_falls_back() {
        let cfg = GameConfig::parse("[general\nfinal_level = ", Path::new("."));
        assert_eq!(cfg.final_level, 20);
        assert_eq!(cfg.tick_rate_ms, 16);
    }

    #[test]
    fn nonsense_numbers_are_clamped() {
        let text = "[general]\nfinal_level = -3\n[speed]\ntick_rate_ms = 0\n";
        let cfg = GameConfig::parse(text, Path::new("."));
        assert_eq!(cfg.final_level, 1);
        assert_eq!(cfg.tick_rate_ms, 1);
    }

    #[test]
    fn relative_assets_dir_resolves_against_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("art")).unwrap();
        let cfg = GameConfig::parse("[general]\nassets_dir = \"art\"\n", dir.path());
        assert_eq!(cfg.assets_dir, dir.path().join("art"));
    }

    #[test]
    fn load_toml_reads_first_existing_file() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("config.toml"), "[general]\nfinal_level = 7\n").unwrap();
        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(load_toml(&dirs).general.final_level, 7);
    }
}
