use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use spawner_include::{LogLevel, MonsterKindId, NEUTRAL_KIND};

const CONFIG_FILE_PATH: &str = "monster_spawner/config.toml";

static GLOBAL_CONFIG: LazyLock<Mutex<Config>> = LazyLock::new(|| Mutex::new(Config::default()));
static CONFIG_PATH: LazyLock<Mutex<PathBuf>> =
    LazyLock::new(|| Mutex::new(PathBuf::from(CONFIG_FILE_PATH)));

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("Failed to serialize config file: {0}")]
    WriteToml(#[from] toml::ser::Error),

    #[error("Failed to read config file: {0}")]
    ReadConfig(std::io::Error),
    #[error("Failed to write config file: {0}")]
    WriteConfig(std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_scripts_dir() -> String {
    "monster_spawner/scripts".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    #[serde(default = "default_scripts_dir")]
    pub dir: String,
    #[serde(default)]
    pub disabled_scripts: Vec<String>,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            dir: default_scripts_dir(),
            disabled_scripts: vec![],
        }
    }
}

fn default_min_spawners() -> u32 {
    2
}

fn default_spawn_interval() -> u32 {
    3
}

fn default_spawner_kind() -> MonsterKindId {
    NEUTRAL_KIND
}

fn default_flight_aware() -> bool {
    true
}

/// Tuning for seeding and the per-monster spawn cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnerConfig {
    /// Lower bound on spawners per map; the map tier raises it.
    #[serde(default = "default_min_spawners")]
    pub min_spawners: u32,
    /// A spawner acts on every tick whose counter is a multiple of this.
    #[serde(default = "default_spawn_interval")]
    pub spawn_interval: u32,
    /// Kind placed on the map for the spawner itself.
    #[serde(default = "default_spawner_kind")]
    pub spawner_kind: MonsterKindId,
    /// Use the flight-aware adjacency query when placing spawned monsters.
    #[serde(default = "default_flight_aware")]
    pub flight_aware: bool,
    /// Fixed RNG seed for reproducible seeding.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            min_spawners: default_min_spawners(),
            spawn_interval: default_spawn_interval(),
            spawner_kind: default_spawner_kind(),
            flight_aware: default_flight_aware(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: i32,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub scripts: ScriptsConfig,
    #[serde(default)]
    pub spawner: SpawnerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            log: LogConfig::default(),
            scripts: ScriptsConfig::default(),
            spawner: SpawnerConfig::default(),
        }
    }
}

impl Config {
    /// Load the config file at `path` (or defaults) and install it globally.
    pub fn initialize(path: impl AsRef<Path>) -> Result<(), Error> {
        let config = load_config(path.as_ref())?;
        *CONFIG_PATH.lock() = path.as_ref().to_path_buf();
        *GLOBAL_CONFIG.lock() = config;
        Ok(())
    }

    /// Get a global config.
    pub fn global<'a>() -> SaveGuard<'a> {
        SaveGuard::new_no_save(GLOBAL_CONFIG.lock())
    }

    /// Get a mutable global config, and save it when dropped.
    pub fn global_mut<'a>() -> SaveGuard<'a> {
        SaveGuard::new(GLOBAL_CONFIG.lock())
    }

    pub fn from_toml(content: &str) -> Result<Self, Error> {
        let mut config: Config = toml::from_str(content)?;
        version_migration(&mut config);
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(Error::WriteConfig)?;
            }
        }
        std::fs::write(path, toml::to_string(&self)?).map_err(Error::WriteConfig)?;
        Ok(())
    }

    pub fn try_save_global(&self) -> Result<(), Error> {
        let path = CONFIG_PATH.lock().clone();
        self.save_to(&path)
    }
}

/// A guard that will automatically save config when dropped.
pub struct SaveGuard<'a> {
    config: MutexGuard<'a, Config>,
    save_on_drop: bool,
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        if !self.save_on_drop {
            return;
        }
        if let Err(e) = self.config.try_save_global() {
            log::error!("Failed to save global config: {}", e);
        }
    }
}

impl std::ops::Deref for SaveGuard<'_> {
    type Target = Config;

    fn deref(&self) -> &Self::Target {
        &self.config
    }
}

impl std::ops::DerefMut for SaveGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.config
    }
}

impl<'a> SaveGuard<'a> {
    fn new(config: MutexGuard<'a, Config>) -> Self {
        Self {
            config,
            save_on_drop: true,
        }
    }

    fn new_no_save(config: MutexGuard<'a, Config>) -> Self {
        Self {
            config,
            save_on_drop: false,
        }
    }
}

fn load_config(config_path: &Path) -> Result<Config, Error> {
    if !config_path.exists() {
        log::warn!("Config file not found, using default config.");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(config_path).map_err(Error::ReadConfig)?;
    Config::from_toml(&content)
}

fn version_migration(config: &mut Config) {
    if config.version != 1 {
        log::error!("Unsupported config version: {}", config.version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = Config::from_toml("version = 1\n").unwrap();
        assert_eq!(config.log.level, LogLevel::Info);
        assert_eq!(config.spawner, SpawnerConfig::default());
        assert_eq!(config.spawner.spawn_interval, 3);
        assert_eq!(config.spawner.min_spawners, 2);
        assert!(config.scripts.disabled_scripts.is_empty());
    }

    #[test]
    fn parses_spawner_section() {
        let config = Config::from_toml(
            r#"
version = 1

[log]
level = "Debug"

[spawner]
min_spawners = 4
spawn_interval = 5
flight_aware = false
seed = 7
"#,
        )
        .unwrap();

        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.spawner.min_spawners, 4);
        assert_eq!(config.spawner.spawn_interval, 5);
        assert_eq!(config.spawner.spawner_kind, NEUTRAL_KIND);
        assert!(!config.spawner.flight_aware);
        assert_eq!(config.spawner.seed, Some(7));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            Config::from_toml("version = "),
            Err(Error::ParseToml(_))
        ));
    }
}
