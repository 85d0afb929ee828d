use std::path::Path;

use log::error;

pub mod config;
pub mod error;
pub mod grid;
pub mod host;
pub mod logger;
pub mod luavm;
pub mod seeder;
pub mod session;
pub mod spawner;

pub use spawner_include::{LogLevel, MonsterId, MonsterKindId, NEUTRAL_KIND, Position};

fn panic_hook(info: &std::panic::PanicHookInfo) {
    error!("MonsterSpawner panic: {}", info);
}

/// Load the config, install logging and load every script under the
/// configured scripts directory.
pub fn init(config_path: impl AsRef<Path>) -> anyhow::Result<&'static luavm::LuaVMManager> {
    config::Config::initialize(config_path)?;
    logger::init_logger();

    // 设置 panic hook
    std::panic::set_hook(Box::new(panic_hook));

    let manager = luavm::LuaVMManager::instance();
    let scripts_dir = config::Config::global().scripts.dir.clone();
    let loaded = manager.auto_load_vms(&scripts_dir)?;
    log::info!("Loaded {} script(s) from '{}'", loaded.len(), scripts_dir);

    Ok(manager)
}
