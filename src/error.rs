use std::sync::LazyLock;

use parking_lot::Mutex;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("IO Error: {0}, cause: {1}")]
    IoWithContext(std::io::Error, String),
    #[error("Lua Error: {0}")]
    Lua(#[from] mlua::Error),
    #[error("Config Error: {0}")]
    Config(#[from] crate::config::Error),

    #[error("Lua VM not found")]
    LuaVMNotFound,
    #[error("Invalid argument: expected {0}, got {1}")]
    InvalidValue(&'static str, String),
    #[error("Framework version mismatch: current {0}, required {1}")]
    VersionMismatch(&'static str, String),
    #[error("Host object has no method '{0}'")]
    MissingHostMethod(String),
    #[error("Host function '{0}' is not defined")]
    MissingHostFunction(&'static str),
}

#[derive(Debug, Clone)]
pub struct LastError {
    pub error: String,
    pub time: chrono::DateTime<chrono::Local>,
}

static LAST_ERROR: LazyLock<Mutex<Option<LastError>>> = LazyLock::new(|| Mutex::new(None));

/// Remember the latest script failure so scripts and tools can query it.
pub fn set_last_error(error: String) {
    LAST_ERROR.lock().replace(LastError {
        error,
        time: chrono::Local::now(),
    });
}

pub fn get_last_error() -> Option<LastError> {
    LAST_ERROR.lock().clone()
}

pub fn clear_last_error() {
    LAST_ERROR.lock().take();
}

impl From<Error> for mlua::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Lua(e) => e,
            other => mlua::Error::external(other),
        }
    }
}
