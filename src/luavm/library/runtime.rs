use colored::{ColoredString, Colorize};
use mlua::prelude::*;

use crate::error::Error;

use super::LuaModule;

const VERSION_STR: &str = env!("CARGO_PKG_VERSION");

pub struct RuntimeModule;

impl LuaModule for RuntimeModule {
    fn register_library(lua: &mlua::Lua, registry: &mlua::Table) -> mlua::Result<()> {
        registry.set("print", lua.create_function(info)?)?;

        let log_table = lua.create_table()?;
        log_table.set("info", lua.create_function(info)?)?;
        log_table.set("warn", lua.create_function(warn)?)?;
        log_table.set("error", lua.create_function(error)?)?;
        log_table.set("debug", lua.create_function(debug)?)?;
        log_table.set("trace", lua.create_function(trace)?)?;

        registry.set("log", log_table)?;

        let core_table = registry
            .get::<Option<LuaTable>>("core")?
            .map_or_else(|| lua.create_table(), Ok)?;
        core_table.set(
            "version",
            lua.create_function(|_, ()| {
                let version = semver::Version::parse(VERSION_STR).map_err(|e| e.into_lua_err())?;
                Ok((version.major, version.minor, version.patch))
            })?,
        )?;
        core_table.set("require_version", lua.create_function(require_version)?)?;
        // per-turn callback, driven by LuaVMManager::invoke_fn("on_update")
        core_table.set(
            "on_update",
            lua.create_function(|lua, fun: LuaFunction| {
                lua.globals().set("_on_update", fun)?;
                Ok(())
            })?,
        )?;
        core_table.set(
            "on_destroy",
            lua.create_function(|lua, fun: LuaFunction| {
                lua.globals().set("_on_destroy", fun)?;
                Ok(())
            })?,
        )?;
        core_table.set(
            "get_last_error",
            lua.create_function(|lua, ()| {
                crate::error::get_last_error()
                    .map(|s| s.error.into_lua(lua))
                    .unwrap_or(Ok(LuaValue::Nil))
            })?,
        )?;

        registry.set("core", core_table)?;

        Ok(())
    }
}

impl RuntimeModule {
    pub fn invoke_on_destroy(lua: &Lua) -> LuaResult<()> {
        if let Ok(on_destroy) = lua.globals().get::<LuaFunction>("_on_destroy") {
            on_destroy.call::<()>(())?;
        }
        Ok(())
    }
}

fn format_args(lua: &Lua, args: mlua::Variadic<LuaValue>) -> LuaResult<Vec<String>> {
    let mut outs = vec![];

    for arg in args {
        let out = match arg {
            LuaValue::String(s) => s.to_string_lossy().to_string(),
            other => {
                let json_value: serde_json::Value = lua.from_value(other)?;
                serde_json::to_string(&json_value).map_err(LuaError::external)?
            }
        };
        outs.push(out);
    }

    Ok(outs)
}

fn get_name(lua: &Lua) -> String {
    lua.globals()
        .get::<String>("_name")
        .unwrap_or_else(|_| "Script".to_string())
}

fn get_prefix(lua: &Lua) -> ColoredString {
    format!("[{}]", get_name(lua)).white()
}

fn info(lua: &Lua, msgs: mlua::Variadic<LuaValue>) -> LuaResult<()> {
    let args = format_args(lua, msgs)?;
    log::info!("{} {}", get_prefix(lua), args.join(" "));
    Ok(())
}

fn warn(lua: &Lua, msgs: mlua::Variadic<LuaValue>) -> LuaResult<()> {
    let args = format_args(lua, msgs)?;
    log::warn!("{} {}", get_prefix(lua), args.join(" "));
    Ok(())
}

fn error(lua: &Lua, msgs: mlua::Variadic<LuaValue>) -> LuaResult<()> {
    let args = format_args(lua, msgs)?;
    log::error!("{} {}", get_prefix(lua), args.join(" "));
    Ok(())
}

fn debug(lua: &Lua, msgs: mlua::Variadic<LuaValue>) -> LuaResult<()> {
    let args = format_args(lua, msgs)?;
    log::debug!("{} {}", get_prefix(lua), args.join(" "));
    Ok(())
}

fn trace(lua: &Lua, msgs: mlua::Variadic<LuaValue>) -> LuaResult<()> {
    let args = format_args(lua, msgs)?;
    log::trace!("{} TRACE {}", get_prefix(lua), args.join(" "));
    Ok(())
}

fn require_version(_lua: &Lua, require_version: String) -> LuaResult<()> {
    let req = semver::VersionReq::parse(&require_version).map_err(|e| e.into_lua_err())?;
    let cur_version = semver::Version::parse(VERSION_STR).map_err(|e| e.into_lua_err())?;

    if !req.matches(&cur_version) {
        return Err(Error::VersionMismatch(VERSION_STR, require_version).into_lua_err());
    }

    Ok(())
}
