pub mod host;
pub mod runtime;
pub mod spawner;

pub trait LuaModule {
    fn register_library(lua: &mlua::Lua, registry: &mlua::Table) -> mlua::Result<()>;
}
