//! Host objects handed to the hooks by a Lua-scripted engine.
//!
//! Maps and monsters arrive as tables or userdata and are driven purely by
//! method calls, so any engine exposing the expected method names works.

use mlua::ObjectLike;
use mlua::prelude::*;
use spawner_include::{MonsterId, MonsterKindId, Position};

use crate::error::{Error, Result};
use crate::host::{KindCatalog, MonsterFactory, MonsterView, PositionQuery, TileSource};

#[derive(Debug, Clone)]
pub enum HostObject {
    Table(LuaTable),
    UserData(LuaAnyUserData),
}

impl FromLua for HostObject {
    fn from_lua(value: LuaValue, _lua: &Lua) -> LuaResult<Self> {
        match value {
            LuaValue::Table(t) => Ok(HostObject::Table(t)),
            LuaValue::UserData(ud) => Ok(HostObject::UserData(ud)),
            other => Err(LuaError::FromLuaConversionError {
                from: other.type_name(),
                to: "HostObject".to_string(),
                message: Some("expected a table or userdata".to_string()),
            }),
        }
    }
}

impl HostObject {
    /// Call `self:name(args)`.
    pub fn call_method<R>(&self, name: &str, args: impl IntoLuaMulti) -> Result<R>
    where
        R: FromLuaMulti,
    {
        if !self.has_method(name)? {
            return Err(Error::MissingHostMethod(name.to_string()));
        }

        let result = match self {
            HostObject::Table(t) => t.call_method(name, args),
            HostObject::UserData(ud) => ud.call_method(name, args),
        };
        Ok(result?)
    }

    pub fn has_method(&self, name: &str) -> Result<bool> {
        let value: LuaValue = match self {
            HostObject::Table(t) => t.get(name)?,
            HostObject::UserData(ud) => ud.get(name)?,
        };
        Ok(!value.is_nil())
    }

    /// The map returned by the engine's global `get_current_map()`.
    pub fn current_map(lua: &Lua) -> Result<HostObject> {
        let Some(get_current_map) = lua
            .globals()
            .get::<Option<LuaFunction>>("get_current_map")?
        else {
            return Err(Error::MissingHostFunction("get_current_map"));
        };

        Ok(get_current_map.call::<HostObject>(())?)
    }
}

/// An id given either as a number or as an object answering `get_id()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostId(pub u32);

impl FromLua for HostId {
    fn from_lua(value: LuaValue, lua: &Lua) -> LuaResult<Self> {
        match value {
            LuaValue::Integer(_) | LuaValue::Number(_) => Ok(HostId(u32::from_lua(value, lua)?)),
            LuaValue::Table(_) | LuaValue::UserData(_) => {
                let object = HostObject::from_lua(value, lua)?;
                Ok(HostId(object.call_method::<u32>("get_id", ())?))
            }
            other => Err(Error::InvalidValue("id or object with get_id", other.type_name().to_string())
                .into_lua_err()),
        }
    }
}

impl TileSource for HostObject {
    fn walkable_tiles(&self) -> Result<Vec<Position>> {
        self.call_method("get_walkable_tiles", ())
    }

    fn monster_kinds(&self) -> Result<Vec<MonsterKindId>> {
        let kinds: Vec<HostId> = self.call_method("get_monster_types", ())?;
        Ok(kinds.into_iter().map(|HostId(id)| id).collect())
    }

    fn tier(&self) -> Result<u32> {
        self.call_method("get_tier", ())
    }
}

impl MonsterFactory for HostObject {
    fn add_monster(&mut self, kind: MonsterKindId, pos: Position) -> Result<MonsterId> {
        let HostId(id) = self.call_method("add_monster", (kind, pos))?;
        Ok(id)
    }
}

impl PositionQuery for HostObject {
    fn random_adjacent_walkable_position(&mut self, pos: Position) -> Result<Option<Position>> {
        self.call_method("get_random_adjacent_walkable_position", pos)
    }

    fn random_adjacent_position(
        &mut self,
        pos: Position,
        can_fly: bool,
    ) -> Result<Option<Position>> {
        self.call_method("get_random_adjacent_position", (pos, can_fly))
    }
}

impl MonsterView for HostObject {
    fn id(&self) -> Result<MonsterId> {
        self.call_method("get_id", ())
    }

    fn position(&self) -> Result<Position> {
        self.call_method("get_position", ())
    }
}

/// Flight lookup through the engine's global `get_monster_kind_by_id`.
pub struct LuaKindCatalog<'a> {
    lua: &'a Lua,
}

impl<'a> LuaKindCatalog<'a> {
    pub fn new(lua: &'a Lua) -> Self {
        Self { lua }
    }
}

impl KindCatalog for LuaKindCatalog<'_> {
    /// Kinds the engine does not know are treated as walkers.
    fn can_fly(&self, kind: MonsterKindId) -> Result<bool> {
        let Some(lookup) = self
            .lua
            .globals()
            .get::<Option<LuaFunction>>("get_monster_kind_by_id")?
        else {
            log::debug!("get_monster_kind_by_id is not defined, kind {} walks", kind);
            return Ok(false);
        };

        match lookup.call::<Option<HostObject>>(kind)? {
            Some(monster_kind) => monster_kind.call_method("can_fly", ()),
            None => Ok(false),
        }
    }
}
