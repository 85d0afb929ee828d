//! `Spawner` library: the map-peek and per-monster hooks, backed by the
//! session stored in the Lua state's app data.
//!
//! The session lock is released before any call back into the engine.

use mlua::prelude::*;
use spawner_include::MonsterId;
use strum::IntoEnumIterator;

use crate::error::Result;
use crate::host::{MonsterView, TileSource};
use crate::luavm::library::LuaModule;
use crate::luavm::library::host::{HostObject, LuaKindCatalog};
use crate::seeder;
use crate::session::{SharedSession, SpawnerState};
use crate::spawner::{self, Tick};

/// Hooks a scripted engine looks up by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Hook {
    OnMapPeeked,
    OnSpawn,
    OnUpdate,
    OnDeath,
}

impl Hook {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

pub struct SpawnerModule;

impl LuaModule for SpawnerModule {
    fn register_library(lua: &Lua, registry: &LuaTable) -> mlua::Result<()> {
        let spawner_table = lua.create_table()?;

        spawner_table.set(
            Hook::OnMapPeeked.name(),
            lua.create_function(|lua, map: HostObject| {
                let session = SpawnerModule::session(lua)?;
                let created = SpawnerModule::map_peeked(&session, map)?;
                log::debug!("on_map_peeked created spawners {:?}", created);
                Ok(true)
            })?,
        )?;
        spawner_table.set(
            Hook::OnSpawn.name(),
            lua.create_function(|lua, monster: HostObject| {
                let session = SpawnerModule::session(lua)?;
                let id = monster.id()?;
                let active = spawner::on_spawn(&mut session.lock(), id);
                Ok(active)
            })?,
        )?;
        spawner_table.set(
            Hook::OnUpdate.name(),
            lua.create_function(
                |lua, (monster, _iteration): (HostObject, Option<LuaValue>)| {
                    let session = SpawnerModule::session(lua)?;
                    Ok(SpawnerModule::update(lua, &session, &monster)?)
                },
            )?,
        )?;
        spawner_table.set(
            Hook::OnDeath.name(),
            lua.create_function(|lua, monster: HostObject| {
                let session = SpawnerModule::session(lua)?;
                let id = monster.id()?;
                Ok(spawner::on_death(&mut session.lock(), id))
            })?,
        )?;

        spawner_table.set(
            "get_assignment",
            lua.create_function(|lua, id: MonsterId| {
                let session = SpawnerModule::session(lua)?;
                let kind = session.lock().assignment(id);
                Ok(kind)
            })?,
        )?;
        spawner_table.set(
            "get_state",
            lua.create_function(|lua, id: MonsterId| {
                let session = SpawnerModule::session(lua)?;
                let state = session.lock().state(id);
                let Some(state) = state else {
                    return Ok(LuaValue::Nil);
                };

                let table = lua.create_table()?;
                match state {
                    SpawnerState::Passive => {
                        table.set("active", false)?;
                    }
                    SpawnerState::Active { kind, tick_counter } => {
                        table.set("active", true)?;
                        table.set("kind", kind)?;
                        table.set("tick", tick_counter)?;
                    }
                }
                Ok(LuaValue::Table(table))
            })?,
        )?;
        spawner_table.set(
            "spawner_count",
            lua.create_function(|lua, ()| {
                let session = SpawnerModule::session(lua)?;
                let count = session.lock().spawner_count();
                Ok(count)
            })?,
        )?;
        spawner_table.set(
            "reset",
            lua.create_function(|lua, ()| {
                let session = SpawnerModule::session(lua)?;
                session.lock().clear();
                Ok(())
            })?,
        )?;
        spawner_table.set(
            "export_hooks",
            lua.create_function(|lua, ()| SpawnerModule::export_hooks(lua))?,
        )?;

        registry.set("Spawner", spawner_table)?;

        Ok(())
    }
}

impl SpawnerModule {
    /// The session installed in this Lua state.
    pub fn session(lua: &Lua) -> LuaResult<SharedSession> {
        lua.app_data_ref::<SharedSession>()
            .map(|session| session.clone())
            .ok_or_else(|| LuaError::runtime("no spawner session attached to this Lua state"))
    }

    /// Install `on_map_peeked`, `on_spawn`, `on_update` and `on_death` as
    /// globals.
    pub fn export_hooks(lua: &Lua) -> LuaResult<()> {
        let globals = lua.globals();
        let spawner_table: LuaTable = globals.get("Spawner")?;
        for hook in Hook::iter() {
            let fun: LuaFunction = spawner_table.get(hook.name())?;
            globals.set(hook.name(), fun)?;
        }
        Ok(())
    }

    fn map_peeked(session: &SharedSession, mut map: HostObject) -> Result<Vec<MonsterId>> {
        let tiles = map.walkable_tiles()?;
        let kinds = map.monster_kinds()?;
        let tier = map.tier()?;

        let (placements, config) = {
            let mut session = session.lock();
            let config = session.config().clone();
            let placements = seeder::plan(session.rng(), tiles, &kinds, tier, &config);
            (placements, config)
        };

        seeder::place(&mut map, config.spawner_kind, &placements, |id, kind| {
            session.lock().register(id, kind)
        })
    }

    fn update(lua: &Lua, session: &SharedSession, monster: &HostObject) -> Result<bool> {
        let id = monster.id()?;
        let (outcome, flight_aware) = {
            let mut session = session.lock();
            let flight_aware = session.config().flight_aware;
            (spawner::tick(&mut session, id), flight_aware)
        };

        if let Tick::Spawn(kind) = outcome {
            let position = monster.position()?;
            let mut map = HostObject::current_map(lua)?;
            let catalog = LuaKindCatalog::new(lua);
            spawner::spawn_near(&mut map, &catalog, position, kind, flight_aware)?;
        }

        Ok(outcome.handled())
    }
}
