//! Per-monster spawner behaviour.
//!
//! A monster resolves its spawner assignment exactly once, on its first
//! `on_spawn`. From then on it is either passive for good, or active and
//! produces one monster of its assigned kind every `spawn_interval` ticks.

use spawner_include::{MonsterId, MonsterKindId, Position};

use crate::error::Result;
use crate::host::{HostMap, KindCatalog, MonsterView};
use crate::session::{MapSession, SpawnerState};

/// Outcome of advancing a monster by one update tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Not a spawner; the host should run its default behaviour.
    Passive,
    /// Active spawner, nothing to do this tick.
    Wait,
    /// Active spawner, create one monster of this kind now.
    Spawn(MonsterKindId),
}

impl Tick {
    /// Whether the hook reports the update as handled.
    pub fn handled(&self) -> bool {
        !matches!(self, Tick::Passive)
    }
}

/// Resolve the spawner assignment of a freshly spawned monster.
///
/// Only the first call consults the registry; later calls return the
/// stored resolution.
///
/// Every monster that passes through here keeps a record, passive ones
/// included, until [`on_death`] drops it. Hosts that never report deaths
/// should call [`MapSession::forget`] or [`MapSession::clear`] when a
/// monster leaves the map or the map is torn down.
pub fn on_spawn(session: &mut MapSession, id: MonsterId) -> bool {
    if let Some(state) = session.state(id) {
        return state.is_active();
    }

    match session.assignment(id) {
        Some(kind) => {
            log::debug!("Monster {} is a spawner of kind {}", id, kind);
            session.set_state(
                id,
                SpawnerState::Active {
                    kind,
                    tick_counter: 1,
                },
            );
            true
        }
        None => {
            session.set_state(id, SpawnerState::Passive);
            false
        }
    }
}

/// Advance the tick counter of `id`. The counter is tested before it is
/// incremented, so with an interval of 3 the 3rd, 6th, ... ticks spawn.
pub fn tick(session: &mut MapSession, id: MonsterId) -> Tick {
    let interval = u64::from(session.config().spawn_interval.max(1));

    match session.state_mut(id) {
        Some(SpawnerState::Active { kind, tick_counter }) => {
            let fire = *tick_counter % interval == 0;
            *tick_counter += 1;
            if fire { Tick::Spawn(*kind) } else { Tick::Wait }
        }
        _ => Tick::Passive,
    }
}

/// Create a monster of `kind` on a random tile next to `position`.
///
/// `Ok(None)` when the host has no free adjacent tile; the spawn is simply
/// skipped for this tick.
pub fn spawn_near<M, C>(
    map: &mut M,
    catalog: &C,
    position: Position,
    kind: MonsterKindId,
    flight_aware: bool,
) -> Result<Option<MonsterId>>
where
    M: HostMap + ?Sized,
    C: KindCatalog + ?Sized,
{
    let target = if flight_aware {
        let can_fly = catalog.can_fly(kind)?;
        map.random_adjacent_position(position, can_fly)?
    } else {
        map.random_adjacent_walkable_position(position)?
    };

    let Some(target) = target else {
        log::debug!("No free tile around {}, spawn of kind {} skipped", position, kind);
        return Ok(None);
    };

    let id = map.add_monster(kind, target)?;
    log::trace!("Spawned monster {} of kind {} at {}", id, kind, target);
    Ok(Some(id))
}

/// Per-turn update hook. Returns `true` once the monster is an active
/// spawner, whether or not it spawned this tick.
pub fn on_update<V, M, C>(
    session: &mut MapSession,
    monster: &V,
    map: &mut M,
    catalog: &C,
) -> Result<bool>
where
    V: MonsterView + ?Sized,
    M: HostMap + ?Sized,
    C: KindCatalog + ?Sized,
{
    let id = monster.id()?;
    let outcome = tick(session, id);

    if let Tick::Spawn(kind) = outcome {
        let position = monster.position()?;
        spawn_near(map, catalog, position, kind, session.config().flight_aware)?;
    }

    Ok(outcome.handled())
}

/// Death hook. Drops the monster's record and reports whether it was an
/// active spawner.
pub fn on_death(session: &mut MapSession, id: MonsterId) -> bool {
    session
        .forget(id)
        .is_some_and(|state| state.is_active())
}
