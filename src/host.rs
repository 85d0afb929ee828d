//! Capabilities the game host provides to the spawner.
//!
//! The host owns the map and every monster; the spawner only ever talks to
//! it through these traits. `None` from the adjacency queries is the normal
//! "no free tile" answer, while `Err` means the host itself failed.

use spawner_include::{MonsterId, MonsterKindId, Position};

use crate::error::Result;

pub trait TileSource {
    fn walkable_tiles(&self) -> Result<Vec<Position>>;

    /// Kinds valid on this map, in the order used for round-robin.
    fn monster_kinds(&self) -> Result<Vec<MonsterKindId>>;

    fn tier(&self) -> Result<u32>;
}

pub trait MonsterFactory {
    fn add_monster(&mut self, kind: MonsterKindId, pos: Position) -> Result<MonsterId>;
}

pub trait PositionQuery {
    fn random_adjacent_walkable_position(&mut self, pos: Position) -> Result<Option<Position>>;

    fn random_adjacent_position(&mut self, pos: Position, can_fly: bool)
    -> Result<Option<Position>>;
}

pub trait KindCatalog {
    fn can_fly(&self, kind: MonsterKindId) -> Result<bool>;
}

/// The monster a per-monster callback is about.
pub trait MonsterView {
    fn id(&self) -> Result<MonsterId>;

    fn position(&self) -> Result<Position>;
}

/// Everything seeding and spawning need from a map.
pub trait HostMap: TileSource + MonsterFactory + PositionQuery {}

impl<T> HostMap for T where T: TileSource + MonsterFactory + PositionQuery {}

/// Plain snapshot of a monster, for hosts that already hold the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonsterRef {
    pub id: MonsterId,
    pub position: Position,
}

impl MonsterRef {
    pub fn new(id: MonsterId, position: Position) -> Self {
        Self { id, position }
    }
}

impl MonsterView for MonsterRef {
    fn id(&self) -> Result<MonsterId> {
        Ok(self.id)
    }

    fn position(&self) -> Result<Position> {
        Ok(self.position)
    }
}
