//! A small in-memory map that implements every host capability.
//!
//! Hosts without their own map model can drive the spawner with it
//! directly; it also backs the crate's tests.

use std::collections::BTreeMap;

use bitflags::bitflags;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use spawner_include::{MonsterId, MonsterKindId, Position};

use crate::error::{Error, Result};
use crate::host::{KindCatalog, MonsterFactory, PositionQuery, TileSource};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TileFlags: u8 {
        const NONE     = 0;
        const WALKABLE = 0b0001;
        const FLYABLE  = 0b0010;
        const OCCUPIED = 0b0100;
    }
}

impl TileFlags {
    pub const FLOOR: TileFlags = TileFlags::WALKABLE.union(TileFlags::FLYABLE);
    pub const CHASM: TileFlags = TileFlags::FLYABLE;
    pub const WALL: TileFlags = TileFlags::NONE;

    fn from_glyph(glyph: char) -> TileFlags {
        match glyph {
            '.' => TileFlags::FLOOR,
            '~' => TileFlags::CHASM,
            _ => TileFlags::WALL,
        }
    }
}

/// Monster kinds known to a map, in catalog order.
#[derive(Debug, Clone, Default)]
pub struct KindTable {
    kinds: Vec<(MonsterKindId, bool)>,
}

impl KindTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, id: MonsterKindId, can_fly: bool) -> Self {
        self.insert(id, can_fly);
        self
    }

    pub fn insert(&mut self, id: MonsterKindId, can_fly: bool) {
        match self.kinds.iter_mut().find(|(kind, _)| *kind == id) {
            Some(entry) => entry.1 = can_fly,
            None => self.kinds.push((id, can_fly)),
        }
    }

    pub fn ids(&self) -> Vec<MonsterKindId> {
        self.kinds.iter().map(|(id, _)| *id).collect()
    }
}

impl KindCatalog for KindTable {
    /// Unknown kinds cannot fly.
    fn can_fly(&self, kind: MonsterKindId) -> Result<bool> {
        Ok(self
            .kinds
            .iter()
            .find(|(id, _)| *id == kind)
            .is_some_and(|(_, can_fly)| *can_fly))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridMonster {
    pub id: MonsterId,
    pub kind: MonsterKindId,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct GridMap {
    width: usize,
    height: usize,
    tiles: Vec<TileFlags>,
    monsters: BTreeMap<MonsterId, GridMonster>,
    next_id: MonsterId,
    tier: u32,
    kinds: KindTable,
    rng: StdRng,
}

impl GridMap {
    fn with_tiles(width: usize, height: usize, tiles: Vec<TileFlags>) -> Self {
        Self {
            width,
            height,
            tiles,
            monsters: BTreeMap::new(),
            next_id: 1,
            tier: 0,
            kinds: KindTable::new(),
            rng: StdRng::from_os_rng(),
        }
    }

    /// A map of floor tiles only.
    pub fn open(width: usize, height: usize) -> Self {
        Self::with_tiles(width, height, vec![TileFlags::FLOOR; width * height])
    }

    /// Build a map from ASCII art: `.` floor, `~` chasm, anything else wall.
    /// Blank lines and surrounding whitespace are ignored; short rows are
    /// padded with walls.
    pub fn from_ascii(art: &str) -> Self {
        let rows: Vec<&str> = art
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        let width = rows.iter().map(|row| row.chars().count()).max().unwrap_or(0);
        let height = rows.len();

        let mut tiles = vec![TileFlags::WALL; width * height];
        for (y, row) in rows.iter().enumerate() {
            for (x, glyph) in row.chars().enumerate() {
                tiles[y * width + x] = TileFlags::from_glyph(glyph);
            }
        }

        Self::with_tiles(width, height, tiles)
    }

    pub fn with_tier(mut self, tier: u32) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_kinds(mut self, kinds: KindTable) -> Self {
        self.kinds = kinds;
        self
    }

    /// Fix the RNG used for adjacency picks.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn kinds(&self) -> &KindTable {
        &self.kinds
    }

    pub fn tile(&self, pos: Position) -> Option<TileFlags> {
        self.index(pos).map(|i| self.tiles[i])
    }

    pub fn monster(&self, id: MonsterId) -> Option<&GridMonster> {
        self.monsters.get(&id)
    }

    pub fn monster_count(&self) -> usize {
        self.monsters.len()
    }

    pub fn monsters(&self) -> impl Iterator<Item = &GridMonster> {
        self.monsters.values()
    }

    pub fn monsters_of_kind(&self, kind: MonsterKindId) -> Vec<GridMonster> {
        self.monsters
            .values()
            .filter(|m| m.kind == kind)
            .copied()
            .collect()
    }

    pub fn remove_monster(&mut self, id: MonsterId) -> Option<GridMonster> {
        let monster = self.monsters.remove(&id)?;
        if let Some(i) = self.index(monster.position) {
            self.tiles[i].remove(TileFlags::OCCUPIED);
        }
        Some(monster)
    }

    fn index(&self, pos: Position) -> Option<usize> {
        pos.is_valid(self.width, self.height)
            .then(|| pos.y * self.width + pos.x)
    }

    fn random_adjacent(&mut self, pos: Position, allowed: TileFlags) -> Option<Position> {
        let candidates: Vec<Position> = pos
            .positions_around()
            .into_iter()
            .filter(|p| {
                self.tile(*p).is_some_and(|tile| {
                    tile.intersects(allowed) && !tile.contains(TileFlags::OCCUPIED)
                })
            })
            .collect();

        candidates.choose(&mut self.rng).copied()
    }
}

impl TileSource for GridMap {
    /// Walkable tiles nobody stands on.
    fn walkable_tiles(&self) -> Result<Vec<Position>> {
        let mut tiles = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let tile = self.tiles[y * self.width + x];
                if tile.contains(TileFlags::WALKABLE) && !tile.contains(TileFlags::OCCUPIED) {
                    tiles.push(Position::new(x, y));
                }
            }
        }
        Ok(tiles)
    }

    fn monster_kinds(&self) -> Result<Vec<MonsterKindId>> {
        Ok(self.kinds.ids())
    }

    fn tier(&self) -> Result<u32> {
        Ok(self.tier)
    }
}

impl MonsterFactory for GridMap {
    fn add_monster(&mut self, kind: MonsterKindId, pos: Position) -> Result<MonsterId> {
        let Some(i) = self.index(pos) else {
            return Err(Error::InvalidValue("position inside the map", pos.to_string()));
        };

        let id = self.next_id;
        self.next_id += 1;

        self.tiles[i].insert(TileFlags::OCCUPIED);
        self.monsters.insert(
            id,
            GridMonster {
                id,
                kind,
                position: pos,
            },
        );
        Ok(id)
    }
}

impl PositionQuery for GridMap {
    fn random_adjacent_walkable_position(&mut self, pos: Position) -> Result<Option<Position>> {
        Ok(self.random_adjacent(pos, TileFlags::WALKABLE))
    }

    fn random_adjacent_position(
        &mut self,
        pos: Position,
        can_fly: bool,
    ) -> Result<Option<Position>> {
        let allowed = if can_fly {
            TileFlags::WALKABLE | TileFlags::FLYABLE
        } else {
            TileFlags::WALKABLE
        };
        Ok(self.random_adjacent(pos, allowed))
    }
}

impl KindCatalog for GridMap {
    fn can_fly(&self, kind: MonsterKindId) -> Result<bool> {
        self.kinds.can_fly(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_layout() {
        let map = GridMap::from_ascii(
            "
            #.~
            ..
            ",
        );
        assert_eq!((map.width(), map.height()), (3, 2));
        assert_eq!(map.tile(Position::new(0, 0)), Some(TileFlags::WALL));
        assert_eq!(map.tile(Position::new(1, 0)), Some(TileFlags::FLOOR));
        assert_eq!(map.tile(Position::new(2, 0)), Some(TileFlags::CHASM));
        assert_eq!(map.tile(Position::new(2, 1)), Some(TileFlags::WALL));
        assert_eq!(map.tile(Position::new(3, 0)), None);

        assert_eq!(
            map.walkable_tiles().unwrap(),
            vec![Position::new(1, 0), Position::new(0, 1), Position::new(1, 1)]
        );
    }

    #[test]
    fn occupied_tiles_are_not_offered() {
        let mut map = GridMap::open(2, 1).with_seed(1);
        let id = map.add_monster(1, Position::new(0, 0)).unwrap();

        assert_eq!(map.walkable_tiles().unwrap(), vec![Position::new(1, 0)]);
        assert_eq!(
            map.random_adjacent_walkable_position(Position::new(1, 0)).unwrap(),
            None
        );

        map.remove_monster(id);
        assert_eq!(
            map.random_adjacent_walkable_position(Position::new(1, 0)).unwrap(),
            Some(Position::new(0, 0))
        );
    }

    #[test]
    fn add_monster_outside_fails() {
        let mut map = GridMap::open(2, 2);
        assert!(matches!(
            map.add_monster(1, Position::new(5, 5)),
            Err(Error::InvalidValue(..))
        ));
    }

    #[test]
    fn kind_table_keeps_catalog_order() {
        let kinds = KindTable::new()
            .with_kind(4, false)
            .with_kind(2, true)
            .with_kind(4, true);
        assert_eq!(kinds.ids(), vec![4, 2]);
        assert!(kinds.can_fly(4).unwrap());
        assert!(!kinds.can_fly(99).unwrap());
    }
}
