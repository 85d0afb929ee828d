//! Places spawner monsters when a map is first peeked.

use rand::Rng;
use rand::seq::SliceRandom;
use spawner_include::{MonsterId, MonsterKindId, Position};

use crate::config::SpawnerConfig;
use crate::error::Result;
use crate::host::HostMap;
use crate::session::MapSession;

/// One spawner to create: where it stands and what it will produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub position: Position,
    pub kind: MonsterKindId,
}

/// Number of spawners a map of `tier` gets, capped by the tiles available.
pub fn spawner_count(tier: u32, available_tiles: usize, config: &SpawnerConfig) -> usize {
    let wanted = tier.max(config.min_spawners) as usize;
    if wanted > available_tiles {
        log::warn!(
            "Map tier {} wants {} spawners but only {} walkable tiles exist",
            tier,
            wanted,
            available_tiles
        );
    }
    wanted.min(available_tiles)
}

/// Pick distinct tiles and assign kinds round-robin over `kinds`.
pub fn plan<R: Rng + ?Sized>(
    rng: &mut R,
    mut tiles: Vec<Position>,
    kinds: &[MonsterKindId],
    tier: u32,
    config: &SpawnerConfig,
) -> Vec<Placement> {
    if kinds.is_empty() {
        log::warn!("Map has no monster kinds, no spawners placed");
        return Vec::new();
    }

    tiles.shuffle(rng);
    let count = spawner_count(tier, tiles.len(), config);

    tiles
        .into_iter()
        .take(count)
        .enumerate()
        .map(|(i, position)| Placement {
            position,
            kind: kinds[i % kinds.len()],
        })
        .collect()
}

/// Ask the host to create a spawner for every placement, handing each new
/// id and its assigned kind to `register`.
pub fn place<M, F>(
    map: &mut M,
    spawner_kind: MonsterKindId,
    placements: &[Placement],
    mut register: F,
) -> Result<Vec<MonsterId>>
where
    M: HostMap + ?Sized,
    F: FnMut(MonsterId, MonsterKindId),
{
    let mut created = Vec::with_capacity(placements.len());
    for placement in placements {
        let id = map.add_monster(spawner_kind, placement.position)?;
        register(id, placement.kind);
        log::debug!(
            "Spawner {} placed at {} producing kind {}",
            id,
            placement.position,
            placement.kind
        );
        created.push(id);
    }

    log::info!("Seeded {} spawners", created.len());
    Ok(created)
}

/// Seed `map` with spawners and record their assignments in `session`.
///
/// Returns the ids of the spawners the host created, in placement order.
pub fn seed<M>(session: &mut MapSession, map: &mut M) -> Result<Vec<MonsterId>>
where
    M: HostMap + ?Sized,
{
    let tiles = map.walkable_tiles()?;
    let kinds = map.monster_kinds()?;
    let tier = map.tier()?;

    let config = session.config().clone();
    let placements = plan(session.rng(), tiles, &kinds, tier, &config);

    place(map, config.spawner_kind, &placements, |id, kind| {
        session.register(id, kind)
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::grid::{GridMap, KindTable};

    const GOBLIN: MonsterKindId = 7;
    const ORC: MonsterKindId = 9;

    fn tiles(n: usize) -> Vec<Position> {
        (0..n).map(|x| Position::new(x, 0)).collect()
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(3);
        let config = SpawnerConfig {
            min_spawners: 50,
            ..SpawnerConfig::default()
        };
        let placements = plan(&mut rng, tiles(50), &[GOBLIN], 0, &config);

        let mut xs: Vec<usize> = placements.iter().map(|p| p.position.x).collect();
        xs.sort();
        assert_eq!(xs, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn shuffle_handles_tiny_inputs() {
        let mut rng = StdRng::seed_from_u64(3);
        let config = SpawnerConfig::default();
        assert!(plan(&mut rng, Vec::new(), &[GOBLIN], 2, &config).is_empty());

        let single = plan(&mut rng, tiles(1), &[GOBLIN], 2, &config);
        assert_eq!(
            single,
            vec![Placement {
                position: Position::new(0, 0),
                kind: GOBLIN
            }]
        );
    }

    #[test]
    fn tier_three_round_robins_two_kinds() {
        let mut rng = StdRng::seed_from_u64(11);
        let config = SpawnerConfig::default();
        let placements = plan(&mut rng, tiles(10), &[GOBLIN, ORC], 3, &config);

        let kinds: Vec<_> = placements.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![GOBLIN, ORC, GOBLIN]);

        let distinct: HashSet<_> = placements.iter().map(|p| p.position).collect();
        assert_eq!(distinct.len(), 3);
    }

    #[test]
    fn low_tier_still_gets_minimum() {
        let mut rng = StdRng::seed_from_u64(11);
        let config = SpawnerConfig::default();
        assert_eq!(plan(&mut rng, tiles(10), &[GOBLIN], 0, &config).len(), 2);
        assert_eq!(plan(&mut rng, tiles(10), &[GOBLIN], 1, &config).len(), 2);
        assert_eq!(plan(&mut rng, tiles(10), &[GOBLIN], 6, &config).len(), 6);
    }

    #[test]
    fn count_is_capped_by_walkable_tiles() {
        let mut rng = StdRng::seed_from_u64(5);
        let config = SpawnerConfig::default();
        let placements = plan(&mut rng, tiles(3), &[GOBLIN, ORC], 8, &config);
        assert_eq!(placements.len(), 3);

        let distinct: HashSet<_> = placements.iter().map(|p| p.position).collect();
        assert_eq!(distinct.len(), 3);

        assert!(plan(&mut rng, Vec::new(), &[GOBLIN], 4, &config).is_empty());
    }

    #[test]
    fn empty_catalog_places_nothing() {
        let mut rng = StdRng::seed_from_u64(5);
        let config = SpawnerConfig::default();
        assert!(plan(&mut rng, tiles(10), &[], 3, &config).is_empty());
    }

    #[test]
    fn seed_registers_every_created_spawner() {
        let kinds = KindTable::new()
            .with_kind(GOBLIN, false)
            .with_kind(ORC, true);
        let mut map = GridMap::from_ascii(
            "
            .....
            .###.
            .....
            ",
        )
        .with_tier(3)
        .with_kinds(kinds);

        let mut session = MapSession::with_seed(SpawnerConfig::default(), 42);
        let ids = seed(&mut session, &mut map).unwrap();

        assert_eq!(ids.len(), 3);
        assert_eq!(session.spawner_count(), 3);
        let assigned: Vec<_> = ids.iter().map(|id| session.assignment(*id)).collect();
        assert_eq!(assigned, vec![Some(GOBLIN), Some(ORC), Some(GOBLIN)]);

        let positions: HashSet<_> = ids
            .iter()
            .map(|id| map.monster(*id).unwrap().position)
            .collect();
        assert_eq!(positions.len(), 3);
        for id in &ids {
            assert_eq!(map.monster(*id).unwrap().kind, SpawnerConfig::default().spawner_kind);
        }
    }

    #[test]
    fn same_seed_gives_same_layout() {
        let layout = |rng_seed: u64| {
            let mut map = GridMap::open(6, 6)
                .with_tier(4)
                .with_kinds(KindTable::new().with_kind(GOBLIN, false));
            let mut session = MapSession::with_seed(SpawnerConfig::default(), rng_seed);
            let ids = seed(&mut session, &mut map).unwrap();
            ids.iter()
                .map(|id| map.monster(*id).unwrap().position)
                .collect::<Vec<_>>()
        };

        assert_eq!(layout(99), layout(99));
    }
}
