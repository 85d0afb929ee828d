use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use spawner_include::{MonsterId, MonsterKindId};

use crate::config::SpawnerConfig;

pub type SharedSession = Arc<Mutex<MapSession>>;

/// Per-monster spawner record. A monster with no record is unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnerState {
    /// No registry entry at spawn time; never spawns.
    Passive,
    Active {
        kind: MonsterKindId,
        tick_counter: u64,
    },
}

impl SpawnerState {
    pub fn assigned_kind(&self) -> Option<MonsterKindId> {
        match self {
            SpawnerState::Passive => None,
            SpawnerState::Active { kind, .. } => Some(*kind),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SpawnerState::Active { .. })
    }
}

/// State owned by one map session: the spawn assignment registry, the
/// per-monster spawner records and the seeding RNG.
#[derive(Debug)]
pub struct MapSession {
    registry: HashMap<MonsterId, MonsterKindId>,
    states: HashMap<MonsterId, SpawnerState>,
    rng: StdRng,
    config: SpawnerConfig,
}

impl MapSession {
    /// Session seeded from `config.seed`, or from the OS when unset.
    pub fn new(config: SpawnerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(config, rng)
    }

    pub fn with_seed(config: SpawnerConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SpawnerConfig, rng: StdRng) -> Self {
        Self {
            registry: HashMap::new(),
            states: HashMap::new(),
            rng,
            config,
        }
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &SpawnerConfig {
        &self.config
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Record the kind a freshly seeded spawner will produce.
    pub fn register(&mut self, id: MonsterId, kind: MonsterKindId) {
        if let Some(previous) = self.registry.insert(id, kind) {
            log::warn!(
                "Spawner {} re-registered: kind {} replaced by {}",
                id,
                previous,
                kind
            );
        }
    }

    pub fn assignment(&self, id: MonsterId) -> Option<MonsterKindId> {
        self.registry.get(&id).copied()
    }

    /// Number of registry entries.
    pub fn spawner_count(&self) -> usize {
        self.registry.len()
    }

    pub fn state(&self, id: MonsterId) -> Option<SpawnerState> {
        self.states.get(&id).copied()
    }

    pub(crate) fn state_mut(&mut self, id: MonsterId) -> Option<&mut SpawnerState> {
        self.states.get_mut(&id)
    }

    pub(crate) fn set_state(&mut self, id: MonsterId, state: SpawnerState) {
        self.states.insert(id, state);
    }

    /// Drop the per-monster record. Registry entries stay.
    pub fn forget(&mut self, id: MonsterId) -> Option<SpawnerState> {
        self.states.remove(&id)
    }

    /// Start over as if the map session had just begun.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.states.clear();
    }
}
