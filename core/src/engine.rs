//! The simulation engine.
//!
//! EXECUTION ORDER (fixed, never reordered):
//!   0. Due commands (tickId <= current tick), in queue order
//!   1. Expansion system
//!   2. Food system
//!   3. Maintenance system
//!   4. Courier system
//!   5. Needs system
//!   6. Policy system
//!   7. Transit system
//!   8. Movement system
//!   9. Economy tick
//!
//! RULES:
//!   - Systems execute in registration order, every tick.
//!   - Once the game is over, ticks only advance the counter.
//!   - A tick always runs to completion; there is no cancellation.
//!   - Snapshots and entity details never mutate the World.

use log::{debug, info};

use crate::{
    command::{self, QueuedCommand},
    config::SimConfig,
    courier_system::CourierSystem,
    economy,
    error::SimResult,
    event::SimEvent,
    expansion_system::ExpansionSystem,
    food_system::FoodSystem,
    maintenance_system::MaintenanceSystem,
    map_gen::MapSize,
    movement_system::MovementSystem,
    needs_system::NeedsSystem,
    policy_system::PolicySystem,
    save::{self, SaveBlob},
    snapshot::{self, EntityDetails, Snapshot},
    system::SimSystem,
    transit_system::TransitSystem,
    types::{EntityId, Tick},
    world::World,
};

/// Receives a snapshot after every step batch and on init/load.
pub type SnapshotListener = Box<dyn FnMut(&Snapshot) + Send>;

pub struct SimEngine {
    config:   SimConfig,
    world:    World,
    pending:  Vec<QueuedCommand>,
    systems:  Vec<Box<dyn SimSystem>>,
    listener: Option<SnapshotListener>,
}

impl SimEngine {
    /// Engine holding the configured default world (seed 1, 24x24 unless
    /// the config says otherwise). Call `init` to start a real run.
    pub fn new(config: SimConfig) -> Self {
        let world = World::new_game(config.seed, config.map_size, &config);
        let mut engine = Self {
            config,
            world,
            pending: Vec::new(),
            systems: Vec::new(),
            listener: None,
        };

        engine.register(Box::new(ExpansionSystem::new()));
        engine.register(Box::new(FoodSystem::new()));
        engine.register(Box::new(MaintenanceSystem::new()));
        engine.register(Box::new(CourierSystem::new()));
        engine.register(Box::new(NeedsSystem::new()));
        engine.register(Box::new(PolicySystem::new()));
        engine.register(Box::new(TransitSystem::new()));
        engine.register(Box::new(MovementSystem::new()));
        engine
    }

    fn register(&mut self, system: Box<dyn SimSystem>) {
        self.systems.push(system);
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct World access for hosts and tests that stage scenarios.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn current_tick(&self) -> Tick {
        self.world.tick
    }

    pub fn pending_commands(&self) -> &[QueuedCommand] {
        &self.pending
    }

    /// Replace the World with a freshly generated one.
    pub fn init(&mut self, seed: u64, size: MapSize) -> SimResult<Vec<SimEvent>> {
        self.world = World::new_game(seed, size, &self.config);
        self.pending.clear();
        info!("World initialized: seed={seed} size={}x{}", size.width, size.height);
        self.emit_snapshot()?;
        Ok(vec![SimEvent::WorldInitialized { seed, width: size.width, height: size.height }])
    }

    /// Queue commands and keep the queue in total order. Equal keys keep
    /// their submission order.
    pub fn enqueue_commands(&mut self, commands: impl IntoIterator<Item = QueuedCommand>) {
        self.pending.extend(commands);
        self.pending.sort_by(command::queue_order);
    }

    /// Advance exactly one tick.
    pub fn tick(&mut self) -> Vec<SimEvent> {
        let mut events = Vec::new();
        self.apply_due_commands(&mut events);

        if !self.world.game_over {
            for system in &mut self.systems {
                let produced = system.update(&mut self.world);
                if !produced.is_empty() {
                    debug!("{} produced {} event(s) at tick {}", system.name(), produced.len(), self.world.tick);
                }
                events.extend(produced);
            }
            events.extend(economy::apply_economy_tick(&mut self.world));
        }

        self.world.tick += 1;
        events
    }

    fn apply_due_commands(&mut self, events: &mut Vec<SimEvent>) {
        let tick = self.world.tick;
        let due = self.pending.partition_point(|c| c.tick_id <= tick);
        for queued in self.pending.drain(..due) {
            if !command::apply_command(&mut self.world, &queued.command, events) {
                debug!("Command {} rejected at tick {tick}", queued.command.type_name());
            }
        }
    }

    /// Run whole ticks until the World reaches `until_tick`, then notify
    /// the snapshot listener once.
    pub fn step(&mut self, until_tick: Tick) -> SimResult<Vec<SimEvent>> {
        let mut events = Vec::new();
        while self.world.tick < until_tick {
            events.extend(self.tick());
        }
        self.emit_snapshot()?;
        Ok(events)
    }

    pub fn get_snapshot(&self) -> SimResult<Snapshot> {
        snapshot::create_snapshot(&self.world, self.config.snapshot_budget_bytes)
    }

    pub fn get_entity_details(&self, id: EntityId) -> Option<EntityDetails> {
        snapshot::entity_details(&self.world, id)
    }

    pub fn save(&self) -> SaveBlob {
        save::create_save_blob(&self.world)
    }

    /// Restore from `blob`. On error the current World is left untouched.
    pub fn load(&mut self, blob: SaveBlob) -> SimResult<Vec<SimEvent>> {
        let version = blob.version;
        self.world = save::restore(blob)?;
        self.pending.clear();
        self.emit_snapshot()?;
        Ok(vec![SimEvent::WorldRestored { seed: self.world.seed, tick: self.world.tick, version }])
    }

    /// Register the single snapshot listener, replacing any previous one.
    /// The listener receives the current state straight away.
    pub fn on_snapshot(&mut self, listener: SnapshotListener) -> SimResult<()> {
        self.listener = Some(listener);
        self.emit_snapshot()
    }

    fn emit_snapshot(&mut self) -> SimResult<()> {
        if self.listener.is_none() {
            return Ok(());
        }
        let snapshot = self.get_snapshot()?;
        if let Some(listener) = self.listener.as_mut() {
            listener(&snapshot);
        }
        Ok(())
    }
}

impl Default for SimEngine {
    fn default() -> Self {
        SimEngine::new(SimConfig::default())
    }
}
