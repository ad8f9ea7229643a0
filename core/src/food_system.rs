//! Food system: production, single-hop transfers, and market spoilage.
//!
//! Execution: production every 10 ticks, transfers every 15, spoilage
//! every 180. Transfers only move food between buildings joined by road.

use crate::{
    components::BuildingKind,
    event::SimEvent,
    system::SimSystem,
    types::{EntityId, Tick},
    world::World,
};

pub const PRODUCTION_INTERVAL: Tick = 10;
pub const TRANSFER_INTERVAL: Tick = 15;
pub const SPOILAGE_INTERVAL: Tick = 180;

pub const PRODUCTION_PER_CYCLE: i64 = 3;
pub const SOURCE_TO_WAREHOUSE_MAX: i64 = 6;
pub const SOURCE_TO_MARKET_MAX: i64 = 4;
pub const WAREHOUSE_TO_MARKET_MAX: i64 = 8;

/// Most food a building of `kind` can hold.
pub fn food_capacity(kind: BuildingKind) -> i64 {
    match kind {
        BuildingKind::Market     => 140,
        BuildingKind::Warehouse  => 260,
        BuildingKind::FoodSource => 360,
        BuildingKind::Housing | BuildingKind::Depot | BuildingKind::Stop => 0,
    }
}

pub struct FoodSystem;

impl FoodSystem {
    pub fn new() -> Self {
        Self
    }

    fn produce(world: &mut World) {
        let cap = food_capacity(BuildingKind::FoodSource);
        for id in world.ecs.buildings_of_kind(BuildingKind::FoodSource) {
            if let Some(inventory) = world.ecs.inventory.get_mut(&id) {
                inventory.food = (inventory.food + PRODUCTION_PER_CYCLE).min(cap);
            }
        }
    }

    fn run_transfers(world: &mut World) {
        let sources = world.ecs.buildings_of_kind(BuildingKind::FoodSource);
        let warehouses = world.ecs.buildings_of_kind(BuildingKind::Warehouse);
        let markets = world.ecs.buildings_of_kind(BuildingKind::Market);

        for source in sources {
            if world.ecs.food(source) <= 0 {
                continue;
            }
            if let Some(target) = pick_target(world, source, &warehouses) {
                transfer(world, source, target, SOURCE_TO_WAREHOUSE_MAX);
            } else if let Some(target) = pick_target(world, source, &markets) {
                transfer(world, source, target, SOURCE_TO_MARKET_MAX);
            }
        }

        for warehouse in warehouses {
            if world.ecs.food(warehouse) <= 0 {
                continue;
            }
            if let Some(target) = pick_target(world, warehouse, &markets) {
                transfer(world, warehouse, target, WAREHOUSE_TO_MARKET_MAX);
            }
        }
    }

    fn spoil(world: &mut World) {
        for id in world.ecs.buildings_of_kind(BuildingKind::Market) {
            if let Some(inventory) = world.ecs.inventory.get_mut(&id) {
                if inventory.food > 0 {
                    inventory.food -= 1;
                }
            }
        }
    }
}

impl Default for FoodSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowest stock first, then shortest road path, then lowest id.
/// Full or unreachable candidates are skipped.
fn pick_target(world: &mut World, from: EntityId, candidates: &[EntityId]) -> Option<EntityId> {
    let origin = world.position(from)?;
    let mut best: Option<(i64, usize, EntityId)> = None;

    for &candidate in candidates {
        if candidate == from {
            continue;
        }
        let Some(kind) = world.ecs.building_kind(candidate) else { continue };
        let Some(pos) = world.position(candidate) else { continue };
        if !world.ecs.inventory.contains_key(&candidate) {
            continue;
        }
        let food = world.ecs.food(candidate);
        if food >= food_capacity(kind) {
            continue;
        }
        let Some(path) = world.road_path(origin, pos) else { continue };
        if path.is_empty() {
            continue;
        }

        let key = (food, path.len(), candidate);
        if best.is_none_or(|b| key < b) {
            best = Some(key);
        }
    }

    best.map(|(_, _, id)| id)
}

fn transfer(world: &mut World, from: EntityId, to: EntityId, max_amount: i64) {
    let Some(kind) = world.ecs.building_kind(to) else { return };
    let available = world.ecs.food(from);
    let free_space = (food_capacity(kind) - world.ecs.food(to)).max(0);
    let moved = max_amount.min(available).min(free_space);
    if moved <= 0 {
        return;
    }

    if let Some(source) = world.ecs.inventory.get_mut(&from) {
        source.food -= moved;
    }
    if let Some(target) = world.ecs.inventory.get_mut(&to) {
        target.food += moved;
    }
}

impl SimSystem for FoodSystem {
    fn name(&self) -> &'static str {
        "food"
    }

    fn update(&mut self, world: &mut World) -> Vec<SimEvent> {
        if world.tick.is_multiple_of(PRODUCTION_INTERVAL) {
            Self::produce(world);
        }
        if world.tick.is_multiple_of(TRANSFER_INTERVAL) {
            Self::run_transfers(world);
        }
        if world.tick.is_multiple_of(SPOILAGE_INTERVAL) {
            Self::spoil(world);
        }
        Vec::new()
    }
}
