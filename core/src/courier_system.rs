//! Courier system: pick up food by policy and deliver it to the
//! lowest-stock market.
//!
//! Execution: every tick. A courier with a planned route advances one
//! waypoint every COURIER_MOVE_INTERVAL ticks and does nothing else;
//! decisions are only made while it stands still.

use crate::{
    components::{AgentKind, BuildingKind, DecisionLog, DecisionTarget, PolicyId, Position},
    event::SimEvent,
    system::SimSystem,
    types::{EntityId, Tick},
    world::World,
};

pub const COURIER_MOVE_INTERVAL: Tick = 3;
/// Used when a courier's inventory carries no capacity of its own.
pub const DEFAULT_COURIER_CAPACITY: i64 = 20;
/// A market below this stock counts as low.
pub const MARKET_LOW_THRESHOLD: i64 = 20;
/// A warehouse above this stock counts as surplus.
pub const WAREHOUSE_SURPLUS_THRESHOLD: i64 = 50;

pub struct CourierSystem;

impl CourierSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CourierSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// The market with the least food; lowest id on ties.
fn neediest_market(world: &World) -> Option<EntityId> {
    let mut chosen: Option<(i64, EntityId)> = None;
    for id in world.ecs.buildings_of_kind(BuildingKind::Market) {
        let food = world.ecs.food(id);
        if chosen.is_none_or(|(best, _)| food < best) {
            chosen = Some((food, id));
        }
    }
    chosen.map(|(_, id)| id)
}

fn pickup_source(world: &World, courier: EntityId) -> Option<EntityId> {
    let policy = world.ecs.policy.get(&courier)?;
    let prefers_surplus = policy.has(&PolicyId::WarehouseSurplusToMarket);
    let waits_for_low_market = policy.has(&PolicyId::DeliverMarketIfLow);

    let warehouses = world.ecs.buildings_of_kind(BuildingKind::Warehouse);
    let market_low = world
        .ecs
        .buildings_of_kind(BuildingKind::Market)
        .into_iter()
        .any(|id| world.ecs.food(id) < MARKET_LOW_THRESHOLD);

    if !market_low && !prefers_surplus {
        return None;
    }

    if prefers_surplus {
        let surplus = warehouses
            .iter()
            .copied()
            .find(|id| world.ecs.food(*id) > WAREHOUSE_SURPLUS_THRESHOLD);
        if surplus.is_some() {
            return surplus;
        }
    }

    if !market_low && waits_for_low_market {
        return None;
    }

    warehouses
        .into_iter()
        .chain(world.ecs.buildings_of_kind(BuildingKind::FoodSource))
        .find(|id| world.ecs.food(*id) > 0)
}

/// Plan a road route toward `goal`; log travel or blocked either way.
fn head_toward(
    world: &mut World,
    courier: EntityId,
    from: Position,
    goal: Position,
    target: EntityId,
    travel_reason: &str,
    blocked_reason: &str,
) {
    let log = match world.road_path(from, goal) {
        Some(path) if path.len() > 1 => {
            if let Some(movement) = world.ecs.movement.get_mut(&courier) {
                movement.path = path.into_iter().skip(1).collect();
            }
            DecisionLog::new("travel", travel_reason, DecisionTarget::Building(target))
        }
        _ => DecisionLog::new("blocked", blocked_reason, DecisionTarget::Building(target)),
    };
    world.ecs.set_decision(courier, log);
}

fn run_courier(world: &mut World, courier: EntityId) {
    let Some(position) = world.position(courier) else { return };
    let Some(condition) = world.ecs.condition.get(&courier) else { return };
    if !condition.is_operational() {
        return;
    }
    if !world.ecs.inventory.contains_key(&courier) || !world.ecs.decision_log.contains_key(&courier) {
        return;
    }
    let Some(movement) = world.ecs.movement.get(&courier) else { return };

    if !movement.path.is_empty() {
        advance(world, courier);
        return;
    }

    let market = neediest_market(world);
    let cargo = world.ecs.food(courier);

    if cargo > 0 {
        let Some(market) = market else {
            world.set_decision(courier, "hold", "No market target available", DecisionTarget::None);
            return;
        };
        let Some(market_pos) = world.position(market) else { return };
        if !world.ecs.inventory.contains_key(&market) {
            return;
        }

        if position == market_pos {
            if let Some(stock) = world.ecs.inventory.get_mut(&market) {
                stock.food += cargo;
            }
            if let Some(hold) = world.ecs.inventory.get_mut(&courier) {
                hold.food = 0;
            }
            world.set_decision(
                courier,
                "deliverFood",
                format!("Delivered {cargo} food to market"),
                DecisionTarget::Building(market),
            );
            return;
        }

        head_toward(
            world,
            courier,
            position,
            market_pos,
            market,
            "Heading to market for dropoff",
            "No road path to market",
        );
        return;
    }

    let Some(source) = pickup_source(world, courier) else {
        world.set_decision(courier, "standby", "Policy found no pickup source", DecisionTarget::None);
        return;
    };
    let Some(source_pos) = world.position(source) else { return };
    if !world.ecs.inventory.contains_key(&source) {
        return;
    }

    if position == source_pos {
        let available = world.ecs.food(source);
        if available <= 0 {
            world.set_decision(courier, "wait", "Pickup source is empty", DecisionTarget::Building(source));
            return;
        }

        let capacity = world
            .ecs
            .inventory
            .get(&courier)
            .and_then(|inv| inv.capacity)
            .unwrap_or(DEFAULT_COURIER_CAPACITY);
        let amount = capacity.min(available);
        if let Some(stock) = world.ecs.inventory.get_mut(&source) {
            stock.food -= amount;
        }
        if let Some(hold) = world.ecs.inventory.get_mut(&courier) {
            hold.food += amount;
        }
        world.set_decision(
            courier,
            "pickupFood",
            format!("Picked up {amount} food for market"),
            DecisionTarget::Building(source),
        );
        return;
    }

    head_toward(
        world,
        courier,
        position,
        source_pos,
        source,
        "Heading to pickup source",
        "No road path to pickup source",
    );
}

/// One waypoint per cadence tick, with wear per waypoint.
fn advance(world: &mut World, courier: EntityId) {
    if !world.tick.is_multiple_of(COURIER_MOVE_INTERVAL) {
        return;
    }

    let Some(movement) = world.ecs.movement.get_mut(&courier) else { return };
    let next = movement.path.pop_front();
    let arrived = movement.path.is_empty();

    if let Some(next) = next {
        world.ecs.position.insert(courier, next);
        if let Some(condition) = world.ecs.condition.get_mut(&courier) {
            condition.accrue_wear();
        }
    }

    if arrived {
        if let Some(log) = world.ecs.decision_log.get_mut(&courier) {
            log.last_decision = "arrive".to_string();
            log.last_reason = "Reached logistic waypoint".to_string();
        }
    }
}

impl SimSystem for CourierSystem {
    fn name(&self) -> &'static str {
        "courier"
    }

    fn update(&mut self, world: &mut World) -> Vec<SimEvent> {
        for courier in world.ecs.agents_of_kind(AgentKind::CourierBot) {
            run_courier(world, courier);
        }
        Vec::new()
    }
}
