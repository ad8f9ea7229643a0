//! Expansion system: the autonomous town planner.
//!
//! Execution: every EXPANSION_INTERVAL ticks (tick 0 included), only
//! while auto-expansion is enabled. Each cycle, in order:
//!   1. Place any missing essential building near the map center.
//!   2. Make sure two transit stops exist.
//!   3. Lay roads between key buildings, up to the per-cycle budget.
//!   4. Grow housing, citizens and couriers toward their targets.
//!
//! Every purchase must leave MIN_EXPANSION_RESERVE in the bank.

use log::debug;

use crate::{
    command::initial_food,
    components::{AgentKind, BuildingKind, Position},
    economy::{build_cost, record_expense, ROAD_BUILD_COST},
    event::SimEvent,
    pathfinder::walk_path,
    system::SimSystem,
    types::{Money, Tick},
    world::World,
};

pub const EXPANSION_INTERVAL: Tick = 160;
pub const MIN_EXPANSION_RESERVE: Money = 220;
pub const ROAD_BUDGET_PER_CYCLE: u32 = 10;
pub const POPULATION_PER_HOUSING: usize = 6;
pub const MIN_POPULATION_TARGET: usize = 8;
pub const MAX_POPULATION_TARGET: usize = 80;
pub const MAX_COURIER_TARGET: usize = 8;
pub const CITIZENS_PER_COURIER: usize = 8;
/// Below this total market stock an extra courier is wanted.
pub const MARKET_FOOD_SCARCITY: i64 = 18;
pub const CITIZEN_RECRUIT_COST: Money = 8;
pub const COURIER_PROCUREMENT_COST: Money = 90;

const ESSENTIALS: [BuildingKind; 5] = [
    BuildingKind::Market,
    BuildingKind::Housing,
    BuildingKind::Warehouse,
    BuildingKind::FoodSource,
    BuildingKind::Depot,
];
const ESSENTIAL_SEARCH_RADIUS: i32 = 10;
const STOP_SEARCH_RADIUS: i32 = 4;
const HOUSING_SEARCH_RADIUS: i32 = 8;
const SPAWN_SEARCH_RADIUS: i32 = 3;
const TARGET_STOP_COUNT: usize = 2;

pub struct ExpansionSystem;

impl ExpansionSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExpansionSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn can_afford(world: &World, cost: Money) -> bool {
    world.money >= cost + MIN_EXPANSION_RESERVE
}

/// First free tile on square rings of growing radius around `origin`.
/// Rings are scanned row by row, left to right.
fn find_free_tile_near(world: &World, origin: Position, max_radius: i32) -> Option<Position> {
    for radius in 0..=max_radius {
        let (min_x, max_x) = (origin.x - radius, origin.x + radius);
        let (min_y, max_y) = (origin.y - radius, origin.y + radius);
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let on_ring = radius == 0 || y == min_y || y == max_y || x == min_x || x == max_x;
                if on_ring && world.is_free_tile(Position::new(x, y)) {
                    return Some(Position::new(x, y));
                }
            }
        }
    }
    None
}

fn place_paid_building(world: &mut World, kind: BuildingKind, pos: Position, events: &mut Vec<SimEvent>) -> bool {
    let cost = build_cost(kind);
    if !can_afford(world, cost) || !world.is_free_tile(pos) {
        return false;
    }
    let entity_id = world.add_building(kind, pos, None, initial_food(kind));
    record_expense(world, cost);
    debug!("Expansion placed {kind} {entity_id} at {pos}");
    events.push(SimEvent::BuildingPlaced { entity_id, kind, x: pos.x, y: pos.y, cost });
    true
}

fn ensure_essentials(world: &mut World, events: &mut Vec<SimEvent>) {
    let center = world.map.center();
    for kind in ESSENTIALS {
        if !world.ecs.buildings_of_kind(kind).is_empty() {
            continue;
        }
        let Some(tile) = find_free_tile_near(world, center, ESSENTIAL_SEARCH_RADIUS) else { continue };
        if !place_paid_building(world, kind, tile, events) {
            return;
        }
    }
}

fn ensure_stops(world: &mut World, events: &mut Vec<SimEvent>) {
    if world.ecs.buildings_of_kind(BuildingKind::Stop).len() >= TARGET_STOP_COUNT {
        return;
    }
    let (Some(housing), Some(market)) = (
        world.first_building_position(BuildingKind::Housing),
        world.first_building_position(BuildingKind::Market),
    ) else {
        return;
    };

    for anchor in [housing, market] {
        if world.ecs.buildings_of_kind(BuildingKind::Stop).len() >= TARGET_STOP_COUNT {
            return;
        }
        let Some(tile) = find_free_tile_near(world, anchor, STOP_SEARCH_RADIUS) else { continue };
        if !place_paid_building(world, BuildingKind::Stop, tile, events) {
            return;
        }
    }
}

/// Neighbour of a building where a road should attach: an existing road
/// first (N, E, S, W), else the first free tile in the same order.
fn road_access_point(world: &World, origin: Position) -> Option<Position> {
    let neighbours = [
        origin.offset(0, -1),
        origin.offset(1, 0),
        origin.offset(0, 1),
        origin.offset(-1, 0),
    ];
    neighbours
        .iter()
        .copied()
        .find(|pos| world.is_passable(*pos) && world.road_at(*pos).is_some())
        .or_else(|| neighbours.iter().copied().find(|pos| world.is_free_tile(*pos)))
}

/// Lay road along a building-avoiding walk between two buildings.
/// Returns the road budget left.
fn connect(
    world: &mut World,
    budget: u32,
    from: Option<Position>,
    to: Option<Position>,
    events: &mut Vec<SimEvent>,
) -> u32 {
    let (Some(from), Some(to)) = (from, to) else { return budget };
    if budget == 0 {
        return budget;
    }
    let (Some(start), Some(goal)) = (road_access_point(world, from), road_access_point(world, to)) else {
        return budget;
    };

    let buildings = &world.building_by_tile;
    let Some(path) = walk_path(&world.map, start, goal, |pos| buildings.contains_key(&pos)) else {
        return budget;
    };
    if path.len() <= 1 {
        return budget;
    }

    let mut remaining = budget;
    let mut placed = false;
    for pos in path {
        if remaining == 0 {
            break;
        }
        if !world.is_free_tile(pos) {
            continue;
        }
        if !can_afford(world, ROAD_BUILD_COST) {
            break;
        }
        let entity_id = world.add_road(pos, None);
        record_expense(world, ROAD_BUILD_COST);
        events.push(SimEvent::RoadBuilt { entity_id, x: pos.x, y: pos.y, cost: ROAD_BUILD_COST });
        remaining -= 1;
        placed = true;
    }

    if placed {
        world.invalidate_paths();
    }
    remaining
}

fn spawn_tile(world: &World, anchor: Position) -> Position {
    find_free_tile_near(world, anchor, SPAWN_SEARCH_RADIUS).unwrap_or(anchor)
}

fn grow(world: &mut World, housing_count: usize, events: &mut Vec<SimEvent>) {
    let center = world.map.center();
    let market = world.first_building_position(BuildingKind::Market);
    let housing = world.first_building_position(BuildingKind::Housing);
    let warehouse = world.first_building_position(BuildingKind::Warehouse);
    let depot = world.first_building_position(BuildingKind::Depot);

    let citizens = world.ecs.agents_of_kind(AgentKind::Citizen).len();
    let couriers = world.ecs.agents_of_kind(AgentKind::CourierBot).len();
    let market_food: i64 = world
        .ecs
        .buildings_of_kind(BuildingKind::Market)
        .into_iter()
        .map(|id| world.ecs.food(id))
        .sum();

    let target_population = (housing_count * POPULATION_PER_HOUSING)
        .max(MIN_POPULATION_TARGET)
        .min(MAX_POPULATION_TARGET);
    let home_anchor = housing.or(market).unwrap_or(center);

    if citizens + 1 >= target_population && can_afford(world, build_cost(BuildingKind::Housing)) {
        if let Some(tile) = find_free_tile_near(world, home_anchor, HOUSING_SEARCH_RADIUS) {
            place_paid_building(world, BuildingKind::Housing, tile, events);
        }
    }

    if citizens < target_population && can_afford(world, CITIZEN_RECRUIT_COST) {
        let tile = spawn_tile(world, home_anchor);
        let entity_id = world.add_citizen(tile, None);
        record_expense(world, CITIZEN_RECRUIT_COST);
        events.push(SimEvent::AgentSpawned { entity_id, kind: AgentKind::Citizen, x: tile.x, y: tile.y });
    }

    let scarcity = if market_food < MARKET_FOOD_SCARCITY { 1 } else { 0 };
    let target_couriers = (citizens.div_ceil(CITIZENS_PER_COURIER) + scarcity)
        .max(1)
        .min(MAX_COURIER_TARGET);
    if couriers < target_couriers && can_afford(world, COURIER_PROCUREMENT_COST) {
        let anchor = depot.or(warehouse).or(market).unwrap_or(center);
        let tile = spawn_tile(world, anchor);
        let entity_id = world.add_courier(tile, None);
        record_expense(world, COURIER_PROCUREMENT_COST);
        debug!("Expansion procured courier {entity_id} at {tile}");
        events.push(SimEvent::AgentSpawned { entity_id, kind: AgentKind::CourierBot, x: tile.x, y: tile.y });
    }
}

impl SimSystem for ExpansionSystem {
    fn name(&self) -> &'static str {
        "expansion"
    }

    fn update(&mut self, world: &mut World) -> Vec<SimEvent> {
        let mut events = Vec::new();
        if !world.auto_expansion_enabled || !world.tick.is_multiple_of(EXPANSION_INTERVAL) {
            return events;
        }

        // Counted before this cycle places anything.
        let housing_count = world.ecs.buildings_of_kind(BuildingKind::Housing).len();

        ensure_essentials(world, &mut events);
        ensure_stops(world, &mut events);

        let market = world.first_building_position(BuildingKind::Market);
        let housing = world.first_building_position(BuildingKind::Housing);
        let warehouse = world.first_building_position(BuildingKind::Warehouse);
        let food_source = world.first_building_position(BuildingKind::FoodSource);
        let depot = world.first_building_position(BuildingKind::Depot);
        let stops: Vec<Position> = world
            .building_positions(BuildingKind::Stop)
            .into_iter()
            .map(|(_, pos)| pos)
            .collect();

        let mut budget = ROAD_BUDGET_PER_CYCLE;
        budget = connect(world, budget, housing, market, &mut events);
        budget = connect(world, budget, market, warehouse, &mut events);
        budget = connect(world, budget, warehouse, food_source, &mut events);
        budget = connect(world, budget, market, depot, &mut events);
        for stop in stops {
            budget = connect(world, budget, Some(stop), market, &mut events);
            if budget == 0 {
                break;
            }
        }

        grow(world, housing_count, &mut events);
        events
    }
}
