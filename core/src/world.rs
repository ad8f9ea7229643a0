//! The World: every entity, its components, and the derived tile indices.
//!
//! RULES:
//!   - Entities are only created through the `add_*` constructors, which
//!     write every component the kind needs in one go.
//!   - The road and building tile indices are updated together with the
//!     component writes; at most one of each per tile.
//!   - Entities are never removed.

use std::collections::{BTreeMap, HashMap};

use crate::{
    blueprint::BlueprintSet,
    components::{
        Agent, AgentKind, Building, BuildingKind, Condition, DecisionLog, DecisionTarget,
        Footprint, Inventory, Line, MaintenanceState, Movement, Needs, Ownership, Policy,
        PolicyId, Position, Queue, Road, SystemAgent,
    },
    config::SimConfig,
    economy::{self, EconomySummary},
    ecs::Ecs,
    map_gen::{self, MapData, MapSize},
    pathfinder::PathCache,
    policy_system::{PolicyRuntimeKey, PolicyRuntimeState},
    types::{EntityId, Money, Tick},
};

pub const STARTER_FOOD: i64 = 20;
pub const STARTER_CITIZENS: i32 = 8;
pub const DEFAULT_LINE_FARE: Money = 4;
pub const DEFAULT_HEADWAY_TARGET: u32 = 80;

#[derive(Debug, Clone)]
pub struct World {
    pub seed:                      u64,
    pub tick:                      Tick,
    pub money:                     Money,
    pub bankruptcy_ticks:          u64,
    pub bankruptcy_days_remaining: u64,
    pub game_over:                 bool,
    pub game_over_reason:          Option<String>,
    pub auto_expansion_enabled:    bool,
    pub map:                       MapData,
    pub economy:                   EconomySummary,
    pub blueprints:                BlueprintSet,
    pub policy_runtime:            BTreeMap<PolicyRuntimeKey, PolicyRuntimeState>,
    pub ecs:                       Ecs,
    pub road_by_tile:              HashMap<Position, EntityId>,
    pub building_by_tile:          HashMap<Position, EntityId>,
    pub paths:                     PathCache,
    pub next_entity_id:            EntityId,
}

impl World {
    /// A world with terrain and nothing on it.
    pub fn empty(seed: u64, map: MapData, money: Money, blueprints: BlueprintSet) -> Self {
        Self {
            seed,
            tick: 0,
            money,
            bankruptcy_ticks: 0,
            bankruptcy_days_remaining: economy::days_remaining(0),
            game_over: false,
            game_over_reason: None,
            auto_expansion_enabled: true,
            map,
            economy: EconomySummary::default(),
            blueprints,
            policy_runtime: BTreeMap::new(),
            ecs: Ecs::default(),
            road_by_tile: HashMap::new(),
            building_by_tile: HashMap::new(),
            paths: PathCache::new(),
            next_entity_id: 1,
        }
    }

    /// Generate terrain and lay out the starter town around the map center.
    pub fn new_game(seed: u64, size: MapSize, config: &SimConfig) -> Self {
        let map = map_gen::generate(seed, size);
        let mut world = World::empty(seed, map, config.starting_money, config.blueprints.clone());
        world.auto_expansion_enabled = config.auto_expansion_enabled;
        world.seed_starter_town();
        world
    }

    fn seed_starter_town(&mut self) {
        let c = self.map.center();

        self.add_building(BuildingKind::Market, c, None, STARTER_FOOD);
        self.add_building(BuildingKind::Housing, c.offset(-4, 1), None, 0);
        self.add_building(BuildingKind::FoodSource, c.offset(4, -2), None, STARTER_FOOD);
        self.add_building(BuildingKind::Warehouse, c.offset(1, 3), None, STARTER_FOOD);
        self.add_building(BuildingKind::Depot, c.offset(-2, -3), None, 0);

        for x in (c.x - 4)..=(c.x + 1) {
            self.add_road(Position::new(x, c.y + 1), None);
        }
        for y in (c.y - 2)..=(c.y + 3) {
            self.add_road(Position::new(c.x + 1, y), None);
        }
        for x in (c.x + 1)..=(c.x + 4) {
            self.add_road(Position::new(x, c.y - 2), None);
        }
        for x in (c.x - 2)..=(c.x + 1) {
            self.add_road(Position::new(x, c.y - 3), None);
        }

        for i in 0..STARTER_CITIZENS {
            self.add_citizen(c.offset(-4 + i % 3, 1 + i / 3), None);
        }
        self.add_courier(c.offset(-2, -3), None);
    }

    // ── Entity registry ──────────────────────────────────────────

    fn register_entity(&mut self, explicit: Option<EntityId>) -> EntityId {
        let id = match explicit {
            Some(id) => {
                self.next_entity_id = self.next_entity_id.max(id + 1);
                id
            }
            None => {
                let id = self.next_entity_id;
                self.next_entity_id += 1;
                id
            }
        };
        self.ecs.entities.insert(id);
        id
    }

    pub fn add_road(&mut self, pos: Position, explicit: Option<EntityId>) -> EntityId {
        if let Some(&existing) = self.road_by_tile.get(&pos) {
            return existing;
        }
        self.map.make_passable(pos);
        let id = self.register_entity(explicit);
        self.ecs.position.insert(id, pos);
        self.ecs.road.insert(id, Road {});
        self.road_by_tile.insert(pos, id);
        id
    }

    pub fn add_building(
        &mut self,
        kind: BuildingKind,
        pos: Position,
        explicit: Option<EntityId>,
        food: i64,
    ) -> EntityId {
        if let Some(&existing) = self.building_by_tile.get(&pos) {
            return existing;
        }
        self.map.make_passable(pos);
        let id = self.register_entity(explicit);
        self.ecs.position.insert(id, pos);
        self.ecs.building.insert(id, Building {
            kind,
            footprint: Footprint::default(),
            upkeep: economy::upkeep(kind),
        });
        self.ecs.inventory.insert(id, Inventory { food, capacity: None });
        if kind.has_queue() {
            self.ecs.queue.insert(id, Queue::default());
        }
        self.building_by_tile.insert(pos, id);
        id
    }

    pub fn add_citizen(&mut self, pos: Position, explicit: Option<EntityId>) -> EntityId {
        let id = self.register_entity(explicit);
        self.ecs.position.insert(id, pos);
        self.ecs.agent.insert(id, Agent { kind: AgentKind::Citizen });
        self.ecs.needs.insert(id, Needs { hunger: 0.1, happiness: 0.9 });
        self.ecs.set_decision(
            id,
            DecisionLog::new("idle", "Starting in housing district", DecisionTarget::Housing),
        );
        id
    }

    pub fn add_courier(&mut self, pos: Position, explicit: Option<EntityId>) -> EntityId {
        let blueprint = self.blueprints.courier_bot.clone();
        let id = self.register_entity(explicit);
        self.ecs.position.insert(id, pos);
        self.ecs.agent.insert(id, Agent { kind: AgentKind::CourierBot });
        self.ecs.inventory.insert(id, Inventory {
            food: 0,
            capacity: Some(blueprint.capacity as i64),
        });
        self.ecs.movement.insert(id, Movement { speed: blueprint.speed, path: Default::default() });
        self.ecs.condition.insert(id, Condition {
            wear: 0.0,
            wear_rate: blueprint.wear_rate,
            maintenance_threshold: blueprint.maintenance_threshold,
            maintenance_state: MaintenanceState::Operational,
            assigned_depot_id: None,
        });
        self.ecs.policy.insert(id, Policy { policy_ids: blueprint.policy_ids.into_iter().collect() });
        self.ecs.set_decision(
            id,
            DecisionLog::new("standby", "Awaiting delivery signal", DecisionTarget::Depot),
        );
        id
    }

    pub fn add_minibus(
        &mut self,
        pos: Position,
        line: Option<EntityId>,
        explicit: Option<EntityId>,
    ) -> EntityId {
        let blueprint = self.blueprints.minibus.clone();
        let id = self.register_entity(explicit);
        self.ecs.position.insert(id, pos);
        self.ecs.agent.insert(id, Agent { kind: AgentKind::Minibus });
        self.ecs.movement.insert(id, Movement { speed: blueprint.speed, path: Default::default() });
        self.ecs.condition.insert(id, Condition {
            wear: 0.0,
            wear_rate: blueprint.wear_rate,
            maintenance_threshold: blueprint.maintenance_threshold,
            maintenance_state: MaintenanceState::Operational,
            assigned_depot_id: None,
        });
        self.ecs.queue.insert(id, Queue { count: 0, capacity: Some(blueprint.capacity) });
        self.ecs.policy.insert(id, Policy { policy_ids: blueprint.policy_ids.into_iter().collect() });
        self.ecs.set_decision(
            id,
            DecisionLog::new("standby", "Awaiting line assignment", DecisionTarget::Line(None)),
        );
        if let Some(line_id) = line {
            self.ecs.ownership.insert(id, Ownership { owner_entity_id: Some(line_id) });
        }
        id
    }

    pub fn add_line(&mut self, stops: Vec<Position>, fare: Money, explicit: Option<EntityId>) -> EntityId {
        let id = self.register_entity(explicit);
        self.ecs.line.insert(id, Line {
            stops,
            assigned_vehicles: Vec::new(),
            fare,
            headway_target: DEFAULT_HEADWAY_TARGET,
        });
        self.ecs.policy.insert(id, Policy {
            policy_ids: [PolicyId::LineAutoAddMinibusWhenQueueHigh].into_iter().collect(),
        });
        self.ecs.system_agent.insert(id, SystemAgent::default());
        id
    }

    /// Rebuild tile indices and the id counter from component data.
    pub fn reindex(&mut self) {
        self.road_by_tile.clear();
        self.building_by_tile.clear();
        for id in self.ecs.road.keys() {
            if let Some(pos) = self.ecs.position.get(id) {
                self.road_by_tile.insert(*pos, *id);
            }
        }
        for id in self.ecs.building.keys() {
            if let Some(pos) = self.ecs.position.get(id) {
                self.building_by_tile.insert(*pos, *id);
            }
        }
        self.next_entity_id = self.ecs.max_entity_id() + 1;
    }

    // ── Spatial queries ──────────────────────────────────────────

    pub fn road_at(&self, pos: Position) -> Option<EntityId> {
        self.road_by_tile.get(&pos).copied()
    }

    pub fn building_at(&self, pos: Position) -> Option<EntityId> {
        self.building_by_tile.get(&pos).copied()
    }

    pub fn is_passable(&self, pos: Position) -> bool {
        self.map.is_passable(pos)
    }

    /// Passable, and neither a road nor a building on the tile.
    pub fn is_free_tile(&self, pos: Position) -> bool {
        self.is_passable(pos) && self.road_at(pos).is_none() && self.building_at(pos).is_none()
    }

    pub fn position(&self, id: EntityId) -> Option<Position> {
        self.ecs.position.get(&id).copied()
    }

    /// Buildings of `kind` with their tiles, ascending by id.
    pub fn building_positions(&self, kind: BuildingKind) -> Vec<(EntityId, Position)> {
        self.ecs
            .buildings_of_kind(kind)
            .into_iter()
            .filter_map(|id| self.position(id).map(|pos| (id, pos)))
            .collect()
    }

    pub fn first_building_position(&self, kind: BuildingKind) -> Option<Position> {
        self.building_positions(kind).first().map(|(_, pos)| *pos)
    }

    pub fn set_decision(&mut self, id: EntityId, decision: &str, reason: impl Into<String>, target: DecisionTarget) {
        self.ecs.set_decision(id, DecisionLog::new(decision, reason, target));
    }

    // ── Paths ────────────────────────────────────────────────────

    /// Cached road path between two tiles, endpoints included.
    pub fn road_path(&mut self, start: Position, goal: Position) -> Option<Vec<Position>> {
        self.paths.get_or_find(&self.map, &self.road_by_tile, start, goal)
    }

    pub fn invalidate_paths(&mut self) {
        self.paths.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn starter() -> World {
        World::new_game(7, MapSize::new(24, 24), &SimConfig::default())
    }

    #[test]
    fn starter_town_has_every_essential_building() {
        let world = starter();
        for kind in [
            BuildingKind::Market,
            BuildingKind::Housing,
            BuildingKind::FoodSource,
            BuildingKind::Warehouse,
            BuildingKind::Depot,
        ] {
            assert_eq!(world.ecs.buildings_of_kind(kind).len(), 1, "missing {kind}");
        }
        assert_eq!(world.ecs.agents_of_kind(AgentKind::Citizen).len(), 8);
        assert_eq!(world.ecs.agents_of_kind(AgentKind::CourierBot).len(), 1);
        assert_eq!(world.money, 800);
        assert_eq!(world.first_building_position(BuildingKind::Market), Some(Position::new(12, 12)));
    }

    #[test]
    fn building_on_an_occupied_tile_returns_existing_entity() {
        let mut world = starter();
        let market_tile = Position::new(12, 12);
        let existing = world.building_at(market_tile).unwrap();
        let before = world.ecs.entities.len();

        let again = world.add_building(BuildingKind::Stop, market_tile, None, 0);

        assert_eq!(again, existing);
        assert_eq!(world.ecs.entities.len(), before);
        assert_eq!(world.ecs.building_kind(existing), Some(BuildingKind::Market));
    }

    #[test]
    fn explicit_ids_push_the_counter_forward() {
        let mut world = starter();
        world.add_road(Position::new(0, 0), Some(500));
        assert_eq!(world.next_entity_id, 501);
        let next = world.add_citizen(Position::new(1, 1), None);
        assert_eq!(next, 501);
    }

    #[test]
    fn starter_roads_link_market_row_to_warehouse_column() {
        let mut world = starter();
        let housing = Position::new(8, 13);
        let warehouse = Position::new(13, 15);
        let path = world.road_path(housing, warehouse).expect("starter roads connect");
        assert_eq!(path.first(), Some(&housing));
        assert_eq!(path.last(), Some(&warehouse));
    }
}
