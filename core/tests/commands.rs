//! Command queue ordering and the command processor's preconditions.

use agentworks_core::{
    blueprint::{AgentBlueprint, BlueprintAgentKind, BlueprintSet},
    command::{QueuedCommand, SimCommand},
    components::{BuildingKind, Position},
    economy::{build_cost, ROAD_BUILD_COST},
    engine::SimEngine,
    event::SimEvent,
    map_gen::{MapData, TerrainKind, TerrainTile},
    types::Money,
    world::World,
};

fn grass_engine(money: Money) -> SimEngine {
    let tile = TerrainTile { terrain: TerrainKind::Grass, passable: true };
    let map = MapData { width: 12, height: 12, tiles: vec![tile; 144] };
    let mut world = World::empty(1, map, money, BlueprintSet::default());
    world.auto_expansion_enabled = false;

    let mut engine = SimEngine::default();
    *engine.world_mut() = world;
    engine
}

fn road(tick: u64, x: i32, y: i32) -> QueuedCommand {
    QueuedCommand::new(tick, SimCommand::BuildRoad { x, y })
}

fn building(tick: u64, kind: BuildingKind, x: i32, y: i32) -> QueuedCommand {
    QueuedCommand::new(tick, SimCommand::PlaceBuilding { kind, x, y })
}

#[test]
fn build_road_charges_and_reports() {
    let mut engine = grass_engine(100);
    engine.enqueue_commands([road(0, 3, 3)]);

    let events = engine.step(1).expect("step");

    let world = engine.world();
    let road_id = world.road_at(Position::new(3, 3)).expect("road placed");
    assert_eq!(world.money, 100 - ROAD_BUILD_COST);
    assert_eq!(world.economy.current_day_expense, ROAD_BUILD_COST);
    assert_eq!(events, vec![SimEvent::RoadBuilt { entity_id: road_id, x: 3, y: 3, cost: ROAD_BUILD_COST }]);
}

#[test]
fn rejected_commands_are_silent_no_ops() {
    let mut engine = grass_engine(4);
    {
        let world = engine.world_mut();
        if let Some(tile) = world.map.tile_mut(Position::new(6, 6)) {
            tile.terrain = TerrainKind::Water;
            tile.passable = false;
        }
    }
    engine.enqueue_commands([
        road(0, 1, 1),                                 // too poor
        road(0, 6, 6),                                 // water
        road(0, -1, 4),                                // out of bounds
        building(0, BuildingKind::Housing, 2, 2),      // too poor
    ]);

    let before = engine.world().ecs.clone();
    let events = engine.step(1).expect("step");

    assert!(events.is_empty());
    assert_eq!(engine.world().money, 4);
    assert_eq!(engine.world().ecs, before);
}

#[test]
fn occupied_tiles_refuse_construction() {
    let mut engine = grass_engine(1_000);
    engine.enqueue_commands([
        road(0, 4, 4),
        road(0, 4, 4),
        building(0, BuildingKind::Market, 4, 4),
        building(0, BuildingKind::Stop, 7, 7),
        road(1, 7, 7),
    ]);

    engine.step(2).expect("step");

    let world = engine.world();
    assert_eq!(world.ecs.road.len(), 1);
    assert_eq!(world.ecs.building.len(), 1);
    assert_eq!(world.money, 1_000 - ROAD_BUILD_COST - build_cost(BuildingKind::Stop));
}

#[test]
fn type_name_orders_commands_within_a_tick() {
    let mut engine = grass_engine(1_000);
    // Submitted building-first, but buildRoad sorts before placeBuilding.
    engine.enqueue_commands([building(0, BuildingKind::Depot, 5, 5), road(0, 5, 5)]);
    engine.step(1).expect("step");

    let world = engine.world();
    assert!(world.road_at(Position::new(5, 5)).is_some());
    assert!(world.building_at(Position::new(5, 5)).is_none());
}

#[test]
fn identical_keys_keep_submission_order() {
    let mut engine = grass_engine(1_000);
    engine.enqueue_commands([building(0, BuildingKind::Market, 2, 2)]);
    engine.enqueue_commands([building(0, BuildingKind::Housing, 2, 2)]);
    engine.step(1).expect("step");

    let world = engine.world();
    let id = world.building_at(Position::new(2, 2)).expect("placed");
    assert_eq!(world.ecs.building_kind(id), Some(BuildingKind::Market));
    assert_eq!(world.money, 1_000 - build_cost(BuildingKind::Market));
}

#[test]
fn future_commands_wait_for_their_tick() {
    let mut engine = grass_engine(100);
    engine.enqueue_commands([road(5, 1, 1)]);

    engine.step(5).expect("step");
    assert!(engine.world().road_at(Position::new(1, 1)).is_none());
    assert_eq!(engine.pending_commands().len(), 1);

    engine.step(6).expect("step");
    assert!(engine.world().road_at(Position::new(1, 1)).is_some());
    assert!(engine.pending_commands().is_empty());
}

#[test]
fn late_commands_apply_on_the_next_tick() {
    let mut engine = grass_engine(100);
    engine.step(10).expect("step");
    engine.enqueue_commands([road(2, 1, 1)]);

    engine.step(11).expect("step");
    assert!(engine.world().road_at(Position::new(1, 1)).is_some());
}

#[test]
fn placed_food_source_starts_stocked() {
    let mut engine = grass_engine(1_000);
    engine.enqueue_commands([building(0, BuildingKind::FoodSource, 3, 8)]);
    let events = engine.step(1).expect("step");

    let id = engine.world().building_at(Position::new(3, 8)).expect("placed");
    // Production also runs on tick 0.
    assert_eq!(engine.world().ecs.food(id), 23);
    assert!(matches!(
        events.as_slice(),
        [SimEvent::BuildingPlaced { kind: BuildingKind::FoodSource, cost: 100, .. }]
    ));
}

#[test]
fn set_blueprint_validates_before_replacing() {
    let mut engine = grass_engine(100);
    let bad = AgentBlueprint { speed: 9.0, ..AgentBlueprint::default_courier() };
    let good = AgentBlueprint { capacity: 35, ..AgentBlueprint::default_courier() };

    engine.enqueue_commands([QueuedCommand::new(0, SimCommand::SetBlueprint {
        kind:      BlueprintAgentKind::CourierBot,
        blueprint: bad,
    })]);
    engine.step(1).expect("step");
    assert_eq!(engine.world().blueprints, BlueprintSet::default());

    engine.enqueue_commands([QueuedCommand::new(1, SimCommand::SetBlueprint {
        kind:      BlueprintAgentKind::CourierBot,
        blueprint: good,
    })]);
    engine.step(2).expect("step");
    assert_eq!(engine.world().blueprints.courier_bot.capacity, 35);
    assert_eq!(engine.get_snapshot().expect("snapshot").blueprints.courier_bot.capacity, 35);
}

#[test]
fn set_auto_expansion_toggles_the_planner() {
    let mut engine = SimEngine::default();
    engine.enqueue_commands([QueuedCommand::new(0, SimCommand::SetAutoExpansion { enabled: false })]);
    engine.step(1).expect("step");

    assert!(!engine.world().auto_expansion_enabled);
    assert!(!engine.get_snapshot().expect("snapshot").auto_expansion_enabled);
}

#[test]
fn queued_commands_parse_from_host_json() {
    let json = r#"[
        {"tickId": 3, "type": "buildRoad", "x": 1, "y": 2},
        {"tickId": 0, "type": "placeBuilding", "kind": "stop", "x": 4, "y": 4},
        {"tickId": 1, "type": "setAutoExpansion", "enabled": false}
    ]"#;
    let commands: Vec<QueuedCommand> = serde_json::from_str(json).expect("parse");

    let mut engine = grass_engine(500);
    engine.enqueue_commands(commands);
    let order: Vec<u64> = engine.pending_commands().iter().map(|c| c.tick_id).collect();
    assert_eq!(order, vec![0, 1, 3]);
}
