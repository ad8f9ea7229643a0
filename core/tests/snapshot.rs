use agentworks_core::{
    components::{AgentKind, BuildingKind},
    config::SimConfig,
    engine::SimEngine,
    map_gen::MapSize,
    snapshot::{self, create_snapshot},
};
use serde_json::Value;

fn running_engine(ticks: u64) -> SimEngine {
    let mut engine = SimEngine::default();
    engine.init(31, MapSize::new(20, 20)).expect("init");
    engine.step(ticks).expect("step");
    engine
}

#[test]
fn snapshot_lists_are_sorted_and_reading_is_pure() {
    let engine = running_engine(120);
    let first = engine.get_snapshot().expect("snapshot");
    let second = engine.get_snapshot().expect("snapshot");

    assert_eq!(first, second);
    assert!(first.roads.windows(2).all(|w| (w[0].y, w[0].x, w[0].id) <= (w[1].y, w[1].x, w[1].id)));
    assert!(first.buildings.windows(2).all(|w| w[0].id < w[1].id));
    assert!(first.agents.windows(2).all(|w| w[0].id < w[1].id));
    assert_eq!(first.tick, 120);
    assert_eq!(first.population, first.agents.iter().filter(|a| a.kind == AgentKind::Citizen).count());
}

#[test]
fn metrics_report_payload_size_against_the_budget() {
    let engine = running_engine(5);
    let roomy = engine.get_snapshot().expect("snapshot");
    let tight = create_snapshot(engine.world(), 10).expect("snapshot");

    assert!(roomy.snapshot_metrics.payload_bytes > 10);
    assert!(!roomy.snapshot_metrics.over_budget);
    assert_eq!(roomy.snapshot_metrics.budget_bytes, SimConfig::default().snapshot_budget_bytes);
    assert!(tight.snapshot_metrics.over_budget);
    assert_eq!(tight.snapshot_metrics.payload_bytes, roomy.snapshot_metrics.payload_bytes);
}

#[test]
fn snapshot_json_uses_camel_case_keys() {
    let engine = running_engine(1);
    let value = serde_json::to_value(engine.get_snapshot().expect("snapshot")).expect("json");

    for key in ["foodStock", "avgHappiness", "bankruptcyDaysRemaining", "snapshotMetrics", "stopQueues"] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
}

#[test]
fn market_details_describe_stock() {
    let engine = running_engine(1);
    let market = snapshot::building_records(engine.world())
        .into_iter()
        .find(|b| b.kind == BuildingKind::Market)
        .expect("starter market");

    let details = engine.get_entity_details(market.id).expect("details");

    assert_eq!(details.label, "Building: market");
    assert_eq!(details.doing, "Standing by");
    assert_eq!(details.stats["x"], Value::from(market.x));
    assert_eq!(details.stats["food"], Value::from(market.food));
    let expected = if market.food < 10 { "Needs courier delivery" } else { "Operating normally" };
    assert_eq!(details.needs, vec![expected.to_string()]);
}

#[test]
fn citizen_details_round_their_needs() {
    let mut engine = running_engine(1);
    let citizen = engine.world().ecs.agents_of_kind(AgentKind::Citizen)[0];
    if let Some(needs) = engine.world_mut().ecs.needs.get_mut(&citizen) {
        needs.hunger = 0.8349;
    }

    let details = engine.get_entity_details(citizen).expect("details");

    assert_eq!(details.label, "Agent: citizen");
    assert_eq!(details.needs, vec!["Needs food".to_string()]);
    assert_eq!(details.stats["hunger"], Value::from(0.83));
    assert!(engine.get_entity_details(999_999).is_none());
}

#[test]
fn town_without_citizens_is_fully_happy() {
    let mut engine = running_engine(0);
    let world = engine.world_mut();
    for citizen in world.ecs.agents_of_kind(AgentKind::Citizen) {
        world.ecs.needs.remove(&citizen);
        world.ecs.agent.remove(&citizen);
    }

    let snap = engine.get_snapshot().expect("snapshot");

    assert_eq!(snap.population, 0);
    assert_eq!(snap.avg_happiness, 1.0);
}
