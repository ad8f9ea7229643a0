//! Read-only projections of the World for external consumers.
//!
//! A `Snapshot` is a deep, display-oriented copy: building it never
//! mutates the World, and two worlds in the same state always produce
//! byte-identical snapshot JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    blueprint::BlueprintSet,
    components::{AgentKind, BuildingKind, DecisionLog, MaintenanceState, Needs},
    economy::EconomySummary,
    error::SimResult,
    map_gen::MapData,
    types::{EntityId, Money, Tick},
    world::World,
};

/// Below this a market reports that it needs a courier.
pub const MARKET_LOW_FOOD_NOTICE: i64 = 10;
/// Citizens above this hunger report "Needs food".
pub const HUNGRY_NOTICE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadRecord {
    pub id: EntityId,
    pub x:  i32,
    pub y:  i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingRecord {
    pub id:     EntityId,
    pub kind:   BuildingKind,
    pub x:      i32,
    pub y:      i32,
    pub upkeep: Money,
    pub food:   i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub id:            EntityId,
    pub kind:          AgentKind,
    pub x:             i32,
    pub y:             i32,
    pub hunger:        f64,
    pub happiness:     f64,
    pub last_decision: String,
    pub last_reason:   String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueRecord {
    pub id:    EntityId,
    pub x:     i32,
    pub y:     i32,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetrics {
    pub payload_bytes: usize,
    pub budget_bytes:  usize,
    pub over_budget:   bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub tick:                      Tick,
    pub seed:                      u64,
    pub money:                     Money,
    pub population:                usize,
    pub food_stock:                i64,
    pub avg_happiness:             f64,
    pub bankruptcy_ticks:          u64,
    pub bankruptcy_days_remaining: u64,
    pub game_over:                 bool,
    pub game_over_reason:          Option<String>,
    pub auto_expansion_enabled:    bool,
    pub economy:                   EconomySummary,
    pub blueprints:                BlueprintSet,
    pub snapshot_metrics:          SnapshotMetrics,
    pub map:                       MapData,
    pub roads:                     Vec<RoadRecord>,
    pub buildings:                 Vec<BuildingRecord>,
    pub agents:                    Vec<AgentRecord>,
    pub stop_queues:               Vec<QueueRecord>,
}

pub fn road_records(world: &World) -> Vec<RoadRecord> {
    let mut roads: Vec<RoadRecord> = world
        .ecs
        .road
        .keys()
        .filter_map(|id| world.position(*id).map(|p| RoadRecord { id: *id, x: p.x, y: p.y }))
        .collect();
    roads.sort_by_key(|r| (r.y, r.x, r.id));
    roads
}

pub fn building_records(world: &World) -> Vec<BuildingRecord> {
    world
        .ecs
        .building
        .iter()
        .filter_map(|(id, building)| {
            let pos = world.position(*id)?;
            Some(BuildingRecord {
                id:     *id,
                kind:   building.kind,
                x:      pos.x,
                y:      pos.y,
                upkeep: building.upkeep,
                food:   world.ecs.food(*id),
            })
        })
        .collect()
}

pub fn agent_records(world: &World) -> Vec<AgentRecord> {
    world
        .ecs
        .agent
        .iter()
        .filter_map(|(id, agent)| {
            let pos = world.position(*id)?;
            let needs = world
                .ecs
                .needs
                .get(id)
                .copied()
                .unwrap_or(Needs { hunger: 0.0, happiness: 1.0 });
            let log = world.ecs.decision_log.get(id).cloned().unwrap_or_default();
            Some(AgentRecord {
                id:            *id,
                kind:          agent.kind,
                x:             pos.x,
                y:             pos.y,
                hunger:        needs.hunger,
                happiness:     needs.happiness,
                last_decision: log.last_decision,
                last_reason:   log.last_reason,
            })
        })
        .collect()
}

fn queue_records(world: &World) -> Vec<QueueRecord> {
    world
        .ecs
        .queue
        .iter()
        .filter_map(|(id, queue)| {
            let kind = world.ecs.building_kind(*id)?;
            if !kind.has_queue() {
                return None;
            }
            let pos = world.position(*id)?;
            Some(QueueRecord { id: *id, x: pos.x, y: pos.y, count: queue.count })
        })
        .collect()
}

/// Project the World. Payload size is measured with the metrics zeroed
/// apart from the budget, then filled in.
pub fn create_snapshot(world: &World, budget_bytes: usize) -> SimResult<Snapshot> {
    let buildings = building_records(world);
    let agents = agent_records(world);

    let food_stock = buildings.iter().map(|b| b.food).sum();
    let citizens: Vec<&AgentRecord> = agents.iter().filter(|a| a.kind == AgentKind::Citizen).collect();
    let population = citizens.len();
    let avg_happiness = if population > 0 {
        citizens.iter().map(|a| a.happiness).sum::<f64>() / population as f64
    } else {
        1.0
    };

    let mut snapshot = Snapshot {
        tick: world.tick,
        seed: world.seed,
        money: world.money,
        population,
        food_stock,
        avg_happiness,
        bankruptcy_ticks: world.bankruptcy_ticks,
        bankruptcy_days_remaining: world.bankruptcy_days_remaining,
        game_over: world.game_over,
        game_over_reason: world.game_over_reason.clone(),
        auto_expansion_enabled: world.auto_expansion_enabled,
        economy: world.economy.clone(),
        blueprints: world.blueprints.clone(),
        snapshot_metrics: SnapshotMetrics { payload_bytes: 0, budget_bytes, over_budget: false },
        map: world.map.clone(),
        roads: road_records(world),
        buildings,
        agents,
        stop_queues: queue_records(world),
    };

    let payload_bytes = serde_json::to_vec(&snapshot)?.len();
    snapshot.snapshot_metrics.payload_bytes = payload_bytes;
    snapshot.snapshot_metrics.over_budget = payload_bytes > budget_bytes;
    Ok(snapshot)
}

// ── Entity details ────────────────────────────────────────────

/// Human-readable explanation of one building or agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDetails {
    pub entity_id: EntityId,
    pub label:     String,
    pub doing:     String,
    pub why:       String,
    pub needs:     Vec<String>,
    pub stats:     BTreeMap<String, Value>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn entity_details(world: &World, id: EntityId) -> Option<EntityDetails> {
    if let Some(building) = world.ecs.building.get(&id) {
        let pos = world.position(id);
        let food = world.ecs.food(id);
        let producing = building.kind == BuildingKind::FoodSource;
        let needs = if building.kind == BuildingKind::Market && food < MARKET_LOW_FOOD_NOTICE {
            "Needs courier delivery"
        } else {
            "Operating normally"
        };

        let stats = BTreeMap::from([
            ("x".to_string(), Value::from(pos.map(|p| p.x).unwrap_or(-1))),
            ("y".to_string(), Value::from(pos.map(|p| p.y).unwrap_or(-1))),
            ("upkeep".to_string(), Value::from(building.upkeep)),
            ("food".to_string(), Value::from(food)),
            ("queue".to_string(), Value::from(world.ecs.queue.get(&id).map(|q| q.count).unwrap_or(0))),
        ]);

        return Some(EntityDetails {
            entity_id: id,
            label:     format!("Building: {}", building.kind),
            doing:     if producing { "Producing food" } else { "Standing by" }.to_string(),
            why:       if producing {
                "Food production keeps inventory flowing."
            } else {
                "No building-specific task is active."
            }
            .to_string(),
            needs:     vec![needs.to_string()],
            stats,
        });
    }

    let kind = world.ecs.agent_kind(id)?;
    let pos = world.position(id)?;
    let log: &DecisionLog = world.ecs.decision_log.get(&id)?;
    let needs = world.ecs.needs.get(&id);
    let condition = world.ecs.condition.get(&id);
    let hunger = needs.map(|n| n.hunger).unwrap_or(0.0);

    let notes = match kind {
        AgentKind::Citizen if hunger > HUNGRY_NOTICE => "Needs food",
        AgentKind::Citizen => "Needs are stable",
        _ => "Following active policy cards",
    };

    let stats = BTreeMap::from([
        ("x".to_string(), Value::from(pos.x)),
        ("y".to_string(), Value::from(pos.y)),
        ("hunger".to_string(), Value::from(round2(hunger))),
        ("happiness".to_string(), Value::from(round2(needs.map(|n| n.happiness).unwrap_or(1.0)))),
        ("cargoFood".to_string(), Value::from(world.ecs.food(id))),
        ("wear".to_string(), Value::from(round2(condition.map(|c| c.wear).unwrap_or(0.0)))),
        (
            "maintenance".to_string(),
            Value::from(condition.map(|c| c.maintenance_state).unwrap_or(MaintenanceState::Operational).as_str()),
        ),
    ]);

    Some(EntityDetails {
        entity_id: id,
        label:     format!("Agent: {kind}"),
        doing:     log.last_decision.clone(),
        why:       log.last_reason.clone(),
        needs:     vec![notes.to_string()],
        stats,
    })
}
