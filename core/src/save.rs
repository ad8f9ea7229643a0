//! Versioned save blobs: creation, migration and restore.
//!
//! Format history:
//!   v1  coarse road / building / agent arrays only
//!   v2  adds the serialized ECS
//!   v3  adds bankruptcy days remaining, game-over reason, economy summary,
//!       blueprint set and policy runtime
//!   v4  adds the auto-expansion flag
//!
//! Migration only ever fills fields that are absent.

use std::collections::{BTreeMap, BTreeSet};

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    blueprint::BlueprintSet,
    components::{
        Agent, AgentKind, Building, Condition, DecisionLog, DecisionTarget, Inventory, Line,
        MaintenanceState, Movement, Needs, Ownership, Policy, Position, Queue, Road, SystemAgent,
    },
    economy::{self, EconomySummary},
    ecs::Ecs,
    error::{SimError, SimResult},
    map_gen::MapData,
    policy_system::{PolicyRuntimeKey, PolicyRuntimeState},
    snapshot::{self, AgentRecord, BuildingRecord, RoadRecord},
    types::{EntityId, Money, Tick},
    world::World,
};

pub const CURRENT_SAVE_VERSION: u32 = 4;

/// Component map as an id-ordered list of `[entityId, value]` pairs.
pub type ComponentPairs<T> = Vec<(EntityId, T)>;

/// Condition as stored; older saves may lack everything but `wear`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRecord {
    #[serde(default)]
    pub wear:                  f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wear_rate:             Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_state:     Option<MaintenanceState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_depot_id:     Option<EntityId>,
}

impl From<&Condition> for ConditionRecord {
    fn from(c: &Condition) -> Self {
        Self {
            wear:                  c.wear,
            wear_rate:             Some(c.wear_rate),
            maintenance_threshold: Some(c.maintenance_threshold),
            maintenance_state:     Some(c.maintenance_state),
            assigned_depot_id:     c.assigned_depot_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SerializedEcs {
    pub entities:     Vec<EntityId>,
    pub position:     ComponentPairs<Position>,
    pub movement:     ComponentPairs<Movement>,
    pub inventory:    ComponentPairs<Inventory>,
    pub needs:        ComponentPairs<Needs>,
    pub building:     ComponentPairs<Building>,
    pub road:         ComponentPairs<Road>,
    pub agent_kind:   ComponentPairs<Agent>,
    pub policy:       ComponentPairs<Policy>,
    pub ownership:    ComponentPairs<Ownership>,
    pub line:         ComponentPairs<Line>,
    pub queue:        ComponentPairs<Queue>,
    pub condition:    ComponentPairs<ConditionRecord>,
    pub system_agent: ComponentPairs<SystemAgent>,
    pub decision_log: ComponentPairs<DecisionLog>,
}

fn pairs<T: Clone>(map: &BTreeMap<EntityId, T>) -> ComponentPairs<T> {
    map.iter().map(|(id, v)| (*id, v.clone())).collect()
}

fn unpair<T>(pairs: ComponentPairs<T>) -> BTreeMap<EntityId, T> {
    pairs.into_iter().collect()
}

impl SerializedEcs {
    pub fn capture(ecs: &Ecs) -> Self {
        Self {
            entities:     ecs.entities.iter().copied().collect(),
            position:     pairs(&ecs.position),
            movement:     pairs(&ecs.movement),
            inventory:    pairs(&ecs.inventory),
            needs:        pairs(&ecs.needs),
            building:     pairs(&ecs.building),
            road:         pairs(&ecs.road),
            agent_kind:   pairs(&ecs.agent),
            policy:       pairs(&ecs.policy),
            ownership:    pairs(&ecs.ownership),
            line:         pairs(&ecs.line),
            queue:        pairs(&ecs.queue),
            condition:    ecs.condition.iter().map(|(id, c)| (*id, ConditionRecord::from(c))).collect(),
            system_agent: pairs(&ecs.system_agent),
            decision_log: pairs(&ecs.decision_log),
        }
    }

    /// Rebuild component storage. Condition gaps are filled from the
    /// blueprint for the agent's kind.
    fn into_ecs(self, blueprints: &BlueprintSet) -> Ecs {
        let agent: BTreeMap<EntityId, Agent> = unpair(self.agent_kind);
        let condition = self
            .condition
            .into_iter()
            .map(|(id, record)| {
                let defaults = match agent.get(&id).map(|a| a.kind) {
                    Some(AgentKind::Minibus) => &blueprints.minibus,
                    _ => &blueprints.courier_bot,
                };
                let condition = Condition {
                    wear:                  record.wear,
                    wear_rate:             record.wear_rate.unwrap_or(defaults.wear_rate),
                    maintenance_threshold: record
                        .maintenance_threshold
                        .unwrap_or(defaults.maintenance_threshold),
                    maintenance_state:     record.maintenance_state.unwrap_or_default(),
                    assigned_depot_id:     record.assigned_depot_id,
                };
                (id, condition)
            })
            .collect();

        Ecs {
            entities: self.entities.into_iter().collect::<BTreeSet<_>>(),
            position: unpair(self.position),
            movement: unpair(self.movement),
            inventory: unpair(self.inventory),
            needs: unpair(self.needs),
            building: unpair(self.building),
            road: unpair(self.road),
            agent,
            policy: unpair(self.policy),
            ownership: unpair(self.ownership),
            line: unpair(self.line),
            queue: unpair(self.queue),
            condition,
            system_agent: unpair(self.system_agent),
            decision_log: unpair(self.decision_log),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveBlob {
    pub version:                   u32,
    pub seed:                      u64,
    pub tick:                      Tick,
    pub money:                     Money,
    #[serde(default)]
    pub bankruptcy_ticks:          u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bankruptcy_days_remaining: Option<u64>,
    #[serde(default)]
    pub game_over:                 bool,
    #[serde(default)]
    pub game_over_reason:          Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub economy:                   Option<EconomySummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprints:                Option<BlueprintSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_runtime:            Option<Vec<(PolicyRuntimeKey, PolicyRuntimeState)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_expansion_enabled:    Option<bool>,
    pub map:                       MapData,
    #[serde(default)]
    pub roads:                     Vec<RoadRecord>,
    #[serde(default)]
    pub buildings:                 Vec<BuildingRecord>,
    #[serde(default)]
    pub agents:                    Vec<AgentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecs:                       Option<SerializedEcs>,
}

impl SaveBlob {
    /// Parse and migrate. Any shape error is a load failure.
    pub fn from_json(raw: &str) -> SimResult<SaveBlob> {
        let blob: SaveBlob = serde_json::from_str(raw)?;
        migrate(blob)
    }

    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

pub fn create_save_blob(world: &World) -> SaveBlob {
    let mut policy_runtime: Vec<(PolicyRuntimeKey, PolicyRuntimeState)> = world
        .policy_runtime
        .iter()
        .map(|(key, state)| (key.clone(), *state))
        .collect();
    policy_runtime.sort_by_cached_key(|(key, _)| key.to_string());

    SaveBlob {
        version: CURRENT_SAVE_VERSION,
        seed: world.seed,
        tick: world.tick,
        money: world.money,
        bankruptcy_ticks: world.bankruptcy_ticks,
        bankruptcy_days_remaining: Some(world.bankruptcy_days_remaining),
        game_over: world.game_over,
        game_over_reason: world.game_over_reason.clone(),
        economy: Some(world.economy.clone()),
        blueprints: Some(world.blueprints.clone()),
        policy_runtime: Some(policy_runtime),
        auto_expansion_enabled: Some(world.auto_expansion_enabled),
        map: world.map.clone(),
        roads: snapshot::road_records(world),
        buildings: snapshot::building_records(world),
        agents: snapshot::agent_records(world),
        ecs: Some(SerializedEcs::capture(&world.ecs)),
    }
}

// ── Migration ─────────────────────────────────────────────────

/// Upgrade `blob` to `CURRENT_SAVE_VERSION`, one version at a time.
pub fn migrate(mut blob: SaveBlob) -> SimResult<SaveBlob> {
    if blob.version > CURRENT_SAVE_VERSION {
        return Err(SimError::UnsupportedSaveVersion {
            found:     blob.version,
            supported: CURRENT_SAVE_VERSION,
        });
    }

    while blob.version < CURRENT_SAVE_VERSION {
        blob = match blob.version {
            0 | 1 => SaveBlob { version: 2, ..blob },
            2 => migrate_v2_to_v3(blob),
            _ => migrate_v3_to_v4(blob),
        };
    }
    Ok(blob)
}

fn migrate_v2_to_v3(blob: SaveBlob) -> SaveBlob {
    let days = blob
        .bankruptcy_days_remaining
        .unwrap_or_else(|| economy::days_remaining(blob.bankruptcy_ticks));
    SaveBlob {
        version: 3,
        bankruptcy_days_remaining: Some(days),
        economy: Some(blob.economy.unwrap_or_default()),
        blueprints: Some(blob.blueprints.unwrap_or_default()),
        policy_runtime: Some(blob.policy_runtime.unwrap_or_default()),
        ..blob
    }
}

fn migrate_v3_to_v4(blob: SaveBlob) -> SaveBlob {
    SaveBlob {
        version: 4,
        auto_expansion_enabled: Some(blob.auto_expansion_enabled.unwrap_or(true)),
        ..blob
    }
}

// ── Restore ───────────────────────────────────────────────────

/// Migrate, validate and rebuild a World.
pub fn restore(blob: SaveBlob) -> SimResult<World> {
    let blob = migrate(blob)?;

    if !blob.map.is_well_formed() {
        return Err(SimError::InvalidSave {
            reason: format!(
                "map has {} tiles, expected {}x{}",
                blob.map.tiles.len(),
                blob.map.width,
                blob.map.height
            ),
        });
    }
    let blueprints = blob.blueprints.clone().unwrap_or_default();
    blueprints.validate()?;

    let mut world = World::empty(blob.seed, blob.map.clone(), blob.money, blueprints);
    world.tick = blob.tick;
    world.bankruptcy_ticks = blob.bankruptcy_ticks;
    world.bankruptcy_days_remaining = blob
        .bankruptcy_days_remaining
        .unwrap_or_else(|| economy::days_remaining(blob.bankruptcy_ticks));
    world.game_over = blob.game_over;
    world.game_over_reason = blob.game_over_reason.clone();
    world.auto_expansion_enabled = blob.auto_expansion_enabled.unwrap_or(true);
    world.economy = blob.economy.clone().unwrap_or_default();
    world.policy_runtime = blob.policy_runtime.clone().unwrap_or_default().into_iter().collect();

    match blob.ecs {
        Some(ecs) => {
            world.ecs = ecs.into_ecs(&world.blueprints);
            world.reindex();
        }
        None => restore_legacy(&mut world, &blob.roads, &blob.buildings, &blob.agents),
    }

    info!(
        "restored save v{} seed={} tick={} entities={}",
        blob.version,
        world.seed,
        world.tick,
        world.ecs.entities.len()
    );
    Ok(world)
}

/// Rebuild entities from the coarse arrays with the live constructors.
fn restore_legacy(
    world: &mut World,
    roads: &[RoadRecord],
    buildings: &[BuildingRecord],
    agents: &[AgentRecord],
) {
    for road in roads {
        world.add_road(Position::new(road.x, road.y), Some(road.id));
    }
    for b in buildings {
        world.add_building(b.kind, Position::new(b.x, b.y), Some(b.id), b.food);
    }
    for a in agents {
        let pos = Position::new(a.x, a.y);
        let (id, target) = match a.kind {
            AgentKind::Citizen => {
                let id = world.add_citizen(pos, Some(a.id));
                world.ecs.needs.insert(id, Needs { hunger: a.hunger, happiness: a.happiness });
                (id, DecisionTarget::Unknown)
            }
            AgentKind::Minibus => (world.add_minibus(pos, None, Some(a.id)), DecisionTarget::LineUnknown),
            AgentKind::CourierBot => (world.add_courier(pos, Some(a.id)), DecisionTarget::Unknown),
        };
        world.ecs.set_decision(id, DecisionLog {
            last_decision: a.last_decision.clone(),
            last_reason:   a.last_reason.clone(),
            last_target:   target,
        });
    }
    world.reindex();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SimConfig, map_gen::MapSize};

    #[test]
    fn newer_versions_are_refused() {
        let world = World::new_game(3, MapSize::new(12, 12), &SimConfig::default());
        let mut blob = create_save_blob(&world);
        blob.version = CURRENT_SAVE_VERSION + 1;
        assert!(matches!(
            restore(blob),
            Err(SimError::UnsupportedSaveVersion { found: 5, supported: 4 })
        ));
    }

    #[test]
    fn condition_gaps_fill_from_blueprints() {
        let json = r#"{"wear":0.4}"#;
        let record: ConditionRecord = serde_json::from_str(json).unwrap();
        let ecs = SerializedEcs {
            entities: vec![9],
            agent_kind: vec![(9, Agent { kind: AgentKind::Minibus })],
            condition: vec![(9, record)],
            ..Default::default()
        };
        let blueprints = BlueprintSet::default();
        let restored = ecs.into_ecs(&blueprints);
        let c = &restored.condition[&9];
        assert_eq!(c.wear, 0.4);
        assert_eq!(c.wear_rate, blueprints.minibus.wear_rate);
        assert_eq!(c.maintenance_state, MaintenanceState::Operational);
    }
}
