//! Policy system: the automation layer.
//!
//! Walks every Policy-bearing entity (ascending id) and each of its
//! policy ids (lexical order) and runs the matching handler. Spawns are
//! limited by a global per-tick budget.
//!
//! Runtime state per (entity, policy) survives across ticks and saves;
//! a missing entry means the policy has never been active.

use std::{fmt, str::FromStr};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    components::{DecisionTarget, PolicyId, Position},
    event::SimEvent,
    system::SimSystem,
    types::{EntityId, Tick},
    world::World,
};

/// New vehicles any policy may add in a single tick.
pub const SPAWN_BUDGET_PER_TICK: u32 = 1;
pub const HIGH_QUEUE_THRESHOLD: f64 = 15.0;
pub const LOW_QUEUE_RESET_THRESHOLD: f64 = 8.0;
pub const TRIGGER_TICKS: u64 = 1200;
pub const COOLDOWN_TICKS: Tick = 800;
pub const MAX_BUSES_PER_LINE: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyRuntimeKey {
    pub entity_id: EntityId,
    pub policy:    PolicyId,
}

impl PolicyRuntimeKey {
    pub fn new(entity_id: EntityId, policy: PolicyId) -> Self {
        Self { entity_id, policy }
    }
}

impl fmt::Display for PolicyRuntimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_id, self.policy)
    }
}

impl FromStr for PolicyRuntimeKey {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (id, policy) = raw
            .split_once(':')
            .ok_or_else(|| format!("policy runtime key {raw:?} has no ':'"))?;
        let entity_id = id
            .parse()
            .map_err(|e| format!("policy runtime key {raw:?}: bad entity id: {e}"))?;
        Ok(Self { entity_id, policy: PolicyId::from(policy) })
    }
}

impl Serialize for PolicyRuntimeKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PolicyRuntimeKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRuntimeState {
    pub active_ticks:        u64,
    pub cooldown_until_tick: Tick,
}

pub struct PolicySystem;

impl PolicySystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PolicySystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean queue over a line's stop tiles. Tiles without a building count as zero.
fn average_stop_queue(world: &World, stops: &[Position]) -> f64 {
    if stops.is_empty() {
        return 0.0;
    }
    let total: u32 = stops
        .iter()
        .filter_map(|pos| world.building_at(*pos))
        .filter_map(|id| world.ecs.queue.get(&id))
        .map(|q| q.count)
        .sum();
    total as f64 / stops.len() as f64
}

/// Accumulate sustained high queues on a line and add a minibus once
/// they have lasted long enough. Returns whether a vehicle was added.
fn auto_add_minibus(world: &mut World, line_id: EntityId, allow_spawn: bool, events: &mut Vec<SimEvent>) -> bool {
    let Some(line) = world.ecs.line.get(&line_id) else { return false };
    let Some(&first_stop) = line.stops.first() else { return false };
    let avg_queue = average_stop_queue(world, &line.stops);
    let assigned = line.assigned_vehicles.len();

    let key = PolicyRuntimeKey::new(line_id, PolicyId::LineAutoAddMinibusWhenQueueHigh);
    let mut runtime = world.policy_runtime.get(&key).copied().unwrap_or_default();

    if avg_queue >= HIGH_QUEUE_THRESHOLD {
        runtime.active_ticks += 1;
    } else if avg_queue <= LOW_QUEUE_RESET_THRESHOLD {
        runtime.active_ticks = 0;
    }

    let in_cooldown = world.tick < runtime.cooldown_until_tick;
    let spawned = allow_spawn
        && !in_cooldown
        && runtime.active_ticks >= TRIGGER_TICKS
        && assigned < MAX_BUSES_PER_LINE;

    if spawned {
        let vehicle = world.add_minibus(first_stop, Some(line_id), None);
        if let Some(line) = world.ecs.line.get_mut(&line_id) {
            line.assigned_vehicles.push(vehicle);
        }
        world.set_decision(
            vehicle,
            "assigned",
            "Line auto-scale policy added vehicle for sustained queues",
            DecisionTarget::Line(Some(line_id)),
        );
        runtime.active_ticks = 0;
        runtime.cooldown_until_tick = world.tick + COOLDOWN_TICKS;

        debug!("Line {line_id} auto-scaled: minibus {vehicle} added (avg queue {avg_queue:.1})");
        events.push(SimEvent::VehicleAutoScaled { line_id, vehicle_id: vehicle });
    }

    world.policy_runtime.insert(key, runtime);
    spawned
}

impl SimSystem for PolicySystem {
    fn name(&self) -> &'static str {
        "policy"
    }

    fn update(&mut self, world: &mut World) -> Vec<SimEvent> {
        let mut events = Vec::new();
        let mut budget = SPAWN_BUDGET_PER_TICK;

        let assignments: Vec<(EntityId, Vec<PolicyId>)> = world
            .ecs
            .policy
            .iter()
            .map(|(id, policy)| (*id, policy.policy_ids.iter().cloned().collect()))
            .collect();

        for (entity, policies) in assignments {
            for policy in policies {
                match policy {
                    PolicyId::LineAutoAddMinibusWhenQueueHigh => {
                        if auto_add_minibus(world, entity, budget > 0, &mut events) {
                            budget -= 1;
                        }
                    }
                    // Courier policies are read by the courier system itself.
                    PolicyId::DeliverMarketIfLow
                    | PolicyId::WarehouseSurplusToMarket
                    | PolicyId::ReturnToDepotWhenWorn
                    | PolicyId::Custom(_) => {}
                }
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_key_uses_id_colon_policy() {
        let key = PolicyRuntimeKey::new(42, PolicyId::LineAutoAddMinibusWhenQueueHigh);
        assert_eq!(key.to_string(), "42:line_auto_add_minibus_when_queue_high");

        let parsed: PolicyRuntimeKey = "42:line_auto_add_minibus_when_queue_high".parse().unwrap();
        assert_eq!(parsed, key);
        assert!("no-colon".parse::<PolicyRuntimeKey>().is_err());
    }
}
