//! Record of autonomous world changes.
//!
//! RULE: Events are emitted for things that happened, never for things
//! that were refused. A rejected command leaves no trace here.

use serde::{Deserialize, Serialize};

use crate::{
    components::{AgentKind, BuildingKind},
    types::{EntityId, Money, RunId, Tick},
};

/// Every event emitted during simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Engine events ──────────────────────────────
    WorldInitialized {
        seed:   u64,
        width:  i32,
        height: i32,
    },
    WorldRestored {
        seed:    u64,
        tick:    Tick,
        version: u32,
    },

    // ── Construction ───────────────────────────────
    RoadBuilt {
        entity_id: EntityId,
        x:         i32,
        y:         i32,
        cost:      Money,
    },
    BuildingPlaced {
        entity_id: EntityId,
        kind:      BuildingKind,
        x:         i32,
        y:         i32,
        cost:      Money,
    },
    AgentSpawned {
        entity_id: EntityId,
        kind:      AgentKind,
        x:         i32,
        y:         i32,
    },

    // ── Transit ────────────────────────────────────
    LineCreated {
        line_id: EntityId,
        stops:   usize,
    },
    VehicleAutoScaled {
        line_id:    EntityId,
        vehicle_id: EntityId,
    },

    // ── Maintenance ────────────────────────────────
    MaintenanceStarted {
        entity_id: EntityId,
        depot_id:  Option<EntityId>,
    },
    MaintenanceCompleted {
        entity_id: EntityId,
        depot_id:  EntityId,
    },

    // ── Economy ────────────────────────────────────
    DayClosed {
        day:         u64,
        income:      Money,
        expense:     Money,
        net:         Money,
        money_after: Money,
    },
    GameOver {
        tick:   Tick,
        reason: String,
    },
}

impl SimEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            SimEvent::WorldInitialized { .. }     => "world_initialized",
            SimEvent::WorldRestored { .. }        => "world_restored",
            SimEvent::RoadBuilt { .. }            => "road_built",
            SimEvent::BuildingPlaced { .. }       => "building_placed",
            SimEvent::AgentSpawned { .. }         => "agent_spawned",
            SimEvent::LineCreated { .. }          => "line_created",
            SimEvent::VehicleAutoScaled { .. }    => "vehicle_auto_scaled",
            SimEvent::MaintenanceStarted { .. }   => "maintenance_started",
            SimEvent::MaintenanceCompleted { .. } => "maintenance_completed",
            SimEvent::DayClosed { .. }            => "day_closed",
            SimEvent::GameOver { .. }             => "game_over",
        }
    }
}

/// A persisted event log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub run_id:     RunId,
    pub tick:       Tick,
    pub event_type: String,
    pub payload:    String, // JSON-serialized SimEvent
}

impl EventLogEntry {
    pub fn from_event(run_id: &str, tick: Tick, event: &SimEvent) -> serde_json::Result<Self> {
        Ok(Self {
            id:         None,
            run_id:     run_id.to_string(),
            tick,
            event_type: event.type_name().to_string(),
            payload:    serde_json::to_string(event)?,
        })
    }

    pub fn event(&self) -> serde_json::Result<SimEvent> {
        serde_json::from_str(&self.payload)
    }
}
