//! Sparse component storage.
//!
//! One ordered map per component type, keyed by entity id. Ordered maps
//! give id-ascending iteration everywhere, which every system relies on
//! for deterministic results.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    components::{
        Agent, AgentKind, Building, BuildingKind, Condition, DecisionLog, Inventory, Line,
        Movement, Needs, Ownership, Policy, Position, Queue, Road, SystemAgent,
    },
    types::EntityId,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ecs {
    pub entities:     BTreeSet<EntityId>,
    pub position:     BTreeMap<EntityId, Position>,
    pub movement:     BTreeMap<EntityId, Movement>,
    pub inventory:    BTreeMap<EntityId, Inventory>,
    pub needs:        BTreeMap<EntityId, Needs>,
    pub building:     BTreeMap<EntityId, Building>,
    pub road:         BTreeMap<EntityId, Road>,
    pub agent:        BTreeMap<EntityId, Agent>,
    pub policy:       BTreeMap<EntityId, Policy>,
    pub ownership:    BTreeMap<EntityId, Ownership>,
    pub line:         BTreeMap<EntityId, Line>,
    pub queue:        BTreeMap<EntityId, Queue>,
    pub condition:    BTreeMap<EntityId, Condition>,
    pub system_agent: BTreeMap<EntityId, SystemAgent>,
    pub decision_log: BTreeMap<EntityId, DecisionLog>,
}

impl Ecs {
    /// Highest id in the entity set or under any component. Restored
    /// saves may carry components for ids missing from `entities`.
    pub fn max_entity_id(&self) -> EntityId {
        fn last<T>(map: &BTreeMap<EntityId, T>) -> EntityId {
            map.keys().next_back().copied().unwrap_or(0)
        }

        [
            self.entities.iter().next_back().copied().unwrap_or(0),
            last(&self.position),
            last(&self.movement),
            last(&self.inventory),
            last(&self.needs),
            last(&self.building),
            last(&self.road),
            last(&self.agent),
            last(&self.policy),
            last(&self.ownership),
            last(&self.line),
            last(&self.queue),
            last(&self.condition),
            last(&self.system_agent),
            last(&self.decision_log),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    pub fn agent_kind(&self, id: EntityId) -> Option<AgentKind> {
        self.agent.get(&id).map(|a| a.kind)
    }

    pub fn building_kind(&self, id: EntityId) -> Option<BuildingKind> {
        self.building.get(&id).map(|b| b.kind)
    }

    /// Ids of every agent of `kind`, ascending.
    pub fn agents_of_kind(&self, kind: AgentKind) -> Vec<EntityId> {
        self.agent
            .iter()
            .filter(|(_, a)| a.kind == kind)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Ids of every building of `kind`, ascending.
    pub fn buildings_of_kind(&self, kind: BuildingKind) -> Vec<EntityId> {
        self.building
            .iter()
            .filter(|(_, b)| b.kind == kind)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn food(&self, id: EntityId) -> i64 {
        self.inventory.get(&id).map(|inv| inv.food).unwrap_or(0)
    }

    pub fn set_decision(&mut self, id: EntityId, log: DecisionLog) {
        self.decision_log.insert(id, log);
    }
}
