//! Maintenance system: worn vehicles go to a depot and get repaired.
//!
//! Runs every tick, before the courier and transit systems, so a vehicle
//! taken out of service here is skipped by them in the same tick.
//! Only this system changes `Condition::maintenance_state`.

use log::debug;

use crate::{
    components::{AgentKind, BuildingKind, DecisionTarget, MaintenanceState, Position},
    event::SimEvent,
    system::SimSystem,
    types::{EntityId, Tick},
    world::World,
};

/// Repairs stop once wear is at or below this.
pub const RESUME_THRESHOLD: f64 = 0.2;

pub fn move_interval(kind: AgentKind) -> Tick {
    match kind {
        AgentKind::Minibus => 2,
        _ => 3,
    }
}

pub fn repair_rate(kind: AgentKind) -> f64 {
    match kind {
        AgentKind::Minibus => 0.01,
        _ => 0.012,
    }
}

pub struct MaintenanceSystem;

impl MaintenanceSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MaintenanceSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// The vehicle's assigned depot if it still is one, else the nearest by
/// Manhattan distance (lowest id on ties).
fn choose_depot(world: &World, vehicle: EntityId, from: Position) -> Option<(EntityId, Position)> {
    let assigned = world
        .ecs
        .condition
        .get(&vehicle)
        .and_then(|c| c.assigned_depot_id)
        .filter(|id| world.ecs.building_kind(*id) == Some(BuildingKind::Depot))
        .and_then(|id| world.position(id).map(|pos| (id, pos)));
    if assigned.is_some() {
        return assigned;
    }

    let mut nearest: Option<(EntityId, Position)> = None;
    for (id, pos) in world.building_positions(BuildingKind::Depot) {
        let closer = match nearest {
            Some((_, best)) => pos.manhattan(from) < best.manhattan(from),
            None => true,
        };
        if closer {
            nearest = Some((id, pos));
        }
    }
    nearest
}

fn maintain(world: &mut World, vehicle: EntityId, kind: AgentKind, events: &mut Vec<SimEvent>) {
    let Some(position) = world.position(vehicle) else { return };
    if !world.ecs.movement.contains_key(&vehicle) || !world.ecs.decision_log.contains_key(&vehicle) {
        return;
    }
    let Some(condition) = world.ecs.condition.get(&vehicle) else { return };
    if condition.is_operational() && condition.wear < condition.maintenance_threshold {
        return;
    }
    let was_operational = condition.is_operational();

    let Some((depot_id, depot_pos)) = choose_depot(world, vehicle, position) else {
        if let Some(condition) = world.ecs.condition.get_mut(&vehicle) {
            condition.maintenance_state = MaintenanceState::ToDepot;
        }
        if was_operational {
            debug!("Vehicle {vehicle} needs repair but no depot exists");
            events.push(SimEvent::MaintenanceStarted { entity_id: vehicle, depot_id: None });
        }
        world.set_decision(
            vehicle,
            "maintenanceBlocked",
            "No depot available for repair",
            DecisionTarget::AssignedDepot(None),
        );
        return;
    };

    if was_operational {
        debug!("Vehicle {vehicle} heading to depot {depot_id} for repair");
        events.push(SimEvent::MaintenanceStarted { entity_id: vehicle, depot_id: Some(depot_id) });
    }
    if let Some(condition) = world.ecs.condition.get_mut(&vehicle) {
        condition.assigned_depot_id = Some(depot_id);
    }

    if position == depot_pos {
        repair(world, vehicle, kind, depot_id, events);
        return;
    }

    if was_operational {
        if let Some(condition) = world.ecs.condition.get_mut(&vehicle) {
            condition.maintenance_state = MaintenanceState::ToDepot;
        }
        // Any route planned for service is abandoned.
        if let Some(movement) = world.ecs.movement.get_mut(&vehicle) {
            movement.path.clear();
        }
        if kind == AgentKind::Minibus {
            if let Some(onboard) = world.ecs.queue.get_mut(&vehicle) {
                onboard.count = 0;
            }
        }
    }

    let needs_route = world.ecs.movement.get(&vehicle).is_some_and(|m| m.path.is_empty());
    if needs_route {
        match world.road_path(position, depot_pos) {
            Some(path) if path.len() >= 2 => {
                if let Some(movement) = world.ecs.movement.get_mut(&vehicle) {
                    movement.path = path.into_iter().skip(1).collect();
                }
            }
            _ => {
                world.set_decision(
                    vehicle,
                    "maintenanceBlocked",
                    format!("No path to depot {depot_id}"),
                    DecisionTarget::AssignedDepot(Some(depot_id)),
                );
                return;
            }
        }
    }

    if world.tick.is_multiple_of(move_interval(kind)) {
        let next = world.ecs.movement.get_mut(&vehicle).and_then(|m| m.path.pop_front());
        if let Some(next) = next {
            world.ecs.position.insert(vehicle, next);
        }
    }

    world.set_decision(
        vehicle,
        "maintenanceTravel",
        format!("Returning to depot {depot_id} for repairs"),
        DecisionTarget::AssignedDepot(Some(depot_id)),
    );
}

fn repair(world: &mut World, vehicle: EntityId, kind: AgentKind, depot_id: EntityId, events: &mut Vec<SimEvent>) {
    if let Some(movement) = world.ecs.movement.get_mut(&vehicle) {
        movement.path.clear();
    }
    let Some(condition) = world.ecs.condition.get_mut(&vehicle) else { return };
    condition.maintenance_state = MaintenanceState::Repairing;
    condition.wear = (condition.wear - repair_rate(kind)).max(0.0);

    if condition.wear <= RESUME_THRESHOLD {
        condition.maintenance_state = MaintenanceState::Operational;
        condition.assigned_depot_id = None;
        debug!("Vehicle {vehicle} repaired at depot {depot_id}");
        events.push(SimEvent::MaintenanceCompleted { entity_id: vehicle, depot_id });
        world.set_decision(
            vehicle,
            "resumeService",
            "Maintenance complete, returning to route",
            DecisionTarget::Service,
        );
    } else {
        world.set_decision(
            vehicle,
            "repairing",
            format!("Repairing at depot {depot_id}"),
            DecisionTarget::AssignedDepot(Some(depot_id)),
        );
    }
}

impl SimSystem for MaintenanceSystem {
    fn name(&self) -> &'static str {
        "maintenance"
    }

    fn update(&mut self, world: &mut World) -> Vec<SimEvent> {
        let mut events = Vec::new();
        let vehicles: Vec<(EntityId, AgentKind)> = world
            .ecs
            .agent
            .iter()
            .filter(|(_, a)| a.kind.is_vehicle())
            .map(|(id, a)| (*id, a.kind))
            .collect();

        for (vehicle, kind) in vehicles {
            maintain(world, vehicle, kind, &mut events);
        }
        events
    }
}
