//! Transit system: one bus line through every stop, served round-robin.
//!
//! The line's stop list is rebuilt every tick from the stop buildings
//! (ascending id) and always has at least one minibus. Each minibus keeps
//! its next stop index in its own decision log (`stopIndex:<n>`).

use log::debug;

use crate::{
    components::{AgentKind, BuildingKind, DecisionLog, DecisionTarget, Position},
    economy::record_income,
    event::SimEvent,
    system::SimSystem,
    types::{EntityId, Tick},
    world::{World, DEFAULT_LINE_FARE},
};

pub const MINIBUS_MOVE_INTERVAL: Tick = 2;
/// Seats assumed when a minibus queue carries no capacity.
pub const DEFAULT_MINIBUS_SEATS: u32 = 16;

pub struct TransitSystem;

impl TransitSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TransitSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Sync the line with the current stops. None while fewer than two exist.
fn ensure_line(world: &mut World, events: &mut Vec<SimEvent>) -> Option<EntityId> {
    let stops: Vec<Position> = world
        .building_positions(BuildingKind::Stop)
        .into_iter()
        .map(|(_, pos)| pos)
        .collect();
    if stops.len() < 2 {
        return None;
    }

    let line_id = match world.ecs.line.keys().next().copied() {
        Some(id) => id,
        None => {
            let id = world.add_line(stops.clone(), DEFAULT_LINE_FARE, None);
            debug!("Transit line {id} created with {} stops", stops.len());
            events.push(SimEvent::LineCreated { line_id: id, stops: stops.len() });
            id
        }
    };

    let first_stop = stops[0];
    let minibuses: Vec<EntityId> = {
        let line = world.ecs.line.get(&line_id)?;
        line.assigned_vehicles
            .iter()
            .copied()
            .filter(|id| world.ecs.agent_kind(*id) == Some(AgentKind::Minibus))
            .collect()
    };
    let line = world.ecs.line.get_mut(&line_id)?;
    line.stops = stops;
    line.assigned_vehicles = minibuses;

    if line.assigned_vehicles.is_empty() {
        let vehicle = world.add_minibus(first_stop, Some(line_id), None);
        if let Some(line) = world.ecs.line.get_mut(&line_id) {
            line.assigned_vehicles.push(vehicle);
        }
        if let Some(log) = world.ecs.decision_log.get_mut(&vehicle) {
            log.last_reason = "Assigned to first bus line".to_string();
            log.last_target = DecisionTarget::StopIndex(1);
        }
        events.push(SimEvent::AgentSpawned {
            entity_id: vehicle,
            kind:      AgentKind::Minibus,
            x:         first_stop.x,
            y:         first_stop.y,
        });
    }

    Some(line_id)
}

/// The stop index recorded in the minibus's log, or 0 if absent or stale.
fn recorded_stop_index(world: &World, vehicle: EntityId, stop_count: usize) -> usize {
    world
        .ecs
        .decision_log
        .get(&vehicle)
        .and_then(|log| log.last_target.stop_index())
        .filter(|i| *i < stop_count)
        .unwrap_or(0)
}

fn run_minibus(world: &mut World, vehicle: EntityId, line_id: EntityId) {
    let Some(line) = world.ecs.line.get(&line_id) else { return };
    let stops = line.stops.clone();
    let fare = line.fare;
    if stops.is_empty() {
        return;
    }

    let Some(position) = world.position(vehicle) else { return };
    let Some(condition) = world.ecs.condition.get(&vehicle) else { return };
    if !condition.is_operational() {
        return;
    }
    if !world.ecs.queue.contains_key(&vehicle) || !world.ecs.decision_log.contains_key(&vehicle) {
        return;
    }
    let Some(movement) = world.ecs.movement.get(&vehicle) else { return };

    if !movement.path.is_empty() {
        advance(world, vehicle);
        return;
    }

    let index = recorded_stop_index(world, vehicle, stops.len());
    let current_stop = stops[index];

    if position != current_stop {
        let log = match world.road_path(position, current_stop) {
            Some(path) if path.len() > 1 => {
                set_path(world, vehicle, path);
                DecisionLog::new("travelStop", format!("Heading toward stop {index}"), DecisionTarget::StopIndex(index))
            }
            _ => DecisionLog::new("blocked", format!("Cannot reach stop {index}"), DecisionTarget::StopIndex(index)),
        };
        world.ecs.set_decision(vehicle, log);
        return;
    }

    let riders = world.ecs.queue.get(&vehicle).map(|q| q.count).unwrap_or(0);
    if riders > 0 {
        record_income(world, riders as i64 * fare);
        if let Some(onboard) = world.ecs.queue.get_mut(&vehicle) {
            onboard.count = 0;
        }
    }

    if let Some(stop_id) = world.building_at(current_stop) {
        let waiting = world.ecs.queue.get(&stop_id).map(|q| q.count);
        if let Some(waiting) = waiting {
            let onboard = world.ecs.queue.get(&vehicle).copied().unwrap_or_default();
            let seats = onboard.capacity.unwrap_or(DEFAULT_MINIBUS_SEATS);
            let boarded = seats.saturating_sub(onboard.count).min(waiting);
            if let Some(stop_queue) = world.ecs.queue.get_mut(&stop_id) {
                stop_queue.count -= boarded;
            }
            if let Some(bus_queue) = world.ecs.queue.get_mut(&vehicle) {
                bus_queue.count += boarded;
            }
        }
    }

    let next_index = (index + 1) % stops.len();
    let log = match world.road_path(position, stops[next_index]) {
        Some(path) if path.len() > 1 => {
            set_path(world, vehicle, path);
            DecisionLog::new(
                "departStop",
                format!("Departing stop {index} to stop {next_index}"),
                DecisionTarget::StopIndex(next_index),
            )
        }
        _ => DecisionLog::new("blocked", "No road route between stops", DecisionTarget::StopIndex(next_index)),
    };
    world.ecs.set_decision(vehicle, log);
}

fn set_path(world: &mut World, vehicle: EntityId, path: Vec<Position>) {
    if let Some(movement) = world.ecs.movement.get_mut(&vehicle) {
        movement.path = path.into_iter().skip(1).collect();
    }
}

fn advance(world: &mut World, vehicle: EntityId) {
    if !world.tick.is_multiple_of(MINIBUS_MOVE_INTERVAL) {
        return;
    }
    let Some(movement) = world.ecs.movement.get_mut(&vehicle) else { return };
    let Some(next) = movement.path.pop_front() else { return };
    let arrived = movement.path.is_empty();

    world.ecs.position.insert(vehicle, next);
    if let Some(condition) = world.ecs.condition.get_mut(&vehicle) {
        condition.accrue_wear();
    }
    if arrived {
        if let Some(log) = world.ecs.decision_log.get_mut(&vehicle) {
            log.last_decision = "arriveStop".to_string();
            log.last_reason = "Reached route stop".to_string();
        }
    }
}

impl SimSystem for TransitSystem {
    fn name(&self) -> &'static str {
        "transit"
    }

    fn update(&mut self, world: &mut World) -> Vec<SimEvent> {
        let mut events = Vec::new();
        let Some(line_id) = ensure_line(world, &mut events) else { return events };

        let mut vehicles = match world.ecs.line.get(&line_id) {
            Some(line) if line.stops.len() >= 2 => line.assigned_vehicles.clone(),
            _ => return events,
        };
        vehicles.sort_unstable();

        for vehicle in vehicles {
            run_minibus(world, vehicle, line_id);
        }
        events
    }
}
