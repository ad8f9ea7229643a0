//! Player-issued intents and the command processor.
//!
//! RULE: A command whose preconditions fail is a silent no-op. No money
//! moves, no entity appears, no event is emitted.

use std::cmp::Ordering;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    blueprint::{AgentBlueprint, BlueprintAgentKind},
    components::{BuildingKind, Position},
    economy::{self, record_expense, ROAD_BUILD_COST},
    event::SimEvent,
    types::Tick,
    world::{World, STARTER_FOOD},
};

/// All player-issued commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SimCommand {
    BuildRoad {
        x: i32,
        y: i32,
    },
    PlaceBuilding {
        kind: BuildingKind,
        x:    i32,
        y:    i32,
    },
    SetBlueprint {
        kind:      BlueprintAgentKind,
        blueprint: AgentBlueprint,
    },
    SetAutoExpansion {
        enabled: bool,
    },
}

impl SimCommand {
    pub fn type_name(&self) -> &'static str {
        match self {
            SimCommand::BuildRoad { .. }        => "buildRoad",
            SimCommand::PlaceBuilding { .. }    => "placeBuilding",
            SimCommand::SetBlueprint { .. }     => "setBlueprint",
            SimCommand::SetAutoExpansion { .. } => "setAutoExpansion",
        }
    }

    fn tile(&self) -> Option<Position> {
        match self {
            SimCommand::BuildRoad { x, y } | SimCommand::PlaceBuilding { x, y, .. } => {
                Some(Position::new(*x, *y))
            }
            _ => None,
        }
    }
}

/// A command together with the earliest tick it may apply at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedCommand {
    #[serde(rename = "tickId")]
    pub tick_id: Tick,
    #[serde(flatten)]
    pub command: SimCommand,
}

impl QueuedCommand {
    pub fn new(tick_id: Tick, command: SimCommand) -> Self {
        Self { tick_id, command }
    }
}

/// Total order for the pending queue: tick, then command type name,
/// then tile (x, y) or blueprint kind. Anything still tied keeps
/// submission order, so callers must use a stable sort.
pub fn queue_order(a: &QueuedCommand, b: &QueuedCommand) -> Ordering {
    a.tick_id
        .cmp(&b.tick_id)
        .then_with(|| a.command.type_name().cmp(b.command.type_name()))
        .then_with(|| match (a.command.tile(), b.command.tile()) {
            (Some(pa), Some(pb)) => pa.x.cmp(&pb.x).then(pa.y.cmp(&pb.y)),
            _ => match (&a.command, &b.command) {
                (SimCommand::SetBlueprint { kind: ka, .. }, SimCommand::SetBlueprint { kind: kb, .. }) => {
                    ka.as_str().cmp(kb.as_str())
                }
                _ => Ordering::Equal,
            },
        })
}

/// Apply one command. Returns whether it took effect; successful
/// construction pushes its event onto `events`.
pub fn apply_command(world: &mut World, command: &SimCommand, events: &mut Vec<SimEvent>) -> bool {
    if world.game_over {
        debug!("Ignoring {} at tick {}: game over", command.type_name(), world.tick);
        return false;
    }

    match command {
        SimCommand::SetBlueprint { kind, blueprint } => {
            match world.blueprints.replace(*kind, blueprint.clone()) {
                Ok(()) => true,
                Err(e) => {
                    debug!("Rejected setBlueprint: {e}");
                    false
                }
            }
        }
        SimCommand::SetAutoExpansion { enabled } => {
            world.auto_expansion_enabled = *enabled;
            true
        }
        SimCommand::BuildRoad { x, y } => build_road(world, Position::new(*x, *y), events),
        SimCommand::PlaceBuilding { kind, x, y } => {
            place_building(world, *kind, Position::new(*x, *y), events)
        }
    }
}

fn build_road(world: &mut World, pos: Position, events: &mut Vec<SimEvent>) -> bool {
    if !world.is_passable(pos) {
        debug!("Rejected buildRoad at {pos}: tile blocked");
        return false;
    }
    if world.money < ROAD_BUILD_COST {
        debug!("Rejected buildRoad at {pos}: insufficient funds ({})", world.money);
        return false;
    }
    if !world.is_free_tile(pos) {
        debug!("Rejected buildRoad at {pos}: tile occupied");
        return false;
    }

    record_expense(world, ROAD_BUILD_COST);
    let entity_id = world.add_road(pos, None);
    world.invalidate_paths();
    events.push(SimEvent::RoadBuilt { entity_id, x: pos.x, y: pos.y, cost: ROAD_BUILD_COST });
    true
}

fn place_building(
    world: &mut World,
    kind: BuildingKind,
    pos: Position,
    events: &mut Vec<SimEvent>,
) -> bool {
    if !world.is_passable(pos) {
        debug!("Rejected placeBuilding {kind} at {pos}: tile blocked");
        return false;
    }
    let cost = economy::build_cost(kind);
    if world.money < cost {
        debug!("Rejected placeBuilding {kind} at {pos}: insufficient funds ({})", world.money);
        return false;
    }
    if !world.is_free_tile(pos) {
        debug!("Rejected placeBuilding {kind} at {pos}: tile occupied");
        return false;
    }

    record_expense(world, cost);
    let entity_id = world.add_building(kind, pos, None, initial_food(kind));
    events.push(SimEvent::BuildingPlaced { entity_id, kind, x: pos.x, y: pos.y, cost });
    true
}

/// New food sources come pre-stocked; everything else starts empty.
pub fn initial_food(kind: BuildingKind) -> i64 {
    if kind == BuildingKind::FoodSource {
        STARTER_FOOD
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_camel_case_type_tags() {
        let queued = QueuedCommand::new(3, SimCommand::PlaceBuilding { kind: BuildingKind::FoodSource, x: 1, y: 2 });
        let json = serde_json::to_value(&queued).unwrap();
        assert_eq!(json["type"], "placeBuilding");
        assert_eq!(json["kind"], "foodSource");
        assert_eq!(json["tickId"], 3);

        let back: QueuedCommand = serde_json::from_value(json).unwrap();
        assert_eq!(back, queued);
    }

    #[test]
    fn queue_order_breaks_ties_by_type_then_tile() {
        let mut queue = vec![
            QueuedCommand::new(2, SimCommand::BuildRoad { x: 5, y: 1 }),
            QueuedCommand::new(1, SimCommand::SetAutoExpansion { enabled: false }),
            QueuedCommand::new(2, SimCommand::BuildRoad { x: 3, y: 9 }),
            QueuedCommand::new(2, SimCommand::PlaceBuilding { kind: BuildingKind::Stop, x: 0, y: 0 }),
            QueuedCommand::new(1, SimCommand::BuildRoad { x: 9, y: 9 }),
        ];
        queue.sort_by(queue_order);

        let order: Vec<(Tick, &str)> = queue.iter().map(|q| (q.tick_id, q.command.type_name())).collect();
        assert_eq!(order, vec![
            (1, "buildRoad"),
            (1, "setAutoExpansion"),
            (2, "buildRoad"),
            (2, "buildRoad"),
            (2, "placeBuilding"),
        ]);
        assert_eq!(queue[2].command, SimCommand::BuildRoad { x: 3, y: 9 });
    }
}
