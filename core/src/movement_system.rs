//! Movement system: citizens walk between housing, market and stops.
//!
//! Routing prefers the road network and falls back to walking over any
//! passable terrain. A citizen advances one waypoint every
//! CITIZEN_MOVE_INTERVAL ticks.

use std::collections::HashSet;

use crate::{
    components::{AgentKind, BuildingKind, DecisionLog, DecisionTarget, Movement, Position},
    event::SimEvent,
    pathfinder::walk_path,
    system::SimSystem,
    types::{EntityId, Tick},
    world::World,
};

pub const CITIZEN_MOVE_INTERVAL: Tick = 4;
/// Above this hunger a citizen heads for the market instead of home.
pub const SEEK_MARKET_HUNGER: f64 = 0.65;
/// Above this hunger a citizen may divert to a closer stop.
pub const DIVERT_TO_STOP_HUNGER: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Destination {
    Housing,
    Market,
    Stop,
}

impl Destination {
    fn label(self) -> &'static str {
        match self {
            Destination::Housing => "housing",
            Destination::Market  => "market",
            Destination::Stop    => "stop",
        }
    }

    fn target(self) -> DecisionTarget {
        match self {
            Destination::Housing => DecisionTarget::Housing,
            Destination::Market  => DecisionTarget::Market,
            Destination::Stop    => DecisionTarget::Stop,
        }
    }
}

pub struct MovementSystem;

impl MovementSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MovementSystem {
    fn default() -> Self {
        Self::new()
    }
}

struct Landmarks {
    market:    Position,
    housing:   Position,
    stops:     Vec<Position>,
    stop_set:  HashSet<Position>,
}

impl Landmarks {
    fn route(&self, from: Position, hunger: f64) -> (Destination, Position) {
        let (primary, primary_pos) = if hunger > SEEK_MARKET_HUNGER {
            (Destination::Market, self.market)
        } else {
            (Destination::Housing, self.housing)
        };

        if primary == Destination::Market
            && hunger > DIVERT_TO_STOP_HUNGER
            && !self.stop_set.contains(&from)
        {
            let nearest = self.stops.iter().copied().fold(None::<Position>, |best, stop| match best {
                Some(b) if b.manhattan(from) <= stop.manhattan(from) => Some(b),
                _ => Some(stop),
            });
            if let Some(stop) = nearest {
                if stop.manhattan(from) + 1 < primary_pos.manhattan(from) {
                    return (Destination::Stop, stop);
                }
            }
        }

        (primary, primary_pos)
    }
}

fn plan_route(world: &mut World, citizen: EntityId, from: Position, goal: Position, dest: Destination) {
    let label = dest.label();
    let road = world.road_path(from, goal).filter(|p| p.len() > 1);

    let (path, log) = if let Some(path) = road {
        (Some(path), DecisionLog::new("travel", format!("Following road path toward {label}"), dest.target()))
    } else if let Some(path) = walk_path(&world.map, from, goal, |_| false).filter(|p| p.len() > 1) {
        (Some(path), DecisionLog::new("travel", format!("Road unavailable, walking toward {label}"), dest.target()))
    } else {
        (None, DecisionLog::new("wait", format!("No route to {label}"), dest.target()))
    };

    if let Some(path) = path {
        if let Some(movement) = world.ecs.movement.get_mut(&citizen) {
            movement.path = path.into_iter().skip(1).collect();
        }
    }
    world.ecs.set_decision(citizen, log);
}

impl SimSystem for MovementSystem {
    fn name(&self) -> &'static str {
        "movement"
    }

    fn update(&mut self, world: &mut World) -> Vec<SimEvent> {
        let (Some(market), Some(housing)) = (
            world.first_building_position(BuildingKind::Market),
            world.first_building_position(BuildingKind::Housing),
        ) else {
            return Vec::new();
        };
        let stops: Vec<Position> = world
            .building_positions(BuildingKind::Stop)
            .into_iter()
            .map(|(_, pos)| pos)
            .collect();
        let landmarks = Landmarks {
            market,
            housing,
            stop_set: stops.iter().copied().collect(),
            stops,
        };

        for citizen in world.ecs.agents_of_kind(AgentKind::Citizen) {
            let Some(pos) = world.position(citizen) else { continue };
            let Some(hunger) = world.ecs.needs.get(&citizen).map(|n| n.hunger) else { continue };
            if !world.ecs.decision_log.contains_key(&citizen) {
                continue;
            }

            let (dest, goal) = landmarks.route(pos, hunger);
            if pos == goal {
                continue;
            }

            let movement = world
                .ecs
                .movement
                .entry(citizen)
                .or_insert_with(|| Movement { speed: 1.0, path: Default::default() });

            if movement.path.is_empty() {
                plan_route(world, citizen, pos, goal, dest);
                continue;
            }

            if !world.tick.is_multiple_of(CITIZEN_MOVE_INTERVAL) {
                continue;
            }
            let Some(next) = movement.path.pop_front() else { continue };
            let arrived = movement.path.is_empty();
            world.ecs.position.insert(citizen, next);

            if arrived {
                let label = dest.label();
                world.set_decision(citizen, "arrive", format!("Reached {label}"), dest.target());
            }
        }

        Vec::new()
    }
}
