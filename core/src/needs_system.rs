//! Needs system: citizens eat, queue, or drift hungrier.
//!
//! Market and stop queue counters are rebuilt from scratch every tick:
//! zeroed first, then one count per citizen waiting on that tile.

use std::collections::HashMap;

use crate::{
    components::{AgentKind, BuildingKind, DecisionTarget, Needs, Position},
    event::SimEvent,
    system::SimSystem,
    types::EntityId,
    world::World,
};

/// Minimum hunger before a citizen on a stocked market eats.
pub const EAT_HUNGER_THRESHOLD: f64 = 0.18;
pub const EAT_HUNGER_RELIEF: f64 = 0.42;
pub const EAT_HAPPINESS_GAIN: f64 = 0.02;
/// Above this a citizen on an empty market joins its queue.
pub const MARKET_QUEUE_HUNGER: f64 = 0.4;
/// Above this a citizen on a stop waits for a minibus.
pub const STOP_QUEUE_HUNGER: f64 = 0.65;

pub struct NeedsSystem;

impl NeedsSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NeedsSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn tiles_of(world: &World, kind: BuildingKind) -> HashMap<Position, EntityId> {
    world
        .building_positions(kind)
        .into_iter()
        .map(|(id, pos)| (pos, id))
        .collect()
}

fn nudge(needs: &mut Needs, hunger: f64, happiness: f64) {
    needs.hunger = (needs.hunger + hunger).clamp(0.0, 1.0);
    needs.happiness = (needs.happiness + happiness).clamp(0.0, 1.0);
}

fn bump_queue(world: &mut World, id: EntityId) {
    if let Some(queue) = world.ecs.queue.get_mut(&id) {
        queue.count += 1;
    }
}

impl SimSystem for NeedsSystem {
    fn name(&self) -> &'static str {
        "needs"
    }

    fn update(&mut self, world: &mut World) -> Vec<SimEvent> {
        let markets = tiles_of(world, BuildingKind::Market);
        let stops = tiles_of(world, BuildingKind::Stop);
        let mut market_food: i64 = markets.values().map(|id| world.ecs.food(*id)).sum();

        for (id, building) in &world.ecs.building {
            if building.kind.has_queue() {
                if let Some(queue) = world.ecs.queue.get_mut(id) {
                    queue.count = 0;
                }
            }
        }

        for citizen in world.ecs.agents_of_kind(AgentKind::Citizen) {
            let Some(pos) = world.position(citizen) else { continue };
            let Some(mut needs) = world.ecs.needs.get(&citizen).copied() else { continue };
            if !world.ecs.decision_log.contains_key(&citizen) {
                continue;
            }

            let (decision, reason, target) = 'decide: {
                if let Some(&market) = markets.get(&pos) {
                    let stock = world.ecs.food(market);
                    if stock > 0 && needs.hunger > EAT_HUNGER_THRESHOLD {
                        if let Some(inventory) = world.ecs.inventory.get_mut(&market) {
                            inventory.food -= 1;
                        }
                        market_food = (market_food - 1).max(0);
                        nudge(&mut needs, -EAT_HUNGER_RELIEF, EAT_HAPPINESS_GAIN);
                        break 'decide ("eat", "Consumed market food to satisfy hunger", DecisionTarget::Market);
                    }
                    if needs.hunger > MARKET_QUEUE_HUNGER && world.ecs.queue.contains_key(&market) {
                        bump_queue(world, market);
                        nudge(&mut needs, 0.0014, -0.0012);
                        break 'decide ("queue", "Waiting at market queue for food", DecisionTarget::Market);
                    }
                }

                if let Some(&stop) = stops.get(&pos) {
                    if needs.hunger > STOP_QUEUE_HUNGER {
                        bump_queue(world, stop);
                        nudge(&mut needs, 0.0012, -0.0009);
                        break 'decide ("queueTransit", "Waiting at stop for minibus to market", DecisionTarget::Stop);
                    }
                }

                if market_food > 0 {
                    nudge(&mut needs, 0.0009, 0.0002);
                    ("commute", "Market has food stock available", DecisionTarget::Market)
                } else {
                    nudge(&mut needs, 0.0018, -0.0009);
                    ("wait", "Market food is depleted", DecisionTarget::Housing)
                }
            };

            world.ecs.needs.insert(citizen, needs);
            world.set_decision(citizen, decision, reason, target);
        }

        Vec::new()
    }
}
