//! Money, daily ledger, upkeep and the bankruptcy countdown.
//!
//! The economy tick is not a system: it runs after the systems every
//! tick the game is still live, including the tick that ends it.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    components::{AgentKind, BuildingKind},
    event::SimEvent,
    types::{Money, Tick},
    world::World,
};

pub const TICKS_PER_SECOND: Tick = 20;
pub const TICKS_PER_DAY: Tick = TICKS_PER_SECOND * 60;
pub const BANKRUPTCY_DAYS_LIMIT: u64 = 3;
pub const BANKRUPTCY_TICK_LIMIT: u64 = TICKS_PER_DAY * BANKRUPTCY_DAYS_LIMIT;
pub const GAME_OVER_REASON: &str = "Bankrupt for too long";

pub const ROAD_BUILD_COST: Money = 5;
pub const LINE_DAILY_FEE: Money = 4;
pub const MINIBUS_DAILY_FEE: Money = 3;
pub const LEDGER_HISTORY_DAYS: usize = 14;

pub fn build_cost(kind: BuildingKind) -> Money {
    match kind {
        BuildingKind::Housing    => 80,
        BuildingKind::Market     => 140,
        BuildingKind::Warehouse  => 120,
        BuildingKind::Depot      => 160,
        BuildingKind::FoodSource => 100,
        BuildingKind::Stop       => 20,
    }
}

pub fn upkeep(kind: BuildingKind) -> Money {
    match kind {
        BuildingKind::Housing    => 1,
        BuildingKind::Market     => 3,
        BuildingKind::Warehouse  => 2,
        BuildingKind::Depot      => 2,
        BuildingKind::FoodSource => 1,
        BuildingKind::Stop       => 1,
    }
}

/// Grace days left for a given count of consecutive negative-money ticks.
pub fn days_remaining(bankruptcy_ticks: u64) -> u64 {
    BANKRUPTCY_TICK_LIMIT
        .saturating_sub(bankruptcy_ticks)
        .div_ceil(TICKS_PER_DAY)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub day:         u64,
    pub income:      Money,
    pub expense:     Money,
    pub net:         Money,
    pub money_after: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomySummary {
    pub current_day_income:  Money,
    pub current_day_expense: Money,
    pub last_day_income:     Money,
    pub last_day_expense:    Money,
    pub last_day_net:        Money,
    #[serde(default)]
    pub ledger:              Vec<LedgerEntry>,
}

/// Credit money. Non-positive amounts are ignored.
pub fn record_income(world: &mut World, amount: Money) {
    if amount <= 0 {
        return;
    }
    world.money += amount;
    world.economy.current_day_income += amount;
}

/// Debit money. Non-positive amounts are ignored.
pub fn record_expense(world: &mut World, amount: Money) {
    if amount <= 0 {
        return;
    }
    world.money -= amount;
    world.economy.current_day_expense += amount;
}

/// Close the current day into the ledger and reset the day counters.
pub fn finalize_day(world: &mut World) -> LedgerEntry {
    let economy = &mut world.economy;
    let income = economy.current_day_income;
    let expense = economy.current_day_expense;
    let entry = LedgerEntry {
        day: world.tick / TICKS_PER_DAY,
        income,
        expense,
        net: income - expense,
        money_after: world.money,
    };

    economy.last_day_income = income;
    economy.last_day_expense = expense;
    economy.last_day_net = entry.net;
    economy.current_day_income = 0;
    economy.current_day_expense = 0;

    economy.ledger.push(entry.clone());
    if economy.ledger.len() > LEDGER_HISTORY_DAYS {
        economy.ledger.remove(0);
    }
    entry
}

/// Total daily upkeep: buildings, plus a flat fee per line and per minibus.
pub fn daily_upkeep(world: &World) -> Money {
    let buildings: Money = world.ecs.building.values().map(|b| b.upkeep).sum();
    let lines = world.ecs.line.len() as Money * LINE_DAILY_FEE;
    let minibuses = world.ecs.agents_of_kind(AgentKind::Minibus).len() as Money * MINIBUS_DAILY_FEE;
    buildings + lines + minibuses
}

pub fn apply_economy_tick(world: &mut World) -> Vec<SimEvent> {
    let mut events = Vec::new();

    if world.tick > 0 && world.tick.is_multiple_of(TICKS_PER_DAY) {
        let entry = finalize_day(world);
        info!(
            "Day {} closed: income {} expense {} net {} money {}",
            entry.day, entry.income, entry.expense, entry.net, entry.money_after
        );
        events.push(SimEvent::DayClosed {
            day:         entry.day,
            income:      entry.income,
            expense:     entry.expense,
            net:         entry.net,
            money_after: entry.money_after,
        });

        let upkeep = daily_upkeep(world);
        record_expense(world, upkeep);
    }

    if world.money < 0 {
        if world.bankruptcy_ticks == 0 {
            warn!("Money went negative at tick {} ({})", world.tick, world.money);
        }
        world.bankruptcy_ticks += 1;
        world.bankruptcy_days_remaining = days_remaining(world.bankruptcy_ticks);

        if world.bankruptcy_ticks >= BANKRUPTCY_TICK_LIMIT {
            world.game_over = true;
            world.game_over_reason = Some(GAME_OVER_REASON.to_string());
            world.bankruptcy_days_remaining = 0;
            warn!("Game over at tick {}: {}", world.tick, GAME_OVER_REASON);
            events.push(SimEvent::GameOver {
                tick:   world.tick,
                reason: GAME_OVER_REASON.to_string(),
            });
        }
    } else {
        world.bankruptcy_ticks = 0;
        world.bankruptcy_days_remaining = days_remaining(0);
        world.game_over_reason = None;
    }

    events
}
