//! Component records stored in the ECS.
//!
//! Every component is plain data. Systems find entities by component
//! presence; nothing here knows about any other component.

use std::{cmp::Ordering, collections::{BTreeSet, VecDeque}, convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::types::{EntityId, Money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn offset(self, dx: i32, dy: i32) -> Position {
        Position::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Remaining waypoints, consumed front to back.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Movement {
    pub speed: f64,
    #[serde(default)]
    pub path:  VecDeque<Position>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Inventory {
    pub food: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Needs {
    pub hunger:    f64,
    pub happiness: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildingKind {
    Housing,
    Market,
    Warehouse,
    Depot,
    FoodSource,
    Stop,
}

impl BuildingKind {
    pub const ALL: [BuildingKind; 6] = [
        BuildingKind::Housing,
        BuildingKind::Market,
        BuildingKind::Warehouse,
        BuildingKind::Depot,
        BuildingKind::FoodSource,
        BuildingKind::Stop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BuildingKind::Housing    => "housing",
            BuildingKind::Market     => "market",
            BuildingKind::Warehouse  => "warehouse",
            BuildingKind::Depot      => "depot",
            BuildingKind::FoodSource => "foodSource",
            BuildingKind::Stop       => "stop",
        }
    }

    /// Markets and stops carry a waiting-line counter.
    pub fn has_queue(self) -> bool {
        matches!(self, BuildingKind::Market | BuildingKind::Stop)
    }
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    pub w: u32,
    pub h: u32,
}

impl Default for Footprint {
    fn default() -> Self {
        Self { w: 1, h: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub kind:      BuildingKind,
    #[serde(default)]
    pub footprint: Footprint,
    pub upkeep:    Money,
}

/// Marker for road tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Road {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentKind {
    Citizen,
    CourierBot,
    Minibus,
}

impl AgentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::Citizen    => "citizen",
            AgentKind::CourierBot => "courierBot",
            AgentKind::Minibus    => "minibus",
        }
    }

    pub fn is_vehicle(self) -> bool {
        !matches!(self, AgentKind::Citizen)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub kind: AgentKind,
}

// ── Policies ──────────────────────────────────────────────────

/// Automation behaviours an entity can opt into.
///
/// Known ids get their own variant; anything else read from a save
/// survives as `Custom` so it can be written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PolicyId {
    DeliverMarketIfLow,
    WarehouseSurplusToMarket,
    ReturnToDepotWhenWorn,
    LineAutoAddMinibusWhenQueueHigh,
    Custom(String),
}

impl PolicyId {
    pub fn as_str(&self) -> &str {
        match self {
            PolicyId::DeliverMarketIfLow              => "deliver_market_if_low",
            PolicyId::WarehouseSurplusToMarket        => "warehouse_surplus_to_market",
            PolicyId::ReturnToDepotWhenWorn           => "return_to_depot_when_worn",
            PolicyId::LineAutoAddMinibusWhenQueueHigh => "line_auto_add_minibus_when_queue_high",
            PolicyId::Custom(id)                      => id,
        }
    }
}

impl From<String> for PolicyId {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "deliver_market_if_low"                 => PolicyId::DeliverMarketIfLow,
            "warehouse_surplus_to_market"           => PolicyId::WarehouseSurplusToMarket,
            "return_to_depot_when_worn"             => PolicyId::ReturnToDepotWhenWorn,
            "line_auto_add_minibus_when_queue_high" => PolicyId::LineAutoAddMinibusWhenQueueHigh,
            _ => PolicyId::Custom(raw),
        }
    }
}

impl From<&str> for PolicyId {
    fn from(raw: &str) -> Self {
        PolicyId::from(raw.to_string())
    }
}

impl From<PolicyId> for String {
    fn from(id: PolicyId) -> Self {
        id.as_str().to_string()
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Ordered by wire string so iteration is lexical.
impl Ord for PolicyId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for PolicyId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub policy_ids: BTreeSet<PolicyId>,
}

impl Policy {
    pub fn has(&self, id: &PolicyId) -> bool {
        self.policy_ids.contains(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ownership {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_entity_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub stops:             Vec<Position>,
    #[serde(default)]
    pub assigned_vehicles: Vec<EntityId>,
    pub fare:              Money,
    pub headway_target:    u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Queue {
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MaintenanceState {
    #[default]
    Operational,
    ToDepot,
    Repairing,
}

impl MaintenanceState {
    pub fn as_str(self) -> &'static str {
        match self {
            MaintenanceState::Operational => "operational",
            MaintenanceState::ToDepot     => "toDepot",
            MaintenanceState::Repairing   => "repairing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub wear:                  f64,
    pub wear_rate:             f64,
    pub maintenance_threshold: f64,
    pub maintenance_state:     MaintenanceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_depot_id:     Option<EntityId>,
}

impl Condition {
    pub fn is_operational(&self) -> bool {
        self.maintenance_state == MaintenanceState::Operational
    }

    /// Add one step of wear, clamped to 1.
    pub fn accrue_wear(&mut self) {
        self.wear = (self.wear + self.wear_rate).clamp(0.0, 1.0);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SystemAgent {
    #[serde(default)]
    pub children: Vec<EntityId>,
}

// ── Decision log ──────────────────────────────────────────────

/// What an agent's last decision was aimed at.
///
/// Serialized as the short strings saves have always carried
/// (`"market"`, `"building:7"`, `"stopIndex:2"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DecisionTarget {
    None,
    Housing,
    Market,
    Stop,
    Depot,
    Service,
    Unknown,
    Building(EntityId),
    /// `depot:<id>`, or `depot:none` when no depot exists.
    AssignedDepot(Option<EntityId>),
    /// `line:<id>`, or `line:none` before assignment.
    Line(Option<EntityId>),
    LineUnknown,
    StopIndex(usize),
    Other(String),
}

impl DecisionTarget {
    pub fn stop_index(&self) -> Option<usize> {
        match self {
            DecisionTarget::StopIndex(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for DecisionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionTarget::None                    => f.write_str("none"),
            DecisionTarget::Housing                 => f.write_str("housing"),
            DecisionTarget::Market                  => f.write_str("market"),
            DecisionTarget::Stop                    => f.write_str("stop"),
            DecisionTarget::Depot                   => f.write_str("depot"),
            DecisionTarget::Service                 => f.write_str("service"),
            DecisionTarget::Unknown                 => f.write_str("unknown"),
            DecisionTarget::Building(id)            => write!(f, "building:{id}"),
            DecisionTarget::AssignedDepot(Some(id)) => write!(f, "depot:{id}"),
            DecisionTarget::AssignedDepot(None)     => f.write_str("depot:none"),
            DecisionTarget::Line(Some(id))          => write!(f, "line:{id}"),
            DecisionTarget::Line(None)              => f.write_str("line:none"),
            DecisionTarget::LineUnknown             => f.write_str("line:unknown"),
            DecisionTarget::StopIndex(i)            => write!(f, "stopIndex:{i}"),
            DecisionTarget::Other(raw)              => f.write_str(raw),
        }
    }
}

impl FromStr for DecisionTarget {
    type Err = Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parsed = match raw {
            "none"         => DecisionTarget::None,
            "housing"      => DecisionTarget::Housing,
            "market"       => DecisionTarget::Market,
            "stop"         => DecisionTarget::Stop,
            "depot"        => DecisionTarget::Depot,
            "service"      => DecisionTarget::Service,
            "unknown"      => DecisionTarget::Unknown,
            "depot:none"   => DecisionTarget::AssignedDepot(None),
            "line:none"    => DecisionTarget::Line(None),
            "line:unknown" => DecisionTarget::LineUnknown,
            _ => parse_tagged(raw).unwrap_or_else(|| DecisionTarget::Other(raw.to_string())),
        };
        Ok(parsed)
    }
}

fn parse_tagged(raw: &str) -> Option<DecisionTarget> {
    let (tag, payload) = raw.split_once(':')?;
    match tag {
        "building"  => payload.parse().ok().map(DecisionTarget::Building),
        "depot"     => payload.parse().ok().map(|id| DecisionTarget::AssignedDepot(Some(id))),
        "line"      => payload.parse().ok().map(|id| DecisionTarget::Line(Some(id))),
        "stopIndex" => payload.parse().ok().map(DecisionTarget::StopIndex),
        _ => None,
    }
}

impl From<String> for DecisionTarget {
    fn from(raw: String) -> Self {
        match raw.parse() {
            Ok(target) => target,
            Err(never) => match never {},
        }
    }
}

impl From<DecisionTarget> for String {
    fn from(target: DecisionTarget) -> Self {
        target.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionLog {
    pub last_decision: String,
    pub last_reason:   String,
    pub last_target:   DecisionTarget,
}

impl DecisionLog {
    pub fn new(decision: &str, reason: impl Into<String>, target: DecisionTarget) -> Self {
        Self {
            last_decision: decision.to_string(),
            last_reason:   reason.into(),
            last_target:   target,
        }
    }
}

impl Default for DecisionLog {
    fn default() -> Self {
        DecisionLog::new("idle", "No decision yet", DecisionTarget::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_targets_print_their_wire_strings() {
        assert_eq!(DecisionTarget::Building(7).to_string(), "building:7");
        assert_eq!(DecisionTarget::AssignedDepot(None).to_string(), "depot:none");
        assert_eq!(DecisionTarget::Line(Some(5)).to_string(), "line:5");
        assert_eq!(DecisionTarget::StopIndex(2).to_string(), "stopIndex:2");
        assert_eq!(DecisionTarget::Depot.to_string(), "depot");
    }

    #[test]
    fn decision_targets_parse_back_from_wire_strings() {
        for raw in ["none", "market", "building:12", "depot:3", "depot:none", "line:none", "stopIndex:4", "line:unknown"] {
            let parsed: DecisionTarget = raw.parse().unwrap();
            assert_eq!(parsed.to_string(), raw, "round trip failed for {raw}");
        }
    }

    #[test]
    fn malformed_stop_index_is_kept_verbatim_and_yields_no_index() {
        let parsed = DecisionTarget::from("stopIndex:abc".to_string());
        assert_eq!(parsed, DecisionTarget::Other("stopIndex:abc".into()));
        assert_eq!(parsed.stop_index(), None);
        assert_eq!(DecisionTarget::from("stopIndex:3".to_string()).stop_index(), Some(3));
    }

    #[test]
    fn policy_ids_order_lexically_and_keep_unknown_names() {
        let mut set = BTreeSet::new();
        set.insert(PolicyId::WarehouseSurplusToMarket);
        set.insert(PolicyId::DeliverMarketIfLow);
        set.insert(PolicyId::from("zz_custom"));

        let names: Vec<&str> = set.iter().map(|p| p.as_str()).collect();
        assert_eq!(names, vec!["deliver_market_if_low", "warehouse_surplus_to_market", "zz_custom"]);
    }

    #[test]
    fn wear_is_clamped_at_one() {
        let mut condition = Condition {
            wear: 0.99,
            wear_rate: 0.05,
            maintenance_threshold: 0.72,
            maintenance_state: MaintenanceState::Operational,
            assigned_depot_id: None,
        };
        condition.accrue_wear();
        assert_eq!(condition.wear, 1.0);
    }
}
