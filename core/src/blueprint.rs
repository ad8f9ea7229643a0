//! Agent blueprints: tunables applied to newly spawned vehicles.
//!
//! Already-spawned agents keep whatever values they were built with.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::{
    components::{AgentKind, PolicyId},
    error::{SimError, SimResult},
};

pub const SPEED_RANGE: RangeInclusive<f64> = 0.1..=5.0;
pub const CAPACITY_RANGE: RangeInclusive<u32> = 1..=200;
pub const WEAR_RATE_RANGE: RangeInclusive<f64> = 0.0001..=0.1;
pub const MAINTENANCE_THRESHOLD_RANGE: RangeInclusive<f64> = 0.3..=0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlueprintAgentKind {
    CourierBot,
    Minibus,
}

impl BlueprintAgentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BlueprintAgentKind::CourierBot => "courierBot",
            BlueprintAgentKind::Minibus    => "minibus",
        }
    }

    /// Citizens have no blueprint; every other agent kind maps to one.
    pub fn for_agent(kind: AgentKind) -> BlueprintAgentKind {
        match kind {
            AgentKind::Minibus => BlueprintAgentKind::Minibus,
            AgentKind::Citizen | AgentKind::CourierBot => BlueprintAgentKind::CourierBot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentBlueprint {
    pub speed:                 f64,
    pub capacity:              u32,
    pub wear_rate:             f64,
    pub maintenance_threshold: f64,
    #[serde(default)]
    pub policy_ids:            Vec<PolicyId>,
}

impl AgentBlueprint {
    pub fn default_courier() -> Self {
        Self {
            speed: 1.0,
            capacity: 20,
            wear_rate: 0.0006,
            maintenance_threshold: 0.72,
            policy_ids: vec![PolicyId::DeliverMarketIfLow, PolicyId::WarehouseSurplusToMarket],
        }
    }

    pub fn default_minibus() -> Self {
        Self {
            speed: 1.0,
            capacity: 16,
            wear_rate: 0.0008,
            maintenance_threshold: 0.72,
            policy_ids: vec![PolicyId::ReturnToDepotWhenWorn],
        }
    }

    pub fn validate(&self, kind: BlueprintAgentKind) -> SimResult<()> {
        let invalid = |field: &'static str, value: f64| SimError::InvalidBlueprint {
            kind: kind.as_str().to_string(),
            field,
            value,
        };

        if !SPEED_RANGE.contains(&self.speed) {
            return Err(invalid("speed", self.speed));
        }
        if !CAPACITY_RANGE.contains(&self.capacity) {
            return Err(invalid("capacity", self.capacity as f64));
        }
        if !WEAR_RATE_RANGE.contains(&self.wear_rate) {
            return Err(invalid("wearRate", self.wear_rate));
        }
        if !MAINTENANCE_THRESHOLD_RANGE.contains(&self.maintenance_threshold) {
            return Err(invalid("maintenanceThreshold", self.maintenance_threshold));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintSet {
    pub courier_bot: AgentBlueprint,
    pub minibus:     AgentBlueprint,
}

impl Default for BlueprintSet {
    fn default() -> Self {
        Self {
            courier_bot: AgentBlueprint::default_courier(),
            minibus:     AgentBlueprint::default_minibus(),
        }
    }
}

impl BlueprintSet {
    pub fn get(&self, kind: BlueprintAgentKind) -> &AgentBlueprint {
        match kind {
            BlueprintAgentKind::CourierBot => &self.courier_bot,
            BlueprintAgentKind::Minibus    => &self.minibus,
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        self.courier_bot.validate(BlueprintAgentKind::CourierBot)?;
        self.minibus.validate(BlueprintAgentKind::Minibus)
    }

    /// Replace one blueprint after validating it. The set is untouched on error.
    pub fn replace(&mut self, kind: BlueprintAgentKind, blueprint: AgentBlueprint) -> SimResult<()> {
        blueprint.validate(kind)?;
        match kind {
            BlueprintAgentKind::CourierBot => self.courier_bot = blueprint,
            BlueprintAgentKind::Minibus    => self.minibus = blueprint,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(BlueprintSet::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_speed_is_rejected() {
        let mut blueprint = AgentBlueprint::default_minibus();
        blueprint.speed = 9.0;
        let err = blueprint.validate(BlueprintAgentKind::Minibus).unwrap_err();
        assert!(matches!(err, SimError::InvalidBlueprint { field: "speed", .. }));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut blueprint = AgentBlueprint::default_courier();
        blueprint.capacity = 0;
        assert!(blueprint.validate(BlueprintAgentKind::CourierBot).is_err());
    }

    #[test]
    fn invalid_replacement_leaves_set_unchanged() {
        let mut set = BlueprintSet::default();
        let mut bad = AgentBlueprint::default_minibus();
        bad.maintenance_threshold = 0.99;

        assert!(set.replace(BlueprintAgentKind::Minibus, bad).is_err());
        assert_eq!(set, BlueprintSet::default());
    }

    #[test]
    fn missing_policy_ids_default_to_empty() {
        let json = r#"{"speed":2,"capacity":30,"wearRate":0.001,"maintenanceThreshold":0.5}"#;
        let blueprint: AgentBlueprint = serde_json::from_str(json).unwrap();
        assert!(blueprint.policy_ids.is_empty());
        assert!(blueprint.validate(BlueprintAgentKind::Minibus).is_ok());
    }
}
