use serde::{Deserialize, Serialize};

use crate::{blueprint::BlueprintSet, map_gen::MapSize, types::Money};

pub const CONFIG_FILE: &str = "sim_config.json";
pub const SNAPSHOT_BUDGET_BYTES: usize = 180_000;

/// Run-level settings. Game rules (costs, intervals, thresholds) are
/// constants in the modules that apply them and are not configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimConfig {
    pub seed:                   u64,
    pub map_size:               MapSize,
    pub starting_money:         Money,
    pub auto_expansion_enabled: bool,
    /// Snapshots whose JSON exceeds this many bytes are flagged over budget.
    pub snapshot_budget_bytes:  usize,
    pub blueprints:             BlueprintSet,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed:                   1,
            map_size:               MapSize::default(),
            starting_money:         800,
            auto_expansion_enabled: true,
            snapshot_budget_bytes:  SNAPSHOT_BUDGET_BYTES,
            blueprints:             BlueprintSet::default(),
        }
    }
}

impl SimConfig {
    /// Load from the data/ directory. Missing fields fall back to defaults.
    /// In tests, use SimConfig::default().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/{CONFIG_FILE}");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: SimConfig = serde_json::from_str(&content)?;

        config
            .blueprints
            .validate()
            .map_err(|e| anyhow::anyhow!("{path}: {e}"))?;
        if config.map_size.width <= 0 || config.map_size.height <= 0 {
            anyhow::bail!("{path}: map size must be positive, got {:?}", config.map_size);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults_for_missing_fields() {
        let config: SimConfig = serde_json::from_str(r#"{"startingMoney": 1500}"#).unwrap();
        assert_eq!(config.starting_money, 1500);
        assert_eq!(config.map_size, MapSize::default());
        assert!(config.auto_expansion_enabled);
        assert_eq!(config.blueprints, BlueprintSet::default());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = SimConfig::load("/definitely/not/here").unwrap_err();
        assert!(err.to_string().contains("Cannot read"));
    }
}
