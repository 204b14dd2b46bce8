//! Solver configuration.
//!
//! Every section has defaults, so a JSON file only needs the fields it
//! changes. Single fields can then be overridden with `key=value` strings,
//! either by bare field name (`seed=7`) or qualified by section
//! (`local_search.seed=7`).

use crate::cost::CostConfig;
use crate::error::{Result, SolverError};
use crate::heuristics::construction::ConstructionConfig;
use crate::heuristics::local_search::LocalSearchConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub cost: CostConfig,
    pub construction: ConstructionConfig,
    pub local_search: LocalSearchConfig,
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SolverError::InvalidConfig(format!("bad value '{}' for {}", value, key)))
}

impl SolverConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| SolverError::InvalidConfig(e.to_string()))
    }

    /// Apply one `key=value` override
    pub fn apply_param(&mut self, param: &str) -> Result<()> {
        let (key, value) = param
            .split_once('=')
            .ok_or_else(|| SolverError::InvalidConfig(format!("expected key=value, got '{}'", param)))?;
        let key = key.trim();
        let field = key.rsplit('.').next().unwrap_or(key);

        match field {
            "driving_factor" => self.cost.driving_factor = parse_value(key, value)?,
            "walking_factor" => self.cost.walking_factor = parse_value(key, value)?,
            "prune_mst" => self.construction.prune_mst = parse_value(key, value)?,
            "open_weight" => self.construction.facility.open_weight = parse_value(key, value)?,
            "proximity_weight" => {
                self.construction.facility.proximity_weight = parse_value(key, value)?
            }
            "max_iterations" => self.local_search.max_iterations = parse_value(key, value)?,
            "time_limit" => self.local_search.time_limit = parse_value(key, value)?,
            "epsilon" => self.local_search.epsilon = parse_value(key, value)?,
            "epsilon_decay" => self.local_search.epsilon_decay = parse_value(key, value)?,
            "seed" => self.local_search.seed = parse_value(key, value)?,
            "parallel" => {
                let parallel = parse_value(key, value)?;
                self.construction.parallel = parallel;
                self.local_search.parallel = parallel;
            }
            _ => return Err(SolverError::InvalidConfig(format!("unknown parameter '{}'", key))),
        }
        Ok(())
    }

    /// Reject values no solver can work with
    pub fn validate(&self) -> Result<()> {
        let check = |ok: bool, msg: &str| {
            if ok {
                Ok(())
            } else {
                Err(SolverError::InvalidConfig(msg.to_string()))
            }
        };
        check(
            self.cost.driving_factor >= 0.0 && self.cost.driving_factor.is_finite(),
            "driving_factor must be a non-negative number",
        )?;
        check(
            self.cost.walking_factor >= 0.0 && self.cost.walking_factor.is_finite(),
            "walking_factor must be a non-negative number",
        )?;
        check(self.local_search.time_limit >= 0.0, "time_limit must be non-negative")?;
        check(
            (0.0..=1.0).contains(&self.local_search.epsilon),
            "epsilon must lie in [0, 1]",
        )?;
        check(
            (0.0..=1.0).contains(&self.local_search.epsilon_decay),
            "epsilon_decay must lie in [0, 1]",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SolverConfig::from_json(r#"{"local_search": {"seed": 7}}"#).unwrap();
        assert_eq!(config.local_search.seed, 7);
        assert_eq!(config.local_search.max_iterations, 10_000);
        assert_eq!(config.cost, CostConfig::default());
    }

    #[test]
    fn test_bad_json_is_invalid_config() {
        let err = SolverConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, SolverError::InvalidConfig(_)));
    }

    #[test]
    fn test_apply_params() {
        let mut config = SolverConfig::default();
        config.apply_param("epsilon=0.3").unwrap();
        config.apply_param("local_search.max_iterations=12").unwrap();
        config.apply_param("walking_factor = 2.5").unwrap();
        config.apply_param("parallel=false").unwrap();
        assert_eq!(config.local_search.epsilon, 0.3);
        assert_eq!(config.local_search.max_iterations, 12);
        assert_eq!(config.cost.walking_factor, 2.5);
        assert!(!config.construction.parallel);
        assert!(!config.local_search.parallel);
    }

    #[test]
    fn test_rejects_bad_params() {
        let mut config = SolverConfig::default();
        assert!(config.apply_param("seed").is_err());
        assert!(config.apply_param("seed=abc").is_err());
        assert!(config.apply_param("colour=red").is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = SolverConfig::default();
        assert!(config.validate().is_ok());
        config.local_search.epsilon = 1.5;
        assert!(config.validate().is_err());
    }
}
