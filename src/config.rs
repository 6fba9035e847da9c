use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::closeness::{epsilon_digits, ClosenessTest, EpsilonCloseness, ExactDigitCloseness};
use crate::constants::EvaluationPoint;
use crate::decimal::{Arithmetic, Decimal};
use crate::error::{RecoveryError, Result};

pub const MIN_PRECISION: u32 = 10;
pub const MAX_PRECISION: u32 = 200;

/// How close an evaluation has to be to the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ClosenessPolicy {
    /// `epsilon` is a decimal string so it keeps every digit.
    Epsilon { epsilon: String },
    ExactDigits { digits: u32 },
}

impl ClosenessPolicy {
    pub fn tester(&self, arith: Arithmetic) -> Result<Box<dyn ClosenessTest>> {
        match self {
            ClosenessPolicy::Epsilon { epsilon } => {
                let epsilon: Decimal = epsilon.parse()?;
                Ok(Box::new(EpsilonCloseness::new(epsilon, arith)?))
            }
            ClosenessPolicy::ExactDigits { digits } => {
                Ok(Box::new(ExactDigitCloseness::new(*digits)))
            }
        }
    }

    /// Decimal places the policy effectively compares.
    pub fn compared_digits(&self) -> Option<u32> {
        match self {
            ClosenessPolicy::Epsilon { epsilon } => epsilon
                .parse::<Decimal>()
                .ok()
                .map(|epsilon| epsilon_digits(&epsilon)),
            ClosenessPolicy::ExactDigits { digits } => Some(*digits),
        }
    }
}

impl fmt::Display for ClosenessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosenessPolicy::Epsilon { epsilon } => write!(f, "epsilon {}", epsilon),
            ClosenessPolicy::ExactDigits { digits } => write!(f, "{} exact digits", digits),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Strategy {
    /// Exhaustive over every degree up to `max_degree` and every
    /// coefficient up to `max_coeff`.
    #[serde(rename_all = "camelCase")]
    Bounded { max_degree: usize, max_coeff: u64 },
    /// Zig-zag over ever larger regions, `batch_size` candidates per visit,
    /// until stopped.
    #[serde(rename_all = "camelCase")]
    Unbounded { batch_size: u64 },
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Bounded {
                max_degree,
                max_coeff,
            } => write!(f, "bounded (degree ≤ {}, coefficients ≤ {})", max_degree, max_coeff),
            Strategy::Unbounded { batch_size } => {
                write!(f, "unbounded (batch size {})", batch_size)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    pub target_value: String,
    pub precision: u32,
    pub closeness: ClosenessPolicy,
    pub strategy: Strategy,
    #[serde(default)]
    pub evaluation_point: EvaluationPoint,
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

fn default_progress_interval() -> u64 {
    100
}

impl Default for SearchConfig {
    /// `1 + x` at Liouville's constant, found in the first few regions.
    fn default() -> Self {
        SearchConfig {
            target_value: "1.110001000000000000000001".to_string(),
            precision: 50,
            closeness: ClosenessPolicy::Epsilon {
                epsilon: "1e-40".to_string(),
            },
            strategy: Strategy::Bounded {
                max_degree: 3,
                max_coeff: 5,
            },
            evaluation_point: EvaluationPoint::default(),
            progress_interval: default_progress_interval(),
        }
    }
}

impl SearchConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        crate::io_utils::load_from_file(path)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        crate::io_utils::save_to_file(self, path)
    }

    /// Check every parameter, reporting all problems at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.target_value.parse::<Decimal>() {
            errors.push(format!("target value: {}", e));
        }

        if !(MIN_PRECISION..=MAX_PRECISION).contains(&self.precision) {
            errors.push(format!(
                "precision must be between {} and {} digits, got {}",
                MIN_PRECISION, MAX_PRECISION, self.precision
            ));
        }

        match &self.closeness {
            ClosenessPolicy::Epsilon { epsilon } => match epsilon.parse::<Decimal>() {
                Ok(value) if value.is_positive() => {}
                Ok(_) => errors.push(format!("epsilon must be positive, got {}", epsilon)),
                Err(e) => errors.push(format!("epsilon: {}", e)),
            },
            ClosenessPolicy::ExactDigits { digits } => {
                if *digits == 0 || *digits > MAX_PRECISION {
                    errors.push(format!(
                        "exact digit count must be between 1 and {}, got {}",
                        MAX_PRECISION, digits
                    ));
                }
            }
        }

        match self.strategy {
            Strategy::Bounded { max_coeff, .. } if max_coeff < 1 => {
                errors.push("maxCoeff must be at least 1".to_string());
            }
            Strategy::Unbounded { batch_size } if batch_size < 1 => {
                errors.push("batchSize must be at least 1".to_string());
            }
            _ => {}
        }

        if self.progress_interval < 1 {
            errors.push("progressInterval must be at least 1".to_string());
        }

        if let EvaluationPoint::Custom(text) = &self.evaluation_point {
            match text.parse::<Decimal>() {
                Ok(x) if !x.is_positive() || x == Decimal::one() => errors.push(format!(
                    "custom evaluation point must be positive and different from 1, got {}",
                    text
                )),
                Ok(_) => {}
                Err(e) => errors.push(format!("evaluation point: {}", e)),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RecoveryError::Configuration(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SearchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_reports_every_problem() {
        let config = SearchConfig {
            target_value: "abc".to_string(),
            precision: 5,
            closeness: ClosenessPolicy::Epsilon {
                epsilon: "0".to_string(),
            },
            strategy: Strategy::Bounded {
                max_degree: 2,
                max_coeff: 0,
            },
            ..SearchConfig::default()
        };

        match config.validate() {
            Err(RecoveryError::Configuration(errors)) => assert_eq!(errors.len(), 4),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_precision_range() {
        for (precision, valid) in [(9, false), (10, true), (200, true), (201, false)] {
            let config = SearchConfig {
                precision,
                ..SearchConfig::default()
            };
            assert_eq!(config.validate().is_ok(), valid, "precision {}", precision);
        }
    }

    #[test]
    fn test_unbounded_batch_size() {
        let config = SearchConfig {
            strategy: Strategy::Unbounded { batch_size: 0 },
            ..SearchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_exponents_rejected() {
        let config = SearchConfig {
            target_value: "1e4294967296".to_string(),
            closeness: ClosenessPolicy::Epsilon {
                epsilon: "1e-1000000000".to_string(),
            },
            ..SearchConfig::default()
        };
        match config.validate() {
            Err(RecoveryError::Configuration(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors[0].contains("exponent"), "{}", errors[0]);
            }
            other => panic!("expected a configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_point_must_not_be_one() {
        let config = SearchConfig {
            evaluation_point: "1.0".parse().unwrap(),
            ..SearchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_layout() {
        let json = r#"{
            "targetValue": "2.5",
            "precision": 30,
            "closeness": { "kind": "exactDigits", "digits": 12 },
            "strategy": { "kind": "unbounded", "batchSize": 500 }
        }"#;
        let config: SearchConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.closeness, ClosenessPolicy::ExactDigits { digits: 12 });
        assert_eq!(config.strategy, Strategy::Unbounded { batch_size: 500 });
        assert_eq!(config.evaluation_point, EvaluationPoint::default());
        assert_eq!(config.progress_interval, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_compared_digits() {
        let policy = ClosenessPolicy::Epsilon {
            epsilon: "1e-40".to_string(),
        };
        assert_eq!(policy.compared_digits(), Some(40));
        assert_eq!(ClosenessPolicy::ExactDigits { digits: 7 }.compared_digits(), Some(7));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join("polyrecover_config_test.json");
        let config = SearchConfig::default();
        config.save_to_file(&path).unwrap();
        let loaded = SearchConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }
}
