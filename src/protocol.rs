use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::error::Result;
use crate::polynomial::Polynomial;

/// Orchestrator to worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Command {
    Start { config: SearchConfig },
    Stop,
}

/// A polynomial whose evaluation passed the closeness test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// Constant term first.
    pub coefficients: Vec<u64>,
    pub degree: usize,
    pub evaluation: String,
    /// Evaluations done when this match was found, itself included.
    pub tested: u64,
    pub skipped_regions: u64,
}

impl Match {
    pub fn polynomial(&self) -> Result<Polynomial> {
        Polynomial::new(self.coefficients.clone())
    }
}

/// Worker to orchestrator. Every session ends with exactly one of
/// `Complete`, `Stopped` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SearchEvent {
    #[serde(rename_all = "camelCase")]
    Progress {
        degree: usize,
        tested: u64,
        /// Only known for bounded searches.
        total: Option<u64>,
        percentage: Option<f64>,
        current_max_coeff: u64,
        skipped_regions: u64,
    },
    Match(Match),
    #[serde(rename_all = "camelCase")]
    Optimization {
        message: String,
        skipped_regions: u64,
    },
    #[serde(rename_all = "camelCase")]
    Complete { tested: u64, time_elapsed_ms: u64 },
    #[serde(rename = "search-stopped", rename_all = "camelCase")]
    Stopped { tested: u64, skipped_regions: u64 },
    Error { message: String },
}

impl SearchEvent {
    /// True for the event that ends a session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SearchEvent::Complete { .. } | SearchEvent::Stopped { .. } | SearchEvent::Error { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let event = SearchEvent::Stopped {
            tested: 42,
            skipped_regions: 3,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "search-stopped", "tested": 42, "skippedRegions": 3 })
        );

        let event = SearchEvent::Progress {
            degree: 2,
            tested: 100,
            total: None,
            percentage: None,
            current_max_coeff: 4,
            skipped_regions: 0,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "progress",
                "degree": 2,
                "tested": 100,
                "total": null,
                "percentage": null,
                "currentMaxCoeff": 4,
                "skippedRegions": 0
            })
        );
    }

    #[test]
    fn test_match_event_is_flat() {
        let event = SearchEvent::Match(Match {
            coefficients: vec![1, 1],
            degree: 1,
            evaluation: "1.110001".to_string(),
            tested: 7,
            skipped_regions: 0,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "match");
        assert_eq!(value["coefficients"], json!([1, 1]));

        let back: SearchEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_command_wire_format() {
        let stop: Command = serde_json::from_str(r#"{"type":"stop"}"#).unwrap();
        assert_eq!(stop, Command::Stop);

        let start = Command::Start {
            config: SearchConfig::default(),
        };
        let value = serde_json::to_value(&start).unwrap();
        assert_eq!(value["type"], "start");
        assert_eq!(value["config"]["precision"], 50);
    }

    #[test]
    fn test_terminal_events() {
        assert!(SearchEvent::Error {
            message: "x".to_string()
        }
        .is_terminal());
        assert!(!SearchEvent::Optimization {
            message: "x".to_string(),
            skipped_regions: 1
        }
        .is_terminal());
    }
}
