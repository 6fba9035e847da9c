use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::SearchConfig;
use crate::protocol::Match;

/// How a search session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Complete,
    SearchStopped,
    Error,
}

/// Summary of one search, written after it ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReport {
    pub config: SearchConfig,
    pub outcome: Outcome,
    pub tested: u64,
    pub skipped_regions: u64,
    pub matches: Vec<Match>,
    /// Formatted polynomials, one per match, highest power first.
    pub polynomials: Vec<String>,
    pub elapsed_secs: f64,
    pub timestamp: String,
}

impl SearchReport {
    /// Create a report stamped with the current local time
    ///
    /// # Examples
    ///
    /// ```
    /// use polyrecover::{Outcome, SearchConfig, SearchReport};
    ///
    /// let report = SearchReport::new(SearchConfig::default(), Outcome::Complete, 120, 4, Vec::new(), 0.25);
    /// assert!(report.polynomials.is_empty());
    /// ```
    pub fn new(
        config: SearchConfig,
        outcome: Outcome,
        tested: u64,
        skipped_regions: u64,
        matches: Vec<Match>,
        elapsed_secs: f64,
    ) -> Self {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let polynomials = matches
            .iter()
            .map(|found| match found.polynomial() {
                Ok(polynomial) => polynomial.to_string(),
                Err(_) => format!("{:?}", found.coefficients),
            })
            .collect();

        SearchReport {
            config,
            outcome,
            tested,
            skipped_regions,
            matches,
            polynomials,
            elapsed_secs,
            timestamp,
        }
    }

    /// Save report to a JSON file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        crate::io_utils::save_to_file(self, path)
    }

    /// Load report from a JSON file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        crate::io_utils::load_from_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_round_trip_through_file() {
        let found = Match {
            coefficients: vec![1, 1],
            degree: 1,
            evaluation: "1.110001000000000000000001".to_string(),
            tested: 4,
            skipped_regions: 1,
        };
        let report = SearchReport::new(
            SearchConfig::default(),
            Outcome::Complete,
            1350,
            3,
            vec![found],
            0.5,
        );
        assert_eq!(report.polynomials, vec!["x + 1".to_string()]);

        let path = std::env::temp_dir().join("polyrecover_report_test.json");
        report.save(&path).unwrap();
        let loaded = SearchReport::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.outcome, Outcome::Complete);
        assert_eq!(loaded.matches, report.matches);
        assert_eq!(loaded.timestamp, report.timestamp);
    }

    #[test]
    fn test_outcome_names() {
        assert_eq!(
            serde_json::to_string(&Outcome::SearchStopped).unwrap(),
            "\"search-stopped\""
        );
    }
}
