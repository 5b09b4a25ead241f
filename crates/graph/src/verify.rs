use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const NODE_LABELS: [&str; 7] = [
    "Drug", "Disease", "Biomarker", "Test", "Cancer", "Law", "Article",
];

pub const RELATIONSHIP_TYPES: [&str; 9] = [
    "HAS_BIOMARKER",
    "TESTED_BY",
    "TARGETS",
    "INDICATED_FOR",
    "CANCER_TYPE",
    "IS_A",
    "HAS_CHILD",
    "REFERS_TO",
    "CROSS_LAW_REFERS_TO",
];

/// Counts read back from the store after a load.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub node_counts: BTreeMap<String, i64>,
    pub relationship_counts: BTreeMap<String, i64>,
}

impl VerificationReport {
    pub fn total_nodes(&self) -> i64 {
        self.node_counts.values().sum()
    }

    pub fn total_relationships(&self) -> i64 {
        self.relationship_counts.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_with_counts() {
        let mut report = VerificationReport::default();
        report.node_counts.insert("Drug".to_string(), 3);
        report.relationship_counts.insert("TARGETS".to_string(), 5);

        let json = serde_json::to_string(&report).unwrap();
        let back: VerificationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.node_counts["Drug"], 3);
        assert_eq!(back.total_relationships(), 5);
    }
}
