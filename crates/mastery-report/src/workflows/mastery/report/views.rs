use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeStatEntry {
    /// Qualified `group.outcome` code.
    pub code: String,
    pub group: String,
    pub outcome: String,
    pub mastered: usize,
    pub not_yet: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelCountEntry {
    pub points: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<&'static str>,
    pub count: usize,
}

/// End-of-run statistics in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatisticsView {
    pub students: usize,
    pub total_mastered: usize,
    pub total_points: u64,
    pub outcomes: Vec<OutcomeStatEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub levels: Vec<LevelCountEntry>,
}

impl StatisticsView {
    pub fn level_counts(levels: &BTreeMap<u32, usize>) -> Vec<LevelCountEntry> {
        levels
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(points, count)| LevelCountEntry {
                points: *points,
                label: super::progress::scale_label(*points),
                count: *count,
            })
            .collect()
    }
}
