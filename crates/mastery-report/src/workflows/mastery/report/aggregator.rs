use super::super::catalog::OutcomeKey;
use super::super::policy::PolicyFilter;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Pass/not-yet counts for one outcome across the run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutcomeStat {
    pub mastered: usize,
    pub not_yet: usize,
}

/// Run-wide accumulator. Create one per run, hand it to every render in
/// student order, read it at the end.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    stats: HashMap<OutcomeKey, OutcomeStat>,
    levels: BTreeMap<u32, usize>,
    students: usize,
    mastered: usize,
    points: u64,
}

impl Aggregator {
    /// Zeroed statistics for every active outcome.
    pub fn for_policy(policy: &PolicyFilter) -> Self {
        Self {
            stats: policy
                .active()
                .iter()
                .map(|entry| (entry.key.clone(), OutcomeStat::default()))
                .collect(),
            ..Self::default()
        }
    }

    pub(crate) fn record_outcome(&mut self, key: &OutcomeKey, mastered: bool) {
        let stat = self.stats.entry(key.clone()).or_default();
        if mastered {
            stat.mastered += 1;
        } else {
            stat.not_yet += 1;
        }
    }

    pub(crate) fn record_student(
        &mut self,
        mastered: usize,
        points: u32,
        levels: &BTreeMap<u32, usize>,
    ) {
        self.students += 1;
        self.mastered += mastered;
        self.points += u64::from(points);
        for (level, count) in levels {
            *self.levels.entry(*level).or_default() += count;
        }
    }

    pub fn stat(&self, key: &OutcomeKey) -> Option<OutcomeStat> {
        self.stats.get(key).copied()
    }

    /// Students whose results went through the aggregation path.
    pub fn students(&self) -> usize {
        self.students
    }

    pub fn total_mastered(&self) -> usize {
        self.mastered
    }

    pub fn total_points(&self) -> u64 {
        self.points
    }

    /// Mastered outcomes per whole-point score.
    pub fn levels(&self) -> &BTreeMap<u32, usize> {
        &self.levels
    }
}
