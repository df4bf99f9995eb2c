use super::aggregator::Aggregator;
use super::layout::ReportLayout;
use super::views::{OutcomeStatEntry, StatisticsView};
use crate::workflows::mastery::catalog::OutcomeCatalog;
use crate::workflows::mastery::policy::PolicyFilter;
use crate::workflows::mastery::student::{OutcomeResult, StudentRecord};
use std::collections::BTreeMap;
use std::fmt::Write as _;

const MASTERED_LABEL: &str = "Mastered";
const HALF_CREDIT_LABEL: &str = "1/2";
const NO_CREDIT_LABEL: &str = "0/2";

/// Label for a whole-point score on the graded scale.
pub fn scale_label(points: u32) -> Option<&'static str> {
    match points {
        0 => Some("Not Yet"),
        1 => Some("Satisfied"),
        2 => Some("Apprentice"),
        3 => Some("Journey"),
        4 => Some("Mastery"),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressStyle {
    /// Mastered outcomes read "Mastered"; each group ends with its count.
    #[default]
    Binary,
    /// Mastered outcomes carry their scale label; the trailer tallies points.
    Graded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTally {
    pub code: String,
    pub mastered: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentTally {
    pub mastered: usize,
    pub points: u32,
    pub groups: Vec<GroupTally>,
    /// Mastered outcomes per whole-point score (graded style only).
    pub levels: BTreeMap<u32, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedProgress {
    pub text: String,
    /// `None` when the student had no results and nothing was aggregated.
    pub tally: Option<StudentTally>,
}

/// Renders the grouped per-student progress listing.
#[derive(Debug, Clone)]
pub struct ProgressRenderer {
    layout: ReportLayout,
    style: ProgressStyle,
}

impl ProgressRenderer {
    pub fn new(catalog: &OutcomeCatalog, policy: &PolicyFilter, style: ProgressStyle) -> Self {
        Self {
            layout: ReportLayout::build(catalog, policy),
            style,
        }
    }

    pub fn style(&self) -> ProgressStyle {
        self.style
    }

    pub fn render(&self, student: &StudentRecord, aggregator: &mut Aggregator) -> RenderedProgress {
        let Some(results) = student.results() else {
            return RenderedProgress {
                text: format!("{} (No Results)", student.name),
                tally: None,
            };
        };

        let result_at = |index: usize| {
            results
                .get(index)
                .copied()
                .unwrap_or(OutcomeResult::unmastered())
        };

        let mut text = String::new();
        let mut tally = StudentTally::default();

        for group in &self.layout.groups {
            writeln!(text, "{}: {}", group.code, group.title).expect("write group header");
            let mut group_tally = GroupTally {
                code: group.code.clone(),
                mastered: 0,
                total: 0,
            };

            for outcome in &group.outcomes {
                group_tally.total += 1;
                let result = result_at(outcome.index);
                aggregator.record_outcome(&outcome.key, result.mastered);

                let progress = if result.mastered {
                    group_tally.mastered += 1;
                    tally.mastered += 1;
                    self.mastered_label(&result, &mut tally)
                } else {
                    match outcome.partial_index {
                        Some(linked) if result_at(linked).mastered => HALF_CREDIT_LABEL,
                        Some(_) => NO_CREDIT_LABEL,
                        None => "",
                    }
                };

                writeln!(text, "  {} {}: {}", outcome.code, outcome.title, progress)
                    .expect("write outcome line");
            }

            match self.style {
                ProgressStyle::Binary => writeln!(
                    text,
                    "Mastered Objectives in Group: {} out of {}\n",
                    group_tally.mastered, group_tally.total
                )
                .expect("write group summary"),
                ProgressStyle::Graded => text.push('\n'),
            }
            tally.groups.push(group_tally);
        }

        self.write_trailer(&mut text, &tally);
        aggregator.record_student(tally.mastered, tally.points, &tally.levels);

        RenderedProgress {
            text,
            tally: Some(tally),
        }
    }

    fn mastered_label(&self, result: &OutcomeResult, tally: &mut StudentTally) -> &'static str {
        match self.style {
            ProgressStyle::Binary => MASTERED_LABEL,
            ProgressStyle::Graded => {
                let points = result.points();
                tally.points += points;
                if points > 0 {
                    *tally.levels.entry(points).or_default() += 1;
                }
                scale_label(points).unwrap_or(MASTERED_LABEL)
            }
        }
    }

    fn write_trailer(&self, text: &mut String, tally: &StudentTally) {
        if self.style == ProgressStyle::Graded {
            text.push_str("\nOverall Summary:\n");
            for points in 1..=4 {
                let Some(label) = scale_label(points) else {
                    continue;
                };
                let count = tally.levels.get(&points).copied().unwrap_or(0);
                if count > 0 {
                    writeln!(
                        text,
                        "  Number of \"{label}\" outcomes ({points} pt each): {count}"
                    )
                    .expect("write level count");
                }
            }
        }

        writeln!(text, "Total Number of Mastered Objectives: {}", tally.mastered)
            .expect("write mastered total");

        if self.style == ProgressStyle::Graded {
            writeln!(text, "Total Number of Mastery Points: {}", tally.points)
                .expect("write points total");
        }
    }

    /// Per-outcome pass/not-yet table in display order.
    pub fn statistics_report(&self, aggregator: &Aggregator) -> String {
        let mut report = String::new();
        for outcome in self.layout.outcomes() {
            let stat = aggregator.stat(&outcome.key).unwrap_or_default();
            writeln!(
                report,
                "{}: Passed = {}, Not Yet={}",
                outcome.key, stat.mastered, stat.not_yet
            )
            .expect("write statistics line");
        }
        report
    }

    pub fn statistics_view(&self, aggregator: &Aggregator) -> StatisticsView {
        let outcomes = self
            .layout
            .outcomes()
            .map(|outcome| {
                let stat = aggregator.stat(&outcome.key).unwrap_or_default();
                OutcomeStatEntry {
                    code: outcome.key.to_string(),
                    group: outcome.key.group.clone(),
                    outcome: outcome.key.outcome.clone(),
                    mastered: stat.mastered,
                    not_yet: stat.not_yet,
                }
            })
            .collect();

        StatisticsView {
            students: aggregator.students(),
            total_mastered: aggregator.total_mastered(),
            total_points: aggregator.total_points(),
            outcomes,
            levels: StatisticsView::level_counts(aggregator.levels()),
        }
    }
}
