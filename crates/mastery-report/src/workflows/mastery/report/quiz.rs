use crate::workflows::mastery::catalog::OutcomeCatalog;
use crate::workflows::mastery::policy::PolicyFilter;
use crate::workflows::mastery::student::{OutcomeResult, StudentRecord};
use std::fmt::Write as _;

/// Section label shown for students the roster places in no section.
pub const UNSECTIONED_LABEL: &str = "Both";

const APPRENTICE_MARK: &str = "apprentice";

#[derive(Debug, Clone)]
struct QuizItem {
    code: String,
    stem: String,
    index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizProblem {
    pub stem: String,
    /// Raw score sits exactly at the apprentice level.
    pub apprentice: bool,
}

/// What one student's quiz contains, in policy file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizSelection {
    pub mastered: Vec<String>,
    pub problems: Vec<QuizProblem>,
}

/// Builds per-student quiz fragments restricted to outcomes not yet mastered.
#[derive(Debug, Clone)]
pub struct QuizRenderer {
    items: Vec<QuizItem>,
    apprentice_score: Option<f64>,
    outcome_count: usize,
}

impl QuizRenderer {
    pub fn new(catalog: &OutcomeCatalog, policy: &PolicyFilter) -> Self {
        let items = policy
            .active()
            .iter()
            .filter_map(|entry| {
                catalog.get(&entry.key).map(|outcome| QuizItem {
                    code: outcome.outcome_code.clone(),
                    stem: entry.render_stem.clone(),
                    index: outcome.index,
                })
            })
            .collect();

        Self {
            items,
            apprentice_score: None,
            outcome_count: catalog.len(),
        }
    }

    /// Marks problems whose raw score equals `score`.
    pub fn with_apprentice_score(mut self, score: f64) -> Self {
        self.apprentice_score = Some(score);
        self
    }

    /// The blank reference student rendered after everyone else.
    pub fn template_student(&self) -> StudentRecord {
        StudentRecord::template(self.outcome_count)
    }

    /// `None` for students without results.
    pub fn select(&self, student: &StudentRecord) -> Option<QuizSelection> {
        let results = student.results()?;
        let mut selection = QuizSelection::default();

        for item in &self.items {
            let result = results
                .get(item.index)
                .copied()
                .unwrap_or(OutcomeResult::unmastered());
            if result.mastered {
                selection.mastered.push(item.code.clone());
            } else {
                selection.problems.push(QuizProblem {
                    stem: item.stem.clone(),
                    apprentice: self.is_apprentice(result.score),
                });
            }
        }

        Some(selection)
    }

    fn is_apprentice(&self, score: f64) -> bool {
        self.apprentice_score
            .map(|level| (score - level).abs() < f64::EPSILON)
            .unwrap_or(false)
    }

    /// Document fragment for one student. `section` is appended to the running
    /// header when sections are known.
    pub fn render(&self, student: &StudentRecord, section: Option<&str>) -> Option<String> {
        let selection = self.select(student)?;
        let mut fragment = String::new();

        fragment.push_str("\\setcounter{page}{1}\n\\markright{");
        fragment.push_str(&student.name);
        if let Some(section) = section {
            write!(fragment, " ({section})").expect("write section");
        }
        fragment.push_str("}\n\n");

        fragment.push_str("\\header\n\n");
        fragment.push_str("\\begin{enumerate}\n");
        writeln!(fragment, "\\objMastery{{{}}}\n", selection.mastered.join(", "))
            .expect("write mastered list");

        for problem in &selection.problems {
            let mark = if problem.apprentice { APPRENTICE_MARK } else { "" };
            writeln!(fragment, "\\obj{}{{{}}}", problem.stem, mark).expect("write problem");
        }
        fragment.push_str("\\end{enumerate}\n\n\\cleardoublepage \n\n");

        Some(fragment)
    }
}
