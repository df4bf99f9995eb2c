use serde::Serialize;

/// Score for one outcome and whether it counts as mastered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutcomeResult {
    pub score: f64,
    pub mastered: bool,
}

impl OutcomeResult {
    pub const fn unmastered() -> Self {
        Self {
            score: 0.0,
            mastered: false,
        }
    }

    /// Whole points earned, as used by the graded scale.
    pub fn points(&self) -> u32 {
        if self.score.is_finite() && self.score > 0.0 {
            self.score.trunc() as u32
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentRecord {
    pub id: String,
    /// Full name, "First [Middle...] Last".
    pub name: String,
    pub email_local_part: Option<String>,
    pub section: Option<String>,
    results: Option<Vec<OutcomeResult>>,
}

impl StudentRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email_local_part: None,
            section: None,
            results: None,
        }
    }

    /// Blank reference copy rendered after every quiz run.
    pub fn template(outcome_count: usize) -> Self {
        let mut record = Self::new("", "Problem Template");
        record.set_results(vec![OutcomeResult::unmastered(); outcome_count]);
        record
    }

    pub fn has_results(&self) -> bool {
        self.results.is_some()
    }

    pub fn results(&self) -> Option<&[OutcomeResult]> {
        self.results.as_deref()
    }

    pub fn result(&self, index: usize) -> Option<&OutcomeResult> {
        self.results.as_ref().and_then(|results| results.get(index))
    }

    pub fn set_results(&mut self, results: Vec<OutcomeResult>) {
        self.results = Some(results);
    }

    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("")
    }

    /// Last whitespace-separated token of the name.
    pub fn surname(&self) -> &str {
        self.name.split_whitespace().last().unwrap_or("")
    }

    /// All tokens but the last, joined with single spaces.
    pub fn given_names(&self) -> String {
        let tokens: Vec<&str> = self.name.split_whitespace().collect();
        match tokens.split_last() {
            Some((_, given)) => given.join(" "),
            None => String::new(),
        }
    }

    /// Lowercased surname followed by given names, no spaces: the output job
    /// name for this student's quiz.
    pub fn job_name(&self) -> String {
        format!("{}{}", self.surname(), self.given_names().replace(' ', "")).to_lowercase()
    }

    pub fn matches_filter(&self, filter: &str) -> bool {
        filter.is_empty() || self.name.to_lowercase().contains(&filter.to_lowercase())
    }
}
