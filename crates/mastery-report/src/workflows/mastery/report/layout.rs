use super::super::catalog::{OutcomeCatalog, OutcomeKey};
use super::super::policy::PolicyFilter;

#[derive(Debug, Clone)]
pub(crate) struct LayoutOutcome {
    pub(crate) key: OutcomeKey,
    pub(crate) code: String,
    pub(crate) title: String,
    pub(crate) index: usize,
    /// Catalog index of the partial-credit outcome, if any.
    pub(crate) partial_index: Option<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct LayoutGroup {
    pub(crate) code: String,
    pub(crate) title: String,
    pub(crate) outcomes: Vec<LayoutOutcome>,
}

/// Active outcomes in display order: groups by code, outcomes by decomposed
/// code. Groups without an active outcome are left out entirely.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReportLayout {
    pub(crate) groups: Vec<LayoutGroup>,
}

impl ReportLayout {
    pub(crate) fn build(catalog: &OutcomeCatalog, policy: &PolicyFilter) -> Self {
        let groups = catalog
            .groups()
            .filter_map(|group| {
                let outcomes: Vec<LayoutOutcome> = catalog
                    .display_order(group)
                    .into_iter()
                    .filter(|outcome| policy.is_active(&outcome.key()))
                    .map(|outcome| {
                        let key = outcome.key();
                        let partial_index = policy
                            .partial_link(&key)
                            .and_then(|link| catalog.get(link))
                            .map(|linked| linked.index);
                        LayoutOutcome {
                            key,
                            code: outcome.outcome_code.clone(),
                            title: outcome.outcome_title.clone(),
                            index: outcome.index,
                            partial_index,
                        }
                    })
                    .collect();

                if outcomes.is_empty() {
                    None
                } else {
                    Some(LayoutGroup {
                        code: group.code.clone(),
                        title: group.title.clone(),
                        outcomes,
                    })
                }
            })
            .collect();

        Self { groups }
    }

    pub(crate) fn outcomes(&self) -> impl Iterator<Item = &LayoutOutcome> {
        self.groups.iter().flat_map(|group| group.outcomes.iter())
    }
}
