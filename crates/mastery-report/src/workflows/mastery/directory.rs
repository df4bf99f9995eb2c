use super::ordering::{order_students, StudentOrder};
use super::student::{OutcomeResult, StudentRecord};
use std::collections::HashMap;
use tracing::warn;

/// Students keyed by institutional id, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct StudentDirectory {
    records: Vec<StudentRecord>,
    by_id: HashMap<String, usize>,
}

impl StudentDirectory {
    /// Later duplicates of an id replace the earlier record's contact fields.
    pub fn from_records(records: Vec<StudentRecord>) -> Self {
        let mut directory = Self::default();
        for record in records {
            match directory.by_id.get(&record.id) {
                Some(position) => directory.records[*position] = record,
                None => {
                    directory
                        .by_id
                        .insert(record.id.clone(), directory.records.len());
                    directory.records.push(record);
                }
            }
        }
        directory
    }

    /// Stores results on the student with `id`. Returns `true` when no such
    /// student existed and a bare record was created.
    pub fn attach_results(&mut self, id: &str, name: &str, results: Vec<OutcomeResult>) -> bool {
        if let Some(position) = self.by_id.get(id) {
            let record = &mut self.records[*position];
            if record.has_results() {
                warn!(student = %name, id, "mastery export repeats this id; keeping the later row");
            }
            record.set_results(results);
            return false;
        }

        let mut record = StudentRecord::new(id, name);
        record.set_results(results);
        self.by_id.insert(id.to_string(), self.records.len());
        self.records.push(record);
        true
    }

    pub fn get(&self, id: &str) -> Option<&StudentRecord> {
        self.by_id.get(id).map(|position| &self.records[*position])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StudentRecord> {
        self.records.iter()
    }

    pub fn ordered(&self, order: StudentOrder) -> Vec<&StudentRecord> {
        order_students(&self.records, order)
    }
}
