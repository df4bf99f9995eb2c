use super::student::StudentRecord;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StudentOrder {
    /// Surname, then given names.
    #[default]
    Name,
    /// Section first, then surname and given names within the section.
    SectionThenName,
}

/// Sort key `(section, surname, given names)`; section is empty unless the
/// order is section-aware.
pub fn sort_key(record: &StudentRecord, order: StudentOrder) -> (String, String, String) {
    let section = match order {
        StudentOrder::Name => String::new(),
        StudentOrder::SectionThenName => record.section.clone().unwrap_or_default(),
    };
    (section, record.surname().to_string(), record.given_names())
}

pub fn compare_students(a: &StudentRecord, b: &StudentRecord, order: StudentOrder) -> Ordering {
    sort_key(a, order)
        .cmp(&sort_key(b, order))
        .then_with(|| a.id.cmp(&b.id))
}

/// Deterministic iteration order for a run.
pub fn order_students<'a, I>(records: I, order: StudentOrder) -> Vec<&'a StudentRecord>
where
    I: IntoIterator<Item = &'a StudentRecord>,
{
    let mut ordered: Vec<&StudentRecord> = records.into_iter().collect();
    ordered.sort_by(|a, b| compare_students(a, b, order));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(records: &[&StudentRecord]) -> Vec<String> {
        records.iter().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn same_surname_orders_by_given_name() {
        let students = vec![
            StudentRecord::new("2", "Bob Lee"),
            StudentRecord::new("1", "Ann Lee"),
        ];
        let ordered = order_students(&students, StudentOrder::Name);
        assert_eq!(names(&ordered), vec!["Ann Lee", "Bob Lee"]);
    }

    #[test]
    fn surname_is_the_last_token() {
        let students = vec![
            StudentRecord::new("1", "Amy Zed"),
            StudentRecord::new("2", "Zed Adams"),
        ];
        let ordered = order_students(&students, StudentOrder::Name);
        assert_eq!(names(&ordered), vec!["Zed Adams", "Amy Zed"]);
    }

    #[test]
    fn section_order_groups_by_section_first() {
        let mut late = StudentRecord::new("1", "Amy Adams");
        late.section = Some("0002".to_string());
        let mut early = StudentRecord::new("2", "Zoe Young");
        early.section = Some("0001".to_string());
        let students = vec![late, early];

        let by_name = order_students(&students, StudentOrder::Name);
        assert_eq!(names(&by_name), vec!["Amy Adams", "Zoe Young"]);

        let by_section = order_students(&students, StudentOrder::SectionThenName);
        assert_eq!(names(&by_section), vec!["Zoe Young", "Amy Adams"]);
    }

    #[test]
    fn identical_names_fall_back_to_id() {
        let students = vec![
            StudentRecord::new("b", "Sam Park"),
            StudentRecord::new("a", "Sam Park"),
        ];
        let ordered = order_students(&students, StudentOrder::Name);
        assert_eq!(ordered[0].id, "a");
    }
}
