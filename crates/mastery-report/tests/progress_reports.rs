use std::fs;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use mastery_report::config::MailConfig;
use mastery_report::workflows::mastery::delivery::{DeliveryError, MailDelivery, OutgoingMessage};
use mastery_report::workflows::mastery::report::{Aggregator, ProgressRenderer, ProgressStyle};
use mastery_report::workflows::mastery::run::{write_summary, ProgressMailer, StudentSelection};
use mastery_report::workflows::mastery::{
    read_comma_rows, read_tab_rows, LoadOptions, MasteryError, MasteryRule, MasteryWorkspace,
    OutcomeKey, StudentOrder,
};

const MASTERY_CSV: &str = "\
\u{feff}Student name,Student ID,G2: Limits > L1: One-sided limits result,G2: Limits > L1: One-sided limits mastery points,G1: Functions > F2: Composition result,G1: Functions > F2: Composition mastery points,G1: Functions > F1: Definitions: domain and range result,G1: Functions > F1: Definitions: domain and range mastery points,G1: Functions > F10: Inverses result,G1: Functions > F10: Inverses mastery points,G3: Series > S1: Geometric result,G3: Series > S1: Geometric mastery points
Ann Lee,101,3,3,2,3,3,3,1,3,0,3
Bob Adams,102,,3,4,3,1,3,3,3,3,3
Dee Zed,104,3,3,3,3,3,3,3,3,3,3
";

const POLICY_TSV: &str = "\
G1\tF1\tdefine\t1
G1\tF2\tcompose\t1

G1\tF10\tinverse\t2\tF2
G2\tL1\toneSided\t3\tG1.F1
G3\tS1\tgeometric\t1\tskip
";

const ROSTER_CSV: &str = "\
Student,ID,SIS User ID,SIS Login ID,Section
Points Possible,,,,
Ann Lee,101,a1,leeax,0001
Bob Adams,102,b2,adamsbx,0002
Cy Young,103,c3,youngcx,0001
";

fn workspace(options: &LoadOptions) -> MasteryWorkspace {
    let mastery = read_comma_rows(Cursor::new(MASTERY_CSV)).expect("mastery rows");
    let policy = read_tab_rows(Cursor::new(POLICY_TSV)).expect("policy rows");
    let roster = read_comma_rows(Cursor::new(ROSTER_CSV)).expect("roster rows");
    MasteryWorkspace::from_rows(&mastery, &policy, Some(roster.as_slice()), options)
        .expect("workspace loads")
}

fn summary_text(
    workspace: &MasteryWorkspace,
    style: ProgressStyle,
    selection: &StudentSelection,
) -> (String, Aggregator) {
    let renderer = ProgressRenderer::new(&workspace.catalog, &workspace.policy, style);
    let mut aggregator = Aggregator::for_policy(&workspace.policy);
    let mut out = Vec::new();
    write_summary(&mut out, workspace, &renderer, selection, &mut aggregator)
        .expect("summary writes");
    (String::from_utf8(out).expect("utf8 summary"), aggregator)
}

#[test]
fn consolidated_summary_lists_students_in_surname_order() {
    let workspace = workspace(&LoadOptions::default());
    let (text, aggregator) = summary_text(
        &workspace,
        ProgressStyle::Binary,
        &StudentSelection::default(),
    );

    let bob = concat!(
        "Bob Adams\n",
        "G1: Functions\n",
        "  F1 Definitions: domain and range: \n",
        "  F2 Composition: Mastered\n",
        "  F10 Inverses: Mastered\n",
        "Mastered Objectives in Group: 2 out of 3\n",
        "\n",
        "G2: Limits\n",
        "  L1 One-sided limits: 0/2\n",
        "Mastered Objectives in Group: 0 out of 1\n",
        "\n",
        "Total Number of Mastered Objectives: 2\n",
        "\n\n\n",
    );
    assert!(text.starts_with(bob), "unexpected summary:\n{text}");

    let ann_at = text.find("Ann Lee\n").expect("ann present");
    let cy_at = text.find("Cy Young (No Results)\n\n").expect("cy notice present");
    let dee_at = text.find("Dee Zed\n").expect("dee present");
    assert!(ann_at < cy_at && cy_at < dee_at);

    assert!(text.contains("  F10 Inverses: 0/2\n"));
    assert!(text.contains("  L1 One-sided limits: Mastered\n"));
    assert!(!text.contains("G3: Series"), "skipped outcome never rendered");
    assert!(text.contains("Total Number of Mastered Objectives: 4\n"));

    assert_eq!(aggregator.students(), 3, "no-results student is not aggregated");
    assert_eq!(aggregator.total_mastered(), 8);
    let renderer =
        ProgressRenderer::new(&workspace.catalog, &workspace.policy, ProgressStyle::Binary);
    assert_eq!(
        renderer.statistics_report(&aggregator),
        "\
G1.F1: Passed = 2, Not Yet=1
G1.F2: Passed = 2, Not Yet=1
G1.F10: Passed = 2, Not Yet=1
G2.L1: Passed = 2, Not Yet=1
"
    );
}

#[test]
fn name_filter_narrows_the_run_and_links_cross_groups() {
    let workspace = workspace(&LoadOptions::default());
    let selection = StudentSelection {
        name_filter: "ADAMS".to_string(),
        ..StudentSelection::default()
    };
    let (text, _) = summary_text(&workspace, ProgressStyle::Binary, &selection);
    assert!(text.starts_with("Bob Adams\n"));
    assert!(!text.contains("Ann Lee"));

    let link = workspace
        .policy
        .partial_link(&OutcomeKey::new("G2", "L1"))
        .expect("L1 linked");
    assert_eq!(link, &OutcomeKey::new("G1", "F1"));
}

#[test]
fn graded_summary_tallies_points() {
    let options = LoadOptions {
        rule: MasteryRule::FixedScale { done_score: 3.0 },
        ..LoadOptions::default()
    };
    let workspace = workspace(&options);
    let selection = StudentSelection {
        name_filter: "bob".to_string(),
        ..StudentSelection::default()
    };
    let (text, aggregator) = summary_text(&workspace, ProgressStyle::Graded, &selection);

    assert!(text.contains("  F2 Composition: Mastery\n"));
    assert!(text.contains("  F10 Inverses: Journey\n"));
    assert!(text.contains("  Number of \"Journey\" outcomes (3 pt each): 1\n"));
    assert!(text.contains("  Number of \"Mastery\" outcomes (4 pt each): 1\n"));
    assert!(text.contains("Total Number of Mastery Points: 7\n"));
    assert_eq!(aggregator.total_points(), 7);
}

#[test]
fn week_cutoff_hides_later_outcomes_and_their_groups() {
    let options = LoadOptions {
        week_cutoff: 1,
        ..LoadOptions::default()
    };
    let workspace = workspace(&options);
    let (text, _) = summary_text(
        &workspace,
        ProgressStyle::Binary,
        &StudentSelection::default(),
    );
    assert!(!text.contains("G2: Limits"));
    assert!(!text.contains("F10"));
    assert!(text.contains("Mastered Objectives in Group: 1 out of 2\n"));
}

#[test]
fn section_order_groups_students_by_section() {
    let workspace = workspace(&LoadOptions::default());
    let order: Vec<&str> = workspace
        .students(StudentOrder::SectionThenName, "")
        .into_iter()
        .map(|student| student.name.as_str())
        .collect();
    assert_eq!(order, vec!["Dee Zed", "Ann Lee", "Cy Young", "Bob Adams"]);
}

#[test]
fn policy_naming_unknown_outcome_is_fatal() {
    let mastery = read_comma_rows(Cursor::new(MASTERY_CSV)).expect("mastery rows");
    let policy = read_tab_rows(Cursor::new("G1\tF99\tmissing\t1\n")).expect("policy rows");
    let error = MasteryWorkspace::from_rows(&mastery, &policy, None, &LoadOptions::default())
        .expect_err("unknown outcome rejected");
    assert!(matches!(error, MasteryError::ReferentialIntegrity(_)));
}

#[test]
fn short_mastery_row_is_fatal() {
    let mut csv = MASTERY_CSV.to_string();
    csv.push_str("Eve Short,105,3,3\n");
    let mastery = read_comma_rows(Cursor::new(csv)).expect("mastery rows");
    let policy = read_tab_rows(Cursor::new(POLICY_TSV)).expect("policy rows");
    let error = MasteryWorkspace::from_rows(&mastery, &policy, None, &LoadOptions::default())
        .expect_err("short row rejected");
    assert!(matches!(error, MasteryError::ReferentialIntegrity(_)));
}

#[derive(Debug, Default, Clone)]
struct RecordingDelivery {
    sent: Arc<Mutex<Vec<(OutgoingMessage, String)>>>,
    reject: Option<String>,
}

impl MailDelivery for RecordingDelivery {
    fn deliver(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        if self.reject.as_deref() == Some(message.recipient.as_str()) {
            return Err(DeliveryError::Rejected {
                recipient: message.recipient.clone(),
                detail: "mailbox full".to_string(),
            });
        }
        let body = fs::read_to_string(&message.body_path).expect("message body readable");
        self.sent
            .lock()
            .expect("delivery mutex")
            .push((message.clone(), body));
        Ok(())
    }
}

fn mail_config() -> MailConfig {
    MailConfig {
        email_domain: "dukes.jmu.edu".to_string(),
        sender: None,
    }
}

#[test]
fn email_run_drafts_messages_and_continues_past_failures() {
    let workspace = workspace(&LoadOptions::default());
    let dir = tempfile::tempdir().expect("temp dir");
    let message_path = dir.path().join("tmpmsg.txt");
    let delivery = RecordingDelivery {
        reject: Some("adamsbx@dukes.jmu.edu".to_string()),
        ..RecordingDelivery::default()
    };
    let sent = delivery.sent.clone();

    let mailer = ProgressMailer::new(Box::new(delivery), mail_config(), message_path.clone())
        .with_preamble("Here is your progress so far.\n\n")
        .with_postamble("\nKeep it up!\n");
    let renderer =
        ProgressRenderer::new(&workspace.catalog, &workspace.policy, ProgressStyle::Binary);
    let mut aggregator = Aggregator::for_policy(&workspace.policy);
    let summary = mailer
        .send_all(
            &workspace,
            &renderer,
            &StudentSelection::default(),
            &mut aggregator,
        )
        .expect("run completes");

    // Bob rejected, Ann sent, Cy has no results, Dee has no address.
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(aggregator.students(), 3);

    let sent = sent.lock().expect("delivery mutex");
    assert_eq!(sent.len(), 1);
    let (message, body) = &sent[0];
    assert_eq!(message.recipient, "leeax@dukes.jmu.edu");
    assert_eq!(message.subject, "Your Mastery Progress");
    assert_eq!(message.body_path, message_path);
    assert!(message.attachment.is_none());
    assert!(body.starts_with("Dear Ann,\n\nHere is your progress so far.\n\nG1: Functions\n"));
    assert!(body.ends_with("Total Number of Mastered Objectives: 2\n\nKeep it up!\n"));
}
