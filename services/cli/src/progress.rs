use crate::cli::{log_run, DataArgs, MailArgs};
use crate::infra::{AppleMailDelivery, DryRunDelivery};
use clap::Args;
use mastery_report::config::AppConfig;
use mastery_report::error::AppError;
use mastery_report::workflows::mastery::delivery::MailDelivery;
use mastery_report::workflows::mastery::report::{Aggregator, ProgressRenderer, ProgressStyle};
use mastery_report::workflows::mastery::run::{
    write_statistics, write_summary, ProgressMailer, DEFAULT_PROGRESS_SUBJECT,
};
use mastery_report::workflows::mastery::{MasteryRule, MasteryWorkspace};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::PathBuf;
use tracing::info;

/// Rendering and statistics options shared by both progress commands.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct ReportArgs {
    /// Label mastered outcomes on the 1-4 scale and total mastery points
    #[arg(long)]
    pub(crate) graded: bool,
    /// Judge mastery against this fixed score instead of each row's threshold
    #[arg(long)]
    pub(crate) done_score: Option<f64>,
    /// Write the per-outcome pass/not-yet table here
    #[arg(long)]
    pub(crate) stats: Option<PathBuf>,
    /// Write end-of-run statistics as JSON here
    #[arg(long)]
    pub(crate) stats_json: Option<PathBuf>,
}

impl ReportArgs {
    fn rule(&self) -> MasteryRule {
        match self.done_score {
            Some(done_score) => MasteryRule::FixedScale { done_score },
            None => MasteryRule::Threshold,
        }
    }

    fn renderer(&self, workspace: &MasteryWorkspace) -> ProgressRenderer {
        let style = if self.graded {
            ProgressStyle::Graded
        } else {
            ProgressStyle::Binary
        };
        ProgressRenderer::new(&workspace.catalog, &workspace.policy, style)
    }

    fn finish(
        &self,
        renderer: &ProgressRenderer,
        aggregator: &Aggregator,
    ) -> Result<(), AppError> {
        let table = renderer.statistics_report(aggregator);
        for line in table.lines() {
            info!("{line}");
        }
        if let Some(path) = &self.stats {
            write_statistics(path, renderer, aggregator)?;
        }
        if let Some(path) = &self.stats_json {
            let view = renderer.statistics_view(aggregator);
            fs::write(path, serde_json::to_string_pretty(&view)?)?;
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct SummaryArgs {
    #[command(flatten)]
    pub(crate) data: DataArgs,
    #[command(flatten)]
    pub(crate) report: ReportArgs,
    /// Consolidated report file (defaults to stdout)
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ProgressEmailArgs {
    #[command(flatten)]
    pub(crate) data: DataArgs,
    #[command(flatten)]
    pub(crate) report: ReportArgs,
    #[command(flatten)]
    pub(crate) mail: MailArgs,
    /// Text inserted between the salutation and the report
    #[arg(long)]
    pub(crate) preamble: Option<PathBuf>,
    /// Text appended after the report
    #[arg(long)]
    pub(crate) postamble: Option<PathBuf>,
}

pub(crate) fn run_progress_summary(
    args: SummaryArgs,
    config: &AppConfig,
) -> Result<(), AppError> {
    let SummaryArgs {
        data,
        report,
        output,
    } = args;

    let workspace = data.load(config, report.rule())?;
    let renderer = report.renderer(&workspace);
    let mut aggregator = Aggregator::for_policy(&workspace.policy);
    let selection = data.selection();

    let summary = match &output {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            write_summary(&mut out, &workspace, &renderer, &selection, &mut aggregator)?
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write_summary(&mut out, &workspace, &renderer, &selection, &mut aggregator)?
        }
    };

    log_run("summary", &summary);
    report.finish(&renderer, &aggregator)
}

pub(crate) fn run_progress_email(
    args: ProgressEmailArgs,
    config: &AppConfig,
) -> Result<(), AppError> {
    let ProgressEmailArgs {
        data,
        report,
        mail,
        preamble,
        postamble,
    } = args;

    let workspace = data.load(config, report.rule())?;
    let renderer = report.renderer(&workspace);
    let mut aggregator = Aggregator::for_policy(&workspace.policy);
    let mail_config = mail.mail_config(config);

    let delivery: Box<dyn MailDelivery> = if mail.dry_run {
        Box::new(DryRunDelivery)
    } else {
        Box::new(AppleMailDelivery::new(mail_config.sender.clone()))
    };

    let mut mailer = ProgressMailer::new(delivery, mail_config, mail.message_file.clone())
        .with_subject(
            mail.subject
                .clone()
                .unwrap_or_else(|| DEFAULT_PROGRESS_SUBJECT.to_string()),
        );
    if let Some(path) = &preamble {
        mailer = mailer.with_preamble(fs::read_to_string(path)?);
    }
    if let Some(path) = &postamble {
        mailer = mailer.with_postamble(fs::read_to_string(path)?);
    }

    let summary = mailer.send_all(&workspace, &renderer, &data.selection(), &mut aggregator)?;
    log_run("email", &summary);
    report.finish(&renderer, &aggregator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_config;

    const MASTERY: &str = "\
Student name,Student ID,G1: Functions > F1: Define result,G1: Functions > F1: Define mastery points,G1: Functions > F2: Compose result,G1: Functions > F2: Compose mastery points
Ann Lee,101,3,3,1,3
Bob Adams,102,2,3,3,3
";
    const POLICY: &str = "G1\tF1\tdefine\t1\nG1\tF2\tcompose\t1\n";

    fn data_args(dir: &std::path::Path) -> DataArgs {
        fs::write(dir.join("mastery.csv"), MASTERY).expect("write mastery");
        fs::write(dir.join("outcomes.tsv"), POLICY).expect("write policy");
        DataArgs {
            mastery: dir.join("mastery.csv"),
            policy: dir.join("outcomes.tsv"),
            roster: None,
            roster_skip: None,
            week: None,
            term_start: None,
            today: None,
            student: String::new(),
            by_section: false,
        }
    }

    #[test]
    fn summary_command_writes_report_and_statistics_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let args = SummaryArgs {
            data: data_args(dir.path()),
            report: ReportArgs {
                stats: Some(dir.path().join("stats.txt")),
                stats_json: Some(dir.path().join("stats.json")),
                ..ReportArgs::default()
            },
            output: Some(dir.path().join("summary.txt")),
        };

        run_progress_summary(args, &test_config()).expect("summary runs");

        let summary = fs::read_to_string(dir.path().join("summary.txt")).expect("summary file");
        assert!(summary.starts_with("Bob Adams\nG1: Functions\n  F1 Define: \n"));
        assert!(summary.contains("Ann Lee\nG1: Functions\n  F1 Define: Mastered\n"));

        let stats = fs::read_to_string(dir.path().join("stats.txt")).expect("stats file");
        assert_eq!(
            stats,
            "G1.F1: Passed = 1, Not Yet=1\nG1.F2: Passed = 1, Not Yet=1\n"
        );

        let json: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join("stats.json")).expect("json file"),
        )
        .expect("valid json");
        assert_eq!(json["students"], 2);
        assert_eq!(json["total_mastered"], 2);
        assert_eq!(json["outcomes"][0]["code"], "G1.F1");
        assert_eq!(json["outcomes"][1]["not_yet"], 1);
    }

    #[test]
    fn email_command_dry_run_writes_message_body() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("pre.txt"), "Progress so far:\n\n").expect("write preamble");
        let roster = "Student,ID,SIS,Login,Section\nPoints Possible,,,,\nAnn Lee,101,x,leeax,0001\n";
        fs::write(dir.path().join("roster.csv"), roster).expect("write roster");

        let mut data = data_args(dir.path());
        data.roster = Some(dir.path().join("roster.csv"));
        data.student = "ann".to_string();
        let args = ProgressEmailArgs {
            data,
            report: ReportArgs::default(),
            mail: MailArgs {
                subject: None,
                message_file: dir.path().join("tmpmsg.txt"),
                email_domain: None,
                sender: None,
                dry_run: true,
            },
            preamble: Some(dir.path().join("pre.txt")),
            postamble: None,
        };

        run_progress_email(args, &test_config()).expect("email runs");

        let body = fs::read_to_string(dir.path().join("tmpmsg.txt")).expect("message file");
        assert!(body.starts_with("Dear Ann,\n\nProgress so far:\n\nG1: Functions\n"));
        assert!(body.ends_with("Total Number of Mastered Objectives: 1\n"));
    }

    #[test]
    fn missing_input_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut data = data_args(dir.path());
        data.policy = dir.path().join("absent.tsv");
        let args = SummaryArgs {
            data,
            report: ReportArgs::default(),
            output: Some(dir.path().join("summary.txt")),
        };
        assert!(run_progress_summary(args, &test_config()).is_err());
    }
}
