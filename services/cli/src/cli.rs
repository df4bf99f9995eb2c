use crate::progress::{run_progress_email, run_progress_summary, ProgressEmailArgs, SummaryArgs};
use crate::quiz::{
    run_quiz_build, run_quiz_include, run_quiz_mail, QuizBuildArgs, QuizIncludeArgs, QuizMailArgs,
};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use mastery_report::config::{AppConfig, MailConfig};
use mastery_report::error::AppError;
use mastery_report::telemetry;
use mastery_report::workflows::mastery::run::{week_of_term, RunSummary, StudentSelection};
use mastery_report::workflows::mastery::{
    LoadOptions, MasteryRule, MasteryWorkspace, StudentOrder,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "mastery-report",
    about = "Turn learning-mastery gradebook exports into progress reports, email drafts and quizzes",
    version
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Per-student progress listings
    Progress {
        #[command(subcommand)]
        command: ProgressCommand,
    },
    /// Personalized quizzes covering outcomes not yet mastered
    Quiz {
        #[command(subcommand)]
        command: QuizCommand,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum ProgressCommand {
    /// Write every report into one consolidated file (or stdout)
    Summary(SummaryArgs),
    /// Draft one progress email per student
    Email(ProgressEmailArgs),
}

#[derive(Subcommand, Debug)]
pub(crate) enum QuizCommand {
    /// Typeset one quiz per student plus a blank template
    Build(QuizBuildArgs),
    /// Concatenate every quiz fragment into a single include file
    Include(QuizIncludeArgs),
    /// Draft emails attaching previously built quiz PDFs
    Mail(QuizMailArgs),
}

/// Input exports and student selection shared by every data-driven command.
#[derive(Args, Debug, Clone)]
pub(crate) struct DataArgs {
    /// Learning mastery export (CSV, self-describing header)
    #[arg(long)]
    pub(crate) mastery: PathBuf,
    /// Outcomes-of-interest policy file (tab-delimited)
    #[arg(long)]
    pub(crate) policy: PathBuf,
    /// Gradebook export supplying emails and sections (CSV)
    #[arg(long)]
    pub(crate) roster: Option<PathBuf>,
    /// Rows to skip after the roster header (defaults to MASTERY_ROSTER_SKIP)
    #[arg(long)]
    pub(crate) roster_skip: Option<usize>,
    /// Only include outcomes introduced in or before this week (0 = all)
    #[arg(long)]
    pub(crate) week: Option<u32>,
    /// First day of term (YYYY-MM-DD); derives the week when --week is absent
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) term_start: Option<NaiveDate>,
    /// Reference date for the week derivation (defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Only students whose name contains this text (case-insensitive)
    #[arg(long, default_value = "")]
    pub(crate) student: String,
    /// Order students by section before name
    #[arg(long)]
    pub(crate) by_section: bool,
}

impl DataArgs {
    pub(crate) fn week_cutoff(&self) -> u32 {
        if let Some(week) = self.week {
            return week;
        }
        match self.term_start {
            Some(start) => {
                week_of_term(start, self.today.unwrap_or_else(|| Local::now().date_naive()))
            }
            None => 0,
        }
    }

    pub(crate) fn selection(&self) -> StudentSelection {
        StudentSelection {
            order: if self.by_section {
                StudentOrder::SectionThenName
            } else {
                StudentOrder::Name
            },
            name_filter: self.student.clone(),
        }
    }

    pub(crate) fn load(
        &self,
        config: &AppConfig,
        rule: MasteryRule,
    ) -> Result<MasteryWorkspace, AppError> {
        let options = LoadOptions {
            rule,
            week_cutoff: self.week_cutoff(),
            roster_skip_rows: self.roster_skip.unwrap_or(config.roster.skip_rows),
        };
        info!(week = options.week_cutoff, rule = ?options.rule, "loading mastery exports");
        Ok(MasteryWorkspace::from_paths(
            &self.mastery,
            &self.policy,
            self.roster.as_ref(),
            &options,
        )?)
    }
}

/// Mail draft options shared by the emailing commands.
#[derive(Args, Debug, Clone)]
pub(crate) struct MailArgs {
    /// Subject line (defaults per command)
    #[arg(long)]
    pub(crate) subject: Option<String>,
    /// Where each message body is written before drafting
    #[arg(long, default_value = "tmpmsg.txt")]
    pub(crate) message_file: PathBuf,
    /// Recipient domain (defaults to MASTERY_EMAIL_DOMAIN)
    #[arg(long)]
    pub(crate) email_domain: Option<String>,
    /// Sender line for drafts (defaults to MASTERY_SENDER)
    #[arg(long)]
    pub(crate) sender: Option<String>,
    /// Log messages instead of drafting them
    #[arg(long)]
    pub(crate) dry_run: bool,
}

impl MailArgs {
    pub(crate) fn mail_config(&self, config: &AppConfig) -> MailConfig {
        let mut mail = config.mail.clone();
        if let Some(domain) = &self.email_domain {
            mail.email_domain = domain.trim().trim_start_matches('@').to_string();
        }
        if let Some(sender) = &self.sender {
            mail.sender = Some(sender.clone());
        }
        mail
    }
}

/// Score thresholds for the fixed-scale mastery rule.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct ScoringArgs {
    /// Score at which an outcome counts as mastered on the fixed scale
    #[arg(long)]
    pub(crate) done_score: Option<f64>,
    /// Score flagged as "apprentice" on quiz problems
    #[arg(long)]
    pub(crate) apprentice_score: Option<f64>,
}

pub(crate) fn log_run(mode: &str, summary: &RunSummary) {
    info!(
        mode,
        processed = summary.processed,
        skipped = summary.skipped,
        failed = summary.failed,
        "run complete"
    );
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    info!(environment = ?config.environment, "mastery reporting started");

    match cli.command {
        Command::Progress {
            command: ProgressCommand::Summary(args),
        } => run_progress_summary(args, &config),
        Command::Progress {
            command: ProgressCommand::Email(args),
        } => run_progress_email(args, &config),
        Command::Quiz {
            command: QuizCommand::Build(args),
        } => run_quiz_build(args, &config),
        Command::Quiz {
            command: QuizCommand::Include(args),
        } => run_quiz_include(args, &config),
        Command::Quiz {
            command: QuizCommand::Mail(args),
        } => run_quiz_mail(args, &config),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    use mastery_report::config::{AppEnvironment, RosterConfig, ScoringConfig, TelemetryConfig};

    AppConfig {
        environment: AppEnvironment::Test,
        telemetry: TelemetryConfig {
            log_level: "warn".to_string(),
            ansi: false,
        },
        mail: MailConfig {
            email_domain: "dukes.jmu.edu".to_string(),
            sender: None,
        },
        scoring: ScoringConfig {
            done_score: 3.0,
            apprentice_score: 2.0,
        },
        roster: RosterConfig { skip_rows: 1 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: [&str; 4] = ["--mastery", "mastery.csv", "--policy", "outcomes.tsv"];

    fn parse(args: &[&str]) -> Cli {
        let argv = std::iter::once("mastery-report").chain(args.iter().copied());
        Cli::try_parse_from(argv).expect("arguments parse")
    }

    #[test]
    fn summary_accepts_data_and_output_flags() {
        let mut args = vec!["progress", "summary"];
        args.extend(DATA);
        args.extend(["--output", "summary.txt", "--graded", "--student", "lee"]);

        let Command::Progress {
            command: ProgressCommand::Summary(summary),
        } = parse(&args).command
        else {
            panic!("expected progress summary");
        };
        assert_eq!(summary.output, Some(PathBuf::from("summary.txt")));
        assert!(summary.report.graded);
        assert_eq!(summary.data.student, "lee");
        assert_eq!(summary.data.selection().order, StudentOrder::Name);
    }

    #[test]
    fn explicit_week_beats_term_dates() {
        let mut args = vec!["progress", "summary"];
        args.extend(DATA);
        args.extend([
            "--week",
            "4",
            "--term-start",
            "2024-01-08",
            "--today",
            "2024-03-04",
        ]);
        let Command::Progress {
            command: ProgressCommand::Summary(summary),
        } = parse(&args).command
        else {
            panic!("expected progress summary");
        };
        assert_eq!(summary.data.week_cutoff(), 4);
    }

    #[test]
    fn term_dates_derive_the_week() {
        let mut args = vec!["quiz", "include", "--output", "quiz.tex"];
        args.extend(DATA);
        args.extend(["--term-start", "2024-01-08", "--today", "2024-01-22"]);
        let Command::Quiz {
            command: QuizCommand::Include(include),
        } = parse(&args).command
        else {
            panic!("expected quiz include");
        };
        assert_eq!(include.data.week_cutoff(), 3);
    }

    #[test]
    fn missing_week_inputs_mean_no_cutoff() {
        let mut args = vec!["progress", "summary"];
        args.extend(DATA);
        let Command::Progress {
            command: ProgressCommand::Summary(summary),
        } = parse(&args).command
        else {
            panic!("expected progress summary");
        };
        assert_eq!(summary.data.week_cutoff(), 0);
    }

    #[test]
    fn quiz_mail_needs_only_the_roster() {
        let Command::Quiz {
            command: QuizCommand::Mail(mail),
        } = parse(&[
            "quiz",
            "mail",
            "--roster",
            "grades.csv",
            "--quiz-dir",
            "quizzes",
            "--message-file",
            "quiz-message.txt",
            "--dry-run",
        ])
        .command
        else {
            panic!("expected quiz mail");
        };
        assert!(mail.mail.dry_run);
        assert_eq!(mail.quiz_dir, PathBuf::from("quizzes"));
    }

    #[test]
    fn rejects_malformed_dates() {
        let mut args = vec!["mastery-report", "progress", "summary"];
        args.extend(DATA);
        args.extend(["--term-start", "Jan 8"]);
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn mail_overrides_replace_configured_values() {
        let mut args = vec!["progress", "email"];
        args.extend(DATA);
        args.extend(["--email-domain", "@example.edu", "--sender", "Prof <p@example.edu>"]);
        let Command::Progress {
            command: ProgressCommand::Email(email),
        } = parse(&args).command
        else {
            panic!("expected progress email");
        };

        let config = test_config();
        let mail = email.mail.mail_config(&config);
        assert_eq!(mail.email_domain, "example.edu");
        assert_eq!(mail.sender.as_deref(), Some("Prof <p@example.edu>"));
    }
}
