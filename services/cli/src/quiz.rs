use crate::cli::{log_run, DataArgs, MailArgs, ScoringArgs};
use crate::infra::{AppleMailDelivery, DryRunCompiler, DryRunDelivery, PdfLatexCompiler};
use clap::Args;
use mastery_report::config::AppConfig;
use mastery_report::error::AppError;
use mastery_report::workflows::mastery::delivery::{DocumentCompiler, MailDelivery};
use mastery_report::workflows::mastery::report::QuizRenderer;
use mastery_report::workflows::mastery::roster::parse_roster;
use mastery_report::workflows::mastery::run::{
    write_quiz_include, QuizBuilder, QuizMailer, DEFAULT_QUIZ_SUBJECT,
};
use mastery_report::workflows::mastery::{
    read_comma_rows, MasteryRule, MasteryWorkspace, StudentDirectory, StudentOrder,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

/// How quiz runs decide mastery.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct QuizScoringArgs {
    #[command(flatten)]
    pub(crate) scoring: ScoringArgs,
    /// Use each row's mastery-points column instead of the fixed done score
    #[arg(long)]
    pub(crate) row_threshold: bool,
}

impl QuizScoringArgs {
    fn rule(&self, config: &AppConfig) -> MasteryRule {
        if self.row_threshold {
            return MasteryRule::Threshold;
        }
        MasteryRule::FixedScale {
            done_score: self.scoring.done_score.unwrap_or(config.scoring.done_score),
        }
    }

    fn renderer(&self, workspace: &MasteryWorkspace, config: &AppConfig) -> QuizRenderer {
        QuizRenderer::new(&workspace.catalog, &workspace.policy).with_apprentice_score(
            self.scoring
                .apprentice_score
                .unwrap_or(config.scoring.apprentice_score),
        )
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct QuizBuildArgs {
    #[command(flatten)]
    pub(crate) data: DataArgs,
    #[command(flatten)]
    pub(crate) scoring: QuizScoringArgs,
    /// Main quiz document that inputs the include file
    #[arg(long)]
    pub(crate) document: PathBuf,
    /// Include file rewritten with each student's fragment
    #[arg(long)]
    pub(crate) include: PathBuf,
    /// Directory receiving one PDF per student
    #[arg(long)]
    pub(crate) quiz_dir: PathBuf,
    /// Log compile jobs instead of running the compiler
    #[arg(long)]
    pub(crate) dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct QuizIncludeArgs {
    #[command(flatten)]
    pub(crate) data: DataArgs,
    #[command(flatten)]
    pub(crate) scoring: QuizScoringArgs,
    /// Include file receiving every fragment
    #[arg(long)]
    pub(crate) output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct QuizMailArgs {
    /// Gradebook export supplying names and emails (CSV)
    #[arg(long)]
    pub(crate) roster: PathBuf,
    /// Rows to skip after the roster header (defaults to MASTERY_ROSTER_SKIP)
    #[arg(long)]
    pub(crate) roster_skip: Option<usize>,
    /// Directory holding the built quiz PDFs
    #[arg(long)]
    pub(crate) quiz_dir: PathBuf,
    /// Only students whose name contains this text (case-insensitive)
    #[arg(long, default_value = "")]
    pub(crate) student: String,
    #[command(flatten)]
    pub(crate) mail: MailArgs,
}

pub(crate) fn run_quiz_build(args: QuizBuildArgs, config: &AppConfig) -> Result<(), AppError> {
    let QuizBuildArgs {
        data,
        scoring,
        document,
        include,
        quiz_dir,
        dry_run,
    } = args;

    let workspace = data.load(config, scoring.rule(config))?;
    let renderer = scoring.renderer(&workspace, config);
    let compiler: Box<dyn DocumentCompiler> = if dry_run {
        Box::new(DryRunCompiler)
    } else {
        Box::new(PdfLatexCompiler::new(document, include))
    };

    let summary = QuizBuilder::new(compiler, quiz_dir).build_all(
        &workspace,
        &renderer,
        &data.selection(),
    );
    log_run("quiz-build", &summary);
    Ok(())
}

pub(crate) fn run_quiz_include(
    args: QuizIncludeArgs,
    config: &AppConfig,
) -> Result<(), AppError> {
    let QuizIncludeArgs {
        data,
        scoring,
        output,
    } = args;

    let workspace = data.load(config, scoring.rule(config))?;
    let renderer = scoring.renderer(&workspace, config);
    let mut out = BufWriter::new(File::create(&output)?);
    let summary = write_quiz_include(&mut out, &workspace, &renderer, &data.selection())?;
    log_run("quiz-include", &summary);
    Ok(())
}

pub(crate) fn run_quiz_mail(args: QuizMailArgs, config: &AppConfig) -> Result<(), AppError> {
    let QuizMailArgs {
        roster,
        roster_skip,
        quiz_dir,
        student,
        mail,
    } = args;

    let rows = read_comma_rows(File::open(&roster)?)?;
    let directory = StudentDirectory::from_records(parse_roster(
        &rows,
        roster_skip.unwrap_or(config.roster.skip_rows),
    ));
    let mail_config = mail.mail_config(config);

    let delivery: Box<dyn MailDelivery> = if mail.dry_run {
        Box::new(DryRunDelivery)
    } else {
        Box::new(AppleMailDelivery::new(mail_config.sender.clone()))
    };
    let mailer = QuizMailer::new(delivery, mail_config, mail.message_file.clone(), quiz_dir)
        .with_subject(
            mail.subject
                .clone()
                .unwrap_or_else(|| DEFAULT_QUIZ_SUBJECT.to_string()),
        );

    let students = directory
        .ordered(StudentOrder::Name)
        .into_iter()
        .filter(|record| record.matches_filter(&student));
    let summary = mailer.send_all(students);
    log_run("quiz-mail", &summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_config;
    use std::fs;

    const MASTERY: &str = "\
Student name,Student ID,G1: Functions > F1: Define result,G1: Functions > F1: Define mastery points,G1: Functions > F2: Compose result,G1: Functions > F2: Compose mastery points
Ann Lee,101,3,4,2,4
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
    fn include_command_uses_the_fixed_done_score() {
        let dir = tempfile::tempdir().expect("temp dir");
        let args = QuizIncludeArgs {
            data: data_args(dir.path()),
            scoring: QuizScoringArgs::default(),
            output: dir.path().join("problems.tex"),
        };

        run_quiz_include(args, &test_config()).expect("include runs");

        let text = fs::read_to_string(dir.path().join("problems.tex")).expect("include file");
        assert!(text.contains("\\markright{Ann Lee}\n"));
        assert!(text.contains("\\objMastery{F1}\n\n\\objcompose{apprentice}\n"));
        assert!(text.contains("\\markright{Problem Template}\n"));
    }

    #[test]
    fn row_threshold_flag_switches_the_rule() {
        let scoring = QuizScoringArgs {
            row_threshold: true,
            ..QuizScoringArgs::default()
        };
        assert_eq!(scoring.rule(&test_config()), MasteryRule::Threshold);
        assert_eq!(
            QuizScoringArgs::default().rule(&test_config()),
            MasteryRule::FixedScale { done_score: 3.0 }
        );
    }

    #[test]
    fn dry_run_build_completes_without_a_compiler() {
        let dir = tempfile::tempdir().expect("temp dir");
        let args = QuizBuildArgs {
            data: data_args(dir.path()),
            scoring: QuizScoringArgs::default(),
            document: dir.path().join("quiz.tex"),
            include: dir.path().join("problems.tex"),
            quiz_dir: dir.path().join("quizzes"),
            dry_run: true,
        };
        run_quiz_build(args, &test_config()).expect("build runs");
    }
}
