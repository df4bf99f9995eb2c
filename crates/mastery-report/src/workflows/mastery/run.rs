use super::delivery::{CompileJob, DocumentCompiler, MailDelivery, OutgoingMessage};
use super::ordering::StudentOrder;
use super::report::{Aggregator, ProgressRenderer, QuizRenderer, UNSECTIONED_LABEL};
use super::student::StudentRecord;
use super::MasteryWorkspace;
use crate::config::MailConfig;
use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_PROGRESS_SUBJECT: &str = "Your Mastery Progress";
pub const DEFAULT_QUIZ_SUBJECT: &str = "Your Mastery Quiz";

/// Per-run student counts. `skipped` covers students with nothing to send
/// (no results, no address, no quiz); `failed` covers adapter failures.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Which students a run visits, and in what order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentSelection {
    pub order: StudentOrder,
    /// Case-insensitive substring of the full name; empty selects everyone.
    pub name_filter: String,
}

impl StudentSelection {
    pub fn students<'a>(&self, workspace: &'a MasteryWorkspace) -> Vec<&'a StudentRecord> {
        workspace.students(self.order, &self.name_filter)
    }
}

/// Week number of `today` within a term starting on `term_start`, counting
/// from 1. Dates before the term start clamp to week 1.
pub fn week_of_term(term_start: NaiveDate, today: NaiveDate) -> u32 {
    let days = (today - term_start).num_days();
    if days < 0 {
        return 1;
    }
    u32::try_from(days / 7 + 1).unwrap_or(u32::MAX)
}

/// Writes every selected student's report to one consolidated stream.
pub fn write_summary<W: Write>(
    out: &mut W,
    workspace: &MasteryWorkspace,
    renderer: &ProgressRenderer,
    selection: &StudentSelection,
    aggregator: &mut Aggregator,
) -> io::Result<RunSummary> {
    let mut summary = RunSummary::default();

    for student in selection.students(workspace) {
        let rendered = renderer.render(student, aggregator);
        if rendered.tally.is_none() {
            write!(out, "{}\n\n", rendered.text)?;
            summary.skipped += 1;
            continue;
        }

        debug!(student = %student.name, mode = "summary", "rendered progress report");
        write!(out, "{}\n{}\n\n\n", student.name, rendered.text)?;
        summary.processed += 1;
    }

    out.flush()?;
    Ok(summary)
}

/// Drafts one progress message per student through a [`MailDelivery`].
#[derive(Debug)]
pub struct ProgressMailer {
    delivery: Box<dyn MailDelivery>,
    mail: MailConfig,
    message_path: PathBuf,
    subject: String,
    preamble: String,
    postamble: String,
}

impl ProgressMailer {
    pub fn new(delivery: Box<dyn MailDelivery>, mail: MailConfig, message_path: PathBuf) -> Self {
        Self {
            delivery,
            mail,
            message_path,
            subject: DEFAULT_PROGRESS_SUBJECT.to_string(),
            preamble: String::new(),
            postamble: String::new(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Text placed between the salutation and the report.
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    /// Text placed after the report.
    pub fn with_postamble(mut self, postamble: impl Into<String>) -> Self {
        self.postamble = postamble.into();
        self
    }

    pub fn compose(&self, student: &StudentRecord, report: &str) -> String {
        format!(
            "Dear {},\n\n{}{}{}",
            student.first_name(),
            self.preamble,
            report,
            self.postamble
        )
    }

    /// Fails only when the message file cannot be written; delivery failures
    /// are logged and counted.
    pub fn send_all(
        &self,
        workspace: &MasteryWorkspace,
        renderer: &ProgressRenderer,
        selection: &StudentSelection,
        aggregator: &mut Aggregator,
    ) -> io::Result<RunSummary> {
        let mut summary = RunSummary::default();

        for student in selection.students(workspace) {
            let rendered = renderer.render(student, aggregator);
            if rendered.tally.is_none() {
                info!("{}", rendered.text);
                summary.skipped += 1;
                continue;
            }
            let Some(local) = student.email_local_part.as_deref() else {
                warn!(student = %student.name, "no email address on file; skipping");
                summary.skipped += 1;
                continue;
            };

            fs::write(&self.message_path, self.compose(student, &rendered.text))?;
            let message = OutgoingMessage {
                body_path: self.message_path.clone(),
                recipient: self.mail.address_for(local),
                subject: self.subject.clone(),
                attachment: None,
            };

            match self.delivery.deliver(&message) {
                Ok(()) => {
                    info!(
                        student = %student.name,
                        recipient = %message.recipient,
                        mode = "email",
                        "drafted progress message"
                    );
                    summary.processed += 1;
                }
                Err(error) => {
                    warn!(student = %student.name, %error, "progress message delivery failed");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

fn section_label(workspace: &MasteryWorkspace, student: &StudentRecord) -> Option<String> {
    workspace.has_roster().then(|| {
        student
            .section
            .clone()
            .unwrap_or_else(|| UNSECTIONED_LABEL.to_string())
    })
}

/// Compiles one quiz per student, then the blank template.
#[derive(Debug)]
pub struct QuizBuilder {
    compiler: Box<dyn DocumentCompiler>,
    output_dir: PathBuf,
}

impl QuizBuilder {
    pub fn new(compiler: Box<dyn DocumentCompiler>, output_dir: PathBuf) -> Self {
        Self {
            compiler,
            output_dir,
        }
    }

    pub fn build_all(
        &self,
        workspace: &MasteryWorkspace,
        renderer: &QuizRenderer,
        selection: &StudentSelection,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        for student in selection.students(workspace) {
            let section = section_label(workspace, student);
            let Some(source) = renderer.render(student, section.as_deref()) else {
                info!("{} (No Results)", student.name);
                summary.skipped += 1;
                continue;
            };
            self.compile(&student.name, source, student.job_name(), &mut summary);
        }

        let template = renderer.template_student();
        let section = section_label(workspace, &template);
        if let Some(source) = renderer.render(&template, section.as_deref()) {
            self.compile(&template.name, source, template.job_name(), &mut summary);
        }

        summary
    }

    fn compile(&self, name: &str, source: String, job_name: String, summary: &mut RunSummary) {
        let job = CompileJob {
            source,
            job_name,
            output_dir: self.output_dir.clone(),
        };
        match self.compiler.compile(&job) {
            Ok(()) => {
                info!(student = %name, job = %job.job_name, mode = "quiz", "compiled quiz");
                summary.processed += 1;
            }
            Err(error) => {
                warn!(student = %name, %error, "quiz compilation failed");
                summary.failed += 1;
            }
        }
    }
}

/// Concatenates every selected student's quiz fragment, then the template,
/// into one include stream.
pub fn write_quiz_include<W: Write>(
    out: &mut W,
    workspace: &MasteryWorkspace,
    renderer: &QuizRenderer,
    selection: &StudentSelection,
) -> io::Result<RunSummary> {
    let mut summary = RunSummary::default();

    for student in selection.students(workspace) {
        let section = section_label(workspace, student);
        match renderer.render(student, section.as_deref()) {
            Some(fragment) => {
                out.write_all(fragment.as_bytes())?;
                summary.processed += 1;
            }
            None => {
                info!("{} (No Results)", student.name);
                summary.skipped += 1;
            }
        }
    }

    let template = renderer.template_student();
    let section = section_label(workspace, &template);
    if let Some(fragment) = renderer.render(&template, section.as_deref()) {
        out.write_all(fragment.as_bytes())?;
    }

    out.flush()?;
    Ok(summary)
}

/// Mails each student the quiz PDF compiled for them, when one exists.
#[derive(Debug)]
pub struct QuizMailer {
    delivery: Box<dyn MailDelivery>,
    mail: MailConfig,
    message_path: PathBuf,
    quiz_dir: PathBuf,
    subject: String,
}

impl QuizMailer {
    pub fn new(
        delivery: Box<dyn MailDelivery>,
        mail: MailConfig,
        message_path: PathBuf,
        quiz_dir: PathBuf,
    ) -> Self {
        Self {
            delivery,
            mail,
            message_path,
            quiz_dir,
            subject: DEFAULT_QUIZ_SUBJECT.to_string(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn quiz_path(&self, student: &StudentRecord) -> PathBuf {
        self.quiz_dir.join(format!("{}.pdf", student.job_name()))
    }

    pub fn send_all<'a, I>(&self, students: I) -> RunSummary
    where
        I: IntoIterator<Item = &'a StudentRecord>,
    {
        let mut summary = RunSummary::default();

        for student in students {
            let attachment = self.quiz_path(student);
            if !attachment.is_file() {
                debug!(student = %student.name, path = %attachment.display(), "no quiz to send");
                summary.skipped += 1;
                continue;
            }
            let Some(local) = student.email_local_part.as_deref() else {
                warn!(student = %student.name, "no email address on file; skipping");
                summary.skipped += 1;
                continue;
            };

            let message = OutgoingMessage {
                body_path: self.message_path.clone(),
                recipient: self.mail.address_for(local),
                subject: self.subject.clone(),
                attachment: Some(attachment),
            };
            match self.delivery.deliver(&message) {
                Ok(()) => {
                    info!(
                        student = %student.name,
                        recipient = %message.recipient,
                        mode = "quiz-mail",
                        "drafted quiz message"
                    );
                    summary.processed += 1;
                }
                Err(error) => {
                    warn!(student = %student.name, %error, "quiz message delivery failed");
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}

/// Writes the pass/not-yet table to `path`.
pub fn write_statistics(
    path: &Path,
    renderer: &ProgressRenderer,
    aggregator: &Aggregator,
) -> io::Result<()> {
    fs::write(path, renderer.statistics_report(aggregator))
}
