use chrono::NaiveDate;
use mastery_report::workflows::mastery::delivery::{
    CompileError, CompileJob, DeliveryError, DocumentCompiler, MailDelivery, OutgoingMessage,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::info;

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// AppleScript string literal with embedded quotes spliced in.
fn as_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\" & quote & \""))
}

/// Script that opens a visible Mail.app draft with the body read from disk.
pub(crate) fn draft_script(message: &OutgoingMessage, sender: Option<&str>) -> String {
    let mut script = format!(
        "set m to POSIX file {}\nset msg to read m\ntell application \"Mail\"\n",
        as_quote(&absolute(&message.body_path).to_string_lossy())
    );
    script.push_str(
        "  set theOutMessage to make new outgoing message with properties {visible:true}\n",
    );
    script.push_str("  tell theOutMessage\n");
    script.push_str(&format!(
        "    make new to recipient at end of to recipients with properties {{address:{}}}\n",
        as_quote(&message.recipient)
    ));
    if let Some(sender) = sender {
        script.push_str(&format!("    set sender to {}\n", as_quote(sender)));
    }
    script.push_str(&format!(
        "    set subject to {}\n",
        as_quote(&message.subject)
    ));
    script.push_str("    set content to msg\n  end tell\n");
    if let Some(attachment) = &message.attachment {
        script.push_str("  tell content of theOutMessage\n");
        script.push_str(&format!(
            "    make new attachment with properties {{file name:{}}} at after last paragraph\n",
            as_quote(&absolute(attachment).to_string_lossy())
        ));
        script.push_str("  end tell\n");
    }
    script.push_str("end tell\n");
    script
}

/// Drafts messages in Mail.app by piping AppleScript to `osascript`.
#[derive(Debug, Clone, Default)]
pub(crate) struct AppleMailDelivery {
    sender: Option<String>,
}

impl AppleMailDelivery {
    pub(crate) fn new(sender: Option<String>) -> Self {
        Self { sender }
    }
}

impl MailDelivery for AppleMailDelivery {
    fn deliver(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        let script = draft_script(message, self.sender.as_deref());
        let mut child = Command::new("osascript")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| DeliveryError::Transport(format!("osascript: {err}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(script.as_bytes())
                .map_err(|err| DeliveryError::Transport(format!("osascript stdin: {err}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|err| DeliveryError::Transport(format!("osascript: {err}")))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(DeliveryError::Rejected {
                recipient: message.recipient.clone(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Writes each quiz fragment to the include file read by the main document,
/// then typesets the document under the student's job name.
#[derive(Debug, Clone)]
pub(crate) struct PdfLatexCompiler {
    document: PathBuf,
    include_path: PathBuf,
}

impl PdfLatexCompiler {
    pub(crate) fn new(document: PathBuf, include_path: PathBuf) -> Self {
        Self {
            document,
            include_path,
        }
    }
}

impl DocumentCompiler for PdfLatexCompiler {
    fn compile(&self, job: &CompileJob) -> Result<(), CompileError> {
        fs::write(&self.include_path, &job.source)?;
        fs::create_dir_all(&job.output_dir)?;

        let output = Command::new("pdflatex")
            .arg("-interaction=nonstopmode")
            .arg("-jobname")
            .arg(&job.job_name)
            .arg("-output-directory")
            .arg(&job.output_dir)
            .arg(&self.document)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| CompileError::Unavailable(format!("pdflatex: {err}")))?;

        if output.status.success() {
            Ok(())
        } else {
            let log = String::from_utf8_lossy(&output.stdout);
            let detail = log
                .lines()
                .find(|line| line.starts_with('!'))
                .unwrap_or("non-zero exit status")
                .to_string();
            Err(CompileError::Failed {
                job: job.job_name.clone(),
                detail,
            })
        }
    }
}

/// Logs each message instead of drafting it.
#[derive(Debug, Clone, Default)]
pub(crate) struct DryRunDelivery;

impl MailDelivery for DryRunDelivery {
    fn deliver(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        info!(
            recipient = %message.recipient,
            subject = %message.subject,
            body = %message.body_path.display(),
            attachment = ?message.attachment,
            "dry run: would draft message"
        );
        Ok(())
    }
}

/// Logs each compile job instead of running the compiler.
#[derive(Debug, Clone, Default)]
pub(crate) struct DryRunCompiler;

impl DocumentCompiler for DryRunCompiler {
    fn compile(&self, job: &CompileJob) -> Result<(), CompileError> {
        info!(
            job = %job.job_name,
            output_dir = %job.output_dir.display(),
            bytes = job.source.len(),
            "dry run: would compile quiz"
        );
        Ok(())
    }
}
