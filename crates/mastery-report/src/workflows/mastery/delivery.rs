use std::fmt::Debug;
use std::path::PathBuf;

/// A drafted message whose body has already been written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub body_path: PathBuf,
    pub recipient: String,
    pub subject: String,
    pub attachment: Option<PathBuf>,
}

/// A quiz source to typeset as `<output_dir>/<job_name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileJob {
    pub source: String,
    pub job_name: String,
    pub output_dir: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("mail client rejected message to {recipient}: {detail}")]
    Rejected { recipient: String, detail: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("failed to stage quiz source: {0}")]
    Io(#[from] std::io::Error),
    #[error("document compiler unavailable: {0}")]
    Unavailable(String),
    #[error("document compiler failed for {job}: {detail}")]
    Failed { job: String, detail: String },
}

/// Outbound mail hook (e.g., a desktop mail client drafting messages).
pub trait MailDelivery: Debug {
    fn deliver(&self, message: &OutgoingMessage) -> Result<(), DeliveryError>;
}

/// Typesetting hook turning quiz sources into documents.
pub trait DocumentCompiler: Debug {
    fn compile(&self, job: &CompileJob) -> Result<(), CompileError>;
}
