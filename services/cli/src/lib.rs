mod cli;
mod infra;
mod progress;
mod quiz;

use mastery_report::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}
