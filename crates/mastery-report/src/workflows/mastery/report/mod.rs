mod aggregator;
mod layout;
mod progress;
mod quiz;
pub mod views;

pub use aggregator::{Aggregator, OutcomeStat};
pub use progress::{
    scale_label, GroupTally, ProgressRenderer, ProgressStyle, RenderedProgress, StudentTally,
};
pub use quiz::{QuizProblem, QuizRenderer, QuizSelection, UNSECTIONED_LABEL};
