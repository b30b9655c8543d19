pub mod queue;
pub mod runner;

pub use queue::AnalysisQueue;
pub use runner::{AnalysisListener, AnalysisRunner};
