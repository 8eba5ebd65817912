pub mod merge;
pub mod progress;
