// Core submission module - turns raw submitted code into a classified
// `Submission` the moderation engine can evaluate.

pub mod classifier;
pub mod submission_models;

pub use classifier::*;
pub use submission_models::*;
