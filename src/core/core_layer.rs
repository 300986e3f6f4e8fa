// The core module contains all business logic.
// Each stage of the submission pipeline gets its own submodule.

#[path = "metadata/mod.rs"]
pub mod metadata;

#[path = "submission/mod.rs"]
pub mod submission;

#[path = "moderation/mod.rs"]
pub mod moderation;
