// Core moderation module - decides what happens to a classified submission.
// Following the same pattern as the other core modules: models, pure logic,
// and a service that talks to the outside world through store traits.

pub mod fingerprint;
pub mod moderation_models;
pub mod moderation_service;
pub mod rule_engine;

pub use fingerprint::Fingerprint;
pub use moderation_models::*;
pub use moderation_service::*;
