// Submission domain models.
//
// These are pure domain types: no storage, no transport. A `Submission` is
// created per attempt and handed to the moderation engine; persisting it is
// the script store's job.

use crate::core::metadata::{MetadataBlock, ScriptLanguage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier the script store assigns to a published script.
pub type ScriptId = u64;

/// Raw code exactly as the user submitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedCode {
    pub text: String,
    pub language: ScriptLanguage,
}

impl SubmittedCode {
    pub fn new(text: impl Into<String>, language: ScriptLanguage) -> Self {
        Self {
            text: text.into(),
            language,
        }
    }
}

/// What the user said they are posting. Never inferred from the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionKind {
    /// Installed directly by end users.
    #[default]
    Script,
    /// Meant to be `@require`-d from other scripts.
    Library,
}

impl fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionKind::Script => write!(f, "script"),
            SubmissionKind::Library => write!(f, "library"),
        }
    }
}

/// Name/description typed into the submission form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFields {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl UserFields {
    #[cfg(test)]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            description: Some(description.into()),
        }
    }

    /// The name, if the user actually typed something.
    pub fn name(&self) -> Option<&str> {
        non_blank(self.name.as_deref())
    }

    pub fn description(&self) -> Option<&str> {
        non_blank(self.description.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A classified submission, ready for moderation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub code: SubmittedCode,
    pub metadata: Option<MetadataBlock>,
    pub kind: SubmissionKind,
    /// Authoritative name: from `@name` when there is a block, otherwise the
    /// library name the user typed.
    pub name: String,
    pub description: Option<String>,
    pub fallback_name: Option<String>,
    pub fallback_description: Option<String>,
    /// Set when this is a new version of an already stored script.
    pub script_id: Option<ScriptId>,
}

impl Submission {
    pub fn with_script_id(mut self, script_id: Option<ScriptId>) -> Self {
        self.script_id = script_id;
        self
    }

    pub fn version(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(MetadataBlock::version)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(MetadataBlock::namespace)
    }

    pub fn license(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(MetadataBlock::license)
    }
}

/// Result of a classification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Identity is settled; go on to moderation.
    Ready(Submission),
    /// A library without a metadata block: the caller has to collect a name
    /// (and optionally a description) and call
    /// [`PendingClassification::complete`].
    NeedsIdentity(PendingClassification),
}

/// State carried by the caller between the first submission of a library and
/// the follow-up that names it.
///
/// Serializable so it can live in request state between round trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingClassification {
    pub code: SubmittedCode,
}
