// Submission classifier.
//
// Decides where a submission's identity comes from:
// - metadata block with @name  -> authoritative, form fields ignored
// - no block, library          -> name comes from the form (maybe in a second round trip)
// - no block, script           -> rejected, scripts must carry a block

use super::submission_models::{
    Classification, PendingClassification, Submission, SubmissionKind, SubmittedCode, UserFields,
};
use crate::core::metadata::{self, MetadataBlock};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("The code must contain a metadata block declaring @name")]
    MissingIdentity,
}

/// Classify a submission.
///
/// `kind` is whatever the user picked and is carried through unchanged.
pub fn classify(
    code: SubmittedCode,
    kind: SubmissionKind,
    user_fields: UserFields,
) -> Result<Classification, ClassifyError> {
    if let Some(metadata) = metadata::extract(&code.text, code.language) {
        return Ok(Classification::Ready(from_metadata(
            code,
            metadata,
            kind,
            user_fields,
        )));
    }

    match kind {
        SubmissionKind::Script => Err(ClassifyError::MissingIdentity),
        SubmissionKind::Library => {
            let pending = PendingClassification { code };
            if user_fields.name().is_some() {
                pending.complete(user_fields).map(Classification::Ready)
            } else {
                Ok(Classification::NeedsIdentity(pending))
            }
        }
    }
}

impl PendingClassification {
    /// Finish classifying a library once the user has named it.
    pub fn complete(self, user_fields: UserFields) -> Result<Submission, ClassifyError> {
        let name = user_fields
            .name()
            .ok_or(ClassifyError::MissingIdentity)?
            .to_string();
        let description = user_fields.description().map(str::to_string);

        Ok(Submission {
            code: self.code,
            metadata: None,
            kind: SubmissionKind::Library,
            name,
            description,
            fallback_name: user_fields.name,
            fallback_description: user_fields.description,
            script_id: None,
        })
    }
}

fn from_metadata(
    code: SubmittedCode,
    metadata: MetadataBlock,
    kind: SubmissionKind,
    user_fields: UserFields,
) -> Submission {
    Submission {
        name: metadata.name().to_string(),
        description: metadata.description().map(str::to_string),
        code,
        metadata: Some(metadata),
        kind,
        fallback_name: user_fields.name,
        fallback_description: user_fields.description,
        script_id: None,
    }
}
