// Moderation service - runs a submission through the whole pipeline.
//
// This service handles:
// - Vetting the account before asking it for anything
// - Classifying the code (including the two-step library naming flow)
// - Evaluating the rule engine against a policy snapshot
// - Applying the verdict: publish, reject, or ban + delete
//
// NO storage details here - accounts, scripts and policy come in through traits.

use super::fingerprint::Fingerprint;
use super::moderation_models::{
    Account, AccountId, Outcome, PolicyInputs, Verdict, REASON_NOT_SCRIPT_AUTHOR,
};
use super::rule_engine::{evaluate, evaluate_account};
use crate::core::submission::{
    classify, Classification, ClassifyError, PendingClassification, ScriptId, Submission,
    SubmissionKind, SubmittedCode, UserFields,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Failed to load policy: {0}")]
    Unavailable(String),

    #[error("Invalid pattern in policy: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Failed to store policy: {0}")]
    StorageError(String),
}

/// Infrastructure failures. None of these is ever turned into an `Accept`.
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Policy unavailable: {0}")]
    PolicyUnavailable(#[from] PolicyError),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    #[error("Script {0} does not exist or is not owned by account {1}")]
    ScriptNotOwned(ScriptId, AccountId),
}

// ============================================================================
// STORAGE TRAITS (PORTS)
// ============================================================================

/// Where accounts live. Only the ban flag is ever written from here.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, account_id: AccountId)
        -> Result<Option<Account>, ModerationError>;

    /// Mark the account banned. Must be durable before returning.
    async fn set_banned(&self, account_id: AccountId) -> Result<(), ModerationError>;
}

/// Where accepted scripts are persisted.
#[async_trait]
pub trait ScriptStore: Send + Sync {
    /// Account that owns `script_id`, or `None` if no such script exists.
    async fn owner_of(&self, script_id: ScriptId) -> Result<Option<AccountId>, ModerationError>;

    /// Store the submission (a new script, or a new version when
    /// `submission.script_id` is set) and return its id.
    ///
    /// A new version of a script `author_id` does not own is
    /// `ModerationError::ScriptNotOwned`.
    async fn publish(
        &self,
        submission: &Submission,
        author_id: AccountId,
    ) -> Result<ScriptId, ModerationError>;

    /// Delete what `author_id` has stored under `script_id`. `None`, or a
    /// script owned by someone else, is a no-op.
    async fn delete_content(
        &self,
        script_id: Option<ScriptId>,
        author_id: AccountId,
    ) -> Result<(), ModerationError>;
}

/// Supplies policy snapshots. Refreshed out of band; the engine only reads.
#[async_trait]
pub trait PolicySource: Send + Sync {
    async fn snapshot(&self) -> Result<Arc<PolicyInputs>, PolicyError>;

    /// Remember that `owner` published code with this fingerprint.
    async fn record_fingerprint(
        &self,
        fingerprint: Fingerprint,
        owner: AccountId,
    ) -> Result<(), PolicyError>;
}

// ============================================================================
// REQUESTS / RESULTS
// ============================================================================

/// One submission attempt.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub account_id: AccountId,
    pub code: SubmittedCode,
    pub kind: SubmissionKind,
    pub user_fields: UserFields,
    /// Existing script this is a new version of.
    pub script_id: Option<ScriptId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    Completed(Outcome),
    /// Library without metadata: ask for a name, then call
    /// [`ModerationService::complete_identity`] with this state.
    NeedsIdentity(PendingClassification),
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct ModerationService<A: AccountStore, S: ScriptStore, P: PolicySource> {
    accounts: A,
    scripts: S,
    policy: P,
    /// One lock per account with work in flight. Holding it covers the whole
    /// read-account -> evaluate -> ban-write sequence.
    account_locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl<A: AccountStore, S: ScriptStore, P: PolicySource> ModerationService<A, S, P> {
    pub fn new(accounts: A, scripts: S, policy: P) -> Self {
        Self {
            accounts,
            scripts,
            policy,
            account_locks: DashMap::new(),
        }
    }

    pub fn accounts(&self) -> &A {
        &self.accounts
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Whether the account may post at all, without looking at any code.
    pub async fn check_account(&self, account_id: AccountId) -> Result<Verdict, ModerationError> {
        let account = self.load_account(account_id).await?;
        let policy = self.policy.snapshot().await?;
        Ok(evaluate_account(&account, &policy))
    }

    /// Run a new submission through classification, moderation and execution.
    pub async fn submit(&self, request: SubmissionRequest) -> Result<SubmitResult, ModerationError> {
        let SubmissionRequest {
            account_id,
            code,
            kind,
            user_fields,
            script_id,
        } = request;

        self.moderate(account_id, script_id, move || {
            classify(code, kind, user_fields)
        })
        .await
    }

    /// Second round trip of the library flow: the user has supplied a name.
    pub async fn complete_identity(
        &self,
        account_id: AccountId,
        pending: PendingClassification,
        user_fields: UserFields,
        script_id: Option<ScriptId>,
    ) -> Result<SubmitResult, ModerationError> {
        self.moderate(account_id, script_id, move || {
            pending.complete(user_fields).map(Classification::Ready)
        })
        .await
    }

    /// Apply a verdict.
    ///
    /// On `RejectAndBan` the ban is written before anything else so that the
    /// account's next submission is refused even if content deletion fails.
    pub async fn execute(
        &self,
        verdict: Verdict,
        submission: &Submission,
        account: &mut Account,
    ) -> Result<Outcome, ModerationError> {
        match verdict {
            Verdict::Accept => {
                let script_id = self.scripts.publish(submission, account.id).await?;

                if let Some(fingerprint) = Fingerprint::of(&submission.code) {
                    if let Err(e) = self.policy.record_fingerprint(fingerprint, account.id).await {
                        tracing::warn!(script_id, "Failed to record script fingerprint: {}", e);
                    }
                }

                tracing::info!(
                    account_id = account.id,
                    script_id,
                    name = %submission.name,
                    kind = %submission.kind,
                    "Script published"
                );
                Ok(Outcome::Published(script_id))
            }

            Verdict::Reject { reason } => {
                tracing::info!(account_id = account.id, %reason, "Submission rejected");
                Ok(Outcome::Rejected(reason))
            }

            Verdict::RejectAndBan { reason } => {
                self.accounts.set_banned(account.id).await?;
                account.banned = true;
                self.scripts
                    .delete_content(submission.script_id, account.id)
                    .await?;

                tracing::warn!(
                    account_id = account.id,
                    script_id = ?submission.script_id,
                    %reason,
                    "Account banned and content deleted"
                );
                Ok(Outcome::RejectedAndBanned(reason))
            }
        }
    }

    async fn moderate<F>(
        &self,
        account_id: AccountId,
        script_id: Option<ScriptId>,
        classifier: F,
    ) -> Result<SubmitResult, ModerationError>
    where
        F: FnOnce() -> Result<Classification, ClassifyError> + Send,
    {
        let lock = self.account_lock(account_id);
        let result = {
            let _guard = lock.lock().await;
            self.moderate_locked(account_id, script_id, classifier).await
        };

        drop(lock);
        self.release_lock(account_id);
        result
    }

    async fn moderate_locked<F>(
        &self,
        account_id: AccountId,
        script_id: Option<ScriptId>,
        classifier: F,
    ) -> Result<SubmitResult, ModerationError>
    where
        F: FnOnce() -> Result<Classification, ClassifyError> + Send,
    {
        // Read under the lock so a ban written by a concurrent submission is visible.
        let mut account = self.load_account(account_id).await?;
        let policy = self.policy.snapshot().await?;

        if let Verdict::Reject { reason } = evaluate_account(&account, &policy) {
            tracing::info!(account_id, %reason, "Account may not post");
            return Ok(SubmitResult::Completed(Outcome::Rejected(reason)));
        }

        // A new version may only target a script this account owns, so neither
        // publish nor delete ever sees someone else's script id.
        if let Some(id) = script_id {
            let owner = self.scripts.owner_of(id).await?;
            if owner != Some(account_id) {
                tracing::info!(
                    account_id,
                    script_id = id,
                    ?owner,
                    "New version for a script the account does not own"
                );
                return Ok(SubmitResult::Completed(Outcome::Rejected(
                    REASON_NOT_SCRIPT_AUTHOR.to_string(),
                )));
            }
        }

        let submission = match classifier() {
            Ok(Classification::Ready(submission)) => submission.with_script_id(script_id),
            Ok(Classification::NeedsIdentity(pending)) => {
                tracing::debug!(account_id, "Library has no metadata block, asking for a name");
                return Ok(SubmitResult::NeedsIdentity(pending));
            }
            Err(e) => {
                tracing::info!(account_id, error = %e, "Submission could not be classified");
                return Ok(SubmitResult::Completed(Outcome::Rejected(e.to_string())));
            }
        };

        let verdict = evaluate(&submission, &account, &policy);
        let outcome = self.execute(verdict, &submission, &mut account).await?;
        Ok(SubmitResult::Completed(outcome))
    }

    async fn load_account(&self, account_id: AccountId) -> Result<Account, ModerationError> {
        self.accounts
            .get_account(account_id)
            .await?
            .ok_or(ModerationError::AccountNotFound(account_id))
    }

    fn account_lock(&self, account_id: AccountId) -> Arc<Mutex<()>> {
        Arc::clone(
            self.account_locks
                .entry(account_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    fn release_lock(&self, account_id: AccountId) {
        // Only drop the entry when nobody else holds or waits on it.
        self.account_locks
            .remove_if(&account_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::ScriptLanguage;
    use crate::core::moderation::{
        CodePattern, CopiedCodeRule, REASON_BANNED, REASON_DISPOSABLE_EMAIL, REASON_MALICIOUS,
        REASON_UNAUTHORIZED_COPY, REASON_UNCONFIRMED_EMAIL,
    };
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::RwLock;

    /// In-memory account store for testing
    struct MockAccountStore {
        accounts: DashMap<AccountId, Account>,
    }

    impl MockAccountStore {
        fn with(accounts: Vec<Account>) -> Self {
            Self {
                accounts: accounts.into_iter().map(|a| (a.id, a)).collect(),
            }
        }
    }

    #[async_trait]
    impl AccountStore for MockAccountStore {
        async fn get_account(
            &self,
            account_id: AccountId,
        ) -> Result<Option<Account>, ModerationError> {
            let account = self.accounts.get(&account_id).map(|a| a.clone());
            // Give concurrent submissions a chance to interleave.
            tokio::task::yield_now().await;
            Ok(account)
        }

        async fn set_banned(&self, account_id: AccountId) -> Result<(), ModerationError> {
            tokio::task::yield_now().await;
            self.accounts
                .get_mut(&account_id)
                .map(|mut a| a.banned = true)
                .ok_or(ModerationError::AccountNotFound(account_id))
        }
    }

    struct StoredScript {
        author_id: AccountId,
        submission: Submission,
    }

    /// In-memory script store for testing
    struct MockScriptStore {
        scripts: DashMap<ScriptId, StoredScript>,
        next_id: AtomicU64,
    }

    impl MockScriptStore {
        fn new() -> Self {
            Self {
                scripts: DashMap::new(),
                next_id: AtomicU64::new(1),
            }
        }

        fn name_of(&self, script_id: ScriptId) -> Option<String> {
            self.scripts
                .get(&script_id)
                .map(|stored| stored.submission.name.clone())
        }
    }

    #[async_trait]
    impl ScriptStore for MockScriptStore {
        async fn owner_of(
            &self,
            script_id: ScriptId,
        ) -> Result<Option<AccountId>, ModerationError> {
            Ok(self.scripts.get(&script_id).map(|stored| stored.author_id))
        }

        async fn publish(
            &self,
            submission: &Submission,
            author_id: AccountId,
        ) -> Result<ScriptId, ModerationError> {
            let Some(id) = submission.script_id else {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                self.scripts.insert(
                    id,
                    StoredScript {
                        author_id,
                        submission: submission.clone(),
                    },
                );
                return Ok(id);
            };

            match self.scripts.get_mut(&id) {
                Some(mut stored) if stored.author_id == author_id => {
                    stored.submission = submission.clone();
                    Ok(id)
                }
                _ => Err(ModerationError::ScriptNotOwned(id, author_id)),
            }
        }

        async fn delete_content(
            &self,
            script_id: Option<ScriptId>,
            author_id: AccountId,
        ) -> Result<(), ModerationError> {
            if let Some(id) = script_id {
                self.scripts
                    .remove_if(&id, |_, stored| stored.author_id == author_id);
            }
            Ok(())
        }
    }

    /// Policy source whose snapshot can be made unavailable
    struct MockPolicySource {
        policy: RwLock<Option<Arc<PolicyInputs>>>,
    }

    impl MockPolicySource {
        fn new(policy: PolicyInputs) -> Self {
            Self {
                policy: RwLock::new(Some(Arc::new(policy))),
            }
        }

        fn unavailable() -> Self {
            Self {
                policy: RwLock::new(None),
            }
        }
    }

    #[async_trait]
    impl PolicySource for MockPolicySource {
        async fn snapshot(&self) -> Result<Arc<PolicyInputs>, PolicyError> {
            self.policy
                .read()
                .await
                .clone()
                .ok_or_else(|| PolicyError::Unavailable("pattern list not loaded".to_string()))
        }

        async fn record_fingerprint(
            &self,
            fingerprint: Fingerprint,
            owner: AccountId,
        ) -> Result<(), PolicyError> {
            let mut guard = self.policy.write().await;
            if let Some(policy) = guard.as_mut() {
                Arc::make_mut(policy).fingerprints.insert(fingerprint, owner);
            }
            Ok(())
        }
    }

    type TestService = ModerationService<MockAccountStore, MockScriptStore, MockPolicySource>;

    const HEADER: &str = "// ==UserScript==
// @name A Test!
// @description Unit test.
// @version 1.1
// @namespace http://greasyfork.local/users/1
// ==/UserScript==
";

    const MALICIOUS_BODY: &str = "location.href = \"https://example.com/unique-test-value\"\n";

    const BODY: &str = "document.querySelectorAll(\"a\").forEach((link) => {
  link.target = \"_blank\";
});
";

    fn account(id: AccountId) -> Account {
        Account {
            id,
            email: format!("user{}@example.com", id),
            email_confirmed: true,
            disposable_email: false,
            banned: false,
            trust_level: 0,
        }
    }

    fn policy() -> PolicyInputs {
        PolicyInputs {
            copied_code: vec![CopiedCodeRule {
                pattern: CodePattern::literal("this.was.copied.from.another.script"),
                originating_account_ids: vec![1],
            }],
            disallowed: vec![CodePattern::literal("https://example.com/unique-test-value")],
            ..Default::default()
        }
    }

    fn service(accounts: Vec<Account>) -> TestService {
        ModerationService::new(
            MockAccountStore::with(accounts),
            MockScriptStore::new(),
            MockPolicySource::new(policy()),
        )
    }

    fn script(account_id: AccountId, body: &str) -> SubmissionRequest {
        SubmissionRequest {
            account_id,
            code: SubmittedCode::new(format!("{}{}", HEADER, body), ScriptLanguage::Js),
            kind: SubmissionKind::Script,
            user_fields: UserFields::default(),
            script_id: None,
        }
    }

    fn completed(result: SubmitResult) -> Outcome {
        match result {
            SubmitResult::Completed(outcome) => outcome,
            SubmitResult::NeedsIdentity(_) => panic!("expected a completed submission"),
        }
    }

    #[tokio::test]
    async fn test_clean_script_is_published() {
        let service = service(vec![account(1)]);

        let outcome = completed(service.submit(script(1, BODY)).await.unwrap());

        assert_eq!(outcome, Outcome::Published(1));
        assert_eq!(service.scripts.name_of(1).as_deref(), Some("A Test!"));

        // The accepted code is now attributed to account 1.
        let snapshot = service.policy.snapshot().await.unwrap();
        assert_eq!(snapshot.fingerprints.values().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[tokio::test]
    async fn test_css_style_is_published() {
        let service = service(vec![account(1)]);
        let code = "/* ==UserStyle==
@name        Example UserCSS style
@description This is an example
@namespace   github.com/openstyles/stylus
@version     1.0.0
@license     unlicense
==/UserStyle== */

@-moz-document domain(\"example.com\") {
  a {
    color: red;
  }
}
";
        let request = SubmissionRequest {
            code: SubmittedCode::new(code, ScriptLanguage::Css),
            ..script(1, "")
        };

        let outcome = completed(service.submit(request).await.unwrap());

        assert_eq!(outcome, Outcome::Published(1));
        let stored = service.scripts.scripts.get(&1).unwrap();
        assert_eq!(stored.submission.name, "Example UserCSS style");
        assert_eq!(stored.submission.license(), Some("unlicense"));
    }

    #[tokio::test]
    async fn test_unconfirmed_disposable_sees_confirmation_message() {
        let service = service(vec![Account {
            email_confirmed: false,
            disposable_email: true,
            ..account(1)
        }]);

        let outcome = completed(service.submit(script(1, "var foo = 1;\n")).await.unwrap());
        assert_eq!(outcome, Outcome::Rejected(REASON_UNCONFIRMED_EMAIL.to_string()));
    }

    #[tokio::test]
    async fn test_confirmed_disposable_is_rejected() {
        let service = service(vec![Account {
            disposable_email: true,
            ..account(1)
        }]);

        let outcome = completed(service.submit(script(1, "var foo = 1;\n")).await.unwrap());
        assert_eq!(outcome, Outcome::Rejected(REASON_DISPOSABLE_EMAIL.to_string()));
        assert!(service.scripts.scripts.is_empty());
    }

    #[tokio::test]
    async fn test_script_without_metadata_is_rejected() {
        let service = service(vec![account(1)]);
        let request = SubmissionRequest {
            code: SubmittedCode::new("var foo = 1;\n", ScriptLanguage::Js),
            ..script(1, "")
        };

        let outcome = completed(service.submit(request).await.unwrap());
        assert_eq!(
            outcome,
            Outcome::Rejected(ClassifyError::MissingIdentity.to_string())
        );
    }

    #[tokio::test]
    async fn test_library_without_metadata_two_steps() {
        let service = service(vec![account(1)]);
        let request = SubmissionRequest {
            code: SubmittedCode::new("var foo = 1;\n", ScriptLanguage::Js),
            kind: SubmissionKind::Library,
            ..script(1, "")
        };

        let pending = match service.submit(request).await.unwrap() {
            SubmitResult::NeedsIdentity(pending) => pending,
            other => panic!("expected the library to need a name, got {:?}", other),
        };
        assert!(service.scripts.scripts.is_empty());

        let outcome = completed(
            service
                .complete_identity(
                    1,
                    pending,
                    UserFields::new("My library", "My library description"),
                    None,
                )
                .await
                .unwrap(),
        );

        assert_eq!(outcome, Outcome::Published(1));
        let stored = service.scripts.scripts.get(&1).unwrap();
        assert_eq!(stored.submission.name, "My library");
        assert_eq!(stored.submission.kind, SubmissionKind::Library);
        assert_eq!(stored.author_id, 1);
    }

    #[tokio::test]
    async fn test_banned_account_is_not_asked_for_a_name() {
        let service = service(vec![Account {
            banned: true,
            ..account(1)
        }]);
        let request = SubmissionRequest {
            code: SubmittedCode::new("var foo = 1;\n", ScriptLanguage::Js),
            kind: SubmissionKind::Library,
            ..script(1, "")
        };

        let outcome = completed(service.submit(request).await.unwrap());
        assert_eq!(outcome, Outcome::Rejected(REASON_BANNED.to_string()));
    }

    #[tokio::test]
    async fn test_disallowed_url_bans_and_deletes() {
        let service = service(vec![account(1), account(4)]);

        let bystander = completed(service.submit(script(1, BODY)).await.unwrap());
        assert_eq!(bystander, Outcome::Published(1));
        let own = completed(service.submit(script(4, "var foo = 1;\n")).await.unwrap());
        assert_eq!(own, Outcome::Published(2));

        // Script 2 gets a malicious new version.
        let outcome = completed(
            service
                .submit(SubmissionRequest {
                    script_id: Some(2),
                    ..script(4, MALICIOUS_BODY)
                })
                .await
                .unwrap(),
        );

        assert_eq!(outcome, Outcome::RejectedAndBanned(REASON_MALICIOUS.to_string()));
        assert!(service.accounts.accounts.get(&4).unwrap().banned);
        assert!(!service.scripts.scripts.contains_key(&2));
        // Only the submitter's own script is deleted.
        assert_eq!(service.scripts.name_of(1).as_deref(), Some("A Test!"));

        // Anything afterwards is refused at the first check.
        let later = completed(service.submit(script(4, "var bar = 2;\n")).await.unwrap());
        assert_eq!(later, Outcome::Rejected(REASON_BANNED.to_string()));
    }

    #[tokio::test]
    async fn test_version_of_another_accounts_script_is_rejected() {
        let service = service(vec![account(1), account(2)]);
        let first = completed(service.submit(script(1, BODY)).await.unwrap());
        assert_eq!(first, Outcome::Published(1));

        let hijack = SubmissionRequest {
            code: SubmittedCode::new(
                "// ==UserScript==\n// @name Hijack\n// ==/UserScript==\nvar foo = 1;\n",
                ScriptLanguage::Js,
            ),
            script_id: Some(1),
            ..script(2, "")
        };
        let outcome = completed(service.submit(hijack).await.unwrap());
        assert_eq!(outcome, Outcome::Rejected(REASON_NOT_SCRIPT_AUTHOR.to_string()));

        let malicious = completed(
            service
                .submit(SubmissionRequest {
                    script_id: Some(1),
                    ..script(2, MALICIOUS_BODY)
                })
                .await
                .unwrap(),
        );
        assert_eq!(malicious, Outcome::Rejected(REASON_NOT_SCRIPT_AUTHOR.to_string()));

        let stored = service.scripts.scripts.get(&1).unwrap();
        assert_eq!(stored.author_id, 1);
        assert_eq!(stored.submission.name, "A Test!");
    }

    #[tokio::test]
    async fn test_version_of_unknown_script_is_rejected() {
        let service = service(vec![account(4)]);

        let outcome = completed(
            service
                .submit(SubmissionRequest {
                    script_id: Some(7),
                    ..script(4, MALICIOUS_BODY)
                })
                .await
                .unwrap(),
        );

        assert_eq!(outcome, Outcome::Rejected(REASON_NOT_SCRIPT_AUTHOR.to_string()));
        assert!(!service.accounts.accounts.get(&4).unwrap().banned);
        assert!(service.scripts.scripts.is_empty());
    }

    #[tokio::test]
    async fn test_header_only_scripts_are_not_claimed() {
        let service = service(vec![account(1), account(2)]);
        let header_only = |account_id: AccountId, name: &str, require: &str| SubmissionRequest {
            code: SubmittedCode::new(
                format!(
                    "// ==UserScript==\n// @name {}\n// @require {}\n// ==/UserScript==\n",
                    name, require
                ),
                ScriptLanguage::Js,
            ),
            ..script(account_id, "")
        };

        let alpha = service
            .submit(header_only(1, "Alpha", "https://a.example/lib.js"))
            .await
            .unwrap();
        let beta = service
            .submit(header_only(2, "Beta", "https://b.example/other.js"))
            .await
            .unwrap();

        assert_eq!(completed(alpha), Outcome::Published(1));
        assert_eq!(completed(beta), Outcome::Published(2));
        assert!(service.policy.snapshot().await.unwrap().fingerprints.is_empty());
    }

    #[tokio::test]
    async fn test_short_identical_bodies_are_not_claimed() {
        let service = service(vec![account(1), account(2)]);

        let first = completed(service.submit(script(1, "var foo = 1;\n")).await.unwrap());
        let second = completed(service.submit(script(2, "var foo = 1;\n")).await.unwrap());

        assert_eq!(first, Outcome::Published(1));
        assert_eq!(second, Outcome::Published(2));
    }

    #[tokio::test]
    async fn test_execute_sets_ban_flag_on_account() {
        let service = service(vec![account(4)]);
        let mut acct = account(4);
        let submission = match classify(
            script(4, MALICIOUS_BODY).code,
            SubmissionKind::Script,
            UserFields::default(),
        )
        .unwrap()
        {
            Classification::Ready(s) => s,
            Classification::NeedsIdentity(_) => unreachable!(),
        };

        let outcome = service
            .execute(
                Verdict::reject_and_ban(REASON_MALICIOUS),
                &submission,
                &mut acct,
            )
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::RejectedAndBanned(REASON_MALICIOUS.to_string()));
        assert!(acct.banned);
    }

    #[tokio::test]
    async fn test_copy_of_another_accounts_script() {
        let service = service(vec![account(1), account(2)]);
        let body = "function original() {\n  return document.title.length * 42;\n}\n";

        let first = completed(service.submit(script(1, body)).await.unwrap());
        assert_eq!(first, Outcome::Published(1));

        let copy = completed(service.submit(script(2, body)).await.unwrap());
        assert_eq!(copy, Outcome::Rejected(REASON_UNAUTHORIZED_COPY.to_string()));
        assert!(!service.accounts.accounts.get(&2).unwrap().banned);

        // The owner can keep posting it.
        let again = completed(service.submit(script(1, body)).await.unwrap());
        assert_eq!(again, Outcome::Published(2));
    }

    #[tokio::test]
    async fn test_copied_code_rule() {
        let service = service(vec![account(4)]);

        let outcome = completed(
            service
                .submit(script(4, "this.was.copied.from.another.script\n"))
                .await
                .unwrap(),
        );

        assert_eq!(outcome, Outcome::Rejected(REASON_UNAUTHORIZED_COPY.to_string()));
        assert!(!service.accounts.accounts.get(&4).unwrap().banned);
    }

    #[tokio::test]
    async fn test_policy_unavailable_fails_closed() {
        let service = ModerationService::new(
            MockAccountStore::with(vec![account(1)]),
            MockScriptStore::new(),
            MockPolicySource::unavailable(),
        );

        let result = service.submit(script(1, "var foo = 1;\n")).await;

        assert!(matches!(result, Err(ModerationError::PolicyUnavailable(_))));
        assert!(service.scripts.scripts.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let service = service(vec![]);
        let result = service.submit(script(9, "var foo = 1;\n")).await;
        assert!(matches!(result, Err(ModerationError::AccountNotFound(9))));
    }

    #[tokio::test]
    async fn test_check_account() {
        let service = service(vec![
            account(1),
            Account {
                email_confirmed: false,
                ..account(2)
            },
        ]);

        assert_eq!(service.check_account(1).await.unwrap(), Verdict::Accept);
        assert_eq!(
            service.check_account(2).await.unwrap(),
            Verdict::reject(REASON_UNCONFIRMED_EMAIL)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_malicious_submissions_ban_once() {
        let service = Arc::new(service(vec![account(4)]));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.submit(script(4, MALICIOUS_BODY)).await })
            })
            .collect();

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(completed(handle.await.unwrap().unwrap()));
        }

        let banned = outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::RejectedAndBanned(_)))
            .count();
        assert_eq!(banned, 1, "outcomes: {:?}", outcomes);
        assert!(outcomes.contains(&Outcome::Rejected(REASON_BANNED.to_string())));
        assert!(service.account_locks.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_benign_and_malicious() {
        let service = Arc::new(service(vec![account(4)]));

        let malicious = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.submit(script(4, MALICIOUS_BODY)).await })
        };
        let benign = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.submit(script(4, "var foo = 1;\n")).await })
        };

        let malicious = completed(malicious.await.unwrap().unwrap());
        let benign = completed(benign.await.unwrap().unwrap());

        assert_eq!(malicious, Outcome::RejectedAndBanned(REASON_MALICIOUS.to_string()));
        // Either the benign one got in before the ban, or it saw the ban.
        assert!(
            matches!(benign, Outcome::Published(_))
                || benign == Outcome::Rejected(REASON_BANNED.to_string()),
            "benign outcome: {:?}",
            benign
        );
        assert!(service.accounts.accounts.get(&4).unwrap().banned);
    }
}
