// Moderation rule engine.
//
// An ordered list of independent checks run by one dispatcher loop. The first
// check that objects decides the verdict and nothing after it runs, so the
// expensive code scans never happen for accounts already refused.
//
// Order is fixed. In particular an unconfirmed *and* disposable email only
// ever sees the confirmation message.

use super::fingerprint::Fingerprint;
use super::moderation_models::{
    Account, PolicyInputs, Verdict, REASON_BANNED, REASON_DISPOSABLE_EMAIL, REASON_MALICIOUS,
    REASON_UNAUTHORIZED_COPY, REASON_UNCONFIRMED_EMAIL,
};
use crate::core::submission::{Submission, SubmittedCode};

/// What a single check gets to look at.
pub struct CheckContext<'a> {
    pub account: &'a Account,
    pub policy: &'a PolicyInputs,
    /// `None` when only the account is being vetted.
    pub code: Option<&'a SubmittedCode>,
}

/// One rule: a pure function that either objects with a verdict or passes.
pub struct ModerationCheck {
    pub name: &'static str,
    /// Whether the check scans the submitted code.
    pub scans_code: bool,
    run: fn(&CheckContext<'_>) -> Option<Verdict>,
}

impl ModerationCheck {
    pub fn run(&self, ctx: &CheckContext<'_>) -> Option<Verdict> {
        (self.run)(ctx)
    }
}

/// Every check, in evaluation order.
pub const CHECKS: [ModerationCheck; 5] = [
    ModerationCheck {
        name: "account_standing",
        scans_code: false,
        run: account_standing,
    },
    ModerationCheck {
        name: "email_confirmation",
        scans_code: false,
        run: email_confirmation,
    },
    ModerationCheck {
        name: "disposable_email",
        scans_code: false,
        run: disposable_email,
    },
    ModerationCheck {
        name: "content_provenance",
        scans_code: true,
        run: content_provenance,
    },
    ModerationCheck {
        name: "malicious_content",
        scans_code: true,
        run: malicious_content,
    },
];

/// Evaluate a classified submission from `account` against `policy`.
pub fn evaluate(submission: &Submission, account: &Account, policy: &PolicyInputs) -> Verdict {
    let ctx = CheckContext {
        account,
        policy,
        code: Some(&submission.code),
    };
    run_checks(CHECKS.iter(), &ctx)
}

/// Run only the account checks (standing, confirmation, disposable email).
///
/// Used to turn an account away before it is asked for anything else. Only
/// ever returns `Accept` or `Reject`.
pub fn evaluate_account(account: &Account, policy: &PolicyInputs) -> Verdict {
    let ctx = CheckContext {
        account,
        policy,
        code: None,
    };
    run_checks(CHECKS.iter().take_while(|check| !check.scans_code), &ctx)
}

fn run_checks<'c>(
    checks: impl Iterator<Item = &'c ModerationCheck>,
    ctx: &CheckContext<'_>,
) -> Verdict {
    for check in checks {
        if let Some(verdict) = check.run(ctx) {
            tracing::debug!(
                account_id = ctx.account.id,
                check = check.name,
                ?verdict,
                "Moderation check failed"
            );
            return verdict;
        }
        tracing::trace!(account_id = ctx.account.id, check = check.name, "Check passed");
    }
    Verdict::Accept
}

// ============================================================================
// CHECKS
// ============================================================================

fn account_standing(ctx: &CheckContext<'_>) -> Option<Verdict> {
    ctx.account.banned.then(|| Verdict::reject(REASON_BANNED))
}

fn email_confirmation(ctx: &CheckContext<'_>) -> Option<Verdict> {
    let blocked_domain = ctx
        .account
        .email_domain()
        .is_some_and(|domain| ctx.policy.blocked_email_domains.contains(&domain));

    (!ctx.account.email_confirmed || blocked_domain)
        .then(|| Verdict::reject(REASON_UNCONFIRMED_EMAIL))
}

fn disposable_email(ctx: &CheckContext<'_>) -> Option<Verdict> {
    let listed_domain = ctx
        .account
        .email_domain()
        .is_some_and(|domain| ctx.policy.disposable_email_domains.contains(&domain));

    (ctx.account.disposable_email || listed_domain)
        .then(|| Verdict::reject(REASON_DISPOSABLE_EMAIL))
}

fn content_provenance(ctx: &CheckContext<'_>) -> Option<Verdict> {
    let code = ctx.code?;
    let account_id = ctx.account.id;

    let owner = Fingerprint::of(code).and_then(|fp| ctx.policy.fingerprints.get(&fp).copied());
    if owner.is_some_and(|owner| owner != account_id) {
        return Some(Verdict::reject(REASON_UNAUTHORIZED_COPY));
    }

    ctx.policy
        .copied_code
        .iter()
        .any(|rule| {
            !rule.originating_account_ids.contains(&account_id) && rule.pattern.is_match(&code.text)
        })
        .then(|| Verdict::reject(REASON_UNAUTHORIZED_COPY))
}

fn malicious_content(ctx: &CheckContext<'_>) -> Option<Verdict> {
    let code = ctx.code?;

    ctx.policy
        .disallowed
        .iter()
        .any(|pattern| pattern.is_match(&code.text))
        .then(|| Verdict::reject_and_ban(REASON_MALICIOUS))
}
