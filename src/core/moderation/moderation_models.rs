// Moderation domain models - accounts, verdicts and the policy snapshot.
//
// These are pure domain types with no storage dependencies.
// The store adapters in infra/ convert rows and files into them.

use super::fingerprint::Fingerprint;
use crate::core::submission::ScriptId;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

pub type AccountId = u64;

// Reasons surfaced verbatim to the submitter.
pub const REASON_BANNED: &str = "account banned";
pub const REASON_UNCONFIRMED_EMAIL: &str = "must confirm email before posting";
pub const REASON_DISPOSABLE_EMAIL: &str = "disposable email addresses may not post";
pub const REASON_UNAUTHORIZED_COPY: &str = "unauthorized copy";
pub const REASON_MALICIOUS: &str = "malicious content";
pub const REASON_NOT_SCRIPT_AUTHOR: &str = "only the author of a script may post new versions of it";

/// The account posting a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub email_confirmed: bool,
    pub disposable_email: bool,
    pub banned: bool,
    /// Computed elsewhere (e.g. from previously accepted scripts).
    pub trust_level: u32,
}

impl Account {
    /// Lower-cased domain part of the email address.
    pub fn email_domain(&self) -> Option<String> {
        self.email
            .rsplit_once('@')
            .map(|(_, domain)| domain.trim().to_lowercase())
            .filter(|domain| !domain.is_empty())
    }
}

/// What the rule engine decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    /// Refuse the submission; nothing else happens.
    Reject { reason: String },
    /// Refuse, ban the account and delete its content for this submission.
    RejectAndBan { reason: String },
}

impl Verdict {
    pub fn reject(reason: &str) -> Self {
        Verdict::Reject {
            reason: reason.to_string(),
        }
    }

    pub fn reject_and_ban(reason: &str) -> Self {
        Verdict::RejectAndBan {
            reason: reason.to_string(),
        }
    }
}

/// What actually happened after the verdict was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Published(ScriptId),
    Rejected(String),
    RejectedAndBanned(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Published(id) => write!(f, "Published as script #{}", id),
            Outcome::Rejected(reason) => write!(f, "Rejected: {}", reason),
            Outcome::RejectedAndBanned(reason) => {
                write!(f, "This script has been deleted and the account banned: {}", reason)
            }
        }
    }
}

// ============================================================================
// POLICY
// ============================================================================

/// A code pattern from the policy lists. Matching is case-sensitive.
#[derive(Debug, Clone)]
pub enum CodePattern {
    Literal(String),
    Regex(Regex),
}

impl CodePattern {
    pub fn literal(pattern: impl Into<String>) -> Self {
        CodePattern::Literal(pattern.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(CodePattern::Regex)
    }

    pub fn is_match(&self, code: &str) -> bool {
        match self {
            CodePattern::Literal(needle) => !needle.is_empty() && code.contains(needle.as_str()),
            CodePattern::Regex(re) => re.is_match(code),
        }
    }
}

/// Code known to be lifted from a script owned by someone else.
#[derive(Debug, Clone)]
pub struct CopiedCodeRule {
    pub pattern: CodePattern,
    /// Accounts allowed to post code matching this rule (the original authors).
    pub originating_account_ids: Vec<AccountId>,
}

/// Read-only snapshot of everything the rule engine consults besides the
/// submission and the account.
#[derive(Debug, Clone, Default)]
pub struct PolicyInputs {
    pub disposable_email_domains: HashSet<String>,
    /// Domains whose accounts are always asked to (re)confirm their email.
    pub blocked_email_domains: HashSet<String>,
    pub copied_code: Vec<CopiedCodeRule>,
    /// Fingerprints of accepted code, mapped to the account that owns it.
    pub fingerprints: HashMap<Fingerprint, AccountId>,
    /// Patterns that get the submitter banned.
    pub disallowed: Vec<CodePattern>,
}

/// One pattern as written in the policy file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub pattern: String,
    #[serde(default)]
    pub regex: bool,
}

impl PatternEntry {
    pub fn compile(&self) -> Result<CodePattern, regex::Error> {
        if self.regex {
            CodePattern::regex(&self.pattern)
        } else {
            Ok(CodePattern::literal(self.pattern.clone()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopiedCodeEntry {
    #[serde(flatten)]
    pub pattern: PatternEntry,
    #[serde(default)]
    pub originating_account_ids: Vec<AccountId>,
}

/// Serialized form of [`PolicyInputs`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyFile {
    pub disposable_email_domains: Vec<String>,
    pub blocked_email_domains: Vec<String>,
    pub copied_code: Vec<CopiedCodeEntry>,
    /// Hex SHA-256 fingerprint -> owning account.
    pub fingerprints: HashMap<String, AccountId>,
    pub disallowed: Vec<PatternEntry>,
}

impl PolicyFile {
    /// Compile patterns and normalize domains into a snapshot.
    pub fn compile(&self) -> Result<PolicyInputs, regex::Error> {
        let copied_code = self
            .copied_code
            .iter()
            .map(|entry| {
                Ok(CopiedCodeRule {
                    pattern: entry.pattern.compile()?,
                    originating_account_ids: entry.originating_account_ids.clone(),
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        let disallowed = self
            .disallowed
            .iter()
            .map(PatternEntry::compile)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PolicyInputs {
            disposable_email_domains: normalize_domains(&self.disposable_email_domains),
            blocked_email_domains: normalize_domains(&self.blocked_email_domains),
            copied_code,
            fingerprints: self
                .fingerprints
                .iter()
                .map(|(hex, owner)| (Fingerprint::from_hex(hex), *owner))
                .collect(),
            disallowed,
        })
    }
}

fn normalize_domains(domains: &[String]) -> HashSet<String> {
    domains
        .iter()
        .map(|d| d.trim().trim_start_matches('@').to_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(email: &str) -> Account {
        Account {
            id: 1,
            email: email.to_string(),
            email_confirmed: true,
            disposable_email: false,
            banned: false,
            trust_level: 0,
        }
    }

    #[test]
    fn test_email_domain() {
        assert_eq!(
            account("Salomon@Fishy.Hut").email_domain().as_deref(),
            Some("fishy.hut")
        );
        assert_eq!(account("no-at-sign").email_domain(), None);
        assert_eq!(account("trailing@").email_domain(), None);
    }

    #[test]
    fn test_code_patterns_are_case_sensitive() {
        let literal = CodePattern::literal("https://example.com/unique-test-value");
        assert!(literal.is_match("location.href = \"https://example.com/unique-test-value\""));
        assert!(!literal.is_match("location.href = \"HTTPS://EXAMPLE.COM/UNIQUE-TEST-VALUE\""));

        let regex = CodePattern::regex(r"evil\d+\.example").unwrap();
        assert!(regex.is_match("fetch('https://evil42.example/x')"));
        assert!(!regex.is_match("fetch('https://EVIL42.example/x')"));
    }

    #[test]
    fn test_empty_literal_never_matches() {
        assert!(!CodePattern::literal("").is_match("anything"));
    }

    #[test]
    fn test_policy_file_compiles() {
        let json = r#"{
            "disposable_email_domains": ["Mailinator.com"],
            "blocked_email_domains": ["@derspamhaus.de"],
            "copied_code": [
                { "pattern": "this.was.copied.from.another.script", "originating_account_ids": [1] }
            ],
            "disallowed": [
                { "pattern": "https://example.com/unique-test-value" },
                { "pattern": "coinhive\\.min\\.js", "regex": true }
            ]
        }"#;

        let file: PolicyFile = serde_json::from_str(json).unwrap();
        let policy = file.compile().unwrap();

        assert!(policy.disposable_email_domains.contains("mailinator.com"));
        assert!(policy.blocked_email_domains.contains("derspamhaus.de"));
        assert_eq!(policy.copied_code[0].originating_account_ids, vec![1]);
        assert_eq!(policy.disallowed.len(), 2);
        assert!(policy.disallowed[1].is_match("<script src=coinhive.min.js>"));
        assert!(policy.fingerprints.is_empty());
    }

    #[test]
    fn test_invalid_regex_fails_to_compile() {
        let file = PolicyFile {
            disallowed: vec![PatternEntry {
                pattern: "(unclosed".to_string(),
                regex: true,
            }],
            ..Default::default()
        };

        assert!(file.compile().is_err());
    }
}
