//! Batch admission policy.
//!
//! Every incoming batch passes through three checks in a fixed priority
//! order before any scoring work is done: batch size, sensitive-field
//! exposure, and adversarial-content screening. The first check that fails
//! refuses the whole batch; later checks are not evaluated.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AnalyzerConfig, Transaction};

/// Adversarial pattern catalogue, grouped by the technique it detects.
///
/// Patterns are compiled case-insensitively and applied to free-text fields
/// an attacker controls: the merchant name and the device fingerprint.
const ADVERSARIAL_CATALOGUE: [(AdversarialCategory, &[&str]); 3] = [
    (
        AdversarialCategory::InstructionOverride,
        &[
            r"ignore\s+(previous|all|your)\s+instructions?",
            r"system\s*prompt",
            r"you\s+are\s+now",
            r"forget\s+(everything|all|previous)",
            r"new\s+instructions?:",
        ],
    ),
    (
        AdversarialCategory::DelimiterInjection,
        &[r"<\|.*?\|>", r"\\x[0-9a-f]{2}", r"&#\d+;"],
    ),
    (
        AdversarialCategory::CodeExecution,
        &[r"eval\(", r"exec\(", r"__import__"],
    ),
];

/// Why a batch was refused. The display strings are part of the wire
/// contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefusalReason {
    #[serde(rename = "Batch Size Exceeded")]
    BatchSizeExceeded,
    #[serde(rename = "PII Policy Violation")]
    PiiPolicyViolation,
    #[serde(rename = "Security Policy Violation")]
    SecurityPolicyViolation,
}

impl fmt::Display for RefusalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefusalReason::BatchSizeExceeded => write!(f, "Batch Size Exceeded"),
            RefusalReason::PiiPolicyViolation => write!(f, "PII Policy Violation"),
            RefusalReason::SecurityPolicyViolation => write!(f, "Security Policy Violation"),
        }
    }
}

/// A refused batch: no per-transaction analysis is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefusalResult {
    /// Always `true`; kept on the wire so consumers can discriminate
    /// refusals from completed results.
    pub refused: bool,
    pub reason: RefusalReason,
    pub details: String,
}

impl RefusalResult {
    pub fn new(reason: RefusalReason, details: impl Into<String>) -> Self {
        Self {
            refused: true,
            reason,
            details: details.into(),
        }
    }
}

/// Technique family an adversarial pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdversarialCategory {
    InstructionOverride,
    DelimiterInjection,
    CodeExecution,
}

impl AdversarialCategory {
    pub fn description(&self) -> &'static str {
        match self {
            AdversarialCategory::InstructionOverride => "instruction override phrase",
            AdversarialCategory::DelimiterInjection => "delimiter or encoding injection",
            AdversarialCategory::CodeExecution => "code execution idiom",
        }
    }
}

struct CategoryMatcher {
    category: AdversarialCategory,
    pattern: Regex,
}

/// Runs the admission checks for a batch.
pub struct PolicyGate {
    max_batch_size: usize,
    max_sensitive_fields: usize,
    violation_ratio_threshold: f64,
    /// `None` when adversarial screening is disabled by configuration.
    matchers: Option<Vec<CategoryMatcher>>,
}

impl PolicyGate {
    pub fn new(config: &AnalyzerConfig) -> Self {
        let matchers = if config.red_team_detection_enabled {
            Some(compile_catalogue())
        } else {
            None
        };
        Self {
            max_batch_size: config.max_batch_size,
            max_sensitive_fields: config.max_sensitive_fields_per_transaction,
            violation_ratio_threshold: config.sensitive_violation_ratio_threshold,
            matchers,
        }
    }

    /// Admit or refuse a batch.
    ///
    /// Returns the non-fatal warnings gathered along the way when the batch
    /// is admitted, or the refusal that stopped it. Checks run in priority
    /// order and the first failure wins.
    pub fn evaluate(&self, batch: &[Transaction]) -> Result<Vec<String>, RefusalResult> {
        if batch.len() > self.max_batch_size {
            return Err(RefusalResult::new(
                RefusalReason::BatchSizeExceeded,
                format!(
                    "Maximum {} transactions allowed per request. Received {} transactions.",
                    self.max_batch_size,
                    batch.len()
                ),
            ));
        }

        let mut warnings = Vec::new();
        let violating = batch
            .iter()
            .filter(|transaction| transaction.sensitive_field_count() > self.max_sensitive_fields)
            .count();
        if violating > 0 {
            let ratio = violating as f64 / batch.len() as f64;
            if ratio > self.violation_ratio_threshold {
                return Err(RefusalResult::new(
                    RefusalReason::PiiPolicyViolation,
                    format!(
                        "{} of {} transactions exceed the limit of {} sensitive fields per transaction.",
                        violating,
                        batch.len(),
                        self.max_sensitive_fields
                    ),
                ));
            }
            warnings.push(format!(
                "{} of {} transactions carry more than {} sensitive fields; batch admitted below the refusal threshold.",
                violating,
                batch.len(),
                self.max_sensitive_fields
            ));
        }

        if let Some(matchers) = &self.matchers {
            for (index, transaction) in batch.iter().enumerate() {
                if let Some(category) = scan(matchers, &transaction.merchant_name) {
                    return Err(self.security_refusal(category, "merchant name", index + 1));
                }
                if let Some(fingerprint) = &transaction.device_fingerprint {
                    if let Some(category) = scan(matchers, fingerprint) {
                        return Err(self.security_refusal(
                            category,
                            "device fingerprint",
                            index + 1,
                        ));
                    }
                }
            }
        }

        Ok(warnings)
    }

    /// Refusal details identify the finding by category, field, and batch
    /// position. The matched text is never echoed back.
    fn security_refusal(
        &self,
        category: AdversarialCategory,
        field: &str,
        position: usize,
    ) -> RefusalResult {
        RefusalResult::new(
            RefusalReason::SecurityPolicyViolation,
            format!(
                "Potential prompt injection ({}) detected in the {} of the transaction at position {}. Request refused for security reasons.",
                category.description(),
                field,
                position
            ),
        )
    }
}

fn compile_catalogue() -> Vec<CategoryMatcher> {
    ADVERSARIAL_CATALOGUE
        .iter()
        .map(|(category, patterns)| CategoryMatcher {
            category: *category,
            pattern: Regex::new(&format!("(?i){}", patterns.join("|")))
                .expect("adversarial pattern catalogue compiles"),
        })
        .collect()
}

fn scan(matchers: &[CategoryMatcher], text: &str) -> Option<AdversarialCategory> {
    matchers
        .iter()
        .find(|matcher| matcher.pattern.is_match(text))
        .map(|matcher| matcher.category)
}
