//! # Transaction Fraud Screener
//!
//! Rule-based fraud screening for batches of credit card transactions.
//!
//! ## Features
//!
//! - **Policy Gating**: batch-size, sensitive-field, and adversarial-content
//!   checks that can refuse a batch before any analysis runs
//! - **Auditable Risk Scoring**: a fixed table of weighted rules; every rule
//!   that fires is captured as a discrete risk factor
//! - **Deterministic Explanations**: per-transaction narratives assembled
//!   from the score and its factors, with an optional external narrative
//!   service that can enrich, but never change, a result
//! - **Citation Validation**: supporting references filtered against a
//!   trusted-domain allow-list
//! - **Batch Aggregation**: per-classification counts, mean risk score, and
//!   a natural-language summary, all in input order
//!
//! The pipeline is synchronous and pure: the same batch and configuration
//! always produce the same result, byte for byte. Nothing is persisted,
//! retried, or looked up across batches.
//!
//! ## Quick Start
//!
//! ```
//! use transaction_fraud_screener::{AnalyzerConfig, FraudAnalyzer, Transaction};
//!
//! let analyzer = FraudAnalyzer::new(AnalyzerConfig::default());
//! let batch = vec![Transaction {
//!     transaction_id: "TXN-1001".to_string(),
//!     timestamp: "2024-03-15T14:30:00Z".to_string(),
//!     amount: 129.99,
//!     merchant_name: "Maple Hardware".to_string(),
//!     merchant_category: "home_improvement".to_string(),
//!     card_last4: "4242".to_string(),
//!     cardholder_name: None,
//!     location: "Portland, OR".to_string(),
//!     device_fingerprint: None,
//!     ip_address: None,
//! }];
//!
//! let outcome = analyzer.analyze_batch(&batch);
//! assert!(!outcome.is_refused());
//! ```

pub mod aggregator;
pub mod citations;
pub mod explanation;
pub mod policy_gate;
pub mod risk_scoring;

pub use aggregator::{BatchAnalysisResult, ResultAggregator};
pub use citations::{Citation, CitationValidator};
pub use explanation::{
    ExplanationAssembler, ExplanationError, ExplanationRequest, ExplanationService, RiskLevel,
};
pub use policy_gate::{PolicyGate, RefusalReason, RefusalResult};
pub use risk_scoring::{Classification, RiskAssessment, RiskFactor, RiskScorer, ScoreError};

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Neutral score recorded for transactions the scorer cannot evaluate.
const UNSCORED_RISK_SCORE: f64 = 0.5;

/// A single credit card transaction submitted for screening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    /// RFC 3339 or naive `YYYY-MM-DDTHH:MM:SS` text. Parsed at scoring
    /// time; an unparseable value makes the transaction unscorable, not
    /// the batch invalid.
    pub timestamp: String,
    pub amount: f64,
    pub merchant_name: String,
    pub merchant_category: String,
    /// Last four digits of the card number, never the full PAN.
    pub card_last4: String,
    /// Sensitive; counted against the per-transaction exposure limit.
    pub cardholder_name: Option<String>,
    pub location: String,
    /// Sensitive, and also screened for adversarial content.
    pub device_fingerprint: Option<String>,
    /// Sensitive; counted against the per-transaction exposure limit.
    pub ip_address: Option<String>,
}

impl Transaction {
    /// Number of populated sensitive fields. Whitespace-only values are
    /// treated as absent.
    pub fn sensitive_field_count(&self) -> usize {
        [
            self.cardholder_name.as_deref(),
            self.device_fingerprint.as_deref(),
            self.ip_address.as_deref(),
        ]
        .iter()
        .filter(|field| field.map_or(false, |value| !value.trim().is_empty()))
        .count()
    }
}

/// Screening configuration, fixed for the lifetime of an analyzer.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Largest admissible batch, inclusive.
    pub max_batch_size: usize,
    /// Sensitive fields a single transaction may carry, inclusive.
    pub max_sensitive_fields_per_transaction: usize,
    /// Fraction of violating transactions above which the batch is
    /// refused. The comparison is strict.
    pub sensitive_violation_ratio_threshold: f64,
    pub red_team_detection_enabled: bool,
    /// Domains citations may come from; subdomains are included.
    pub allowed_citation_domains: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            max_sensitive_fields_per_transaction: 2,
            sensitive_violation_ratio_threshold: 0.10,
            red_team_detection_enabled: true,
            allowed_citation_domains: vec![
                "fincen.gov".to_string(),
                "ffiec.gov".to_string(),
                "consumerfinance.gov".to_string(),
            ],
        }
    }
}

impl AnalyzerConfig {
    /// Build a configuration from environment variables, keeping the
    /// default for anything unset or unparseable.
    ///
    /// Recognized variables: `FRAUD_MAX_BATCH_SIZE`,
    /// `FRAUD_MAX_SENSITIVE_FIELDS`, `FRAUD_SENSITIVE_VIOLATION_RATIO`,
    /// `FRAUD_RED_TEAM_DETECTION`, and `FRAUD_CITATION_DOMAINS`
    /// (comma-separated).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(value) = env_parse("FRAUD_MAX_BATCH_SIZE") {
            config.max_batch_size = value;
        }
        if let Some(value) = env_parse("FRAUD_MAX_SENSITIVE_FIELDS") {
            config.max_sensitive_fields_per_transaction = value;
        }
        if let Some(value) = env_parse("FRAUD_SENSITIVE_VIOLATION_RATIO") {
            config.sensitive_violation_ratio_threshold = value;
        }
        if let Some(value) = env_parse("FRAUD_RED_TEAM_DETECTION") {
            config.red_team_detection_enabled = value;
        }
        if let Ok(value) = std::env::var("FRAUD_CITATION_DOMAINS") {
            let domains: Vec<String> = value
                .split(',')
                .map(|domain| domain.trim().to_string())
                .filter(|domain| !domain.is_empty())
                .collect();
            if !domains.is_empty() {
                config.allowed_citation_domains = domains;
            }
        }
        config
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}

/// Completed screening of one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAnalysis {
    pub transaction_id: String,
    pub classification: Classification,
    pub risk_score: f64,
    pub risk_factors: Vec<RiskFactor>,
    pub explanation: String,
}

/// What came back for a batch: a full analysis, or a refusal.
///
/// Serialized untagged, so each side keeps its own wire shape; the
/// `refused` marker on [`RefusalResult`] discriminates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    Completed(BatchAnalysisResult),
    Refused(RefusalResult),
}

impl AnalysisOutcome {
    pub fn is_refused(&self) -> bool {
        matches!(self, AnalysisOutcome::Refused(_))
    }

    pub fn as_completed(&self) -> Option<&BatchAnalysisResult> {
        match self {
            AnalysisOutcome::Completed(result) => Some(result),
            AnalysisOutcome::Refused(_) => None,
        }
    }

    pub fn as_refusal(&self) -> Option<&RefusalResult> {
        match self {
            AnalysisOutcome::Completed(_) => None,
            AnalysisOutcome::Refused(refusal) => Some(refusal),
        }
    }
}

/// The screening pipeline: policy gate, risk scorer, explanation assembly,
/// citation validation, and aggregation behind one entry point.
pub struct FraudAnalyzer {
    config: AnalyzerConfig,
    gate: PolicyGate,
    scorer: RiskScorer,
    assembler: ExplanationAssembler,
    citation_validator: CitationValidator,
    aggregator: ResultAggregator,
    explanation_service: Option<Box<dyn ExplanationService>>,
}

impl FraudAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let gate = PolicyGate::new(&config);
        let citation_validator = CitationValidator::new(&config.allowed_citation_domains);
        Self {
            config,
            gate,
            scorer: RiskScorer::new(),
            assembler: ExplanationAssembler::new(),
            citation_validator,
            aggregator: ResultAggregator::new(),
            explanation_service: None,
        }
    }

    /// Attach an external narrative service. See [`FraudAnalyzer::narrative_for`].
    pub fn with_explanation_service(mut self, service: Box<dyn ExplanationService>) -> Self {
        self.explanation_service = Some(service);
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Screen a batch end to end.
    ///
    /// The policy gate runs first and a refusal short-circuits everything
    /// else. Admitted batches are scored transaction by transaction in
    /// input order; a transaction the scorer rejects is recorded as
    /// `unknown` with a neutral score and the batch continues.
    pub fn analyze_batch(&self, transactions: &[Transaction]) -> AnalysisOutcome {
        let mut warnings = match self.gate.evaluate(transactions) {
            Ok(gate_warnings) => gate_warnings,
            Err(refusal) => {
                warn!(reason = %refusal.reason, "batch refused by policy gate");
                return AnalysisOutcome::Refused(refusal);
            }
        };

        let mut analyses = Vec::with_capacity(transactions.len());
        for (index, transaction) in transactions.iter().enumerate() {
            match self.scorer.score(transaction) {
                Ok(assessment) => {
                    debug!(
                        transaction_id = %transaction.transaction_id,
                        risk_score = assessment.score,
                        classification = %assessment.classification,
                        "transaction scored"
                    );
                    let explanation = self.assembler.assemble(
                        transaction,
                        assessment.score,
                        assessment.classification,
                        &assessment.factors,
                    );
                    analyses.push(FraudAnalysis {
                        transaction_id: transaction.transaction_id.clone(),
                        classification: assessment.classification,
                        risk_score: assessment.score,
                        risk_factors: assessment.factors,
                        explanation,
                    });
                }
                Err(error) => {
                    warn!(position = index + 1, error = %error, "transaction could not be scored");
                    warnings.push(format!(
                        "Transaction at position {} could not be scored: {}.",
                        index + 1,
                        error
                    ));
                    analyses.push(self.unscored_analysis(transaction, &error));
                }
            }
        }

        let (citations, citation_warnings) = self
            .citation_validator
            .filter(self.aggregator.default_citations());
        warnings.extend(citation_warnings);

        let result = self.aggregator.aggregate(analyses, citations, warnings);
        info!(
            total = result.total_transactions,
            fraudulent = result.fraudulent_count,
            suspicious = result.suspicious_count,
            legitimate = result.legitimate_count,
            unknown = result.unknown_count,
            "batch analysis complete"
        );
        AnalysisOutcome::Completed(result)
    }

    /// Screen a JSON array of transactions and serialize the outcome.
    /// Convenience for callers that hold batches in wire form.
    pub fn analyze_json(&self, payload: &str) -> Result<String, serde_json::Error> {
        let transactions: Vec<Transaction> = serde_json::from_str(payload)?;
        serde_json::to_string(&self.analyze_batch(&transactions))
    }

    /// Ask the attached narrative service to expand one analysis.
    ///
    /// Returns `None` when no service is attached or the call fails. The
    /// screening result itself never depends on this.
    pub fn narrative_for(
        &self,
        transaction: &Transaction,
        analysis: &FraudAnalysis,
    ) -> Option<String> {
        let service = self.explanation_service.as_ref()?;
        let request = ExplanationRequest::from_analysis(transaction, analysis);
        match service.explain(&request) {
            Ok(narrative) => Some(narrative),
            Err(error) => {
                debug!(
                    transaction_id = %analysis.transaction_id,
                    error = %error,
                    "narrative service call failed"
                );
                None
            }
        }
    }

    fn unscored_analysis(&self, transaction: &Transaction, error: &ScoreError) -> FraudAnalysis {
        FraudAnalysis {
            transaction_id: transaction.transaction_id.clone(),
            classification: Classification::Unknown,
            risk_score: UNSCORED_RISK_SCORE,
            risk_factors: vec![RiskFactor {
                description: format!("Risk evaluation failed: {}", error),
                weight: 0.0,
            }],
            explanation: self.assembler.assemble_unscored(transaction, error),
        }
    }
}

impl Default for FraudAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}
