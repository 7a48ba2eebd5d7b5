//! Deterministic explanation assembly, plus the optional narrative seam.
//!
//! Every analysis carries an explanation assembled locally from the score
//! and its factors. A richer narrative can be requested from an external
//! [`ExplanationService`], but that call is strictly best-effort: the
//! pipeline result never depends on it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::risk_scoring::{Classification, RiskFactor, ScoreError};
use crate::{FraudAnalysis, Transaction};

/// Probability above which a narrative request is framed as high risk.
const HIGH_RISK_THRESHOLD: f64 = 0.85;
/// Probability above which it is framed as medium risk.
const MEDIUM_RISK_THRESHOLD: f64 = 0.45;

/// Builds the deterministic per-transaction explanation text.
#[derive(Debug, Clone, Default)]
pub struct ExplanationAssembler;

impl ExplanationAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the explanation for a scored transaction.
    ///
    /// The lead sentence restates amount, merchant, classification, and
    /// score. What follows depends on how many rules fired: a fixed
    /// no-indicator sentence, a single inline concern, or one bullet line
    /// per factor.
    pub fn assemble(
        &self,
        transaction: &Transaction,
        risk_score: f64,
        classification: Classification,
        factors: &[RiskFactor],
    ) -> String {
        let mut explanation = format!(
            "This ${:.2} transaction at {} is classified as {} (risk score: {:.1}%).",
            transaction.amount,
            transaction.merchant_name,
            classification.to_string().to_uppercase(),
            risk_score * 100.0
        );

        match factors.len() {
            0 => explanation.push_str(" No risk indicators were triggered."),
            1 => {
                explanation.push_str(&format!(" Key concern: {}.", factors[0].description));
            }
            _ => {
                explanation.push_str(" Key concerns:");
                for factor in factors {
                    explanation.push_str(&format!("\n- {}", factor.description));
                }
            }
        }

        explanation
    }

    /// Explanation used when the scorer could not evaluate the transaction.
    pub fn assemble_unscored(&self, transaction: &Transaction, error: &ScoreError) -> String {
        format!(
            "This ${:.2} transaction at {} could not be evaluated: {}. Manual review is recommended.",
            transaction.amount, transaction.merchant_name, error
        )
    }
}

/// Coarse risk band used when framing a narrative request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_probability(probability: f64) -> Self {
        if probability > HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else if probability > MEDIUM_RISK_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Everything a narrative service needs about one analysis.
///
/// Only derived material is included. Sensitive fields such as the
/// cardholder name or device fingerprint are never forwarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationRequest {
    pub transaction_id: String,
    pub transaction_summary: String,
    pub risk_probability: f64,
    pub risk_level: RiskLevel,
    pub risk_factors: Vec<String>,
}

impl ExplanationRequest {
    pub fn from_analysis(transaction: &Transaction, analysis: &FraudAnalysis) -> Self {
        Self {
            transaction_id: analysis.transaction_id.clone(),
            transaction_summary: format!(
                "${:.2} at {} ({}) in {}, card ending {}",
                transaction.amount,
                transaction.merchant_name,
                transaction.merchant_category,
                transaction.location,
                transaction.card_last4
            ),
            risk_probability: analysis.risk_score,
            risk_level: RiskLevel::from_probability(analysis.risk_score),
            risk_factors: analysis
                .risk_factors
                .iter()
                .map(|factor| factor.description.clone())
                .collect(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ExplanationError {
    #[error("explanation service unavailable")]
    Unavailable,
}

/// External narrative provider. Implementations may call out to a model
/// service; failures are absorbed by the caller, never surfaced as batch
/// errors.
pub trait ExplanationService: Send + Sync {
    fn explain(&self, request: &ExplanationRequest) -> Result<String, ExplanationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction() -> Transaction {
        Transaction {
            transaction_id: "TXN-0001".to_string(),
            timestamp: "2024-03-15T14:30:00Z".to_string(),
            amount: 1250.0,
            merchant_name: "Skyline Electronics".to_string(),
            merchant_category: "electronics".to_string(),
            card_last4: "9921".to_string(),
            cardholder_name: None,
            location: "Denver, CO".to_string(),
            device_fingerprint: None,
            ip_address: None,
        }
    }

    fn factor(description: &str, weight: f64) -> RiskFactor {
        RiskFactor {
            description: description.to_string(),
            weight,
        }
    }

    #[test]
    fn zero_factors_use_the_no_indicator_sentence() {
        let text = ExplanationAssembler::new().assemble(
            &transaction(),
            0.0,
            Classification::Legitimate,
            &[],
        );

        assert_eq!(
            text,
            "This $1250.00 transaction at Skyline Electronics is classified as \
             LEGITIMATE (risk score: 0.0%). No risk indicators were triggered."
        );
    }

    #[test]
    fn single_factor_is_inlined() {
        let text = ExplanationAssembler::new().assemble(
            &transaction(),
            0.15,
            Classification::Legitimate,
            &[factor("Moderately high transaction amount: $1250.00", 0.15)],
        );

        assert!(text.contains(
            "Key concern: Moderately high transaction amount: $1250.00."
        ));
        assert!(!text.contains("\n-"));
    }

    #[test]
    fn multiple_factors_become_bullet_lines() {
        let text = ExplanationAssembler::new().assemble(
            &transaction(),
            0.75,
            Classification::Fraudulent,
            &[
                factor("High transaction amount: $6000.00", 0.30),
                factor("Late-night transaction time: 03:00 hour", 0.20),
                factor("High-risk merchant category: crypto", 0.25),
            ],
        );

        assert!(text.contains("classified as FRAUDULENT (risk score: 75.0%)"));
        assert!(text.contains("Key concerns:"));
        assert_eq!(text.matches("\n- ").count(), 3);
    }

    #[test]
    fn score_is_rendered_as_a_percentage_with_one_decimal() {
        let text = ExplanationAssembler::new().assemble(
            &transaction(),
            0.451,
            Classification::Suspicious,
            &[factor("x", 0.45)],
        );

        assert!(text.contains("risk score: 45.1%"));
    }

    #[test]
    fn unscored_explanation_names_the_failure_without_raw_input() {
        let text = ExplanationAssembler::new()
            .assemble_unscored(&transaction(), &ScoreError::InvalidTimestamp);

        assert!(text.contains("could not be evaluated"));
        assert!(text.contains("unrecognized timestamp format"));
        assert!(text.contains("Manual review is recommended."));
    }

    #[test]
    fn risk_level_bands_are_exclusive_at_their_boundaries() {
        assert_eq!(RiskLevel::from_probability(0.45), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(0.46), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_probability(0.85), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_probability(0.86), RiskLevel::High);
    }

    #[test]
    fn narrative_request_excludes_sensitive_fields() {
        let mut tx = transaction();
        tx.cardholder_name = Some("Jordan Avery".to_string());
        tx.device_fingerprint = Some("fp-88a1".to_string());
        tx.ip_address = Some("203.0.113.9".to_string());

        let analysis = FraudAnalysis {
            transaction_id: tx.transaction_id.clone(),
            classification: Classification::Suspicious,
            risk_score: 0.52,
            risk_factors: vec![factor("High-risk merchant category: gambling", 0.25)],
            explanation: "stub".to_string(),
        };

        let request = ExplanationRequest::from_analysis(&tx, &analysis);
        let serialized = serde_json::to_string(&request).unwrap();
        assert!(!serialized.contains("Jordan Avery"));
        assert!(!serialized.contains("fp-88a1"));
        assert!(!serialized.contains("203.0.113.9"));
        assert_eq!(request.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn risk_level_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&RiskLevel::High).unwrap(),
            "\"HIGH\""
        );
    }
}
