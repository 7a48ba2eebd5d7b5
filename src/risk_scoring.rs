//! Deterministic risk scoring against a fixed, auditable rule table.
//!
//! Every rule is an independent predicate with a fixed weight. Rules that
//! fire contribute their weight to the transaction's risk score and emit a
//! [`RiskFactor`] describing what matched, so a reviewer can reconstruct any
//! score from its factors alone.

use chrono::{DateTime, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::Transaction;

/// Amount above which the high-amount rule fires.
const HIGH_AMOUNT_THRESHOLD: f64 = 5000.0;
/// Amount above which the moderate-amount rule fires (up to the high threshold).
const MODERATE_AMOUNT_THRESHOLD: f64 = 1000.0;
/// Local hour range, start inclusive and end exclusive, treated as late night.
const LATE_NIGHT_START_HOUR: u32 = 2;
const LATE_NIGHT_END_HOUR: u32 = 5;

const HIGH_AMOUNT_WEIGHT: f64 = 0.30;
const MODERATE_AMOUNT_WEIGHT: f64 = 0.15;
const LATE_NIGHT_WEIGHT: f64 = 0.20;
const HIGH_RISK_CATEGORY_WEIGHT: f64 = 0.25;
const INTERNATIONAL_LOCATION_WEIGHT: f64 = 0.20;
const SUSPICIOUS_MERCHANT_WEIGHT: f64 = 0.15;

/// Merchant categories that carry elevated fraud exposure.
const HIGH_RISK_CATEGORIES: [&str; 3] = ["gambling", "crypto", "wire_transfer"];

/// Location substrings that mark a transaction as cross-border.
const INTERNATIONAL_KEYWORDS: [&str; 4] = ["international", "overseas", "abroad", "foreign"];

/// Merchant-name substrings associated with fraud-prone business types.
const SUSPICIOUS_MERCHANT_KEYWORDS: [&str; 6] =
    ["casino", "lottery", "pawn", "bitcoin", "forex", "offshore"];

/// Classification thresholds applied to the quantized score.
const FRAUDULENT_THRESHOLD: f64 = 0.75;
const SUSPICIOUS_THRESHOLD: f64 = 0.45;

/// Final disposition of a scored transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Quantized score below the suspicious threshold.
    Legitimate,
    /// Quantized score in the suspicious band.
    Suspicious,
    /// Quantized score at or above the fraudulent threshold.
    Fraudulent,
    /// Scoring itself failed; never produced by thresholds.
    Unknown,
}

impl Classification {
    /// Map a clamped, quantized score onto its classification band.
    pub fn from_score(score: f64) -> Self {
        if score >= FRAUDULENT_THRESHOLD {
            Classification::Fraudulent
        } else if score >= SUSPICIOUS_THRESHOLD {
            Classification::Suspicious
        } else {
            Classification::Legitimate
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Legitimate => write!(f, "legitimate"),
            Classification::Suspicious => write!(f, "suspicious"),
            Classification::Fraudulent => write!(f, "fraudulent"),
            Classification::Unknown => write!(f, "unknown"),
        }
    }
}

/// One fired rule: what matched and how much it contributed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub description: String,
    pub weight: f64,
}

/// Outcome of scoring a single transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    /// Sum of fired weights, clamped to [0.0, 1.0] and quantized to
    /// three fractional digits.
    pub score: f64,
    pub classification: Classification,
    /// Every rule that fired, in rule-table order.
    pub factors: Vec<RiskFactor>,
}

/// Errors that prevent a transaction from being scored at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error("unrecognized timestamp format")]
    InvalidTimestamp,
}

/// Scores transactions against the rule table.
///
/// The scorer is pure: the same transaction always produces the same
/// assessment, byte for byte.
#[derive(Debug, Clone, Default)]
pub struct RiskScorer;

impl RiskScorer {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate every rule against the transaction and combine the fired
    /// weights into a classified assessment.
    pub fn score(&self, transaction: &Transaction) -> Result<RiskAssessment, ScoreError> {
        let hour = transaction_hour(&transaction.timestamp)?;

        let mut factors = Vec::new();
        if let Some(factor) = self.check_amount(transaction.amount) {
            factors.push(factor);
        }
        if let Some(factor) = self.check_late_night(hour) {
            factors.push(factor);
        }
        if let Some(factor) = self.check_category(&transaction.merchant_category) {
            factors.push(factor);
        }
        if let Some(factor) = self.check_location(&transaction.location) {
            factors.push(factor);
        }
        if let Some(factor) = self.check_merchant_name(&transaction.merchant_name) {
            factors.push(factor);
        }

        let raw: f64 = factors.iter().map(|factor| factor.weight).sum();
        let score = quantize_score(raw.clamp(0.0, 1.0));

        Ok(RiskAssessment {
            score,
            classification: Classification::from_score(score),
            factors,
        })
    }

    /// Amount rules are mutually exclusive bands, so at most one fires.
    fn check_amount(&self, amount: f64) -> Option<RiskFactor> {
        if amount > HIGH_AMOUNT_THRESHOLD {
            Some(RiskFactor {
                description: format!("High transaction amount: ${:.2}", amount),
                weight: HIGH_AMOUNT_WEIGHT,
            })
        } else if amount > MODERATE_AMOUNT_THRESHOLD {
            Some(RiskFactor {
                description: format!("Moderately high transaction amount: ${:.2}", amount),
                weight: MODERATE_AMOUNT_WEIGHT,
            })
        } else {
            None
        }
    }

    fn check_late_night(&self, hour: u32) -> Option<RiskFactor> {
        if (LATE_NIGHT_START_HOUR..LATE_NIGHT_END_HOUR).contains(&hour) {
            Some(RiskFactor {
                description: format!("Late-night transaction time: {:02}:00 hour", hour),
                weight: LATE_NIGHT_WEIGHT,
            })
        } else {
            None
        }
    }

    fn check_category(&self, category: &str) -> Option<RiskFactor> {
        let normalized = category.trim().to_lowercase();
        if HIGH_RISK_CATEGORIES.contains(&normalized.as_str()) {
            Some(RiskFactor {
                description: format!("High-risk merchant category: {}", category.trim()),
                weight: HIGH_RISK_CATEGORY_WEIGHT,
            })
        } else {
            None
        }
    }

    fn check_location(&self, location: &str) -> Option<RiskFactor> {
        let lowered = location.to_lowercase();
        if INTERNATIONAL_KEYWORDS
            .iter()
            .any(|keyword| lowered.contains(keyword))
        {
            Some(RiskFactor {
                description: format!("International transaction location: {}", location.trim()),
                weight: INTERNATIONAL_LOCATION_WEIGHT,
            })
        } else {
            None
        }
    }

    fn check_merchant_name(&self, merchant_name: &str) -> Option<RiskFactor> {
        let lowered = merchant_name.to_lowercase();
        SUSPICIOUS_MERCHANT_KEYWORDS
            .iter()
            .find(|keyword| lowered.contains(*keyword))
            .map(|keyword| RiskFactor {
                description: format!("Merchant name matches suspicious pattern: {}", keyword),
                weight: SUSPICIOUS_MERCHANT_WEIGHT,
            })
    }
}

/// Round to exactly three fractional digits, half away from zero.
pub(crate) fn quantize_score(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}

/// Parse the transaction timestamp and return its hour of day.
///
/// Accepts RFC 3339 (the hour is read in the timestamp's own UTC offset)
/// and falls back to a naive `YYYY-MM-DDTHH:MM:SS` form with optional
/// fractional seconds.
fn transaction_hour(timestamp: &str) -> Result<u32, ScoreError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) {
        return Ok(parsed.hour());
    }
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|parsed| parsed.hour())
        .map_err(|_| ScoreError::InvalidTimestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_transaction() -> Transaction {
        Transaction {
            transaction_id: "TXN-0001".to_string(),
            timestamp: "2024-03-15T14:30:00Z".to_string(),
            amount: 42.50,
            merchant_name: "Corner Grocery".to_string(),
            merchant_category: "grocery".to_string(),
            card_last4: "4242".to_string(),
            cardholder_name: None,
            location: "Austin, TX".to_string(),
            device_fingerprint: None,
            ip_address: None,
        }
    }

    #[test]
    fn clean_transaction_scores_zero() {
        let scorer = RiskScorer::new();
        let assessment = scorer.score(&base_transaction()).unwrap();

        assert_eq!(assessment.score, 0.0);
        assert_eq!(assessment.classification, Classification::Legitimate);
        assert!(assessment.factors.is_empty());
    }

    #[test]
    fn high_amount_fires_above_5000() {
        let scorer = RiskScorer::new();
        let mut transaction = base_transaction();
        transaction.amount = 5000.01;

        let assessment = scorer.score(&transaction).unwrap();
        assert_eq!(assessment.score, 0.30);
        assert_eq!(assessment.factors.len(), 1);
        assert!(assessment.factors[0].description.contains("High transaction amount"));
    }

    #[test]
    fn amount_of_exactly_5000_is_moderate_not_high() {
        let scorer = RiskScorer::new();
        let mut transaction = base_transaction();
        transaction.amount = 5000.0;

        let assessment = scorer.score(&transaction).unwrap();
        assert_eq!(assessment.score, 0.15);
        assert!(assessment.factors[0]
            .description
            .contains("Moderately high transaction amount"));
    }

    #[test]
    fn amount_of_exactly_1000_fires_nothing() {
        let scorer = RiskScorer::new();
        let mut transaction = base_transaction();
        transaction.amount = 1000.0;

        let assessment = scorer.score(&transaction).unwrap();
        assert!(assessment.factors.is_empty());
    }

    #[test]
    fn late_night_window_is_start_inclusive_end_exclusive() {
        let scorer = RiskScorer::new();

        let mut at_two = base_transaction();
        at_two.timestamp = "2024-03-15T02:00:00Z".to_string();
        assert_eq!(scorer.score(&at_two).unwrap().score, 0.20);

        let mut at_five = base_transaction();
        at_five.timestamp = "2024-03-15T05:00:00Z".to_string();
        assert_eq!(scorer.score(&at_five).unwrap().score, 0.0);
    }

    #[test]
    fn hour_is_read_in_the_timestamp_own_offset() {
        let scorer = RiskScorer::new();
        let mut transaction = base_transaction();
        // 03:30 local, 22:30 UTC. The local wall clock decides.
        transaction.timestamp = "2024-03-15T03:30:00+05:00".to_string();

        let assessment = scorer.score(&transaction).unwrap();
        assert_eq!(assessment.score, 0.20);
    }

    #[test]
    fn category_match_is_case_insensitive_and_trimmed() {
        let scorer = RiskScorer::new();
        let mut transaction = base_transaction();
        transaction.merchant_category = "  Wire_Transfer ".to_string();

        let assessment = scorer.score(&transaction).unwrap();
        assert_eq!(assessment.score, 0.25);
        assert!(assessment.factors[0]
            .description
            .contains("High-risk merchant category"));
    }

    #[test]
    fn category_must_match_whole_value_not_substring() {
        let scorer = RiskScorer::new();
        let mut transaction = base_transaction();
        transaction.merchant_category = "cryptozoology".to_string();

        let assessment = scorer.score(&transaction).unwrap();
        assert!(assessment.factors.is_empty());
    }

    #[test]
    fn international_location_matches_on_substring() {
        let scorer = RiskScorer::new();
        let mut transaction = base_transaction();
        transaction.location = "Lisbon (Overseas)".to_string();

        let assessment = scorer.score(&transaction).unwrap();
        assert_eq!(assessment.score, 0.20);
    }

    #[test]
    fn suspicious_merchant_keyword_matches_anywhere_in_name() {
        let scorer = RiskScorer::new();
        let mut transaction = base_transaction();
        transaction.merchant_name = "Golden CASINO Lounge".to_string();

        let assessment = scorer.score(&transaction).unwrap();
        assert_eq!(assessment.score, 0.15);
        assert!(assessment.factors[0].description.contains("casino"));
    }

    #[test]
    fn boundary_sum_of_exactly_045_classifies_suspicious() {
        let scorer = RiskScorer::new();
        let mut transaction = base_transaction();
        transaction.merchant_category = "gambling".to_string();
        transaction.timestamp = "2024-03-15T03:15:00Z".to_string();

        let assessment = scorer.score(&transaction).unwrap();
        assert_eq!(assessment.score, 0.45);
        assert_eq!(assessment.classification, Classification::Suspicious);
        assert_eq!(assessment.factors.len(), 2);
    }

    #[test]
    fn boundary_sum_of_exactly_075_classifies_fraudulent() {
        let scorer = RiskScorer::new();
        let mut transaction = base_transaction();
        transaction.amount = 6000.0;
        transaction.merchant_category = "crypto".to_string();
        transaction.timestamp = "2024-03-15T03:00:00Z".to_string();

        let assessment = scorer.score(&transaction).unwrap();
        assert_eq!(assessment.score, 0.75);
        assert_eq!(assessment.classification, Classification::Fraudulent);
        assert_eq!(assessment.factors.len(), 3);
    }

    #[test]
    fn score_clamps_at_one_when_every_rule_fires() {
        let scorer = RiskScorer::new();
        let transaction = Transaction {
            amount: 9000.0,
            timestamp: "2024-03-15T03:00:00Z".to_string(),
            merchant_category: "crypto".to_string(),
            merchant_name: "Offshore Casino Express".to_string(),
            location: "International Terminal, Dubai".to_string(),
            ..base_transaction()
        };

        let assessment = scorer.score(&transaction).unwrap();
        assert_eq!(assessment.score, 1.0);
        assert_eq!(assessment.classification, Classification::Fraudulent);
        assert_eq!(assessment.factors.len(), 5);
        // Recorded factors keep their full weights even when the sum clamps.
        let total: f64 = assessment.factors.iter().map(|f| f.weight).sum();
        assert!(total > 1.0);
    }

    #[test]
    fn factors_follow_rule_table_order() {
        let scorer = RiskScorer::new();
        let transaction = Transaction {
            amount: 6000.0,
            timestamp: "2024-03-15T02:30:00Z".to_string(),
            merchant_category: "gambling".to_string(),
            ..base_transaction()
        };

        let descriptions: Vec<String> = scorer
            .score(&transaction)
            .unwrap()
            .factors
            .into_iter()
            .map(|factor| factor.description)
            .collect();
        assert!(descriptions[0].contains("amount"));
        assert!(descriptions[1].contains("Late-night"));
        assert!(descriptions[2].contains("category"));
    }

    #[test]
    fn naive_timestamp_without_offset_is_accepted() {
        let scorer = RiskScorer::new();
        let mut transaction = base_transaction();
        transaction.timestamp = "2024-03-15T04:59:59".to_string();

        let assessment = scorer.score(&transaction).unwrap();
        assert_eq!(assessment.score, 0.20);
    }

    #[test]
    fn unparseable_timestamp_is_a_score_error() {
        let scorer = RiskScorer::new();
        let mut transaction = base_transaction();
        transaction.timestamp = "yesterday at noon".to_string();

        assert_eq!(
            scorer.score(&transaction),
            Err(ScoreError::InvalidTimestamp)
        );
    }

    #[test]
    fn scoring_is_deterministic() {
        let scorer = RiskScorer::new();
        let transaction = Transaction {
            amount: 2500.0,
            merchant_name: "Forex Direct".to_string(),
            location: "Foreign Exchange Desk".to_string(),
            ..base_transaction()
        };

        let first = scorer.score(&transaction).unwrap();
        let second = scorer.score(&transaction).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn quantize_rounds_half_away_from_zero() {
        assert_eq!(quantize_score(0.4505), 0.451);
        assert_eq!(quantize_score(0.4504), 0.450);
        assert_eq!(quantize_score(0.0005), 0.001);
    }

    #[test]
    fn classification_from_score_uses_inclusive_lower_bounds() {
        assert_eq!(Classification::from_score(0.449), Classification::Legitimate);
        assert_eq!(Classification::from_score(0.45), Classification::Suspicious);
        assert_eq!(Classification::from_score(0.749), Classification::Suspicious);
        assert_eq!(Classification::from_score(0.75), Classification::Fraudulent);
        assert_eq!(Classification::from_score(1.0), Classification::Fraudulent);
    }

    #[test]
    fn hour_parsing_accepts_fractional_seconds() {
        assert_eq!(transaction_hour("2024-03-15T02:00:00.123"), Ok(2));
        assert_eq!(transaction_hour("2024-03-15T14:30:00-07:00"), Ok(14));
        assert_eq!(
            transaction_hour("03/15/2024 2:00 AM"),
            Err(ScoreError::InvalidTimestamp)
        );
    }
}
