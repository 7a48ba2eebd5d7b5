//! Batch-level aggregation of per-transaction analyses.

use serde::{Deserialize, Serialize};

use crate::citations::Citation;
use crate::risk_scoring::{quantize_score, Classification};
use crate::FraudAnalysis;

/// A completed batch analysis.
///
/// `analyses` preserves the input order of the batch. The counts partition
/// `total_transactions` exactly, with unscorable transactions landing in
/// `unknown_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAnalysisResult {
    pub summary: String,
    pub total_transactions: usize,
    pub fraudulent_count: usize,
    pub suspicious_count: usize,
    pub legitimate_count: usize,
    pub unknown_count: usize,
    /// Mean of the per-transaction risk scores, quantized to three
    /// fractional digits.
    pub average_risk_score: f64,
    pub analyses: Vec<FraudAnalysis>,
    pub citations: Vec<Citation>,
    pub warnings: Vec<String>,
}

/// Folds per-transaction analyses into the batch result.
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Combine analyses, surviving citations, and accumulated warnings into
    /// the final result. `analyses` is taken as produced, in input order.
    pub fn aggregate(
        &self,
        analyses: Vec<FraudAnalysis>,
        citations: Vec<Citation>,
        warnings: Vec<String>,
    ) -> BatchAnalysisResult {
        let total = analyses.len();
        let fraudulent = self.count(&analyses, Classification::Fraudulent);
        let suspicious = self.count(&analyses, Classification::Suspicious);
        let legitimate = self.count(&analyses, Classification::Legitimate);
        let unknown = self.count(&analyses, Classification::Unknown);

        let average = if total == 0 {
            0.0
        } else {
            let sum: f64 = analyses.iter().map(|analysis| analysis.risk_score).sum();
            quantize_score(sum / total as f64)
        };

        let summary =
            self.summary_text(total, fraudulent, suspicious, legitimate, unknown, average);

        BatchAnalysisResult {
            summary,
            total_transactions: total,
            fraudulent_count: fraudulent,
            suspicious_count: suspicious,
            legitimate_count: legitimate,
            unknown_count: unknown,
            average_risk_score: average,
            analyses,
            citations,
            warnings,
        }
    }

    /// Methodology references attached to every completed batch. These are
    /// filtered through the citation allow-list like any other citation.
    pub fn default_citations(&self) -> Vec<Citation> {
        vec![
            Citation {
                source: "FinCEN Advisory on Payment Card Fraud Typologies".to_string(),
                url: Some("https://www.fincen.gov/resources/advisories".to_string()),
            },
            Citation {
                source: "FFIEC BSA/AML Examination Manual".to_string(),
                url: Some("https://bsaaml.ffiec.gov/manual".to_string()),
            },
            Citation {
                source: "CFPB Consumer Credit Card Market Report".to_string(),
                url: Some(
                    "https://www.consumerfinance.gov/data-research/research-reports/".to_string(),
                ),
            },
        ]
    }

    fn count(&self, analyses: &[FraudAnalysis], classification: Classification) -> usize {
        analyses
            .iter()
            .filter(|analysis| analysis.classification == classification)
            .count()
    }

    fn summary_text(
        &self,
        total: usize,
        fraudulent: usize,
        suspicious: usize,
        legitimate: usize,
        unknown: usize,
        average: f64,
    ) -> String {
        let mut summary = format!(
            "Analyzed {} transactions: {} fraudulent, {} suspicious, {} legitimate.",
            total, fraudulent, suspicious, legitimate
        );
        if unknown > 0 {
            summary.push_str(&format!(" {} could not be evaluated.", unknown));
        }
        summary.push_str(&format!(" Average risk score: {:.1}%.", average * 100.0));
        if fraudulent > 0 {
            summary.push_str(" Immediate action required for fraudulent transactions.");
        } else if suspicious > 0 {
            summary.push_str(" Review recommended for suspicious transactions.");
        } else {
            summary.push_str(" All transactions appear legitimate.");
        }
        summary
    }
}
