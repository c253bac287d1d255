//! Pluggable plausibility review.
//!
//! A reviewer looks at a finished analysis plus its validation report and
//! renders a judgment on whether the numbers are believable in context. The
//! engine treats reviewers as best-effort advisors: a slow, failing, or
//! absent reviewer degrades the review, never the analysis itself.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::result::AnalysisResult;
use crate::validator::{Severity, ValidationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The numbers are believable in context.
    Validated,
    /// Usable, but the noted findings deserve a second look.
    Caution,
    /// The result should not be acted on as-is.
    Concern,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub verdict: Verdict,
    /// Reviewer self-assessed confidence, 0-100.
    pub confidence: u8,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<String>,
}

/// The outcome the engine reports: either the reviewer finished, or the
/// pipeline continued without it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReviewOutcome {
    Completed(Review),
    /// The analysis stands on the validation report alone.
    Degraded { reason: String },
}

impl ReviewOutcome {
    pub fn review(&self) -> Option<&Review> {
        match self {
            Self::Completed(review) => Some(review),
            Self::Degraded { .. } => None,
        }
    }
}

/// A plausibility reviewer. Implementations may consult anything they like
/// (heuristics, a model, a remote service) but must be safe to call from a
/// worker thread.
pub trait PlausibilityReviewer: Send + Sync {
    fn review(
        &self,
        result: &AnalysisResult,
        report: &ValidationReport,
    ) -> Result<Review, String>;
}

/// Runs the reviewer with a hard deadline. The reviewer gets owned copies of
/// the envelope and report; if it overruns the deadline the worker thread is
/// abandoned and the outcome degrades.
pub fn review_with_timeout<R>(
    reviewer: &R,
    result: &AnalysisResult,
    report: &ValidationReport,
    timeout: Duration,
) -> ReviewOutcome
where
    R: PlausibilityReviewer + Clone + 'static,
{
    let (tx, rx) = mpsc::channel();
    let reviewer = reviewer.clone();
    let result = result.clone();
    let report = report.clone();
    thread::spawn(move || {
        let outcome = reviewer.review(&result, &report);
        // The receiver may be gone if we overran the deadline.
        let _ = tx.send(outcome);
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(review)) => ReviewOutcome::Completed(review),
        Ok(Err(reason)) => ReviewOutcome::Degraded {
            reason: format!("reviewer error: {reason}"),
        },
        Err(mpsc::RecvTimeoutError::Timeout) => ReviewOutcome::Degraded {
            reason: format!("reviewer exceeded {} ms", timeout.as_millis()),
        },
        Err(mpsc::RecvTimeoutError::Disconnected) => ReviewOutcome::Degraded {
            reason: "reviewer thread exited without a verdict".into(),
        },
    }
}

/// Built-in heuristic reviewer: folds the validation report into a verdict
/// without external knowledge. Serves as the default when no richer reviewer
/// is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicReviewer;

impl PlausibilityReviewer for HeuristicReviewer {
    fn review(
        &self,
        result: &AnalysisResult,
        report: &ValidationReport,
    ) -> Result<Review, String> {
        let mut findings: Vec<String> = report
            .findings
            .iter()
            .filter(|f| f.severity != Severity::Info)
            .map(|f| f.message.clone())
            .collect();
        findings.extend(result.warnings.iter().cloned());

        let verdict = if !report.passed {
            Verdict::Concern
        } else if !findings.is_empty() {
            Verdict::Caution
        } else {
            Verdict::Validated
        };
        let (confidence, summary) = match verdict {
            Verdict::Validated => (
                90,
                format!("'{}' completed with no findings or warnings", result.test_id),
            ),
            Verdict::Caution => (
                60,
                format!(
                    "'{}' completed but raised {} finding(s)",
                    result.test_id,
                    findings.len()
                ),
            ),
            Verdict::Concern => (
                25,
                format!("validation of '{}' raised blocking findings", result.test_id),
            ),
        };
        Ok(Review {
            verdict,
            confidence,
            summary,
            findings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{RawTestOutput, TestCategory};
    use crate::validator::{Confidence, ValidationReport};

    fn envelope() -> AnalysisResult {
        AnalysisResult::succeeded(
            "one_sample_t",
            TestCategory::Comparison,
            RawTestOutput::default(),
            1,
            0,
        )
    }

    fn clean_report() -> ValidationReport {
        ValidationReport {
            passed: true,
            confidence: Confidence::High,
            findings: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    #[derive(Clone)]
    struct SlowReviewer;

    impl PlausibilityReviewer for SlowReviewer {
        fn review(
            &self,
            _: &AnalysisResult,
            _: &ValidationReport,
        ) -> Result<Review, String> {
            std::thread::sleep(Duration::from_millis(200));
            Ok(Review {
                verdict: Verdict::Validated,
                confidence: 90,
                summary: "eventually".into(),
                findings: Vec::new(),
            })
        }
    }

    #[derive(Clone)]
    struct FailingReviewer;

    impl PlausibilityReviewer for FailingReviewer {
        fn review(
            &self,
            _: &AnalysisResult,
            _: &ValidationReport,
        ) -> Result<Review, String> {
            Err("backend unreachable".into())
        }
    }

    #[test]
    fn heuristic_reviewer_trusts_a_clean_run() {
        let outcome = review_with_timeout(
            &HeuristicReviewer,
            &envelope(),
            &clean_report(),
            Duration::from_secs(1),
        );
        let review = outcome.review().unwrap();
        assert_eq!(review.verdict, Verdict::Validated);
        assert!(review.confidence >= 50);
    }

    #[test]
    fn slow_reviewer_degrades_instead_of_blocking() {
        let outcome = review_with_timeout(
            &SlowReviewer,
            &envelope(),
            &clean_report(),
            Duration::from_millis(20),
        );
        match outcome {
            ReviewOutcome::Degraded { reason } => assert!(reason.contains("exceeded")),
            ReviewOutcome::Completed(_) => panic!("expected degradation"),
        }
    }

    #[test]
    fn reviewer_errors_degrade_with_the_cause() {
        let outcome = review_with_timeout(
            &FailingReviewer,
            &envelope(),
            &clean_report(),
            Duration::from_secs(1),
        );
        match outcome {
            ReviewOutcome::Degraded { reason } => {
                assert!(reason.contains("backend unreachable"));
            }
            ReviewOutcome::Completed(_) => panic!("expected degradation"),
        }
    }

    #[test]
    fn failed_validation_reads_as_concern() {
        let report = ValidationReport {
            passed: false,
            confidence: Confidence::Low,
            findings: Vec::new(),
            recommendations: Vec::new(),
        };
        let review = HeuristicReviewer.review(&envelope(), &report).unwrap();
        assert_eq!(review.verdict, Verdict::Concern);
    }
}
