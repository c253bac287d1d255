//! End-to-end pipeline coverage: dispatch, validation, and review working
//! together over realistic datasets.

mod common;

use std::time::Duration;

use serde_json::json;

use sigmastat::catalog::catalog;
use sigmastat::dataset::Dataset;
use sigmastat::dispatch::Dispatcher;
use sigmastat::errors::EngineError;
use sigmastat::review::{
    review_with_timeout, HeuristicReviewer, PlausibilityReviewer, Review, ReviewOutcome,
    Verdict,
};
use sigmastat::validator::{validate, Confidence, ValidationLimits, ValidationReport};
use sigmastat::AnalysisResult;

#[test]
fn separated_arms_are_detected_as_different() {
    let ds = common::separated_arms();
    let dispatcher = Dispatcher::new().unwrap();
    let request = common::request(
        "p1",
        "two_sample_t",
        json!({"value_column": "yield", "group_column": "arm"}),
        &ds,
    );
    let result = dispatcher.execute(&request).unwrap();
    assert!(result.success);
    let p = result.summary_number("p_value").unwrap();
    assert!(p < 0.001, "p = {p}");
    assert_eq!(result.summary.get("significant"), Some(&json!(true)));

    let def = catalog().unwrap().get("two_sample_t").unwrap();
    let report = validate(
        &result,
        &ds,
        &request.config,
        def,
        &ValidationLimits::default(),
    );
    assert!(report.passed);
}

#[test]
fn runner_failure_flows_through_validation_as_blocking() {
    let records: Vec<serde_json::Value> =
        (0..20).map(|_| json!({"measure": 50.0})).collect();
    let flat = Dataset::from_records(&records).unwrap();
    let dispatcher = Dispatcher::new().unwrap();
    let request = common::request(
        "p2",
        "i_mr_chart",
        json!({"value_column": "measure"}),
        &flat,
    );
    let result = dispatcher.execute(&request).unwrap();
    assert!(!result.success);

    let def = catalog().unwrap().get("i_mr_chart").unwrap();
    let report = validate(
        &result,
        &flat,
        &request.config,
        def,
        &ValidationLimits::default(),
    );
    assert!(!report.passed);
    assert_eq!(report.confidence, Confidence::Low);

    // The heuristic reviewer agrees the result is not to be trusted.
    let outcome = review_with_timeout(
        &HeuristicReviewer,
        &result,
        &report,
        Duration::from_secs(1),
    );
    let review = outcome.review().unwrap();
    assert_eq!(review.verdict, Verdict::Concern);
}

#[test]
fn design_generation_is_reproducible_through_the_dispatcher() {
    let ds = common::factor_table();
    let dispatcher = Dispatcher::new().unwrap();
    let cfg = json!({
        "factor_column": "factor",
        "low_column": "low",
        "high_column": "high",
        "seed": 11,
    });
    let first = dispatcher
        .execute(&common::request("p3a", "full_factorial", cfg.clone(), &ds))
        .unwrap();
    let second = dispatcher
        .execute(&common::request("p3b", "full_factorial", cfg, &ds))
        .unwrap();
    assert!(first.success);
    assert_eq!(first.details.get("runs"), second.details.get("runs"));
    assert_eq!(first.summary.get("run_count"), Some(&json!(8)));
}

#[test]
fn request_ids_cannot_be_reused_across_tests() {
    let ds = common::stable_series(25);
    let dispatcher = Dispatcher::new().unwrap();
    dispatcher
        .execute(&common::request(
            "p4",
            "descriptive_summary",
            json!({"columns": ["measure"]}),
            &ds,
        ))
        .unwrap();
    let err = dispatcher
        .execute(&common::request(
            "p4",
            "normality_test",
            json!({"column": "measure"}),
            &ds,
        ))
        .unwrap_err();
    assert!(matches!(err, EngineError::RequestInFlight { .. }));
}

#[derive(Clone)]
struct StallingReviewer;

impl PlausibilityReviewer for StallingReviewer {
    fn review(
        &self,
        _: &AnalysisResult,
        _: &ValidationReport,
    ) -> Result<Review, String> {
        std::thread::sleep(Duration::from_millis(300));
        Err("should never be seen".into())
    }
}

#[test]
fn a_stalled_reviewer_never_blocks_the_pipeline() {
    let ds = common::stable_series(25);
    let dispatcher = Dispatcher::new().unwrap();
    let request = common::request(
        "p5",
        "one_sample_t",
        json!({"column": "measure", "mu": 50.0}),
        &ds,
    );
    let result = dispatcher.execute(&request).unwrap();
    let def = catalog().unwrap().get("one_sample_t").unwrap();
    let report = validate(
        &result,
        &ds,
        &request.config,
        def,
        &ValidationLimits::default(),
    );

    let outcome = review_with_timeout(
        &StallingReviewer,
        &result,
        &report,
        Duration::from_millis(30),
    );
    match outcome {
        ReviewOutcome::Degraded { reason } => assert!(reason.contains("exceeded")),
        ReviewOutcome::Completed(_) => panic!("expected degradation"),
    }
    // The analysis itself stands regardless of the reviewer.
    assert!(result.success);
}

#[test]
fn spc_and_capability_agree_on_a_stable_process() {
    let ds = common::stable_series(40);
    let dispatcher = Dispatcher::new().unwrap();

    let chart = dispatcher
        .execute(&common::request(
            "p6a",
            "i_mr_chart",
            json!({"value_column": "measure"}),
            &ds,
        ))
        .unwrap();
    assert_eq!(chart.summary.get("in_control"), Some(&json!(true)));

    let capability = dispatcher
        .execute(&common::request(
            "p6b",
            "capability_normal",
            json!({"value_column": "measure", "lsl": 45.0, "usl": 55.0}),
            &ds,
        ))
        .unwrap();
    let cpk = capability.summary_number("cpk").unwrap();
    assert!(cpk > 1.33, "cpk = {cpk}");
}
