//! Shared fixtures for the integration suite.

use serde_json::json;

use sigmastat::config::TestConfig;
use sigmastat::dataset::Dataset;
use sigmastat::dispatch::ExecutionRequest;

pub fn config(value: serde_json::Value) -> TestConfig {
    TestConfig::from_value(value).expect("fixture config must be an object")
}

pub fn request(
    request_id: &str,
    test_id: &str,
    cfg: serde_json::Value,
    dataset: &Dataset,
) -> ExecutionRequest {
    ExecutionRequest::new(request_id, test_id, config(cfg), dataset.clone())
}

/// Two clearly separated treatment arms, 12 observations each.
pub fn separated_arms() -> Dataset {
    let mut records = Vec::new();
    for i in 0..12 {
        let jitter = ((i % 5) as f64 - 2.0) * 0.15;
        records.push(json!({"yield": 10.0 + jitter, "arm": "control"}));
        records.push(json!({"yield": 12.0 + jitter, "arm": "treatment"}));
    }
    Dataset::from_records(&records).expect("fixture dataset")
}

/// A stable measurement series with mild noise.
pub fn stable_series(n: usize) -> Dataset {
    let records: Vec<serde_json::Value> = (0..n)
        .map(|i| json!({"measure": 50.0 + ((i % 7) as f64 - 3.0) * 0.2}))
        .collect();
    Dataset::from_records(&records).expect("fixture dataset")
}

/// A three-factor screening table for design generation.
pub fn factor_table() -> Dataset {
    let records = vec![
        json!({"factor": "temperature", "low": 150.0, "high": 180.0}),
        json!({"factor": "pressure", "low": 1.0, "high": 2.0}),
        json!({"factor": "time", "low": 30.0, "high": 45.0}),
    ];
    Dataset::from_records(&records).expect("fixture dataset")
}
