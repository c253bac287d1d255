//! Request dispatch: routes an analysis request to its registered runner
//! and folds the outcome into a standardized result envelope.
//!
//! Caller mistakes (unknown test, bad configuration, inadequate data) are
//! returned as synchronous errors before any computation starts. Failures
//! inside a runner are not errors to the caller; they come back as a failed
//! `AnalysisResult` so a batch of requests can always be collected.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::catalog::{catalog, Catalog, TestDefinition};
use crate::config::TestConfig;
use crate::dataset::Dataset;
use crate::errors::{EngineError, ErrorCategory};
use crate::result::AnalysisResult;
use crate::runners::{build_default_runner_registry, Cancellation, RunnerRegistry};

// ============================================================================
// REQUEST
// ============================================================================

/// One unit of work: which test to run, on what data, with what settings.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Caller-chosen identifier; each id may be executed at most once.
    pub request_id: String,
    pub test_id: String,
    pub config: TestConfig,
    pub dataset: Dataset,
}

impl ExecutionRequest {
    pub fn new(
        request_id: impl Into<String>,
        test_id: impl Into<String>,
        config: TestConfig,
        dataset: Dataset,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            test_id: test_id.into(),
            config,
            dataset,
        }
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

pub struct Dispatcher {
    registry: RunnerRegistry,
    // Request ids stay claimed forever; a replayed id is rejected even after
    // its original execution finished.
    claims: Mutex<HashSet<String>>,
}

impl Dispatcher {
    /// Builds a dispatcher over the default runner registry, verifying that
    /// the registry and the test catalog cover exactly the same test ids.
    pub fn new() -> Result<Self, EngineError> {
        Self::with_registry(build_default_runner_registry())
    }

    pub fn with_registry(registry: RunnerRegistry) -> Result<Self, EngineError> {
        let catalog = catalog()?;
        for id in catalog.list() {
            if !registry.has(id) {
                return Err(EngineError::Catalog {
                    message: format!("test '{id}' is cataloged but has no runner"),
                });
            }
        }
        for id in registry.list() {
            if catalog.get(id).is_none() {
                return Err(EngineError::Catalog {
                    message: format!("runner '{id}' is registered but not cataloged"),
                });
            }
        }
        Ok(Self {
            registry,
            claims: Mutex::new(HashSet::new()),
        })
    }

    pub fn catalog(&self) -> Result<&'static Catalog, EngineError> {
        catalog()
    }

    /// Executes a request to completion.
    ///
    /// Returns `Err` only for caller-side problems; any failure during the
    /// computation itself is reported inside the returned envelope.
    pub fn execute(&self, request: &ExecutionRequest) -> Result<AnalysisResult, EngineError> {
        self.execute_with_cancellation(request, &Cancellation::new())
    }

    pub fn execute_with_cancellation(
        &self,
        request: &ExecutionRequest,
        cancel: &Cancellation,
    ) -> Result<AnalysisResult, EngineError> {
        self.claim(&request.request_id)?;

        let definition = self.resolve(&request.test_id)?;
        definition.validate_config(&request.config, &request.dataset)?;
        definition.check_adequacy(&request.config, &request.dataset)?;

        let runner = self.registry.get(&request.test_id).ok_or_else(|| {
            EngineError::UnknownTest {
                test_id: request.test_id.clone(),
                available: self.registry.list().iter().map(|s| s.to_string()).collect(),
            }
        })?;

        let started = Instant::now();
        let outcome = runner(&request.dataset, &request.config, cancel);
        let duration_ms = started.elapsed().as_millis() as u64;
        let timestamp_ms = unix_millis();

        let result = match outcome {
            Ok(output) => AnalysisResult::succeeded(
                &request.test_id,
                definition.category,
                output,
                duration_ms,
                timestamp_ms,
            ),
            // A cancelled request surfaces to the caller; everything else
            // becomes a failed envelope.
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            Err(err) if err.category() == ErrorCategory::Caller => return Err(err),
            Err(err) => AnalysisResult::failed(
                &request.test_id,
                definition.category,
                err.to_string(),
                duration_ms,
                timestamp_ms,
            ),
        };
        Ok(result)
    }

    fn resolve(&self, test_id: &str) -> Result<&'static TestDefinition, EngineError> {
        let catalog = catalog()?;
        catalog.get(test_id).ok_or_else(|| EngineError::UnknownTest {
            test_id: test_id.to_string(),
            available: catalog.list().iter().map(|s| s.to_string()).collect(),
        })
    }

    fn claim(&self, request_id: &str) -> Result<(), EngineError> {
        let mut claims = match self.claims.lock() {
            Ok(guard) => guard,
            // A panic while holding the lock cannot corrupt a HashSet insert;
            // keep serving requests.
            Err(poisoned) => poisoned.into_inner(),
        };
        if !claims.insert(request_id.to_string()) {
            return Err(EngineError::RequestInFlight {
                request_id: request_id.to_string(),
            });
        }
        Ok(())
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset() -> Dataset {
        let records: Vec<serde_json::Value> = (0..20)
            .map(|i| json!({"value": 10.0 + (i % 5) as f64 * 0.2}))
            .collect();
        Dataset::from_records(&records).unwrap()
    }

    fn cfg(v: serde_json::Value) -> TestConfig {
        TestConfig::from_value(v).unwrap()
    }

    #[test]
    fn registry_and_catalog_agree() {
        Dispatcher::new().unwrap();
    }

    #[test]
    fn unknown_test_lists_the_available_ids() {
        let dispatcher = Dispatcher::new().unwrap();
        let request = ExecutionRequest::new(
            "r1",
            "two_way_anova",
            cfg(json!({})),
            dataset(),
        );
        let err = dispatcher.execute(&request).unwrap_err();
        match err {
            EngineError::UnknownTest { available, .. } => {
                assert!(available.iter().any(|t| t == "one_way_anova"));
            }
            other => panic!("expected UnknownTest, got {other:?}"),
        }
    }

    #[test]
    fn request_ids_are_single_use() {
        let dispatcher = Dispatcher::new().unwrap();
        let request = ExecutionRequest::new(
            "r1",
            "descriptive_summary",
            cfg(json!({"columns": ["value"]})),
            dataset(),
        );
        dispatcher.execute(&request).unwrap();
        let err = dispatcher.execute(&request).unwrap_err();
        assert!(matches!(err, EngineError::RequestInFlight { .. }));
    }

    #[test]
    fn successful_run_fills_the_envelope() {
        let dispatcher = Dispatcher::new().unwrap();
        let request = ExecutionRequest::new(
            "r2",
            "one_sample_t",
            cfg(json!({"column": "value", "mu": 10.0})),
            dataset(),
        );
        let result = dispatcher.execute(&request).unwrap();
        assert!(result.success);
        assert_eq!(result.test_id, "one_sample_t");
        assert!(result.timestamp_ms > 0);
        assert!(result.error.is_none());
        assert!(result.summary.contains_key("p_value"));
    }

    #[test]
    fn config_problems_surface_before_any_computation() {
        let dispatcher = Dispatcher::new().unwrap();
        // capability_normal requires at least one specification limit.
        let request = ExecutionRequest::new(
            "r3",
            "capability_normal",
            cfg(json!({"value_column": "value"})),
            dataset(),
        );
        let err = dispatcher.execute(&request).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Caller);
    }

    #[test]
    fn runner_failure_becomes_a_failed_envelope() {
        let records: Vec<serde_json::Value> =
            (0..15).map(|_| json!({"value": 10.0})).collect();
        let flat = Dataset::from_records(&records).unwrap();
        let dispatcher = Dispatcher::new().unwrap();
        let request = ExecutionRequest::new(
            "r4",
            "capability_normal",
            cfg(json!({"value_column": "value", "lsl": 9.0, "usl": 11.0})),
            flat,
        );
        let result = dispatcher.execute(&request).unwrap();
        assert!(!result.success);
        let message = result.error.unwrap();
        assert!(message.contains("zero variance"));
    }

    #[test]
    fn cancelled_requests_surface_to_the_caller() {
        let dispatcher = Dispatcher::new().unwrap();
        let cancel = Cancellation::new();
        cancel.cancel();
        let request = ExecutionRequest::new(
            "r5",
            "descriptive_summary",
            cfg(json!({"columns": ["value"]})),
            dataset(),
        );
        let err = dispatcher
            .execute_with_cancellation(&request, &cancel)
            .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }
}
