//! # Test Runner System
//!
//! Runners are the primitive computations of the engine: pure functions from
//! a dataset snapshot and validated configuration to a `RawTestOutput`.
//!
//! ## Module Structure
//!
//! - **`helpers`**: shared output-building infrastructure
//! - **`descriptive`**: summaries, normality testing, Pareto analysis
//! - **`comparison`**: t-tests, ANOVA, rank tests, chi-square tests
//! - **`regression`**: correlation and least-squares models
//! - **`spc`**: control charts
//! - **`capability`**: process capability indices
//! - **`doe`**: factorial design generation and effects analysis
//!
//! Each domain module depends only on `helpers` and the numeric kernels;
//! every runner uses the same `RunnerFn` signature.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::TestConfig;
use crate::dataset::Dataset;
use crate::errors::EngineError;
use crate::result::RawTestOutput;

/// Cooperative cancellation handle passed to every runner. Runners check it
/// between computation steps; a cancelled run never produces partial output.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Checkpoint between computation steps.
    pub fn check(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Runner function type: dataset and config are read-only; all failure modes
/// are explicit `EngineError`s, folded into the envelope by the dispatcher.
pub type RunnerFn =
    fn(&Dataset, &TestConfig, &Cancellation) -> Result<RawTestOutput, EngineError>;

/// Registry for all runners, inspectable at runtime.
#[derive(Default)]
pub struct RunnerRegistry {
    runners: HashMap<&'static str, RunnerFn>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: &'static str, runner: RunnerFn) {
        self.runners.insert(id, runner);
    }

    pub fn get(&self, id: &str) -> Option<RunnerFn> {
        self.runners.get(id).copied()
    }

    pub fn has(&self, id: &str) -> bool {
        self.runners.contains_key(id)
    }

    pub fn list(&self) -> Vec<&'static str> {
        let mut ids: Vec<&'static str> = self.runners.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }
}

// Shared output-building infrastructure
pub mod helpers;

// Domain-specific runner modules
pub mod capability;
pub mod comparison;
pub mod descriptive;
pub mod doe;
pub mod regression;
pub mod spc;

/// Registers all standard runners from all domain modules.
/// This is the main entry point for setting up the complete runner system.
pub fn register_all_runners(registry: &mut RunnerRegistry) {
    descriptive::register_descriptive_runners(registry);
    comparison::register_comparison_runners(registry);
    regression::register_regression_runners(registry);
    spc::register_spc_runners(registry);
    capability::register_capability_runners(registry);
    doe::register_doe_runners(registry);
}

/// Builds a registry pre-populated with every standard runner.
pub fn build_default_runner_registry() -> RunnerRegistry {
    let mut registry = RunnerRegistry::new();
    register_all_runners(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_the_whole_catalog() {
        let mut registry = RunnerRegistry::new();
        register_all_runners(&mut registry);
        let catalog = crate::catalog::catalog().unwrap();
        for id in catalog.list() {
            assert!(registry.has(id), "no runner for '{id}'");
        }
        assert_eq!(registry.len(), catalog.len());
    }

    #[test]
    fn cancellation_checkpoint_fails_after_cancel() {
        let cancel = Cancellation::new();
        assert!(cancel.check().is_ok());
        cancel.cancel();
        assert!(matches!(cancel.check(), Err(EngineError::Cancelled)));
    }
}
