//! Unified error type for all engine failure modes.
//!
//! Every fallible operation in the engine surfaces an `EngineError`. Errors
//! carry a stable diagnostic code (`sigmastat::<category>::<kind>`) and,
//! where useful, a help message rendered by `miette`.

use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for the analysis engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested test identifier is not in the catalog.
    #[error("unknown test '{test_id}'")]
    UnknownTest {
        test_id: String,
        available: Vec<String>,
    },

    /// The request configuration does not satisfy the test's schema.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The dataset cannot support the requested test.
    #[error("data inadequacy: {message}")]
    DataInadequacy { message: String },

    /// The computation itself failed (degenerate data, singular matrix, ...).
    #[error("computation failed: {message}")]
    Computation { message: String },

    /// The request identifier has already been claimed by an execution.
    #[error("request '{request_id}' has already been executed")]
    RequestInFlight { request_id: String },

    /// Execution was cancelled before completion.
    #[error("execution cancelled")]
    Cancelled,

    /// The static test catalog violates its own integrity rules.
    #[error("catalog integrity violation: {message}")]
    Catalog { message: String },

    /// I/O failure while reading datasets or configuration (CLI paths).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in a dataset or configuration file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification used by the dispatcher and by test assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The caller supplied a bad request; surfaced synchronously.
    Caller,
    /// The runner failed mid-computation; folded into the result envelope.
    Computation,
    /// Engine misconfiguration detected at load time.
    Catalog,
    /// Environment failures outside the engine proper.
    Environment,
}

impl EngineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn inadequate(message: impl Into<String>) -> Self {
        Self::DataInadequacy {
            message: message.into(),
        }
    }

    pub fn computation(message: impl Into<String>) -> Self {
        Self::Computation {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownTest { .. }
            | Self::Configuration { .. }
            | Self::DataInadequacy { .. }
            | Self::RequestInFlight { .. } => ErrorCategory::Caller,
            Self::Computation { .. } | Self::Cancelled => ErrorCategory::Computation,
            Self::Catalog { .. } => ErrorCategory::Catalog,
            Self::Io(_) | Self::Json(_) => ErrorCategory::Environment,
        }
    }

    /// Stable code suffix used in diagnostic codes.
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::UnknownTest { .. } => "unknown_test",
            Self::Configuration { .. } => "configuration",
            Self::DataInadequacy { .. } => "data_inadequacy",
            Self::Computation { .. } => "computation",
            Self::RequestInFlight { .. } => "request_in_flight",
            Self::Cancelled => "cancelled",
            Self::Catalog { .. } => "catalog",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }

    fn category_name(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Caller => "request",
            ErrorCategory::Computation => "exec",
            ErrorCategory::Catalog => "catalog",
            ErrorCategory::Environment => "env",
        }
    }
}

impl Diagnostic for EngineError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(format!(
            "sigmastat::{}::{}",
            self.category_name(),
            self.code_suffix()
        )))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let help: Option<String> = match self {
            Self::UnknownTest { available, .. } => Some(format!(
                "available tests: {}",
                available.join(", ")
            )),
            Self::DataInadequacy { .. } => {
                Some("collect more observations or choose a test with a smaller minimum sample size".into())
            }
            Self::RequestInFlight { .. } => {
                Some("each request identifier may be executed at most once; issue a new identifier to re-run".into())
            }
            _ => None,
        };
        help.map(|h| Box::new(h) as Box<dyn std::fmt::Display>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_errors_classify_as_caller() {
        let err = EngineError::configuration("missing field 'column'");
        assert_eq!(err.category(), ErrorCategory::Caller);
        assert_eq!(err.code_suffix(), "configuration");
    }

    #[test]
    fn diagnostic_code_includes_category_and_kind() {
        let err = EngineError::computation("zero variance");
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("sigmastat::exec::computation"));
    }

    #[test]
    fn unknown_test_help_lists_alternatives() {
        let err = EngineError::UnknownTest {
            test_id: "t_test".into(),
            available: vec!["one_sample_t".into(), "two_sample_t".into()],
        };
        let help = err.help().map(|h| h.to_string());
        assert!(help.is_some_and(|h| h.contains("two_sample_t")));
    }
}
