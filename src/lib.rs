pub use crate::errors::{EngineError, ErrorCategory};
pub use crate::result::{AnalysisResult, RawTestOutput, TestCategory};

pub mod catalog;
pub mod charts;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod dispatch;
pub mod errors;
pub mod result;
pub mod review;
pub mod runners;
pub mod stats;
pub mod validator;
