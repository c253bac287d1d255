//! The SigmaStat Command-Line Interface.
//!
//! This module is the main entry point for all CLI commands and orchestrates
//! the core library functions.

use std::fs;
use std::path::Path;
use std::process;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;

use crate::catalog::catalog;
use crate::cli::args::{Command, OutputFormat, SigmaStatArgs};
use crate::config::TestConfig;
use crate::dataset::Dataset;
use crate::dispatch::{Dispatcher, ExecutionRequest};
use crate::errors::EngineError;
use crate::review::{review_with_timeout, HeuristicReviewer, ReviewOutcome};
use crate::validator::{validate, ValidationLimits};

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = SigmaStatArgs::parse();

    let result = match args.command {
        Command::Run {
            dataset,
            test,
            config,
            request_id,
            no_review,
            review_timeout_ms,
            format,
        } => handle_run(
            &dataset,
            &test,
            &config,
            request_id,
            no_review,
            review_timeout_ms,
            format,
        ),
        Command::ListTests => handle_list_tests(),
        Command::Describe { test } => handle_describe(&test),
        Command::Recommend { dataset } => handle_recommend(&dataset),
    };

    if let Err(e) = result {
        eprintln!("{:?}", miette::Report::new(e));
        process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_run(
    dataset_path: &Path,
    test_id: &str,
    config_json: &str,
    request_id: Option<String>,
    no_review: bool,
    review_timeout_ms: u64,
    format: OutputFormat,
) -> Result<(), EngineError> {
    let dataset = load_dataset(dataset_path)?;
    let config_value: serde_json::Value = serde_json::from_str(config_json)?;
    let config = TestConfig::from_value(config_value)?;
    let request_id = request_id.unwrap_or_else(default_request_id);

    let dispatcher = Dispatcher::new()?;
    let catalog = dispatcher.catalog()?;
    let definition = catalog.get(test_id).ok_or_else(|| EngineError::UnknownTest {
        test_id: test_id.to_string(),
        available: catalog.list().iter().map(|s| s.to_string()).collect(),
    })?;

    let request = ExecutionRequest::new(request_id, test_id, config.clone(), dataset.clone());
    let result = dispatcher.execute(&request)?;

    let report = validate(&result, &dataset, &config, definition, &ValidationLimits::default());

    let review: Option<ReviewOutcome> = if no_review {
        None
    } else {
        Some(review_with_timeout(
            &HeuristicReviewer,
            &result,
            &report,
            Duration::from_millis(review_timeout_ms),
        ))
    };

    match format {
        OutputFormat::Json => output::print_json(&result, &report, review.as_ref())?,
        OutputFormat::Pretty => {
            output::print_result(&result);
            println!();
            output::print_report(&report);
            if let Some(outcome) = &review {
                println!();
                output::print_review(outcome);
            }
        }
    }
    Ok(())
}

fn handle_list_tests() -> Result<(), EngineError> {
    let catalog = catalog()?;
    let mut definitions: Vec<_> = catalog
        .list()
        .into_iter()
        .filter_map(|id| catalog.get(id))
        .collect();
    definitions.sort_by_key(|d| (d.category.name(), d.id));
    output::print_test_list(&definitions);
    Ok(())
}

fn handle_describe(test_id: &str) -> Result<(), EngineError> {
    let catalog = catalog()?;
    let definition = catalog.get(test_id).ok_or_else(|| EngineError::UnknownTest {
        test_id: test_id.to_string(),
        available: catalog.list().iter().map(|s| s.to_string()).collect(),
    })?;
    output::print_definition(definition);
    Ok(())
}

fn handle_recommend(dataset_path: &Path) -> Result<(), EngineError> {
    let dataset = load_dataset(dataset_path)?;
    let profile = dataset.profile();
    let catalog = catalog()?;
    println!(
        "{} rows, {} numeric, {} categorical",
        profile.rows,
        profile.numeric_columns.len(),
        profile.categorical_columns.len()
    );
    let definitions: Vec<_> = catalog
        .recommend(&profile)
        .into_iter()
        .filter_map(|id| catalog.get(id))
        .collect();
    if definitions.is_empty() {
        println!("no applicable tests for this dataset shape");
    } else {
        output::print_test_list(&definitions);
    }
    Ok(())
}

fn load_dataset(path: &Path) -> Result<Dataset, EngineError> {
    let json = fs::read_to_string(path)?;
    Dataset::from_json_str(&json)
}

fn default_request_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("cli-{millis}")
}
