//! Handles all user-facing output for the CLI.
//!
//! This module is responsible for pretty-printing, colorizing output,
//! formatting reports, and generating JSON. By centralizing output logic here,
//! we ensure a consistent user experience across all commands.

use serde_json::{json, Value};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::catalog::{Constraint, FieldKind, TestDefinition};
use crate::errors::EngineError;
use crate::result::AnalysisResult;
use crate::review::{ReviewOutcome, Verdict};
use crate::validator::{Confidence, Severity, ValidationReport};

// ============================================================================
// JSON OUTPUT
// ============================================================================

/// The whole pipeline outcome as one JSON document on stdout.
pub fn print_json(
    result: &AnalysisResult,
    report: &ValidationReport,
    review: Option<&ReviewOutcome>,
) -> Result<(), EngineError> {
    let mut doc = json!({
        "result": result,
        "validation": report,
    });
    if let (Some(outcome), Value::Object(map)) = (review, &mut doc) {
        map.insert("review".into(), serde_json::to_value(outcome)?);
    }
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

// ============================================================================
// PRETTY OUTPUT
// ============================================================================

pub fn print_result(result: &AnalysisResult) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    heading(&mut stdout, &format!("=== {} ({}) ===", result.test_id, result.category));
    if result.success {
        colored(&mut stdout, Color::Green, "status: ok");
    } else {
        colored(&mut stdout, Color::Red, "status: failed");
        if let Some(error) = &result.error {
            colored(&mut stdout, Color::Red, &format!("error:  {error}"));
        }
    }
    println!("timing: {} ms", result.duration_ms);

    if !result.summary.is_empty() {
        println!();
        for (key, value) in &result.summary {
            println!("  {key}: {}", render(value));
        }
    }
    for warning in &result.warnings {
        colored(&mut stdout, Color::Yellow, &format!("warning: {warning}"));
    }
    if !result.charts.is_empty() {
        println!("\ncharts: {}", result.charts.len());
    }
}

pub fn print_report(report: &ValidationReport) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    heading(&mut stdout, "--- validation ---");
    let confidence_color = match report.confidence {
        Confidence::High => Color::Green,
        Confidence::Medium => Color::Yellow,
        Confidence::Low => Color::Red,
    };
    colored(
        &mut stdout,
        confidence_color,
        &format!(
            "passed: {}  confidence: {:?}",
            report.passed, report.confidence
        ),
    );

    for finding in &report.findings {
        let (color, tag) = match finding.severity {
            Severity::Blocking => (Color::Red, "BLOCK"),
            Severity::Warning => (Color::Yellow, "WARN "),
            Severity::Info => (Color::Cyan, "INFO "),
        };
        colored(&mut stdout, color, &format!("[{tag}] {}", finding.message));
    }
    for recommendation in &report.recommendations {
        println!("  -> {recommendation}");
    }
}

pub fn print_review(outcome: &ReviewOutcome) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    heading(&mut stdout, "--- review ---");
    match outcome {
        ReviewOutcome::Completed(review) => {
            let color = match review.verdict {
                Verdict::Validated => Color::Green,
                Verdict::Caution => Color::Yellow,
                Verdict::Concern => Color::Red,
            };
            colored(
                &mut stdout,
                color,
                &format!(
                    "verdict: {:?} (confidence {})",
                    review.verdict, review.confidence
                ),
            );
            println!("{}", review.summary);
            for finding in &review.findings {
                println!("  - {finding}");
            }
        }
        ReviewOutcome::Degraded { reason } => {
            colored(&mut stdout, Color::Yellow, &format!("degraded: {reason}"));
        }
    }
}

pub fn print_test_list(definitions: &[&TestDefinition]) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let width = definitions.iter().map(|d| d.id.len()).max().unwrap_or(0);
    for def in definitions {
        let _ = stdout.set_color(ColorSpec::new().set_bold(true));
        print!("{:width$}", def.id);
        let _ = stdout.reset();
        println!("  [{}] {}", def.category, def.name);
    }
}

pub fn print_definition(def: &TestDefinition) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    heading(&mut stdout, &format!("=== {} ===", def.id));
    println!("name:       {}", def.name);
    println!("category:   {}", def.category);
    println!("min rows:   {}", def.min_samples);
    if let Some(group_field) = def.group_field {
        println!(
            "grouped by: '{group_field}' with at least {} per group",
            def.min_per_group
        );
    }
    if let Some(alt) = def.alternative {
        println!("fallback:   {alt}");
    }

    println!("\nconfig fields:");
    for field in def.fields {
        let required = if field.required { "required" } else { "optional" };
        let mut line = format!("  {} ({}, {required})", field.name, kind_name(field.kind));
        if let Some(constraint) = field.constraint {
            line.push_str(&format!("  {}", constraint_name(constraint)));
        }
        println!("{line}");
    }
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn heading(stdout: &mut StandardStream, text: &str) {
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true));
    println!("{text}");
    let _ = stdout.reset();
}

fn colored(stdout: &mut StandardStream, color: Color, text: &str) {
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)));
    println!("{text}");
    let _ = stdout.reset();
}

fn render(value: &Value) -> String {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(|f| format!("{f:.6}"))
            .unwrap_or_else(|| n.to_string()),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn kind_name(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Column => "column",
        FieldKind::ColumnList => "column list",
        FieldKind::Number => "number",
        FieldKind::Integer => "integer",
        FieldKind::Text => "text",
        FieldKind::NumberList => "number list",
    }
}

fn constraint_name(constraint: Constraint) -> String {
    match constraint {
        Constraint::Positive => "> 0".into(),
        Constraint::Probability => "in (0, 1)".into(),
        Constraint::MinItems(n) => format!(">= {n} items"),
        Constraint::IntRange(lo, hi) => format!("in {lo}..={hi}"),
    }
}
