//! Declarative chart specifications.
//!
//! Runners describe their visuals as `ChartSpec` values; rendering is a
//! front-end concern. Builders are total: degenerate input yields a spec
//! with empty traces, never an error.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Histogram,
    Bar,
    Scatter,
    Line,
    BoxPlot,
    ControlChart,
    Pareto,
}

/// One data series. `x` is numeric where the axis is numeric; categorical
/// axes use `labels` instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trace {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub x: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub y: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

/// Horizontal reference line (control limit, spec limit, target).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefLine {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub traces: Vec<Trace>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<RefLine>,
    /// Indices into the first trace flagged as out of control / notable.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<usize>,
}

pub fn histogram(values: &[f64], name: &str, title: &str) -> ChartSpec {
    ChartSpec {
        kind: ChartKind::Histogram,
        title: title.to_string(),
        x_label: name.to_string(),
        y_label: "Frequency".to_string(),
        traces: vec![Trace {
            name: name.to_string(),
            x: values.to_vec(),
            ..Trace::default()
        }],
        lines: Vec::new(),
        highlights: Vec::new(),
    }
}

pub fn scatter(x: &[f64], y: &[f64], title: &str, x_label: &str, y_label: &str) -> ChartSpec {
    ChartSpec {
        kind: ChartKind::Scatter,
        title: title.to_string(),
        x_label: x_label.to_string(),
        y_label: y_label.to_string(),
        traces: vec![Trace {
            name: y_label.to_string(),
            x: x.to_vec(),
            y: y.to_vec(),
            ..Trace::default()
        }],
        lines: Vec::new(),
        highlights: Vec::new(),
    }
}

/// Scatter plus an overlaid fitted line.
pub fn fitted_line(
    x: &[f64],
    y: &[f64],
    fitted: &[f64],
    title: &str,
    x_label: &str,
    y_label: &str,
) -> ChartSpec {
    let mut spec = scatter(x, y, title, x_label, y_label);
    spec.traces.push(Trace {
        name: "fit".to_string(),
        x: x.to_vec(),
        y: fitted.to_vec(),
        ..Trace::default()
    });
    spec
}

/// Grouped box plot: one trace of raw values per group.
pub fn box_plot(groups: &[(String, Vec<f64>)], title: &str, y_label: &str) -> ChartSpec {
    ChartSpec {
        kind: ChartKind::BoxPlot,
        title: title.to_string(),
        x_label: "Group".to_string(),
        y_label: y_label.to_string(),
        traces: groups
            .iter()
            .map(|(name, values)| Trace {
                name: name.clone(),
                y: values.clone(),
                ..Trace::default()
            })
            .collect(),
        lines: Vec::new(),
        highlights: Vec::new(),
    }
}

pub fn bar(labels: &[String], values: &[f64], title: &str, y_label: &str) -> ChartSpec {
    ChartSpec {
        kind: ChartKind::Bar,
        title: title.to_string(),
        x_label: "Category".to_string(),
        y_label: y_label.to_string(),
        traces: vec![Trace {
            name: y_label.to_string(),
            y: values.to_vec(),
            labels: labels.to_vec(),
            ..Trace::default()
        }],
        lines: Vec::new(),
        highlights: Vec::new(),
    }
}

/// Pareto chart: sorted bars plus a cumulative-percentage line trace.
pub fn pareto(
    labels: &[String],
    values: &[f64],
    cumulative_pct: &[f64],
    title: &str,
    y_label: &str,
) -> ChartSpec {
    let mut spec = bar(labels, values, title, y_label);
    spec.kind = ChartKind::Pareto;
    spec.traces.push(Trace {
        name: "cumulative %".to_string(),
        y: cumulative_pct.to_vec(),
        labels: labels.to_vec(),
        ..Trace::default()
    });
    spec.lines.push(RefLine {
        label: "80%".to_string(),
        value: 80.0,
    });
    spec
}

/// Control chart: points in run order, center line and 3-sigma limits,
/// beyond-limit point indices highlighted.
pub fn control_chart(
    points: &[f64],
    center: f64,
    ucl: f64,
    lcl: f64,
    title: &str,
    y_label: &str,
    violations: &[usize],
) -> ChartSpec {
    ChartSpec {
        kind: ChartKind::ControlChart,
        title: title.to_string(),
        x_label: "Observation".to_string(),
        y_label: y_label.to_string(),
        traces: vec![Trace {
            name: y_label.to_string(),
            x: (0..points.len()).map(|i| i as f64).collect(),
            y: points.to_vec(),
            ..Trace::default()
        }],
        lines: vec![
            RefLine {
                label: "CL".to_string(),
                value: center,
            },
            RefLine {
                label: "UCL".to_string(),
                value: ucl,
            },
            RefLine {
                label: "LCL".to_string(),
                value: lcl,
            },
        ],
        highlights: violations.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_chart_carries_limits_and_violations() {
        let spec = control_chart(&[1.0, 2.0, 9.0], 2.0, 5.0, -1.0, "I Chart", "value", &[2]);
        assert_eq!(spec.kind, ChartKind::ControlChart);
        assert_eq!(spec.lines.len(), 3);
        assert_eq!(spec.highlights, vec![2]);
    }

    #[test]
    fn pareto_includes_cumulative_trace_and_80_line() {
        let labels = vec!["a".to_string(), "b".to_string()];
        let spec = pareto(&labels, &[8.0, 2.0], &[80.0, 100.0], "Pareto", "Count");
        assert_eq!(spec.traces.len(), 2);
        assert!((spec.lines[0].value - 80.0).abs() < 1e-12);
    }

    #[test]
    fn empty_histogram_is_still_a_valid_spec() {
        let spec = histogram(&[], "x", "empty");
        assert_eq!(spec.traces[0].x.len(), 0);
    }
}
