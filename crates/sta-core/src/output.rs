//! Command payload formatting.
//!
//! Payloads are deterministic for identical inputs: no timestamps or run
//! IDs are embedded, and floats use Rust's shortest round-trip form.

use serde::Serialize;
use serde_json::{json, Map, Value};
use sta_common::{OutputFormat, Result, SCHEMA_VERSION};

use crate::align::{AlignedRow, AlignedTable};
use crate::compare::UnitMeans;

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn md_cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "NA".to_string())
}

fn csv_string(header: &[String], rows: &[Vec<String>]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn md_table(header: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push_str(&format!("| {} |\n", header.join(" | ")));
    out.push_str(&format!("|{}\n", "---|".repeat(header.len())));
    for row in rows {
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out
}

fn json_string<T: Serialize>(value: &T) -> Result<String> {
    let mut s = serde_json::to_string_pretty(value)?;
    s.push('\n');
    Ok(s)
}

fn aligned_header(table: &AlignedTable) -> Vec<String> {
    let mut header: Vec<String> = [
        "unit",
        "time_step",
        "date",
        "cases",
        "population",
        "prevalence",
        "log_prevalence",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(table.covariate_names().iter().cloned());
    header
}

fn aligned_cells(row: &AlignedRow, render: fn(Option<f64>) -> String) -> Vec<String> {
    let mut cells = vec![
        row.unit.to_string(),
        row.time_step.to_string(),
        row.date.to_string(),
        row.cases.map_or_else(|| render(None), |c| c.to_string()),
        row.population.to_string(),
        render(row.prevalence),
        render(row.log_prevalence),
    ];
    cells.extend(row.covariates.iter().map(|v| render(*v)));
    cells
}

fn aligned_row_json(row: &AlignedRow, names: &[String]) -> Value {
    let covariates: Map<String, Value> = names
        .iter()
        .zip(&row.covariates)
        .map(|(name, value)| (name.clone(), json!(value)))
        .collect();
    json!({
        "unit": row.unit,
        "time_step": row.time_step,
        "date": row.date,
        "cases": row.cases,
        "population": row.population,
        "prevalence": row.prevalence,
        "log_prevalence": row.log_prevalence,
        "covariates": covariates,
    })
}

/// Format an aligned table.
pub fn format_aligned(table: &AlignedTable, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let rows: Vec<Value> = table
                .rows()
                .iter()
                .map(|r| aligned_row_json(r, table.covariate_names()))
                .collect();
            json_string(&json!({
                "schema_version": SCHEMA_VERSION,
                "stats": table.stats(),
                "units": table.units(),
                "time_steps": table.time_steps(),
                "covariate_names": table.covariate_names(),
                "rows": rows,
            }))
        }
        OutputFormat::Csv => {
            let rows: Vec<Vec<String>> = table.rows().iter().map(|r| aligned_cells(r, cell)).collect();
            csv_string(&aligned_header(table), &rows)
        }
        OutputFormat::Md => {
            let rows: Vec<Vec<String>> = table.rows().iter().map(|r| aligned_cells(r, md_cell)).collect();
            let stats = table.stats();
            Ok(format!(
                "# Aligned table\n\n{} units × {} time steps = {} rows\n\n{}",
                stats.n_units,
                stats.n_time_steps,
                stats.rows,
                md_table(&aligned_header(table), &rows)
            ))
        }
        OutputFormat::Summary => {
            let stats = table.stats();
            Ok(format!(
                "aligned {} units x {} time steps = {} rows ({} observed, {} population filled, {} with prevalence)\n",
                stats.n_units,
                stats.n_time_steps,
                stats.rows,
                stats.observed_rows,
                stats.population_filled,
                stats.prevalence_defined
            ))
        }
    }
}

/// Format per-unit prediction means.
pub fn format_unit_means(means: &UnitMeans, format: OutputFormat) -> Result<String> {
    let header = vec![
        "unit".to_string(),
        "n".to_string(),
        means.left_name.clone(),
        means.right_name.clone(),
        "difference".to_string(),
    ];
    let rows: Vec<Vec<String>> = means
        .means
        .iter()
        .map(|m| {
            vec![
                m.unit.to_string(),
                m.n.to_string(),
                m.left_mean.to_string(),
                m.right_mean.to_string(),
                m.difference.to_string(),
            ]
        })
        .collect();

    match format {
        OutputFormat::Json => json_string(&json!({
            "schema_version": SCHEMA_VERSION,
            "left": means.left_name,
            "right": means.right_name,
            "units": means.means,
        })),
        OutputFormat::Csv => csv_string(&header, &rows),
        OutputFormat::Md => Ok(format!(
            "# {} vs {}\n\n{}",
            means.left_name,
            means.right_name,
            md_table(&header, &rows)
        )),
        OutputFormat::Summary => {
            let mean_abs = if means.means.is_empty() {
                None
            } else {
                Some(
                    means.means.iter().map(|m| m.difference.abs()).sum::<f64>()
                        / means.means.len() as f64,
                )
            };
            Ok(format!(
                "compared {} vs {}: {} units, mean |difference| {}\n",
                means.left_name,
                means.right_name,
                means.means.len(),
                md_cell(mean_abs)
            ))
        }
    }
}
