//! Model frames: the numeric arrays a sampler consumes.
//!
//! Columns are resolved against an [`AlignedTable`]. Built-in columns are
//! `cases`, `population`, `prevalence` and `log_prevalence`; every
//! covariate column is addressable by name.

use serde::{Deserialize, Serialize};
use sta_common::{Error, Result};
use sta_math::safe_ln;

use super::formula::{Formula, INTERCEPT};
use crate::align::{AlignedRow, AlignedTable};

/// Response, offset, and design matrix in aligned-table row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFrame {
    pub response_name: String,
    /// Absent responses are left for the sampler to impute.
    pub response: Vec<Option<f64>>,
    pub offset: Option<Vec<f64>>,
    pub column_names: Vec<String>,
    /// Row-major, `n_rows * column_names.len()` values.
    pub design: Vec<f64>,
    pub n_rows: usize,
}

/// Where a formula column comes from.
#[derive(Debug, Clone, Copy)]
enum Column {
    Cases,
    Population,
    Prevalence,
    LogPrevalence,
    Covariate(usize),
}

impl Column {
    fn resolve(name: &str, table: &AlignedTable) -> Result<Column> {
        match name {
            "cases" => Ok(Column::Cases),
            "population" => Ok(Column::Population),
            "prevalence" => Ok(Column::Prevalence),
            "log_prevalence" => Ok(Column::LogPrevalence),
            other => table
                .covariate_index(other)
                .map(Column::Covariate)
                .ok_or_else(|| Error::InvalidFormula(format!("unknown column '{}'", other))),
        }
    }

    fn value(self, row: &AlignedRow) -> Option<f64> {
        match self {
            Column::Cases => row.cases.map(|c| c as f64),
            Column::Population => Some(row.population as f64),
            Column::Prevalence => row.prevalence,
            Column::LogPrevalence => row.log_prevalence,
            Column::Covariate(i) => row.covariates.get(i).copied().flatten(),
        }
    }
}

fn missing(row: &AlignedRow, column: impl Into<String>) -> Error {
    Error::MissingModelInput {
        unit: row.unit.to_string(),
        time_step: row.time_step,
        column: column.into(),
    }
}

impl ModelFrame {
    /// Evaluate `formula` against every row of `table`.
    ///
    /// Absent offset or covariate values are errors; the response may be
    /// absent.
    pub fn build(formula: &Formula, table: &AlignedTable) -> Result<ModelFrame> {
        let response_column = Column::resolve(&formula.response, table)?;
        let offset_column = formula
            .offset
            .as_ref()
            .map(|o| Column::resolve(&o.column, table).map(|c| (c, o)))
            .transpose()?;
        let term_columns = formula
            .terms
            .iter()
            .map(|t| Column::resolve(t, table).map(|c| (c, t.as_str())))
            .collect::<Result<Vec<_>>>()?;

        let column_names = formula.design_columns();
        let mut design = Vec::with_capacity(table.len() * column_names.len());
        let mut response = Vec::with_capacity(table.len());
        let mut offset = offset_column.map(|_| Vec::with_capacity(table.len()));

        for row in table.rows() {
            response.push(response_column.value(row));

            if let (Some((column, term)), Some(values)) = (offset_column, offset.as_mut()) {
                let raw = column.value(row).ok_or_else(|| missing(row, term.to_string()))?;
                let value = if term.log {
                    safe_ln(raw).ok_or_else(|| missing(row, term.to_string()))?
                } else {
                    raw
                };
                values.push(value);
            }

            if formula.intercept {
                design.push(1.0);
            }
            for (column, name) in &term_columns {
                design.push(column.value(row).ok_or_else(|| missing(row, *name))?);
            }
        }

        Ok(ModelFrame {
            response_name: formula.response.clone(),
            response,
            offset,
            column_names,
            design,
            n_rows: table.len(),
        })
    }

    pub fn n_columns(&self) -> usize {
        self.column_names.len()
    }

    /// One design matrix row.
    pub fn design_row(&self, i: usize) -> Option<&[f64]> {
        let k = self.n_columns();
        if i >= self.n_rows {
            return None;
        }
        Some(&self.design[i * k..(i + 1) * k])
    }

    /// Design matrix as a list of rows.
    pub fn design_rows(&self) -> Vec<Vec<f64>> {
        (0..self.n_rows)
            .filter_map(|i| self.design_row(i).map(|r| r.to_vec()))
            .collect()
    }

    pub fn has_intercept(&self) -> bool {
        self.column_names.first().map(String::as_str) == Some(INTERCEPT)
    }
}
