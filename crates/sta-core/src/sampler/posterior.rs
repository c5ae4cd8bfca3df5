//! Posterior draws returned by a sampler.

use serde::{Deserialize, Serialize};
use sta_common::{Error, Result};
use sta_math::{mean, ParameterSummary};
use std::collections::BTreeMap;

use crate::align::AlignedTable;
use crate::compare::{Prediction, PredictionTable};

/// Draws for a group of parameters: one row per retained draw, one column
/// per parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSampleMatrix")]
pub struct SampleMatrix {
    columns: Vec<String>,
    n_draws: usize,
    /// Row-major, `n_draws * columns.len()` values.
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct RawSampleMatrix {
    columns: Vec<String>,
    n_draws: usize,
    values: Vec<f64>,
}

impl TryFrom<RawSampleMatrix> for SampleMatrix {
    type Error = Error;

    fn try_from(raw: RawSampleMatrix) -> Result<Self> {
        let matrix = SampleMatrix::new(raw.columns, raw.values)?;
        if matrix.n_draws != raw.n_draws {
            return Err(Error::ShapeMismatch {
                what: "sample matrix draws".to_string(),
                expected: raw.n_draws,
                actual: matrix.n_draws,
            });
        }
        Ok(matrix)
    }
}

impl SampleMatrix {
    pub fn new(columns: Vec<String>, values: Vec<f64>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::ShapeMismatch {
                what: "sample matrix columns".to_string(),
                expected: 1,
                actual: 0,
            });
        }
        if values.len() % columns.len() != 0 {
            return Err(Error::ShapeMismatch {
                what: "sample matrix values".to_string(),
                expected: (values.len() / columns.len() + 1) * columns.len(),
                actual: values.len(),
            });
        }
        Ok(SampleMatrix {
            n_draws: values.len() / columns.len(),
            columns,
            values,
        })
    }

    /// Build from per-draw rows.
    pub fn from_draws(columns: Vec<String>, draws: &[Vec<f64>]) -> Result<Self> {
        if let Some(row) = draws.iter().find(|d| d.len() != columns.len()) {
            return Err(Error::ShapeMismatch {
                what: "sample draw".to_string(),
                expected: columns.len(),
                actual: row.len(),
            });
        }
        SampleMatrix::new(columns, draws.concat())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_draws(&self) -> usize {
        self.n_draws
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// The chain for column `j`.
    pub fn column(&self, j: usize) -> Option<Vec<f64>> {
        let k = self.columns.len();
        if j >= k {
            return None;
        }
        Some(self.values.iter().skip(j).step_by(k).copied().collect())
    }

    pub fn column_by_name(&self, name: &str) -> Option<Vec<f64>> {
        let j = self.columns.iter().position(|c| c == name)?;
        self.column(j)
    }

    /// Posterior mean of every column.
    pub fn column_means(&self) -> Vec<Option<f64>> {
        (0..self.columns.len())
            .map(|j| self.column(j).and_then(|chain| mean(&chain)))
            .collect()
    }
}

/// Named groups of posterior draws.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PosteriorSamples {
    groups: BTreeMap<String, SampleMatrix>,
}

impl PosteriorSamples {
    /// Regression coefficients, one column per design matrix column.
    pub const BETA: &'static str = "beta";
    /// Fitted values, one column per aligned-table row.
    pub const FITTED: &'static str = "fitted";

    pub fn new() -> Self {
        PosteriorSamples::default()
    }

    pub fn insert(&mut self, group: impl Into<String>, samples: SampleMatrix) {
        self.groups.insert(group.into(), samples);
    }

    pub fn get(&self, group: &str) -> Option<&SampleMatrix> {
        self.groups.get(group)
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    fn require(&self, group: &str) -> Result<&SampleMatrix> {
        self.get(group).ok_or_else(|| Error::ShapeMismatch {
            what: format!("posterior group '{}' columns", group),
            expected: 1,
            actual: 0,
        })
    }

    /// Summaries for every parameter in `group`, in column order.
    pub fn summarise(&self, group: &str) -> Result<Vec<ParameterSummary>> {
        let samples = self.require(group)?;
        Ok(samples
            .columns()
            .iter()
            .enumerate()
            .filter_map(|(j, name)| {
                let chain = samples.column(j)?;
                ParameterSummary::from_draws(name.clone(), &chain)
            })
            .collect())
    }

    /// Posterior-mean fitted values keyed by the table's (unit, date).
    ///
    /// The fitted group must have one column per table row.
    pub fn fitted_predictions(&self, table: &AlignedTable, name: &str) -> Result<PredictionTable> {
        let fitted = self.require(Self::FITTED)?;
        if fitted.n_columns() != table.len() {
            return Err(Error::ShapeMismatch {
                what: "fitted value columns".to_string(),
                expected: table.len(),
                actual: fitted.n_columns(),
            });
        }
        if fitted.n_draws() == 0 {
            return Err(Error::ShapeMismatch {
                what: "fitted value draws".to_string(),
                expected: 1,
                actual: 0,
            });
        }
        let rows = table
            .rows()
            .iter()
            .zip(fitted.column_means())
            .filter_map(|(row, value)| {
                value.map(|value| Prediction {
                    unit: row.unit.clone(),
                    date: row.date,
                    value,
                })
            })
            .collect();
        Ok(PredictionTable::new(name, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(ns: &[&str]) -> Vec<String> {
        ns.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_sample_matrix_columns() {
        let m = SampleMatrix::from_draws(
            names(&["a", "b"]),
            &[vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]],
        )
        .unwrap();
        assert_eq!(m.n_draws(), 3);
        assert_eq!(m.column(1), Some(vec![10.0, 20.0, 30.0]));
        assert_eq!(m.column_by_name("a"), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(m.column(2), None);
        assert_eq!(m.column_means(), vec![Some(2.0), Some(20.0)]);
    }

    #[test]
    fn test_sample_matrix_shape_errors() {
        assert!(SampleMatrix::new(names(&["a", "b"]), vec![1.0, 2.0, 3.0]).is_err());
        assert!(SampleMatrix::new(vec![], vec![]).is_err());
        assert!(SampleMatrix::from_draws(names(&["a"]), &[vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_deserialize_checks_shape() {
        let ok = r#"{"columns": ["a", "b"], "n_draws": 2, "values": [1.0, 2.0, 3.0, 4.0]}"#;
        let m: SampleMatrix = serde_json::from_str(ok).unwrap();
        assert_eq!(m.column(1), Some(vec![2.0, 4.0]));

        let ragged = r#"{"columns": ["a", "b"], "n_draws": 2, "values": [1.0, 2.0, 3.0]}"#;
        assert!(serde_json::from_str::<SampleMatrix>(ragged).is_err());

        let overstated = r#"{"columns": ["a"], "n_draws": 5, "values": [1.0, 2.0]}"#;
        let err = serde_json::from_str::<SampleMatrix>(overstated).unwrap_err();
        assert!(err.to_string().contains("sample matrix draws"));
    }

    #[test]
    fn test_summarise_group() {
        let draws: Vec<Vec<f64>> = (0..100).map(|i| vec![i as f64, -1.0]).collect();
        let mut samples = PosteriorSamples::new();
        samples.insert(
            PosteriorSamples::BETA,
            SampleMatrix::from_draws(names(&["(Intercept)", "imd"]), &draws).unwrap(),
        );

        let summaries = samples.summarise(PosteriorSamples::BETA).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "(Intercept)");
        assert_eq!(summaries[0].mean, 49.5);
        assert_eq!(summaries[1].mean, -1.0);
        assert!(summaries[1].excludes_zero());
        assert!(samples.summarise("rho").is_err());
    }
}
