//! Result comparison between two models' predictions.
//!
//! Two prediction tables are inner-joined on (unit, date), then averaged
//! per unit across time so they can be mapped side by side.

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use sta_common::{Error, Result, UnitCode};
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::logging::event_names;

/// One predicted value for a unit and period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub unit: UnitCode,
    pub date: NaiveDate,
    pub value: f64,
}

/// A named set of predictions, e.g. one model's fitted values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionTable {
    pub name: String,
    pub rows: Vec<Prediction>,
}

impl PredictionTable {
    pub fn new(name: impl Into<String>, rows: Vec<Prediction>) -> Self {
        PredictionTable {
            name: name.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn index(&self) -> Result<HashMap<(&str, NaiveDate), f64>> {
        let mut index = HashMap::with_capacity(self.rows.len());
        for row in &self.rows {
            if index.insert((row.unit.as_str(), row.date), row.value).is_some() {
                return Err(Error::DuplicateKey {
                    table: self.name.clone(),
                    key: format!("{}@{}", row.unit, row.date),
                });
            }
        }
        Ok(index)
    }
}

/// A (unit, date) key present in both tables with both values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedPrediction {
    pub unit: UnitCode,
    pub date: NaiveDate,
    pub left: f64,
    pub right: f64,
}

/// Result of [`merge_predictions`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedPredictions {
    pub left_name: String,
    pub right_name: String,
    pub rows: Vec<MergedPrediction>,
}

impl MergedPredictions {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Inner join on (unit, date).
///
/// Rows keep the left table's order. Keys found in only one table are
/// dropped, so disjoint tables merge to nothing. A key repeated within
/// either table is an integrity error.
pub fn merge_predictions(left: &PredictionTable, right: &PredictionTable) -> Result<MergedPredictions> {
    left.index()?;
    let right_index = right.index()?;

    let rows: Vec<MergedPrediction> = left
        .rows
        .iter()
        .filter_map(|l| {
            right_index
                .get(&(l.unit.as_str(), l.date))
                .map(|r| MergedPrediction {
                    unit: l.unit.clone(),
                    date: l.date,
                    left: l.value,
                    right: *r,
                })
        })
        .collect();

    info!(
        target: event_names::COMPARE_MERGED,
        left = %left.name,
        right = %right.name,
        left_rows = left.len(),
        right_rows = right.len(),
        merged = rows.len(),
        "predictions merged"
    );

    Ok(MergedPredictions {
        left_name: left.name.clone(),
        right_name: right.name.clone(),
        rows,
    })
}

/// Time-averaged predictions for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitMean {
    pub unit: UnitCode,
    /// Merged rows averaged.
    pub n: usize,
    pub left_mean: f64,
    pub right_mean: f64,
    /// `left_mean - right_mean`.
    pub difference: f64,
}

/// Per-unit means, ordered by first appearance in the merged rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitMeans {
    pub left_name: String,
    pub right_name: String,
    pub means: Vec<UnitMean>,
}

/// Which value of a [`UnitMean`] to map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Left,
    Right,
    Difference,
}

impl UnitMean {
    pub fn value(&self, side: Side) -> f64 {
        match side {
            Side::Left => self.left_mean,
            Side::Right => self.right_mean,
            Side::Difference => self.difference,
        }
    }
}

impl UnitMeans {
    pub fn get(&self, unit: &str) -> Option<&UnitMean> {
        self.means.iter().find(|m| m.unit.as_str() == unit)
    }

    /// Values of `side` in the order of `units`; units with no mean are
    /// absent.
    pub fn domain_for(&self, units: &[UnitCode], side: Side) -> Vec<Option<f64>> {
        let by_unit: HashMap<&str, &UnitMean> =
            self.means.iter().map(|m| (m.unit.as_str(), m)).collect();
        units
            .iter()
            .map(|u| by_unit.get(u.as_str()).map(|m| m.value(side)))
            .collect()
    }
}

/// Average each side across time, per unit.
pub fn unit_means(merged: &MergedPredictions) -> UnitMeans {
    let mut order: Vec<&UnitCode> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut sums: HashMap<&str, (usize, f64, f64)> = HashMap::new();

    for row in &merged.rows {
        if seen.insert(row.unit.as_str()) {
            order.push(&row.unit);
        }
        let entry = sums.entry(row.unit.as_str()).or_insert((0, 0.0, 0.0));
        entry.0 += 1;
        entry.1 += row.left;
        entry.2 += row.right;
    }

    let means: Vec<UnitMean> = order
        .into_iter()
        .filter_map(|unit| {
            let (n, left_sum, right_sum) = *sums.get(unit.as_str())?;
            let left_mean = left_sum / n as f64;
            let right_mean = right_sum / n as f64;
            Some(UnitMean {
                unit: unit.clone(),
                n,
                left_mean,
                right_mean,
                difference: left_mean - right_mean,
            })
        })
        .collect();

    info!(
        target: event_names::COMPARE_UNIT_MEANS,
        units = means.len(),
        "per-unit means computed"
    );

    UnitMeans {
        left_name: merged.left_name.clone(),
        right_name: merged.right_name.clone(),
        means,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pred(unit: &str, day: u32, value: f64) -> Prediction {
        Prediction {
            unit: UnitCode::from(unit),
            date: NaiveDate::from_ymd_opt(2020, 3, day).unwrap(),
            value,
        }
    }

    #[test]
    fn test_merge_inner_join_keeps_left_order() {
        let left = PredictionTable::new(
            "car",
            vec![pred("B", 7, 2.0), pred("A", 7, 1.0), pred("C", 7, 9.0)],
        );
        let right = PredictionTable::new("ml", vec![pred("A", 7, 1.5), pred("B", 7, 2.5)]);
        let merged = merge_predictions(&left, &right).unwrap();
        let units: Vec<&str> = merged.rows.iter().map(|r| r.unit.as_str()).collect();
        assert_eq!(units, vec!["B", "A"]);
        assert_eq!(merged.rows[0].right, 2.5);
        assert_eq!(merged.left_name, "car");
    }

    #[test]
    fn test_merge_disjoint_is_empty() {
        let left = PredictionTable::new("l", vec![pred("A", 7, 1.0)]);
        let right = PredictionTable::new("r", vec![pred("B", 7, 1.0)]);
        let merged = merge_predictions(&left, &right).unwrap();
        assert!(merged.is_empty());
        assert!(unit_means(&merged).means.is_empty());
    }

    #[test]
    fn test_merge_rejects_duplicate_keys() {
        let left = PredictionTable::new("l", vec![pred("A", 7, 1.0)]);
        let right = PredictionTable::new("r", vec![pred("A", 7, 1.0), pred("A", 7, 2.0)]);
        let err = merge_predictions(&left, &right).unwrap_err();
        match err {
            Error::DuplicateKey { table, .. } => assert_eq!(table, "r"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unit_means() {
        let left = PredictionTable::new(
            "l",
            vec![pred("A", 7, 1.0), pred("B", 7, 4.0), pred("A", 14, 3.0)],
        );
        let right = PredictionTable::new(
            "r",
            vec![pred("A", 7, 0.0), pred("A", 14, 1.0), pred("B", 7, 5.0)],
        );
        let means = unit_means(&merge_predictions(&left, &right).unwrap());
        assert_eq!(means.means.len(), 2);

        let a = means.get("A").unwrap();
        assert_eq!(a.n, 2);
        assert_eq!(a.left_mean, 2.0);
        assert_eq!(a.right_mean, 0.5);
        assert_eq!(a.difference, 1.5);
        assert_eq!(means.means[1].unit.as_str(), "B");
        assert_eq!(means.means[1].difference, -1.0);
    }

    #[test]
    fn test_domain_for_polygon_order() {
        let left = PredictionTable::new("l", vec![pred("A", 7, 1.0), pred("B", 7, 4.0)]);
        let right = PredictionTable::new("r", vec![pred("A", 7, 2.0), pred("B", 7, 4.0)]);
        let means = unit_means(&merge_predictions(&left, &right).unwrap());
        let order = vec![UnitCode::from("C"), UnitCode::from("B"), UnitCode::from("A")];
        assert_eq!(means.domain_for(&order, Side::Left), vec![None, Some(4.0), Some(1.0)]);
        assert_eq!(
            means.domain_for(&order, Side::Difference),
            vec![None, Some(0.0), Some(-1.0)]
        );
    }
}
