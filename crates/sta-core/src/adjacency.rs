//! Binary neighbourhood matrices.
//!
//! Entry (i, j) is 1 when units i and j share a border. The matrix must be
//! square, symmetric, 0/1-valued and have a zero diagonal. Rows follow the
//! roster order of the table the matrix is paired with; when the matrix
//! carries unit labels that order is checked explicitly.

use serde::{Deserialize, Serialize};
use sta_common::{Error, Result, UnitCode};

use crate::geometry::PolygonSet;

/// A validated symmetric 0/1 neighbourhood matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNeighbourMatrix")]
pub struct NeighbourMatrix {
    units: Option<Vec<UnitCode>>,
    n: usize,
    /// Row-major, `n * n` entries.
    entries: Vec<u8>,
}

#[derive(Deserialize)]
struct RawNeighbourMatrix {
    units: Option<Vec<UnitCode>>,
    n: usize,
    entries: Vec<u8>,
}

impl TryFrom<RawNeighbourMatrix> for NeighbourMatrix {
    type Error = Error;

    fn try_from(raw: RawNeighbourMatrix) -> Result<Self> {
        NeighbourMatrix::new(raw.n, raw.entries, raw.units)
    }
}

impl NeighbourMatrix {
    /// Build from row-major entries, validating the matrix.
    pub fn new(n: usize, entries: Vec<u8>, units: Option<Vec<UnitCode>>) -> Result<Self> {
        if n == 0 {
            return Err(Error::InvalidAdjacency("matrix is empty".to_string()));
        }
        if entries.len() != n * n {
            return Err(Error::InvalidAdjacency(format!(
                "expected {} entries for a {}x{} matrix, got {}",
                n * n,
                n,
                n,
                entries.len()
            )));
        }
        if let Some(labels) = &units {
            if labels.len() != n {
                return Err(Error::InvalidAdjacency(format!(
                    "{} unit labels for a {}x{} matrix",
                    labels.len(),
                    n,
                    n
                )));
            }
        }

        for i in 0..n {
            for j in 0..n {
                let v = entries[i * n + j];
                if v > 1 {
                    return Err(Error::InvalidAdjacency(format!(
                        "entry ({}, {}) is {}; entries must be 0 or 1",
                        i + 1,
                        j + 1,
                        v
                    )));
                }
                if i == j && v != 0 {
                    return Err(Error::InvalidAdjacency(format!(
                        "diagonal entry ({}, {}) must be 0",
                        i + 1,
                        i + 1
                    )));
                }
                if j > i && v != entries[j * n + i] {
                    return Err(Error::InvalidAdjacency(format!(
                        "matrix is not symmetric at ({}, {})",
                        i + 1,
                        j + 1
                    )));
                }
            }
        }

        Ok(NeighbourMatrix { units, n, entries })
    }

    /// Build from a list of rows; every row must have one entry per row.
    pub fn from_rows(rows: Vec<Vec<u8>>, units: Option<Vec<UnitCode>>) -> Result<Self> {
        let n = rows.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(Error::InvalidAdjacency(format!(
                "matrix is not square: row {} has {} entries, expected {}",
                i + 1,
                row.len(),
                n
            )));
        }
        NeighbourMatrix::new(n, rows.into_iter().flatten().collect(), units)
    }

    /// Dimension (number of units).
    pub fn n(&self) -> usize {
        self.n
    }

    /// Unit labels, when the source matrix had a header row.
    pub fn units(&self) -> Option<&[UnitCode]> {
        self.units.as_deref()
    }

    pub fn is_neighbour(&self, i: usize, j: usize) -> bool {
        i < self.n && j < self.n && self.entries[i * self.n + j] == 1
    }

    /// Neighbour positions of unit `i`, ascending.
    pub fn neighbours(&self, i: usize) -> Vec<usize> {
        if i >= self.n {
            return Vec::new();
        }
        let row = &self.entries[i * self.n..(i + 1) * self.n];
        row.iter()
            .enumerate()
            .filter(|(_, v)| **v == 1)
            .map(|(j, _)| j)
            .collect()
    }

    /// Number of undirected edges.
    pub fn n_edges(&self) -> usize {
        self.entries.iter().filter(|v| **v == 1).count() / 2
    }

    /// Positions of units with no neighbours.
    pub fn islands(&self) -> Vec<usize> {
        (0..self.n)
            .filter(|&i| self.entries[i * self.n..(i + 1) * self.n].iter().all(|v| *v == 0))
            .collect()
    }

    /// Neighbour lists for every unit, in row order.
    pub fn to_adjacency_list(&self) -> Vec<Vec<usize>> {
        (0..self.n).map(|i| self.neighbours(i)).collect()
    }

    /// Check the matrix against an expected unit order.
    ///
    /// The dimension must match. Labelled matrices must list the same units
    /// in the same order; unlabelled matrices are assumed to follow it.
    pub fn check_unit_order(&self, expected: &[UnitCode]) -> Result<()> {
        if expected.len() != self.n {
            return Err(Error::ShapeMismatch {
                what: "neighbourhood matrix dimension".to_string(),
                expected: expected.len(),
                actual: self.n,
            });
        }
        if let Some(labels) = &self.units {
            if let Some((position, (want, got))) = expected
                .iter()
                .zip(labels)
                .enumerate()
                .find(|(_, (want, got))| want != got)
            {
                return Err(Error::UnitOrderMismatch {
                    position: position + 1,
                    expected: want.to_string(),
                    actual: got.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Derives a neighbourhood matrix from polygon geometries.
pub trait AdjacencyBuilder {
    fn build(&self, polygons: &PolygonSet) -> Result<NeighbourMatrix>;
}

/// A matrix computed ahead of time and loaded from disk.
#[derive(Debug, Clone)]
pub struct PrecomputedAdjacency {
    matrix: NeighbourMatrix,
}

impl PrecomputedAdjacency {
    pub fn new(matrix: NeighbourMatrix) -> Self {
        PrecomputedAdjacency { matrix }
    }
}

impl AdjacencyBuilder for PrecomputedAdjacency {
    fn build(&self, polygons: &PolygonSet) -> Result<NeighbourMatrix> {
        self.matrix.check_unit_order(polygons.units())?;
        Ok(self.matrix.clone())
    }
}
