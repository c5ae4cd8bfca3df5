//! CSV loaders for the input tables.
//!
//! Conventions shared by every loader:
//! - the first row is a header; columns are found by name, so order and
//!   extra columns do not matter
//! - an empty field or `NA` is an absent value
//! - dates are ISO-8601 (`YYYY-MM-DD`)
//! - errors carry the source name and the 1-based line number

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use sta_common::{Error, Result, UnitCode};
use std::io::Read;

use super::{CovariateTable, Observation, Roster, SpatialUnit};
use crate::adjacency::NeighbourMatrix;
use crate::compare::{Prediction, PredictionTable};

const CODE_COLUMN: &str = "code";

fn reader<R: Read>(input: R, has_headers: bool) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(has_headers)
        .trim(Trim::All)
        .flexible(false)
        .from_reader(input)
}

fn line_of(record: &StringRecord) -> Option<u64> {
    record.position().map(|p| p.line())
}

fn csv_error(source: &str, err: csv::Error) -> Error {
    let line = err.position().map(|p| p.line());
    Error::parse(source, line, err.to_string())
}

fn column_index(headers: &StringRecord, name: &str, source: &str) -> Result<usize> {
    optional_column_index(headers, name)
        .ok_or_else(|| Error::parse(source, Some(1), format!("missing required column '{}'", name)))
}

fn optional_column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

fn is_absent(field: &str) -> bool {
    field.is_empty() || field.eq_ignore_ascii_case("na")
}

fn parse_code(record: &StringRecord, idx: usize, source: &str) -> Result<UnitCode> {
    let field = record.get(idx).unwrap_or("");
    if is_absent(field) {
        return Err(Error::parse(source, line_of(record), "empty unit code"));
    }
    Ok(UnitCode::from(field))
}

fn parse_date(record: &StringRecord, idx: usize, source: &str) -> Result<NaiveDate> {
    let field = record.get(idx).unwrap_or("");
    NaiveDate::parse_from_str(field, "%Y-%m-%d").map_err(|e| {
        Error::parse(source, line_of(record), format!("invalid date '{}': {}", field, e))
    })
}

/// Counts may be written as `12` or `12.0`; anything fractional or negative
/// is rejected.
fn parse_count(record: &StringRecord, idx: usize, column: &str, source: &str) -> Result<Option<u64>> {
    let field = record.get(idx).unwrap_or("");
    if is_absent(field) {
        return Ok(None);
    }
    if let Ok(v) = field.parse::<u64>() {
        return Ok(Some(v));
    }
    match field.parse::<f64>() {
        Ok(v) if v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 => Ok(Some(v as u64)),
        _ => Err(Error::parse(
            source,
            line_of(record),
            format!("{} must be a non-negative integer, got '{}'", column, field),
        )),
    }
}

fn parse_number(field: &str, column: &str, line: Option<u64>, source: &str) -> Result<Option<f64>> {
    if is_absent(field) {
        return Ok(None);
    }
    match field.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(Error::parse(
            source,
            line,
            format!("{} must be a finite number, got '{}'", column, field),
        )),
    }
}

/// Read case observations: `code,date,cases[,population]`.
pub fn read_observations<R: Read>(input: R, source: &str) -> Result<Vec<Observation>> {
    let mut rdr = reader(input, true);
    let headers = rdr.headers().map_err(|e| csv_error(source, e))?.clone();
    let code_idx = column_index(&headers, CODE_COLUMN, source)?;
    let date_idx = column_index(&headers, "date", source)?;
    let cases_idx = column_index(&headers, "cases", source)?;
    let population_idx = optional_column_index(&headers, "population");

    let mut observations = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| csv_error(source, e))?;
        let population = match population_idx {
            Some(idx) => parse_count(&record, idx, "population", source)?,
            None => None,
        };
        observations.push(Observation {
            unit: parse_code(&record, code_idx, source)?,
            date: parse_date(&record, date_idx, source)?,
            cases: parse_count(&record, cases_idx, "cases", source)?,
            population,
        });
    }
    Ok(observations)
}

/// Read the population roster: `code,population`.
pub fn read_roster<R: Read>(input: R, source: &str) -> Result<Roster> {
    let mut rdr = reader(input, true);
    let headers = rdr.headers().map_err(|e| csv_error(source, e))?.clone();
    let code_idx = column_index(&headers, CODE_COLUMN, source)?;
    let population_idx = column_index(&headers, "population", source)?;

    let mut units = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| csv_error(source, e))?;
        let code = parse_code(&record, code_idx, source)?;
        let population = parse_count(&record, population_idx, "population", source)?
            .ok_or_else(|| {
                Error::parse(source, line_of(&record), format!("population missing for {}", code))
            })?;
        units.push(SpatialUnit { code, population });
    }
    Roster::new(units)
}

/// Read per-unit covariates: `code,<name>,<name>,...`.
///
/// Every column other than `code` is a numeric covariate.
pub fn read_covariates<R: Read>(input: R, source: &str) -> Result<CovariateTable> {
    let mut rdr = reader(input, true);
    let headers = rdr.headers().map_err(|e| csv_error(source, e))?.clone();
    let code_idx = column_index(&headers, CODE_COLUMN, source)?;
    let columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != code_idx)
        .map(|(i, name)| (i, name.to_string()))
        .collect();

    let mut table = CovariateTable::new(columns.iter().map(|(_, n)| n.clone()).collect());
    for record in rdr.records() {
        let record = record.map_err(|e| csv_error(source, e))?;
        let code = parse_code(&record, code_idx, source)?;
        let line = line_of(&record);
        let values = columns
            .iter()
            .map(|(i, name)| parse_number(record.get(*i).unwrap_or(""), name, line, source))
            .collect::<Result<Vec<_>>>()?;
        table.insert(code, values)?;
    }
    Ok(table)
}

/// Read a prediction table: `code,date,value`.
pub fn read_predictions<R: Read>(input: R, source: &str, name: &str) -> Result<PredictionTable> {
    let mut rdr = reader(input, true);
    let headers = rdr.headers().map_err(|e| csv_error(source, e))?.clone();
    let code_idx = column_index(&headers, CODE_COLUMN, source)?;
    let date_idx = column_index(&headers, "date", source)?;
    let value_idx = column_index(&headers, "value", source)?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| csv_error(source, e))?;
        let line = line_of(&record);
        let value = parse_number(record.get(value_idx).unwrap_or(""), "value", line, source)?
            .ok_or_else(|| Error::parse(source, line, "value missing"))?;
        rows.push(Prediction {
            unit: parse_code(&record, code_idx, source)?,
            date: parse_date(&record, date_idx, source)?,
            value,
        });
    }
    Ok(PredictionTable::new(name, rows))
}

/// Read a square 0/1 neighbourhood matrix.
///
/// The first row holds unit labels when the file has one more row than it
/// has columns, so numeric area codes such as `101` or `0` still read as
/// labels. A first row with a non-numeric cell is also taken as labels.
pub fn read_neighbour_matrix<R: Read>(input: R, source: &str) -> Result<NeighbourMatrix> {
    let mut rdr = reader(input, false);
    let records = rdr
        .records()
        .collect::<std::result::Result<Vec<StringRecord>, _>>()
        .map_err(|e| csv_error(source, e))?;

    let width = records.first().map_or(0, |r| r.len());
    let has_labels = records.first().is_some_and(|first| {
        records.len() == width + 1 || first.iter().any(|f| f.parse::<f64>().is_err())
    });

    let mut body = records.iter();
    let labels = if has_labels {
        body.next()
            .map(|first| first.iter().map(UnitCode::from).collect::<Vec<_>>())
    } else {
        None
    };

    let rows = body
        .map(|record| {
            record
                .iter()
                .map(|f| match f {
                    "0" | "0.0" => Ok(0),
                    "1" | "1.0" => Ok(1),
                    other => Err(Error::parse(
                        source,
                        line_of(record),
                        format!("matrix entries must be 0 or 1, got '{}'", other),
                    )),
                })
                .collect::<Result<Vec<u8>>>()
        })
        .collect::<Result<Vec<Vec<u8>>>>()?;

    NeighbourMatrix::from_rows(rows, labels)
}
