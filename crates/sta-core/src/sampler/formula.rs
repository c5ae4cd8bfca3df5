//! Model formulas: `response ~ term + term + offset(log(column))`.
//!
//! Supported right-hand side terms:
//! - a column name (linear term)
//! - `offset(column)` or `offset(log(column))`, at most once
//! - `1` / `+1` keeps the intercept (the default); `0`, `+0` or `-1`
//!   removes it
//!
//! Interactions, transformations other than the offset log, and removing
//! named terms are not supported.

use serde::{Deserialize, Serialize};
use sta_common::Error;
use std::fmt;
use std::str::FromStr;

/// An offset term, entered into the linear predictor with coefficient 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetTerm {
    pub column: String,
    /// Whether the column is log-transformed.
    pub log: bool,
}

impl fmt::Display for OffsetTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.log {
            write!(f, "offset(log({}))", self.column)
        } else {
            write!(f, "offset({})", self.column)
        }
    }
}

/// A parsed model formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
    pub response: String,
    /// Linear terms, in formula order.
    pub terms: Vec<String>,
    pub offset: Option<OffsetTerm>,
    pub intercept: bool,
}

impl Formula {
    /// Design matrix column names: `(Intercept)` first when present.
    pub fn design_columns(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(self.terms.len() + 1);
        if self.intercept {
            columns.push(INTERCEPT.to_string());
        }
        columns.extend(self.terms.iter().cloned());
        columns
    }
}

/// Name of the intercept column in the design matrix.
pub const INTERCEPT: &str = "(Intercept)";

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidFormula(message.into())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Strip `name(` ... `)` around `s`, returning the inner text.
fn call_argument<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    let rest = s.strip_prefix(name)?.trim_start();
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    Some(inner.trim())
}

fn parse_offset(term: &str) -> Result<OffsetTerm, Error> {
    let inner = call_argument(term, "offset").ok_or_else(|| invalid(format!("malformed term '{}'", term)))?;
    let (column, log) = match call_argument(inner, "log") {
        Some(column) => (column, true),
        None => (inner, false),
    };
    if !is_identifier(column) {
        return Err(invalid(format!("offset needs a column name, got '{}'", column)));
    }
    Ok(OffsetTerm {
        column: column.to_string(),
        log,
    })
}

/// Split on `+` / `-` outside parentheses, keeping each term's sign.
fn split_terms(rhs: &str) -> Result<Vec<(bool, String)>, Error> {
    let mut terms = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    let mut negative = false;

    for c in rhs.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(invalid("unbalanced parentheses"));
                }
                current.push(c);
            }
            '+' | '-' if depth == 0 => {
                terms.push((negative, current.trim().to_string()));
                current.clear();
                negative = c == '-';
            }
            _ => current.push(c),
        }
    }
    if depth != 0 {
        return Err(invalid("unbalanced parentheses"));
    }
    terms.push((negative, current.trim().to_string()));

    // A leading sign leaves an empty first piece.
    if terms.first().is_some_and(|(neg, t)| !neg && t.is_empty()) && terms.len() > 1 {
        terms.remove(0);
    }
    Ok(terms)
}

impl FromStr for Formula {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lhs, rhs) = s
            .split_once('~')
            .ok_or_else(|| invalid("formula must contain '~'"))?;
        if rhs.contains('~') {
            return Err(invalid("formula must contain exactly one '~'"));
        }
        let response = lhs.trim();
        if !is_identifier(response) {
            return Err(invalid(format!("response must be a column name, got '{}'", response)));
        }

        let mut formula = Formula {
            response: response.to_string(),
            terms: Vec::new(),
            offset: None,
            intercept: true,
        };

        for (negative, term) in split_terms(rhs)? {
            match (negative, term.as_str()) {
                (_, "") => return Err(invalid("empty term")),
                (false, "1") => formula.intercept = true,
                (false, "0") | (true, "1") => formula.intercept = false,
                (true, other) => {
                    return Err(invalid(format!("cannot remove term '{}'", other)));
                }
                (false, t) if call_argument(t, "offset").is_some() => {
                    if formula.offset.is_some() {
                        return Err(invalid("at most one offset term is allowed"));
                    }
                    formula.offset = Some(parse_offset(t)?);
                }
                (false, t) if is_identifier(t) => {
                    if t == formula.response {
                        return Err(invalid(format!("response '{}' used as a term", t)));
                    }
                    if formula.terms.iter().any(|existing| existing == t) {
                        return Err(invalid(format!("term '{}' repeated", t)));
                    }
                    formula.terms.push(t.to_string());
                }
                (false, t) => return Err(invalid(format!("unsupported term '{}'", t))),
            }
        }

        Ok(formula)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rhs: Vec<String> = Vec::new();
        if let Some(offset) = &self.offset {
            rhs.push(offset.to_string());
        }
        rhs.extend(self.terms.iter().cloned());
        if rhs.is_empty() {
            let constant = if self.intercept { "1" } else { "0" };
            return write!(f, "{} ~ {}", self.response, constant);
        }
        write!(f, "{} ~ {}", self.response, rhs.join(" + "))?;
        if !self.intercept {
            write!(f, " - 1")?;
        }
        Ok(())
    }
}
