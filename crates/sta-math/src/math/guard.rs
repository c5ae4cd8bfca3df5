//! Guarded arithmetic for sparse count data.
//!
//! Rates are undefined when the denominator is absent or non-positive and
//! logs are undefined at zero. These helpers return `None` in those cases
//! rather than producing `inf`/`NaN` or an error.

/// `numerator / denominator`, or `None` unless the denominator is positive
/// and both values are finite.
pub fn safe_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if !numerator.is_finite() || !denominator.is_finite() || denominator <= 0.0 {
        return None;
    }
    Some(numerator / denominator)
}

/// Natural log, or `None` for zero, negative, or non-finite input.
pub fn safe_ln(x: f64) -> Option<f64> {
    if !x.is_finite() || x <= 0.0 {
        return None;
    }
    Some(x.ln())
}

/// Case count divided by population.
///
/// `None` when either side is absent or the population is zero.
pub fn prevalence(cases: Option<u64>, population: Option<u64>) -> Option<f64> {
    let cases = cases?;
    let population = population?;
    if population == 0 {
        return None;
    }
    Some(cases as f64 / population as f64)
}

/// `ln(prevalence)`; `None` when the prevalence is absent or zero.
pub fn log_prevalence(prevalence: Option<f64>) -> Option<f64> {
    safe_ln(prevalence?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_ratio() {
        assert_eq!(safe_ratio(10.0, 100.0), Some(0.1));
        assert_eq!(safe_ratio(1.0, 0.0), None);
        assert_eq!(safe_ratio(1.0, -5.0), None);
        assert_eq!(safe_ratio(f64::NAN, 2.0), None);
        assert_eq!(safe_ratio(1.0, f64::INFINITY), None);
    }

    #[test]
    fn test_safe_ln() {
        assert_eq!(safe_ln(1.0), Some(0.0));
        assert_eq!(safe_ln(0.0), None);
        assert_eq!(safe_ln(-1.0), None);
        assert_eq!(safe_ln(f64::NAN), None);
    }

    #[test]
    fn test_prevalence() {
        assert_eq!(prevalence(Some(10), Some(100)), Some(0.1));
        assert_eq!(prevalence(Some(0), Some(100)), Some(0.0));
        assert_eq!(prevalence(None, Some(100)), None);
        assert_eq!(prevalence(Some(3), None), None);
        assert_eq!(prevalence(Some(3), Some(0)), None);
    }

    #[test]
    fn test_log_prevalence() {
        let p = prevalence(Some(10), Some(100));
        let lp = log_prevalence(p).unwrap();
        assert!((lp - 0.1_f64.ln()).abs() < 1e-15);
        assert_eq!(log_prevalence(Some(0.0)), None);
        assert_eq!(log_prevalence(None), None);
    }
}
