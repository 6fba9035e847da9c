use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decimal::{Arithmetic, Decimal};
use crate::error::{RecoveryError, Result};

/// Integer polynomial with non-negative coefficients.
///
/// `coefficients[i]` multiplies `x^i`; the last entry is the leading
/// coefficient and is never zero, so the degree is exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Polynomial {
    coefficients: Vec<u64>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<u64>) -> Result<Self> {
        match coefficients.last() {
            None => Err(RecoveryError::configuration(
                "a polynomial needs at least one coefficient",
            )),
            Some(0) => Err(RecoveryError::configuration(
                "the leading coefficient must be at least 1",
            )),
            Some(_) => Ok(Polynomial { coefficients }),
        }
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn coefficients(&self) -> &[u64] {
        &self.coefficients
    }

    pub fn evaluate(&self, x: &Decimal, arith: &Arithmetic) -> Decimal {
        evaluate(&self.coefficients, x, arith)
    }
}

impl fmt::Display for Polynomial {
    /// Highest power first, zero terms omitted: `3x^2 + x + 1`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self
            .coefficients
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, c)| **c != 0)
            .map(|(power, &c)| match (power, c) {
                (0, c) => c.to_string(),
                (1, 1) => "x".to_string(),
                (1, c) => format!("{}x", c),
                (p, 1) => format!("x^{}", p),
                (p, c) => format!("{}x^{}", c, p),
            })
            .collect();

        if terms.is_empty() {
            write!(f, "0")
        } else {
            write!(f, "{}", terms.join(" + "))
        }
    }
}

/// Evaluate a polynomial with Horner's method.
///
/// Starts from the leading coefficient and repeatedly multiplies by `x` and
/// adds the next lower coefficient. An empty coefficient list evaluates to
/// zero and a single coefficient is returned exactly, without rounding.
///
/// # Examples
///
/// ```
/// use polyrecover::decimal::{Arithmetic, Decimal};
/// use polyrecover::polynomial::evaluate;
///
/// let arith = Arithmetic::new(50).unwrap();
/// let x: Decimal = "0.5".parse().unwrap();
/// // 1 + 2x + 4x^2 at x = 0.5
/// assert_eq!(evaluate(&[1, 2, 4], &x, &arith).to_string(), "3");
/// ```
pub fn evaluate(coefficients: &[u64], x: &Decimal, arith: &Arithmetic) -> Decimal {
    let Some((&leading, lower)) = coefficients.split_last() else {
        return Decimal::zero();
    };

    let mut result = Decimal::from(leading);
    for &coefficient in lower.iter().rev() {
        result = arith.multiply(&result, x);
        if coefficient != 0 {
            result = arith.add(&result, &Decimal::from(coefficient));
        }
    }
    result
}

/// Evaluate as `Σ coefficients[i] · x^i`, one power at a time.
///
/// Slower than [`evaluate`]; kept as an independent cross-check.
pub fn evaluate_direct(coefficients: &[u64], x: &Decimal, arith: &Arithmetic) -> Result<Decimal> {
    let mut sum = Decimal::zero();
    for (power, &coefficient) in coefficients.iter().enumerate() {
        if coefficient == 0 {
            continue;
        }
        let term = arith.multiply(&Decimal::from(coefficient), &arith.power(x, power as i64)?);
        sum = arith.add(&sum, &term);
    }
    Ok(sum)
}

/// Parse a comma-separated coefficient list, constant term first.
///
/// `"1, 0, 3"` is `3x^2 + 1`, the same order search matches report.
pub fn parse_coefficients(input: &str) -> Result<Vec<u64>> {
    input
        .split(',')
        .map(|part| {
            let part = part.trim();
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(RecoveryError::parse(
                    part,
                    "all coefficients must be non-negative integers",
                ));
            }
            part.parse::<u64>()
                .map_err(|e| RecoveryError::parse(part, e.to_string()))
        })
        .collect()
}
