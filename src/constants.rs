use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::decimal::{Arithmetic, Decimal};
use crate::error::{RecoveryError, Result};

/// Digits carried past the session precision while summing series.
const SERIES_GUARD_DIGITS: u32 = 10;

/// Named constants the search can evaluate polynomials at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    /// Σ 10^(-n!) for n ≥ 1: 0.110001000000000000000001...
    Liouville,
    /// Σ 2^(-n!) for n ≥ 1: 0.765625059604644775390625...
    LiouvilleBase2,
    /// π − 3
    PiFrac,
    /// e − 2
    EFrac,
    /// 2^√2 − 2, the Gelfond–Schneider constant minus two
    GelfondFrac,
}

impl Constant {
    pub const ALL: [Constant; 5] = [
        Constant::Liouville,
        Constant::LiouvilleBase2,
        Constant::PiFrac,
        Constant::EFrac,
        Constant::GelfondFrac,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Constant::Liouville => "liouville",
            Constant::LiouvilleBase2 => "liouville_2",
            Constant::PiFrac => "pi_frac",
            Constant::EFrac => "e_frac",
            Constant::GelfondFrac => "gelfond_frac",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Constant::Liouville => "Liouville number in base 10: 0.110001000000000000000001...",
            Constant::LiouvilleBase2 => "Liouville number in base 2: 0.765625059604644775390625...",
            Constant::PiFrac => "fractional part of pi (pi - 3)",
            Constant::EFrac => "fractional part of e (e - 2)",
            Constant::GelfondFrac => "Gelfond-Schneider constant minus two (2^sqrt(2) - 2)",
        }
    }

    /// Decimal expansion rounded to the precision of `arith`.
    pub fn expand(&self, arith: &Arithmetic) -> Result<Decimal> {
        match self {
            Constant::Liouville => Ok(liouville(arith)),
            Constant::LiouvilleBase2 => Ok(liouville_base2(arith)),
            Constant::PiFrac => pi_frac(arith),
            Constant::EFrac => e_frac(arith),
            Constant::GelfondFrac => gelfond_frac(arith),
        }
    }
}

/// The point a session evaluates every candidate polynomial at.
///
/// Serialized as its key: `liouville`, `pi_frac_plus1`, or a literal such
/// as `0.5` for a custom value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EvaluationPoint {
    Named { constant: Constant, plus_one: bool },
    Custom(String),
}

impl Default for EvaluationPoint {
    fn default() -> Self {
        EvaluationPoint::Named {
            constant: Constant::Liouville,
            plus_one: false,
        }
    }
}

impl EvaluationPoint {
    /// Generate the point's value for a session.
    ///
    /// Named constants are computed to the session precision; custom values
    /// are taken exactly as written.
    pub fn value(&self, arith: &Arithmetic) -> Result<Decimal> {
        match self {
            EvaluationPoint::Named { constant, plus_one } => {
                let base = constant.expand(arith)?;
                if *plus_one {
                    Ok(arith.add(&base, &Decimal::one()))
                } else {
                    Ok(base)
                }
            }
            EvaluationPoint::Custom(text) => text.parse(),
        }
    }

    pub fn description(&self) -> String {
        match self {
            EvaluationPoint::Named {
                constant,
                plus_one: false,
            } => constant.description().to_string(),
            EvaluationPoint::Named {
                constant,
                plus_one: true,
            } => format!("1 + {}", constant.description()),
            EvaluationPoint::Custom(text) => format!("custom value {}", text),
        }
    }
}

impl fmt::Display for EvaluationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationPoint::Named { constant, plus_one } => {
                write!(f, "{}", constant.key())?;
                if *plus_one {
                    write!(f, "_plus1")?;
                }
                Ok(())
            }
            EvaluationPoint::Custom(text) => write!(f, "{}", text),
        }
    }
}

impl FromStr for EvaluationPoint {
    type Err = RecoveryError;

    fn from_str(input: &str) -> Result<Self> {
        let key = input.trim().to_lowercase();
        let (name, plus_one) = match key.strip_suffix("_plus1") {
            Some(name) => (name, true),
            None => (key.as_str(), false),
        };
        // older configuration files name it liouville_10
        let name = if name == "liouville_10" { "liouville" } else { name };

        if let Some(constant) = Constant::ALL.iter().find(|c| c.key() == name) {
            return Ok(EvaluationPoint::Named {
                constant: *constant,
                plus_one,
            });
        }

        input
            .trim()
            .parse::<Decimal>()
            .map_err(|_| RecoveryError::parse(input, "unknown constant or invalid decimal"))?;
        Ok(EvaluationPoint::Custom(input.trim().to_string()))
    }
}

impl TryFrom<String> for EvaluationPoint {
    type Error = RecoveryError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<EvaluationPoint> for String {
    fn from(point: EvaluationPoint) -> Self {
        point.to_string()
    }
}

/// Liouville's constant: sum of 10^(-n!) for every n with n! within the
/// precision. Only a dozen terms are ever needed since n! grows so fast.
pub fn liouville(arith: &Arithmetic) -> Decimal {
    let precision = arith.precision() as u64;
    let mut value = Decimal::zero();
    let mut factorial: u64 = 1;
    let mut n: u64 = 1;

    while factorial <= precision {
        value = arith.add(&value, &Decimal::power_of_ten(-(factorial as i64)));
        n += 1;
        factorial = match factorial.checked_mul(n) {
            Some(next) => next,
            None => break,
        };
    }

    value
}

/// Σ 2^(-n!), each term exact as `5^k × 10^-k`. Terms are kept while
/// `2^-k` still reaches the guard digits, i.e. `k·log10 2 ≤ precision + guard`.
pub fn liouville_base2(arith: &Arithmetic) -> Decimal {
    let inner = arith.widened(SERIES_GUARD_DIGITS);
    // log10 2 ≈ 0.30103
    let limit = (arith.precision() + SERIES_GUARD_DIGITS) as u64 * 100_000 / 30_103;
    let mut value = Decimal::zero();
    let mut factorial: u64 = 1;
    let mut n: u64 = 1;

    while factorial <= limit {
        let term = Decimal::new(BigInt::from(5u32).pow(factorial as u32), -(factorial as i64));
        value = inner.add(&value, &term);
        n += 1;
        factorial = match factorial.checked_mul(n) {
            Some(next) => next,
            None => break,
        };
    }

    arith.round(value)
}

fn series_cutoff(arith: &Arithmetic) -> Decimal {
    Decimal::power_of_ten(-((arith.precision() + SERIES_GUARD_DIGITS) as i64))
}

/// e − 2 = Σ_{k≥2} 1/k!
pub fn e_frac(arith: &Arithmetic) -> Result<Decimal> {
    let inner = arith.widened(SERIES_GUARD_DIGITS);
    let cutoff = series_cutoff(arith);
    let mut term = inner.divide(&Decimal::one(), &Decimal::from(2u64))?;
    let mut sum = Decimal::zero();
    let mut k: u64 = 2;

    while term.abs() > cutoff {
        sum = inner.add(&sum, &term);
        k += 1;
        term = inner.divide(&term, &Decimal::from(k))?;
    }

    Ok(arith.round(sum))
}

/// arctan(1/n) by its alternating Taylor series.
fn arctan_inverse(n: u64, inner: &Arithmetic, cutoff: &Decimal) -> Result<Decimal> {
    let n_squared = Decimal::from(n * n);
    let mut power = inner.divide(&Decimal::one(), &Decimal::from(n))?;
    let mut sum = Decimal::zero();
    let mut k: u64 = 0;

    while power > *cutoff {
        let term = inner.divide(&power, &Decimal::from(2 * k + 1))?;
        sum = if k % 2 == 0 {
            inner.add(&sum, &term)
        } else {
            inner.subtract(&sum, &term)
        };
        power = inner.divide(&power, &n_squared)?;
        k += 1;
    }

    Ok(sum)
}

/// π − 3 via Machin's formula π = 16·arctan(1/5) − 4·arctan(1/239).
pub fn pi_frac(arith: &Arithmetic) -> Result<Decimal> {
    let inner = arith.widened(SERIES_GUARD_DIGITS);
    let cutoff = series_cutoff(arith);
    let a = arctan_inverse(5, &inner, &cutoff)?;
    let b = arctan_inverse(239, &inner, &cutoff)?;
    let pi = inner.subtract(
        &inner.multiply(&Decimal::from(16u64), &a),
        &inner.multiply(&Decimal::from(4u64), &b),
    );
    Ok(arith.round(inner.subtract(&pi, &Decimal::from(3u64))))
}

/// ln 2 = Σ_{k≥1} 1/(k·2^k)
fn ln_two(inner: &Arithmetic, cutoff: &Decimal) -> Result<Decimal> {
    let half = inner.divide(&Decimal::one(), &Decimal::from(2u64))?;
    let mut power = half.clone();
    let mut sum = Decimal::zero();
    let mut k: u64 = 1;

    while power > *cutoff {
        sum = inner.add(&sum, &inner.divide(&power, &Decimal::from(k))?);
        power = inner.multiply(&power, &half);
        k += 1;
    }

    Ok(sum)
}

fn exp(y: &Decimal, inner: &Arithmetic, cutoff: &Decimal) -> Result<Decimal> {
    let mut term = Decimal::one();
    let mut sum = Decimal::zero();
    let mut k: u64 = 0;

    while term.abs() > *cutoff {
        sum = inner.add(&sum, &term);
        k += 1;
        term = inner.divide(&inner.multiply(&term, y), &Decimal::from(k))?;
    }

    Ok(sum)
}

/// 2^√2 − 2, computed as exp(√2 · ln 2) − 2.
pub fn gelfond_frac(arith: &Arithmetic) -> Result<Decimal> {
    let inner = arith.widened(SERIES_GUARD_DIGITS);
    let cutoff = series_cutoff(arith);
    let root_two = inner.sqrt(&Decimal::from(2u64))?;
    let exponent = inner.multiply(&root_two, &ln_two(&inner, &cutoff)?);
    let value = exp(&exponent, &inner, &cutoff)?;
    Ok(arith.round(inner.subtract(&value, &Decimal::from(2u64))))
}
