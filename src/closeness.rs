use std::fmt::Debug;

use crate::decimal::{Arithmetic, Decimal};
use crate::error::{RecoveryError, Result};

/// Decides whether an evaluation is close enough to the target to count as
/// a match.
pub trait ClosenessTest: Debug + Send {
    fn matches(&self, value: &Decimal, target: &Decimal) -> bool;

    /// Half-width of the acceptance window around the target. Any match lies
    /// within `[target - radius, target + radius]`, which is what region
    /// pruning tests against.
    fn acceptance_radius(&self) -> Decimal;

    fn describe(&self) -> String;
}

/// Match when `|value - target| < epsilon`, strictly.
#[derive(Debug, Clone)]
pub struct EpsilonCloseness {
    epsilon: Decimal,
    arith: Arithmetic,
}

impl EpsilonCloseness {
    pub fn new(epsilon: Decimal, arith: Arithmetic) -> Result<Self> {
        if !epsilon.is_positive() {
            return Err(RecoveryError::configuration(format!(
                "epsilon must be positive, got {}",
                epsilon
            )));
        }
        Ok(EpsilonCloseness { epsilon, arith })
    }
}

impl ClosenessTest for EpsilonCloseness {
    fn matches(&self, value: &Decimal, target: &Decimal) -> bool {
        let difference = self.arith.abs(&self.arith.subtract(value, target));
        self.arith.less_than(&difference, &self.epsilon)
    }

    fn acceptance_radius(&self) -> Decimal {
        self.epsilon.clone()
    }

    fn describe(&self) -> String {
        format!("|P(x) - target| < {}", self.epsilon)
    }
}

/// Match when both values agree on their first `digits` decimal places
/// after the point, compared as plain decimal strings.
#[derive(Debug, Clone, Copy)]
pub struct ExactDigitCloseness {
    digits: u32,
}

impl ExactDigitCloseness {
    pub fn new(digits: u32) -> Self {
        ExactDigitCloseness { digits }
    }
}

impl ClosenessTest for ExactDigitCloseness {
    fn matches(&self, value: &Decimal, target: &Decimal) -> bool {
        matches_to_digits(&value.to_string(), &target.to_string(), self.digits as usize)
    }

    /// Two numbers sharing the integer part and `digits` decimals differ by
    /// less than `10^-digits`.
    fn acceptance_radius(&self) -> Decimal {
        Decimal::power_of_ten(-(self.digits as i64))
    }

    fn describe(&self) -> String {
        format!("first {} decimal places identical", self.digits)
    }
}

/// Compare two plain decimal strings up to `digits` places after the point.
/// Missing decimals count as zeros.
pub fn matches_to_digits(value: &str, target: &str, digits: usize) -> bool {
    fn split(text: &str, digits: usize) -> (&str, String) {
        let (integer, fraction) = text.split_once('.').unwrap_or((text, ""));
        let mut places: String = fraction.chars().take(digits).collect();
        while places.len() < digits {
            places.push('0');
        }
        (integer, places)
    }

    split(value, digits) == split(target, digits)
}

/// Decimal places an epsilon effectively demands, `⌊-log10 ε⌋`, never
/// below zero.
pub fn epsilon_digits(epsilon: &Decimal) -> u32 {
    if !epsilon.is_positive() {
        return 0;
    }
    let order = epsilon.order_of_magnitude();
    let ceil_log10 = if epsilon.is_power_of_ten() { order } else { order + 1 };
    u32::try_from(-ceil_log10).unwrap_or(0)
}
