use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Signed, Zero};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{RecoveryError, Result};

/// Extra digits carried by composite operations (power, sqrt) before the
/// final rounding to the session precision.
const GUARD_DIGITS: u32 = 10;

/// Largest power-of-ten exponent accepted in scientific notation. Far beyond
/// anything a 200-digit search can tell apart, yet small enough to keep every
/// alignment shift cheap.
pub const MAX_EXPONENT: i64 = 10_000;

/// Exact decimal value `mantissa × 10^exponent`.
///
/// Values are kept normalized (no trailing zeros in the mantissa, zero has
/// exponent 0), so two equal values always share one representation. A
/// `Decimal` on its own never rounds: parsing and construction are exact and
/// only the operations of [`Arithmetic`] round to a precision.
#[derive(Debug, Clone)]
pub struct Decimal {
    mantissa: BigInt,
    exponent: i64,
}

fn pow10(exponent: u32) -> BigInt {
    BigInt::from(10u32).pow(exponent)
}

/// A non-negative decimal shift as a `pow` exponent.
fn digit_shift(shift: i64) -> Result<u32> {
    u32::try_from(shift)
        .map_err(|_| RecoveryError::arithmetic(format!("decimal shift of {} out of range", shift)))
}

fn digit_count(value: &BigUint) -> usize {
    if value.is_zero() {
        return 1;
    }
    // 2^(bits-1) <= value, so this never overshoots floor(log10 value)
    let estimate = ((value.bits() - 1) as f64 * std::f64::consts::LOG10_2) as u32;
    let mut count = estimate.saturating_sub(1);
    let mut next_power = BigUint::from(10u32).pow(count + 1);
    while *value >= next_power {
        count += 1;
        next_power *= 10u32;
    }
    count as usize + 1
}

impl Decimal {
    pub fn new(mantissa: BigInt, exponent: i64) -> Self {
        Decimal { mantissa, exponent }.normalize()
    }

    pub fn zero() -> Self {
        Decimal {
            mantissa: BigInt::zero(),
            exponent: 0,
        }
    }

    pub fn one() -> Self {
        Decimal {
            mantissa: BigInt::one(),
            exponent: 0,
        }
    }

    /// Exactly `10^exponent`.
    pub fn power_of_ten(exponent: i64) -> Self {
        Decimal {
            mantissa: BigInt::one(),
            exponent,
        }
    }

    pub fn from_integer(value: BigInt) -> Self {
        Decimal::new(value, 0)
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa.is_negative()
    }

    pub fn is_positive(&self) -> bool {
        self.mantissa.is_positive()
    }

    pub fn abs(&self) -> Decimal {
        Decimal {
            mantissa: self.mantissa.abs(),
            exponent: self.exponent,
        }
    }

    pub fn negated(&self) -> Decimal {
        Decimal {
            mantissa: -&self.mantissa,
            exponent: self.exponent,
        }
    }

    /// Number of significant digits in the mantissa.
    pub fn significant_digits(&self) -> usize {
        if self.is_zero() {
            return 1;
        }
        digit_count(self.mantissa.magnitude())
    }

    /// ⌊log10 |value|⌋, meaningful for non-zero values.
    pub fn order_of_magnitude(&self) -> i64 {
        self.exponent + self.significant_digits() as i64 - 1
    }

    /// True for exactly `10^n`, any integer `n`.
    pub fn is_power_of_ten(&self) -> bool {
        self.mantissa.is_one()
    }

    /// Smallest integer greater than or equal to this value.
    pub fn ceil(&self) -> Result<BigInt> {
        if self.exponent >= 0 {
            return Ok(&self.mantissa * pow10(digit_shift(self.exponent)?));
        }
        let divisor = pow10(digit_shift(-self.exponent)?);
        let quotient = &self.mantissa / &divisor;
        let remainder = &self.mantissa % &divisor;
        if remainder.is_positive() {
            Ok(quotient + 1)
        } else {
            Ok(quotient)
        }
    }

    fn normalize(mut self) -> Self {
        if self.mantissa.is_zero() {
            self.exponent = 0;
            return self;
        }
        // 10^k divides the mantissa only if 2^k does
        let limit = self.mantissa.magnitude().trailing_zeros().unwrap_or(0);
        let ten = BigInt::from(10u32);
        let mut stripped = 0;
        while stripped < limit && (&self.mantissa % &ten).is_zero() {
            self.mantissa /= &ten;
            self.exponent += 1;
            stripped += 1;
        }
        self
    }

    /// Round to `precision` significant digits, ties away from zero.
    fn rounded(self, precision: u32) -> Self {
        if self.mantissa.is_zero() {
            return self;
        }
        let (sign, magnitude) = self.mantissa.into_parts();
        let digits = digit_count(&magnitude);
        let precision = precision as usize;
        if digits <= precision {
            return Decimal::new(BigInt::from_biguint(sign, magnitude), self.exponent);
        }

        let dropped = (digits - precision) as u32;
        let divisor = BigUint::from(10u32).pow(dropped);
        let mut kept = &magnitude / &divisor;
        let remainder = &magnitude % &divisor;
        if remainder * 2u32 >= divisor {
            kept += 1u32;
        }
        Decimal::new(
            BigInt::from_biguint(sign, kept),
            self.exponent + dropped as i64,
        )
    }

    fn aligned(a: &Decimal, b: &Decimal) -> Result<(BigInt, BigInt, i64)> {
        let exponent = a.exponent.min(b.exponent);
        let left = &a.mantissa * pow10(digit_shift(a.exponent - exponent)?);
        let right = &b.mantissa * pow10(digit_shift(b.exponent - exponent)?);
        Ok((left, right, exponent))
    }

    /// Exact sum, except that an addend lying wholly below both the last
    /// digit of the other and its rounding position at `precision` digits is
    /// replaced by a unit one place further down with the same sign. The
    /// rounded sum is unchanged and the alignment shift stays near
    /// `precision` however far apart the exponents are.
    fn sum_for_rounding(a: &Decimal, b: &Decimal, precision: u32) -> Decimal {
        if a.is_zero() {
            return b.clone();
        }
        if b.is_zero() {
            return a.clone();
        }
        let (large, small) = if a.order_of_magnitude() >= b.order_of_magnitude() {
            (a, b)
        } else {
            (b, a)
        };
        let floor = large
            .exponent
            .min(large.order_of_magnitude() - precision as i64)
            - 1;
        let sticky;
        let small = if small.order_of_magnitude() < floor {
            sticky = Decimal {
                mantissa: small.mantissa.signum(),
                exponent: floor - 1,
            };
            &sticky
        } else {
            small
        };

        match Decimal::aligned(large, small) {
            Ok((left, right, exponent)) => Decimal::new(left + right, exponent),
            // unreachable: the remaining shift is bounded by the digits of `small`
            Err(_) => large.clone(),
        }
    }

    fn exact_mul(a: &Decimal, b: &Decimal) -> Decimal {
        Decimal::new(&a.mantissa * &b.mantissa, a.exponent + b.exponent)
    }
}

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        Decimal::from_integer(BigInt::from(value))
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal::from_integer(BigInt::from(value))
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let (left_sign, right_sign) = (self.mantissa.sign(), other.mantissa.sign());
        if left_sign != right_sign {
            return left_sign.cmp(&right_sign);
        }
        if left_sign == Sign::NoSign {
            return Ordering::Equal;
        }
        let by_magnitude = self.order_of_magnitude().cmp(&other.order_of_magnitude());
        if by_magnitude != Ordering::Equal {
            return match left_sign {
                Sign::Minus => by_magnitude.reverse(),
                _ => by_magnitude,
            };
        }
        // same leading digit position: the shift is at most the longer mantissa
        match Decimal::aligned(self, other) {
            Ok((left, right, _)) => left.cmp(&right),
            Err(_) => Ordering::Equal,
        }
    }
}

impl FromStr for Decimal {
    type Err = RecoveryError;

    /// Parses plain (`-12.5`) or scientific (`1.5e-3`) notation exactly.
    fn from_str(input: &str) -> Result<Self> {
        let text = input.trim();
        let (negative, body) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };

        let (number, exponent) = match body.find(|c: char| c == 'e' || c == 'E') {
            Some(index) => {
                let exponent = body[index + 1..]
                    .parse::<i64>()
                    .map_err(|_| RecoveryError::parse(input, "invalid exponent"))?;
                if exponent.unsigned_abs() > MAX_EXPONENT as u64 {
                    return Err(RecoveryError::parse(
                        input,
                        format!("exponent outside ±{}", MAX_EXPONENT),
                    ));
                }
                (&body[..index], exponent)
            }
            None => (body, 0),
        };

        let (integer_part, fraction_part) = number.split_once('.').unwrap_or((number, ""));
        if integer_part.is_empty() && fraction_part.is_empty() {
            return Err(RecoveryError::parse(input, "no digits"));
        }
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(integer_part) || !all_digits(fraction_part) {
            return Err(RecoveryError::parse(input, "not a decimal number"));
        }

        let digits = format!("{}{}", integer_part, fraction_part);
        let magnitude = BigInt::parse_bytes(digits.as_bytes(), 10)
            .ok_or_else(|| RecoveryError::parse(input, "not a decimal number"))?;
        let mantissa = if negative { -magnitude } else { magnitude };

        Ok(Decimal::new(mantissa, exponent - fraction_part.len() as i64))
    }
}

impl fmt::Display for Decimal {
    /// Plain positional notation, never scientific.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let digits = self.mantissa.magnitude().to_string();

        if self.exponent >= 0 {
            let zeros = "0".repeat(self.exponent as usize);
            return write!(f, "{}{}{}", sign, digits, zeros);
        }

        let scale = self.exponent.unsigned_abs() as usize;
        if digits.len() > scale {
            let (integer, fraction) = digits.split_at(digits.len() - scale);
            write!(f, "{}{}.{}", sign, integer, fraction)
        } else {
            let padding = "0".repeat(scale - digits.len());
            write!(f, "{}0.{}{}", sign, padding, digits)
        }
    }
}

/// Precision-bound arithmetic over [`Decimal`].
///
/// Every result is rounded to `precision` significant digits. The search
/// session builds one of these when it starts and routes all of its
/// arithmetic through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arithmetic {
    precision: u32,
}

impl Arithmetic {
    pub fn new(precision: u32) -> Result<Self> {
        if precision == 0 {
            return Err(RecoveryError::arithmetic(
                "precision must be at least one significant digit",
            ));
        }
        Ok(Arithmetic { precision })
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Same arithmetic with `extra` additional digits, for intermediate work.
    pub fn widened(&self, extra: u32) -> Arithmetic {
        Arithmetic {
            precision: self.precision + extra,
        }
    }

    pub fn round(&self, value: Decimal) -> Decimal {
        value.rounded(self.precision)
    }

    pub fn add(&self, a: &Decimal, b: &Decimal) -> Decimal {
        self.round(Decimal::sum_for_rounding(a, b, self.precision))
    }

    pub fn subtract(&self, a: &Decimal, b: &Decimal) -> Decimal {
        self.round(Decimal::sum_for_rounding(a, &b.negated(), self.precision))
    }

    pub fn multiply(&self, a: &Decimal, b: &Decimal) -> Decimal {
        self.round(Decimal::exact_mul(a, b))
    }

    pub fn divide(&self, a: &Decimal, b: &Decimal) -> Result<Decimal> {
        if b.is_zero() {
            return Err(RecoveryError::arithmetic("division by zero"));
        }
        if a.is_zero() {
            return Ok(Decimal::zero());
        }

        // Enough quotient digits for a correctly rounded result.
        let shift = (self.precision as i64 + b.significant_digits() as i64
            - a.significant_digits() as i64
            + 2)
            .max(0);
        let numerator = &a.mantissa * pow10(digit_shift(shift)?);
        let quotient = numerator / &b.mantissa;
        Ok(self.round(Decimal::new(quotient, a.exponent - b.exponent - shift)))
    }

    /// `base^n` for any integer `n`; negative powers go through division.
    pub fn power(&self, base: &Decimal, n: i64) -> Result<Decimal> {
        let inner = self.widened(GUARD_DIGITS);
        let mut result = Decimal::one();
        let mut square = base.clone();
        let mut remaining = n.unsigned_abs();
        while remaining > 0 {
            if remaining & 1 == 1 {
                result = inner.multiply(&result, &square);
            }
            remaining >>= 1;
            if remaining > 0 {
                square = inner.multiply(&square, &square);
            }
        }

        if n < 0 {
            if result.is_zero() {
                return Err(RecoveryError::arithmetic("zero raised to a negative power"));
            }
            result = inner.divide(&Decimal::one(), &result)?;
        }
        Ok(self.round(result))
    }

    pub fn sqrt(&self, value: &Decimal) -> Result<Decimal> {
        if value.is_negative() {
            return Err(RecoveryError::arithmetic(format!(
                "square root of negative value {}",
                value
            )));
        }
        if value.is_zero() {
            return Ok(Decimal::zero());
        }

        // Scale the mantissa so its integer square root carries enough digits
        // and the remaining exponent is even.
        let wanted = 2 * (self.precision + GUARD_DIGITS) as i64;
        let mut shift = (wanted - value.significant_digits() as i64).max(0);
        if (value.exponent - shift) % 2 != 0 {
            shift += 1;
        }
        let scaled = value.mantissa.magnitude() * BigUint::from(10u32).pow(digit_shift(shift)?);
        let root = BigInt::from(scaled.sqrt());
        Ok(self.round(Decimal::new(root, (value.exponent - shift) / 2)))
    }

    pub fn abs(&self, value: &Decimal) -> Decimal {
        self.round(value.abs())
    }

    pub fn less_than(&self, a: &Decimal, b: &Decimal) -> bool {
        a < b
    }
}
