//! Exact rational arithmetic for probabilities, impacts, and thresholds.
//!
//! Probability is exact everywhere it is compared against a threshold (§9 "Rational
//! arithmetic"); floating point is only used for human-readable logging in
//! [`crate::result_print`]. We reuse `num-rational`'s `BigRational` rather than a fixed-width
//! fraction type because repeated `(1-p)*lo + p*hi` folds over deep trees can blow up
//! denominators past `i64` long before they blow up past what `BigInt` can hold.
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};
use std::fmt;
use std::str::FromStr;

pub type Rational = BigRational;

/// Parse a rational literal as it appears in DFL source: a decimal numeral (`0.13`) or a
/// fraction (`3/20`). Keyword-level grammar (`prob=...`) is the parser's job; this only handles
/// the numeral itself.
pub fn parse_rational(text: &str) -> Result<Rational, String> {
    let text = text.trim();
    if let Some((num, den)) = text.split_once('/') {
        let n = BigInt::from_str(num.trim())
            .map_err(|_| format!("`{text}` is not a valid rational: bad numerator"))?;
        let d = BigInt::from_str(den.trim())
            .map_err(|_| format!("`{text}` is not a valid rational: bad denominator"))?;
        if d.is_zero() {
            return Err(format!("`{text}` has a zero denominator"));
        }
        return Ok(Rational::new(n, d));
    }
    if let Some((int_part, frac_part)) = text.split_once('.') {
        let sign = if int_part.starts_with('-') { -1 } else { 1 };
        let int_part = int_part.trim_start_matches('-');
        let int_val = if int_part.is_empty() {
            BigInt::zero()
        } else {
            BigInt::from_str(int_part)
                .map_err(|_| format!("`{text}` is not a valid rational"))?
        };
        let frac_digits = frac_part.len() as u32;
        let frac_val = if frac_part.is_empty() {
            BigInt::zero()
        } else {
            BigInt::from_str(frac_part).map_err(|_| format!("`{text}` is not a valid rational"))?
        };
        let denom = BigInt::from(10u32).pow(frac_digits);
        let magnitude = Rational::new(int_val * &denom + frac_val, denom);
        return Ok(if sign < 0 { -magnitude } else { magnitude });
    }
    let n = BigInt::from_str(text).map_err(|_| format!("`{text}` is not a valid rational"))?;
    Ok(Rational::from_integer(n))
}

/// Render a rational as a decimal for human-facing output (logging, CLI result lines). Never
/// used for comparisons.
pub fn to_decimal_string(r: &Rational, digits: usize) -> String {
    let sign = if r.numer().is_zero() {
        ""
    } else if (r.numer() < &BigInt::zero()) != (r.denom() < &BigInt::zero()) {
        "-"
    } else {
        ""
    };
    let numer = r.numer().clone().abs();
    let denom = r.denom().clone().abs();
    let scale = BigInt::from(10u32).pow(digits as u32);
    let scaled = (numer * scale) / &denom;
    let s = scaled.to_string();
    let s = if s.len() <= digits {
        format!("{}{}", "0".repeat(digits - s.len() + 1), s)
    } else {
        s
    };
    let (int_part, frac_part) = s.split_at(s.len() - digits);
    if digits == 0 {
        format!("{sign}{int_part}")
    } else {
        format!("{sign}{int_part}.{frac_part}")
    }
}

pub fn zero() -> Rational {
    Rational::zero()
}

pub fn one() -> Rational {
    Rational::one()
}

/// Wrapper purely so call sites read `Prob(p)` instead of a bare rational when the value is
/// specifically a probability (kept in `[0, 1]` by construction of the evaluators, never
/// enforced by the type itself — see the §8 testable property `eval_prob(...) ∈ [0, 1]`, which
/// is checked by tests, not by this wrapper).
pub struct DisplayRational<'a>(pub &'a Rational);

impl fmt::Display for DisplayRational<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", to_decimal_string(self.0, 6))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_literals() {
        assert_eq!(parse_rational("0.10").unwrap(), Rational::new(1.into(), 10.into()));
        assert_eq!(parse_rational("0.13").unwrap(), Rational::new(13.into(), 100.into()));
        assert_eq!(parse_rational("1").unwrap(), Rational::from_integer(1.into()));
    }

    #[test]
    fn parses_fraction_literals() {
        assert_eq!(parse_rational("3/20").unwrap(), Rational::new(3.into(), 20.into()));
    }

    #[test]
    fn renders_decimal_strings() {
        let r = parse_rational("0.14").unwrap();
        assert_eq!(to_decimal_string(&r, 2), "0.14");
    }
}
