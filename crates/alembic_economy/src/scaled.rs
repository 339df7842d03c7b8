//! # Scaled Numbers
//!
//! **Mantissa + exponent quantities for numbers that outgrow `f64`.**
//!
//! Idle-game stockpiles routinely pass 1e308 and keep going. A `ScaledNumber`
//! stores a normalized mantissa in `[1, 10)` and an `i64` power of ten, so the
//! representable range is bounded by the exponent, not by IEEE 754.
//!
//! ## Domain
//!
//! Resources are never negative. Negative, NaN and infinite inputs are rejected
//! at construction with [`EconomyError::InvalidMagnitude`]; subtraction either
//! fails with [`EconomyError::Underflow`] or saturates at zero.
//!
//! ## Precision Policy
//!
//! When two operands differ by more than [`PRECISION_GAP`] orders of magnitude,
//! the smaller one cannot change a single significant digit of the larger, so
//! `add`/`sub` return the larger operand untouched. Inside the gap, small
//! operands are combined natively (where `f64` powers of ten are exact) and
//! large ones by aligning the smaller mantissa onto the larger exponent.
//!
//! ## Text Form
//!
//! `Display`/`FromStr` use a lossless `"<mantissa>e<exponent>"` form
//! (`"1.23456789e45"`). Human-facing output goes through [`ScaledNumber::format`].

use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{EconomyError, EconomyResult};

/// Orders of magnitude beyond which the smaller operand of `add`/`sub` is negligible.
///
/// Matches the ~17 significant decimal digits an `f64` mantissa can carry.
pub const PRECISION_GAP: i64 = 17;

/// Default exponent at which `format` switches from suffixes to scientific notation.
pub const DEFAULT_SCIENTIFIC_CEILING: i64 = 303;

/// Default number of decimals shown by `format`.
pub const DEFAULT_PRECISION: usize = 2;

/// Largest exponent (in magnitude) for which arithmetic runs on native `f64`.
///
/// Within this window every power of ten is exact and integers are exact,
/// so native addition loses nothing compared to mantissa alignment.
const NATIVE_EXPONENT_LIMIT: i64 = 15;

/// Largest power of ten applied in a single scaling step.
const MAX_POW10_STEP: i64 = 300;

/// Most decimals `format` will render.
const MAX_PRECISION: usize = 15;

/// Nudge applied before truncation so `2.9999999999` renders as `3.00`.
const TRUNCATION_EPSILON: f64 = 1e-9;

/// Exactly representable powers of ten.
const EXACT_POW10: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15,
    1e16, 1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

/// Named suffixes, indexed by thousands-group (`1e3^index`).
const NAMED_SUFFIXES: [&str; 12] = [
    "", "K", "M", "B", "T", "Qa", "Qi", "Sx", "Sp", "Oc", "No", "Dc",
];

/// A non-negative quantity stored as `mantissa × 10^exponent`.
///
/// Invariant: zero is `(0, 0)`; every other value has `1 <= mantissa < 10`.
/// Values are immutable; every operation returns a new normalized instance.
///
/// # Example
///
/// ```
/// use alembic_economy::ScaledNumber;
///
/// let a = ScaledNumber::from_parts(1.0, 50).unwrap();
/// let b = ScaledNumber::from_parts(2.0, 50).unwrap();
/// assert_eq!(a + b, ScaledNumber::from_parts(3.0, 50).unwrap());
/// assert_eq!((a + b).format(2), "300.00ae");
/// ```
#[derive(Clone, Copy, Default)]
pub struct ScaledNumber {
    mantissa: f64,
    exponent: i64,
}

impl ScaledNumber {
    /// Zero.
    pub const ZERO: Self = Self {
        mantissa: 0.0,
        exponent: 0,
    };

    /// One.
    pub const ONE: Self = Self {
        mantissa: 1.0,
        exponent: 0,
    };

    /// Creates a value from a native float.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` for NaN, infinities and negative values.
    pub fn from_native(value: f64) -> EconomyResult<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(EconomyError::magnitude(value));
        }
        Ok(Self::normalized(value, 0))
    }

    /// Creates a value from a mantissa and exponent, normalizing immediately.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` if the mantissa is NaN, infinite or negative.
    pub fn from_parts(mantissa: f64, exponent: i64) -> EconomyResult<Self> {
        if !mantissa.is_finite() || mantissa < 0.0 {
            return Err(EconomyError::magnitude(format_args!("{mantissa}e{exponent}")));
        }
        Ok(Self::normalized(mantissa, exponent))
    }

    /// Builds a value whose parts are already normalized (content tables).
    ///
    /// The caller guarantees `1 <= mantissa < 10` (or `mantissa == 0` with `exponent == 0`).
    pub(crate) const fn from_normalized(mantissa: f64, exponent: i64) -> Self {
        Self { mantissa, exponent }
    }

    /// Creates a value from a whole count. Never fails.
    #[must_use]
    pub fn from_count(count: u64) -> Self {
        Self::normalized(count as f64, 0)
    }

    /// Brings any positive `mantissa × 10^exponent` into canonical form.
    fn normalized(mantissa: f64, exponent: i64) -> Self {
        if mantissa <= 0.0 || mantissa.is_nan() {
            return Self::ZERO;
        }
        if (1.0..10.0).contains(&mantissa) {
            return Self { mantissa, exponent };
        }

        let shift = mantissa.log10().floor() as i64;
        let mut m = scale_pow10(mantissa, -shift);
        let mut e = exponent.saturating_add(shift);

        // log10 can land one step off near exact powers of ten
        if m >= 10.0 {
            m /= 10.0;
            e = e.saturating_add(1);
        } else if m < 1.0 {
            m *= 10.0;
            e = e.saturating_sub(1);
        }

        Self {
            mantissa: m,
            exponent: e,
        }
    }

    /// Returns the mantissa (`0` or within `[1, 10)`).
    #[inline]
    #[must_use]
    pub const fn mantissa(self) -> f64 {
        self.mantissa
    }

    /// Returns the power-of-ten exponent.
    #[inline]
    #[must_use]
    pub const fn exponent(self) -> i64 {
        self.exponent
    }

    /// Returns true if this value is zero.
    #[inline]
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.mantissa == 0.0
    }

    /// Converts to a native float.
    ///
    /// Values above `f64::MAX` become `f64::INFINITY`; values below the
    /// subnormal range become `0.0`.
    #[must_use]
    pub fn to_f64(self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        if self.exponent > 308 {
            return f64::INFINITY;
        }
        if self.exponent < -343 {
            return 0.0;
        }
        scale_pow10(self.mantissa, self.exponent)
    }

    /// Base-10 logarithm (`-inf` for zero).
    #[must_use]
    pub fn log10(self) -> f64 {
        if self.is_zero() {
            return f64::NEG_INFINITY;
        }
        self.exponent as f64 + self.mantissa.log10()
    }

    /// Adds two values using the default [`PRECISION_GAP`].
    #[must_use]
    pub fn add(self, rhs: Self) -> Self {
        self.add_with_gap(rhs, PRECISION_GAP)
    }

    /// Adds two values with an explicit negligibility threshold.
    ///
    /// If the exponents differ by more than `gap`, the larger operand is
    /// returned unchanged.
    #[must_use]
    pub fn add_with_gap(self, rhs: Self, gap: i64) -> Self {
        if self.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return self;
        }

        let (big, small) = if self >= rhs { (self, rhs) } else { (rhs, self) };
        let diff = big.exponent.saturating_sub(small.exponent);
        if diff > gap {
            return big;
        }

        if big.in_native_window() && small.in_native_window() {
            return Self::normalized(big.to_f64() + small.to_f64(), 0);
        }

        let aligned = scale_pow10(small.mantissa, -diff);
        Self::normalized(big.mantissa + aligned, big.exponent)
    }

    /// Subtracts `rhs`, failing if the result would be negative.
    ///
    /// # Errors
    ///
    /// Returns `Underflow` if `rhs > self`.
    pub fn checked_sub(self, rhs: Self) -> EconomyResult<Self> {
        if rhs > self {
            return Err(EconomyError::Underflow {
                minuend: self.to_string(),
                subtrahend: rhs.to_string(),
            });
        }
        Ok(self.sub_ordered(rhs))
    }

    /// Subtracts `rhs`, clamping at zero.
    #[must_use]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if rhs >= self {
            return Self::ZERO;
        }
        self.sub_ordered(rhs)
    }

    /// Subtraction for `self >= rhs`.
    fn sub_ordered(self, rhs: Self) -> Self {
        if rhs.is_zero() {
            return self;
        }
        if rhs == self {
            return Self::ZERO;
        }

        let diff = self.exponent.saturating_sub(rhs.exponent);
        if diff > PRECISION_GAP {
            return self;
        }

        if self.in_native_window() && rhs.in_native_window() {
            return Self::normalized(self.to_f64() - rhs.to_f64(), 0);
        }

        let aligned = scale_pow10(rhs.mantissa, -diff);
        Self::normalized(self.mantissa - aligned, self.exponent)
    }

    /// Multiplies two values.
    #[must_use]
    pub fn mul(self, rhs: Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            return Self::ZERO;
        }
        Self::normalized(
            self.mantissa * rhs.mantissa,
            self.exponent.saturating_add(rhs.exponent),
        )
    }

    /// Divides by `rhs`.
    ///
    /// # Errors
    ///
    /// Returns `DivisionByZero` if `rhs` is zero.
    pub fn div(self, rhs: Self) -> EconomyResult<Self> {
        if rhs.is_zero() {
            return Err(EconomyError::DivisionByZero);
        }
        if self.is_zero() {
            return Ok(Self::ZERO);
        }
        Ok(Self::normalized(
            self.mantissa / rhs.mantissa,
            self.exponent.saturating_sub(rhs.exponent),
        ))
    }

    /// Multiplies by a native, non-negative factor.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` if `factor` is negative or not finite.
    pub fn scale(self, factor: f64) -> EconomyResult<Self> {
        Ok(self.mul(Self::from_native(factor)?))
    }

    /// Returns `self / rhs` as a native float (`0.0` when `rhs` is zero).
    ///
    /// Meant for weights and fractions, which are small by construction.
    #[must_use]
    pub fn ratio(self, rhs: Self) -> f64 {
        self.div(rhs).map_or(0.0, Self::to_f64)
    }

    /// Formats for display with the default scientific ceiling.
    #[must_use]
    pub fn format(&self, precision: usize) -> String {
        self.format_with(&FormatPolicy {
            precision,
            ..FormatPolicy::default()
        })
    }

    /// Formats for display.
    ///
    /// - below 1,000: whole number (`"999"`)
    /// - below 1e6: comma grouped (`"123,456"`)
    /// - below the ceiling: truncated mantissa + suffix (`"1.50M"`)
    /// - at or beyond the ceiling: scientific (`"1.00e303"`)
    ///
    /// Pure function of the value and policy; callers may cache the result.
    #[must_use]
    pub fn format_with(&self, policy: &FormatPolicy) -> String {
        let precision = policy.precision.min(MAX_PRECISION);

        if self.exponent < 3 {
            return format!("{}", self.whole_part());
        }
        if self.exponent < 6 && self.exponent < policy.scientific_ceiling {
            return group_thousands(self.whole_part());
        }
        if self.exponent < policy.scientific_ceiling {
            let group = self.exponent / 3;
            if let Some(suffix) = suffix_for_group(group) {
                let scaled = self.mantissa * EXACT_POW10[(self.exponent % 3) as usize];
                return format!("{}{suffix}", truncate_fixed(scaled, precision));
            }
        }
        format!(
            "{}e{}",
            truncate_fixed(self.mantissa, precision),
            self.exponent
        )
    }

    /// Exports the plain `(mantissa, exponent)` record.
    #[must_use]
    pub const fn to_state(self) -> ScaledNumberState {
        ScaledNumberState {
            mantissa: self.mantissa,
            exponent: self.exponent,
        }
    }

    /// Rebuilds a value from its plain record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` if the record holds a malformed mantissa.
    pub fn from_state(state: ScaledNumberState) -> EconomyResult<Self> {
        Self::from_parts(state.mantissa, state.exponent)
    }

    /// Integer part of a value below 1e6, tolerant of one-ulp shortfalls.
    fn whole_part(self) -> u64 {
        let value = self.to_f64();
        (value + value * TRUNCATION_EPSILON * 1e-3).floor() as u64
    }

    #[inline]
    fn in_native_window(self) -> bool {
        self.exponent.abs() <= NATIVE_EXPONENT_LIMIT
    }
}

/// Multiplies `value` by `10^n`, splitting large powers to avoid overflow.
fn scale_pow10(mut value: f64, mut n: i64) -> f64 {
    while n > MAX_POW10_STEP {
        value *= pow10(MAX_POW10_STEP);
        n -= MAX_POW10_STEP;
    }
    while n < -MAX_POW10_STEP {
        value /= pow10(MAX_POW10_STEP);
        n += MAX_POW10_STEP;
    }
    if n >= 0 {
        value * pow10(n)
    } else {
        value / pow10(-n)
    }
}

/// `10^n` for `0 <= n <= MAX_POW10_STEP`.
fn pow10(n: i64) -> f64 {
    match usize::try_from(n) {
        Ok(index) if index < EXACT_POW10.len() => EXACT_POW10[index],
        _ => 10f64.powi(n as i32),
    }
}

fn suffix_for_group(group: i64) -> Option<String> {
    let index = usize::try_from(group).ok()?;
    if let Some(named) = NAMED_SUFFIXES.get(index) {
        return Some((*named).to_string());
    }
    // aa, ab, ... zz
    let generated = index - NAMED_SUFFIXES.len();
    if generated >= 26 * 26 {
        return None;
    }
    let first = char::from(b'a' + (generated / 26) as u8);
    let second = char::from(b'a' + (generated % 26) as u8);
    Some([first, second].iter().collect())
}

fn truncate_fixed(value: f64, precision: usize) -> String {
    let factor = pow10(precision as i64);
    let truncated = (value * factor + TRUNCATION_EPSILON).floor() / factor;
    format!("{truncated:.precision$}")
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Display policy for [`ScaledNumber::format_with`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatPolicy {
    /// Decimals shown in suffix and scientific notation.
    pub precision: usize,
    /// Exponent at which scientific notation takes over.
    pub scientific_ceiling: i64,
}

impl Default for FormatPolicy {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            scientific_ceiling: DEFAULT_SCIENTIFIC_CEILING,
        }
    }
}

/// Plain persisted form of a [`ScaledNumber`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaledNumberState {
    /// Mantissa (`0` or within `[1, 10)`).
    pub mantissa: f64,
    /// Power-of-ten exponent.
    pub exponent: i64,
}

impl Ord for ScaledNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_zero(), other.is_zero()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self
                .exponent
                .cmp(&other.exponent)
                .then_with(|| self.mantissa.total_cmp(&other.mantissa)),
        }
    }
}

impl PartialOrd for ScaledNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScaledNumber {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

// NaN is never constructed, so equality is total.
impl Eq for ScaledNumber {}

impl Add for ScaledNumber {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        ScaledNumber::add(self, rhs)
    }
}

/// Saturating: clamps at zero. Use [`ScaledNumber::checked_sub`] to detect underflow.
impl Sub for ScaledNumber {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl Mul for ScaledNumber {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self::Output {
        ScaledNumber::mul(self, rhs)
    }
}

impl Sum for ScaledNumber {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, ScaledNumber::add)
    }
}

impl fmt::Debug for ScaledNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScaledNumber({}e{})", self.mantissa, self.exponent)
    }
}

/// Lossless text form: `"<mantissa>e<exponent>"`.
impl fmt::Display for ScaledNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}e{}", self.mantissa, self.exponent)
    }
}

impl FromStr for ScaledNumber {
    type Err = EconomyError;

    /// Parses the lossless text form, or any plain non-negative decimal.
    fn from_str(s: &str) -> EconomyResult<Self> {
        let text = s.trim();
        if let Some((mantissa, exponent)) = text.split_once(|c: char| c == 'e' || c == 'E') {
            let mantissa: f64 = mantissa
                .parse()
                .map_err(|_| EconomyError::magnitude(text))?;
            let exponent: i64 = exponent
                .parse()
                .map_err(|_| EconomyError::magnitude(text))?;
            return Self::from_parts(mantissa, exponent);
        }
        let value: f64 = text.parse().map_err(|_| EconomyError::magnitude(text))?;
        Self::from_native(value)
    }
}

impl From<u32> for ScaledNumber {
    fn from(count: u32) -> Self {
        Self::from_count(u64::from(count))
    }
}

impl Serialize for ScaledNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScaledNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Native(f64),
            Parts { mantissa: f64, exponent: i64 },
        }

        let parsed = match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text.parse(),
            Repr::Native(value) => Self::from_native(value),
            Repr::Parts { mantissa, exponent } => Self::from_parts(mantissa, exponent),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sn(mantissa: f64, exponent: i64) -> ScaledNumber {
        ScaledNumber::from_parts(mantissa, exponent).unwrap()
    }

    fn native(value: f64) -> ScaledNumber {
        ScaledNumber::from_native(value).unwrap()
    }

    fn assert_normalized(value: ScaledNumber) {
        if value.is_zero() {
            assert_eq!(value.exponent(), 0, "zero must have exponent 0");
        } else {
            assert!(
                (1.0..10.0).contains(&value.mantissa()),
                "mantissa out of range: {value:?}"
            );
        }
    }

    #[test]
    fn test_normalization_on_construction() {
        let v = native(12_345.0);
        assert_eq!(v.exponent(), 4);
        assert!((v.mantissa() - 1.2345).abs() < 1e-12);

        let tiny = native(0.000_25);
        assert_eq!(tiny.exponent(), -4);
        assert!((tiny.mantissa() - 2.5).abs() < 1e-12);

        let shifted = sn(250.0, 10);
        assert_eq!(shifted.exponent(), 12);
        assert!((shifted.mantissa() - 2.5).abs() < 1e-12);

        assert_eq!(native(1000.0), sn(1.0, 3));
        assert_eq!(sn(0.0, 99).exponent(), 0);
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(ScaledNumber::from_native(f64::NAN).is_err());
        assert!(ScaledNumber::from_native(f64::NEG_INFINITY).is_err());
        assert!(ScaledNumber::from_native(f64::INFINITY).is_err());
        assert!(ScaledNumber::from_native(-1.0).is_err());
        assert!(ScaledNumber::from_parts(-2.0, 5).is_err());
        assert!(ScaledNumber::from_parts(f64::NAN, 5).is_err());
        assert_eq!(ScaledNumber::from_native(-0.0).unwrap(), ScaledNumber::ZERO);
    }

    #[test]
    fn test_addition_negligible_gap() {
        let big = sn(1.0, 50);
        let small = sn(1.0, 30);
        assert_eq!(big + small, big);
        assert_eq!(small + big, big);
    }

    #[test]
    fn test_addition_precision() {
        assert_eq!(sn(1.0, 50) + sn(2.0, 50), sn(3.0, 50));
        assert_eq!(native(120.0) + native(30.0), native(150.0));
        assert_eq!(sn(5.0, 400) + sn(5.0, 400), sn(1.0, 401));
    }

    #[test]
    fn test_addition_within_gap_across_exponents() {
        let sum = sn(1.0, 100) + sn(5.0, 99);
        assert_eq!(sum.exponent(), 100);
        assert!((sum.mantissa() - 1.5).abs() < 1e-12);
        assert_normalized(sum);
    }

    #[test]
    fn test_subtraction() {
        assert_eq!(native(120.0) - native(100.0), native(20.0));
        assert_eq!(native(150.0).checked_sub(native(100.0)).unwrap(), native(50.0));
        assert_eq!(sn(3.0, 50).checked_sub(sn(1.0, 50)).unwrap(), sn(2.0, 50));

        // gap rule applies to subtraction as well
        assert_eq!(sn(1.0, 50) - sn(1.0, 30), sn(1.0, 50));

        // exact cancellation
        assert_eq!(sn(7.5, 200) - sn(7.5, 200), ScaledNumber::ZERO);
    }

    #[test]
    fn test_subtraction_underflow() {
        let err = native(5.0).checked_sub(native(6.0)).unwrap_err();
        assert!(matches!(err, EconomyError::Underflow { .. }));
        assert_eq!(native(5.0) - native(6.0), ScaledNumber::ZERO);
        assert_eq!(native(5.0).saturating_sub(sn(1.0, 90)), ScaledNumber::ZERO);
    }

    #[test]
    fn test_multiply_divide() {
        assert_eq!(sn(2.0, 10) * sn(3.0, 20), sn(6.0, 30));
        assert_eq!(sn(5.0, 10) * sn(4.0, 5), sn(2.0, 16));
        assert_eq!(sn(6.0, 30).div(sn(3.0, 20)).unwrap(), sn(2.0, 10));
        assert_eq!(sn(1.0, 0).div(sn(4.0, 0)).unwrap(), sn(2.5, -1));
        assert_eq!(ScaledNumber::ZERO * sn(9.0, 999), ScaledNumber::ZERO);
        assert_eq!(
            native(1.0).div(ScaledNumber::ZERO).unwrap_err(),
            EconomyError::DivisionByZero
        );
        assert_eq!(native(120.0).scale(0.5).unwrap(), native(60.0));
        assert!(native(1.0).scale(-1.0).is_err());
    }

    #[test]
    fn test_normalization_invariant_after_every_operation() {
        let values = [
            ScaledNumber::ZERO,
            native(1.0),
            native(9.999_999),
            native(0.1),
            native(1e-10),
            native(1e308),
            sn(7.0, 5000),
            sn(3.3, -5000),
        ];
        for &a in &values {
            for &b in &values {
                assert_normalized(a + b);
                assert_normalized(a - b);
                assert_normalized(a * b);
                if let Ok(q) = a.div(b) {
                    assert_normalized(q);
                }
            }
        }
    }

    #[test]
    fn test_total_order() {
        let mut values = vec![sn(1.0, 10), ScaledNumber::ZERO, sn(9.0, 9), sn(1.5, 10), native(1e-300)];
        values.sort();
        assert_eq!(
            values,
            vec![ScaledNumber::ZERO, native(1e-300), sn(9.0, 9), sn(1.0, 10), sn(1.5, 10)]
        );
        assert!(ScaledNumber::ZERO < native(1e-300));
    }

    #[test]
    fn test_format_tiers() {
        assert_eq!(ScaledNumber::ZERO.format(2), "0");
        assert_eq!(native(999.0).format(2), "999");
        assert_eq!(native(999.9).format(2), "999");
        assert_eq!(native(1000.0).format(2), "1,000");
        assert_eq!(native(123_456.0).format(2), "123,456");
        assert_eq!(native(1_500_000.0).format(2), "1.50M");
        assert_eq!(native(1_234_567_890.0).format(2), "1.23B");
        assert_eq!(native(999_999_999.0).format(2), "999.99M");
        assert_eq!(sn(4.2, 13).format(1), "42.0T");
        assert_eq!(sn(1.0, 33).format(2), "1.00Dc");
        assert_eq!(sn(1.0, 36).format(2), "1.00aa");
        assert_eq!(sn(1.0, 302).format(2), "100.00dk");
        assert_eq!(sn(1.0, 303).format(2), "1.00e303");
        assert_eq!(sn(2.5, 1000).format(3), "2.500e1000");
    }

    #[test]
    fn test_format_custom_ceiling() {
        let policy = FormatPolicy {
            precision: 2,
            scientific_ceiling: 12,
        };
        assert_eq!(sn(1.5, 9).format_with(&policy), "1.50B");
        assert_eq!(sn(1.5, 12).format_with(&policy), "1.50e12");
    }

    #[test]
    fn test_text_round_trip() {
        let v: ScaledNumber = "1.23456789e45".parse().unwrap();
        assert_eq!(v.to_string(), "1.23456789e45");
        assert_eq!("12345".parse::<ScaledNumber>().unwrap(), native(12_345.0));
        assert_eq!("0e0".parse::<ScaledNumber>().unwrap(), ScaledNumber::ZERO);
        assert!("-5".parse::<ScaledNumber>().is_err());
        assert!("abc".parse::<ScaledNumber>().is_err());
        assert!("1.5eX".parse::<ScaledNumber>().is_err());
    }

    #[test]
    fn test_state_round_trip_boundaries() {
        for value in [0.0, 1.0, 9.999_999, 1e308, 1e-10] {
            let original = native(value);
            let restored = ScaledNumber::from_state(original.to_state()).unwrap();
            assert_eq!(restored, original, "round trip failed for {value}");

            let text: ScaledNumber = original.to_string().parse().unwrap();
            assert_eq!(text, original, "text round trip failed for {value}");
        }
    }

    #[test]
    fn test_to_f64_limits() {
        assert_eq!(native(120.0).to_f64(), 120.0);
        assert_eq!(sn(1.0, 400).to_f64(), f64::INFINITY);
        assert_eq!(sn(1.0, -400).to_f64(), 0.0);
    }

    #[test]
    fn test_sum() {
        let total: ScaledNumber = [native(1.0), native(2.0), native(3.0)].into_iter().sum();
        assert_eq!(total, native(6.0));
    }
}
