//! Fixed-precision string formatting for published quote values.
//!
//! Every numeric field that leaves the publisher is a decimal string with
//! exactly two fraction digits. Upstream payloads are loosely typed (numbers,
//! numeric strings, nulls), so coercion goes through the [`Numeric`] trait and
//! never fails: anything that cannot be read as a finite number falls back to
//! the default.

use serde_json::Value;

const TRILLION: f64 = 1_000_000_000_000.0;
const BILLION: f64 = 1_000_000_000.0;

/// Lossy numeric coercion for upstream values.
pub trait Numeric {
    /// The value as a finite `f64`, or `None` if it cannot be read as one.
    fn to_f64(&self) -> Option<f64>;
}

impl Numeric for f64 {
    fn to_f64(&self) -> Option<f64> {
        Some(*self).filter(|v| v.is_finite())
    }
}

impl Numeric for f32 {
    fn to_f64(&self) -> Option<f64> {
        (*self as f64).to_f64()
    }
}

impl Numeric for i64 {
    fn to_f64(&self) -> Option<f64> {
        Some(*self as f64)
    }
}

impl Numeric for u64 {
    fn to_f64(&self) -> Option<f64> {
        Some(*self as f64)
    }
}

impl Numeric for str {
    fn to_f64(&self) -> Option<f64> {
        self.trim().parse::<f64>().ok().and_then(|v| v.to_f64())
    }
}

impl Numeric for String {
    fn to_f64(&self) -> Option<f64> {
        self.as_str().to_f64()
    }
}

impl Numeric for Value {
    fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64().and_then(|v| v.to_f64()),
            Value::String(s) => s.to_f64(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl<T: Numeric + ?Sized> Numeric for &T {
    fn to_f64(&self) -> Option<f64> {
        (**self).to_f64()
    }
}

impl<T: Numeric> Numeric for Option<T> {
    fn to_f64(&self) -> Option<f64> {
        self.as_ref().and_then(|v| v.to_f64())
    }
}

/// Format `value` with two fraction digits, falling back to `0.00`.
pub fn format_number<T: Numeric + ?Sized>(value: &T) -> String {
    format_number_or(value, 0.0)
}

/// Format `value` with two fraction digits, falling back to `default`.
///
/// Zero is treated like a missing value, so a non-zero default wins over an
/// upstream `0`.
pub fn format_number_or<T: Numeric + ?Sized>(value: &T, default: f64) -> String {
    let number = value
        .to_f64()
        .filter(|v| *v != 0.0)
        .or_else(|| default.to_f64())
        .unwrap_or(0.0);
    format!("{:.2}", number)
}

/// Render a market capitalization as `"<v> T"` or `"<v> B"`.
///
/// Returns `None` for falsy input (zero, null, empty or unparseable). The
/// trillion threshold is inclusive.
pub fn format_market_cap<T: Numeric + ?Sized>(value: &T) -> Option<String> {
    let cap = value.to_f64().filter(|v| *v != 0.0)?;
    if cap >= TRILLION {
        Some(format!("{} T", format_number(&(cap / TRILLION))))
    } else {
        Some(format!("{} B", format_number(&(cap / BILLION))))
    }
}
