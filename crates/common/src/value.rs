use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// A physical parameter value: a single coefficient or an RGB triple.
///
/// Deserializes from either a number (`0.5`) or a three element list
/// (`[0.5, 0.5, 0.5]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(f64),
    Rgb(DVec3),
}

/// A value could not be written into a document slot of a different width.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot encode a {value}-component value into a {slot}-component slot")]
pub struct ValueArityError {
    pub slot: usize,
    pub value: usize,
}

impl ParamValue {
    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self::Rgb(DVec3::new(r, g, b))
    }

    /// Number of numeric components.
    pub fn components(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Rgb(_) => 3,
        }
    }

    /// The value as an RGB triple, broadcasting scalars.
    pub fn to_rgb(&self) -> DVec3 {
        match *self {
            Self::Scalar(v) => DVec3::splat(v),
            Self::Rgb(v) => v,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match *self {
            Self::Scalar(v) => Some(v),
            Self::Rgb(_) => None,
        }
    }

    /// Apply `f` component-wise.
    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        match self {
            Self::Scalar(v) => Self::Scalar(f(v)),
            Self::Rgb(v) => Self::Rgb(DVec3::new(f(v.x), f(v.y), f(v.z))),
        }
    }

    /// Combine two values component-wise. Two scalars stay scalar; anything
    /// else is broadcast to RGB.
    pub fn zip_with(self, other: Self, f: impl Fn(f64, f64) -> f64) -> Self {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => Self::Scalar(f(a, b)),
            (a, b) => {
                let (a, b) = (a.to_rgb(), b.to_rgb());
                Self::Rgb(DVec3::new(f(a.x, b.x), f(a.y, b.y), f(a.z, b.z)))
            }
        }
    }

    /// Largest absolute component-wise difference.
    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        (self.to_rgb() - other.to_rgb()).abs().max_element()
    }

    /// Encode as document attribute text with fixed precision, space separated.
    ///
    /// A scalar written into a three component slot is repeated.
    pub fn encode(&self, slot: usize, precision: usize) -> Result<String, ValueArityError> {
        let parts: Vec<f64> = match (*self, slot) {
            (Self::Scalar(v), 1) => vec![v],
            (Self::Scalar(v), 3) => vec![v; 3],
            (Self::Rgb(v), 3) => v.to_array().to_vec(),
            (value, slot) => {
                return Err(ValueArityError {
                    slot,
                    value: value.components(),
                });
            }
        };
        Ok(parts
            .iter()
            .map(|p| format!("{p:.precision$}"))
            .collect::<Vec<_>>()
            .join(" "))
    }

    /// Parse attribute text holding one or three numbers separated by
    /// whitespace or commas.
    pub fn parse(text: &str) -> Option<Self> {
        let nums: Option<Vec<f64>> = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f64>().ok())
            .collect();
        match nums?.as_slice() {
            [v] => Some(Self::Scalar(*v)),
            [r, g, b] => Some(Self::rgb(*r, *g, *b)),
            _ => None,
        }
    }

    /// Literal text used inside artifact file names.
    ///
    /// Grey RGB values are labelled by a single component.
    pub fn label(&self) -> String {
        match *self {
            Self::Scalar(v) => literal(v),
            Self::Rgb(v) if v.x == v.y && v.y == v.z => literal(v.x),
            Self::Rgb(v) => format!("{},{},{}", literal(v.x), literal(v.y), literal(v.z)),
        }
    }
}

/// Shortest round-trip representation, always with a decimal point for
/// integral values (`1.0`, `0.75`, `20.0`).
fn literal(v: f64) -> String {
    format!("{v:?}")
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{v}"),
            Self::Rgb(v) => write!(f, "[{}, {}, {}]", v.x, v.y, v.z),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Scalar(v)
    }
}

impl From<[f64; 3]> for ParamValue {
    fn from(v: [f64; 3]) -> Self {
        Self::Rgb(DVec3::from_array(v))
    }
}

impl Add for ParamValue {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl Sub for ParamValue {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl Mul for ParamValue {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a * b)
    }
}

impl Div for ParamValue {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a / b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_broadcasts_against_rgb() {
        let albedo = ParamValue::rgb(0.75, 0.5, 0.25);
        let sigma_t = ParamValue::Scalar(20.0);
        assert_eq!(albedo * sigma_t, ParamValue::rgb(15.0, 10.0, 5.0));
        assert_eq!(
            ParamValue::Scalar(2.0) * ParamValue::Scalar(3.0),
            ParamValue::Scalar(6.0)
        );
    }

    #[test]
    fn encode_uses_fixed_precision() {
        let v = ParamValue::rgb(15.0, 0.5, 1.0 / 3.0);
        assert_eq!(v.encode(3, 6).unwrap(), "15.000000 0.500000 0.333333");
        assert_eq!(
            ParamValue::Scalar(2.0).encode(3, 2).unwrap(),
            "2.00 2.00 2.00"
        );
    }

    #[test]
    fn encode_rejects_rgb_into_scalar_slot() {
        let err = ParamValue::rgb(1.0, 1.0, 1.0).encode(1, 6).unwrap_err();
        assert_eq!(err, ValueArityError { slot: 1, value: 3 });
    }

    #[test]
    fn parse_accepts_spaces_and_commas() {
        assert_eq!(ParamValue::parse("0.5"), Some(ParamValue::Scalar(0.5)));
        assert_eq!(
            ParamValue::parse("1, 2, 3"),
            Some(ParamValue::rgb(1.0, 2.0, 3.0))
        );
        assert_eq!(ParamValue::parse("1 2"), None);
        assert_eq!(ParamValue::parse("abc"), None);
    }

    #[test]
    fn labels_match_literal_values() {
        assert_eq!(ParamValue::rgb(0.0, 0.0, 0.0).label(), "0.0");
        assert_eq!(ParamValue::rgb(0.75, 0.75, 0.75).label(), "0.75");
        assert_eq!(ParamValue::Scalar(20.0).label(), "20.0");
        assert_eq!(ParamValue::rgb(0.1, 0.2, 0.3).label(), "0.1,0.2,0.3");
    }

    #[test]
    fn deserializes_number_or_list() {
        let scalar: ParamValue = serde_json::from_str("1.5").unwrap();
        assert_eq!(scalar, ParamValue::Scalar(1.5));
        let rgb: ParamValue = serde_json::from_str("[1.0, 0.5, 0.25]").unwrap();
        assert_eq!(rgb, ParamValue::rgb(1.0, 0.5, 0.25));
    }
}
