//! Typed value comparator
//!
//! Rule conditions compare heterogeneous state representations: bare
//! numbers, quantities with units, strings, and enum-like symbols. This
//! crate tags values with their comparison category and gives a total
//! answer for every pair: an ordering when the categories agree and the
//! values are comparable, [`Comparison::Uncomparable`] otherwise.
//!
//! Uncomparable is a domain-expected outcome, not an error — condition
//! handlers consume it as "condition not satisfied".

pub mod unit;

pub use unit::{Dimension, Unit};

use serde::Serialize;
use std::cmp::Ordering;

/// A numeric value with a unit of measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quantity {
    /// Magnitude in `unit`
    pub value: f64,

    /// Unit of measurement
    pub unit: Unit,
}

impl Quantity {
    /// Create a new quantity
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// Magnitude expressed in the dimension's base unit
    pub fn base_value(&self) -> f64 {
        self.unit.to_base(self.value)
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// A value tagged with its comparison category
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "category", content = "value", rename_all = "snake_case")]
pub enum TypedValue {
    /// Plain number without a unit
    Numeric(f64),

    /// Number with a unit of measurement
    Quantity(Quantity),

    /// Free-form text, compared lexicographically
    Text(String),

    /// Enum-like state symbol (e.g., "ON", "OFF"); equality only
    Symbol(String),
}

impl TypedValue {
    /// Create a quantity value
    pub fn quantity(value: f64, unit: Unit) -> Self {
        TypedValue::Quantity(Quantity::new(value, unit))
    }

    /// Lift a JSON value into a typed value
    ///
    /// Numbers become [`TypedValue::Numeric`]; booleans become symbols;
    /// strings are parsed as quantity, then number, falling back to text.
    /// Composite JSON (arrays, objects, null) has no comparison category.
    pub fn from_json(value: &serde_json::Value) -> Option<TypedValue> {
        match value {
            serde_json::Value::Number(n) => n.as_f64().map(TypedValue::Numeric),
            serde_json::Value::Bool(b) => Some(TypedValue::Symbol(b.to_string())),
            serde_json::Value::String(s) => Some(TypedValue::parse(s)),
            _ => None,
        }
    }

    /// Parse a string into the most specific category
    ///
    /// `"21.5 °C"` → quantity, `"42"` → numeric, anything else → text.
    pub fn parse(s: &str) -> TypedValue {
        let trimmed = s.trim();

        if let Some(quantity) = parse_quantity(trimmed) {
            return TypedValue::Quantity(quantity);
        }

        if let Ok(n) = trimmed.parse::<f64>() {
            return TypedValue::Numeric(n);
        }

        TypedValue::Text(trimmed.to_string())
    }
}

/// Parse "value unit" or "valueunit" forms, e.g. "21.5 °C" or "5km"
fn parse_quantity(s: &str) -> Option<Quantity> {
    let split = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.' && *c != '-' && *c != '+')
        .map(|(i, _)| i)?;

    let (number, rest) = s.split_at(split);
    let value: f64 = number.parse().ok()?;
    let unit = Unit::parse(rest.trim())?;

    Some(Quantity::new(value, unit))
}

/// Outcome of comparing two typed values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// The values share a category and are ordered
    Ordered(Ordering),

    /// The values belong to different categories, their units are not
    /// convertible, or one of them has no defined order
    Uncomparable,
}

impl Comparison {
    /// Whether the left value is strictly greater
    pub fn is_gt(&self) -> bool {
        matches!(self, Comparison::Ordered(Ordering::Greater))
    }

    /// Whether the left value is strictly less
    pub fn is_lt(&self) -> bool {
        matches!(self, Comparison::Ordered(Ordering::Less))
    }

    /// Whether the values compare equal
    pub fn is_eq(&self) -> bool {
        matches!(self, Comparison::Ordered(Ordering::Equal))
    }

    /// Invert the ordering, mapping Uncomparable to itself
    pub fn reverse(&self) -> Comparison {
        match self {
            Comparison::Ordered(ord) => Comparison::Ordered(ord.reverse()),
            Comparison::Uncomparable => Comparison::Uncomparable,
        }
    }
}

/// Compare two typed values
///
/// Values compare only within the same category. Quantities are normalized
/// to their dimension's base unit first; quantities of different dimensions
/// are uncomparable. Symbols carry no ordering: equal symbols compare
/// equal, distinct symbols are uncomparable. NaN never compares.
pub fn compare(a: &TypedValue, b: &TypedValue) -> Comparison {
    match (a, b) {
        (TypedValue::Numeric(x), TypedValue::Numeric(y)) => compare_f64(*x, *y),
        (TypedValue::Quantity(x), TypedValue::Quantity(y)) => {
            if x.unit.dimension != y.unit.dimension {
                return Comparison::Uncomparable;
            }
            compare_f64(x.base_value(), y.base_value())
        }
        (TypedValue::Text(x), TypedValue::Text(y)) => Comparison::Ordered(x.cmp(y)),
        (TypedValue::Symbol(x), TypedValue::Symbol(y)) => {
            if x == y {
                Comparison::Ordered(Ordering::Equal)
            } else {
                Comparison::Uncomparable
            }
        }
        _ => Comparison::Uncomparable,
    }
}

fn compare_f64(x: f64, y: f64) -> Comparison {
    match x.partial_cmp(&y) {
        Some(ord) => Comparison::Ordered(ord),
        None => Comparison::Uncomparable,
    }
}
