//! Units of measurement for quantity values
//!
//! Units are described by a dimension and an affine conversion to that
//! dimension's base unit (Kelvin, metre, second, watt, ...). The affine
//! form covers temperature scales, which need an offset on top of a factor.

use serde::Serialize;

/// Physical dimension a unit measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Temperature,
    Length,
    Time,
    Mass,
    Power,
    /// Ratio values such as percentages
    Dimensionless,
}

/// A unit of measurement
///
/// `to_base` of a value v is `v * factor + offset`, expressed in the
/// dimension's base unit.
// `symbol` is a borrow into the static unit table, so the type serializes
// but is reconstructed through `Unit::parse` rather than deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Unit {
    /// Display symbol (e.g., "°C")
    pub symbol: &'static str,

    /// Dimension this unit measures
    pub dimension: Dimension,

    /// Multiplicative factor to the base unit
    pub factor: f64,

    /// Additive offset to the base unit (non-zero only for temperatures)
    pub offset: f64,
}

impl Unit {
    pub const KELVIN: Unit = Unit::base("K", Dimension::Temperature);
    pub const CELSIUS: Unit = Unit {
        symbol: "°C",
        dimension: Dimension::Temperature,
        factor: 1.0,
        offset: 273.15,
    };
    pub const FAHRENHEIT: Unit = Unit {
        symbol: "°F",
        dimension: Dimension::Temperature,
        factor: 5.0 / 9.0,
        offset: 459.67 * 5.0 / 9.0,
    };

    pub const METRE: Unit = Unit::base("m", Dimension::Length);
    pub const MILLIMETRE: Unit = Unit::scaled("mm", Dimension::Length, 0.001);
    pub const CENTIMETRE: Unit = Unit::scaled("cm", Dimension::Length, 0.01);
    pub const KILOMETRE: Unit = Unit::scaled("km", Dimension::Length, 1000.0);

    pub const SECOND: Unit = Unit::base("s", Dimension::Time);
    pub const MILLISECOND: Unit = Unit::scaled("ms", Dimension::Time, 0.001);
    pub const MINUTE: Unit = Unit::scaled("min", Dimension::Time, 60.0);
    pub const HOUR: Unit = Unit::scaled("h", Dimension::Time, 3600.0);

    pub const KILOGRAM: Unit = Unit::base("kg", Dimension::Mass);
    pub const GRAM: Unit = Unit::scaled("g", Dimension::Mass, 0.001);

    pub const WATT: Unit = Unit::base("W", Dimension::Power);
    pub const KILOWATT: Unit = Unit::scaled("kW", Dimension::Power, 1000.0);

    pub const ONE: Unit = Unit::base("", Dimension::Dimensionless);
    pub const PERCENT: Unit = Unit::scaled("%", Dimension::Dimensionless, 0.01);

    const fn base(symbol: &'static str, dimension: Dimension) -> Unit {
        Unit {
            symbol,
            dimension,
            factor: 1.0,
            offset: 0.0,
        }
    }

    const fn scaled(symbol: &'static str, dimension: Dimension, factor: f64) -> Unit {
        Unit {
            symbol,
            dimension,
            factor,
            offset: 0.0,
        }
    }

    /// Look up a unit by its symbol
    pub fn parse(symbol: &str) -> Option<Unit> {
        const TABLE: &[Unit] = &[
            Unit::KELVIN,
            Unit::CELSIUS,
            Unit::FAHRENHEIT,
            Unit::METRE,
            Unit::MILLIMETRE,
            Unit::CENTIMETRE,
            Unit::KILOMETRE,
            Unit::SECOND,
            Unit::MILLISECOND,
            Unit::MINUTE,
            Unit::HOUR,
            Unit::KILOGRAM,
            Unit::GRAM,
            Unit::WATT,
            Unit::KILOWATT,
            Unit::PERCENT,
        ];

        // Accept the ° prefix being omitted for temperature scales
        let symbol = match symbol {
            "C" => "°C",
            "F" => "°F",
            other => other,
        };

        TABLE.iter().find(|u| u.symbol == symbol).copied()
    }

    /// Convert a value in this unit to the dimension's base unit
    pub fn to_base(&self, value: f64) -> f64 {
        value * self.factor + self.offset
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol)
    }
}
