//! Raw and display values

use std::fmt;

use serde::{Serialize, Serializer};

use crate::types::RegisterFormat;

/// Value as stored in a register bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawValue {
    Bit(bool),
    Word(u16),
}

/// Decoded value of one register row
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayValue {
    Decimal(u16),
    /// Coil or discrete input passed through unchanged
    Bit(bool),
    Hex(String),
    Bool(bool),
    Float(f32),
    Text(String),
    NotAvailable,
}

impl DisplayValue {
    pub const NOT_AVAILABLE: &'static str = "N/A";

    pub fn is_available(&self) -> bool {
        !matches!(self, DisplayValue::NotAvailable)
    }
}

impl From<RawValue> for DisplayValue {
    fn from(raw: RawValue) -> Self {
        match raw {
            RawValue::Bit(bit) => DisplayValue::Bit(bit),
            RawValue::Word(word) => DisplayValue::Decimal(word),
        }
    }
}

impl Serialize for DisplayValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DisplayValue::Decimal(v) => serializer.serialize_u16(*v),
            DisplayValue::Bit(v) | DisplayValue::Bool(v) => serializer.serialize_bool(*v),
            DisplayValue::Hex(s) | DisplayValue::Text(s) => serializer.serialize_str(s),
            DisplayValue::Float(v) => serializer.serialize_f32(*v),
            DisplayValue::NotAvailable => serializer.serialize_str(Self::NOT_AVAILABLE),
        }
    }
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayValue::Decimal(v) => write!(f, "{}", v),
            DisplayValue::Bit(v) | DisplayValue::Bool(v) => write!(f, "{}", v),
            DisplayValue::Hex(s) | DisplayValue::Text(s) => f.write_str(s),
            DisplayValue::Float(v) => write!(f, "{}", v),
            DisplayValue::NotAvailable => f.write_str(Self::NOT_AVAILABLE),
        }
    }
}

/// One rendered row of a register snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisterRow {
    pub address: u16,
    pub name: String,
    pub value: DisplayValue,
    pub format: RegisterFormat,
}
