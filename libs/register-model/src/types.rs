//! Register configuration types
//!
//! These are the serialized shapes used by configuration import/export.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Display format of a configured register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum RegisterFormat {
    #[default]
    Decimal,
    Hex,
    Float,
    Boolean,
    StringByte,
    StringWord,
}

impl RegisterFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            RegisterFormat::Decimal => "decimal",
            RegisterFormat::Hex => "hex",
            RegisterFormat::Float => "float",
            RegisterFormat::Boolean => "boolean",
            RegisterFormat::StringByte => "string-byte",
            RegisterFormat::StringWord => "string-word",
        }
    }

    /// Unknown format names fall back to decimal
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "hex" => RegisterFormat::Hex,
            "float" => RegisterFormat::Float,
            "boolean" => RegisterFormat::Boolean,
            "string-byte" => RegisterFormat::StringByte,
            "string-word" => RegisterFormat::StringWord,
            _ => RegisterFormat::Decimal,
        }
    }
}

impl From<String> for RegisterFormat {
    fn from(value: String) -> Self {
        RegisterFormat::parse(&value)
    }
}

impl fmt::Display for RegisterFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-address register configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterConfig {
    pub name: String,
    #[serde(default)]
    pub format: RegisterFormat,
    pub address: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_length: Option<u16>,
}

impl RegisterConfig {
    pub fn new(address: u16, name: impl Into<String>, format: RegisterFormat) -> Self {
        Self {
            name: name.into(),
            format,
            address,
            string_length: None,
        }
    }

    pub fn with_string_length(mut self, length: u16) -> Self {
        self.string_length = Some(length);
        self
    }

    /// Config used for addresses that have none
    pub fn default_for(address: u16) -> Self {
        Self::new(address, format!("Register {}", address), RegisterFormat::Decimal)
    }

    pub fn string_length(&self) -> u16 {
        self.string_length.unwrap_or(0)
    }
}

/// Contiguous span of addresses read with one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBlock {
    pub start_address: u16,
    pub length: u16,
    #[serde(default)]
    pub registers: Vec<RegisterConfig>,
}

impl RegisterBlock {
    pub fn new(start_address: u16, length: u16) -> Self {
        Self {
            start_address,
            length,
            registers: Vec::new(),
        }
    }

    pub fn with_registers(mut self, registers: Vec<RegisterConfig>) -> Self {
        self.registers = registers;
        self
    }

    /// Exclusive end of the span; u32 so that spans ending at 65536 fit
    pub fn end(&self) -> u32 {
        u32::from(self.start_address) + u32::from(self.length)
    }

    pub fn contains(&self, address: u16) -> bool {
        let address = u32::from(address);
        address >= u32::from(self.start_address) && address < self.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_format_falls_back_to_decimal() {
        let cfg: RegisterConfig =
            serde_json::from_str(r#"{"name":"x","format":"octal","address":3}"#).unwrap();
        assert_eq!(cfg.format, RegisterFormat::Decimal);

        let cfg: RegisterConfig = serde_json::from_str(r#"{"name":"x","address":3}"#).unwrap();
        assert_eq!(cfg.format, RegisterFormat::Decimal);
    }

    #[test]
    fn test_block_json_shape() {
        let json = r#"{
            "startAddress": 40001,
            "length": 4,
            "registers": [
                {"name": "Serial", "format": "string-byte", "address": 40001, "stringLength": 6}
            ]
        }"#;
        let block: RegisterBlock = serde_json::from_str(json).unwrap();
        assert_eq!(block.start_address, 40_001);
        assert_eq!(block.registers[0].format, RegisterFormat::StringByte);
        assert_eq!(block.registers[0].string_length, Some(6));

        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["registers"][0]["format"], "string-byte");
        assert_eq!(value["registers"][0]["stringLength"], 6);
    }

    #[test]
    fn test_block_span() {
        let block = RegisterBlock::new(65_500, 36);
        assert_eq!(block.end(), 65_536);
        assert!(block.contains(65_535));
        assert!(!block.contains(65_499));
    }
}
