//! Register value decoding
//!
//! [`decode`] turns one raw bank value into a [`DisplayValue`]. Multi-register
//! formats (float, strings) consume the registers that follow and report how
//! many extra positions the caller must skip.

use std::collections::HashMap;

use tracing::trace;

use crate::address::word_family;
use crate::banks::RegisterBanks;
use crate::error::Result;
use crate::types::{RegisterBlock, RegisterConfig, RegisterFormat};
use crate::value::{DisplayValue, RawValue, RegisterRow};

/// Result of decoding one register
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub value: DisplayValue,
    /// Extra registers consumed after the current one
    pub skip: u16,
}

impl Decoded {
    fn single(value: DisplayValue) -> Self {
        Self { value, skip: 0 }
    }
}

/// Decode the raw value at `config.address`
pub fn decode(
    raw: RawValue,
    config: &RegisterConfig,
    block: &RegisterBlock,
    banks: &RegisterBanks,
) -> Result<Decoded> {
    let word = match raw {
        RawValue::Bit(bit) => return Ok(decode_bit(bit, config.format)),
        RawValue::Word(word) => word,
    };

    let decoded = match config.format {
        RegisterFormat::Decimal => Decoded::single(DisplayValue::Decimal(word)),
        RegisterFormat::Hex => Decoded::single(DisplayValue::Hex(format!("0x{:04X}", word))),
        RegisterFormat::Boolean => Decoded::single(DisplayValue::Bool(word != 0)),
        RegisterFormat::Float => decode_float(word, config.address, block, banks)?,
        RegisterFormat::StringByte => {
            let half = config.string_length() / 2;
            let words = read_words(config.address, u32::from(half) + 1, block, banks)?;
            Decoded {
                value: DisplayValue::Text(words_to_byte_string(&words)),
                skip: half,
            }
        }
        RegisterFormat::StringWord => {
            let length = config.string_length();
            let words = read_words(config.address, u32::from(length), block, banks)?;
            Decoded {
                value: DisplayValue::Text(words_to_char_string(&words)),
                skip: length.saturating_sub(1),
            }
        }
    };
    Ok(decoded)
}

fn decode_bit(bit: bool, format: RegisterFormat) -> Decoded {
    match format {
        RegisterFormat::Decimal | RegisterFormat::Hex | RegisterFormat::Boolean => {
            Decoded::single(DisplayValue::Bit(bit))
        }
        RegisterFormat::Float | RegisterFormat::StringByte | RegisterFormat::StringWord => {
            Decoded::single(DisplayValue::NotAvailable)
        }
    }
}

fn decode_float(
    high: u16,
    address: u16,
    block: &RegisterBlock,
    banks: &RegisterBanks,
) -> Result<Decoded> {
    // The second register is always skipped, even when it is missing
    let next = u32::from(address) + 1;
    if next >= block.end() {
        return Ok(Decoded {
            value: DisplayValue::NotAvailable,
            skip: 1,
        });
    }
    let low = banks.word_in(word_family(address), address + 1)?;
    Ok(Decoded {
        value: DisplayValue::Float(words_to_f32(high, low)),
        skip: 1,
    })
}

/// `count` words from `address`, zero past the end of the block
fn read_words(
    address: u16,
    count: u32,
    block: &RegisterBlock,
    banks: &RegisterBanks,
) -> Result<Vec<u16>> {
    let bank = word_family(address);
    let start = u32::from(address);
    let end = block.end();
    (start..start + count)
        .map(|current| match u16::try_from(current) {
            Ok(current) if u32::from(current) < end => banks.word_in(bank, current),
            _ => Ok(0),
        })
        .collect()
}

/// Big-endian word order: the first register holds the high half
pub fn words_to_f32(high: u16, low: u16) -> f32 {
    f32::from_bits((u32::from(high) << 16) | u32::from(low))
}

/// Two bytes per register, high byte first, trailing NULs trimmed
pub fn words_to_byte_string(words: &[u16]) -> String {
    let mut bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// One code point per register
pub fn words_to_char_string(words: &[u16]) -> String {
    words
        .iter()
        .map(|&w| char::from_u32(u32::from(w)).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Render every address of a block, applying skips of multi-register formats
///
/// Addresses without an entry in `register_map` use the default config.
pub fn render_block(
    block: &RegisterBlock,
    register_map: &HashMap<u16, RegisterConfig>,
    banks: &RegisterBanks,
) -> Result<Vec<RegisterRow>> {
    let mut rows = Vec::with_capacity(usize::from(block.length));
    let mut position: u32 = 0;

    while position < u32::from(block.length) {
        let Some(address) = u16::try_from(u32::from(block.start_address) + position).ok() else {
            break;
        };
        let config = register_map
            .get(&address)
            .cloned()
            .unwrap_or_else(|| RegisterConfig::default_for(address));

        let raw = banks.read(address)?;
        let decoded = decode(raw, &config, block, banks)?;
        trace!(
            "Decoded {} as {} (skip {})",
            address,
            config.format,
            decoded.skip
        );

        rows.push(RegisterRow {
            address,
            name: config.name,
            value: decoded.value,
            format: config.format,
        });
        position += 1 + u32::from(decoded.skip);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Bank;

    fn holding_block(start: u16, length: u16) -> RegisterBlock {
        RegisterBlock::new(start, length)
    }

    #[test]
    fn test_float_round_trip() {
        for value in [1.5f32, -273.15, f32::MAX, f32::MIN_POSITIVE, 0.0] {
            let bits = value.to_bits();
            let high = (bits >> 16) as u16;
            let low = (bits & 0xFFFF) as u16;

            let mut banks = RegisterBanks::new();
            banks
                .store_words(Bank::HoldingRegisters, 0, &[high, low])
                .unwrap();
            let block = holding_block(40_000, 2);
            let config = RegisterConfig::new(40_000, "t", RegisterFormat::Float);

            let decoded = decode(RawValue::Word(high), &config, &block, &banks).unwrap();
            match decoded.value {
                DisplayValue::Float(f) => assert_eq!(f.to_bits(), bits),
                other => panic!("expected float, got {:?}", other),
            }
            assert_eq!(decoded.skip, 1);
        }
    }

    #[test]
    fn test_float_needs_next_register_in_block() {
        let banks = RegisterBanks::new();
        let block = holding_block(40_000, 1);
        let config = RegisterConfig::new(40_000, "t", RegisterFormat::Float);
        let decoded = decode(RawValue::Word(0), &config, &block, &banks).unwrap();
        assert_eq!(decoded.value, DisplayValue::NotAvailable);
    }

    #[test]
    fn test_float_from_input_registers() {
        let mut banks = RegisterBanks::new();
        let bits = 12.25f32.to_bits();
        banks
            .store_words(
                Bank::InputRegisters,
                10,
                &[(bits >> 16) as u16, (bits & 0xFFFF) as u16],
            )
            .unwrap();
        let block = holding_block(30_010, 4);
        let config = RegisterConfig::new(30_010, "t", RegisterFormat::Float);
        let raw = banks.read(30_010).unwrap();
        let decoded = decode(raw, &config, &block, &banks).unwrap();
        assert_eq!(decoded.value, DisplayValue::Float(12.25));
    }

    #[test]
    fn test_string_byte_trims_nuls() {
        let mut banks = RegisterBanks::new();
        banks
            .store_words(Bank::HoldingRegisters, 0, &[0x4142, 0x4300])
            .unwrap();
        let block = holding_block(40_000, 2);
        let config =
            RegisterConfig::new(40_000, "s", RegisterFormat::StringByte).with_string_length(3);
        let decoded = decode(RawValue::Word(0x4142), &config, &block, &banks).unwrap();
        assert_eq!(decoded.value, DisplayValue::Text("ABC".into()));
        assert_eq!(decoded.skip, 1);
    }

    #[test]
    fn test_string_byte_zero_fills_past_block() {
        let mut banks = RegisterBanks::new();
        banks
            .store_words(Bank::HoldingRegisters, 0, &[0x4142, 0x4344])
            .unwrap();
        // Second register is outside the block and must read as zero
        let block = holding_block(40_000, 1);
        let config =
            RegisterConfig::new(40_000, "s", RegisterFormat::StringByte).with_string_length(4);
        let decoded = decode(RawValue::Word(0x4142), &config, &block, &banks).unwrap();
        assert_eq!(decoded.value, DisplayValue::Text("AB".into()));
    }

    #[test]
    fn test_string_word() {
        let mut banks = RegisterBanks::new();
        banks.store_words(Bank::InputRegisters, 0, &[72, 105]).unwrap();
        let block = holding_block(30_000, 2);
        let config =
            RegisterConfig::new(30_000, "s", RegisterFormat::StringWord).with_string_length(2);
        let decoded = decode(RawValue::Word(72), &config, &block, &banks).unwrap();
        assert_eq!(decoded.value, DisplayValue::Text("Hi".into()));
        assert_eq!(decoded.skip, 1);
    }

    #[test]
    fn test_string_word_zero_length() {
        let banks = RegisterBanks::new();
        let block = holding_block(30_000, 2);
        let config = RegisterConfig::new(30_000, "s", RegisterFormat::StringWord);
        let decoded = decode(RawValue::Word(0), &config, &block, &banks).unwrap();
        assert_eq!(decoded.value, DisplayValue::Text(String::new()));
        assert_eq!(decoded.skip, 0);
    }

    #[test]
    fn test_invalid_code_point_is_replaced() {
        assert_eq!(words_to_char_string(&[0xD800, 65]), "\u{FFFD}A");
    }

    #[test]
    fn test_word_formats() {
        let banks = RegisterBanks::new();
        let block = holding_block(40_000, 1);
        let hex = RegisterConfig::new(40_000, "h", RegisterFormat::Hex);
        let boolean = RegisterConfig::new(40_000, "b", RegisterFormat::Boolean);

        let decoded = decode(RawValue::Word(0x00ab), &hex, &block, &banks).unwrap();
        assert_eq!(decoded.value, DisplayValue::Hex("0x00AB".into()));
        let decoded = decode(RawValue::Word(2), &boolean, &block, &banks).unwrap();
        assert_eq!(decoded.value, DisplayValue::Bool(true));
    }

    #[test]
    fn test_bits_pass_through() {
        let banks = RegisterBanks::new();
        let block = holding_block(0, 4);
        for format in [RegisterFormat::Decimal, RegisterFormat::Hex, RegisterFormat::Boolean] {
            let config = RegisterConfig::new(0, "c", format);
            let decoded = decode(RawValue::Bit(true), &config, &block, &banks).unwrap();
            assert_eq!(decoded.value, DisplayValue::Bit(true));
        }
        let config = RegisterConfig::new(0, "c", RegisterFormat::Float);
        let decoded = decode(RawValue::Bit(true), &config, &block, &banks).unwrap();
        assert_eq!(decoded, Decoded::single(DisplayValue::NotAvailable));
    }

    #[test]
    fn test_render_block_applies_skips_and_defaults() {
        let mut banks = RegisterBanks::new();
        let bits = 3.5f32.to_bits();
        banks
            .store_words(
                Bank::HoldingRegisters,
                0,
                &[(bits >> 16) as u16, (bits & 0xFFFF) as u16, 9],
            )
            .unwrap();
        let block = holding_block(40_000, 3);
        let mut map = HashMap::new();
        map.insert(
            40_000,
            RegisterConfig::new(40_000, "Temp", RegisterFormat::Float),
        );

        let rows = render_block(&block, &map, &banks).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Temp");
        assert_eq!(rows[0].value, DisplayValue::Float(3.5));
        assert_eq!(rows[1].address, 40_002);
        assert_eq!(rows[1].name, "Register 40002");
        assert_eq!(rows[1].value, DisplayValue::Decimal(9));
    }
}
