//! Per-server register storage

use crate::address::{locate, Bank, BANK_SIZE};
use crate::error::{ModelError, Result};
use crate::value::RawValue;

/// The four fixed-size banks of one server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterBanks {
    coils: Vec<bool>,
    discrete_inputs: Vec<bool>,
    input_registers: Vec<u16>,
    holding_registers: Vec<u16>,
}

impl Default for RegisterBanks {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBanks {
    pub fn new() -> Self {
        Self {
            coils: vec![false; BANK_SIZE],
            discrete_inputs: vec![false; BANK_SIZE],
            input_registers: vec![0; BANK_SIZE],
            holding_registers: vec![0; BANK_SIZE],
        }
    }

    /// Raw value at a global address
    pub fn read(&self, address: u16) -> Result<RawValue> {
        let location = locate(address);
        let index = location.index()?;
        Ok(match location.bank {
            Bank::Coils => RawValue::Bit(self.coils[index]),
            Bank::DiscreteInputs => RawValue::Bit(self.discrete_inputs[index]),
            Bank::InputRegisters => RawValue::Word(self.input_registers[index]),
            Bank::HoldingRegisters => RawValue::Word(self.holding_registers[index]),
        })
    }

    /// Word at a global address, read from an explicit word bank
    pub fn word_in(&self, bank: Bank, address: u16) -> Result<u16> {
        let words = self.words(bank)?;
        let out_of_range = || ModelError::AddressOutOfRange {
            address,
            bank: bank.name(),
        };
        let index = address.checked_sub(bank.base()).ok_or_else(out_of_range)?;
        words.get(usize::from(index)).copied().ok_or_else(out_of_range)
    }

    /// Copy polled bits into a bit bank starting at `offset`
    pub fn store_bits(&mut self, bank: Bank, offset: u16, values: &[bool]) -> Result<()> {
        let slots = match bank {
            Bank::Coils => &mut self.coils,
            Bank::DiscreteInputs => &mut self.discrete_inputs,
            _ => {
                return Err(ModelError::BankKind {
                    bank: bank.name(),
                    kind: "bit",
                })
            }
        };
        let range = slice_range(bank, offset, values.len())?;
        slots[range].copy_from_slice(values);
        Ok(())
    }

    /// Copy polled words into a word bank starting at `offset`
    pub fn store_words(&mut self, bank: Bank, offset: u16, values: &[u16]) -> Result<()> {
        let slots = match bank {
            Bank::InputRegisters => &mut self.input_registers,
            Bank::HoldingRegisters => &mut self.holding_registers,
            _ => {
                return Err(ModelError::BankKind {
                    bank: bank.name(),
                    kind: "word",
                })
            }
        };
        let range = slice_range(bank, offset, values.len())?;
        slots[range].copy_from_slice(values);
        Ok(())
    }

    fn words(&self, bank: Bank) -> Result<&[u16]> {
        match bank {
            Bank::InputRegisters => Ok(&self.input_registers),
            Bank::HoldingRegisters => Ok(&self.holding_registers),
            _ => Err(ModelError::BankKind {
                bank: bank.name(),
                kind: "word",
            }),
        }
    }
}

fn slice_range(bank: Bank, offset: u16, len: usize) -> Result<std::ops::Range<usize>> {
    let start = usize::from(offset);
    let end = start + len;
    if end > BANK_SIZE {
        return Err(ModelError::AddressOutOfRange {
            address: bank.base().saturating_add(offset),
            bank: bank.name(),
        });
    }
    Ok(start..end)
}
