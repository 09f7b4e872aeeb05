//! Flat Modbus address space
//!
//! Maps a global register address onto one of the four register banks:
//!
//! ```text
//! [0, 10000)       Coils             offset = address
//! [10000, 20000)   DiscreteInputs    offset = address - 10000
//! [30000, 40000)   InputRegisters    offset = address - 30000
//! everything else  HoldingRegisters  offset = address - 40000
//! ```
//!
//! The `[20000, 30000)` range has no bank of its own and falls through to
//! HoldingRegisters with a negative offset. Such locations are not indexable
//! and blocks covering them are rejected by [`crate::planner::validate_block`].

use std::fmt;

use crate::error::{ModelError, Result};

/// Number of slots in every register bank
pub const BANK_SIZE: usize = 10_000;

/// One of the four register banks of a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bank {
    Coils,
    DiscreteInputs,
    InputRegisters,
    HoldingRegisters,
}

impl Bank {
    /// Global address of slot 0
    pub const fn base(self) -> u16 {
        match self {
            Bank::Coils => 0,
            Bank::DiscreteInputs => 10_000,
            Bank::InputRegisters => 30_000,
            Bank::HoldingRegisters => 40_000,
        }
    }

    /// Single-bit banks hold bools, the others hold 16-bit words
    pub const fn is_bit(self) -> bool {
        matches!(self, Bank::Coils | Bank::DiscreteInputs)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Bank::Coils => "coils",
            Bank::DiscreteInputs => "discrete inputs",
            Bank::InputRegisters => "input registers",
            Bank::HoldingRegisters => "holding registers",
        }
    }

    /// Inverse of [`locate`] for indexable slots
    pub fn address_of(self, offset: usize) -> Result<u16> {
        if offset >= BANK_SIZE {
            return Err(ModelError::AddressOutOfRange {
                address: self.base().saturating_add(offset.min(u16::MAX as usize) as u16),
                bank: self.name(),
            });
        }
        Ok(self.base() + offset as u16)
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of routing a global address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub address: u16,
    pub bank: Bank,
    /// Signed so that gap addresses keep their real distance from the base
    pub offset: i32,
}

impl Location {
    /// Slot index inside the bank, if the offset lands in `[0, BANK_SIZE)`
    pub fn index(&self) -> Result<usize> {
        if (0..BANK_SIZE as i32).contains(&self.offset) {
            Ok(self.offset as usize)
        } else {
            Err(ModelError::AddressOutOfRange {
                address: self.address,
                bank: self.bank.name(),
            })
        }
    }

    pub fn is_indexable(&self) -> bool {
        self.index().is_ok()
    }
}

/// Route a global address to its bank and offset
pub fn locate(address: u16) -> Location {
    let bank = match address {
        0..=9_999 => Bank::Coils,
        10_000..=19_999 => Bank::DiscreteInputs,
        30_000..=39_999 => Bank::InputRegisters,
        _ => Bank::HoldingRegisters,
    };
    Location {
        address,
        bank,
        offset: i32::from(address) - i32::from(bank.base()),
    }
}

/// Bank a multi-register value continues in (float and string formats)
///
/// Word formats never continue into a bit bank: anything below 40000 continues
/// in InputRegisters.
pub fn word_family(address: u16) -> Bank {
    if address < 40_000 {
        Bank::InputRegisters
    } else {
        Bank::HoldingRegisters
    }
}
