//! Register model for Modbus polling
//!
//! Pure, synchronous building blocks shared by the polling service:
//!
//! - [`address`]: routing of flat Modbus addresses onto the four register banks
//! - [`banks`]: fixed-size per-server register storage
//! - [`codec`]: decoding raw registers into display values
//! - [`planner`]: merging and splitting register blocks within the request limit
//! - [`types`]: serializable register and block configuration

pub mod address;
pub mod banks;
pub mod codec;
pub mod error;
pub mod planner;
pub mod types;
pub mod value;

pub use address::{locate, word_family, Bank, Location, BANK_SIZE};
pub use banks::RegisterBanks;
pub use codec::{decode, render_block, Decoded};
pub use error::{ModelError, Result};
pub use planner::{
    apply_blocks, merge_blocks, rebuild_register_map, split_block, validate_block,
    MAX_BLOCK_LENGTH,
};
pub use types::{RegisterBlock, RegisterConfig, RegisterFormat};
pub use value::{DisplayValue, RawValue, RegisterRow};
