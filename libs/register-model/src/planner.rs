//! Block planning
//!
//! Keeps every stored block within the 125-register limit of one Modbus read
//! request. Incoming blocks are merged into the first existing block they
//! start inside or right after, as long as the combined span still fits one
//! request and one bank. Otherwise they are split into request-sized chunks
//! and appended.

use std::collections::HashMap;

use tracing::debug;

use crate::address::locate;
use crate::error::{ModelError, Result};
use crate::types::{RegisterBlock, RegisterConfig};

/// Maximum number of registers in one read request
pub const MAX_BLOCK_LENGTH: u16 = 125;

/// Reject blocks that cannot be polled or rendered safely
pub fn validate_block(block: &RegisterBlock) -> Result<()> {
    let invalid = |reason: String| ModelError::invalid_block(block.start_address, block.length, reason);

    if block.length == 0 {
        return Err(invalid("length must be at least 1".to_string()));
    }
    let last = block.end() - 1;
    let Ok(last) = u16::try_from(last) else {
        return Err(invalid("span runs past address 65535".to_string()));
    };

    let first = locate(block.start_address);
    let last = locate(last);
    if first.bank != last.bank || !first.is_indexable() || !last.is_indexable() {
        return Err(invalid(format!(
            "span must lie inside one register bank (starts in {}, ends in {})",
            first.bank, last.bank
        )));
    }

    if let Some(register) = block.registers.iter().find(|r| !block.contains(r.address)) {
        return Err(invalid(format!(
            "register {} ({}) lies outside the block",
            register.address, register.name
        )));
    }
    Ok(())
}

/// Split a block into consecutive chunks of at most [`MAX_BLOCK_LENGTH`]
///
/// Each register config lands in the chunk containing its address; configs
/// outside the span are dropped.
pub fn split_block(block: &RegisterBlock) -> Vec<RegisterBlock> {
    let mut chunks = Vec::new();
    let end = block.end();
    let mut current = u32::from(block.start_address);

    while current < end {
        let Ok(start) = u16::try_from(current) else {
            break;
        };
        let length = (end - current).min(u32::from(MAX_BLOCK_LENGTH)) as u16;
        let chunk_end = current + u32::from(length);
        let registers = block
            .registers
            .iter()
            .filter(|r| (current..chunk_end).contains(&u32::from(r.address)))
            .cloned()
            .collect();
        chunks.push(RegisterBlock::new(start, length).with_registers(registers));
        current += u32::from(length);
    }

    chunks
}

/// Merge incoming blocks into `blocks`
///
/// Chunks produced by splitting are appended only after every incoming block
/// has been scanned, so they never merge with each other in the same pass.
pub fn merge_blocks(blocks: &mut Vec<RegisterBlock>, incoming: &[RegisterBlock]) {
    let mut appended = Vec::new();

    for new_block in incoming {
        let candidate = blocks.iter_mut().find_map(|existing| {
            merged_length(existing, new_block).map(|total| (existing, total))
        });

        let merged = match candidate {
            Some((existing, total)) => {
                existing.length = total;
                merge_registers(&mut existing.registers, &new_block.registers);
                debug!(
                    "Merged block {}+{} into block at {} (length {})",
                    new_block.start_address, new_block.length, existing.start_address, total
                );
                true
            }
            None => false,
        };

        if !merged {
            let chunks = split_block(new_block);
            debug!(
                "Split block {}+{} into {} chunk(s)",
                new_block.start_address,
                new_block.length,
                chunks.len()
            );
            appended.extend(chunks);
        }
    }

    blocks.extend(appended);
}

/// Length of `existing` after absorbing `incoming`, if the two may merge
///
/// `incoming` must start inside or right after `existing`, and the combined
/// span must fit one request and stay inside one bank.
fn merged_length(existing: &RegisterBlock, incoming: &RegisterBlock) -> Option<u16> {
    let start = u32::from(incoming.start_address);
    if start < u32::from(existing.start_address) || start > existing.end() {
        return None;
    }
    let total = incoming.end().max(existing.end()) - u32::from(existing.start_address);
    if total > u32::from(MAX_BLOCK_LENGTH) {
        return None;
    }
    let total = total as u16;
    validate_block(&RegisterBlock::new(existing.start_address, total))
        .ok()
        .map(|()| total)
}

/// Same address replaces in place, new addresses are appended
fn merge_registers(target: &mut Vec<RegisterConfig>, incoming: &[RegisterConfig]) {
    for register in incoming {
        match target.iter_mut().find(|r| r.address == register.address) {
            Some(existing) => *existing = register.clone(),
            None => target.push(register.clone()),
        }
    }
}

/// Register map built from the incoming blocks only, last write wins
pub fn rebuild_register_map(incoming: &[RegisterBlock]) -> HashMap<u16, RegisterConfig> {
    incoming
        .iter()
        .flat_map(|block| block.registers.iter())
        .map(|register| (register.address, register.clone()))
        .collect()
}

/// Validate a batch, then merge it and replace the register map
///
/// Nothing is modified when any block of the batch is invalid.
pub fn apply_blocks(
    blocks: &mut Vec<RegisterBlock>,
    register_map: &mut HashMap<u16, RegisterConfig>,
    incoming: &[RegisterBlock],
) -> Result<()> {
    for block in incoming {
        validate_block(block)?;
    }
    *register_map = rebuild_register_map(incoming);
    merge_blocks(blocks, incoming);
    Ok(())
}
