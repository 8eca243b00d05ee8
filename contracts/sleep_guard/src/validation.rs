use common::{handle_type, FheType};
use soroban_sdk::{BytesN, Vec};

use crate::types::ContractError;

/// Declared type of each entry field, in submission order: bedtime,
/// wake time, duration × 10, deep-sleep ratio, wake count, sleep score.
pub const ENTRY_LAYOUT: [FheType; 6] = [
    FheType::Uint16,
    FheType::Uint16,
    FheType::Uint16,
    FheType::Uint8,
    FheType::Uint8,
    FheType::Uint8,
];

pub const IDX_DURATION: u32 = 2;
pub const IDX_DEEP_SLEEP: u32 = 3;
pub const IDX_SCORE: u32 = 5;

/// Validate the handle list of a submission.
/// There must be exactly one handle per field and each handle's embedded
/// type tag must match the field's declared width.
pub fn validate_handles(handles: &Vec<BytesN<32>>) -> Result<(), ContractError> {
    if handles.len() as usize != ENTRY_LAYOUT.len() {
        return Err(ContractError::InvalidHandles);
    }
    for (i, expected) in ENTRY_LAYOUT.iter().enumerate() {
        let handle = handles.get(i as u32).ok_or(ContractError::InvalidHandles)?;
        if handle_type(&handle) != Some(*expected) {
            return Err(ContractError::InvalidHandles);
        }
    }
    Ok(())
}
