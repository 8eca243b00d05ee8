use soroban_sdk::{contracttype, BytesN};

/// Version byte written into every handle minted by this suite.
pub const HANDLE_VERSION: u8 = 1;
/// Index byte value used for handles produced by computation, not input.
pub const COMPUTED_INDEX: u8 = 0xff;

pub const HANDLE_INDEX_BYTE: usize = 29;
pub const HANDLE_TYPE_BYTE: usize = 30;
pub const HANDLE_VERSION_BYTE: usize = 31;

/// Declared type of an encrypted value.
///
/// The discriminant is the tag stored in byte 30 of the value's handle, so a
/// handle can be checked for width without asking the ledger.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FheType {
    Bool = 0,
    Uint8 = 2,
    Uint16 = 3,
    Uint32 = 4,
    Uint64 = 5,
}

impl FheType {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(FheType::Bool),
            2 => Some(FheType::Uint8),
            3 => Some(FheType::Uint16),
            4 => Some(FheType::Uint32),
            5 => Some(FheType::Uint64),
            _ => None,
        }
    }

    /// Bit width of the plaintext.
    pub fn bits(self) -> u32 {
        match self {
            FheType::Bool => 1,
            FheType::Uint8 => 8,
            FheType::Uint16 => 16,
            FheType::Uint32 => 32,
            FheType::Uint64 => 64,
        }
    }

    /// Largest plaintext representable at this width.
    pub fn max_value(self) -> u64 {
        match self {
            FheType::Bool => 1,
            FheType::Uint8 => u8::MAX as u64,
            FheType::Uint16 => u16::MAX as u64,
            FheType::Uint32 => u32::MAX as u64,
            FheType::Uint64 => u64::MAX,
        }
    }

    pub fn fits(self, value: u64) -> bool {
        value <= self.max_value()
    }
}

/// Type tag carried by a raw handle, if it is one of ours.
pub fn handle_type_of(handle: &[u8; 32]) -> Option<FheType> {
    if handle[HANDLE_VERSION_BYTE] != HANDLE_VERSION {
        return None;
    }
    FheType::from_tag(handle[HANDLE_TYPE_BYTE])
}

/// Input position recorded in a raw handle (`COMPUTED_INDEX` for results).
pub fn handle_index_of(handle: &[u8; 32]) -> u8 {
    handle[HANDLE_INDEX_BYTE]
}

pub fn handle_type(handle: &BytesN<32>) -> Option<FheType> {
    handle_type_of(&handle.to_array())
}

/// Overwrites the trailing metadata bytes of a digest to form a handle.
pub fn stamp_handle(mut digest: [u8; 32], index: u8, fhe_type: FheType) -> [u8; 32] {
    digest[HANDLE_INDEX_BYTE] = index;
    digest[HANDLE_TYPE_BYTE] = fhe_type.tag();
    digest[HANDLE_VERSION_BYTE] = HANDLE_VERSION;
    digest
}
