use std::fmt;

use common::{handle_index_of, handle_type_of, FheType};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DisclosureError, ValidationError};

/// A 32-byte ciphertext handle.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(pub [u8; 32]);

impl Handle {
    pub fn fhe_type(&self) -> Option<FheType> {
        handle_type_of(&self.0)
    }

    pub fn index(&self) -> u8 {
        handle_index_of(&self.0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, ValidationError> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out)
            .map_err(|_| ValidationError::InvalidHandle(s.to_string()))?;
        Ok(Handle(out))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}…)", &self.to_hex()[..12])
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Handle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Handle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Handle::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A handle paired with the strkey of the ledger that minted it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HandleRef {
    pub handle: Handle,
    pub ledger: String,
}

impl HandleRef {
    pub fn new(handle: Handle, ledger: impl Into<String>) -> Self {
        Self {
            handle,
            ledger: ledger.into(),
        }
    }
}

/// A disclosed plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearValue {
    Bool(bool),
    Uint(u64),
}

impl ClearValue {
    /// Interprets a raw plaintext according to the handle's declared type.
    pub fn typed(raw: u64, fhe_type: FheType) -> Result<Self, DisclosureError> {
        if !fhe_type.fits(raw) {
            return Err(DisclosureError::Width);
        }
        Ok(match fhe_type {
            FheType::Bool => ClearValue::Bool(raw == 1),
            _ => ClearValue::Uint(raw),
        })
    }

    pub fn as_u64(&self) -> u64 {
        match self {
            ClearValue::Bool(b) => *b as u64,
            ClearValue::Uint(v) => *v,
        }
    }
}
