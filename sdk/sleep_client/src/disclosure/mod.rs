//! Off-ledger disclosure of ciphertext handles.

mod local;
pub mod sealing;

pub use local::LocalDisclosureService;
pub use sealing::SealedValue;

use common::FheType;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, DisclosureError};
use crate::grant::TypedDataDocument;
use crate::handle::{Handle, HandleRef};

/// One batch of handles plus the grant that authorizes revealing them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosureRequest {
    pub handles: Vec<HandleRef>,
    pub document: TypedDataDocument,
    /// Hex Ed25519 signature of the subject over the document digest.
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosureResponse {
    pub values: Vec<SealedValue>,
}

/// Reveals handles to the holder of a valid grant. Implementations either
/// answer for every requested handle or reject the whole batch.
pub trait DisclosureService {
    fn disclose(&self, request: &DisclosureRequest) -> Result<DisclosureResponse, DisclosureError>;
}

/// A ciphertext as held by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCiphertext {
    pub value: u128,
    pub fhe_type: FheType,
    /// Strkey of the minting ledger.
    pub ledger: String,
}

/// Read access to the executor's ciphertext store and ACL.
pub trait ExecutorView {
    fn stored_ciphertext(&self, handle: &Handle) -> Result<Option<StoredCiphertext>, ClientError>;

    fn is_allowed(&self, handle: &Handle, account: &str) -> Result<bool, ClientError>;
}
