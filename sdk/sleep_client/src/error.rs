//! Error taxonomy for the client.
//!
//! Validation failures are raised before any round-trip. Ledger rejections
//! mirror the contract's error codes and are never retried.

use std::fmt;

use sleep_guard::ContractError;
use thiserror::Error;

/// Input rejected locally, before anything reaches the ledger or the
/// disclosure service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} = {value} is outside {min}..={max}")]
    FieldOutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
    #[error("value {value} does not fit in {bits} bits")]
    WidthOverflow { value: u64, bits: u32 },
    #[error("expected {expected} handles, got {actual}")]
    HandleCount { expected: usize, actual: usize },
    #[error("handle {index} carries the wrong type tag")]
    HandleType { index: usize },
    #[error("too many inputs for one proof")]
    TooManyInputs,
    #[error("public key cannot encrypt the batch")]
    Encryption,
    #[error("nothing to decrypt")]
    EmptyBatch,
    #[error("grant duration {0} days is outside 1..=30")]
    GrantDuration(u32),
    #[error("invalid address {0}")]
    InvalidAddress(String),
    #[error("invalid handle {0}")]
    InvalidHandle(String),
}

/// A ledger operation was refused by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LedgerRejection {
    #[error("contract is not initialized")]
    NotInitialized,
    #[error("profile already exists")]
    ProfileAlreadyExists,
    #[error("profile not created")]
    ProfileNotCreated,
    #[error("data already submitted for this date")]
    DataAlreadySubmittedForDate,
    #[error("entry index out of range")]
    InvalidIndex,
    #[error("caller is not authorized")]
    Unauthorized,
    #[error("input proof rejected")]
    InvalidProof,
    #[error("handles rejected")]
    InvalidHandles,
    #[error("contract error code {0}")]
    Other(u32),
}

impl From<ContractError> for LedgerRejection {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::NotInitialized => LedgerRejection::NotInitialized,
            ContractError::ProfileAlreadyExists => LedgerRejection::ProfileAlreadyExists,
            ContractError::ProfileNotCreated => LedgerRejection::ProfileNotCreated,
            ContractError::DataAlreadySubmittedForDate => {
                LedgerRejection::DataAlreadySubmittedForDate
            }
            ContractError::InvalidIndex => LedgerRejection::InvalidIndex,
            ContractError::Unauthorized => LedgerRejection::Unauthorized,
            ContractError::InvalidProof => LedgerRejection::InvalidProof,
            ContractError::InvalidHandles => LedgerRejection::InvalidHandles,
            other => LedgerRejection::Other(other as u32),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrantError {
    #[error("signature request declined")]
    Denied,
    #[error("grant expired")]
    Expired,
    #[error("grant does not cover the requested ledgers")]
    ScopeMismatch,
    #[error("grant document could not be encoded: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisclosureError {
    #[error("disclosure rejected: {0}")]
    Rejected(String),
    #[error("grant expired at the disclosure service")]
    GrantExpired,
    #[error("ledger outside the grant scope")]
    OutOfScope,
    #[error("subject or ledger not allowed on a handle")]
    NotAllowed,
    #[error("no value returned for a requested handle")]
    MissingValue,
    #[error("sealed value could not be opened")]
    Unseal,
    #[error("value exceeds its declared width")]
    Width,
    #[error("disclosure service unavailable: {0}")]
    Unavailable(String),
}

impl DisclosureError {
    /// Rejections that a freshly signed grant can cure.
    pub fn is_grant_related(&self) -> bool {
        matches!(self, DisclosureError::GrantExpired | DisclosureError::OutOfScope)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Ledger(#[from] LedgerRejection),
    #[error(transparent)]
    Grant(#[from] GrantError),
    #[error(transparent)]
    Disclosure(#[from] DisclosureError),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn transport(msg: impl fmt::Display) -> Self {
        ClientError::Transport(msg.to_string())
    }
}

/// Step of a session operation, reported before it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Encrypting,
    Submitting,
    Confirming,
    Authorizing,
    Reading,
    Signing,
    Decrypting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Encrypting => "encrypting",
            Phase::Submitting => "submitting",
            Phase::Confirming => "confirming",
            Phase::Authorizing => "authorizing",
            Phase::Reading => "reading",
            Phase::Signing => "signing",
            Phase::Decrypting => "decrypting",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{phase} failed: {source}")]
pub struct SessionError {
    pub phase: Phase,
    #[source]
    pub source: ClientError,
}

impl SessionError {
    pub fn new(phase: Phase, source: impl Into<ClientError>) -> Self {
        Self {
            phase,
            source: source.into(),
        }
    }
}
