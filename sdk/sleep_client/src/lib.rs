//! Client side of the SleepGuard protocol.
//!
//! - [`payload`] encrypts a night's metrics into six handles and a proof.
//! - [`ledger`] is the port to the aggregate store, with a Soroban adapter.
//! - [`grant`] derives, caches and expires decryption grants.
//! - [`decryptor`] reveals a batch of handles through a [`disclosure`] service.
//! - [`stats`] turns revealed sums back into averages.
//! - [`session`] strings these together for one subject.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod decryptor;
pub mod disclosure;
pub mod error;
pub mod fields;
pub mod grant;
pub mod handle;
pub mod ledger;
pub mod payload;
pub mod session;
pub mod signer;
pub mod stats;

pub use config::{ClientConfig, NetworkConfig};
pub use decryptor::BatchDecryptor;
pub use disclosure::{DisclosureService, LocalDisclosureService};
pub use error::{
    ClientError, DisclosureError, GrantError, LedgerRejection, Phase, SessionError,
    ValidationError,
};
pub use fields::{day_key, duration_tenths_between, SleepMetrics};
pub use grant::{Clock, DecryptionGrant, GrantManager, GrantSettings, GrantState, ManualClock, SystemClock};
pub use handle::{ClearValue, Handle, HandleRef};
pub use ledger::{SleepLedger, SorobanLedger};
pub use payload::{build_sleep_payload, EncryptedInputBuilder, EncryptedPayload};
pub use session::{EntryReport, PhaseObserver, SleepGuardSession, TracingObserver};
pub use signer::{DecryptionSigner, LocalWallet};
pub use stats::{reconstruct, SleepStats};
