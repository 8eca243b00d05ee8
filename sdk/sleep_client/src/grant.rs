//! Decryption grants and their cache.
//!
//! A grant is a throwaway secp256k1 key pair whose public half the subject
//! signs into a typed document together with the ledgers it may be used
//! against and a validity window. The disclosure service seals revealed
//! values to that public key.
//!
//! Per subject, the cache moves through
//!
//! ```text
//! Absent ──sign──▶ Valid ──time──▶ Expired ──sign──▶ Valid
//!                    └──wider scope──▶ ScopeMismatch ──sign──▶ Valid
//! ```
//!
//! A `Valid` grant is reused without asking the signer again. Leaving
//! `ScopeMismatch` signs over the union of the cached and requested ledgers,
//! so a caller alternating between ledgers signs once per new ledger. A
//! declined signature leaves the cache slot as it was.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::validate_grant_duration;
use crate::error::{GrantError, ValidationError};
use crate::fields::SECONDS_PER_DAY;
use crate::signer::DecryptionSigner;

pub const PRIMARY_TYPE: &str = "UserDecryptRequestVerification";

// ── Clock ────────────────────────────────────────────────────────────────────

/// Source of "now" in Unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Settable clock, shared between components under test.
#[derive(Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self(Arc::new(AtomicU64::new(now)))
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Typed document ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantDomain {
    pub name: String,
    pub version: String,
    /// Hex network id.
    pub chain_id: String,
    /// Strkey of the executor whose ACL the grant is checked against.
    pub verifying_contract: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantMessage {
    /// SEC1-compressed grant public key, hex.
    pub public_key: String,
    pub contract_addresses: Vec<String>,
    pub subject: String,
    pub start_timestamp: u64,
    pub duration_days: u32,
}

/// The structured document the subject signs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedDataDocument {
    pub domain: GrantDomain,
    pub primary_type: String,
    pub types: BTreeMap<String, Vec<TypedField>>,
    pub message: GrantMessage,
}

impl TypedDataDocument {
    pub fn new(domain: GrantDomain, message: GrantMessage) -> Self {
        let field = |name: &str, kind: &str| TypedField {
            name: name.to_string(),
            kind: kind.to_string(),
        };
        let mut types = BTreeMap::new();
        types.insert(
            PRIMARY_TYPE.to_string(),
            vec![
                field("public_key", "bytes"),
                field("contract_addresses", "address[]"),
                field("subject", "address"),
                field("start_timestamp", "uint64"),
                field("duration_days", "uint32"),
            ],
        );
        Self {
            domain,
            primary_type: PRIMARY_TYPE.to_string(),
            types,
            message,
        }
    }

    /// SHA-256 over the canonical JSON encoding. This is what gets signed.
    pub fn digest(&self) -> Result<[u8; 32], GrantError> {
        let encoded = serde_json::to_vec(self).map_err(|e| GrantError::Encoding(e.to_string()))?;
        Ok(Sha256::digest(&encoded).into())
    }

    pub fn expires_at(&self) -> u64 {
        self.message
            .start_timestamp
            .saturating_add(self.message.duration_days as u64 * SECONDS_PER_DAY)
    }
}

// ── Grant ────────────────────────────────────────────────────────────────────

/// Subject plus the ledgers a grant may be used against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantScope {
    pub subject: String,
    pub ledgers: BTreeSet<String>,
}

impl GrantScope {
    pub fn covers(&self, ledgers: &BTreeSet<String>) -> bool {
        ledgers.is_subset(&self.ledgers)
    }
}

#[derive(Clone)]
pub struct DecryptionGrant {
    secret: SecretKey,
    pub scope: GrantScope,
    pub document: TypedDataDocument,
    pub signature: Vec<u8>,
}

impl DecryptionGrant {
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public_key_hex(&self) -> &str {
        &self.document.message.public_key
    }

    pub fn start_timestamp(&self) -> u64 {
        self.document.message.start_timestamp
    }

    pub fn duration_days(&self) -> u32 {
        self.document.message.duration_days
    }

    pub fn is_valid_at(&self, now: u64) -> bool {
        now >= self.start_timestamp() && now < self.document.expires_at()
    }
}

impl fmt::Debug for DecryptionGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionGrant")
            .field("scope", &self.scope)
            .field("public_key", &self.public_key_hex())
            .field("start_timestamp", &self.start_timestamp())
            .field("duration_days", &self.duration_days())
            .finish_non_exhaustive()
    }
}

/// Cache state for one subject and one requested scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantState {
    Absent,
    Valid,
    Expired,
    ScopeMismatch,
}

/// Domain and lifetime every grant is issued with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantSettings {
    pub domain_name: String,
    pub domain_version: String,
    pub chain_id: String,
    pub verifying_contract: String,
    pub duration_days: u32,
}

impl GrantSettings {
    pub fn domain(&self) -> GrantDomain {
        GrantDomain {
            name: self.domain_name.clone(),
            version: self.domain_version.clone(),
            chain_id: self.chain_id.clone(),
            verifying_contract: self.verifying_contract.clone(),
        }
    }
}

pub struct GrantManager {
    settings: GrantSettings,
    clock: Arc<dyn Clock>,
    cache: HashMap<String, DecryptionGrant>,
}

impl GrantManager {
    pub fn new(settings: GrantSettings, clock: Arc<dyn Clock>) -> Result<Self, ValidationError> {
        validate_grant_duration(settings.duration_days)?;
        Ok(Self {
            settings,
            clock,
            cache: HashMap::new(),
        })
    }

    pub fn settings(&self) -> &GrantSettings {
        &self.settings
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn state(&self, subject: &str, ledgers: &BTreeSet<String>) -> GrantState {
        match self.cache.get(subject) {
            None => GrantState::Absent,
            Some(grant) if !grant.is_valid_at(self.clock.now()) => GrantState::Expired,
            Some(grant) if !grant.scope.covers(ledgers) => GrantState::ScopeMismatch,
            Some(_) => GrantState::Valid,
        }
    }

    pub fn cached(&self, subject: &str) -> Option<&DecryptionGrant> {
        self.cache.get(subject)
    }

    /// Returns a grant for `signer` covering `ledgers`, signing a new one
    /// only when the cached grant is absent, expired or too narrow.
    pub fn obtain<S: DecryptionSigner + ?Sized>(
        &mut self,
        signer: &S,
        ledgers: &BTreeSet<String>,
    ) -> Result<&DecryptionGrant, GrantError> {
        let subject = signer.address();
        let state = self.state(&subject, ledgers);
        if state != GrantState::Valid {
            let scope: BTreeSet<String> = match (state, self.cache.get(&subject)) {
                (GrantState::ScopeMismatch, Some(cached)) => {
                    cached.scope.ledgers.union(ledgers).cloned().collect()
                }
                _ => ledgers.clone(),
            };
            debug!(
                subject = %subject,
                ?state,
                ledgers = scope.len(),
                "issuing decryption grant"
            );
            let grant = self.issue(signer, &subject, &scope)?;
            self.cache.insert(subject.clone(), grant);
        } else {
            debug!(subject = %subject, "reusing decryption grant");
        }
        self.cache.get(&subject).ok_or(GrantError::Expired)
    }

    /// Drops the cached grant, e.g. after the disclosure service refused it.
    pub fn invalidate(&mut self, subject: &str) {
        if self.cache.remove(subject).is_some() {
            debug!(subject = %subject, "decryption grant invalidated");
        }
    }

    fn issue<S: DecryptionSigner + ?Sized>(
        &self,
        signer: &S,
        subject: &str,
        ledgers: &BTreeSet<String>,
    ) -> Result<DecryptionGrant, GrantError> {
        let secret = SecretKey::random(&mut OsRng);
        let public_key = hex::encode(secret.public_key().to_encoded_point(true).as_bytes());

        let document = TypedDataDocument::new(
            self.settings.domain(),
            GrantMessage {
                public_key,
                contract_addresses: ledgers.iter().cloned().collect(),
                subject: subject.to_string(),
                start_timestamp: self.clock.now(),
                duration_days: self.settings.duration_days,
            },
        );
        let signature = signer.sign_typed_data(&document)?;

        Ok(DecryptionGrant {
            secret,
            scope: GrantScope {
                subject: subject.to_string(),
                ledgers: ledgers.clone(),
            },
            document,
            signature,
        })
    }
}
