//! The ledger port and its Soroban adapter.
//!
//! Session code talks to [`SleepLedger`] in terms of strkeys and [`Handle`]s.
//! [`SorobanLedger`] implements it, and the executor read side used by the
//! disclosure service, on top of the generated contract clients.

use std::fmt::Debug;

use common::{strkey_bytes, PaillierPublicKey, MAX_STRKEY_LEN};
use fhe_executor::{ExecutorError, FheExecutorContractClient};
use sleep_guard::{ContractError, GlobalAggregate, SleepGuardContractClient, UserAggregate};
use soroban_sdk::{Address, Bytes, BytesN, Env, InvokeError, Vec as SorobanVec};
use stellar_strkey::Strkey;
use tracing::debug;

use crate::disclosure::{ExecutorView, StoredCiphertext};
use crate::error::{ClientError, LedgerRejection, ValidationError};
use crate::handle::Handle;
use crate::payload::EncryptedPayload;

/// A participant's profile as stored on the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileView {
    pub owner: String,
    pub created_at: u64,
    pub allow_aggregation: bool,
    pub allow_anonymous_report: bool,
    pub join_leaderboard: bool,
    pub total_entries: u64,
}

/// The six handles of one stored entry, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHandles {
    pub date: u32,
    pub handles: [Handle; 6],
    pub submitted_at: u64,
}

/// Handles of a set of running sums and the number of folded entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateHandles {
    pub sum_duration: Handle,
    pub sum_deep_sleep: Handle,
    pub sum_score: Handle,
    pub count: u64,
}

impl AggregateHandles {
    pub fn handles(&self) -> [Handle; 3] {
        [self.sum_duration, self.sum_deep_sleep, self.sum_score]
    }
}

/// Operations of the ledger aggregate store.
pub trait SleepLedger {
    /// Strkey of the ledger contract.
    fn ledger_address(&self) -> String;

    fn executor_address(&self) -> Result<String, ClientError>;

    fn network_id(&self) -> [u8; 32];

    fn public_key(&self) -> Result<PaillierPublicKey, ClientError>;

    fn create_profile(
        &self,
        user: &str,
        allow_aggregation: bool,
        allow_anonymous_report: bool,
    ) -> Result<(), ClientError>;

    fn update_privacy_settings(
        &self,
        user: &str,
        allow_aggregation: bool,
        allow_anonymous_report: bool,
    ) -> Result<(), ClientError>;

    fn update_leaderboard(&self, user: &str, join: bool) -> Result<(), ClientError>;

    fn has_profile(&self, user: &str) -> Result<bool, ClientError>;

    fn profile(&self, user: &str) -> Result<ProfileView, ClientError>;

    fn submit_entry(&self, user: &str, date: u32, payload: &EncryptedPayload) -> Result<u64, ClientError>;

    fn entry_index(&self, user: &str, date: u32) -> Result<Option<u64>, ClientError>;

    fn entries_count(&self, user: &str) -> Result<u64, ClientError>;

    fn entry(&self, user: &str, index: u64) -> Result<EntryHandles, ClientError>;

    fn user_aggregate(&self, caller: &str, user: &str) -> Result<AggregateHandles, ClientError>;

    fn authorize_global_read(&self, caller: &str) -> Result<(), ClientError>;

    fn global_aggregate(&self) -> Result<AggregateHandles, ClientError>;

    fn total_participants(&self) -> Result<u64, ClientError>;
}

// ── Address and handle conversions ───────────────────────────────────────────

/// Parses an account (`G…`) or contract (`C…`) strkey.
pub fn parse_address(env: &Env, strkey: &str) -> Result<Address, ValidationError> {
    match Strkey::from_string(strkey) {
        Ok(Strkey::PublicKeyEd25519(_)) | Ok(Strkey::Contract(_)) => {
            Ok(Address::from_str(env, strkey))
        }
        _ => Err(ValidationError::InvalidAddress(strkey.to_string())),
    }
}

pub fn address_strkey(address: &Address) -> Result<String, ClientError> {
    let mut buf = [0u8; MAX_STRKEY_LEN];
    let len = strkey_bytes(address, &mut buf)
        .map_err(|e| ClientError::transport(format!("unreadable address: {e:?}")))?;
    String::from_utf8(buf[..len].to_vec()).map_err(ClientError::transport)
}

fn to_bytes(env: &Env, handle: &Handle) -> BytesN<32> {
    BytesN::from_array(env, &handle.0)
}

fn from_bytes(handle: &BytesN<32>) -> Handle {
    Handle(handle.to_array())
}

/// Error types a contract invocation can fail with.
trait Rejection: Debug {
    fn into_client_error(self) -> ClientError;
}

impl Rejection for ContractError {
    fn into_client_error(self) -> ClientError {
        LedgerRejection::from(self).into()
    }
}

impl Rejection for ExecutorError {
    fn into_client_error(self) -> ClientError {
        ClientError::transport(format!("executor error {self:?}"))
    }
}

impl Rejection for soroban_sdk::Error {
    fn into_client_error(self) -> ClientError {
        ClientError::transport(format!("host error {self:?}"))
    }
}

/// Flattens the nested result of a `try_` client call.
fn settle<T, C: Debug, E: Rejection>(
    result: Result<Result<T, C>, Result<E, InvokeError>>,
) -> Result<T, ClientError> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ClientError::transport(format!("malformed response: {e:?}"))),
        Err(Ok(e)) => Err(e.into_client_error()),
        Err(Err(e)) => Err(ClientError::transport(format!("invocation failed: {e:?}"))),
    }
}

// ── Soroban adapter ──────────────────────────────────────────────────────────

/// [`SleepLedger`] over a Soroban environment.
pub struct SorobanLedger {
    env: Env,
    ledger: Address,
    ledger_strkey: String,
}

impl SorobanLedger {
    pub fn new(env: Env, ledger: &str) -> Result<Self, ClientError> {
        let address = parse_address(&env, ledger)?;
        let ledger_strkey = address_strkey(&address)?;
        Ok(Self {
            env,
            ledger: address,
            ledger_strkey,
        })
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    fn client(&self) -> SleepGuardContractClient<'_> {
        SleepGuardContractClient::new(&self.env, &self.ledger)
    }

    fn executor(&self) -> Result<FheExecutorContractClient<'_>, ClientError> {
        let executor = settle(self.client().try_get_executor())?;
        Ok(FheExecutorContractClient::new(&self.env, &executor))
    }

    fn address(&self, strkey: &str) -> Result<Address, ClientError> {
        Ok(parse_address(&self.env, strkey)?)
    }

    fn user_sums(agg: &UserAggregate) -> AggregateHandles {
        AggregateHandles {
            sum_duration: from_bytes(&agg.sum_duration),
            sum_deep_sleep: from_bytes(&agg.sum_deep_sleep),
            sum_score: from_bytes(&agg.sum_score),
            count: agg.count,
        }
    }

    fn global_sums(agg: &GlobalAggregate) -> AggregateHandles {
        AggregateHandles {
            sum_duration: from_bytes(&agg.sum_duration),
            sum_deep_sleep: from_bytes(&agg.sum_deep_sleep),
            sum_score: from_bytes(&agg.sum_score),
            count: agg.participants,
        }
    }
}

impl SleepLedger for SorobanLedger {
    fn ledger_address(&self) -> String {
        self.ledger_strkey.clone()
    }

    fn executor_address(&self) -> Result<String, ClientError> {
        let executor = settle(self.client().try_get_executor())?;
        address_strkey(&executor)
    }

    fn network_id(&self) -> [u8; 32] {
        self.env.ledger().network_id().to_array()
    }

    fn public_key(&self) -> Result<PaillierPublicKey, ClientError> {
        settle(self.executor()?.try_public_key())
    }

    fn create_profile(
        &self,
        user: &str,
        allow_aggregation: bool,
        allow_anonymous_report: bool,
    ) -> Result<(), ClientError> {
        let user = self.address(user)?;
        settle(
            self.client()
                .try_create_profile(&user, &allow_aggregation, &allow_anonymous_report),
        )
    }

    fn update_privacy_settings(
        &self,
        user: &str,
        allow_aggregation: bool,
        allow_anonymous_report: bool,
    ) -> Result<(), ClientError> {
        let user = self.address(user)?;
        settle(self.client().try_update_privacy_settings(
            &user,
            &allow_aggregation,
            &allow_anonymous_report,
        ))
    }

    fn update_leaderboard(&self, user: &str, join: bool) -> Result<(), ClientError> {
        let user = self.address(user)?;
        settle(self.client().try_update_leaderboard_participation(&user, &join))
    }

    fn has_profile(&self, user: &str) -> Result<bool, ClientError> {
        let user = self.address(user)?;
        settle(self.client().try_has_profile(&user))
    }

    fn profile(&self, user: &str) -> Result<ProfileView, ClientError> {
        let user = self.address(user)?;
        let p = settle(self.client().try_get_profile(&user))?;
        Ok(ProfileView {
            owner: address_strkey(&p.owner)?,
            created_at: p.created_at,
            allow_aggregation: p.allow_aggregation,
            allow_anonymous_report: p.allow_anonymous_report,
            join_leaderboard: p.join_leaderboard,
            total_entries: p.total_entries,
        })
    }

    fn submit_entry(&self, user: &str, date: u32, payload: &EncryptedPayload) -> Result<u64, ClientError> {
        let user = self.address(user)?;
        let mut handles = SorobanVec::new(&self.env);
        for handle in &payload.handles {
            handles.push_back(to_bytes(&self.env, handle));
        }
        let proof = Bytes::from_slice(&self.env, &payload.proof);
        let index = settle(self.client().try_submit_entry(&user, &date, &handles, &proof))?;
        debug!(date, index, "entry accepted");
        Ok(index)
    }

    fn entry_index(&self, user: &str, date: u32) -> Result<Option<u64>, ClientError> {
        let user = self.address(user)?;
        settle(self.client().try_get_entry_index(&user, &date))
    }

    fn entries_count(&self, user: &str) -> Result<u64, ClientError> {
        let user = self.address(user)?;
        settle(self.client().try_get_entries_count(&user))
    }

    fn entry(&self, user: &str, index: u64) -> Result<EntryHandles, ClientError> {
        let user = self.address(user)?;
        let e = settle(self.client().try_get_entry(&user, &index))?;
        Ok(EntryHandles {
            date: e.date,
            handles: [
                from_bytes(&e.bedtime),
                from_bytes(&e.wake_time),
                from_bytes(&e.duration),
                from_bytes(&e.deep_sleep_ratio),
                from_bytes(&e.wake_count),
                from_bytes(&e.sleep_score),
            ],
            submitted_at: e.submitted_at,
        })
    }

    fn user_aggregate(&self, caller: &str, user: &str) -> Result<AggregateHandles, ClientError> {
        let caller = self.address(caller)?;
        let user = self.address(user)?;
        let agg = settle(self.client().try_get_user_aggregate(&caller, &user))?;
        Ok(Self::user_sums(&agg))
    }

    fn authorize_global_read(&self, caller: &str) -> Result<(), ClientError> {
        let caller = self.address(caller)?;
        settle(self.client().try_authorize_global_read(&caller))
    }

    fn global_aggregate(&self) -> Result<AggregateHandles, ClientError> {
        let agg = settle(self.client().try_get_global_aggregate())?;
        Ok(Self::global_sums(&agg))
    }

    fn total_participants(&self) -> Result<u64, ClientError> {
        settle(self.client().try_total_participants())
    }
}

impl ExecutorView for SorobanLedger {
    fn stored_ciphertext(&self, handle: &Handle) -> Result<Option<StoredCiphertext>, ClientError> {
        let executor = self.executor()?;
        match executor.try_ciphertext(&to_bytes(&self.env, handle)) {
            Err(Ok(ExecutorError::HandleNotFound)) => Ok(None),
            other => {
                let ct = settle(other)?;
                Ok(Some(StoredCiphertext {
                    value: ct.value,
                    fhe_type: ct.fhe_type,
                    ledger: address_strkey(&ct.ledger)?,
                }))
            }
        }
    }

    fn is_allowed(&self, handle: &Handle, account: &str) -> Result<bool, ClientError> {
        let account = self.address(account)?;
        settle(
            self.executor()?
                .try_is_allowed(&to_bytes(&self.env, handle), &account),
        )
    }
}
