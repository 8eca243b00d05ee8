//! # SleepGuard Contract Testing Framework
//!
//! A reusable harness for the SleepGuard contracts and client, supporting
//! property-based testing, invariant checking, state exploration and a
//! declarative scenario DSL.
//!
//! ## Architecture
//!
//! ```text
//! test/framework/
//! ├── mod.rs             TestEnv, SleepGuardHarness, snapshots
//! ├── generators.rs      proptest strategies for metrics and actions
//! ├── invariants.rs      ledger invariants over snapshots
//! ├── state_explorer.rs  action-sequence exploration
//! └── scenario_dsl.rs    enroll/night/then scenarios
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut env = TestEnv::new();
//! let harness = SleepGuardHarness::new(&mut env);
//! let alice = harness.create_user(true);
//! harness.submit(&alice, 19_700, &night);
//! assert_eq!(harness.user_sums(&alice).0, 80);
//! ```

extern crate std;

pub mod invariants;
pub mod state_explorer;

use std::cell::Cell;
use std::rc::Rc;
use std::string::String;
use std::sync::Arc;
use std::vec::Vec;

use common::{HomomorphicEngine, PaillierPrivateKey, PaillierPublicKey};
use fhe_executor::{FheExecutorContract, FheExecutorContractClient};
use sleep_client::grant::TypedDataDocument;
use sleep_client::ledger::{address_strkey, parse_address};
use sleep_client::session::grant_settings;
use sleep_client::{
    build_sleep_payload, ClientConfig, DecryptionSigner, EncryptedPayload, GrantError,
    LocalDisclosureService, LocalWallet, ManualClock, SleepGuardSession, SleepMetrics,
    SorobanLedger,
};
use sleep_guard::{ContractError, SleepGuardContract, SleepGuardContractClient};
use soroban_sdk::{
    testutils::{Address as _, Ledger as _},
    Address, Bytes, BytesN, Env, Vec as SorobanVec,
};

/// Primes behind the reference executor key used in tests.
pub const TEST_PRIME_P: u64 = 2_147_483_647;
pub const TEST_PRIME_Q: u64 = 2_147_483_629;

/// Network name the harness registers its contracts under.
pub const TEST_NETWORK: &str = "local";

/// Ledger time the harness starts at (2023-11-14).
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

// ── Core Test Environment ────────────────────────────────────────────────────

/// A high-level test environment that wraps the Soroban `Env` and provides
/// time control and address management.
pub struct TestEnv {
    pub env: Env,
    generated_addresses: Vec<Address>,
}

impl TestEnv {
    /// Create a new test environment with all auth mocked and metering off.
    #[allow(deprecated)] // env.budget() is deprecated in SDK v25
    pub fn new() -> Self {
        let env = Env::default();
        env.mock_all_auths();
        env.budget().reset_unlimited();
        env.ledger().set_timestamp(GENESIS_TIMESTAMP);
        Self {
            env,
            generated_addresses: Vec::new(),
        }
    }

    /// Generate a fresh contract-style address.
    pub fn generate_address(&mut self) -> Address {
        let addr = Address::generate(&self.env);
        self.generated_addresses.push(addr.clone());
        addr
    }

    pub fn generate_addresses(&mut self, n: usize) -> Vec<Address> {
        (0..n).map(|_| self.generate_address()).collect()
    }

    pub fn set_timestamp(&self, ts: u64) {
        self.env.ledger().set_timestamp(ts);
    }

    /// Advance the ledger timestamp by `delta` seconds.
    pub fn advance_time(&self, delta: u64) {
        let current = self.env.ledger().timestamp();
        self.env.ledger().set_timestamp(current.saturating_add(delta));
    }

    pub fn timestamp(&self) -> u64 {
        self.env.ledger().timestamp()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

// ── Users and signers ────────────────────────────────────────────────────────

/// A participant: an Ed25519 wallet and its account address.
#[derive(Clone)]
pub struct TestUser {
    pub wallet: LocalWallet,
    pub address: Address,
    pub strkey: String,
}

/// Wraps a wallet and counts signature requests.
#[derive(Clone)]
pub struct CountingSigner {
    wallet: LocalWallet,
    count: Rc<Cell<u32>>,
    declining: bool,
}

impl CountingSigner {
    pub fn new(wallet: LocalWallet) -> Self {
        Self {
            wallet,
            count: Rc::new(Cell::new(0)),
            declining: false,
        }
    }

    /// A signer that refuses every request.
    pub fn declining(wallet: LocalWallet) -> Self {
        Self {
            declining: true,
            ..Self::new(wallet)
        }
    }

    /// Shared handle to the number of signatures requested so far.
    pub fn counter(&self) -> Rc<Cell<u32>> {
        self.count.clone()
    }
}

impl DecryptionSigner for CountingSigner {
    fn address(&self) -> String {
        self.wallet.address()
    }

    fn sign_typed_data(&self, document: &TypedDataDocument) -> Result<std::vec::Vec<u8>, GrantError> {
        self.count.set(self.count.get() + 1);
        if self.declining {
            return Err(GrantError::Denied);
        }
        self.wallet.sign_typed_data(document)
    }
}

// ── SleepGuard Harness ───────────────────────────────────────────────────────

pub type TestSession<S> =
    SleepGuardSession<SorobanLedger, LocalDisclosureService<SorobanLedger>, S>;

/// Executor and ledger contracts deployed, initialised and wired together,
/// plus the executor's private key for checking revealed values.
pub struct SleepGuardHarness<'a> {
    pub env: &'a mut TestEnv,
    pub ledger: SleepGuardContractClient<'static>,
    pub executor: FheExecutorContractClient<'static>,
    pub ledger_id: Address,
    pub executor_id: Address,
    pub admin: Address,
    pub public_key: PaillierPublicKey,
    pub private_key: PaillierPrivateKey,
    /// Client-side clock shared by sessions and the disclosure service.
    pub clock: ManualClock,
}

impl<'a> SleepGuardHarness<'a> {
    pub fn new(env: &'a mut TestEnv) -> Self {
        let (public_key, private_key) =
            HomomorphicEngine::keypair_from_primes(TEST_PRIME_P, TEST_PRIME_Q)
                .expect("test primes form a key");
        let admin = env.generate_address();

        let executor_id = env.env.register(FheExecutorContract, ());
        let executor = FheExecutorContractClient::new(&env.env, &executor_id);
        executor.initialize(&admin, &public_key);

        let ledger_id = env.env.register(SleepGuardContract, ());
        let ledger = SleepGuardContractClient::new(&env.env, &ledger_id);
        ledger.initialize(&admin, &executor_id);

        let clock = ManualClock::new(env.timestamp());

        Self {
            env,
            ledger,
            executor,
            ledger_id,
            executor_id,
            admin,
            public_key,
            private_key,
            clock,
        }
    }

    pub fn ledger_strkey(&self) -> String {
        address_strkey(&self.ledger_id).expect("contract strkey")
    }

    pub fn executor_strkey(&self) -> String {
        address_strkey(&self.executor_id).expect("contract strkey")
    }

    /// Deploys another ledger on the same executor.
    pub fn deploy_ledger(&self) -> SleepGuardContractClient<'static> {
        let ledger_id = self.env.env.register(SleepGuardContract, ());
        let ledger = SleepGuardContractClient::new(&self.env.env, &ledger_id);
        ledger.initialize(&self.admin, &self.executor_id);
        ledger
    }

    /// A user with a wallet but no profile.
    pub fn new_user(&self) -> TestUser {
        let wallet = LocalWallet::generate();
        let strkey = wallet.address();
        let address = parse_address(&self.env.env, &strkey).expect("wallet strkey");
        TestUser {
            wallet,
            address,
            strkey,
        }
    }

    /// A user with a profile.
    pub fn create_user(&self, allow_aggregation: bool) -> TestUser {
        let user = self.new_user();
        self.ledger
            .create_profile(&user.address, &allow_aggregation, &true);
        user
    }

    /// Encrypts `metrics` for `user` against the deployed ledger.
    pub fn encrypt(&self, user: &TestUser, metrics: &SleepMetrics) -> EncryptedPayload {
        build_sleep_payload(
            &self.public_key,
            self.env.env.ledger().network_id().to_array(),
            &self.ledger_strkey(),
            &user.strkey,
            metrics,
        )
        .expect("metrics in range")
    }

    pub fn to_args(&self, payload: &EncryptedPayload) -> (SorobanVec<BytesN<32>>, Bytes) {
        let mut handles = SorobanVec::new(&self.env.env);
        for h in &payload.handles {
            handles.push_back(BytesN::from_array(&self.env.env, &h.0));
        }
        (handles, Bytes::from_slice(&self.env.env, &payload.proof))
    }

    pub fn try_submit(
        &self,
        user: &TestUser,
        date: u32,
        metrics: &SleepMetrics,
    ) -> Result<u64, ContractError> {
        let (handles, proof) = self.to_args(&self.encrypt(user, metrics));
        match self
            .ledger
            .try_submit_entry(&user.address, &date, &handles, &proof)
        {
            Ok(Ok(index)) => Ok(index),
            Err(Ok(e)) => Err(e),
            other => panic!("unexpected host failure: {:?}", other),
        }
    }

    pub fn submit(&self, user: &TestUser, date: u32, metrics: &SleepMetrics) -> u64 {
        self.try_submit(user, date, metrics)
            .expect("submission accepted")
    }

    /// Decrypts a handle with the executor key, bypassing the ACL.
    pub fn reveal(&self, handle: &BytesN<32>) -> u64 {
        let ct = self.executor.ciphertext(handle);
        HomomorphicEngine::decrypt(&self.public_key, &self.private_key, ct.value)
    }

    /// Revealed (duration, deep sleep, score) sums and count for `user`.
    pub fn user_sums(&self, user: &TestUser) -> (u64, u64, u64, u64) {
        let agg = self.ledger.get_user_aggregate(&user.address, &user.address);
        (
            self.reveal(&agg.sum_duration),
            self.reveal(&agg.sum_deep_sleep),
            self.reveal(&agg.sum_score),
            agg.count,
        )
    }

    /// Revealed global sums and participant count.
    pub fn global_sums(&self) -> (u64, u64, u64, u64) {
        let agg = self.ledger.get_global_aggregate();
        (
            self.reveal(&agg.sum_duration),
            self.reveal(&agg.sum_deep_sleep),
            self.reveal(&agg.sum_score),
            agg.participants,
        )
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new().with_network(TEST_NETWORK, &self.ledger_strkey(), &self.executor_strkey())
    }

    pub fn soroban_ledger(&self) -> SorobanLedger {
        SorobanLedger::new(self.env.env.clone(), &self.ledger_strkey()).expect("ledger strkey")
    }

    /// Disclosure service reading the executor through the ledger adapter.
    pub fn disclosure_service_at(&self, clock: ManualClock) -> LocalDisclosureService<SorobanLedger> {
        let view = self.soroban_ledger();
        let settings =
            grant_settings(&self.config(), TEST_NETWORK, &view).expect("harness config is valid");
        LocalDisclosureService::new(
            view,
            self.public_key.clone(),
            self.private_key.clone(),
            settings.domain(),
            Arc::new(clock),
        )
    }

    pub fn disclosure_service(&self) -> LocalDisclosureService<SorobanLedger> {
        self.disclosure_service_at(self.clock.clone())
    }

    pub fn session_with<S: DecryptionSigner>(
        &self,
        signer: S,
        service: LocalDisclosureService<SorobanLedger>,
    ) -> TestSession<S> {
        SleepGuardSession::connect(
            &self.config(),
            TEST_NETWORK,
            self.soroban_ledger(),
            service,
            signer,
            Arc::new(self.clock.clone()),
        )
        .expect("session connects")
    }

    pub fn session(&self, user: &TestUser) -> TestSession<LocalWallet> {
        self.session_with(user.wallet.clone(), self.disclosure_service())
    }

    /// Snapshot of all observable ledger state for `users`.
    pub fn snapshot(&self, users: &[TestUser]) -> LedgerSnapshot {
        let users = users
            .iter()
            .map(|u| {
                if !self.ledger.has_profile(&u.address) {
                    return UserSnapshot {
                        strkey: u.strkey.clone(),
                        has_profile: false,
                        ..UserSnapshot::default()
                    };
                }
                let profile = self.ledger.get_profile(&u.address);
                let (sum_duration, sum_deep_sleep, sum_score, folded) = self.user_sums(u);
                let entries = (0..profile.total_entries)
                    .map(|i| {
                        let e = self.ledger.get_entry(&u.address, &i);
                        (e.date, e.duration.to_array())
                    })
                    .collect();
                let index_past_end_rejected = matches!(
                    self.ledger.try_get_entry(&u.address, &profile.total_entries),
                    Err(Ok(ContractError::InvalidIndex))
                );
                UserSnapshot {
                    strkey: u.strkey.clone(),
                    has_profile: true,
                    allow_aggregation: profile.allow_aggregation,
                    total_entries: profile.total_entries,
                    folded,
                    sums: (sum_duration, sum_deep_sleep, sum_score),
                    entries,
                    index_past_end_rejected,
                }
            })
            .collect();
        let (d, ds, s, participants) = self.global_sums();
        LedgerSnapshot {
            timestamp: self.env.timestamp(),
            participants,
            global_sums: (d, ds, s),
            users,
        }
    }
}

/// One user's observable state, with sums revealed.
#[derive(Debug, Clone, Default)]
pub struct UserSnapshot {
    pub strkey: String,
    pub has_profile: bool,
    pub allow_aggregation: bool,
    pub total_entries: u64,
    /// Entries folded into the user's sums.
    pub folded: u64,
    pub sums: (u64, u64, u64),
    /// (date, duration handle) per stored entry, by index.
    pub entries: Vec<(u32, [u8; 32])>,
    pub index_past_end_rejected: bool,
}

/// Immutable snapshot of ledger state at a point in time.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    pub timestamp: u64,
    pub participants: u64,
    pub global_sums: (u64, u64, u64),
    pub users: Vec<UserSnapshot>,
}

impl LedgerSnapshot {
    pub fn sum_folded(&self) -> u64 {
        self.users.iter().map(|u| u.folded).sum()
    }

    pub fn sum_user_sums(&self) -> (u64, u64, u64) {
        self.users.iter().fold((0, 0, 0), |(a, b, c), u| {
            (a + u.sums.0, b + u.sums.1, c + u.sums.2)
        })
    }

    pub fn user(&self, strkey: &str) -> Option<&UserSnapshot> {
        self.users.iter().find(|u| u.strkey == strkey)
    }
}

// ── Test Outcome Tracking ────────────────────────────────────────────────────

/// Result of a single test action, used by the state explorer and scenario DSL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Ok,
    /// The contract rejected the action with this error code.
    ExpectedError(u32),
    UnexpectedError(String),
}

/// Summary of a test run with coverage metrics.
#[derive(Debug, Clone)]
pub struct TestRunSummary {
    pub actions_executed: usize,
    pub invariant_checks: usize,
    pub invariant_violations: Vec<String>,
    pub entry_points_hit: std::collections::HashSet<String>,
    pub transitions_observed: usize,
}

impl TestRunSummary {
    pub fn new() -> Self {
        Self {
            actions_executed: 0,
            invariant_checks: 0,
            invariant_violations: Vec::new(),
            entry_points_hit: std::collections::HashSet::new(),
            transitions_observed: 0,
        }
    }

    /// True when no invariant violations were detected.
    pub fn passed(&self) -> bool {
        self.invariant_violations.is_empty()
    }

    pub fn entry_point_coverage(&self, total_entry_points: usize) -> f64 {
        if total_entry_points == 0 {
            return 0.0;
        }
        self.entry_points_hit.len() as f64 / total_entry_points as f64
    }
}

impl Default for TestRunSummary {
    fn default() -> Self {
        Self::new()
    }
}
