#![no_std]

//! Ledger aggregate store for encrypted sleep metrics.
//!
//! Users submit one entry per calendar day as six executor handles plus the
//! proof that binds them to this contract and the submitter. Accepted entries
//! are appended to the user's history and, when the user allows aggregation,
//! folded homomorphically into the user's and the global running sums. The
//! contract never sees a plaintext metric.

pub mod aggregate;
pub mod events;
pub mod types;
pub mod validation;


use fhe_executor::FheExecutorContractClient;
use soroban_sdk::{contract, contractimpl, symbol_short, Address, Bytes, BytesN, Env, Symbol, Vec};

pub use types::{ContractError, DataKey, GlobalAggregate, Profile, SleepEntry, UserAggregate};

/// Storage keys for the contract
const ADMIN: Symbol = symbol_short!("ADMIN");
const EXECUTOR: Symbol = symbol_short!("EXECUTOR");
const INITIALIZED: Symbol = symbol_short!("INIT");
const GLOBAL: Symbol = symbol_short!("GLOBAL");

const TTL_THRESHOLD: u32 = 17_280;
const TTL_EXTEND_TO: u32 = 518_400;

/// Revision of the encrypted input and disclosure protocol.
pub const PROTOCOL_ID: u32 = 1;
pub const CONTRACT_VERSION: u32 = 1;

#[contract]
pub struct SleepGuardContract;

#[contractimpl]
impl SleepGuardContract {
    /// Initialize the contract with an admin and the executor holding the
    /// ciphertexts. Seeds the global sums with encryptions of zero.
    pub fn initialize(env: Env, admin: Address, executor: Address) -> Result<(), ContractError> {
        if env.storage().instance().has(&INITIALIZED) {
            return Err(ContractError::AlreadyInitialized);
        }
        admin.require_auth();

        env.storage().instance().set(&ADMIN, &admin);
        env.storage().instance().set(&EXECUTOR, &executor);

        let client = FheExecutorContractClient::new(&env, &executor);
        let global = aggregate::empty_global_aggregate(&env, &client);
        env.storage().instance().set(&GLOBAL, &global);
        env.storage().instance().set(&INITIALIZED, &true);

        events::publish_initialized(&env, admin, executor);
        Ok(())
    }

    pub fn get_admin(env: Env) -> Result<Address, ContractError> {
        env.storage()
            .instance()
            .get(&ADMIN)
            .ok_or(ContractError::NotInitialized)
    }

    pub fn get_executor(env: Env) -> Result<Address, ContractError> {
        env.storage()
            .instance()
            .get(&EXECUTOR)
            .ok_or(ContractError::NotInitialized)
    }

    pub fn is_initialized(env: Env) -> bool {
        env.storage().instance().has(&INITIALIZED)
    }

    pub fn protocol_id(_env: Env) -> u32 {
        PROTOCOL_ID
    }

    pub fn version(_env: Env) -> u32 {
        CONTRACT_VERSION
    }

    // ── Profiles ──────────────────────────────────────────────────────────────

    /// Create the caller's profile and seed their private sums with zero.
    pub fn create_profile(
        env: Env,
        user: Address,
        allow_aggregation: bool,
        allow_anonymous_report: bool,
    ) -> Result<(), ContractError> {
        let executor = executor_client(&env)?;
        user.require_auth();

        let key = DataKey::Profile(user.clone());
        if env.storage().persistent().has(&key) {
            return Err(ContractError::ProfileAlreadyExists);
        }

        let profile = Profile {
            owner: user.clone(),
            created_at: env.ledger().timestamp(),
            allow_aggregation,
            allow_anonymous_report,
            join_leaderboard: false,
            total_entries: 0,
        };
        put_persistent(&env, &key, &profile);

        let agg = aggregate::empty_user_aggregate(&env, &executor);
        aggregate::allow_user_sums(&env, &executor, &agg, &user);
        put_persistent(&env, &DataKey::UserAggregate(user.clone()), &agg);

        events::publish_profile_created(&env, user);
        Ok(())
    }

    pub fn update_privacy_settings(
        env: Env,
        user: Address,
        allow_aggregation: bool,
        allow_anonymous_report: bool,
    ) -> Result<(), ContractError> {
        user.require_auth();
        let mut profile = load_profile(&env, &user)?;
        profile.allow_aggregation = allow_aggregation;
        profile.allow_anonymous_report = allow_anonymous_report;
        put_persistent(&env, &DataKey::Profile(user.clone()), &profile);

        events::publish_privacy_updated(&env, user, allow_aggregation, allow_anonymous_report);
        Ok(())
    }

    pub fn update_leaderboard_participation(
        env: Env,
        user: Address,
        join: bool,
    ) -> Result<(), ContractError> {
        user.require_auth();
        let mut profile = load_profile(&env, &user)?;
        profile.join_leaderboard = join;
        put_persistent(&env, &DataKey::Profile(user.clone()), &profile);

        events::publish_leaderboard_updated(&env, user, join);
        Ok(())
    }

    pub fn has_profile(env: Env, user: Address) -> bool {
        env.storage().persistent().has(&DataKey::Profile(user))
    }

    pub fn get_profile(env: Env, user: Address) -> Result<Profile, ContractError> {
        load_profile(&env, &user)
    }

    pub fn get_entries_count(env: Env, user: Address) -> u64 {
        load_profile(&env, &user)
            .map(|p| p.total_entries)
            .unwrap_or(0)
    }

    // ── Submissions ───────────────────────────────────────────────────────────

    /// Append an encrypted entry for `date` and return its index.
    ///
    /// Checks run before any write, in this order: profile exists, no entry
    /// for `date`, handle count and types, proof. Any failure reverts the
    /// whole invocation.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn submit_entry(
        env: Env,
        user: Address,
        date: u32,
        handles: Vec<BytesN<32>>,
        proof: Bytes,
    ) -> Result<u64, ContractError> {
        let executor = executor_client(&env)?;
        user.require_auth();

        let mut profile = load_profile(&env, &user)?;
        let date_key = DataKey::EntryDate(user.clone(), date);
        if env.storage().persistent().has(&date_key) {
            return Err(ContractError::DataAlreadySubmittedForDate);
        }
        validation::validate_handles(&handles)?;

        let this = env.current_contract_address();
        match executor.try_verify_input(&this, &user, &handles, &proof) {
            Ok(Ok(_)) => {}
            _ => return Err(ContractError::InvalidProof),
        }

        for handle in handles.iter() {
            executor.allow(&this, &handle, &user);
        }

        let entry = SleepEntry {
            date,
            bedtime: handle_at(&handles, 0)?,
            wake_time: handle_at(&handles, 1)?,
            duration: handle_at(&handles, validation::IDX_DURATION)?,
            deep_sleep_ratio: handle_at(&handles, validation::IDX_DEEP_SLEEP)?,
            wake_count: handle_at(&handles, 4)?,
            sleep_score: handle_at(&handles, validation::IDX_SCORE)?,
            submitted_at: env.ledger().timestamp(),
        };

        let index = profile.total_entries;
        put_persistent(&env, &DataKey::Entry(user.clone(), index), &entry);
        put_persistent(&env, &date_key, &index);
        profile.total_entries = index + 1;
        put_persistent(&env, &DataKey::Profile(user.clone()), &profile);

        let aggregated = profile.allow_aggregation;
        if aggregated {
            let user_key = DataKey::UserAggregate(user.clone());
            let user_agg: UserAggregate = env
                .storage()
                .persistent()
                .get(&user_key)
                .ok_or(ContractError::ProfileNotCreated)?;
            let user_agg = aggregate::fold_user(&env, &executor, &user_agg, &entry, &user);
            put_persistent(&env, &user_key, &user_agg);

            let global = load_global(&env)?;
            let global = aggregate::fold_global(&env, &executor, &global, &entry);
            env.storage().instance().set(&GLOBAL, &global);
        }

        events::publish_sleep_data_submitted(&env, user, date, index, aggregated);
        Ok(index)
    }

    pub fn get_entry(env: Env, user: Address, index: u64) -> Result<SleepEntry, ContractError> {
        let profile = load_profile(&env, &user)?;
        if index >= profile.total_entries {
            return Err(ContractError::InvalidIndex);
        }
        env.storage()
            .persistent()
            .get(&DataKey::Entry(user, index))
            .ok_or(ContractError::InvalidIndex)
    }

    /// Index of the entry `user` submitted for `date`, if any.
    pub fn get_entry_index(env: Env, user: Address, date: u32) -> Option<u64> {
        env.storage().persistent().get(&DataKey::EntryDate(user, date))
    }

    // ── Aggregates ────────────────────────────────────────────────────────────

    /// The caller's own encrypted sums. Nobody else may read them.
    pub fn get_user_aggregate(
        env: Env,
        caller: Address,
        user: Address,
    ) -> Result<UserAggregate, ContractError> {
        caller.require_auth();
        if caller != user {
            return Err(ContractError::Unauthorized);
        }
        load_profile(&env, &user)?;
        env.storage()
            .persistent()
            .get(&DataKey::UserAggregate(user))
            .ok_or(ContractError::ProfileNotCreated)
    }

    /// Grants `caller` disclosure rights over the current global sums. Must be
    /// repeated after further submissions, since every fold mints new handles.
    pub fn authorize_global_read(env: Env, caller: Address) -> Result<(), ContractError> {
        let executor = executor_client(&env)?;
        caller.require_auth();
        let global = load_global(&env)?;
        aggregate::allow_global_sums(&env, &executor, &global, &caller);
        events::publish_global_read_authorized(&env, caller, global.participants);
        Ok(())
    }

    pub fn get_global_aggregate(env: Env) -> Result<GlobalAggregate, ContractError> {
        load_global(&env)
    }

    pub fn total_participants(env: Env) -> u64 {
        load_global(&env).map(|g| g.participants).unwrap_or(0)
    }
}

// ── Internal helpers ───────────────────────────────────────────────────────────

fn executor_client(env: &Env) -> Result<FheExecutorContractClient<'_>, ContractError> {
    let executor: Address = env
        .storage()
        .instance()
        .get(&EXECUTOR)
        .ok_or(ContractError::NotInitialized)?;
    Ok(FheExecutorContractClient::new(env, &executor))
}

fn load_profile(env: &Env, user: &Address) -> Result<Profile, ContractError> {
    env.storage()
        .persistent()
        .get(&DataKey::Profile(user.clone()))
        .ok_or(ContractError::ProfileNotCreated)
}

fn load_global(env: &Env) -> Result<GlobalAggregate, ContractError> {
    env.storage()
        .instance()
        .get(&GLOBAL)
        .ok_or(ContractError::NotInitialized)
}

fn handle_at(handles: &Vec<BytesN<32>>, i: u32) -> Result<BytesN<32>, ContractError> {
    handles.get(i).ok_or(ContractError::InvalidHandles)
}

fn put_persistent<V>(env: &Env, key: &DataKey, value: &V)
where
    V: soroban_sdk::IntoVal<Env, soroban_sdk::Val>,
{
    env.storage().persistent().set(key, value);
    env.storage()
        .persistent()
        .extend_ttl(key, TTL_THRESHOLD, TTL_EXTEND_TO);
}
