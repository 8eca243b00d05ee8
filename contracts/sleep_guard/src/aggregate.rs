//! Homomorphic bookkeeping for the running sums.
//!
//! All arithmetic is delegated to the executor; this contract only ever
//! holds handles. Sums are widened to 64-bit encrypted integers.

use common::FheType;
use fhe_executor::FheExecutorContractClient;
use soroban_sdk::{Address, BytesN, Env};

use crate::types::{GlobalAggregate, SleepEntry, UserAggregate};

pub const SUM_TYPE: FheType = FheType::Uint64;

/// Three fresh encryptions of zero owned by this contract.
pub fn encrypted_zeros(
    env: &Env,
    executor: &FheExecutorContractClient,
) -> (BytesN<32>, BytesN<32>, BytesN<32>) {
    let this = env.current_contract_address();
    (
        executor.trivial_encrypt(&this, &0, &SUM_TYPE),
        executor.trivial_encrypt(&this, &0, &SUM_TYPE),
        executor.trivial_encrypt(&this, &0, &SUM_TYPE),
    )
}

pub fn empty_user_aggregate(env: &Env, executor: &FheExecutorContractClient) -> UserAggregate {
    let (sum_duration, sum_deep_sleep, sum_score) = encrypted_zeros(env, executor);
    UserAggregate {
        sum_duration,
        sum_deep_sleep,
        sum_score,
        count: 0,
    }
}

pub fn empty_global_aggregate(env: &Env, executor: &FheExecutorContractClient) -> GlobalAggregate {
    let (sum_duration, sum_deep_sleep, sum_score) = encrypted_zeros(env, executor);
    GlobalAggregate {
        sum_duration,
        sum_deep_sleep,
        sum_score,
        participants: 0,
    }
}

fn add(env: &Env, executor: &FheExecutorContractClient, acc: &BytesN<32>, term: &BytesN<32>) -> BytesN<32> {
    executor.add(&env.current_contract_address(), acc, term, &SUM_TYPE)
}

/// Folds `entry` into a user's sums. The owner is allowed on the new handles.
#[allow(clippy::arithmetic_side_effects)]
pub fn fold_user(
    env: &Env,
    executor: &FheExecutorContractClient,
    agg: &UserAggregate,
    entry: &SleepEntry,
    owner: &Address,
) -> UserAggregate {
    let next = UserAggregate {
        sum_duration: add(env, executor, &agg.sum_duration, &entry.duration),
        sum_deep_sleep: add(env, executor, &agg.sum_deep_sleep, &entry.deep_sleep_ratio),
        sum_score: add(env, executor, &agg.sum_score, &entry.sleep_score),
        count: agg.count + 1,
    };
    allow_user_sums(env, executor, &next, owner);
    next
}

#[allow(clippy::arithmetic_side_effects)]
pub fn fold_global(
    env: &Env,
    executor: &FheExecutorContractClient,
    agg: &GlobalAggregate,
    entry: &SleepEntry,
) -> GlobalAggregate {
    GlobalAggregate {
        sum_duration: add(env, executor, &agg.sum_duration, &entry.duration),
        sum_deep_sleep: add(env, executor, &agg.sum_deep_sleep, &entry.deep_sleep_ratio),
        sum_score: add(env, executor, &agg.sum_score, &entry.sleep_score),
        participants: agg.participants + 1,
    }
}

pub fn allow_user_sums(
    env: &Env,
    executor: &FheExecutorContractClient,
    agg: &UserAggregate,
    account: &Address,
) {
    let this = env.current_contract_address();
    executor.allow(&this, &agg.sum_duration, account);
    executor.allow(&this, &agg.sum_deep_sleep, account);
    executor.allow(&this, &agg.sum_score, account);
}

pub fn allow_global_sums(
    env: &Env,
    executor: &FheExecutorContractClient,
    agg: &GlobalAggregate,
    account: &Address,
) {
    let this = env.current_contract_address();
    executor.allow(&this, &agg.sum_duration, account);
    executor.allow(&this, &agg.sum_deep_sleep, account);
    executor.allow(&this, &agg.sum_score, account);
}
