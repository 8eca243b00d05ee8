#![allow(deprecated)] // events().publish migration tracked separately

use soroban_sdk::{symbol_short, Address, Env};

/// Event published when the contract is initialized.
#[soroban_sdk::contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InitializedEvent {
    pub admin: Address,
    pub executor: Address,
    pub timestamp: u64,
}

#[soroban_sdk::contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProfileCreatedEvent {
    pub user: Address,
    pub timestamp: u64,
}

/// Event published when an entry is accepted. Metrics stay encrypted and are
/// never part of the payload.
#[soroban_sdk::contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SleepDataSubmittedEvent {
    pub user: Address,
    pub date: u32,
    pub index: u64,
    pub aggregated: bool,
    pub timestamp: u64,
}

#[soroban_sdk::contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrivacySettingsUpdatedEvent {
    pub user: Address,
    pub allow_aggregation: bool,
    pub allow_anonymous_report: bool,
}

#[soroban_sdk::contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeaderboardUpdatedEvent {
    pub user: Address,
    pub join: bool,
}

#[soroban_sdk::contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GlobalReadAuthorizedEvent {
    pub caller: Address,
    pub participants: u64,
}

pub fn publish_initialized(env: &Env, admin: Address, executor: Address) {
    let topics = (symbol_short!("INIT"),);
    let data = InitializedEvent {
        admin,
        executor,
        timestamp: env.ledger().timestamp(),
    };
    env.events().publish(topics, data);
}

pub fn publish_profile_created(env: &Env, user: Address) {
    let topics = (symbol_short!("PROF_NEW"), user.clone());
    let data = ProfileCreatedEvent {
        user,
        timestamp: env.ledger().timestamp(),
    };
    env.events().publish(topics, data);
}

pub fn publish_sleep_data_submitted(env: &Env, user: Address, date: u32, index: u64, aggregated: bool) {
    let topics = (symbol_short!("SLEEP_SUB"), user.clone());
    let data = SleepDataSubmittedEvent {
        user,
        date,
        index,
        aggregated,
        timestamp: env.ledger().timestamp(),
    };
    env.events().publish(topics, data);
}

pub fn publish_privacy_updated(env: &Env, user: Address, allow_aggregation: bool, allow_anonymous_report: bool) {
    let topics = (symbol_short!("PRIV_UPD"), user.clone());
    let data = PrivacySettingsUpdatedEvent {
        user,
        allow_aggregation,
        allow_anonymous_report,
    };
    env.events().publish(topics, data);
}

pub fn publish_leaderboard_updated(env: &Env, user: Address, join: bool) {
    let topics = (symbol_short!("LEAD_UPD"), user.clone());
    let data = LeaderboardUpdatedEvent { user, join };
    env.events().publish(topics, data);
}

pub fn publish_global_read_authorized(env: &Env, caller: Address, participants: u64) {
    let topics = (symbol_short!("GLOB_READ"), caller.clone());
    let data = GlobalReadAuthorizedEvent {
        caller,
        participants,
    };
    env.events().publish(topics, data);
}
