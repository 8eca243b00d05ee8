#![allow(deprecated)] // events().publish migration tracked separately

use soroban_sdk::{symbol_short, Address, BytesN, Env};

#[soroban_sdk::contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutorInitializedEvent {
    pub admin: Address,
    pub timestamp: u64,
}

/// Published when a proof is accepted. Carries no ciphertext material.
#[soroban_sdk::contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InputVerifiedEvent {
    pub ledger: Address,
    pub user: Address,
    pub count: u32,
    pub timestamp: u64,
}

#[soroban_sdk::contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccessGrantedEvent {
    pub handle: BytesN<32>,
    pub granter: Address,
    pub account: Address,
}

pub fn publish_initialized(env: &Env, admin: Address) {
    let topics = (symbol_short!("INIT"),);
    let data = ExecutorInitializedEvent {
        admin,
        timestamp: env.ledger().timestamp(),
    };
    env.events().publish(topics, data);
}

pub fn publish_input_verified(env: &Env, ledger: Address, user: Address, count: u32) {
    let topics = (symbol_short!("INPUT"), ledger.clone());
    let data = InputVerifiedEvent {
        ledger,
        user,
        count,
        timestamp: env.ledger().timestamp(),
    };
    env.events().publish(topics, data);
}

pub fn publish_access_granted(env: &Env, handle: BytesN<32>, granter: Address, account: Address) {
    let topics = (symbol_short!("ALLOW"), account.clone());
    let data = AccessGrantedEvent {
        handle,
        granter,
        account,
    };
    env.events().publish(topics, data);
}
