#![no_std]
#![allow(clippy::arithmetic_side_effects)]

//! Reference homomorphic executor.
//!
//! Holds ciphertexts keyed by 32-byte handles, verifies encrypted-input
//! proofs, performs additive homomorphic arithmetic and keeps the access
//! control list (ACL) of `(handle, account)` pairs that the off-ledger
//! disclosure service consults before revealing a value.
//!
//! Every stored ciphertext records the ledger contract that minted it.

pub mod events;


use common::{
    binding_digest, computed_handle, decode_proof_bytes, handle_type, input_handle,
    knowledge_challenge, CommonError, FheType, HomomorphicEngine, PaillierPublicKey, MAX_MODULUS,
};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, Address, Bytes, BytesN,
    Env, Symbol, Vec,
};

// ── Storage keys ────────────────────────────────────────────────────────────────

const ADMIN: Symbol = symbol_short!("ADMIN");
const PUB_KEY: Symbol = symbol_short!("PUB_KEY");
const NONCE: Symbol = symbol_short!("NONCE");
const CIPHERTEXT: Symbol = symbol_short!("CT");
const ACL: Symbol = symbol_short!("ACL");

const TTL_THRESHOLD: u32 = 17_280;
const TTL_EXTEND_TO: u32 = 518_400;

const OP_ADD: u8 = 1;
const OP_TRIVIAL: u8 = 2;

// ── Types ──────────────────────────────────────────────────────────────────────

/// A stored ciphertext and its provenance.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ciphertext {
    pub value: u128,
    pub fhe_type: FheType,
    /// Contract that minted the handle.
    pub ledger: Address,
}

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ExecutorError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    HandleNotFound = 4,
    InvalidProof = 5,
    InvalidCiphertext = 6,
    TypeMismatch = 7,
    InvalidInput = 8,
}

impl From<CommonError> for ExecutorError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::NotInitialized => ExecutorError::NotInitialized,
            CommonError::AlreadyInitialized => ExecutorError::AlreadyInitialized,
            CommonError::AccessDenied => ExecutorError::Unauthorized,
            CommonError::HandleNotFound => ExecutorError::HandleNotFound,
            CommonError::InvalidProof => ExecutorError::InvalidProof,
            CommonError::InvalidCiphertext => ExecutorError::InvalidCiphertext,
            CommonError::InvalidInput => ExecutorError::InvalidInput,
        }
    }
}

// ── Contract ───────────────────────────────────────────────────────────────────

#[contract]
pub struct FheExecutorContract;

#[contractimpl]
impl FheExecutorContract {
    pub fn initialize(
        env: Env,
        admin: Address,
        public_key: PaillierPublicKey,
    ) -> Result<(), ExecutorError> {
        if env.storage().instance().has(&ADMIN) {
            return Err(ExecutorError::AlreadyInitialized);
        }
        admin.require_auth();

        if public_key.n < 3
            || public_key.n >= MAX_MODULUS
            || public_key.nn != public_key.n * public_key.n
            || public_key.g != public_key.n + 1
        {
            return Err(ExecutorError::InvalidInput);
        }

        env.storage().instance().set(&ADMIN, &admin);
        env.storage().instance().set(&PUB_KEY, &public_key);
        env.storage().instance().set(&NONCE, &0u64);

        events::publish_initialized(&env, admin);
        Ok(())
    }

    pub fn get_admin(env: Env) -> Result<Address, ExecutorError> {
        env.storage()
            .instance()
            .get(&ADMIN)
            .ok_or(ExecutorError::NotInitialized)
    }

    pub fn public_key(env: Env) -> Result<PaillierPublicKey, ExecutorError> {
        env.storage()
            .instance()
            .get(&PUB_KEY)
            .ok_or(ExecutorError::NotInitialized)
    }

    // ── Inputs ────────────────────────────────────────────────────────────────

    /// Verifies that `proof` carries the ciphertexts behind `handles`, that it
    /// was built for this network, `ledger` and `user`, and that the prover
    /// knows every plaintext. On success the ciphertexts are registered under
    /// their handles and `ledger` is allowed on each of them.
    pub fn verify_input(
        env: Env,
        ledger: Address,
        user: Address,
        handles: Vec<BytesN<32>>,
        proof: Bytes,
    ) -> Result<Vec<BytesN<32>>, ExecutorError> {
        ledger.require_auth();
        let pub_key = Self::public_key(env.clone())?;

        let inputs = decode_proof_bytes(&proof)?;
        if inputs.len() != handles.len() as usize {
            return Err(ExecutorError::InvalidProof);
        }
        let digest = binding_digest(&env, &ledger, &user, inputs.as_slice())?;

        for (i, input) in inputs.as_slice().iter().enumerate() {
            let index = i as u8;
            let claimed = handles.get(i as u32).ok_or(ExecutorError::InvalidProof)?;
            if input_handle(&env, &digest, index, input.fhe_type) != claimed {
                return Err(ExecutorError::InvalidProof);
            }
            if !HomomorphicEngine::is_valid_ciphertext(&pub_key, input.ciphertext) {
                return Err(ExecutorError::InvalidCiphertext);
            }
            let challenge =
                knowledge_challenge(&env, &digest, index, input.knowledge.commitment);
            if !HomomorphicEngine::verify_plaintext(
                &pub_key,
                input.ciphertext,
                &input.knowledge,
                challenge,
            ) {
                return Err(ExecutorError::InvalidProof);
            }
        }

        for (i, input) in inputs.as_slice().iter().enumerate() {
            let handle = handles.get(i as u32).ok_or(ExecutorError::InvalidProof)?;
            store_ciphertext(
                &env,
                &handle,
                &Ciphertext {
                    value: input.ciphertext,
                    fhe_type: input.fhe_type,
                    ledger: ledger.clone(),
                },
            );
            grant(&env, &handle, &ledger);
        }

        events::publish_input_verified(&env, ledger, user, handles.len());
        Ok(handles)
    }

    // ── Arithmetic ────────────────────────────────────────────────────────────

    /// Homomorphic addition. `caller` must be allowed on both operands and
    /// becomes the minting ledger (and sole ACL holder) of the result.
    pub fn add(
        env: Env,
        caller: Address,
        lhs: BytesN<32>,
        rhs: BytesN<32>,
        result_type: FheType,
    ) -> Result<BytesN<32>, ExecutorError> {
        caller.require_auth();
        if !Self::is_allowed(env.clone(), lhs.clone(), caller.clone())
            || !Self::is_allowed(env.clone(), rhs.clone(), caller.clone())
        {
            return Err(ExecutorError::Unauthorized);
        }
        let pub_key = Self::public_key(env.clone())?;
        let a = Self::ciphertext(env.clone(), lhs)?;
        let b = Self::ciphertext(env.clone(), rhs)?;
        if a.fhe_type.bits() > result_type.bits() || b.fhe_type.bits() > result_type.bits() {
            return Err(ExecutorError::TypeMismatch);
        }

        let value = HomomorphicEngine::add_ciphertexts(&pub_key, a.value, b.value);
        Ok(mint(&env, &caller, OP_ADD, value, result_type))
    }

    /// Publicly known encryption of `value` (r = 1), owned by `caller`.
    pub fn trivial_encrypt(
        env: Env,
        caller: Address,
        value: u64,
        fhe_type: FheType,
    ) -> Result<BytesN<32>, ExecutorError> {
        caller.require_auth();
        if !fhe_type.fits(value) {
            return Err(ExecutorError::InvalidInput);
        }
        let pub_key = Self::public_key(env.clone())?;
        let ct = HomomorphicEngine::trivial(&pub_key, value);
        Ok(mint(&env, &caller, OP_TRIVIAL, ct, fhe_type))
    }

    // ── Access control ────────────────────────────────────────────────────────

    /// Lets `account` request disclosure of `handle`. Only a current ACL
    /// holder may extend the list.
    pub fn allow(
        env: Env,
        caller: Address,
        handle: BytesN<32>,
        account: Address,
    ) -> Result<(), ExecutorError> {
        caller.require_auth();
        if !env.storage().persistent().has(&(CIPHERTEXT, handle.clone())) {
            return Err(ExecutorError::HandleNotFound);
        }
        if !Self::is_allowed(env.clone(), handle.clone(), caller.clone()) {
            return Err(ExecutorError::Unauthorized);
        }
        grant(&env, &handle, &account);
        events::publish_access_granted(&env, handle, caller, account);
        Ok(())
    }

    pub fn is_allowed(env: Env, handle: BytesN<32>, account: Address) -> bool {
        env.storage()
            .persistent()
            .get(&(ACL, handle, account))
            .unwrap_or(false)
    }

    pub fn ciphertext(env: Env, handle: BytesN<32>) -> Result<Ciphertext, ExecutorError> {
        if handle_type(&handle).is_none() {
            return Err(ExecutorError::HandleNotFound);
        }
        env.storage()
            .persistent()
            .get(&(CIPHERTEXT, handle))
            .ok_or(ExecutorError::HandleNotFound)
    }
}

// ── Internal helpers ───────────────────────────────────────────────────────────

fn next_nonce(env: &Env) -> u64 {
    let nonce: u64 = env.storage().instance().get(&NONCE).unwrap_or(0);
    env.storage().instance().set(&NONCE, &(nonce + 1));
    nonce
}

fn mint(env: &Env, owner: &Address, op: u8, value: u128, fhe_type: FheType) -> BytesN<32> {
    let handle = computed_handle(env, op, next_nonce(env), fhe_type);
    store_ciphertext(
        env,
        &handle,
        &Ciphertext {
            value,
            fhe_type,
            ledger: owner.clone(),
        },
    );
    grant(env, &handle, owner);
    handle
}

fn store_ciphertext(env: &Env, handle: &BytesN<32>, ct: &Ciphertext) {
    let key = (CIPHERTEXT, handle.clone());
    env.storage().persistent().set(&key, ct);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
}

fn grant(env: &Env, handle: &BytesN<32>, account: &Address) {
    let key = (ACL, handle.clone(), account.clone());
    env.storage().persistent().set(&key, &true);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
}
