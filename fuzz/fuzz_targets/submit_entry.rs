#![no_main]

//! Fuzz harness for `sleep_guard::submit_entry` and proof decoding.
//!
//! Handles and proofs are attacker-controlled. Whatever arrives, the ledger
//! must reject it with a contract error rather than trap, and a rejected
//! submission must leave no trace in entries or global sums.

use arbitrary::Arbitrary;
use common::{decode_proof, stamp_handle, FheType, HomomorphicEngine, MAX_PROOF_LEN};
use fhe_executor::{FheExecutorContract, FheExecutorContractClient};
use libfuzzer_sys::fuzz_target;
use sleep_guard::{SleepGuardContract, SleepGuardContractClient};
use soroban_sdk::{testutils::Address as _, Address, Bytes, BytesN, Env, Vec as SorobanVec};

const FIELD_TYPES: [FheType; 6] = [
    FheType::Uint16,
    FheType::Uint16,
    FheType::Uint16,
    FheType::Uint8,
    FheType::Uint8,
    FheType::Uint8,
];

#[derive(Arbitrary, Debug)]
pub enum FuzzAction {
    CreateProfile { user: u8, aggregate: bool },
    /// Raw handles and proof bytes.
    SubmitRaw {
        user: u8,
        date: u32,
        handles: Vec<[u8; 32]>,
        proof: Vec<u8>,
    },
    /// Correctly typed handles and a well-formed proof whose hashes are not
    /// bound to the submitter. Each entry carries an arbitrary
    /// (commitment, z, w) knowledge triple.
    SubmitForged {
        user: u8,
        date: u32,
        digest: [u8; 32],
        ciphertexts: [u128; 6],
        knowledge: [(u128, u128, u128); 6],
    },
    AuthorizeGlobalRead { user: u8 },
}

fuzz_target!(|input: (Vec<u8>, Vec<FuzzAction>)| {
    let (raw_proof, actions) = input;
    let _ = decode_proof(&raw_proof);

    let env = Env::default();
    env.mock_all_auths();

    let Some((public_key, _)) = HomomorphicEngine::keypair_from_primes(2_147_483_647, 2_147_483_629)
    else {
        return;
    };
    let admin = Address::generate(&env);
    let executor_id = env.register(FheExecutorContract, ());
    FheExecutorContractClient::new(&env, &executor_id).initialize(&admin, &public_key);
    let ledger_id = env.register(SleepGuardContract, ());
    let client = SleepGuardContractClient::new(&env, &ledger_id);
    if client.try_initialize(&admin, &executor_id).is_err() {
        return;
    }

    let users: Vec<Address> = (0..3).map(|_| Address::generate(&env)).collect();
    let pick = |i: u8| &users[i as usize % users.len()];

    for action in actions.into_iter().take(32) {
        let participants = client.total_participants();
        let global = client.get_global_aggregate();
        let counts: Vec<u64> = users.iter().map(|u| client.get_entries_count(u)).collect();

        let rejected_submission = match action {
            FuzzAction::CreateProfile { user, aggregate } => {
                let _ = client.try_create_profile(pick(user), &aggregate, &false);
                false
            }
            FuzzAction::SubmitRaw {
                user,
                date,
                handles,
                proof,
            } => {
                let mut hs = SorobanVec::new(&env);
                for h in handles.iter().take(8) {
                    hs.push_back(BytesN::from_array(&env, h));
                }
                let proof = Bytes::from_slice(&env, &proof[..proof.len().min(MAX_PROOF_LEN + 16)]);
                client.try_submit_entry(pick(user), &date, &hs, &proof).is_err()
            }
            FuzzAction::SubmitForged {
                user,
                date,
                digest,
                ciphertexts,
                knowledge,
            } => {
                let mut hs = SorobanVec::new(&env);
                let mut proof = Bytes::new(&env);
                proof.push_back(1);
                proof.push_back(FIELD_TYPES.len() as u8);
                let entries = FIELD_TYPES.iter().zip(ciphertexts).zip(knowledge);
                for (i, ((ty, ct), (a, z, w))) in entries.enumerate() {
                    let handle = stamp_handle(digest, i as u8, *ty);
                    hs.push_back(BytesN::from_array(&env, &handle));
                    proof.push_back(ty.tag());
                    for word in [ct, a, z, w] {
                        proof.extend_from_slice(&word.to_be_bytes());
                    }
                }
                let result = client.try_submit_entry(pick(user), &date, &hs, &proof);
                assert!(result.is_err(), "forged payload accepted");
                true
            }
            FuzzAction::AuthorizeGlobalRead { user } => {
                let _ = client.try_authorize_global_read(pick(user));
                false
            }
        };

        if rejected_submission {
            let after: Vec<u64> = users.iter().map(|u| client.get_entries_count(u)).collect();
            assert_eq!(after, counts, "rejected submission stored an entry");
            assert_eq!(client.total_participants(), participants);
            assert_eq!(client.get_global_aggregate(), global);
        }
    }
});
