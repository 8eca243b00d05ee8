//! Encrypted-input proofs.
//!
//! A proof blob carries the ciphertexts behind a batch of input handles, each
//! with a proof that the submitter knows its plaintext:
//!
//! ```text
//! [version = 1][count][count × (tag: u8, ciphertext, commitment, z, w)]
//! ```
//!
//! where every number is a big-endian `u128`. The blob is bound to a network,
//! a ledger contract and a submitting account through a SHA-256 digest over
//!
//! ```text
//! "sleepguard.input.v1" ‖ network_id ‖ len ‖ strkey(ledger) ‖ len ‖ strkey(user)
//!     ‖ count ‖ (tag ‖ ciphertext)*
//! ```
//!
//! and input handle *i* is `sha256(digest ‖ i ‖ tag)[0..29] ‖ i ‖ tag ‖ 1`.
//! The knowledge proof for input *i* answers the challenge
//! `sha256("sleepguard.pok.v1" ‖ digest ‖ i ‖ commitment)`, truncated to
//! [`CHALLENGE_BITS`].
//!
//! A handle therefore cannot be replayed against another ledger, another
//! submitter or another network, and cannot be paired with a different
//! ciphertext. Copying someone else's ciphertext into a fresh binding fails
//! too, because the copier cannot answer the new challenge.
//!
//! The preimage writers are generic over [`PreimageSink`] so the contracts
//! (hashing a `Bytes` with the host) and off-ledger clients (hashing a
//! `Vec<u8>`) share one byte layout.

use soroban_sdk::{Address, Bytes, BytesN, Env};

use crate::fhe_types::{stamp_handle, FheType, COMPUTED_INDEX};
use crate::paillier::PlaintextProof;
use crate::CommonError;

pub const PROOF_VERSION: u8 = 1;
pub const INPUT_DOMAIN: &[u8] = b"sleepguard.input.v1";
pub const COMPUTE_DOMAIN: &[u8] = b"sleepguard.compute.v1";
pub const KNOWLEDGE_DOMAIN: &[u8] = b"sleepguard.pok.v1";

/// Width of knowledge-proof challenges. Soundness needs `2^CHALLENGE_BITS`
/// below both prime factors of the executor's modulus.
pub const CHALLENGE_BITS: u32 = 30;

/// Upper bound on inputs per proof.
pub const MAX_INPUTS: usize = 16;
/// Bytes per proof entry: tag plus four `u128` words.
pub const PROOF_ENTRY_LEN: usize = 1 + 4 * 16;
pub const MAX_PROOF_LEN: usize = 2 + MAX_INPUTS * PROOF_ENTRY_LEN;
const CHALLENGE_PREIMAGE_LEN: usize = 17 + 32 + 1 + 16;
/// Longest strkey the binding accepts (muxed accounts).
pub const MAX_STRKEY_LEN: usize = 69;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EncryptedInput {
    pub fhe_type: FheType,
    pub ciphertext: u128,
    pub knowledge: PlaintextProof,
}

/// Fixed-capacity list of decoded inputs.
#[derive(Clone, Debug)]
pub struct ProofInputs {
    len: usize,
    items: [EncryptedInput; MAX_INPUTS],
}

impl ProofInputs {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<&EncryptedInput> {
        self.items[..self.len].get(index)
    }

    pub fn as_slice(&self) -> &[EncryptedInput] {
        &self.items[..self.len]
    }
}

/// Byte sink for proof and preimage writers.
pub trait PreimageSink {
    fn put(&mut self, bytes: &[u8]);
}

impl PreimageSink for Bytes {
    fn put(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

#[cfg(feature = "std")]
impl PreimageSink for std::vec::Vec<u8> {
    fn put(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

pub fn write_proof<S: PreimageSink>(sink: &mut S, inputs: &[EncryptedInput]) -> Result<(), CommonError> {
    if inputs.is_empty() || inputs.len() > MAX_INPUTS {
        return Err(CommonError::InvalidInput);
    }
    sink.put(&[PROOF_VERSION, inputs.len() as u8]);
    for input in inputs {
        write_entry(sink, input);
        sink.put(&input.knowledge.commitment.to_be_bytes());
        sink.put(&input.knowledge.z.to_be_bytes());
        sink.put(&input.knowledge.w.to_be_bytes());
    }
    Ok(())
}

pub fn decode_proof(raw: &[u8]) -> Result<ProofInputs, CommonError> {
    if raw.len() < 2 || raw[0] != PROOF_VERSION {
        return Err(CommonError::InvalidProof);
    }
    let count = raw[1] as usize;
    if count == 0 || count > MAX_INPUTS || raw.len() != 2 + count * PROOF_ENTRY_LEN {
        return Err(CommonError::InvalidProof);
    }

    let mut items = [EncryptedInput {
        fhe_type: FheType::Bool,
        ciphertext: 0,
        knowledge: PlaintextProof::default(),
    }; MAX_INPUTS];
    for (i, chunk) in raw[2..].chunks_exact(PROOF_ENTRY_LEN).enumerate() {
        let fhe_type = FheType::from_tag(chunk[0]).ok_or(CommonError::InvalidProof)?;
        items[i] = EncryptedInput {
            fhe_type,
            ciphertext: read_word(chunk, 0),
            knowledge: PlaintextProof {
                commitment: read_word(chunk, 1),
                z: read_word(chunk, 2),
                w: read_word(chunk, 3),
            },
        };
    }
    Ok(ProofInputs { len: count, items })
}

// Word `i` of a proof entry, after the tag byte.
fn read_word(entry: &[u8], i: usize) -> u128 {
    let start = 1 + i * 16;
    let mut word = [0u8; 16];
    word.copy_from_slice(&entry[start..start + 16]);
    u128::from_be_bytes(word)
}

pub fn write_binding_preimage<S: PreimageSink>(
    sink: &mut S,
    network_id: &[u8; 32],
    ledger: &[u8],
    user: &[u8],
    inputs: &[EncryptedInput],
) {
    sink.put(INPUT_DOMAIN);
    sink.put(network_id);
    sink.put(&[ledger.len() as u8]);
    sink.put(ledger);
    sink.put(&[user.len() as u8]);
    sink.put(user);
    sink.put(&[inputs.len() as u8]);
    for input in inputs {
        write_entry(sink, input);
    }
}

/// `digest ‖ index ‖ tag`, hashed to derive input handle `index`.
pub fn handle_preimage(digest: &[u8; 32], index: u8, fhe_type: FheType) -> [u8; 34] {
    let mut out = [0u8; 34];
    out[..32].copy_from_slice(digest);
    out[32] = index;
    out[33] = fhe_type.tag();
    out
}

/// `domain ‖ digest ‖ index ‖ commitment`, hashed to derive the knowledge
/// challenge for input `index`.
pub fn challenge_preimage(
    digest: &[u8; 32],
    index: u8,
    commitment: u128,
) -> [u8; CHALLENGE_PREIMAGE_LEN] {
    let mut out = [0u8; CHALLENGE_PREIMAGE_LEN];
    out[..17].copy_from_slice(KNOWLEDGE_DOMAIN);
    out[17..49].copy_from_slice(digest);
    out[49] = index;
    out[50..].copy_from_slice(&commitment.to_be_bytes());
    out
}

pub fn challenge_from_hash(hash: &[u8; 32]) -> u64 {
    let word = u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]]);
    (word & ((1 << CHALLENGE_BITS) - 1)) as u64
}

fn write_entry<S: PreimageSink>(sink: &mut S, input: &EncryptedInput) {
    sink.put(&[input.fhe_type.tag()]);
    sink.put(&input.ciphertext.to_be_bytes());
}

// ── Host-side helpers ────────────────────────────────────────────────────────

/// Copies the strkey of `addr` into `buf` and returns its length.
pub fn strkey_bytes(addr: &Address, buf: &mut [u8; MAX_STRKEY_LEN]) -> Result<usize, CommonError> {
    let s = addr.to_string();
    let len = s.len() as usize;
    if len == 0 || len > MAX_STRKEY_LEN {
        return Err(CommonError::InvalidInput);
    }
    s.copy_into_slice(&mut buf[..len]);
    Ok(len)
}

/// Decodes a proof held in contract memory.
pub fn decode_proof_bytes(proof: &Bytes) -> Result<ProofInputs, CommonError> {
    let len = proof.len() as usize;
    if len > MAX_PROOF_LEN {
        return Err(CommonError::InvalidProof);
    }
    let mut buf = [0u8; MAX_PROOF_LEN];
    proof.copy_into_slice(&mut buf[..len]);
    decode_proof(&buf[..len])
}

pub fn binding_digest(
    env: &Env,
    ledger: &Address,
    user: &Address,
    inputs: &[EncryptedInput],
) -> Result<[u8; 32], CommonError> {
    let mut ledger_buf = [0u8; MAX_STRKEY_LEN];
    let ledger_len = strkey_bytes(ledger, &mut ledger_buf)?;
    let mut user_buf = [0u8; MAX_STRKEY_LEN];
    let user_len = strkey_bytes(user, &mut user_buf)?;

    let mut preimage = Bytes::new(env);
    write_binding_preimage(
        &mut preimage,
        &env.ledger().network_id().to_array(),
        &ledger_buf[..ledger_len],
        &user_buf[..user_len],
        inputs,
    );
    let digest: BytesN<32> = env.crypto().sha256(&preimage).into();
    Ok(digest.to_array())
}

/// Knowledge challenge for input `index` under `digest`.
pub fn knowledge_challenge(env: &Env, digest: &[u8; 32], index: u8, commitment: u128) -> u64 {
    let preimage = Bytes::from_array(env, &challenge_preimage(digest, index, commitment));
    let hash: BytesN<32> = env.crypto().sha256(&preimage).into();
    challenge_from_hash(&hash.to_array())
}

pub fn input_handle(env: &Env, digest: &[u8; 32], index: u8, fhe_type: FheType) -> BytesN<32> {
    let preimage = Bytes::from_array(env, &handle_preimage(digest, index, fhe_type));
    let hash: BytesN<32> = env.crypto().sha256(&preimage).into();
    BytesN::from_array(env, &stamp_handle(hash.to_array(), index, fhe_type))
}

/// Handle for a value produced on-ledger. `nonce` must be unique per result.
pub fn computed_handle(env: &Env, op: u8, nonce: u64, fhe_type: FheType) -> BytesN<32> {
    let mut preimage = Bytes::from_slice(env, COMPUTE_DOMAIN);
    preimage.push_back(op);
    preimage.extend_from_array(&nonce.to_be_bytes());
    let hash: BytesN<32> = env.crypto().sha256(&preimage).into();
    BytesN::from_array(env, &stamp_handle(hash.to_array(), COMPUTED_INDEX, fhe_type))
}
