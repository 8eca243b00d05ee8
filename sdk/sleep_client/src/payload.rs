//! Client-side construction of encrypted inputs.
//!
//! Values are encrypted under the executor's public key and bound, through
//! the proof digest, to the network, the receiving ledger and the submitter.
//! Each ciphertext carries a proof that the submitter knows its plaintext.
//! Building a payload never touches the ledger.

use common::{
    challenge_from_hash, challenge_preimage, handle_preimage, stamp_handle,
    write_binding_preimage, write_proof, EncryptedInput, FheType, HomomorphicEngine,
    PaillierPublicKey, PlaintextProof, MAX_INPUTS,
};
use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;
use crate::fields::{SleepMetrics, FIELDS};
use crate::handle::Handle;

/// Handles in input order plus the proof that binds them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub handles: Vec<Handle>,
    pub proof: Vec<u8>,
}

pub struct EncryptedInputBuilder<'a> {
    public_key: &'a PaillierPublicKey,
    network_id: [u8; 32],
    ledger: String,
    user: String,
    values: Vec<(FheType, u64)>,
}

impl<'a> EncryptedInputBuilder<'a> {
    pub fn new(public_key: &'a PaillierPublicKey, network_id: [u8; 32], ledger: &str, user: &str) -> Self {
        Self {
            public_key,
            network_id,
            ledger: ledger.to_string(),
            user: user.to_string(),
            values: Vec::with_capacity(FIELDS.len()),
        }
    }

    pub fn add_bool(&mut self, value: bool) -> Result<&mut Self, ValidationError> {
        self.push(FheType::Bool, value as u64)
    }

    pub fn add8(&mut self, value: u64) -> Result<&mut Self, ValidationError> {
        self.push(FheType::Uint8, value)
    }

    pub fn add16(&mut self, value: u64) -> Result<&mut Self, ValidationError> {
        self.push(FheType::Uint16, value)
    }

    pub fn add32(&mut self, value: u64) -> Result<&mut Self, ValidationError> {
        self.push(FheType::Uint32, value)
    }

    pub fn add64(&mut self, value: u64) -> Result<&mut Self, ValidationError> {
        self.push(FheType::Uint64, value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn push(&mut self, fhe_type: FheType, value: u64) -> Result<&mut Self, ValidationError> {
        if !fhe_type.fits(value) {
            return Err(ValidationError::WidthOverflow {
                value,
                bits: fhe_type.bits(),
            });
        }
        if self.values.len() >= MAX_INPUTS {
            return Err(ValidationError::TooManyInputs);
        }
        self.values.push((fhe_type, value));
        Ok(self)
    }

    pub fn encrypt(&self) -> Result<EncryptedPayload, ValidationError> {
        self.encrypt_with(&mut OsRng)
    }

    pub fn encrypt_with<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<EncryptedPayload, ValidationError> {
        if self.values.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }

        let openings: Vec<(FheType, u64, u128)> = self
            .values
            .iter()
            .map(|&(fhe_type, value)| (fhe_type, value, unit(self.public_key, rng)))
            .collect();
        let mut inputs = Vec::with_capacity(openings.len());
        for &(fhe_type, value, r) in &openings {
            let ciphertext = HomomorphicEngine::encrypt(self.public_key, value, r)
                .map_err(|_| ValidationError::Encryption)?;
            inputs.push(EncryptedInput {
                fhe_type,
                ciphertext,
                knowledge: PlaintextProof::default(),
            });
        }

        let mut preimage = Vec::new();
        write_binding_preimage(
            &mut preimage,
            &self.network_id,
            self.ledger.as_bytes(),
            self.user.as_bytes(),
            &inputs,
        );
        let digest: [u8; 32] = Sha256::digest(&preimage).into();

        for (i, (input, &(_, value, r))) in inputs.iter_mut().zip(&openings).enumerate() {
            let index = i as u8;
            let x = rng.gen_range(0..self.public_key.n) as u64;
            let s = unit(self.public_key, rng);
            input.knowledge = HomomorphicEngine::prove_plaintext(
                self.public_key,
                value,
                r,
                x,
                s,
                |commitment| {
                    let hash: [u8; 32] =
                        Sha256::digest(challenge_preimage(&digest, index, commitment)).into();
                    challenge_from_hash(&hash)
                },
            )
            .map_err(|_| ValidationError::Encryption)?;
        }

        let mut proof = Vec::new();
        write_proof(&mut proof, &inputs).map_err(|_| ValidationError::TooManyInputs)?;

        let handles = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| {
                let index = i as u8;
                let hash: [u8; 32] =
                    Sha256::digest(handle_preimage(&digest, index, input.fhe_type)).into();
                Handle(stamp_handle(hash, index, input.fhe_type))
            })
            .collect();

        Ok(EncryptedPayload { handles, proof })
    }
}

/// Random unit modulo `n`.
fn unit<R: RngCore + CryptoRng>(pk: &PaillierPublicKey, rng: &mut R) -> u128 {
    loop {
        let r = rng.gen_range(2..pk.n);
        if HomomorphicEngine::gcd(r, pk.n) == 1 {
            return r;
        }
    }
}

/// Validates `metrics` and encrypts the six fields in submission order.
pub fn build_sleep_payload(
    public_key: &PaillierPublicKey,
    network_id: [u8; 32],
    ledger: &str,
    user: &str,
    metrics: &SleepMetrics,
) -> Result<EncryptedPayload, ValidationError> {
    metrics.validate()?;
    let mut builder = EncryptedInputBuilder::new(public_key, network_id, ledger, user);
    for (spec, value) in FIELDS.iter().zip(metrics.values()) {
        builder.push(spec.fhe_type, value)?;
    }
    builder.encrypt()
}
