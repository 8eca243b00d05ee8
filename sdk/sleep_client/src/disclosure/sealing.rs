//! ECIES sealing of disclosed values to a grant's public key.
//!
//! 1. fresh ephemeral secp256k1 key pair
//! 2. ECDH with the grant public key
//! 3. HKDF-SHA256 → 32-byte key
//! 4. ChaCha20-Poly1305 with the handle as associated data
//!
//! Binding the handle as associated data means a sealed value cannot be
//! replayed as the answer for another handle.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hkdf::Hkdf;
use k256::ecdh::{diffie_hellman, EphemeralSecret, SharedSecret};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::DisclosureError;
use crate::handle::Handle;

const HKDF_INFO: &[u8] = b"sleepguard-disclosure-v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedValue {
    pub handle: Handle,
    /// SEC1-compressed ephemeral public key.
    pub ephemeral_key: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

pub fn parse_public_key(hex_key: &str) -> Result<PublicKey, DisclosureError> {
    let bytes = hex::decode(hex_key)
        .map_err(|_| DisclosureError::Rejected("grant public key is not hex".into()))?;
    PublicKey::from_sec1_bytes(&bytes)
        .map_err(|_| DisclosureError::Rejected("grant public key is not a curve point".into()))
}

fn cipher_for(shared: &SharedSecret) -> Result<(ChaCha20Poly1305, [u8; 12]), DisclosureError> {
    let hkdf = Hkdf::<Sha256>::new(None, shared.raw_secret_bytes().as_slice());
    let mut key = [0u8; 32];
    hkdf.expand(HKDF_INFO, &mut key)
        .map_err(|_| DisclosureError::Unseal)?;

    // each ephemeral key is used once, so a nonce derived from the shared
    // secret is never repeated under the same key
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&Sha256::digest(shared.raw_secret_bytes().as_slice())[..12]);

    let cipher = ChaCha20Poly1305::new_from_slice(&key).map_err(|_| DisclosureError::Unseal)?;
    Ok((cipher, nonce))
}

pub fn seal(recipient: &PublicKey, handle: &Handle, value: u64) -> Result<SealedValue, DisclosureError> {
    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephemeral_key = ephemeral.public_key().to_encoded_point(true).as_bytes().to_vec();
    let shared = ephemeral.diffie_hellman(recipient);

    let (cipher, nonce) = cipher_for(&shared)?;
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &value.to_be_bytes(),
                aad: &handle.0,
            },
        )
        .map_err(|_| DisclosureError::Rejected("sealing failed".into()))?;

    Ok(SealedValue {
        handle: *handle,
        ephemeral_key,
        ciphertext,
    })
}

pub fn open(secret: &SecretKey, sealed: &SealedValue) -> Result<u64, DisclosureError> {
    let ephemeral =
        PublicKey::from_sec1_bytes(&sealed.ephemeral_key).map_err(|_| DisclosureError::Unseal)?;
    let shared = diffie_hellman(secret.to_nonzero_scalar(), ephemeral.as_affine());

    let (cipher, nonce) = cipher_for(&shared)?;
    let plain = cipher
        .decrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &sealed.ciphertext,
                aad: &sealed.handle.0,
            },
        )
        .map_err(|_| DisclosureError::Unseal)?;

    let bytes: [u8; 8] = plain.as_slice().try_into().map_err(|_| DisclosureError::Unseal)?;
    Ok(u64::from_be_bytes(bytes))
}
