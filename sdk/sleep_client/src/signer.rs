//! Subject signatures over grant documents.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use stellar_strkey::ed25519::PublicKey as AccountKey;

use crate::error::{GrantError, ValidationError};
use crate::grant::TypedDataDocument;

/// Something that can sign a grant document on behalf of a subject: a
/// wallet, a hardware device, a remote signer.
pub trait DecryptionSigner {
    /// Account strkey of the subject.
    fn address(&self) -> String;

    /// Signs the document's digest. Returns [`GrantError::Denied`] if the
    /// subject declines.
    fn sign_typed_data(&self, document: &TypedDataDocument) -> Result<Vec<u8>, GrantError>;
}

/// In-process Ed25519 wallet.
#[derive(Clone)]
pub struct LocalWallet {
    signing_key: SigningKey,
}

impl LocalWallet {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl DecryptionSigner for LocalWallet {
    fn address(&self) -> String {
        AccountKey(self.verifying_key().to_bytes()).to_string()
    }

    fn sign_typed_data(&self, document: &TypedDataDocument) -> Result<Vec<u8>, GrantError> {
        let digest = document.digest()?;
        Ok(self.signing_key.sign(&digest).to_bytes().to_vec())
    }
}

/// Ed25519 key behind an account strkey (`G…`).
pub fn account_key(address: &str) -> Result<VerifyingKey, ValidationError> {
    let invalid = || ValidationError::InvalidAddress(address.to_string());
    let key = AccountKey::from_string(address).map_err(|_| invalid())?;
    VerifyingKey::from_bytes(&key.0).map_err(|_| invalid())
}

/// Checks that `signature` is `address`'s signature over `document`.
pub fn verify_typed_data(address: &str, document: &TypedDataDocument, signature: &[u8]) -> bool {
    let Ok(key) = account_key(address) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    match document.digest() {
        Ok(digest) => key.verify(&digest, &signature).is_ok(),
        Err(_) => false,
    }
}
