use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::disclosure::sealing::open;
use crate::disclosure::{DisclosureRequest, DisclosureService};
use crate::error::{ClientError, DisclosureError, GrantError, ValidationError};
use crate::grant::DecryptionGrant;
use crate::handle::{ClearValue, Handle, HandleRef};

/// Reveals a batch of handles with one disclosure request.
///
/// Either every requested handle comes back opened and width-checked, or the
/// call fails and nothing is returned.
pub struct BatchDecryptor;

impl BatchDecryptor {
    pub fn decrypt<D: DisclosureService + ?Sized>(
        service: &D,
        grant: &DecryptionGrant,
        refs: &[HandleRef],
        now: u64,
    ) -> Result<BTreeMap<Handle, ClearValue>, ClientError> {
        if refs.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        if !grant.is_valid_at(now) {
            return Err(GrantError::Expired.into());
        }
        let ledgers: BTreeSet<String> = refs.iter().map(|r| r.ledger.clone()).collect();
        if !grant.scope.covers(&ledgers) {
            return Err(GrantError::ScopeMismatch.into());
        }
        let mut types = Vec::with_capacity(refs.len());
        for (index, r) in refs.iter().enumerate() {
            let ty = r.handle.fhe_type().ok_or(ValidationError::HandleType { index })?;
            types.push(ty);
        }

        let request = DisclosureRequest {
            handles: refs.to_vec(),
            document: grant.document.clone(),
            signature: hex::encode(&grant.signature),
        };
        let response = service.disclose(&request)?;

        let sealed: BTreeMap<Handle, _> = response.values.iter().map(|v| (v.handle, v)).collect();
        let mut out = BTreeMap::new();
        for (r, ty) in refs.iter().zip(types) {
            let value = sealed.get(&r.handle).ok_or(DisclosureError::MissingValue)?;
            let raw = open(grant.secret_key(), value)?;
            out.insert(r.handle, ClearValue::typed(raw, ty)?);
        }

        debug!(count = out.len(), "batch decrypted");
        Ok(out)
    }
}
