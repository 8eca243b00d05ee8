use std::sync::Arc;

use common::{HomomorphicEngine, PaillierPrivateKey, PaillierPublicKey};
use tracing::{debug, warn};

use super::sealing::{parse_public_key, seal};
use super::{DisclosureRequest, DisclosureResponse, DisclosureService, ExecutorView};
use crate::config::MAX_GRANT_DURATION_DAYS;
use crate::error::DisclosureError;
use crate::grant::{Clock, GrantDomain};
use crate::signer::verify_typed_data;

/// Reference disclosure service holding the executor's private key.
///
/// A batch is answered only if the grant document names this service's
/// domain, carries a valid subject signature, is inside its validity window,
/// and every handle was minted by an in-scope ledger that, like the subject,
/// holds ACL rights on it. Otherwise the whole batch is rejected.
pub struct LocalDisclosureService<V> {
    view: V,
    public_key: PaillierPublicKey,
    private_key: PaillierPrivateKey,
    domain: GrantDomain,
    clock: Arc<dyn Clock>,
}

impl<V: ExecutorView> LocalDisclosureService<V> {
    pub fn new(
        view: V,
        public_key: PaillierPublicKey,
        private_key: PaillierPrivateKey,
        domain: GrantDomain,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            view,
            public_key,
            private_key,
            domain,
            clock,
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    fn check_grant(&self, request: &DisclosureRequest) -> Result<(), DisclosureError> {
        let doc = &request.document;
        if doc.domain != self.domain {
            return Err(DisclosureError::Rejected("domain mismatch".into()));
        }
        let signature = hex::decode(&request.signature)
            .map_err(|_| DisclosureError::Rejected("signature is not hex".into()))?;
        if !verify_typed_data(&doc.message.subject, doc, &signature) {
            return Err(DisclosureError::Rejected("bad subject signature".into()));
        }
        let days = doc.message.duration_days;
        if days == 0 || days > MAX_GRANT_DURATION_DAYS {
            return Err(DisclosureError::Rejected("grant duration out of bounds".into()));
        }
        let now = self.clock.now();
        if now < doc.message.start_timestamp || now >= doc.expires_at() {
            return Err(DisclosureError::GrantExpired);
        }
        Ok(())
    }

    fn unavailable(err: impl std::fmt::Display) -> DisclosureError {
        DisclosureError::Unavailable(err.to_string())
    }
}

impl<V: ExecutorView> DisclosureService for LocalDisclosureService<V> {
    fn disclose(&self, request: &DisclosureRequest) -> Result<DisclosureResponse, DisclosureError> {
        if request.handles.is_empty() {
            return Err(DisclosureError::Rejected("empty batch".into()));
        }
        self.check_grant(request)?;

        let message = &request.document.message;
        let recipient = parse_public_key(&message.public_key)?;

        let mut values = Vec::with_capacity(request.handles.len());
        for r in &request.handles {
            if !message.contract_addresses.contains(&r.ledger) {
                warn!(ledger = %r.ledger, "disclosure for ledger outside grant scope");
                return Err(DisclosureError::OutOfScope);
            }
            let stored = self
                .view
                .stored_ciphertext(&r.handle)
                .map_err(Self::unavailable)?
                .ok_or(DisclosureError::MissingValue)?;
            if stored.ledger != r.ledger {
                warn!(
                    claimed = %r.ledger,
                    minted_by = %stored.ledger,
                    "handle paired with a ledger that did not mint it"
                );
                return Err(DisclosureError::NotAllowed);
            }
            let subject_ok = self
                .view
                .is_allowed(&r.handle, &message.subject)
                .map_err(Self::unavailable)?;
            let ledger_ok = self
                .view
                .is_allowed(&r.handle, &r.ledger)
                .map_err(Self::unavailable)?;
            if !subject_ok || !ledger_ok {
                return Err(DisclosureError::NotAllowed);
            }

            let plain = HomomorphicEngine::decrypt(&self.public_key, &self.private_key, stored.value);
            values.push(seal(&recipient, &r.handle, plain)?);
        }

        debug!(count = values.len(), subject = %message.subject, "batch disclosed");
        Ok(DisclosureResponse { values })
    }
}
