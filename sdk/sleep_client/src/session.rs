//! End-to-end flows for one subject against one ledger.
//!
//! Each step is reported to a [`PhaseObserver`] before it starts, and a
//! failure carries the phase it happened in. A disclosure refused because of
//! the grant (expired at the service, or out of scope) drops the cached grant
//! and is retried once with a freshly signed one.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::decryptor::BatchDecryptor;
use crate::disclosure::DisclosureService;
use crate::error::{ClientError, DisclosureError, Phase, SessionError, ValidationError};
use crate::fields::{day_key, SleepMetrics};
use crate::grant::{Clock, GrantManager, GrantSettings};
use crate::handle::{ClearValue, Handle, HandleRef};
use crate::ledger::{AggregateHandles, ProfileView, SleepLedger};
use crate::payload::build_sleep_payload;
use crate::signer::DecryptionSigner;
use crate::stats::{reconstruct, DecryptedEntry, SleepStats};

pub trait PhaseObserver {
    fn on_phase(&self, phase: Phase);
}

impl<F: Fn(Phase)> PhaseObserver for F {
    fn on_phase(&self, phase: Phase) {
        self(phase)
    }
}

/// Logs each phase at `info`.
pub struct TracingObserver;

impl PhaseObserver for TracingObserver {
    fn on_phase(&self, phase: Phase) {
        info!(%phase, "session phase");
    }
}

/// Result of decrypting a user's entries one by one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryReport {
    pub entries: Vec<DecryptedEntry>,
    /// Indices whose entry could not be revealed.
    pub failed: Vec<u64>,
}

/// Grant settings for `network`, checked against the deployed contracts.
pub fn grant_settings<L: SleepLedger + ?Sized>(
    config: &ClientConfig,
    network: &str,
    ledger: &L,
) -> Result<GrantSettings, ClientError> {
    config.validate()?;
    let net = config.ledger_for(network)?;
    if net.ledger != ledger.ledger_address() {
        return Err(ClientError::Config(format!(
            "ledger for {network} does not match the connected contract"
        )));
    }
    let executor = ledger.executor_address()?;
    if net.executor != executor {
        return Err(ClientError::Config(format!(
            "executor for {network} does not match the ledger's executor"
        )));
    }
    Ok(GrantSettings {
        domain_name: config.domain_name.clone(),
        domain_version: config.domain_version.clone(),
        chain_id: hex::encode(ledger.network_id()),
        verifying_contract: executor,
        duration_days: config.grant_duration_days,
    })
}

pub struct SleepGuardSession<L, D, S> {
    ledger: L,
    disclosure: D,
    signer: S,
    grants: GrantManager,
    observer: Box<dyn PhaseObserver>,
}

impl<L, D, S> SleepGuardSession<L, D, S>
where
    L: SleepLedger,
    D: DisclosureService,
    S: DecryptionSigner,
{
    pub fn connect(
        config: &ClientConfig,
        network: &str,
        ledger: L,
        disclosure: D,
        signer: S,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ClientError> {
        let settings = grant_settings(config, network, &ledger)?;
        let grants = GrantManager::new(settings, clock)?;
        Ok(Self {
            ledger,
            disclosure,
            signer,
            grants,
            observer: Box::new(TracingObserver),
        })
    }

    pub fn with_observer(mut self, observer: impl PhaseObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn subject(&self) -> String {
        self.signer.address()
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn grants(&self) -> &GrantManager {
        &self.grants
    }

    /// Day key for the session clock's current time.
    pub fn today(&self) -> u32 {
        day_key(self.grants.now())
    }

    fn report(&self, phase: Phase) {
        self.observer.on_phase(phase);
    }

    // ── Profile ──────────────────────────────────────────────────────────────

    pub fn create_profile(
        &self,
        allow_aggregation: bool,
        allow_anonymous_report: bool,
    ) -> Result<(), SessionError> {
        self.report(Phase::Submitting);
        self.ledger
            .create_profile(&self.subject(), allow_aggregation, allow_anonymous_report)
            .map_err(|e| SessionError::new(Phase::Submitting, e))
    }

    pub fn update_privacy_settings(
        &self,
        allow_aggregation: bool,
        allow_anonymous_report: bool,
    ) -> Result<(), SessionError> {
        self.report(Phase::Submitting);
        self.ledger
            .update_privacy_settings(&self.subject(), allow_aggregation, allow_anonymous_report)
            .map_err(|e| SessionError::new(Phase::Submitting, e))
    }

    pub fn update_leaderboard(&self, join: bool) -> Result<(), SessionError> {
        self.report(Phase::Submitting);
        self.ledger
            .update_leaderboard(&self.subject(), join)
            .map_err(|e| SessionError::new(Phase::Submitting, e))
    }

    pub fn profile(&self) -> Result<ProfileView, SessionError> {
        self.report(Phase::Reading);
        self.ledger
            .profile(&self.subject())
            .map_err(|e| SessionError::new(Phase::Reading, e))
    }

    // ── Submission ───────────────────────────────────────────────────────────

    /// Encrypts `metrics`, submits them for `date` and waits until the entry
    /// is visible. Returns the entry index.
    pub fn submit(&self, date: u32, metrics: &SleepMetrics) -> Result<u64, SessionError> {
        let subject = self.subject();

        self.report(Phase::Encrypting);
        let public_key = self
            .ledger
            .public_key()
            .map_err(|e| SessionError::new(Phase::Encrypting, e))?;
        let payload = build_sleep_payload(
            &public_key,
            self.ledger.network_id(),
            &self.ledger.ledger_address(),
            &subject,
            metrics,
        )
        .map_err(|e| SessionError::new(Phase::Encrypting, e))?;

        self.report(Phase::Submitting);
        let index = self
            .ledger
            .submit_entry(&subject, date, &payload)
            .map_err(|e| SessionError::new(Phase::Submitting, e))?;

        self.report(Phase::Confirming);
        match self.ledger.entry_index(&subject, date) {
            Ok(Some(stored)) if stored == index => Ok(index),
            Ok(_) => Err(SessionError::new(
                Phase::Confirming,
                ClientError::transport("entry not visible after submission"),
            )),
            Err(e) => Err(SessionError::new(Phase::Confirming, e)),
        }
    }

    // ── Disclosure ───────────────────────────────────────────────────────────

    fn reveal(&mut self, refs: &[HandleRef]) -> Result<BTreeMap<Handle, ClearValue>, SessionError> {
        let subject = self.subject();
        let ledgers: BTreeSet<String> = refs.iter().map(|r| r.ledger.clone()).collect();
        let mut retried = false;
        loop {
            self.report(Phase::Signing);
            let grant = self
                .grants
                .obtain(&self.signer, &ledgers)
                .map_err(|e| SessionError::new(Phase::Signing, e))?
                .clone();

            self.report(Phase::Decrypting);
            match BatchDecryptor::decrypt(&self.disclosure, &grant, refs, self.grants.now()) {
                Ok(values) => return Ok(values),
                Err(ClientError::Disclosure(e)) if e.is_grant_related() && !retried => {
                    warn!(error = %e, "disclosure refused the grant, signing a new one");
                    self.grants.invalidate(&subject);
                    retried = true;
                }
                Err(e) => return Err(SessionError::new(Phase::Decrypting, e)),
            }
        }
    }

    fn reveal_sums(&mut self, sums: &AggregateHandles) -> Result<SleepStats, SessionError> {
        let ledger = self.ledger.ledger_address();
        let refs: Vec<HandleRef> = sums
            .handles()
            .iter()
            .map(|h| HandleRef::new(*h, ledger.clone()))
            .collect();
        let values = self.reveal(&refs)?;
        let value_of = |h: &Handle| {
            values
                .get(h)
                .map(ClearValue::as_u64)
                .ok_or_else(|| SessionError::new(Phase::Decrypting, DisclosureError::MissingValue))
        };
        Ok(reconstruct(
            value_of(&sums.sum_duration)?,
            value_of(&sums.sum_deep_sleep)?,
            value_of(&sums.sum_score)?,
            sums.count,
        ))
    }

    /// Averages over the subject's own folded entries.
    pub fn my_stats(&mut self) -> Result<SleepStats, SessionError> {
        let subject = self.subject();
        self.report(Phase::Reading);
        let sums = self
            .ledger
            .user_aggregate(&subject, &subject)
            .map_err(|e| SessionError::new(Phase::Reading, e))?;
        if sums.count == 0 {
            return Ok(SleepStats::default());
        }
        self.reveal_sums(&sums)
    }

    /// Averages over every consenting participant's folded entries.
    pub fn global_stats(&mut self) -> Result<SleepStats, SessionError> {
        self.report(Phase::Reading);
        let participants = self
            .ledger
            .total_participants()
            .map_err(|e| SessionError::new(Phase::Reading, e))?;
        if participants == 0 {
            return Ok(SleepStats::default());
        }

        self.report(Phase::Authorizing);
        self.ledger
            .authorize_global_read(&self.subject())
            .map_err(|e| SessionError::new(Phase::Authorizing, e))?;

        self.report(Phase::Reading);
        let sums = self
            .ledger
            .global_aggregate()
            .map_err(|e| SessionError::new(Phase::Reading, e))?;
        self.reveal_sums(&sums)
    }

    /// Decrypts every entry of the subject separately. Entries that cannot be
    /// revealed are listed in [`EntryReport::failed`]; a declined signature
    /// aborts the whole call.
    pub fn entries(&mut self) -> Result<EntryReport, SessionError> {
        let subject = self.subject();
        let ledger = self.ledger.ledger_address();

        self.report(Phase::Reading);
        let count = self
            .ledger
            .entries_count(&subject)
            .map_err(|e| SessionError::new(Phase::Reading, e))?;
        let mut stored = Vec::with_capacity(count as usize);
        for index in 0..count {
            let entry = self
                .ledger
                .entry(&subject, index)
                .map_err(|e| SessionError::new(Phase::Reading, e))?;
            stored.push((index, entry));
        }

        let mut report = EntryReport::default();
        for (index, entry) in stored {
            let refs: Vec<HandleRef> = entry
                .handles
                .iter()
                .map(|h| HandleRef::new(*h, ledger.clone()))
                .collect();
            let revealed = match self.reveal(&refs) {
                Ok(values) => values,
                Err(e) if e.phase == Phase::Signing => return Err(e),
                Err(e) => {
                    warn!(index, error = %e.source, "entry could not be revealed");
                    report.failed.push(index);
                    continue;
                }
            };
            match metrics_from(&entry.handles, &revealed) {
                Ok(metrics) => report.entries.push(DecryptedEntry {
                    index,
                    date: entry.date,
                    metrics,
                }),
                Err(e) => {
                    warn!(index, error = %e, "entry holds out-of-range values");
                    report.failed.push(index);
                }
            }
        }
        Ok(report)
    }
}

fn metrics_from(
    handles: &[Handle; 6],
    revealed: &BTreeMap<Handle, ClearValue>,
) -> Result<SleepMetrics, ValidationError> {
    let mut values = [0u64; 6];
    for (slot, handle) in values.iter_mut().zip(handles) {
        *slot = revealed.get(handle).map(ClearValue::as_u64).unwrap_or_default();
    }
    SleepMetrics::from_values(values)
}
