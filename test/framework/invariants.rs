//! # Ledger Invariant Definitions & Verification
//!
//! Invariants that must hold across all ledger state transitions. They are
//! checked after every action during state exploration and can be composed
//! via the `InvariantSet` builder.
//!
//! Snapshots carry revealed sums, so sum invariants compare plaintexts.
//! Each check is O(u + e) for u tracked users and e stored entries.

extern crate std;

use std::string::String;
use std::vec::Vec;

use super::LedgerSnapshot;

// ── Invariant Trait ──────────────────────────────────────────────────────────

pub trait Invariant {
    fn name(&self) -> &str;

    /// Returns `Err(description)` on violation.
    fn check(&self, snapshot: &LedgerSnapshot) -> Result<(), String>;
}

// ── Built-in Invariants ──────────────────────────────────────────────────────

/// **Participant Count**: `participants == Σ(user folded counts)`.
///
/// Requires the snapshot to cover every user with a profile.
pub struct ParticipantsMatchFolded;

impl Invariant for ParticipantsMatchFolded {
    fn name(&self) -> &str {
        "participants == sum(folded)"
    }

    fn check(&self, snapshot: &LedgerSnapshot) -> Result<(), String> {
        let sum = snapshot.sum_folded();
        if snapshot.participants != sum {
            return Err(std::format!(
                "participants ({}) != folded entries ({})",
                snapshot.participants,
                sum
            ));
        }
        Ok(())
    }
}

/// **Global Sums**: each global sum equals the sum of the users' sums.
///
/// Every fold updates one user aggregate and the global aggregate together.
pub struct GlobalSumsMatchUserSums;

impl Invariant for GlobalSumsMatchUserSums {
    fn name(&self) -> &str {
        "global sums == sum(user sums)"
    }

    fn check(&self, snapshot: &LedgerSnapshot) -> Result<(), String> {
        let users = snapshot.sum_user_sums();
        if snapshot.global_sums != users {
            return Err(std::format!(
                "global sums {:?} != user sums {:?}",
                snapshot.global_sums,
                users
            ));
        }
        Ok(())
    }
}

/// **Folded Bound**: a user never has more folded entries than entries.
pub struct FoldedBoundedByEntries;

impl Invariant for FoldedBoundedByEntries {
    fn name(&self) -> &str {
        "folded <= total_entries"
    }

    fn check(&self, snapshot: &LedgerSnapshot) -> Result<(), String> {
        for u in &snapshot.users {
            if u.folded > u.total_entries {
                return Err(std::format!(
                    "user {} folded {} of {} entries",
                    u.strkey,
                    u.folded,
                    u.total_entries
                ));
            }
        }
        Ok(())
    }
}

/// **Unique Dates**: no two entries of a user share a date.
pub struct UniqueEntryDates;

impl Invariant for UniqueEntryDates {
    fn name(&self) -> &str {
        "one entry per (user, date)"
    }

    fn check(&self, snapshot: &LedgerSnapshot) -> Result<(), String> {
        for u in &snapshot.users {
            let mut dates: Vec<u32> = u.entries.iter().map(|(d, _)| *d).collect();
            dates.sort_unstable();
            if let Some(w) = dates.windows(2).find(|w| w[0] == w[1]) {
                return Err(std::format!("user {} has two entries for day {}", u.strkey, w[0]));
            }
        }
        Ok(())
    }
}

/// **Contiguous Indices**: indices `0..total_entries` are readable and the
/// next one is rejected.
pub struct ContiguousIndices;

impl Invariant for ContiguousIndices {
    fn name(&self) -> &str {
        "entries indexed 0..total_entries"
    }

    fn check(&self, snapshot: &LedgerSnapshot) -> Result<(), String> {
        for u in snapshot.users.iter().filter(|u| u.has_profile) {
            if u.entries.len() as u64 != u.total_entries {
                return Err(std::format!(
                    "user {} lists {} entries but counts {}",
                    u.strkey,
                    u.entries.len(),
                    u.total_entries
                ));
            }
            if !u.index_past_end_rejected {
                return Err(std::format!("user {} exposes an entry past the end", u.strkey));
            }
        }
        Ok(())
    }
}

/// **Profile Gate**: users without a profile have no entries.
pub struct NoEntriesWithoutProfile;

impl Invariant for NoEntriesWithoutProfile {
    fn name(&self) -> &str {
        "no profile => no entries"
    }

    fn check(&self, snapshot: &LedgerSnapshot) -> Result<(), String> {
        for u in snapshot.users.iter().filter(|u| !u.has_profile) {
            if u.total_entries != 0 || !u.entries.is_empty() {
                return Err(std::format!("user {} has entries but no profile", u.strkey));
            }
        }
        Ok(())
    }
}

// ── Invariant Set ────────────────────────────────────────────────────────────

pub struct InvariantSet {
    invariants: Vec<Box<dyn Invariant>>,
}

impl InvariantSet {
    pub fn new() -> Self {
        Self {
            invariants: Vec::new(),
        }
    }

    /// All built-in ledger invariants.
    pub fn ledger_defaults() -> Self {
        let mut set = Self::new();
        set.add(Box::new(ParticipantsMatchFolded));
        set.add(Box::new(GlobalSumsMatchUserSums));
        set.add(Box::new(FoldedBoundedByEntries));
        set.add(Box::new(UniqueEntryDates));
        set.add(Box::new(ContiguousIndices));
        set.add(Box::new(NoEntriesWithoutProfile));
        set
    }

    pub fn add(&mut self, invariant: Box<dyn Invariant>) {
        self.invariants.push(invariant);
    }

    /// Returns (invariant_name, violation_message) for all failures.
    pub fn check_all(&self, snapshot: &LedgerSnapshot) -> Vec<(String, String)> {
        let mut violations = Vec::new();
        for inv in &self.invariants {
            if let Err(msg) = inv.check(snapshot) {
                violations.push((inv.name().to_string(), msg));
            }
        }
        violations
    }

    /// Panics with details on violation.
    pub fn assert_all(&self, snapshot: &LedgerSnapshot) {
        let violations = self.check_all(snapshot);
        if !violations.is_empty() {
            let mut report = String::from("Invariant violations detected:\n");
            for (name, msg) in &violations {
                report.push_str(&std::format!("  ✗ [{}]: {}\n", name, msg));
            }
            panic!("{}", report);
        }
    }

    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

impl Default for InvariantSet {
    fn default() -> Self {
        Self::new()
    }
}

// ── Transition Invariants ────────────────────────────────────────────────────

/// Invariants over two consecutive snapshots (before and after an action).
pub trait TransitionInvariant {
    fn name(&self) -> &str;
    fn check(&self, before: &LedgerSnapshot, after: &LedgerSnapshot) -> Result<(), String>;
}

/// **Append Only**: existing entries never change or disappear, and counts
/// never decrease.
pub struct AppendOnly;

impl TransitionInvariant for AppendOnly {
    fn name(&self) -> &str {
        "entries are append-only"
    }

    fn check(&self, before: &LedgerSnapshot, after: &LedgerSnapshot) -> Result<(), String> {
        if after.participants < before.participants {
            return Err(std::format!(
                "participants decreased: {} -> {}",
                before.participants,
                after.participants
            ));
        }
        for old in &before.users {
            let Some(new) = after.user(&old.strkey) else {
                return Err(std::format!("user {} vanished", old.strkey));
            };
            if old.has_profile && !new.has_profile {
                return Err(std::format!("profile of {} was deleted", old.strkey));
            }
            if new.entries.len() < old.entries.len()
                || new.entries[..old.entries.len()] != old.entries[..]
            {
                return Err(std::format!("stored entries of {} changed", old.strkey));
            }
        }
        Ok(())
    }
}

/// **Single Fold**: one accepted submission adds exactly `metrics` to the
/// global sums when the submitter consents, and nothing otherwise.
pub struct SingleFold {
    pub consenting: bool,
    pub duration_tenths: u64,
    pub deep_sleep_ratio: u64,
    pub sleep_score: u64,
}

impl TransitionInvariant for SingleFold {
    fn name(&self) -> &str {
        "a submission folds once or not at all"
    }

    fn check(&self, before: &LedgerSnapshot, after: &LedgerSnapshot) -> Result<(), String> {
        let (d, ds, s) = before.global_sums;
        let expected = if self.consenting {
            (
                (d + self.duration_tenths, ds + self.deep_sleep_ratio, s + self.sleep_score),
                before.participants + 1,
            )
        } else {
            ((d, ds, s), before.participants)
        };
        if (after.global_sums, after.participants) != expected {
            return Err(std::format!(
                "expected global {:?}, got {:?}",
                expected,
                (after.global_sums, after.participants)
            ));
        }
        Ok(())
    }
}

pub struct TransitionInvariantSet {
    invariants: Vec<Box<dyn TransitionInvariant>>,
}

impl TransitionInvariantSet {
    pub fn new() -> Self {
        Self {
            invariants: Vec::new(),
        }
    }

    pub fn add(&mut self, invariant: Box<dyn TransitionInvariant>) {
        self.invariants.push(invariant);
    }

    pub fn check_all(
        &self,
        before: &LedgerSnapshot,
        after: &LedgerSnapshot,
    ) -> Vec<(String, String)> {
        let mut violations = Vec::new();
        for inv in &self.invariants {
            if let Err(msg) = inv.check(before, after) {
                violations.push((inv.name().to_string(), msg));
            }
        }
        violations
    }

    pub fn assert_all(&self, before: &LedgerSnapshot, after: &LedgerSnapshot) {
        let violations = self.check_all(before, after);
        if !violations.is_empty() {
            let mut report = String::from("Transition invariant violations:\n");
            for (name, msg) in &violations {
                report.push_str(&std::format!("  ✗ [{}]: {}\n", name, msg));
            }
            panic!("{}", report);
        }
    }
}

impl Default for TransitionInvariantSet {
    fn default() -> Self {
        Self::new()
    }
}
