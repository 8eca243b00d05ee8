//! # State Space Explorer
//!
//! Systematically explores reachable ledger states by executing action
//! sequences and verifying invariants after every transition.
//!
//! ## Design
//!
//! Each explored state is a `LedgerSnapshot`; edges are `SleepAction`s.
//! State invariants are checked on every snapshot and transition invariants
//! on every consecutive pair.
//!
//! ## Complexity
//!
//! - Time: O(S × (I + E)) for S steps, I invariants and E stored entries,
//!   since each snapshot reads back every entry of every tracked user.
//! - Space: O(S × U) when snapshots are recorded, O(U) otherwise.

extern crate std;

use std::string::String;
use std::vec::Vec;

use super::generators::SleepAction;
use super::invariants::{AppendOnly, InvariantSet, TransitionInvariantSet};
use super::{ActionOutcome, LedgerSnapshot, SleepGuardHarness, TestRunSummary, TestUser};

/// Day the explorer's `day` offsets count from.
pub const BASE_DAY: u32 = 19_700;

// ── Explorer Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    /// Maximum number of actions to execute in a single exploration run.
    pub max_steps: usize,
    /// Whether to halt on the first invariant violation (fail-fast).
    pub fail_fast: bool,
    /// Whether to record snapshots for later analysis.
    pub record_snapshots: bool,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            max_steps: 60,
            fail_fast: true,
            record_snapshots: false,
        }
    }
}

// ── Exploration Result ───────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ExplorationResult {
    pub summary: TestRunSummary,
    pub snapshots: Vec<LedgerSnapshot>,
    pub action_log: Vec<(SleepAction, ActionOutcome)>,
}

impl ExplorationResult {
    pub fn passed(&self) -> bool {
        self.summary.passed()
    }

    /// Number of actions the ledger accepted.
    pub fn accepted(&self) -> usize {
        self.action_log
            .iter()
            .filter(|(_, o)| *o == ActionOutcome::Ok)
            .count()
    }

    /// Codes of every contract rejection, in order.
    pub fn rejections(&self) -> Vec<u32> {
        self.action_log
            .iter()
            .filter_map(|(_, o)| match o {
                ActionOutcome::ExpectedError(code) => Some(*code),
                _ => None,
            })
            .collect()
    }
}

// ── State Space Explorer ─────────────────────────────────────────────────────

/// Executes action sequences against a deployed ledger, checking invariants
/// after every transition.
pub struct StateExplorer<'h, 'a> {
    harness: &'h SleepGuardHarness<'a>,
    invariants: InvariantSet,
    transitions: TransitionInvariantSet,
    config: ExplorerConfig,
    users: Vec<TestUser>,
}

impl<'h, 'a> StateExplorer<'h, 'a> {
    pub fn new(
        harness: &'h SleepGuardHarness<'a>,
        invariants: InvariantSet,
        transitions: TransitionInvariantSet,
        config: ExplorerConfig,
        users: Vec<TestUser>,
    ) -> Self {
        Self {
            harness,
            invariants,
            transitions,
            config,
            users,
        }
    }

    /// Default configuration, every built-in state invariant and the
    /// append-only transition check.
    pub fn with_defaults(harness: &'h SleepGuardHarness<'a>, users: Vec<TestUser>) -> Self {
        let mut transitions = TransitionInvariantSet::new();
        transitions.add(Box::new(AppendOnly));
        Self::new(
            harness,
            InvariantSet::ledger_defaults(),
            transitions,
            ExplorerConfig::default(),
            users,
        )
    }

    pub fn explore(&mut self, actions: &[SleepAction]) -> ExplorationResult {
        let mut summary = TestRunSummary::new();
        let mut snapshots = Vec::new();
        let mut action_log = Vec::new();

        let mut previous = self.harness.snapshot(&self.users);
        if self.config.record_snapshots {
            snapshots.push(previous.clone());
        }

        let steps = actions.len().min(self.config.max_steps);

        for action in actions.iter().take(steps) {
            let outcome = self.execute_action(action);
            summary.entry_points_hit.insert(action_entry_point(action));
            summary.actions_executed += 1;
            summary.transitions_observed += 1;

            action_log.push((action.clone(), outcome));

            let snapshot = self.harness.snapshot(&self.users);
            let mut violations = self.invariants.check_all(&snapshot);
            violations.extend(self.transitions.check_all(&previous, &snapshot));
            summary.invariant_checks += 1;

            for (name, msg) in violations {
                summary.invariant_violations.push(std::format!(
                    "After action #{} ({:?}): [{}] {}",
                    summary.actions_executed,
                    action,
                    name,
                    msg
                ));
            }

            if self.config.record_snapshots {
                snapshots.push(snapshot.clone());
            }
            if self.config.fail_fast && !summary.passed() {
                break;
            }
            previous = snapshot;
        }

        ExplorationResult {
            summary,
            snapshots,
            action_log,
        }
    }

    fn user(&self, index: usize) -> &TestUser {
        &self.users[index % self.users.len()]
    }

    fn execute_action(&self, action: &SleepAction) -> ActionOutcome {
        let ledger = &self.harness.ledger;
        match action {
            SleepAction::CreateProfile { user_index, flags } => {
                let user = self.user(*user_index);
                outcome(ledger.try_create_profile(
                    &user.address,
                    &flags.allow_aggregation,
                    &flags.allow_anonymous_report,
                ))
            }
            SleepAction::Submit {
                user_index,
                day,
                metrics,
            } => {
                let user = self.user(*user_index);
                let payload = self.harness.encrypt(user, metrics);
                let (handles, proof) = self.harness.to_args(&payload);
                outcome(ledger.try_submit_entry(&user.address, &(BASE_DAY + day), &handles, &proof))
            }
            SleepAction::UpdatePrivacy { user_index, flags } => {
                let user = self.user(*user_index);
                outcome(ledger.try_update_privacy_settings(
                    &user.address,
                    &flags.allow_aggregation,
                    &flags.allow_anonymous_report,
                ))
            }
            SleepAction::UpdateLeaderboard { user_index, join } => {
                let user = self.user(*user_index);
                outcome(ledger.try_update_leaderboard_participation(&user.address, join))
            }
            SleepAction::AuthorizeGlobalRead { user_index } => {
                let user = self.user(*user_index);
                outcome(ledger.try_authorize_global_read(&user.address))
            }
            SleepAction::AdvanceTime { delta } => {
                self.harness.env.advance_time(*delta);
                ActionOutcome::Ok
            }
        }
    }
}

fn outcome<T, C, E: std::fmt::Debug>(
    result: Result<Result<T, C>, Result<sleep_guard::ContractError, E>>,
) -> ActionOutcome {
    match result {
        Ok(_) => ActionOutcome::Ok,
        Err(Ok(e)) => ActionOutcome::ExpectedError(e as u32),
        Err(Err(e)) => ActionOutcome::UnexpectedError(std::format!("{:?}", e)),
    }
}

fn action_entry_point(action: &SleepAction) -> String {
    match action {
        SleepAction::CreateProfile { .. } => "create_profile".into(),
        SleepAction::Submit { .. } => "submit_entry".into(),
        SleepAction::UpdatePrivacy { .. } => "update_privacy_settings".into(),
        SleepAction::UpdateLeaderboard { .. } => "update_leaderboard_participation".into(),
        SleepAction::AuthorizeGlobalRead { .. } => "authorize_global_read".into(),
        SleepAction::AdvanceTime { .. } => "advance_time".into(),
    }
}

/// Mutating ledger entry points reachable from `SleepAction`, for coverage.
pub const SLEEP_GUARD_ENTRY_POINTS: &[&str] = &[
    "create_profile",
    "submit_entry",
    "update_privacy_settings",
    "update_leaderboard_participation",
    "authorize_global_read",
];
