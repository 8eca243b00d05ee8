use soroban_sdk::{contracterror, contracttype, Address, BytesN};

/// Storage keys for per-user records.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataKey {
    Profile(Address),
    Entry(Address, u64),
    /// Marks that `user` already submitted for a calendar day.
    EntryDate(Address, u32),
    UserAggregate(Address),
}

/// A participant's settings and entry counter.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Profile {
    pub owner: Address,
    pub created_at: u64,
    pub allow_aggregation: bool,
    pub allow_anonymous_report: bool,
    pub join_leaderboard: bool,
    pub total_entries: u64,
}

/// One night of encrypted metrics. Immutable once stored.
///
/// `date` is the calendar-day key (whole days since the Unix epoch). The six
/// handles are the executor's ciphertext handles in submission order.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SleepEntry {
    pub date: u32,
    pub bedtime: BytesN<32>,
    pub wake_time: BytesN<32>,
    /// Hours slept × 10.
    pub duration: BytesN<32>,
    pub deep_sleep_ratio: BytesN<32>,
    pub wake_count: BytesN<32>,
    pub sleep_score: BytesN<32>,
    pub submitted_at: u64,
}

/// Encrypted running sums over one user's folded entries.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UserAggregate {
    pub sum_duration: BytesN<32>,
    pub sum_deep_sleep: BytesN<32>,
    pub sum_score: BytesN<32>,
    pub count: u64,
}

/// Encrypted running sums over every folded entry of every participant.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GlobalAggregate {
    pub sum_duration: BytesN<32>,
    pub sum_deep_sleep: BytesN<32>,
    pub sum_score: BytesN<32>,
    pub participants: u64,
}

/// Contract errors
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ContractError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    ProfileAlreadyExists = 4,
    ProfileNotCreated = 5,
    DataAlreadySubmittedForDate = 6,
    InvalidIndex = 7,
    InvalidProof = 8,
    InvalidHandles = 9,
}
