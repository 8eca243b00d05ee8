//! Shared types for the SleepGuard contract suite.
//!
//! This crate provides:
//! - [`CommonError`]: error codes shared by the executor and the input codec.
//! - [`fhe_types`]: encrypted value type tags and the 32-byte handle layout.
//! - [`paillier`]: the additively homomorphic scheme behind the executor.
//! - [`input`]: the encrypted-input proof codec and its ledger/user binding.

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::arithmetic_side_effects)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

use soroban_sdk::contracterror;

// ── Modules ──────────────────────────────────────────────────────────────────

pub mod fhe_types;
pub mod input;
pub mod paillier;

pub use fhe_types::*;
pub use input::*;
pub use paillier::*;

// ── Shared error enum ────────────────────────────────────────────────────────

/// Standardised error codes shared by the SleepGuard contracts.
///
/// # Code ranges
/// | Range   | Purpose                        |
/// |---------|--------------------------------|
/// | 1 – 9   | Lifecycle / initialisation     |
/// | 10 – 19 | Authentication & authorisation |
/// | 20 – 29 | Resource not found             |
/// | 30 – 39 | Validation / input             |
#[contracterror]
#[derive(Clone, Debug, Eq, PartialEq, Copy)]
#[repr(u32)]
pub enum CommonError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    /// The account holds no ACL entry for the handle.
    AccessDenied = 10,
    HandleNotFound = 20,
    InvalidInput = 30,
    /// The input proof is malformed or does not bind the submitted handles.
    InvalidProof = 31,
    /// A ciphertext lies outside the scheme's ciphertext space.
    InvalidCiphertext = 32,
}
