//! Errors reported by configuration operations.
//!
//! The decision engine itself never fails; everything here comes from
//! registering points, editing groups or parsing control input.  Every
//! failing operation leaves the prior state untouched.

use crate::config::FaultKind;
use crate::site::Address;
use thiserror::Error;

/// Errors from configuration and registration operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FaultError {
    // ── Validation ──────────────────────────────────────────────
    #[error("probability {0} out of range (expected 1..=100)")]
    ProbabilityOutOfRange(u32),

    #[error("interval must be at least 1")]
    ZeroInterval,

    #[error("times must be -1 (unlimited) or a positive count, got {0}")]
    InvalidTimes(i64),

    #[error("group id {0} out of range (expected 0..=255)")]
    GroupIdOutOfRange(i64),

    #[error("cannot parse error list {input:?}: {reason}")]
    ParseErrors { input: String, reason: String },

    #[error("malformed fault point address {0:?}")]
    MalformedAddress(String),

    #[error("malformed value {input:?} for {attribute}")]
    MalformedValue { attribute: String, input: String },

    #[error("unknown attribute {0:?}")]
    UnknownAttribute(String),

    #[error("{attribute} is not supported by {kind} faults")]
    UnsupportedAttribute {
        kind: FaultKind,
        attribute: &'static str,
    },

    #[error("{0} is read-only")]
    ReadOnly(&'static str),

    #[error("malformed command {0:?}")]
    MalformedCommand(String),

    // ── Not found ───────────────────────────────────────────────
    #[error("no fault point at address {0}")]
    UnknownAddress(Address),

    #[error("fault group {0} does not exist")]
    UnknownGroup(u8),

    #[error("fault point {address} is not a member of group {group}")]
    NotInGroup { address: Address, group: u8 },

    // ── Conflict ────────────────────────────────────────────────
    #[error("fault group {0} already exists")]
    GroupExists(u8),

    #[error("fault point {address} already belongs to group {group}")]
    AlreadyInGroup { address: Address, group: u8 },

    #[error("a fault point is already registered at {0}")]
    DuplicatePoint(Address),

    // ── Capacity ────────────────────────────────────────────────
    #[error("all 256 fault groups are taken")]
    AllGroupsTaken,

    // ── Empty input ─────────────────────────────────────────────
    #[error("fault group {0} has no fault points to remove")]
    NoMembers(u8),

    #[error("empty value for {0}")]
    EmptyInput(&'static str),
}

/// Broad class of a [`FaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Validation,
    NotFound,
    Conflict,
    Capacity,
    EmptyInput,
}

impl FaultError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            FaultError::ProbabilityOutOfRange(_)
            | FaultError::ZeroInterval
            | FaultError::InvalidTimes(_)
            | FaultError::GroupIdOutOfRange(_)
            | FaultError::ParseErrors { .. }
            | FaultError::MalformedAddress(_)
            | FaultError::MalformedValue { .. }
            | FaultError::UnknownAttribute(_)
            | FaultError::UnsupportedAttribute { .. }
            | FaultError::ReadOnly(_)
            | FaultError::MalformedCommand(_) => ErrorClass::Validation,

            FaultError::UnknownAddress(_)
            | FaultError::UnknownGroup(_)
            | FaultError::NotInGroup { .. } => ErrorClass::NotFound,

            FaultError::GroupExists(_)
            | FaultError::AlreadyInGroup { .. }
            | FaultError::DuplicatePoint(_) => ErrorClass::Conflict,

            FaultError::AllGroupsTaken => ErrorClass::Capacity,

            FaultError::NoMembers(_) | FaultError::EmptyInput(_) => ErrorClass::EmptyInput,
        }
    }
}

pub type Result<T, E = FaultError> = std::result::Result<T, E>;
