//! # DayPass Core
//!
//! Daily hospital access-code derivation for the DayPass check-in gate.
//!
//! Hospitals admit child visits against a rotating **access code**: a
//! 4-digit numeric string that is valid for one calendar day *as observed
//! at the hospital's own location*. The code is never stored anywhere — it
//! is recomputed on demand from the hospital's identity, coordinates, and
//! the current local date, so any two services deriving a code for the
//! same hospital on the same local day agree without coordination.
//!
//! This crate contains pure derivation logic:
//! - [`AccessCode`]: a wrapper type that guarantees canonical 4-digit form
//!   once constructed
//! - [`AccessCodeService`]: code generation and validation
//! - [`TimezoneLookup`] and the local-date resolver: the coordinate to
//!   timezone seam that decides which calendar day a hospital is on
//!
//! ## Derivation
//!
//! `SHA-256("<hospital-id>-<lat>-<lon>-<YYYY-MM-DD>")`, first 8 hex
//! characters read as a base-16 integer, reduced modulo 10000 and
//! zero-padded to 4 digits. An absent coordinate contributes the literal
//! `"0"` to the hashed string. The date is the calendar date at the
//! hospital's coordinates; hospitals without usable coordinates rotate on
//! the UTC date instead.
//!
//! The 4-digit space is deliberately small. The code is a same-day,
//! in-person check-in gate handed out by hospital staff, not a
//! security-grade secret.
//!
//! **No API concerns**: HTTP servers, request types, or service wiring
//! belong in the server binary and `api-shared`.

mod local_date;
mod service;

pub use local_date::{
    resolve_local_date, resolve_local_date_at, BundledTimezoneLookup, TimezoneLookup,
    TimezoneLookupError,
};
pub use service::{AccessCode, AccessCodeService, HospitalLocation};

/// Error type for access-code operations.
#[derive(Debug, thiserror::Error)]
pub enum AccessCodeError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for access-code operations.
pub type AccessCodeResult<T> = Result<T, AccessCodeError>;
