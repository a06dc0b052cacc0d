//! # API Shared
//!
//! Shared request/response definitions for DayPass APIs.
//!
//! Contains:
//! - Request and response types for the access-code endpoints
//! - Shared services like `HealthService`
//!
//! Used by the `daypass-run` server binary; kept free of derivation logic
//! so other API surfaces can reuse the same wire types.

pub mod access_code;
pub mod health;

pub use access_code::{
    GenerateAccessCodeReq, GenerateAccessCodeRes, ValidateAccessCodeReq, ValidateAccessCodeRes,
};
pub use health::{HealthRes, HealthService};
