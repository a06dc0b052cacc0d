//! Request and response types for the access-code endpoints.
//!
//! Coordinates are optional everywhere: `#[serde(default)]` makes an absent
//! field and an explicit JSON `null` indistinguishable, which matters
//! because the coordinate fields participate in code derivation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request to derive a hospital's current access code.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct GenerateAccessCodeReq {
    /// Platform identifier of the hospital
    pub hospital_id: String,
    /// Latitude in decimal degrees, if the hospital has one on record
    #[serde(default)]
    pub latitude: Option<String>,
    /// Longitude in decimal degrees, if the hospital has one on record
    #[serde(default)]
    pub longitude: Option<String>,
}

/// A derived access code and the rotation date it was derived for.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct GenerateAccessCodeRes {
    /// The 4-digit code valid for the hospital's current local day
    pub code: String,
    /// The hospital's local calendar date (`YYYY-MM-DD`) the code rotates on
    pub local_date: String,
}

/// Request to check a submitted code against a hospital's current code.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidateAccessCodeReq {
    /// The code text presented at check-in
    pub code: String,
    /// Platform identifier of the hospital
    pub hospital_id: String,
    /// Latitude in decimal degrees, if the hospital has one on record
    #[serde(default)]
    pub latitude: Option<String>,
    /// Longitude in decimal degrees, if the hospital has one on record
    #[serde(default)]
    pub longitude: Option<String>,
}

/// Result of checking a submitted code.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidateAccessCodeRes {
    /// Whether the submitted code matches the hospital's current code
    pub valid: bool,
}
