//! Access-code derivation and validation.
//!
//! The check-in gate works without shared state: a hospital's code for a
//! given local day is a pure function of its identity, its coordinates, and
//! that day's date. Generation and validation both recompute the code from
//! scratch, so the dashboard that displays it and the service that checks
//! it agree by construction.

use crate::local_date::{resolve_local_date_at, BundledTimezoneLookup, TimezoneLookup};
use crate::{AccessCodeError, AccessCodeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Placeholder hashed in place of an absent coordinate.
///
/// The token is part of the derivation: every deployment must substitute
/// the same literal or codes for coordinate-less hospitals diverge. It is
/// `"0"` verbatim, not `"0.0"` and not an empty string.
const MISSING_COORDINATE_TOKEN: &str = "0";

/// Leading hex characters of the digest folded into the code.
const DIGEST_PREFIX_LEN: usize = 8;

/// Size of the code space; the digest prefix is reduced modulo this.
const CODE_SPACE: u32 = 10_000;

/// A hospital's identity and position as the surrounding platform stores
/// them.
///
/// Coordinates are optional decimal-degree strings and enter the
/// derivation verbatim; they are only ever parsed for the timezone lookup.
/// `#[serde(default)]` keeps an explicit JSON `null` and an absent field
/// identical (`None`), which keeps the derived code identical too.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HospitalLocation {
    /// Platform identifier for the hospital
    pub id: String,
    /// Latitude in decimal degrees, if the hospital has one on record
    #[serde(default)]
    pub latitude: Option<String>,
    /// Longitude in decimal degrees, if the hospital has one on record
    #[serde(default)]
    pub longitude: Option<String>,
}

impl HospitalLocation {
    /// Creates a location record from the platform's raw fields.
    pub fn new(id: impl Into<String>, latitude: Option<String>, longitude: Option<String>) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
        }
    }
}

/// A daily hospital access code in canonical form.
///
/// This wrapper type guarantees that once constructed, the contained code
/// is exactly 4 ASCII digits (`"0000"` through `"9999"`). Leading zeros
/// are significant: `"0300"` and `"300"` are different strings and only
/// the first is a code.
///
/// # Construction
/// Codes come from [`AccessCodeService`] or from [`AccessCode::parse`] for
/// externally supplied text. There is no way to hold a non-canonical code.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AccessCode(String);

impl AccessCode {
    /// Parses externally supplied text into a canonical access code.
    ///
    /// # Arguments
    /// * `input` - The candidate code text
    ///
    /// # Returns
    /// The canonical code, or `AccessCodeError::InvalidInput` if the text
    /// is not exactly 4 ASCII digits.
    pub fn parse(input: &str) -> AccessCodeResult<Self> {
        if Self::is_canonical(input) {
            return Ok(Self(input.to_owned()));
        }

        Err(AccessCodeError::InvalidInput(format!(
            "access code must be exactly 4 digits, got: '{}'",
            input
        )))
    }

    /// Returns true if `input` is in canonical access-code form.
    ///
    /// Purely syntactic: exactly 4 bytes, all ASCII digits.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 4 && input.bytes().all(|b| b.is_ascii_digit())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds a code from a value already reduced into the code space.
    fn from_code_point(value: u32) -> Self {
        // value < CODE_SPACE after the modulo reduction, so this is always
        // 4 digits.
        Self(format!("{:04}", value))
    }
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccessCode {
    type Err = AccessCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for AccessCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AccessCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        AccessCode::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Derives and validates daily hospital access codes.
///
/// The service owns the coordinate to timezone lookup used to resolve each
/// hospital's rotation date. Construct it once at process startup (the
/// bundled dataset decompresses on construction) and share it; every
/// operation is a pure synchronous computation over `&self`.
pub struct AccessCodeService {
    lookup: Box<dyn TimezoneLookup>,
}

impl AccessCodeService {
    /// Creates a service over the bundled timezone dataset.
    pub fn new() -> Self {
        Self::with_lookup(Box::new(BundledTimezoneLookup::new()))
    }

    /// Creates a service over a caller-provided timezone lookup.
    pub fn with_lookup(lookup: Box<dyn TimezoneLookup>) -> Self {
        Self { lookup }
    }

    /// Generates the access code for a hospital's current local day.
    ///
    /// # Arguments
    /// * `hospital` - The hospital's identity and coordinates
    ///
    /// # Returns
    /// The canonical 4-digit code staff hand to parents at check-in.
    pub fn generate_code(&self, hospital: &HospitalLocation) -> AccessCode {
        self.generate_code_at(hospital, Utc::now())
    }

    /// Generates the access code a hospital carries at `instant`.
    ///
    /// Deterministic: identical hospital fields and an identical resolved
    /// rotation date always yield the identical code.
    pub fn generate_code_at(
        &self,
        hospital: &HospitalLocation,
        instant: DateTime<Utc>,
    ) -> AccessCode {
        let local_date = self.local_date_at(
            hospital.latitude.as_deref(),
            hospital.longitude.as_deref(),
            instant,
        );
        let input = canonical_input(hospital, &local_date);

        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        let digest_hex = hex::encode(hasher.finalize());

        // 8 hex characters fit a u32 exactly.
        let prefix = &digest_hex[..DIGEST_PREFIX_LEN];
        let value =
            u32::from_str_radix(prefix, 16).expect("sha-256 digest prefix is valid base-16");

        AccessCode::from_code_point(value % CODE_SPACE)
    }

    /// Checks a submitted code against the hospital's current code.
    ///
    /// Comparison is exact string equality, so leading zeros matter and
    /// text that is not 4 digits is simply `false`, never an error. The
    /// check recomputes the expected code; nothing is stored or consumed,
    /// and throttling belongs to the calling layer. A call racing the
    /// hospital's local midnight may observe either day's code.
    ///
    /// # Arguments
    /// * `submitted` - The code text presented at check-in
    /// * `hospital` - The hospital's identity and coordinates
    pub fn validate_code(&self, submitted: &str, hospital: &HospitalLocation) -> bool {
        self.validate_code_at(submitted, hospital, Utc::now())
    }

    /// Checks a submitted code against the code expected at `instant`.
    pub fn validate_code_at(
        &self,
        submitted: &str,
        hospital: &HospitalLocation,
        instant: DateTime<Utc>,
    ) -> bool {
        self.generate_code_at(hospital, instant).as_str() == submitted
    }

    /// Resolves the calendar date a hospital's code currently rotates on.
    pub fn local_date(&self, latitude: Option<&str>, longitude: Option<&str>) -> String {
        self.local_date_at(latitude, longitude, Utc::now())
    }

    /// Resolves the rotation date as of `instant`.
    pub fn local_date_at(
        &self,
        latitude: Option<&str>,
        longitude: Option<&str>,
        instant: DateTime<Utc>,
    ) -> String {
        resolve_local_date_at(self.lookup.as_ref(), latitude, longitude, instant)
    }
}

impl Default for AccessCodeService {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the text hashed into a code: hospital id, latitude, longitude,
/// and rotation date joined with `-`, with an absent coordinate replaced
/// by [`MISSING_COORDINATE_TOKEN`]. Present coordinate text enters
/// verbatim, parseable or not.
fn canonical_input(hospital: &HospitalLocation, local_date: &str) -> String {
    format!(
        "{}-{}-{}-{}",
        hospital.id,
        hospital
            .latitude
            .as_deref()
            .unwrap_or(MISSING_COORDINATE_TOKEN),
        hospital
            .longitude
            .as_deref()
            .unwrap_or(MISSING_COORDINATE_TOKEN),
        local_date
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_date::TimezoneLookupError;

    struct FixedZone(&'static str);

    impl TimezoneLookup for FixedZone {
        fn timezone_name(
            &self,
            _latitude: f64,
            _longitude: f64,
        ) -> Result<String, TimezoneLookupError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingLookup;

    impl TimezoneLookup for FailingLookup {
        fn timezone_name(
            &self,
            _latitude: f64,
            _longitude: f64,
        ) -> Result<String, TimezoneLookupError> {
            Err(TimezoneLookupError::ResolutionFailed("no data".into()))
        }
    }

    fn utc_service() -> AccessCodeService {
        AccessCodeService::with_lookup(Box::new(FixedZone("UTC")))
    }

    fn tokyo_service() -> AccessCodeService {
        AccessCodeService::with_lookup(Box::new(FixedZone("Asia/Tokyo")))
    }

    fn instant(text: &str) -> DateTime<Utc> {
        text.parse().unwrap()
    }

    fn bare_hospital(id: &str) -> HospitalLocation {
        HospitalLocation::new(id, None, None)
    }

    fn tokyo_hospital(id: &str) -> HospitalLocation {
        HospitalLocation::new(id, Some("35.6895".into()), Some("139.6917".into()))
    }

    #[test]
    fn test_generated_code_is_four_ascii_digits() {
        let service = utc_service();
        for id in ["hosp-1", "clinic-7", "x", "a-very-long-hospital-identifier"] {
            let code = service.generate_code_at(&bare_hospital(id), instant("2024-06-15T00:00:00Z"));
            assert_eq!(code.as_str().len(), 4);
            assert!(code.as_str().bytes().all(|b| b.is_ascii_digit()));
            assert!(AccessCode::is_canonical(code.as_str()));
        }
    }

    #[test]
    fn test_generation_is_deterministic_at_a_fixed_instant() {
        let service = utc_service();
        let hospital = tokyo_hospital("hosp-1");
        let at = instant("2024-06-15T09:30:00Z");

        let first = service.generate_code_at(&hospital, at);
        let second = service.generate_code_at(&hospital, at);

        assert_eq!(first, second);
    }

    #[test]
    fn test_known_code_without_coordinates() {
        // sha256("hosp-1-0-0-2024-06-15") starts 90cab654; 0x90cab654 is
        // 2429204052, which reduces to 4052.
        let service = utc_service();
        let code =
            service.generate_code_at(&bare_hospital("hosp-1"), instant("2024-06-15T00:00:00Z"));
        assert_eq!(code.as_str(), "4052");
    }

    #[test]
    fn test_known_code_for_another_hospital() {
        let service = utc_service();
        let code =
            service.generate_code_at(&bare_hospital("clinic-7"), instant("2024-06-15T00:00:00Z"));
        assert_eq!(code.as_str(), "2609");
    }

    #[test]
    fn test_known_code_with_a_leading_zero() {
        let service = utc_service();
        let code =
            service.generate_code_at(&bare_hospital("ward-3"), instant("2024-06-15T00:00:00Z"));
        assert_eq!(code.as_str(), "0300");
    }

    #[test]
    fn test_canonical_input_substitutes_zero_for_missing_coordinates() {
        let input = canonical_input(&bare_hospital("hosp-1"), "2024-06-15");
        assert_eq!(input, "hosp-1-0-0-2024-06-15");
    }

    #[test]
    fn test_canonical_input_joins_identity_coordinates_and_date() {
        let input = canonical_input(&tokyo_hospital("hosp-1"), "2024-06-15");
        assert_eq!(input, "hosp-1-35.6895-139.6917-2024-06-15");
    }

    #[test]
    fn test_canonical_input_uses_coordinate_text_verbatim() {
        let hospital = HospitalLocation::new("hosp-1", Some("35.68950".into()), Some("n/a".into()));
        let input = canonical_input(&hospital, "2024-06-15");
        assert_eq!(input, "hosp-1-35.68950-n/a-2024-06-15");
    }

    #[test]
    fn test_codes_differ_between_hospitals() {
        let service = utc_service();
        let at = instant("2024-01-01T00:00:00Z");
        let first = HospitalLocation::new("h1", Some("35.0".into()), Some("139.0".into()));
        let second = HospitalLocation::new("h2", Some("35.0".into()), Some("139.0".into()));

        assert_eq!(service.generate_code_at(&first, at).as_str(), "5848");
        assert_eq!(service.generate_code_at(&second, at).as_str(), "9968");
    }

    #[test]
    fn test_codes_rotate_when_the_date_changes() {
        let service = utc_service();
        let hospital = HospitalLocation::new("h1", Some("35.0".into()), Some("139.0".into()));

        let monday = service.generate_code_at(&hospital, instant("2024-01-01T00:00:00Z"));
        let tuesday = service.generate_code_at(&hospital, instant("2024-01-02T00:00:00Z"));

        assert_eq!(monday.as_str(), "5848");
        assert_eq!(tuesday.as_str(), "1886");
    }

    #[test]
    fn test_codes_differ_with_and_without_coordinates() {
        let service = utc_service();
        let at = instant("2024-06-15T00:00:00Z");

        let with = service.generate_code_at(&tokyo_hospital("hosp-1"), at);
        let without = service.generate_code_at(&bare_hospital("hosp-1"), at);

        assert_eq!(with.as_str(), "7615");
        assert_eq!(without.as_str(), "4052");
    }

    #[test]
    fn test_local_timezone_shifts_the_rotation_date() {
        let service = tokyo_service();
        let hospital = tokyo_hospital("hosp-1");
        let late_utc = instant("2024-06-15T20:00:00Z");

        assert_eq!(
            service.local_date_at(
                hospital.latitude.as_deref(),
                hospital.longitude.as_deref(),
                late_utc
            ),
            "2024-06-16"
        );
        assert_eq!(service.generate_code_at(&hospital, late_utc).as_str(), "3364");
    }

    #[test]
    fn test_code_changes_at_local_midnight() {
        let service = tokyo_service();
        let hospital = tokyo_hospital("hosp-1");

        // 2024-06-15T14:59:59Z is 23:59:59 in Tokyo; one second later the
        // local date rolls over.
        let before = service.generate_code_at(&hospital, instant("2024-06-15T14:59:59Z"));
        let after = service.generate_code_at(&hospital, instant("2024-06-15T15:00:00Z"));

        assert_eq!(before.as_str(), "7615");
        assert_eq!(after.as_str(), "3364");
    }

    #[test]
    fn test_lookup_failure_yields_the_utc_code() {
        let failing = AccessCodeService::with_lookup(Box::new(FailingLookup));
        let hospital = tokyo_hospital("hosp-1");
        let at = instant("2024-06-15T00:00:00Z");

        // The coordinates still enter the hash verbatim; only the rotation
        // date falls back to UTC.
        assert_eq!(failing.generate_code_at(&hospital, at).as_str(), "7615");
        assert_eq!(
            failing.generate_code_at(&hospital, at),
            utc_service().generate_code_at(&hospital, at)
        );
    }

    #[test]
    fn test_validator_accepts_the_current_code() {
        let service = utc_service();
        let at = instant("2024-06-15T00:00:00Z");

        for hospital in [
            bare_hospital("hosp-1"),
            bare_hospital("ward-3"),
            tokyo_hospital("hosp-1"),
        ] {
            let code = service.generate_code_at(&hospital, at);
            assert!(service.validate_code_at(code.as_str(), &hospital, at));
        }
    }

    #[test]
    fn test_validator_rejects_a_wrong_code() {
        let service = utc_service();
        let at = instant("2024-06-15T00:00:00Z");
        assert!(!service.validate_code_at("0000", &bare_hospital("hosp-1"), at));
    }

    #[test]
    fn test_validator_rejects_yesterdays_code() {
        let service = utc_service();
        let hospital = HospitalLocation::new("h1", Some("35.0".into()), Some("139.0".into()));

        let monday_code = service.generate_code_at(&hospital, instant("2024-01-01T00:00:00Z"));
        assert!(!service.validate_code_at(
            monday_code.as_str(),
            &hospital,
            instant("2024-01-02T00:00:00Z")
        ));
    }

    #[test]
    fn test_validator_matches_exact_text_only() {
        let service = utc_service();
        let hospital = bare_hospital("hosp-1");
        let at = instant("2024-06-15T00:00:00Z");

        // The current code is 4052.
        assert!(service.validate_code_at("4052", &hospital, at));
        for wrong in ["405", "40520", "04052", " 4052", "4052 ", "", "abcd"] {
            assert!(!service.validate_code_at(wrong, &hospital, at));
        }
    }

    #[test]
    fn test_validator_requires_the_leading_zero() {
        let service = utc_service();
        let hospital = bare_hospital("ward-3");
        let at = instant("2024-06-15T00:00:00Z");

        // The current code is 0300.
        assert!(service.validate_code_at("0300", &hospital, at));
        assert!(!service.validate_code_at("300", &hospital, at));
    }

    #[test]
    fn test_default_service_resolves_dates_from_the_bundled_dataset() {
        let service = AccessCodeService::new();
        let date = service.local_date_at(
            Some("35.6895"),
            Some("139.6917"),
            instant("2024-06-15T20:00:00Z"),
        );
        assert_eq!(date, "2024-06-16");
    }

    #[test]
    fn test_parse_accepts_canonical_codes() {
        for text in ["0000", "0042", "4052", "9999"] {
            let code = AccessCode::parse(text).unwrap();
            assert_eq!(code.as_str(), text);
        }
    }

    #[test]
    fn test_parse_rejects_short_input() {
        assert!(AccessCode::parse("405").is_err());
        assert!(AccessCode::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_long_input() {
        assert!(AccessCode::parse("40520").is_err());
    }

    #[test]
    fn test_parse_rejects_non_digit_input() {
        assert!(AccessCode::parse("40a2").is_err());
        assert!(AccessCode::parse("4O52").is_err());
        assert!(AccessCode::parse("-405").is_err());
    }

    #[test]
    fn test_parse_rejects_whitespace() {
        assert!(AccessCode::parse(" 405").is_err());
        assert!(AccessCode::parse("4052 ").is_err());
    }

    #[test]
    fn test_parse_rejects_non_ascii_digits() {
        // Fullwidth digits
        assert!(AccessCode::parse("４０５２").is_err());
    }

    #[test]
    fn test_is_canonical() {
        assert!(AccessCode::is_canonical("0000"));
        assert!(AccessCode::is_canonical("9999"));
        assert!(!AccessCode::is_canonical("999"));
        assert!(!AccessCode::is_canonical("99999"));
        assert!(!AccessCode::is_canonical("99x9"));
        assert!(!AccessCode::is_canonical(""));
    }

    #[test]
    fn test_access_code_display_and_from_str_round_trip() {
        let code = AccessCode::parse("0042").unwrap();
        assert_eq!(code.to_string(), "0042");

        let parsed: AccessCode = "0042".parse().unwrap();
        assert_eq!(parsed, code);

        let invalid: Result<AccessCode, _> = "42".parse();
        assert!(invalid.is_err());
    }

    #[test]
    fn test_access_code_serialises_as_a_bare_string() {
        let code = AccessCode::parse("4052").unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"4052\"");
    }

    #[test]
    fn test_access_code_deserialises_only_canonical_text() {
        let code: AccessCode = serde_json::from_str("\"0300\"").unwrap();
        assert_eq!(code.as_str(), "0300");

        assert!(serde_json::from_str::<AccessCode>("\"300\"").is_err());
        assert!(serde_json::from_str::<AccessCode>("\"03000\"").is_err());
        assert!(serde_json::from_str::<AccessCode>("300").is_err());
    }

    #[test]
    fn test_null_and_absent_coordinates_deserialise_identically() {
        let with_null: HospitalLocation =
            serde_json::from_str(r#"{"id":"hosp-1","latitude":null,"longitude":null}"#).unwrap();
        let absent: HospitalLocation = serde_json::from_str(r#"{"id":"hosp-1"}"#).unwrap();

        assert_eq!(with_null, absent);

        let service = utc_service();
        let at = instant("2024-06-15T00:00:00Z");
        assert_eq!(
            service.generate_code_at(&with_null, at),
            service.generate_code_at(&absent, at)
        );
    }

    #[test]
    fn test_hospital_location_round_trips_through_json() {
        let hospital = tokyo_hospital("hosp-1");
        let json = serde_json::to_string(&hospital).unwrap();
        let back: HospitalLocation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hospital);
    }

    #[test]
    fn test_empty_coordinate_strings_are_hashed_but_not_resolved() {
        // An empty string is a present coordinate: it enters the canonical
        // input verbatim, while date resolution falls back to UTC.
        let service = tokyo_service();
        let hospital = HospitalLocation::new("hosp-1", Some("".into()), Some("".into()));
        let at = instant("2024-06-15T20:00:00Z");

        assert_eq!(canonical_input(&hospital, "2024-06-15"), "hosp-1---2024-06-15");
        assert_eq!(service.generate_code_at(&hospital, at).as_str(), "4578");
        assert_eq!(
            service.generate_code_at(&hospital, at),
            utc_service().generate_code_at(&hospital, at)
        );
    }
}
