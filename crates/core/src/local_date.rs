//! Local calendar-date resolution for code rotation.
//!
//! An access code rotates once per day as observed at the hospital's
//! location: the rotation key is the calendar date in the hospital's own
//! timezone, resolved from its coordinates. Hospitals without usable
//! coordinates rotate on the UTC calendar date instead — resolution never
//! fails, it only falls back.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tzf_rs::DefaultFinder;

/// Render format for rotation dates.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Error type for coordinate to timezone lookups.
#[derive(Debug, thiserror::Error)]
pub enum TimezoneLookupError {
    /// The lookup could not resolve the coordinates
    #[error("failed to resolve timezone: {0}")]
    ResolutionFailed(String),
}

/// Resolves the IANA timezone identifier covering a geographic point.
///
/// This is the one external collaborator of the code derivation.
/// Implementations may return an empty identifier for a point the dataset
/// does not cover (the resolver reads that as UTC) or an error for
/// coordinates they cannot handle at all (the resolver falls back to the
/// UTC date and logs a warning).
pub trait TimezoneLookup: Send + Sync {
    /// Returns the IANA timezone identifier for the coordinates.
    ///
    /// # Arguments
    /// * `latitude` - Latitude in decimal degrees, north positive
    /// * `longitude` - Longitude in decimal degrees, east positive
    fn timezone_name(&self, latitude: f64, longitude: f64) -> Result<String, TimezoneLookupError>;
}

/// [`TimezoneLookup`] backed by the timezone-boundary dataset that ships
/// inside `tzf-rs`.
///
/// Construction decompresses the embedded dataset, which is not cheap —
/// build one at process startup and share it rather than constructing per
/// call.
pub struct BundledTimezoneLookup {
    finder: DefaultFinder,
}

impl BundledTimezoneLookup {
    /// Creates a lookup over the bundled dataset.
    pub fn new() -> Self {
        Self {
            finder: DefaultFinder::new(),
        }
    }
}

impl Default for BundledTimezoneLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl TimezoneLookup for BundledTimezoneLookup {
    fn timezone_name(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<String, TimezoneLookupError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(TimezoneLookupError::ResolutionFailed(format!(
                "coordinates out of range: latitude {}, longitude {}",
                latitude, longitude
            )));
        }

        // tzf-rs takes longitude first.
        Ok(self.finder.get_tz_name(longitude, latitude).to_string())
    }
}

/// Resolves the calendar date that the current instant represents at a
/// location.
///
/// Convenience form of [`resolve_local_date_at`] pinned to `Utc::now()`.
pub fn resolve_local_date(
    lookup: &dyn TimezoneLookup,
    latitude: Option<&str>,
    longitude: Option<&str>,
) -> String {
    resolve_local_date_at(lookup, latitude, longitude, Utc::now())
}

/// Resolves the calendar date that `instant` represents at a location.
///
/// - With both coordinates present and resolvable, the instant is rendered
///   in the IANA timezone covering that point.
/// - With either coordinate missing, the UTC calendar date is returned.
///   Missing geodata is a defined fallback, not an error.
/// - A failed resolution (malformed coordinate text, a lookup error, or an
///   identifier the timezone database does not know) logs a warning and
///   falls back to the UTC calendar date.
/// - An empty identifier from the lookup means the point is outside every
///   timezone polygon and is read as UTC without a warning.
///
/// # Returns
/// A `YYYY-MM-DD` date string. This function never fails.
pub fn resolve_local_date_at(
    lookup: &dyn TimezoneLookup,
    latitude: Option<&str>,
    longitude: Option<&str>,
    instant: DateTime<Utc>,
) -> String {
    let (Some(lat_text), Some(lon_text)) = (latitude, longitude) else {
        return instant.format(DATE_FORMAT).to_string();
    };

    match resolve_timezone(lookup, lat_text, lon_text) {
        Some(tz) => instant.with_timezone(&tz).format(DATE_FORMAT).to_string(),
        None => instant.format(DATE_FORMAT).to_string(),
    }
}

/// Resolves the timezone covering a coordinate pair, or `None` for any
/// failure. The caller renders `None` as the UTC fallback.
fn resolve_timezone(lookup: &dyn TimezoneLookup, lat_text: &str, lon_text: &str) -> Option<Tz> {
    let (Ok(latitude), Ok(longitude)) =
        (lat_text.trim().parse::<f64>(), lon_text.trim().parse::<f64>())
    else {
        tracing::warn!(
            "malformed coordinates ({:?}, {:?}), falling back to UTC date",
            lat_text,
            lon_text
        );
        return None;
    };

    let name = match lookup.timezone_name(latitude, longitude) {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!(
                "timezone lookup failed for ({}, {}): {}, falling back to UTC date",
                latitude,
                longitude,
                e
            );
            return None;
        }
    };

    let name = name.trim();
    if name.is_empty() {
        // Outside every timezone polygon (open ocean) — a defined outcome.
        return Some(Tz::UTC);
    }

    match name.parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(e) => {
            tracing::warn!(
                "unknown timezone identifier {:?}: {}, falling back to UTC date",
                name,
                e
            );
            None
        }
    }
}
