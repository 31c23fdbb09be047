// One connector per external provider. Each owns its authentication state
// and its vendor-specific parsing; all of them emit the normalized model.

pub mod amadeus;
pub mod lcc;
pub mod sabre;
pub mod travelport;

pub use amadeus::AmadeusConnector;
pub use lcc::LccConnector;
pub use sabre::SabreConnector;
pub use travelport::TravelportConnector;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::connector::BookingResult;
use crate::error::ConnectorError;

/// Classify a vendor's 4xx booking response. 401/403 means the credential
/// is bad and surfaces as [`ConnectorError::Auth`]; any other client error
/// is a business-level decline (fare gone, invalid traveler data) and stays
/// a structured failure.
pub(crate) fn booking_rejection(
    vendor: &str,
    status: reqwest::StatusCode,
    message: String,
) -> Result<BookingResult, ConnectorError> {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ConnectorError::Auth(format!(
            "{vendor} rejected the credentials ({status}): {message}"
        )));
    }
    Ok(BookingResult::declined(format!(
        "{vendor} declined the booking ({status}): {message}"
    )))
}

/// Parse a vendor timestamp into UTC. Accepts RFC 3339 (with offset) and
/// bare `YYYY-MM-DDTHH:MM:SS`, which some backends emit without a zone and
/// which is treated as UTC.
pub(crate) fn parse_datetime_utc(raw: &str) -> Result<DateTime<Utc>, ConnectorError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.3f"))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| ConnectorError::MalformedResponse(format!("unparseable datetime '{raw}'")))
}

/// Parse an ISO 8601 duration (`PT2H30M`, `P1DT5H`) into whole minutes.
/// Seconds are truncated.
pub(crate) fn parse_iso8601_duration_minutes(raw: &str) -> Result<u32, ConnectorError> {
    let malformed = || ConnectorError::MalformedResponse(format!("unparseable duration '{raw}'"));

    let rest = raw.strip_prefix('P').ok_or_else(malformed)?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, t),
        None => (rest, ""),
    };

    let mut minutes: u64 = 0;
    let mut number = String::new();
    for c in date_part.chars() {
        if c.is_ascii_digit() {
            number.push(c);
        } else if c == 'D' {
            let days: u64 = number.parse().map_err(|_| malformed())?;
            minutes += days * 24 * 60;
            number.clear();
        } else {
            return Err(malformed());
        }
    }
    if !number.is_empty() {
        return Err(malformed());
    }
    for c in time_part.chars() {
        if c.is_ascii_digit() {
            number.push(c);
        } else {
            let value: u64 = number.parse().map_err(|_| malformed())?;
            number.clear();
            match c {
                'H' => minutes += value * 60,
                'M' => minutes += value,
                'S' => {}
                _ => return Err(malformed()),
            }
        }
    }
    if !number.is_empty() {
        return Err(malformed());
    }
    Ok(minutes as u32)
}
