//! Shared vocabulary for every PMS connector: the capability descriptor,
//! domain types returned by connector operations, and the date/money
//! normalization helpers every vendor adapter runs its wire payloads
//! through before handing data back to callers.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// What a connector instance supports. Callers check this before invoking
/// an operation rather than discovering support by calling and failing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConnectorCapabilities {
    pub availability: bool,
    pub rates: bool,
    pub reservations: bool,
    pub guest_search: bool,
    pub modifications: bool,
    pub cancellations: bool,
    pub stream_arrivals: bool,
    pub stream_in_house: bool,
}

/// Internal reservation status, after vendor-string mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
    NoShow,
    /// The vendor reported a status this connector doesn't recognize. Never
    /// silently coerced to a happy-path status; callers see it explicitly.
    Unknown,
}

impl ReservationStatus {
    /// Map an Apaleo reservation status string. Unrecognized values become
    /// `Unknown` rather than a guessed mapping, and are logged by the
    /// caller so the taxonomy can be extended deliberately.
    pub fn from_apaleo(status: &str) -> Self {
        match status {
            "Confirmed" | "InHouse" => ReservationStatus::Confirmed,
            "CheckedIn" => ReservationStatus::CheckedIn,
            "CheckedOut" => ReservationStatus::CheckedOut,
            "Canceled" => ReservationStatus::Cancelled,
            "NoShow" => ReservationStatus::NoShow,
            _ => ReservationStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityGrid {
    pub hotel_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub room_types: Vec<RoomAvailability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomAvailability {
    pub room_type: String,
    /// Available room count per date, indexed by offset from `start`.
    pub available_by_date: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateQuote {
    pub hotel_id: String,
    pub room_type: String,
    pub rate_code: String,
    pub arrival: NaiveDate,
    pub departure: NaiveDate,
    pub total: Decimal,
    pub currency: String,
    pub nightly: Vec<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestProfile {
    pub guest_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub loyalty_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: String,
    pub hotel_id: String,
    pub status: ReservationStatus,
    pub guest: GuestProfile,
    pub room_type: String,
    pub rate_code: String,
    pub arrival: NaiveDate,
    pub departure: NaiveDate,
    pub guest_count: u32,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct NewReservation {
    pub hotel_id: String,
    pub guest: GuestProfile,
    pub room_type: String,
    pub rate_code: String,
    pub arrival: NaiveDate,
    pub departure: NaiveDate,
    pub guest_count: u32,
    pub amount: Decimal,
    pub currency: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReservationPatch {
    pub arrival: Option<NaiveDate>,
    pub departure: Option<NaiveDate>,
    pub room_type: Option<String>,
    pub rate_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorHealth {
    pub status: HealthStatus,
    pub vendor: String,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

/// Parse a date as either an ISO-8601 date or a datetime, truncating a
/// datetime to its date component for stay-boundary fields.
pub fn parse_stay_date(raw: &str) -> Result<NaiveDate, Error> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.date_naive());
    }
    Err(Error::ValidationError(format!("unparseable stay date: {raw}")))
}

/// Parse vendor money into fixed-point decimal. Thousands separators are
/// stripped; a bare integer is widened with two implicit fraction digits
/// (vendors sometimes send whole-unit amounts for round figures).
pub fn parse_money(raw: &str) -> Result<Decimal, Error> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    if !cleaned.contains('.') {
        let whole: i64 = cleaned
            .parse()
            .map_err(|_| Error::ValidationError(format!("unparseable money value: {raw}")))?;
        return Ok(Decimal::new(whole * 100, 2));
    }
    cleaned
        .parse::<Decimal>()
        .map_err(|_| Error::ValidationError(format!("unparseable money value: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_iso_date() {
        assert_eq!(parse_stay_date("2026-03-05").unwrap(), NaiveDate::from_ymd_opt(2026, 3, 5).unwrap());
    }

    #[test]
    fn truncates_datetime_to_date() {
        let date = parse_stay_date("2026-03-05T14:30:00Z").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 3, 5).unwrap());
    }

    #[test]
    fn rejects_garbage_date() {
        assert!(parse_stay_date("not-a-date").is_err());
    }

    #[test]
    fn strips_thousands_separator() {
        assert_eq!(parse_money("1,234.50").unwrap(), Decimal::new(123450, 2));
    }

    #[test]
    fn widens_bare_integer() {
        assert_eq!(parse_money("200").unwrap(), Decimal::new(20000, 2));
    }

    #[test]
    fn maps_canceled_to_cancelled() {
        assert_eq!(ReservationStatus::from_apaleo("Canceled"), ReservationStatus::Cancelled);
    }

    #[test]
    fn unknown_vendor_status_is_explicit() {
        assert_eq!(ReservationStatus::from_apaleo("SomeNewVendorState"), ReservationStatus::Unknown);
    }
}
