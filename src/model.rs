// Normalized travel model shared by every supplier connector.
// All records are immutable values produced by parsing a supplier response;
// only a PNR's status changes after construction.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum layover, in minutes, for an itinerary to count as overnight.
pub const OVERNIGHT_LAYOVER_MINUTES: i64 = 6 * 60;

// Error type for caller-supplied input. Rejected synchronously, before any
// supplier is contacted.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("invalid airport code '{0}': expected 3 uppercase letters")]
    InvalidAirportCode(String),

    #[error("origin and destination must differ")]
    SameOriginDestination,

    #[error("invalid currency code '{0}': expected 3 uppercase letters")]
    InvalidCurrency(String),

    #[error("at least one adult passenger is required")]
    NoAdults,

    #[error("infants ({infants}) may not outnumber adults ({adults})")]
    TooManyInfants { infants: u32, adults: u32 },

    #[error("return date {return_date} is before departure date {departure_date}")]
    ReturnBeforeDeparture {
        departure_date: NaiveDate,
        return_date: NaiveDate,
    },

    #[error("itinerary must contain at least one segment")]
    EmptyItinerary,

    #[error("segments are not in chronological order at position {0}")]
    SegmentsOutOfOrder(usize),

    #[error("segment arrival is not after departure for flight {0}")]
    NonPositiveSegmentDuration(String),
}

/// Closed set of supplier identities. The only legal values for
/// `FlightOffer::supplier` and `Pnr::supplier`, and the sole key used to
/// route booking, cancellation and retrieval back to the owning backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplierType {
    AmadeusGds,
    SabreGds,
    TravelportGds,
    LccRyanair,
    LccEasyjet,
    LccWizzair,
    LccVueling,
}

impl SupplierType {
    pub const ALL: [SupplierType; 7] = [
        SupplierType::AmadeusGds,
        SupplierType::SabreGds,
        SupplierType::TravelportGds,
        SupplierType::LccRyanair,
        SupplierType::LccEasyjet,
        SupplierType::LccWizzair,
        SupplierType::LccVueling,
    ];

    pub fn is_low_cost(&self) -> bool {
        matches!(
            self,
            SupplierType::LccRyanair
                | SupplierType::LccEasyjet
                | SupplierType::LccWizzair
                | SupplierType::LccVueling
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SupplierType::AmadeusGds => "AMADEUS_GDS",
            SupplierType::SabreGds => "SABRE_GDS",
            SupplierType::TravelportGds => "TRAVELPORT_GDS",
            SupplierType::LccRyanair => "LCC_RYANAIR",
            SupplierType::LccEasyjet => "LCC_EASYJET",
            SupplierType::LccWizzair => "LCC_WIZZAIR",
            SupplierType::LccVueling => "LCC_VUELING",
        }
    }
}

impl std::fmt::Display for SupplierType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SupplierType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SupplierType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown supplier '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CabinClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    /// Uppercase 3-letter IATA code.
    pub code: String,
    pub name: String,
    pub city: String,
    /// 2-letter country code.
    pub country: String,
    pub timezone: String,
}

impl Airport {
    /// Bare airport record carrying only the IATA code, for suppliers that
    /// return no airport metadata beyond the code itself.
    pub fn from_code(code: &str) -> Self {
        Self {
            code: code.to_uppercase(),
            name: String::new(),
            city: String::new(),
            country: String::new(),
            timezone: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airline {
    /// 2-letter IATA code.
    pub code: String,
    pub name: String,
    pub is_low_cost: bool,
}

impl Airline {
    pub fn from_code(code: &str) -> Self {
        Self {
            code: code.to_uppercase(),
            name: String::new(),
            is_low_cost: false,
        }
    }
}

/// One physical flight leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSegment {
    pub airline: Airline,
    pub flight_number: String,
    pub departure_airport: Airport,
    pub departure_time: DateTime<Utc>,
    pub departure_terminal: Option<String>,
    pub arrival_airport: Airport,
    pub arrival_time: DateTime<Utc>,
    pub arrival_terminal: Option<String>,
    pub duration_minutes: u32,
    pub aircraft_type: Option<String>,
    pub cabin_class: CabinClass,
    pub booking_class: String,
    pub fare_basis: String,
    pub baggage_allowance: Option<String>,
    pub seats_available: Option<u32>,
}

/// Ordered, non-empty sequence of segments plus derived fields. Built only
/// through [`FlightItinerary::from_segments`], which enforces chronological
/// ordering and computes the derived values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightItinerary {
    pub segments: Vec<FlightSegment>,
    pub total_duration_minutes: u32,
    pub stops: u32,
    pub overnight: bool,
}

impl FlightItinerary {
    pub fn from_segments(segments: Vec<FlightSegment>) -> Result<Self, ValidationError> {
        if segments.is_empty() {
            return Err(ValidationError::EmptyItinerary);
        }
        for segment in &segments {
            if segment.arrival_time <= segment.departure_time {
                return Err(ValidationError::NonPositiveSegmentDuration(format!(
                    "{}{}",
                    segment.airline.code, segment.flight_number
                )));
            }
        }
        let mut overnight = false;
        for (idx, pair) in segments.windows(2).enumerate() {
            let layover = pair[1].departure_time - pair[0].arrival_time;
            if layover < chrono::Duration::zero() {
                return Err(ValidationError::SegmentsOutOfOrder(idx + 1));
            }
            if layover.num_minutes() >= OVERNIGHT_LAYOVER_MINUTES {
                overnight = true;
            }
        }
        let first = segments.first().expect("non-empty");
        let last = segments.last().expect("non-empty");
        let total = (last.arrival_time - first.departure_time).num_minutes().max(0) as u32;
        let stops = (segments.len() - 1) as u32;
        Ok(Self {
            segments,
            total_duration_minutes: total,
            stops,
            overnight,
        })
    }

    pub fn origin(&self) -> &Airport {
        &self.segments.first().expect("non-empty").departure_airport
    }

    pub fn destination(&self) -> &Airport {
        &self.segments.last().expect("non-empty").arrival_airport
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub base_fare: f64,
    pub taxes: f64,
    pub total: f64,
    /// 3-letter currency code.
    pub currency: String,
    pub per_passenger: bool,
}

impl Price {
    pub fn new(base_fare: f64, taxes: f64, currency: &str, per_passenger: bool) -> Self {
        Self {
            base_fare,
            taxes,
            total: base_fare + taxes,
            currency: currency.to_uppercase(),
            per_passenger,
        }
    }

    /// Smallest representable amount in this price's currency.
    pub fn minor_unit(&self) -> f64 {
        // Zero-decimal currencies per ISO 4217.
        match self.currency.as_str() {
            "JPY" | "KRW" | "VND" | "CLP" | "ISK" => 1.0,
            _ => 0.01,
        }
    }

    /// Whether `total == base_fare + taxes` holds within one minor unit.
    pub fn is_consistent(&self) -> bool {
        (self.base_fare + self.taxes - self.total).abs() <= self.minor_unit()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FareRules {
    pub refundable: bool,
    pub changeable: bool,
    pub refund_penalty: Option<f64>,
    pub change_penalty: Option<f64>,
    pub penalty_currency: Option<String>,
    pub baggage_allowance: Option<String>,
    pub seat_selection_included: bool,
    pub meal_included: bool,
    pub rules_text: Option<String>,
}

/// A priced, time-bounded proposal to book a specific itinerary from a
/// specific supplier. `supplier` is owned by whichever connector produced the
/// offer and is the only key used for follow-up dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightOffer {
    pub offer_id: String,
    pub supplier: SupplierType,
    pub outbound: FlightItinerary,
    pub inbound: Option<FlightItinerary>,
    pub price: Price,
    pub fare_rules: FareRules,
    pub valid_until: Option<DateTime<Utc>>,
    pub instant_ticketing_required: bool,
    pub seats_available: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassengerType {
    Adult,
    Child,
    Infant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelDocument {
    pub document_type: String,
    pub number: String,
    pub issuing_country: String,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passenger {
    pub passenger_type: PassengerType,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub nationality: String,
    pub document: Option<TravelDocument>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Booking lifecycle. A PNR is created `Pending`, moves forward to
/// `Confirmed`/`Ticketed` on supplier acknowledgment and to `Cancelled` on a
/// successful cancellation; it never transitions backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Ticketed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pnr {
    pub pnr_number: String,
    pub supplier: SupplierType,
    pub status: BookingStatus,
    pub itinerary: FlightItinerary,
    pub passengers: Vec<Passenger>,
    pub price: Price,
    pub fare_rules: FareRules,
    pub ticket_numbers: Option<Vec<String>>,
    pub time_limit: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Engine request/response contracts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSearchRequest {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
    pub cabin_class: CabinClass,
    pub direct_only: bool,
    pub max_stops: Option<u32>,
    pub preferred_airlines: Vec<String>,
    pub excluded_airlines: Vec<String>,
    pub currency: String,
    /// Restrict the search to these suppliers. `None` queries every
    /// configured supplier.
    pub supplier_subset: Option<Vec<SupplierType>>,
}

fn is_upper_alpha(s: &str, len: usize) -> bool {
    s.len() == len && s.chars().all(|c| c.is_ascii_uppercase())
}

impl FlightSearchRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_upper_alpha(&self.origin, 3) {
            return Err(ValidationError::InvalidAirportCode(self.origin.clone()));
        }
        if !is_upper_alpha(&self.destination, 3) {
            return Err(ValidationError::InvalidAirportCode(self.destination.clone()));
        }
        if self.origin == self.destination {
            return Err(ValidationError::SameOriginDestination);
        }
        if !is_upper_alpha(&self.currency, 3) {
            return Err(ValidationError::InvalidCurrency(self.currency.clone()));
        }
        if self.adults == 0 {
            return Err(ValidationError::NoAdults);
        }
        if self.infants > self.adults {
            return Err(ValidationError::TooManyInfants {
                infants: self.infants,
                adults: self.adults,
            });
        }
        if let Some(return_date) = self.return_date {
            if return_date < self.departure_date {
                return Err(ValidationError::ReturnBeforeDeparture {
                    departure_date: self.departure_date,
                    return_date,
                });
            }
        }
        Ok(())
    }

    pub fn passenger_count(&self) -> u32 {
        self.adults + self.children + self.infants
    }

    pub fn is_round_trip(&self) -> bool {
        self.return_date.is_some()
    }

    /// Whether an offer satisfies this request's itinerary filters
    /// (`direct_only`, `max_stops`, preferred/excluded airlines). Applied to
    /// normalized offers so the filters hold even when a vendor ignores the
    /// corresponding search parameters.
    pub fn accepts(&self, offer: &FlightOffer) -> bool {
        let itineraries = std::iter::once(&offer.outbound).chain(offer.inbound.as_ref());
        for itinerary in itineraries {
            if self.direct_only && itinerary.stops > 0 {
                return false;
            }
            if self.max_stops.is_some_and(|max| itinerary.stops > max) {
                return false;
            }
            for segment in &itinerary.segments {
                if self.excluded_airlines.contains(&segment.airline.code) {
                    return false;
                }
                if !self.preferred_airlines.is_empty()
                    && !self.preferred_airlines.contains(&segment.airline.code)
                {
                    return false;
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FlightSearchResponse {
    pub search_id: String,
    /// Aggregated offers sorted ascending by `price.total`.
    pub offers: Vec<FlightOffer>,
    pub total_results: usize,
    pub search_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightBookingRequest {
    pub offer_id: String,
    pub passengers: Vec<Passenger>,
    pub contact_email: String,
    pub contact_phone: String,
    pub payment_method: String,
    pub special_requests: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    fn segment(dep: (u32, u32), arr: (u32, u32)) -> FlightSegment {
        FlightSegment {
            airline: Airline::from_code("BA"),
            flight_number: "112".to_string(),
            departure_airport: Airport::from_code("JFK"),
            departure_time: Utc.with_ymd_and_hms(2026, 3, 1, dep.0, dep.1, 0).unwrap(),
            departure_terminal: None,
            arrival_airport: Airport::from_code("LHR"),
            arrival_time: Utc.with_ymd_and_hms(2026, 3, 1, arr.0, arr.1, 0).unwrap(),
            arrival_terminal: None,
            duration_minutes: 0,
            aircraft_type: None,
            cabin_class: CabinClass::Economy,
            booking_class: "Y".to_string(),
            fare_basis: "YIF".to_string(),
            baggage_allowance: None,
            seats_available: Some(4),
        }
    }

    fn request() -> FlightSearchRequest {
        FlightSearchRequest {
            origin: "JFK".to_string(),
            destination: "LHR".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            return_date: None,
            adults: 1,
            children: 0,
            infants: 0,
            cabin_class: CabinClass::Economy,
            direct_only: false,
            max_stops: None,
            preferred_airlines: vec![],
            excluded_airlines: vec![],
            currency: "USD".to_string(),
            supplier_subset: None,
        }
    }

    #[test]
    fn itinerary_derives_duration_and_stops() {
        let itinerary =
            FlightItinerary::from_segments(vec![segment((8, 0), (10, 30)), segment((12, 0), (14, 0))])
                .unwrap();
        assert_eq!(itinerary.stops, 1);
        assert_eq!(itinerary.total_duration_minutes, 360);
        assert!(!itinerary.overnight);
    }

    #[test]
    fn itinerary_flags_overnight_layover() {
        let itinerary =
            FlightItinerary::from_segments(vec![segment((8, 0), (10, 0)), segment((17, 0), (19, 0))])
                .unwrap();
        assert!(itinerary.overnight);
    }

    #[test]
    fn itinerary_rejects_out_of_order_segments() {
        let result =
            FlightItinerary::from_segments(vec![segment((12, 0), (14, 0)), segment((8, 0), (10, 0))]);
        assert_eq!(result, Err(ValidationError::SegmentsOutOfOrder(1)));
    }

    #[test]
    fn itinerary_rejects_empty_segments() {
        assert_eq!(
            FlightItinerary::from_segments(vec![]),
            Err(ValidationError::EmptyItinerary)
        );
    }

    #[test]
    fn itinerary_rejects_arrival_before_departure() {
        let result = FlightItinerary::from_segments(vec![segment((14, 0), (12, 0))]);
        assert!(matches!(
            result,
            Err(ValidationError::NonPositiveSegmentDuration(_))
        ));
    }

    #[test]
    fn price_total_is_base_plus_taxes() {
        let price = Price::new(850.0, 175.40, "usd", false);
        assert!((price.total - 1025.40).abs() < f64::EPSILON);
        assert_eq!(price.currency, "USD");
        assert!(price.is_consistent());
    }

    #[test]
    fn price_consistency_respects_zero_decimal_currencies() {
        let price = Price {
            base_fare: 85000.0,
            taxes: 17540.0,
            total: 102540.8,
            currency: "JPY".to_string(),
            per_passenger: false,
        };
        assert!(price.is_consistent());
        let off = Price {
            total: 102542.0,
            ..price
        };
        assert!(!off.is_consistent());
    }

    #[test]
    fn valid_request_passes() {
        assert_eq!(request().validate(), Ok(()));
    }

    #[test_case("jfk", "LHR" ; "lowercase origin")]
    #[test_case("JFKX", "LHR" ; "too long origin")]
    #[test_case("JFK", "L1R" ; "digit in destination")]
    fn request_rejects_bad_airport_codes(origin: &str, destination: &str) {
        let mut req = request();
        req.origin = origin.to_string();
        req.destination = destination.to_string();
        assert!(matches!(
            req.validate(),
            Err(ValidationError::InvalidAirportCode(_))
        ));
    }

    #[test]
    fn request_rejects_same_origin_destination() {
        let mut req = request();
        req.destination = "JFK".to_string();
        assert_eq!(req.validate(), Err(ValidationError::SameOriginDestination));
    }

    #[test]
    fn request_rejects_zero_adults() {
        let mut req = request();
        req.adults = 0;
        assert_eq!(req.validate(), Err(ValidationError::NoAdults));
    }

    #[test]
    fn request_rejects_more_infants_than_adults() {
        let mut req = request();
        req.infants = 2;
        assert_eq!(
            req.validate(),
            Err(ValidationError::TooManyInfants {
                infants: 2,
                adults: 1
            })
        );
    }

    #[test]
    fn request_rejects_return_before_departure() {
        let mut req = request();
        req.return_date = Some(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        assert!(matches!(
            req.validate(),
            Err(ValidationError::ReturnBeforeDeparture { .. })
        ));
    }

    fn offer_from(segments: Vec<FlightSegment>) -> FlightOffer {
        FlightOffer {
            offer_id: "offer-1".to_string(),
            supplier: SupplierType::AmadeusGds,
            outbound: FlightItinerary::from_segments(segments).unwrap(),
            inbound: None,
            price: Price::new(100.0, 20.0, "USD", false),
            fare_rules: FareRules::default(),
            valid_until: None,
            instant_ticketing_required: false,
            seats_available: Some(4),
        }
    }

    #[test]
    fn unfiltered_request_accepts_any_offer() {
        let offer = offer_from(vec![segment((8, 0), (10, 0)), segment((12, 0), (14, 0))]);
        assert!(request().accepts(&offer));
    }

    #[test]
    fn excluded_airline_rejects_the_offer() {
        let offer = offer_from(vec![segment((8, 0), (10, 0))]);
        let mut req = request();
        req.excluded_airlines = vec!["BA".to_string()];
        assert!(!req.accepts(&offer));
        req.excluded_airlines = vec!["AA".to_string()];
        assert!(req.accepts(&offer));
    }

    #[test]
    fn preferred_airlines_restrict_every_segment() {
        let offer = offer_from(vec![segment((8, 0), (10, 0))]);
        let mut req = request();
        req.preferred_airlines = vec!["BA".to_string()];
        assert!(req.accepts(&offer));
        req.preferred_airlines = vec!["AA".to_string()];
        assert!(!req.accepts(&offer));
    }

    #[test]
    fn max_stops_caps_connections() {
        let connecting = offer_from(vec![segment((8, 0), (10, 0)), segment((12, 0), (14, 0))]);
        let mut req = request();
        req.max_stops = Some(0);
        assert!(!req.accepts(&connecting));
        req.max_stops = Some(1);
        assert!(req.accepts(&connecting));
    }

    #[test]
    fn direct_only_rejects_connecting_itineraries() {
        let connecting = offer_from(vec![segment((8, 0), (10, 0)), segment((12, 0), (14, 0))]);
        let direct = offer_from(vec![segment((8, 0), (10, 0))]);
        let mut req = request();
        req.direct_only = true;
        assert!(!req.accepts(&connecting));
        assert!(req.accepts(&direct));
    }

    #[test]
    fn supplier_type_round_trips_through_str() {
        for supplier in SupplierType::ALL {
            let parsed: SupplierType = supplier.as_str().parse().unwrap();
            assert_eq!(parsed, supplier);
        }
        assert!("UNKNOWN_GDS".parse::<SupplierType>().is_err());
    }

    #[test]
    fn low_cost_flag_matches_variant_family() {
        assert!(SupplierType::LccRyanair.is_low_cost());
        assert!(!SupplierType::AmadeusGds.is_low_cost());
    }
}
