// Sabre GDS connector: REST with OAuth2, same token lifecycle as Amadeus but
// a very different wire schema. Search responses reference flat schedule
// descriptions by index and give elapsed time in minutes directly.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::auth::TokenCache;
use crate::config::RestSupplierConfig;
use crate::connector::{BookingResult, SupplierConnector};
use crate::connectors::{booking_rejection, parse_datetime_utc};
use crate::error::ConnectorError;
use crate::model::{
    Airline, Airport, BookingStatus, CabinClass, FareRules, FlightBookingRequest, FlightItinerary,
    FlightOffer, FlightSearchRequest, FlightSegment, Pnr, Price, SupplierType,
};

pub struct SabreConnector {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenCache,
}

impl SabreConnector {
    pub fn new(config: &RestSupplierConfig) -> Self {
        let http = reqwest::Client::new();
        let tokens = TokenCache::new(http.clone(), config.oauth.clone());
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    async fn api_error(response: reqwest::Response) -> ConnectorError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        ConnectorError::Api { status, message }
    }
}

#[async_trait]
impl SupplierConnector for SabreConnector {
    fn supplier(&self) -> SupplierType {
        SupplierType::SabreGds
    }

    async fn search_flights(
        &self,
        request: &FlightSearchRequest,
    ) -> Result<Vec<FlightOffer>, ConnectorError> {
        let token = self.tokens.bearer_token().await?;

        let mut origin_destinations = vec![json!({
            "departureDateTime": format!("{}T00:00:00", request.departure_date),
            "originLocation": { "locationCode": request.origin },
            "destinationLocation": { "locationCode": request.destination },
        })];
        if let Some(return_date) = request.return_date {
            origin_destinations.push(json!({
                "departureDateTime": format!("{return_date}T00:00:00"),
                "originLocation": { "locationCode": request.destination },
                "destinationLocation": { "locationCode": request.origin },
            }));
        }
        let body = json!({
            "OTA_AirLowFareSearchRQ": {
                "OriginDestinationInformation": origin_destinations,
                "TravelPreferences": travel_preferences(request),
                "TravelerInfoSummary": {
                    "AirTravelerAvail": [{ "PassengerTypeQuantity": [
                        { "Code": "ADT", "Quantity": request.adults },
                        { "Code": "CNN", "Quantity": request.children },
                        { "Code": "INF", "Quantity": request.infants }
                    ]}]
                },
                "TPA_Extensions": {
                    "CabinPref": { "Cabin": cabin_code(request.cabin_class) },
                    "CurrencyCode": request.currency
                }
            }
        });

        debug!(origin = %request.origin, destination = %request.destination, "sabre search");
        let response = self
            .http
            .post(format!("{}/v4/offers/shop", self.base_url))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        let body = response.text().await?;
        parse_search_response(&body)
    }

    async fn create_booking(
        &self,
        request: &FlightBookingRequest,
        offer: &FlightOffer,
    ) -> Result<BookingResult, ConnectorError> {
        let token = self.tokens.bearer_token().await?;
        let body = json!({
            "CreatePassengerNameRecordRQ": {
                "targetCity": "AGGR",
                "haltOnAirPriceError": true,
                "OfferRef": offer.offer_id,
                "TravelItineraryAddInfo": {
                    "AgencyInfo": { "Ticketing": { "TicketType": "7TAW" } },
                    "CustomerInfo": {
                        "ContactNumbers": [{ "Phone": request.contact_phone }],
                        "Email": [{ "Address": request.contact_email }],
                        "PersonName": request.passengers.iter().map(|p| json!({
                            "GivenName": p.first_name,
                            "Surname": p.last_name,
                            "PassengerType": passenger_code(p),
                        })).collect::<Vec<_>>()
                    }
                }
            }
        });

        let response = self
            .http
            .post(format!("{}/v2.4.0/passenger/records", self.base_url))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if status.is_client_error() {
            let message = response.text().await.unwrap_or_default();
            return booking_rejection("Sabre", status, message);
        }
        if !status.is_success() {
            return Err(Self::api_error(response).await);
        }

        let body = response.text().await?;
        let created: CreatePnrResponse = serde_json::from_str(&body)?;
        let outcome = created.create_passenger_name_record_rs;
        if !outcome.application_results.is_complete() {
            return Ok(BookingResult::declined(format!(
                "Sabre could not complete the booking: {}",
                outcome.application_results.status
            )));
        }
        let pnr = Pnr {
            pnr_number: outcome.itinerary_ref.id,
            supplier: SupplierType::SabreGds,
            status: BookingStatus::Confirmed,
            itinerary: offer.outbound.clone(),
            passengers: request.passengers.clone(),
            price: offer.price.clone(),
            fare_rules: offer.fare_rules.clone(),
            ticket_numbers: None,
            time_limit: offer.valid_until,
        };
        Ok(BookingResult::booked(pnr, "Booking confirmed by Sabre"))
    }

    async fn cancel_booking(&self, pnr_number: &str) -> Result<bool, ConnectorError> {
        let token = self.tokens.bearer_token().await?;
        let response = self
            .http
            .post(format!(
                "{}/v1/passenger/records/{pnr_number}/cancel",
                self.base_url
            ))
            .bearer_auth(&token)
            .send()
            .await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(Self::api_error(response).await);
        }
        let body = response.text().await?;
        let outcome: CancelResponse = serde_json::from_str(&body)?;
        Ok(outcome.status.eq_ignore_ascii_case("Complete"))
    }

    async fn get_booking_details(&self, pnr_number: &str) -> Result<Option<Pnr>, ConnectorError> {
        let token = self.tokens.bearer_token().await?;
        let response = self
            .http
            .get(format!(
                "{}/v1/passenger/records/{pnr_number}",
                self.base_url
            ))
            .bearer_auth(&token)
            .send()
            .await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::api_error(response).await);
        }
        let body = response.text().await?;
        parse_reservation(&body).map(Some)
    }
}

fn cabin_code(cabin: CabinClass) -> &'static str {
    match cabin {
        CabinClass::Economy => "Y",
        CabinClass::PremiumEconomy => "S",
        CabinClass::Business => "C",
        CabinClass::First => "F",
    }
}

fn cabin_from_code(code: &str) -> CabinClass {
    match code {
        "S" | "W" => CabinClass::PremiumEconomy,
        "C" | "J" => CabinClass::Business,
        "F" | "P" => CabinClass::First,
        _ => CabinClass::Economy,
    }
}

fn passenger_code(p: &crate::model::Passenger) -> &'static str {
    match p.passenger_type {
        crate::model::PassengerType::Adult => "ADT",
        crate::model::PassengerType::Child => "CNN",
        crate::model::PassengerType::Infant => "INF",
    }
}

/// Itinerary preferences in OTA_AirLowFareSearchRQ form: stop count plus
/// preferred/unacceptable carriers.
fn travel_preferences(request: &FlightSearchRequest) -> serde_json::Value {
    let mut prefs = serde_json::Map::new();
    let max_stops = if request.direct_only {
        Some(0)
    } else {
        request.max_stops
    };
    if let Some(max) = max_stops {
        prefs.insert("MaxStopsQuantity".to_string(), json!(max));
    }
    let mut vendors: Vec<serde_json::Value> = request
        .preferred_airlines
        .iter()
        .map(|code| json!({ "Code": code, "PreferLevel": "Preferred" }))
        .collect();
    vendors.extend(
        request
            .excluded_airlines
            .iter()
            .map(|code| json!({ "Code": code, "PreferLevel": "Unacceptable" })),
    );
    if !vendors.is_empty() {
        prefs.insert("VendorPref".to_string(), json!(vendors));
    }
    serde_json::Value::Object(prefs)
}

// ---------------------------------------------------------------------------
// Wire format: Bargain Finder Max-shaped search response
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    grouped_itinerary_response: GroupedItineraryResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupedItineraryResponse {
    #[serde(default)]
    schedule_descs: Vec<ScheduleDesc>,
    #[serde(default)]
    leg_descs: Vec<LegDesc>,
    #[serde(default)]
    itinerary_groups: Vec<ItineraryGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleDesc {
    id: u32,
    departure: SchedulePoint,
    arrival: SchedulePoint,
    carrier: ScheduleCarrier,
    elapsed_time: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchedulePoint {
    airport: String,
    #[serde(default)]
    terminal: Option<String>,
    date_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleCarrier {
    marketing: String,
    marketing_flight_number: u32,
    #[serde(default)]
    equipment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegDesc {
    id: u32,
    #[serde(default)]
    schedules: Vec<Ref>,
}

#[derive(Debug, Deserialize)]
struct Ref {
    #[serde(rename = "ref")]
    reference: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItineraryGroup {
    #[serde(default)]
    itineraries: Vec<ApiItinerary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiItinerary {
    id: u32,
    #[serde(default)]
    legs: Vec<Ref>,
    #[serde(default)]
    pricing_information: Vec<PricingInformation>,
}

#[derive(Debug, Deserialize)]
struct PricingInformation {
    fare: ApiFare,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiFare {
    total_fare: TotalFare,
    #[serde(default)]
    passenger_info_list: Vec<PassengerInfoEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TotalFare {
    total_price: f64,
    total_tax_amount: f64,
    currency: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PassengerInfoEntry {
    passenger_info: PassengerInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PassengerInfo {
    #[serde(default)]
    fare_components: Vec<FareComponent>,
    #[serde(default)]
    baggage_information: Vec<BaggageInformation>,
}

#[derive(Debug, Deserialize)]
struct FareComponent {
    #[serde(default)]
    segments: Vec<FareSegmentEntry>,
}

#[derive(Debug, Deserialize)]
struct FareSegmentEntry {
    segment: FareSegment,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FareSegment {
    #[serde(default)]
    cabin_code: Option<String>,
    #[serde(default)]
    booking_code: Option<String>,
    #[serde(default)]
    fare_basis_code: Option<String>,
    #[serde(default)]
    seats_available: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct BaggageInformation {
    #[serde(default)]
    allowance: Option<BaggageAllowance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BaggageAllowance {
    #[serde(default)]
    piece_count: Option<u32>,
    #[serde(default)]
    weight: Option<u32>,
    #[serde(default)]
    unit: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreatePnrResponse {
    #[serde(rename = "CreatePassengerNameRecordRS")]
    create_passenger_name_record_rs: CreatePnrBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreatePnrBody {
    application_results: ApplicationResults,
    itinerary_ref: ItineraryRef,
}

#[derive(Debug, Deserialize)]
struct ApplicationResults {
    status: String,
}

impl ApplicationResults {
    fn is_complete(&self) -> bool {
        self.status.eq_ignore_ascii_case("Complete")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItineraryRef {
    #[serde(rename = "ID")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct CancelResponse {
    status: String,
}

// Simplified reservation retrieval shape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReservationResponse {
    reservation: Reservation,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reservation {
    pnr_locator: String,
    status: String,
    #[serde(default)]
    flights: Vec<ReservationFlight>,
    fare: ReservationFare,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReservationFlight {
    airline_code: String,
    flight_number: String,
    from_airport: String,
    to_airport: String,
    departure_date_time: String,
    arrival_date_time: String,
    #[serde(default)]
    cabin_type_code: Option<String>,
    #[serde(default)]
    booking_class: Option<String>,
    #[serde(default)]
    elapsed_minutes: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReservationFare {
    base_fare: f64,
    taxes: f64,
    currency: String,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

fn segment_from_schedule(
    schedule: &ScheduleDesc,
    fare_segment: Option<&FareSegment>,
    baggage: Option<&BaggageAllowance>,
) -> Result<FlightSegment, ConnectorError> {
    Ok(FlightSegment {
        airline: Airline::from_code(&schedule.carrier.marketing),
        flight_number: schedule.carrier.marketing_flight_number.to_string(),
        departure_airport: Airport::from_code(&schedule.departure.airport),
        departure_time: parse_datetime_utc(&schedule.departure.date_time)?,
        departure_terminal: schedule.departure.terminal.clone(),
        arrival_airport: Airport::from_code(&schedule.arrival.airport),
        arrival_time: parse_datetime_utc(&schedule.arrival.date_time)?,
        arrival_terminal: schedule.arrival.terminal.clone(),
        duration_minutes: schedule.elapsed_time,
        aircraft_type: schedule.carrier.equipment.clone(),
        cabin_class: fare_segment
            .and_then(|f| f.cabin_code.as_deref())
            .map_or(CabinClass::Economy, cabin_from_code),
        booking_class: fare_segment
            .and_then(|f| f.booking_code.clone())
            .unwrap_or_default(),
        fare_basis: fare_segment
            .and_then(|f| f.fare_basis_code.clone())
            .unwrap_or_default(),
        baggage_allowance: baggage.and_then(baggage_text),
        seats_available: fare_segment.and_then(|f| f.seats_available),
    })
}

fn baggage_text(allowance: &BaggageAllowance) -> Option<String> {
    if let Some(pieces) = allowance.piece_count {
        return Some(format!("{pieces}PC"));
    }
    if let Some(weight) = allowance.weight {
        let unit = allowance.unit.as_deref().unwrap_or("KG");
        return Some(format!("{weight}{unit}"));
    }
    None
}

fn parse_search_response(body: &str) -> Result<Vec<FlightOffer>, ConnectorError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    let grouped = response.grouped_itinerary_response;

    let schedules: HashMap<u32, &ScheduleDesc> =
        grouped.schedule_descs.iter().map(|s| (s.id, s)).collect();
    let legs: HashMap<u32, &LegDesc> = grouped.leg_descs.iter().map(|l| (l.id, l)).collect();

    let mut offers = Vec::new();
    for group in &grouped.itinerary_groups {
        for itinerary in &group.itineraries {
            let pricing = itinerary.pricing_information.first().ok_or_else(|| {
                ConnectorError::MalformedResponse("itinerary without pricing".to_string())
            })?;
            let passenger_info = pricing
                .fare
                .passenger_info_list
                .first()
                .map(|e| &e.passenger_info);
            let fare_segments: Vec<&FareSegment> = passenger_info
                .map(|info| {
                    info.fare_components
                        .iter()
                        .flat_map(|c| c.segments.iter().map(|s| &s.segment))
                        .collect()
                })
                .unwrap_or_default();
            let baggage = passenger_info
                .and_then(|info| info.baggage_information.first())
                .and_then(|b| b.allowance.as_ref());

            let mut legs_of_segments = Vec::new();
            let mut fare_idx = 0;
            for leg_ref in &itinerary.legs {
                let leg = legs.get(&leg_ref.reference).ok_or_else(|| {
                    ConnectorError::MalformedResponse(format!(
                        "dangling leg ref {}",
                        leg_ref.reference
                    ))
                })?;
                let mut segments = Vec::new();
                for schedule_ref in &leg.schedules {
                    let schedule = schedules.get(&schedule_ref.reference).ok_or_else(|| {
                        ConnectorError::MalformedResponse(format!(
                            "dangling schedule ref {}",
                            schedule_ref.reference
                        ))
                    })?;
                    segments.push(segment_from_schedule(
                        schedule,
                        fare_segments.get(fare_idx).copied(),
                        baggage,
                    )?);
                    fare_idx += 1;
                }
                legs_of_segments.push(
                    FlightItinerary::from_segments(segments)
                        .map_err(|e| ConnectorError::MalformedResponse(e.to_string()))?,
                );
            }
            if legs_of_segments.is_empty() {
                return Err(ConnectorError::MalformedResponse(
                    "itinerary without legs".to_string(),
                ));
            }
            let mut legs_iter = legs_of_segments.into_iter();
            let outbound = legs_iter.next().expect("checked non-empty");
            let inbound = legs_iter.next();

            let total_fare = &pricing.fare.total_fare;
            let base_fare = total_fare.total_price - total_fare.total_tax_amount;
            offers.push(FlightOffer {
                offer_id: format!("SAB-{}", itinerary.id),
                supplier: SupplierType::SabreGds,
                outbound,
                inbound,
                price: Price {
                    base_fare,
                    taxes: total_fare.total_tax_amount,
                    total: total_fare.total_price,
                    currency: total_fare.currency.clone(),
                    per_passenger: false,
                },
                fare_rules: FareRules {
                    baggage_allowance: baggage.and_then(baggage_text),
                    ..FareRules::default()
                },
                valid_until: None,
                instant_ticketing_required: false,
                seats_available: fare_segments.first().and_then(|f| f.seats_available),
            });
        }
    }
    Ok(offers)
}

fn parse_reservation(body: &str) -> Result<Pnr, ConnectorError> {
    let response: ReservationResponse = serde_json::from_str(body)?;
    let reservation = response.reservation;

    let segments = reservation
        .flights
        .iter()
        .map(|f| {
            let departure_time = parse_datetime_utc(&f.departure_date_time)?;
            let arrival_time = parse_datetime_utc(&f.arrival_date_time)?;
            Ok(FlightSegment {
                airline: Airline::from_code(&f.airline_code),
                flight_number: f.flight_number.clone(),
                departure_airport: Airport::from_code(&f.from_airport),
                departure_time,
                departure_terminal: None,
                arrival_airport: Airport::from_code(&f.to_airport),
                arrival_time,
                arrival_terminal: None,
                duration_minutes: f
                    .elapsed_minutes
                    .unwrap_or(((arrival_time - departure_time).num_minutes().max(0)) as u32),
                aircraft_type: None,
                cabin_class: f
                    .cabin_type_code
                    .as_deref()
                    .map_or(CabinClass::Economy, cabin_from_code),
                booking_class: f.booking_class.clone().unwrap_or_default(),
                fare_basis: String::new(),
                baggage_allowance: None,
                seats_available: None,
            })
        })
        .collect::<Result<Vec<_>, ConnectorError>>()?;
    let itinerary = FlightItinerary::from_segments(segments)
        .map_err(|e| ConnectorError::MalformedResponse(e.to_string()))?;

    let status = match reservation.status.to_ascii_uppercase().as_str() {
        "CANCELLED" | "XX" => BookingStatus::Cancelled,
        "TICKETED" | "TK" => BookingStatus::Ticketed,
        "PENDING" | "HL" => BookingStatus::Pending,
        _ => BookingStatus::Confirmed,
    };

    Ok(Pnr {
        pnr_number: reservation.pnr_locator,
        supplier: SupplierType::SabreGds,
        status,
        itinerary,
        passengers: vec![],
        price: Price::new(
            reservation.fare.base_fare,
            reservation.fare.taxes,
            &reservation.fare.currency,
            false,
        ),
        fare_rules: FareRules::default(),
        ticket_numbers: None,
        time_limit: None,
    })
}
