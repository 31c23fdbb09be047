// Amadeus GDS connector: REST with OAuth2 client-credentials. JSON responses
// are parsed field-by-field into the normalized model; datetimes and
// durations come as ISO 8601.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::auth::TokenCache;
use crate::config::RestSupplierConfig;
use crate::connector::{BookingResult, SupplierConnector};
use crate::connectors::{booking_rejection, parse_datetime_utc, parse_iso8601_duration_minutes};
use crate::error::ConnectorError;
use crate::model::{
    Airline, Airport, BookingStatus, CabinClass, FareRules, FlightBookingRequest, FlightItinerary,
    FlightOffer, FlightSearchRequest, FlightSegment, Pnr, SupplierType,
};

pub struct AmadeusConnector {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenCache,
}

impl AmadeusConnector {
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
impl SupplierConnector for AmadeusConnector {
    fn supplier(&self) -> SupplierType {
        SupplierType::AmadeusGds
    }

    async fn search_flights(
        &self,
        request: &FlightSearchRequest,
    ) -> Result<Vec<FlightOffer>, ConnectorError> {
        let token = self.tokens.bearer_token().await?;

        let mut query: Vec<(&str, String)> = vec![
            ("originLocationCode", request.origin.clone()),
            ("destinationLocationCode", request.destination.clone()),
            ("departureDate", request.departure_date.to_string()),
            ("adults", request.adults.to_string()),
            ("children", request.children.to_string()),
            ("infants", request.infants.to_string()),
            ("travelClass", travel_class(request.cabin_class).to_string()),
            ("currencyCode", request.currency.clone()),
            ("nonStop", request.direct_only.to_string()),
            ("max", "50".to_string()),
        ];
        if let Some(return_date) = request.return_date {
            query.push(("returnDate", return_date.to_string()));
        }
        if !request.preferred_airlines.is_empty() {
            query.push(("includedAirlineCodes", request.preferred_airlines.join(",")));
        }
        if !request.excluded_airlines.is_empty() {
            query.push(("excludedAirlineCodes", request.excluded_airlines.join(",")));
        }

        debug!(origin = %request.origin, destination = %request.destination, "amadeus search");
        let response = self
            .http
            .get(format!("{}/v2/shopping/flight-offers", self.base_url))
            .bearer_auth(&token)
            .query(&query)
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

        let travelers: Vec<serde_json::Value> = request
            .passengers
            .iter()
            .enumerate()
            .map(|(idx, p)| {
                json!({
                    "id": (idx + 1).to_string(),
                    "dateOfBirth": p.date_of_birth.to_string(),
                    "name": { "firstName": p.first_name, "lastName": p.last_name },
                    "contact": {
                        "emailAddress": request.contact_email,
                        "phones": [{ "deviceType": "MOBILE", "number": request.contact_phone }]
                    }
                })
            })
            .collect();
        let body = json!({
            "data": {
                "type": "flight-order",
                "flightOffers": [{ "id": offer.offer_id }],
                "travelers": travelers,
                "remarks": request.special_requests,
            }
        });

        let response = self
            .http
            .post(format!("{}/v1/booking/flight-orders", self.base_url))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if status.is_client_error() {
            let message = response.text().await.unwrap_or_default();
            return booking_rejection("Amadeus", status, message);
        }
        if !status.is_success() {
            return Err(Self::api_error(response).await);
        }

        let body = response.text().await?;
        let order: OrderResponse = serde_json::from_str(&body)?;
        let pnr = pnr_from_order(order, offer.supplier)?;
        Ok(BookingResult::booked(pnr, "Booking confirmed by Amadeus"))
    }

    async fn cancel_booking(&self, pnr_number: &str) -> Result<bool, ConnectorError> {
        let token = self.tokens.bearer_token().await?;
        let response = self
            .http
            .delete(format!(
                "{}/v1/booking/flight-orders/{pnr_number}",
                self.base_url
            ))
            .bearer_auth(&token)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Err(Self::api_error(response).await)
    }

    async fn get_booking_details(&self, pnr_number: &str) -> Result<Option<Pnr>, ConnectorError> {
        let token = self.tokens.bearer_token().await?;
        let response = self
            .http
            .get(format!(
                "{}/v1/booking/flight-orders/{pnr_number}",
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
        let order: OrderResponse = serde_json::from_str(&body)?;
        Ok(Some(pnr_from_order(order, SupplierType::AmadeusGds)?))
    }
}

fn travel_class(cabin: CabinClass) -> &'static str {
    match cabin {
        CabinClass::Economy => "ECONOMY",
        CabinClass::PremiumEconomy => "PREMIUM_ECONOMY",
        CabinClass::Business => "BUSINESS",
        CabinClass::First => "FIRST",
    }
}

fn cabin_from_code(code: &str) -> CabinClass {
    match code {
        "PREMIUM_ECONOMY" => CabinClass::PremiumEconomy,
        "BUSINESS" => CabinClass::Business,
        "FIRST" => CabinClass::First,
        _ => CabinClass::Economy,
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<ApiOffer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiOffer {
    id: String,
    #[serde(default)]
    instant_ticketing_required: bool,
    #[serde(default)]
    number_of_bookable_seats: Option<u32>,
    #[serde(default)]
    last_ticketing_date: Option<String>,
    itineraries: Vec<ApiItinerary>,
    price: ApiPrice,
    #[serde(default)]
    traveler_pricings: Vec<ApiTravelerPricing>,
}

#[derive(Debug, Deserialize)]
struct ApiItinerary {
    segments: Vec<ApiSegment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSegment {
    id: String,
    departure: ApiEndpoint,
    arrival: ApiEndpoint,
    carrier_code: String,
    number: String,
    duration: String,
    #[serde(default)]
    aircraft: Option<ApiAircraft>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEndpoint {
    iata_code: String,
    #[serde(default)]
    terminal: Option<String>,
    at: String,
}

#[derive(Debug, Deserialize)]
struct ApiAircraft {
    code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPrice {
    currency: String,
    base: String,
    grand_total: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTravelerPricing {
    #[serde(default)]
    fare_details_by_segment: Vec<ApiFareDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiFareDetail {
    segment_id: String,
    cabin: String,
    #[serde(rename = "class")]
    booking_class: String,
    fare_basis: String,
    #[serde(default)]
    included_checked_bags: Option<ApiCheckedBags>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCheckedBags {
    #[serde(default)]
    quantity: Option<u32>,
    #[serde(default)]
    weight: Option<u32>,
    #[serde(default)]
    weight_unit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    data: OrderData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderData {
    id: String,
    #[serde(default)]
    associated_records: Vec<AssociatedRecord>,
    #[serde(default)]
    flight_offers: Vec<ApiOffer>,
}

#[derive(Debug, Deserialize)]
struct AssociatedRecord {
    reference: String,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

fn parse_amount(raw: &str) -> Result<f64, ConnectorError> {
    raw.parse::<f64>()
        .map_err(|_| ConnectorError::MalformedResponse(format!("unparseable amount '{raw}'")))
}

fn baggage_text(bags: &ApiCheckedBags) -> Option<String> {
    if let Some(quantity) = bags.quantity {
        return Some(format!("{quantity}PC"));
    }
    if let Some(weight) = bags.weight {
        let unit = bags.weight_unit.as_deref().unwrap_or("KG");
        return Some(format!("{weight}{unit}"));
    }
    None
}

fn segment_from_api(
    api: &ApiSegment,
    fares: &HashMap<&str, &ApiFareDetail>,
) -> Result<FlightSegment, ConnectorError> {
    let fare = fares.get(api.id.as_str());
    Ok(FlightSegment {
        airline: Airline::from_code(&api.carrier_code),
        flight_number: api.number.clone(),
        departure_airport: Airport::from_code(&api.departure.iata_code),
        departure_time: parse_datetime_utc(&api.departure.at)?,
        departure_terminal: api.departure.terminal.clone(),
        arrival_airport: Airport::from_code(&api.arrival.iata_code),
        arrival_time: parse_datetime_utc(&api.arrival.at)?,
        arrival_terminal: api.arrival.terminal.clone(),
        duration_minutes: parse_iso8601_duration_minutes(&api.duration)?,
        aircraft_type: api.aircraft.as_ref().map(|a| a.code.clone()),
        cabin_class: fare.map_or(CabinClass::Economy, |f| cabin_from_code(&f.cabin)),
        booking_class: fare.map_or_else(String::new, |f| f.booking_class.clone()),
        fare_basis: fare.map_or_else(String::new, |f| f.fare_basis.clone()),
        baggage_allowance: fare
            .and_then(|f| f.included_checked_bags.as_ref())
            .and_then(baggage_text),
        seats_available: None,
    })
}

fn offer_from_api(api: &ApiOffer) -> Result<FlightOffer, ConnectorError> {
    if api.itineraries.is_empty() {
        return Err(ConnectorError::MalformedResponse(
            "offer without itineraries".to_string(),
        ));
    }

    // Fare details apply per segment; the first traveler pricing carries the
    // representative cabin/class/baggage data.
    let fares: HashMap<&str, &ApiFareDetail> = api
        .traveler_pricings
        .first()
        .map(|tp| {
            tp.fare_details_by_segment
                .iter()
                .map(|f| (f.segment_id.as_str(), f))
                .collect()
        })
        .unwrap_or_default();

    let mut itineraries = Vec::with_capacity(api.itineraries.len());
    for api_itinerary in &api.itineraries {
        let segments = api_itinerary
            .segments
            .iter()
            .map(|s| segment_from_api(s, &fares))
            .collect::<Result<Vec<_>, _>>()?;
        let itinerary = FlightItinerary::from_segments(segments)
            .map_err(|e| ConnectorError::MalformedResponse(e.to_string()))?;
        itineraries.push(itinerary);
    }
    let mut itineraries = itineraries.into_iter();
    let outbound = itineraries.next().expect("checked non-empty");
    let inbound = itineraries.next();

    let base_fare = parse_amount(&api.price.base)?;
    let total = parse_amount(&api.price.grand_total)?;

    let baggage = outbound
        .segments
        .first()
        .and_then(|s| s.baggage_allowance.clone());
    let valid_until = api
        .last_ticketing_date
        .as_deref()
        .and_then(|d| d.parse::<NaiveDate>().ok())
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));

    Ok(FlightOffer {
        offer_id: api.id.clone(),
        supplier: SupplierType::AmadeusGds,
        outbound,
        inbound,
        price: crate::model::Price {
            base_fare,
            taxes: total - base_fare,
            total,
            currency: api.price.currency.clone(),
            per_passenger: false,
        },
        fare_rules: FareRules {
            baggage_allowance: baggage,
            ..FareRules::default()
        },
        valid_until,
        instant_ticketing_required: api.instant_ticketing_required,
        seats_available: api.number_of_bookable_seats,
    })
}

fn parse_search_response(body: &str) -> Result<Vec<FlightOffer>, ConnectorError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    response.data.iter().map(offer_from_api).collect()
}

fn pnr_from_order(order: OrderResponse, supplier: SupplierType) -> Result<Pnr, ConnectorError> {
    let pnr_number = order
        .data
        .associated_records
        .first()
        .map(|r| r.reference.clone())
        .unwrap_or_else(|| order.data.id.clone());
    let offer = order
        .data
        .flight_offers
        .first()
        .ok_or_else(|| ConnectorError::MalformedResponse("order without flight offer".to_string()))
        .and_then(offer_from_api)?;
    Ok(Pnr {
        pnr_number,
        supplier,
        status: BookingStatus::Confirmed,
        itinerary: offer.outbound,
        passengers: vec![],
        price: offer.price,
        fare_rules: offer.fare_rules,
        ticket_numbers: None,
        time_limit: offer.valid_until,
    })
}
