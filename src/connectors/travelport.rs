// Travelport GDS connector: SOAP/XML over HTTP Basic Auth. Requests are
// built as envelope templates per operation; responses are scanned with a
// quick-xml event reader matching on local element names, so namespace
// prefixes never break lookups.

use std::collections::HashMap;

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::debug;

use crate::config::SoapSupplierConfig;
use crate::connector::{BookingResult, SupplierConnector};
use crate::connectors::parse_datetime_utc;
use crate::error::ConnectorError;
use crate::model::{
    Airline, Airport, BookingStatus, CabinClass, FareRules, FlightBookingRequest, FlightItinerary,
    FlightOffer, FlightSearchRequest, FlightSegment, Pnr, Price, SupplierType,
};

pub struct TravelportConnector {
    http: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
    target_branch: String,
}

impl TravelportConnector {
    pub fn new(config: &SoapSupplierConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            target_branch: config.target_branch.clone(),
        }
    }

    async fn soap_call(&self, action: &str, envelope: String) -> Result<String, ConnectorError> {
        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", action)
            .body(envelope)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() && fault_message(&body).is_none() {
            return Err(ConnectorError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(body)
    }

    fn search_envelope(&self, request: &FlightSearchRequest) -> String {
        let mut legs = format!(
            r#"<air:SearchAirLeg>
        <air:SearchOrigin><com:Airport Code="{origin}"/></air:SearchOrigin>
        <air:SearchDestination><com:Airport Code="{destination}"/></air:SearchDestination>
        <air:SearchDepTime PreferredTime="{departure}"/>
      </air:SearchAirLeg>"#,
            origin = request.origin,
            destination = request.destination,
            departure = request.departure_date,
        );
        if let Some(return_date) = request.return_date {
            legs.push_str(&format!(
                r#"
      <air:SearchAirLeg>
        <air:SearchOrigin><com:Airport Code="{origin}"/></air:SearchOrigin>
        <air:SearchDestination><com:Airport Code="{destination}"/></air:SearchDestination>
        <air:SearchDepTime PreferredTime="{departure}"/>
      </air:SearchAirLeg>"#,
                origin = request.destination,
                destination = request.origin,
                departure = return_date,
            ));
        }
        let mut passengers = String::new();
        for _ in 0..request.adults {
            passengers.push_str(r#"<com:SearchPassenger Code="ADT"/>"#);
        }
        for _ in 0..request.children {
            passengers.push_str(r#"<com:SearchPassenger Code="CNN"/>"#);
        }
        for _ in 0..request.infants {
            passengers.push_str(r#"<com:SearchPassenger Code="INF"/>"#);
        }
        format!(
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"
    xmlns:air="http://www.travelport.com/schema/air_v52_0"
    xmlns:com="http://www.travelport.com/schema/common_v52_0">
  <soapenv:Body>
    <air:LowFareSearchReq TargetBranch="{branch}" ReturnUpsellFare="false">
      <com:BillingPointOfSaleInfo OriginApplication="UAPI"/>
      {legs}
      <air:AirSearchModifiers>
        <air:PreferredCabins><com:CabinClass Type="{cabin}"/></air:PreferredCabins>
      </air:AirSearchModifiers>
      {passengers}
      <air:AirPricingModifiers CurrencyType="{currency}"/>
    </air:LowFareSearchReq>
  </soapenv:Body>
</soapenv:Envelope>"#,
            branch = self.target_branch,
            legs = legs,
            cabin = cabin_name(request.cabin_class),
            passengers = passengers,
            currency = request.currency,
        )
    }

    fn booking_envelope(&self, request: &FlightBookingRequest, offer: &FlightOffer) -> String {
        let mut travelers = String::new();
        for passenger in &request.passengers {
            travelers.push_str(&format!(
                r#"<com:BookingTraveler TravelerType="{code}">
        <com:BookingTravelerName First="{first}" Last="{last}"/>
        <com:PhoneNumber Number="{phone}"/>
        <com:Email EmailID="{email}"/>
      </com:BookingTraveler>"#,
                code = match passenger.passenger_type {
                    crate::model::PassengerType::Adult => "ADT",
                    crate::model::PassengerType::Child => "CNN",
                    crate::model::PassengerType::Infant => "INF",
                },
                first = passenger.first_name,
                last = passenger.last_name,
                phone = request.contact_phone,
                email = request.contact_email,
            ));
        }
        format!(
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"
    xmlns:air="http://www.travelport.com/schema/air_v52_0"
    xmlns:com="http://www.travelport.com/schema/common_v52_0"
    xmlns:univ="http://www.travelport.com/schema/universal_v52_0">
  <soapenv:Body>
    <univ:AirCreateReservationReq TargetBranch="{branch}">
      <com:BillingPointOfSaleInfo OriginApplication="UAPI"/>
      {travelers}
      <air:AirPricingSolutionRef Key="{offer_key}"/>
    </univ:AirCreateReservationReq>
  </soapenv:Body>
</soapenv:Envelope>"#,
            branch = self.target_branch,
            travelers = travelers,
            offer_key = offer.offer_id,
        )
    }

    fn locator_envelope(&self, operation: &str, pnr_number: &str) -> String {
        format!(
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"
    xmlns:univ="http://www.travelport.com/schema/universal_v52_0"
    xmlns:com="http://www.travelport.com/schema/common_v52_0">
  <soapenv:Body>
    <univ:{operation} TargetBranch="{branch}">
      <com:BillingPointOfSaleInfo OriginApplication="UAPI"/>
      <univ:UniversalRecordLocatorCode>{pnr}</univ:UniversalRecordLocatorCode>
    </univ:{operation}>
  </soapenv:Body>
</soapenv:Envelope>"#,
            operation = operation,
            branch = self.target_branch,
            pnr = pnr_number,
        )
    }
}

#[async_trait]
impl SupplierConnector for TravelportConnector {
    fn supplier(&self) -> SupplierType {
        SupplierType::TravelportGds
    }

    async fn search_flights(
        &self,
        request: &FlightSearchRequest,
    ) -> Result<Vec<FlightOffer>, ConnectorError> {
        debug!(origin = %request.origin, destination = %request.destination, "travelport search");
        let body = self
            .soap_call("LowFareSearch", self.search_envelope(request))
            .await?;
        if let Some(fault) = fault_message(&body) {
            return Err(ConnectorError::Api {
                status: 500,
                message: fault,
            });
        }
        parse_search_response(&body)
    }

    async fn create_booking(
        &self,
        request: &FlightBookingRequest,
        offer: &FlightOffer,
    ) -> Result<BookingResult, ConnectorError> {
        let body = self
            .soap_call(
                "AirCreateReservation",
                self.booking_envelope(request, offer),
            )
            .await?;
        if let Some(fault) = fault_message(&body) {
            // Travelport rejects sold-out or repriced solutions with a fault
            // rather than an HTTP error.
            return Ok(BookingResult::declined(format!(
                "Travelport declined the booking: {fault}"
            )));
        }
        let locator = find_attribute(&body, "UniversalRecord", "LocatorCode")?.ok_or_else(|| {
            ConnectorError::MalformedResponse("reservation response without locator".to_string())
        })?;
        let pnr = Pnr {
            pnr_number: locator,
            supplier: SupplierType::TravelportGds,
            status: BookingStatus::Confirmed,
            itinerary: offer.outbound.clone(),
            passengers: request.passengers.clone(),
            price: offer.price.clone(),
            fare_rules: offer.fare_rules.clone(),
            ticket_numbers: None,
            time_limit: offer.valid_until,
        };
        Ok(BookingResult::booked(pnr, "Booking confirmed by Travelport"))
    }

    async fn cancel_booking(&self, pnr_number: &str) -> Result<bool, ConnectorError> {
        let body = self
            .soap_call(
                "UniversalRecordCancel",
                self.locator_envelope("UniversalRecordCancelReq", pnr_number),
            )
            .await?;
        if let Some(fault) = fault_message(&body) {
            if is_not_found(&fault) {
                return Ok(false);
            }
            return Err(ConnectorError::Api {
                status: 500,
                message: fault,
            });
        }
        let status = find_attribute(&body, "UniversalRecordCancelRsp", "Status")?;
        Ok(status.is_some_and(|s| s.eq_ignore_ascii_case("Cancelled")))
    }

    async fn get_booking_details(&self, pnr_number: &str) -> Result<Option<Pnr>, ConnectorError> {
        let body = self
            .soap_call(
                "UniversalRecordRetrieve",
                self.locator_envelope("UniversalRecordRetrieveReq", pnr_number),
            )
            .await?;
        if let Some(fault) = fault_message(&body) {
            if is_not_found(&fault) {
                return Ok(None);
            }
            return Err(ConnectorError::Api {
                status: 500,
                message: fault,
            });
        }
        parse_retrieve_response(&body).map(Some)
    }
}

fn cabin_name(cabin: CabinClass) -> &'static str {
    match cabin {
        CabinClass::Economy => "Economy",
        CabinClass::PremiumEconomy => "PremiumEconomy",
        CabinClass::Business => "Business",
        CabinClass::First => "First",
    }
}

fn cabin_from_name(name: &str) -> CabinClass {
    match name {
        "PremiumEconomy" => CabinClass::PremiumEconomy,
        "Business" => CabinClass::Business,
        "First" => CabinClass::First,
        _ => CabinClass::Economy,
    }
}

fn is_not_found(fault: &str) -> bool {
    fault.to_ascii_lowercase().contains("not found")
}

// ---------------------------------------------------------------------------
// XML scanning helpers
// ---------------------------------------------------------------------------

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, ConnectorError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ConnectorError::Xml(err.to_string()))?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|err| ConnectorError::Xml(err.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn required_attribute(e: &BytesStart<'_>, name: &str) -> Result<String, ConnectorError> {
    attribute(e, name)?.ok_or_else(|| {
        ConnectorError::MalformedResponse(format!(
            "element '{}' missing attribute '{name}'",
            String::from_utf8_lossy(e.name().as_ref())
        ))
    })
}

/// `"USD1025.40"` style price attributes: alphabetic currency prefix
/// followed by the amount.
fn parse_prefixed_amount(raw: &str) -> Result<(String, f64), ConnectorError> {
    let split = raw
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(raw.len());
    let (currency, amount) = raw.split_at(split);
    if currency.len() != 3 {
        return Err(ConnectorError::MalformedResponse(format!(
            "unparseable price '{raw}'"
        )));
    }
    let amount: f64 = amount
        .parse()
        .map_err(|_| ConnectorError::MalformedResponse(format!("unparseable price '{raw}'")))?;
    Ok((currency.to_string(), amount))
}

/// First occurrence of `attribute` on an element whose local name matches.
fn find_attribute(
    xml: &str,
    element: &str,
    attr_name: &str,
) -> Result<Option<String>, ConnectorError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.name().local_name().as_ref() == element.as_bytes() =>
            {
                return attribute(&e, attr_name);
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(ConnectorError::Xml(e.to_string())),
            _ => (),
        }
    }
}

/// `<SOAP:Fault><faultstring>..</faultstring></SOAP:Fault>` detection.
fn fault_message(xml: &str) -> Option<String> {
    if !xml.contains("Fault") {
        return None;
    }
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut in_fault = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = name.local_name();
                if local.as_ref() == b"Fault" {
                    in_fault = true;
                } else if in_fault && local.as_ref() == b"faultstring" {
                    return reader
                        .read_text(e.name())
                        .ok()
                        .map(|text| text.into_owned());
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => (),
        }
    }
}

#[derive(Debug, Clone)]
struct RawSegment {
    carrier: String,
    flight_number: String,
    origin: String,
    destination: String,
    departure: String,
    arrival: String,
    flight_time: Option<u32>,
    equipment: Option<String>,
    origin_terminal: Option<String>,
    destination_terminal: Option<String>,
}

fn raw_segment(e: &BytesStart<'_>) -> Result<(String, RawSegment), ConnectorError> {
    let key = required_attribute(e, "Key")?;
    let segment = RawSegment {
        carrier: required_attribute(e, "Carrier")?,
        flight_number: required_attribute(e, "FlightNumber")?,
        origin: required_attribute(e, "Origin")?,
        destination: required_attribute(e, "Destination")?,
        departure: required_attribute(e, "DepartureTime")?,
        arrival: required_attribute(e, "ArrivalTime")?,
        flight_time: attribute(e, "FlightTime")?.and_then(|v| v.parse().ok()),
        equipment: attribute(e, "Equipment")?,
        origin_terminal: attribute(e, "OriginTerminal")?,
        destination_terminal: attribute(e, "DestinationTerminal")?,
    };
    Ok((key, segment))
}

#[derive(Debug, Clone, Default)]
struct RawBookingInfo {
    segment_ref: String,
    booking_code: String,
    cabin_class: String,
    booking_count: Option<u32>,
    fare_basis: String,
    leg_index: usize,
}

fn normalized_segment(
    raw: &RawSegment,
    info: &RawBookingInfo,
    baggage: Option<&str>,
) -> Result<FlightSegment, ConnectorError> {
    let departure_time = parse_datetime_utc(&raw.departure)?;
    let arrival_time = parse_datetime_utc(&raw.arrival)?;
    Ok(FlightSegment {
        airline: Airline::from_code(&raw.carrier),
        flight_number: raw.flight_number.clone(),
        departure_airport: Airport::from_code(&raw.origin),
        departure_time,
        departure_terminal: raw.origin_terminal.clone(),
        arrival_airport: Airport::from_code(&raw.destination),
        arrival_time,
        arrival_terminal: raw.destination_terminal.clone(),
        duration_minutes: raw
            .flight_time
            .unwrap_or(((arrival_time - departure_time).num_minutes().max(0)) as u32),
        aircraft_type: raw.equipment.clone(),
        cabin_class: cabin_from_name(&info.cabin_class),
        booking_class: info.booking_code.clone(),
        fare_basis: info.fare_basis.clone(),
        baggage_allowance: baggage.map(|b| b.to_string()),
        seats_available: info.booking_count,
    })
}

fn parse_search_response(xml: &str) -> Result<Vec<FlightOffer>, ConnectorError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut segments: HashMap<String, RawSegment> = HashMap::new();
    let mut offers = Vec::new();

    // Per price-point accumulation state.
    let mut current_key: Option<String> = None;
    let mut current_price: Option<(String, f64, f64, f64)> = None;
    let mut bookings: Vec<RawBookingInfo> = Vec::new();
    let mut refundable = false;
    let mut latest_ticketing: Option<String> = None;
    let mut baggage_pieces: Option<String> = None;
    let mut leg_index: usize = 0;
    let mut in_baggage = false;

    loop {
        let event = reader.read_event();
        match event {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = e.name();
                match name.local_name().as_ref() {
                    b"AirSegment" => {
                        let (key, segment) = raw_segment(e)?;
                        segments.insert(key, segment);
                    }
                    b"AirPricePoint" => {
                        current_key = Some(required_attribute(e, "Key")?);
                        let (currency, total) =
                            parse_prefixed_amount(&required_attribute(e, "TotalPrice")?)?;
                        let base = attribute(e, "BasePrice")?
                            .map(|v| parse_prefixed_amount(&v).map(|(_, a)| a))
                            .transpose()?;
                        let taxes = attribute(e, "Taxes")?
                            .map(|v| parse_prefixed_amount(&v).map(|(_, a)| a))
                            .transpose()?;
                        // One of base/taxes may be absent; derive the other
                        // from the total.
                        let base = base.unwrap_or_else(|| total - taxes.unwrap_or(0.0));
                        let taxes = taxes.unwrap_or(total - base);
                        current_price = Some((currency, base, taxes, total));
                        bookings.clear();
                        refundable = false;
                        latest_ticketing = None;
                        baggage_pieces = None;
                        leg_index = 0;
                    }
                    b"AirPricingInfo" => {
                        refundable = attribute(e, "Refundable")?
                            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
                        latest_ticketing = attribute(e, "LatestTicketingTime")?;
                    }
                    b"FlightOption" => {
                        leg_index += 1;
                    }
                    b"BookingInfo" => {
                        bookings.push(RawBookingInfo {
                            segment_ref: required_attribute(e, "SegmentRef")?,
                            booking_code: required_attribute(e, "BookingCode")?,
                            cabin_class: attribute(e, "CabinClass")?.unwrap_or_default(),
                            booking_count: attribute(e, "BookingCount")?
                                .and_then(|v| v.parse().ok()),
                            fare_basis: String::new(),
                            leg_index: leg_index.saturating_sub(1),
                        });
                    }
                    b"FareInfo" => {
                        // A price point carries one fare basis covering all
                        // of its segments.
                        if let Some(basis) = attribute(e, "FareBasis")? {
                            for booking in &mut bookings {
                                if booking.fare_basis.is_empty() {
                                    booking.fare_basis = basis.clone();
                                }
                            }
                        }
                    }
                    b"BaggageAllowance" => {
                        in_baggage = true;
                    }
                    b"NumberOfPieces" if in_baggage => {
                        if let Ok(text) = reader.read_text(name) {
                            baggage_pieces = Some(format!("{}PC", text.trim()));
                        }
                    }
                    _ => (),
                }
            }
            Ok(Event::End(ref e)) => match e.name().local_name().as_ref() {
                b"BaggageAllowance" => in_baggage = false,
                b"AirPricePoint" => {
                    let key = current_key.take().ok_or_else(|| {
                        ConnectorError::MalformedResponse("unkeyed price point".to_string())
                    })?;
                    let (currency, base, taxes, total) = current_price.take().ok_or_else(|| {
                        ConnectorError::MalformedResponse("unpriced price point".to_string())
                    })?;
                    offers.push(assemble_offer(
                        key,
                        &segments,
                        &bookings,
                        currency,
                        base,
                        taxes,
                        total,
                        refundable,
                        latest_ticketing.as_deref(),
                        baggage_pieces.as_deref(),
                    )?);
                }
                _ => (),
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ConnectorError::Xml(e.to_string())),
            _ => (),
        }
    }
    Ok(offers)
}

#[allow(clippy::too_many_arguments)]
fn assemble_offer(
    key: String,
    segments: &HashMap<String, RawSegment>,
    bookings: &[RawBookingInfo],
    currency: String,
    base: f64,
    taxes: f64,
    total: f64,
    refundable: bool,
    latest_ticketing: Option<&str>,
    baggage: Option<&str>,
) -> Result<FlightOffer, ConnectorError> {
    let leg_count = bookings
        .iter()
        .map(|b| b.leg_index + 1)
        .max()
        .unwrap_or(0);
    if leg_count == 0 {
        return Err(ConnectorError::MalformedResponse(format!(
            "price point '{key}' without booking info"
        )));
    }

    let mut legs: Vec<FlightItinerary> = Vec::with_capacity(leg_count);
    for leg in 0..leg_count {
        let leg_segments = bookings
            .iter()
            .filter(|b| b.leg_index == leg)
            .map(|booking| {
                let raw = segments.get(&booking.segment_ref).ok_or_else(|| {
                    ConnectorError::MalformedResponse(format!(
                        "dangling segment ref '{}'",
                        booking.segment_ref
                    ))
                })?;
                normalized_segment(raw, booking, baggage)
            })
            .collect::<Result<Vec<_>, _>>()?;
        legs.push(
            FlightItinerary::from_segments(leg_segments)
                .map_err(|e| ConnectorError::MalformedResponse(e.to_string()))?,
        );
    }
    let mut legs = legs.into_iter();
    let outbound = legs.next().expect("leg_count > 0");
    let inbound = legs.next();

    let seats = outbound
        .segments
        .iter()
        .filter_map(|s| s.seats_available)
        .min();
    Ok(FlightOffer {
        offer_id: key,
        supplier: SupplierType::TravelportGds,
        outbound,
        inbound,
        price: Price {
            base_fare: base,
            taxes,
            total,
            currency,
            per_passenger: false,
        },
        fare_rules: FareRules {
            refundable,
            baggage_allowance: baggage.map(|b| b.to_string()),
            ..FareRules::default()
        },
        valid_until: latest_ticketing.map(parse_datetime_utc).transpose()?,
        instant_ticketing_required: false,
        seats_available: seats,
    })
}

fn parse_retrieve_response(xml: &str) -> Result<Pnr, ConnectorError> {
    let locator = find_attribute(xml, "UniversalRecord", "LocatorCode")?.ok_or_else(|| {
        ConnectorError::MalformedResponse("retrieve response without locator".to_string())
    })?;
    let record_status = find_attribute(xml, "UniversalRecord", "Status")?;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut segments = Vec::new();
    let mut price: Option<(String, f64, f64, f64)> = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match e.name().local_name().as_ref() {
                    b"AirSegment" => {
                        let (_, raw) = raw_segment(e)?;
                        let info = RawBookingInfo {
                            booking_code: attribute(e, "ClassOfService")?.unwrap_or_default(),
                            cabin_class: attribute(e, "CabinClass")?.unwrap_or_default(),
                            ..RawBookingInfo::default()
                        };
                        segments.push(normalized_segment(&raw, &info, None)?);
                    }
                    b"AirPricingInfo" => {
                        if let Some(total_raw) = attribute(e, "TotalPrice")? {
                            let (currency, total) = parse_prefixed_amount(&total_raw)?;
                            let base = attribute(e, "BasePrice")?
                                .map(|v| parse_prefixed_amount(&v).map(|(_, a)| a))
                                .transpose()?
                                .unwrap_or(total);
                            price = Some((currency, base, total - base, total));
                        }
                    }
                    _ => (),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ConnectorError::Xml(e.to_string())),
            _ => (),
        }
    }

    let itinerary = FlightItinerary::from_segments(segments)
        .map_err(|e| ConnectorError::MalformedResponse(e.to_string()))?;
    let (currency, base, taxes, total) = price.ok_or_else(|| {
        ConnectorError::MalformedResponse("retrieve response without pricing".to_string())
    })?;
    let status = match record_status.as_deref() {
        Some(s) if s.eq_ignore_ascii_case("Cancelled") => BookingStatus::Cancelled,
        Some(s) if s.eq_ignore_ascii_case("Ticketed") => BookingStatus::Ticketed,
        Some(s) if s.eq_ignore_ascii_case("Pending") => BookingStatus::Pending,
        _ => BookingStatus::Confirmed,
    };
    Ok(Pnr {
        pnr_number: locator,
        supplier: SupplierType::TravelportGds,
        status,
        itinerary,
        passengers: vec![],
        price: Price {
            base_fare: base,
            taxes,
            total,
            currency,
            per_passenger: false,
        },
        fare_rules: FareRules::default(),
        ticket_numbers: None,
        time_limit: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const SAMPLE_SEARCH_XML: &str = r#"<SOAP:Envelope xmlns:SOAP="http://schemas.xmlsoap.org/soap/envelope/">
  <SOAP:Body>
    <air:LowFareSearchRsp xmlns:air="http://www.travelport.com/schema/air_v52_0">
      <air:AirSegmentList>
        <air:AirSegment Key="SEG1" Carrier="BA" FlightNumber="112" Origin="JFK" Destination="LHR"
            DepartureTime="2026-03-01T18:30:00.000+00:00" ArrivalTime="2026-03-02T01:35:00.000+00:00"
            FlightTime="425" Equipment="77W" OriginTerminal="7" DestinationTerminal="5"/>
        <air:AirSegment Key="SEG2" Carrier="UA" FlightNumber="16" Origin="EWR" Destination="LHR"
            DepartureTime="2026-03-01T19:00:00.000+00:00" ArrivalTime="2026-03-02T02:55:00.000+00:00"
            FlightTime="415"/>
      </air:AirSegmentList>
      <air:AirPricePointList>
        <air:AirPricePoint Key="PP1" TotalPrice="USD1025.40" BasePrice="USD850.00" Taxes="USD175.40">
          <air:AirPricingInfo Key="PI1" Refundable="true" LatestTicketingTime="2026-02-25T23:59:00.000+00:00">
            <air:FlightOptionsList>
              <air:FlightOption LegRef="LEG1" Origin="JFK" Destination="LHR">
                <air:Option Key="OPT1">
                  <air:BookingInfo BookingCode="Y" CabinClass="Economy" SegmentRef="SEG1" BookingCount="4"/>
                </air:Option>
              </air:FlightOption>
            </air:FlightOptionsList>
            <air:FareInfo Key="FI1" FareBasis="YIFLX"/>
            <air:BaggageAllowance><air:NumberOfPieces>1</air:NumberOfPieces></air:BaggageAllowance>
          </air:AirPricingInfo>
        </air:AirPricePoint>
        <air:AirPricePoint Key="PP2" TotalPrice="USD905.10" BasePrice="USD760.00" Taxes="USD145.10">
          <air:AirPricingInfo Key="PI2" Refundable="false">
            <air:FlightOptionsList>
              <air:FlightOption LegRef="LEG1" Origin="EWR" Destination="LHR">
                <air:Option Key="OPT2">
                  <air:BookingInfo BookingCode="K" CabinClass="Economy" SegmentRef="SEG2" BookingCount="2"/>
                </air:Option>
              </air:FlightOption>
            </air:FlightOptionsList>
            <air:FareInfo Key="FI2" FareBasis="KLWSAVER"/>
          </air:AirPricingInfo>
        </air:AirPricePoint>
      </air:AirPricePointList>
    </air:LowFareSearchRsp>
  </SOAP:Body>
</SOAP:Envelope>"#;

    #[test]
    fn parses_price_points_into_offers() {
        let offers = parse_search_response(SAMPLE_SEARCH_XML).unwrap();
        assert_eq!(offers.len(), 2);

        let first = &offers[0];
        assert_eq!(first.offer_id, "PP1");
        assert_eq!(first.supplier, SupplierType::TravelportGds);
        assert_eq!(first.outbound.segments.len(), 1);
        let segment = &first.outbound.segments[0];
        assert_eq!(segment.airline.code, "BA");
        assert_eq!(segment.duration_minutes, 425);
        assert_eq!(segment.booking_class, "Y");
        assert_eq!(segment.fare_basis, "YIFLX");
        assert_eq!(segment.departure_terminal.as_deref(), Some("7"));
        assert_eq!(segment.baggage_allowance.as_deref(), Some("1PC"));
        assert!(first.fare_rules.refundable);
        assert_eq!(first.seats_available, Some(4));

        let second = &offers[1];
        assert_eq!(second.offer_id, "PP2");
        assert!(!second.fare_rules.refundable);
        assert_eq!(second.outbound.segments[0].booking_class, "K");
    }

    #[test]
    fn prefixed_prices_split_currency_and_amount() {
        let offers = parse_search_response(SAMPLE_SEARCH_XML).unwrap();
        let price = &offers[0].price;
        assert_eq!(price.currency, "USD");
        assert!((price.total - 1025.40).abs() < f64::EPSILON);
        assert!(price.is_consistent());
    }

    #[test]
    fn latest_ticketing_time_becomes_valid_until() {
        let offers = parse_search_response(SAMPLE_SEARCH_XML).unwrap();
        let valid_until = offers[0].valid_until.unwrap();
        assert_eq!(valid_until.day(), 25);
        assert_eq!(valid_until.hour(), 23);
        assert!(offers[1].valid_until.is_none());
    }

    #[test]
    fn namespace_prefix_does_not_matter() {
        let renamed = SAMPLE_SEARCH_XML.replace("air:", "ns2:");
        let offers = parse_search_response(&renamed).unwrap();
        assert_eq!(offers.len(), 2);
    }

    #[test]
    fn fault_is_detected() {
        let fault_xml = r#"<SOAP:Envelope xmlns:SOAP="http://schemas.xmlsoap.org/soap/envelope/">
  <SOAP:Body>
    <SOAP:Fault>
      <faultcode>Server.Data</faultcode>
      <faultstring>Record not found in database</faultstring>
    </SOAP:Fault>
  </SOAP:Body>
</SOAP:Envelope>"#;
        let fault = fault_message(fault_xml).unwrap();
        assert!(is_not_found(&fault));
        assert!(fault_message(SAMPLE_SEARCH_XML).is_none());
    }

    #[test]
    fn dangling_segment_ref_is_malformed() {
        let broken = SAMPLE_SEARCH_XML.replace("SegmentRef=\"SEG1\"", "SegmentRef=\"SEG9\"");
        assert!(matches!(
            parse_search_response(&broken),
            Err(ConnectorError::MalformedResponse(_))
        ));
    }

    #[test]
    fn parse_prefixed_amount_rejects_garbage() {
        assert!(parse_prefixed_amount("1025.40").is_err());
        assert!(parse_prefixed_amount("USDabc").is_err());
        let (currency, amount) = parse_prefixed_amount("EUR99.95").unwrap();
        assert_eq!(currency, "EUR");
        assert!((amount - 99.95).abs() < f64::EPSILON);
    }

    #[test]
    fn retrieve_response_maps_to_pnr() {
        let xml = r#"<SOAP:Envelope xmlns:SOAP="http://schemas.xmlsoap.org/soap/envelope/">
  <SOAP:Body>
    <univ:UniversalRecordRetrieveRsp xmlns:univ="http://www.travelport.com/schema/universal_v52_0"
        xmlns:air="http://www.travelport.com/schema/air_v52_0">
      <univ:UniversalRecord LocatorCode="TP4H8Q" Status="Ticketed">
        <air:AirSegment Key="S1" Carrier="BA" FlightNumber="112" Origin="JFK" Destination="LHR"
            DepartureTime="2026-03-01T18:30:00.000+00:00" ArrivalTime="2026-03-02T01:35:00.000+00:00"
            FlightTime="425" ClassOfService="Y" CabinClass="Economy"/>
        <air:AirPricingInfo Key="P1" TotalPrice="USD1025.40" BasePrice="USD850.00"/>
      </univ:UniversalRecord>
    </univ:UniversalRecordRetrieveRsp>
  </SOAP:Body>
</SOAP:Envelope>"#;
        let pnr = parse_retrieve_response(xml).unwrap();
        assert_eq!(pnr.pnr_number, "TP4H8Q");
        assert_eq!(pnr.status, BookingStatus::Ticketed);
        assert_eq!(pnr.supplier, SupplierType::TravelportGds);
        assert_eq!(pnr.itinerary.segments[0].booking_class, "Y");
        assert!(pnr.price.is_consistent());
    }

    #[test]
    fn search_envelope_carries_credentials_free_branch_and_legs() {
        let connector = TravelportConnector::new(&SoapSupplierConfig {
            endpoint: "https://emea.universal-api.travelport.com/AirService".to_string(),
            username: "user".to_string(),
            password: "pass".to_string(),
            target_branch: "P105xxx".to_string(),
        });
        let request = FlightSearchRequest {
            origin: "JFK".to_string(),
            destination: "LHR".to_string(),
            departure_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            return_date: Some(chrono::NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()),
            adults: 2,
            children: 1,
            infants: 0,
            cabin_class: CabinClass::Business,
            direct_only: false,
            max_stops: None,
            preferred_airlines: vec![],
            excluded_airlines: vec![],
            currency: "USD".to_string(),
            supplier_subset: None,
        };
        let envelope = connector.search_envelope(&request);
        assert_eq!(envelope.matches("SearchAirLeg>").count(), 4);
        assert_eq!(envelope.matches(r#"Code="ADT""#).count(), 2);
        assert_eq!(envelope.matches(r#"Code="CNN""#).count(), 1);
        assert!(envelope.contains(r#"TargetBranch="P105xxx""#));
        assert!(envelope.contains(r#"CabinClass Type="Business""#));
        assert!(!envelope.contains("pass"));
    }
}
