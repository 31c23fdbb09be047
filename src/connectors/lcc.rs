// Low-cost-carrier placeholder connectors. No public partner API exists for
// these suppliers yet, so the connector is a deliberate degraded-capability
// state: searches yield zero offers with a warning, stateful operations
// report "not available" as a structured failure. Kept for interface
// symmetry so the supplier set is closed over all seven identities.

use async_trait::async_trait;
use tracing::warn;

use crate::connector::{BookingResult, SupplierConnector};
use crate::error::ConnectorError;
use crate::model::{FlightBookingRequest, FlightOffer, FlightSearchRequest, Pnr, SupplierType};

pub struct LccConnector {
    supplier: SupplierType,
}

impl LccConnector {
    /// Panics if `supplier` is not a low-cost carrier; the GDS identities
    /// belong to their own connectors.
    pub fn new(supplier: SupplierType) -> Self {
        assert!(
            supplier.is_low_cost(),
            "LccConnector built for GDS supplier {supplier}"
        );
        Self { supplier }
    }

    fn unavailable_message(&self) -> String {
        format!(
            "{} bookings are not available yet: commercial partnership required",
            self.supplier
        )
    }
}

#[async_trait]
impl SupplierConnector for LccConnector {
    fn supplier(&self) -> SupplierType {
        self.supplier
    }

    async fn search_flights(
        &self,
        _request: &FlightSearchRequest,
    ) -> Result<Vec<FlightOffer>, ConnectorError> {
        warn!(supplier = %self.supplier, "LCC search skipped: partner API not integrated");
        Ok(vec![])
    }

    async fn create_booking(
        &self,
        _request: &FlightBookingRequest,
        _offer: &FlightOffer,
    ) -> Result<BookingResult, ConnectorError> {
        warn!(supplier = %self.supplier, "LCC booking declined: partner API not integrated");
        Ok(BookingResult::declined(self.unavailable_message()))
    }

    async fn cancel_booking(&self, _pnr_number: &str) -> Result<bool, ConnectorError> {
        Err(ConnectorError::CapabilityUnavailable(self.supplier))
    }

    async fn get_booking_details(&self, _pnr_number: &str) -> Result<Option<Pnr>, ConnectorError> {
        Err(ConnectorError::CapabilityUnavailable(self.supplier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CabinClass;
    use chrono::NaiveDate;

    fn request() -> FlightSearchRequest {
        FlightSearchRequest {
            origin: "STN".to_string(),
            destination: "DUB".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            return_date: None,
            adults: 1,
            children: 0,
            infants: 0,
            cabin_class: CabinClass::Economy,
            direct_only: true,
            max_stops: None,
            preferred_airlines: vec![],
            excluded_airlines: vec![],
            currency: "EUR".to_string(),
            supplier_subset: None,
        }
    }

    #[tokio::test]
    async fn search_yields_zero_offers_without_error() {
        let connector = LccConnector::new(SupplierType::LccRyanair);
        let offers = connector.search_flights(&request()).await.unwrap();
        assert!(offers.is_empty());
    }

    #[tokio::test]
    async fn booking_is_a_structured_decline() {
        let connector = LccConnector::new(SupplierType::LccRyanair);
        let booking = FlightBookingRequest {
            offer_id: "FR-1".to_string(),
            passengers: vec![],
            contact_email: "a@b.test".to_string(),
            contact_phone: "+100".to_string(),
            payment_method: "card".to_string(),
            special_requests: None,
        };
        let dummy_offer = {
            use crate::model::*;
            use chrono::{TimeZone, Utc};
            let segment = FlightSegment {
                airline: Airline::from_code("FR"),
                flight_number: "101".to_string(),
                departure_airport: Airport::from_code("STN"),
                departure_time: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
                departure_terminal: None,
                arrival_airport: Airport::from_code("DUB"),
                arrival_time: Utc.with_ymd_and_hms(2026, 3, 1, 9, 20, 0).unwrap(),
                arrival_terminal: None,
                duration_minutes: 80,
                aircraft_type: None,
                cabin_class: CabinClass::Economy,
                booking_class: "Y".to_string(),
                fare_basis: String::new(),
                baggage_allowance: None,
                seats_available: None,
            };
            FlightOffer {
                offer_id: "FR-1".to_string(),
                supplier: SupplierType::LccRyanair,
                outbound: FlightItinerary::from_segments(vec![segment]).unwrap(),
                inbound: None,
                price: Price::new(29.99, 12.50, "EUR", false),
                fare_rules: FareRules::default(),
                valid_until: None,
                instant_ticketing_required: true,
                seats_available: None,
            }
        };
        let result = connector
            .create_booking(&booking, &dummy_offer)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.pnr.is_none());
        assert!(result.message.contains("partnership required"));
    }

    #[tokio::test]
    async fn cancel_and_retrieve_report_capability_unavailable() {
        let connector = LccConnector::new(SupplierType::LccWizzair);
        assert!(matches!(
            connector.cancel_booking("W6ABC1").await,
            Err(ConnectorError::CapabilityUnavailable(SupplierType::LccWizzair))
        ));
        assert!(matches!(
            connector.get_booking_details("W6ABC1").await,
            Err(ConnectorError::CapabilityUnavailable(SupplierType::LccWizzair))
        ));
    }

    #[test]
    #[should_panic]
    fn gds_identity_is_rejected() {
        LccConnector::new(SupplierType::AmadeusGds);
    }
}
