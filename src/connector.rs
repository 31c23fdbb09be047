// Capability contract implemented by every supplier connector, regardless of
// wire protocol. The orchestrator depends only on this trait, never on a
// connector's concrete type.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConnectorError;
use crate::model::{FlightBookingRequest, FlightOffer, FlightSearchRequest, Pnr, SupplierType};

/// Outcome of a booking attempt. Business-level declines (fare no longer
/// available, LCC partnership missing, unconfigured supplier) are modeled as
/// `success == false`, not as errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResult {
    pub success: bool,
    pub pnr: Option<Pnr>,
    pub message: String,
}

impl BookingResult {
    pub fn booked(pnr: Pnr, message: impl Into<String>) -> Self {
        Self {
            success: true,
            pnr: Some(pnr),
            message: message.into(),
        }
    }

    pub fn declined(message: impl Into<String>) -> Self {
        Self {
            success: false,
            pnr: None,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait SupplierConnector: Send + Sync {
    /// Identity used as the dispatch key for every stateful follow-up.
    fn supplier(&self) -> SupplierType;

    /// Search this supplier's inventory. "No results" is `Ok(vec![])`;
    /// `Err` is reserved for connector-level failure (auth, network,
    /// malformed response).
    async fn search_flights(
        &self,
        request: &FlightSearchRequest,
    ) -> Result<Vec<FlightOffer>, ConnectorError>;

    /// Book a previously returned offer.
    async fn create_booking(
        &self,
        request: &FlightBookingRequest,
        offer: &FlightOffer,
    ) -> Result<BookingResult, ConnectorError>;

    /// Returns whether the cancellation was accepted by the supplier.
    async fn cancel_booking(&self, pnr_number: &str) -> Result<bool, ConnectorError>;

    /// `Ok(None)` when the supplier does not know the PNR.
    async fn get_booking_details(&self, pnr_number: &str) -> Result<Option<Pnr>, ConnectorError>;
}
