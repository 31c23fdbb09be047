//! Multi-supplier flight search and booking aggregation engine.
//!
//! Normalizes three GDS backends (Amadeus, Sabre, Travelport) and a set of
//! low-cost-carrier placeholders behind one connector trait, fans searches out
//! concurrently with per-supplier deadlines, and merges the surviving offers
//! into a single price-ascending list. Stateful operations (booking,
//! cancellation, retrieval) route strictly to the supplier that produced the
//! offer or PNR.

pub mod auth;
pub mod cache;
pub mod config;
pub mod connector;
pub mod connectors;
pub mod error;
pub mod model;
pub mod orchestrator;

// Re-export key types for convenience
pub use cache::{CacheStatsReport, SearchCache};
pub use config::{
    AggregatorConfig, CacheConfig, OAuthCredentials, RestSupplierConfig, SoapSupplierConfig,
};
pub use connector::{BookingResult, SupplierConnector};
pub use connectors::{AmadeusConnector, LccConnector, SabreConnector, TravelportConnector};
pub use error::ConnectorError;
pub use model::{
    BookingStatus, CabinClass, FlightBookingRequest, FlightOffer, FlightSearchRequest,
    FlightSearchResponse, Pnr, SupplierType, ValidationError,
};
pub use orchestrator::FlightAggregator;
