// Aggregation orchestrator: owns the configured connector set, fans searches
// out concurrently with a hard per-supplier deadline, merges results
// price-ascending, and routes stateful follow-ups strictly to the supplier
// that owns the offer or PNR.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::cache::{cache_key, CacheStatsReport, SearchCache};
use crate::config::AggregatorConfig;
use crate::connector::{BookingResult, SupplierConnector};
use crate::connectors::{AmadeusConnector, LccConnector, SabreConnector, TravelportConnector};
use crate::model::{
    FlightBookingRequest, FlightOffer, FlightSearchRequest, FlightSearchResponse, Pnr,
    SupplierType, ValidationError,
};

pub struct FlightAggregator {
    /// Built once at startup; read-only thereafter.
    connectors: HashMap<SupplierType, Arc<dyn SupplierConnector>>,
    cache: SearchCache,
    default_timeout: Duration,
}

impl FlightAggregator {
    pub fn from_config(config: &AggregatorConfig) -> Self {
        let mut connectors: HashMap<SupplierType, Arc<dyn SupplierConnector>> = HashMap::new();
        if let Some(amadeus) = &config.amadeus {
            connectors.insert(
                SupplierType::AmadeusGds,
                Arc::new(AmadeusConnector::new(amadeus)),
            );
        }
        if let Some(sabre) = &config.sabre {
            connectors.insert(SupplierType::SabreGds, Arc::new(SabreConnector::new(sabre)));
        }
        if let Some(travelport) = &config.travelport {
            connectors.insert(
                SupplierType::TravelportGds,
                Arc::new(TravelportConnector::new(travelport)),
            );
        }
        if config.enable_lcc_placeholders {
            for supplier in SupplierType::ALL.into_iter().filter(|s| s.is_low_cost()) {
                connectors.insert(supplier, Arc::new(LccConnector::new(supplier)));
            }
        }
        debug!(suppliers = connectors.len(), "aggregator configured");
        Self {
            connectors,
            cache: SearchCache::new(config.cache.unwrap_or_default()),
            default_timeout: config.search_timeout(),
        }
    }

    /// Build from pre-constructed connectors. Duplicate supplier identities
    /// keep the last connector.
    pub fn from_connectors(
        connectors: Vec<Arc<dyn SupplierConnector>>,
        default_timeout: Duration,
    ) -> Self {
        let connectors = connectors
            .into_iter()
            .map(|c| (c.supplier(), c))
            .collect();
        Self {
            connectors,
            cache: SearchCache::new(Default::default()),
            default_timeout,
        }
    }

    fn new_search_id() -> String {
        format!("search-{}", rand::random::<u32>())
    }

    /// Fan the search out to every resolved supplier concurrently, each task
    /// time-boxed to `per_supplier_timeout` (the configured default when
    /// `None`). A timed-out, failing or panicking supplier contributes zero
    /// offers; it never delays or fails the others.
    pub async fn search_flights(
        &self,
        request: &FlightSearchRequest,
        per_supplier_timeout: Option<Duration>,
    ) -> Result<FlightSearchResponse, ValidationError> {
        request.validate()?;
        let started = Instant::now();
        let deadline = per_supplier_timeout.unwrap_or(self.default_timeout);

        // Configured set intersected with the caller's subset, in stable
        // supplier order so equal-price merging is deterministic.
        let mut targets: Vec<(SupplierType, Arc<dyn SupplierConnector>)> = self
            .connectors
            .iter()
            .filter(|(supplier, _)| {
                request
                    .supplier_subset
                    .as_ref()
                    .map_or(true, |subset| subset.contains(*supplier))
            })
            .map(|(supplier, connector)| (*supplier, Arc::clone(connector)))
            .collect();
        targets.sort_by_key(|(supplier, _)| *supplier);

        if targets.is_empty() {
            debug!("no configured supplier matches the requested subset");
            return Ok(FlightSearchResponse {
                search_id: Self::new_search_id(),
                offers: vec![],
                total_results: 0,
                search_time_ms: started.elapsed().as_millis() as u64,
            });
        }

        // Subset searches bypass the cache: a cached full-fanout result
        // would leak offers from suppliers outside the subset.
        let cacheable = request.supplier_subset.is_none();
        if cacheable {
            if let Some(offers) = self.cache.get(&cache_key(request)) {
                debug!(offers = offers.len(), "search served from cache");
                return Ok(FlightSearchResponse {
                    search_id: Self::new_search_id(),
                    total_results: offers.len(),
                    offers,
                    search_time_ms: started.elapsed().as_millis() as u64,
                });
            }
        }

        let tasks: Vec<_> = targets
            .into_iter()
            .map(|(supplier, connector)| {
                let request = request.clone();
                tokio::spawn(async move {
                    match timeout(deadline, connector.search_flights(&request)).await {
                        Ok(Ok(offers)) => {
                            debug!(supplier = %supplier, offers = offers.len(), "supplier search completed");
                            offers
                        }
                        Ok(Err(err)) => {
                            error!(supplier = %supplier, error = %err, "supplier search failed");
                            vec![]
                        }
                        Err(_) => {
                            warn!(
                                supplier = %supplier,
                                timeout_ms = deadline.as_millis() as u64,
                                "supplier search timed out"
                            );
                            vec![]
                        }
                    }
                })
            })
            .collect();

        let mut offers = Vec::new();
        for joined in join_all(tasks).await {
            match joined {
                Ok(batch) => offers.extend(batch),
                // A connector defect is a supplier-scoped failure, not an
                // aggregate one.
                Err(err) => error!(error = %err, "supplier search task panicked"),
            }
        }

        // Vendors differ in which search parameters they honor; the request
        // filters are enforced here on the normalized offers.
        offers.retain(|offer| request.accepts(offer));
        // Stable sort: equal prices keep per-supplier submission order.
        offers.sort_by(|a, b| a.price.total.total_cmp(&b.price.total));

        if cacheable {
            self.cache.store(cache_key(request), offers.clone());
        }
        Ok(FlightSearchResponse {
            search_id: Self::new_search_id(),
            total_results: offers.len(),
            offers,
            search_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Dispatch strictly via `offer.supplier`. An unconfigured supplier or a
    /// connector-level failure is a structured decline, never a panic or a
    /// silent fallback to a different backend.
    pub async fn create_booking(
        &self,
        request: &FlightBookingRequest,
        offer: &FlightOffer,
    ) -> BookingResult {
        let Some(connector) = self.connectors.get(&offer.supplier) else {
            return BookingResult::declined(format!(
                "Supplier {} is not configured",
                offer.supplier
            ));
        };
        match connector.create_booking(request, offer).await {
            Ok(result) => result,
            Err(err) => {
                error!(supplier = %offer.supplier, error = %err, "booking failed");
                BookingResult::declined(format!("Booking with {} failed: {err}", offer.supplier))
            }
        }
    }

    pub async fn cancel_booking(&self, pnr_number: &str, supplier: SupplierType) -> bool {
        let Some(connector) = self.connectors.get(&supplier) else {
            warn!(supplier = %supplier, "cancellation requested for unconfigured supplier");
            return false;
        };
        match connector.cancel_booking(pnr_number).await {
            Ok(cancelled) => cancelled,
            Err(err) => {
                error!(supplier = %supplier, pnr = pnr_number, error = %err, "cancellation failed");
                false
            }
        }
    }

    pub async fn get_booking_details(
        &self,
        pnr_number: &str,
        supplier: SupplierType,
    ) -> Option<Pnr> {
        let Some(connector) = self.connectors.get(&supplier) else {
            warn!(supplier = %supplier, "retrieval requested for unconfigured supplier");
            return None;
        };
        match connector.get_booking_details(pnr_number).await {
            Ok(pnr) => pnr,
            Err(err) => {
                error!(supplier = %supplier, pnr = pnr_number, error = %err, "retrieval failed");
                None
            }
        }
    }

    /// Configured suppliers, sorted. No I/O.
    pub fn available_suppliers(&self) -> Vec<SupplierType> {
        let mut suppliers: Vec<SupplierType> = self.connectors.keys().copied().collect();
        suppliers.sort();
        suppliers
    }

    /// Configuration state of every known supplier identity. No I/O.
    pub fn supplier_status(&self) -> HashMap<SupplierType, bool> {
        SupplierType::ALL
            .into_iter()
            .map(|supplier| (supplier, self.connectors.contains_key(&supplier)))
            .collect()
    }

    pub fn cache_stats(&self) -> CacheStatsReport {
        self.cache.stats()
    }

    pub fn invalidate_cache(&self) -> usize {
        self.cache.invalidate_all()
    }
}
