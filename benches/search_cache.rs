use chrono::{NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flight_aggregator::cache::{cache_key, SearchCache};
use flight_aggregator::config::CacheConfig;
use flight_aggregator::model::{
    Airline, Airport, CabinClass, FareRules, FlightItinerary, FlightOffer, FlightSearchRequest,
    FlightSegment, Price, SupplierType,
};
use rand::{seq::SliceRandom, thread_rng, Rng};
use std::sync::Arc;
use std::thread;

fn sample_offer(total: f64) -> FlightOffer {
    let segment = FlightSegment {
        airline: Airline::from_code("BA"),
        flight_number: "112".to_string(),
        departure_airport: Airport::from_code("JFK"),
        departure_time: Utc.with_ymd_and_hms(2026, 3, 1, 18, 30, 0).unwrap(),
        departure_terminal: None,
        arrival_airport: Airport::from_code("LHR"),
        arrival_time: Utc.with_ymd_and_hms(2026, 3, 2, 1, 35, 0).unwrap(),
        arrival_terminal: None,
        duration_minutes: 425,
        aircraft_type: None,
        cabin_class: CabinClass::Economy,
        booking_class: "Y".to_string(),
        fare_basis: "YIF".to_string(),
        baggage_allowance: None,
        seats_available: Some(4),
    };
    FlightOffer {
        offer_id: format!("AMA-{total}"),
        supplier: SupplierType::AmadeusGds,
        outbound: FlightItinerary::from_segments(vec![segment]).unwrap(),
        inbound: None,
        price: Price::new(total - 50.0, 50.0, "USD", false),
        fare_rules: FareRules::default(),
        valid_until: None,
        instant_ticketing_required: false,
        seats_available: Some(4),
    }
}

fn request_for(origin: &str, destination: &str, day: u32) -> FlightSearchRequest {
    FlightSearchRequest {
        origin: origin.to_string(),
        destination: destination.to_string(),
        departure_date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
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

pub fn search_cache_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_cache");

    for max_entries in [100usize, 1_000, 10_000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(max_entries),
            max_entries,
            |b, &max_entries| {
                b.iter(|| {
                    let cache = Arc::new(SearchCache::new(CacheConfig {
                        max_entries,
                        ttl_seconds: 300,
                    }));

                    let routes = [("JFK", "LHR"), ("LHR", "CDG"), ("CDG", "MAD"), ("MAD", "JFK")];
                    let offers: Vec<FlightOffer> =
                        (0..10).map(|i| sample_offer(100.0 + i as f64)).collect();

                    let mut handles = vec![];
                    for _ in 0..4 {
                        let cache = Arc::clone(&cache);
                        let offers = offers.clone();

                        let handle = thread::spawn(move || {
                            let mut rng = thread_rng();

                            // 30% writes, 70% reads across a window of keys
                            for _ in 0..250 {
                                let (origin, destination) = *routes.choose(&mut rng).unwrap();
                                let day = rng.gen_range(1..=28);
                                let key = cache_key(&request_for(origin, destination, day));

                                if rng.gen_bool(0.3) {
                                    cache.store(key, offers.clone());
                                } else {
                                    let _ = cache.get(&key);
                                }
                            }
                        });

                        handles.push(handle);
                    }

                    for handle in handles {
                        handle.join().unwrap();
                    }

                    black_box(cache.stats())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, search_cache_benchmark);
criterion_main!(benches);
