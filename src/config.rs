// Aggregator configuration. A supplier with no credentials is simply absent
// from the connector map; the engine never fails over a missing backend.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}

/// Credentials for a REST+OAuth2 GDS backend.
#[derive(Debug, Clone, Deserialize)]
pub struct RestSupplierConfig {
    pub base_url: String,
    pub oauth: OAuthCredentials,
}

/// Credentials for the SOAP backend (HTTP Basic).
#[derive(Debug, Clone, Deserialize)]
pub struct SoapSupplierConfig {
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Provisioning branch included in every request envelope.
    pub target_branch: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl_seconds: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            ttl_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub amadeus: Option<RestSupplierConfig>,
    pub sabre: Option<RestSupplierConfig>,
    pub travelport: Option<SoapSupplierConfig>,
    /// Register the four LCC placeholder connectors. They answer searches
    /// with zero offers and decline bookings until a partner API exists.
    pub enable_lcc_placeholders: bool,
    pub search_timeout_ms: Option<u64>,
    pub cache: Option<CacheConfig>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            amadeus: None,
            sabre: None,
            travelport: None,
            enable_lcc_placeholders: true,
            search_timeout_ms: None,
            cache: None,
        }
    }
}

impl AggregatorConfig {
    pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(8);

    pub fn search_timeout(&self) -> Duration {
        self.search_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(Self::DEFAULT_SEARCH_TIMEOUT)
    }

    /// Load from environment variables. Each supplier's variables must be
    /// either all present or all absent; a partial set is a configuration
    /// error rather than a silently skipped supplier.
    pub fn from_env() -> Result<Self> {
        let amadeus = rest_from_env(
            "AMADEUS_BASE_URL",
            "AMADEUS_CLIENT_ID",
            "AMADEUS_CLIENT_SECRET",
            "AMADEUS_TOKEN_URL",
        )?;
        let sabre = rest_from_env(
            "SABRE_BASE_URL",
            "SABRE_CLIENT_ID",
            "SABRE_CLIENT_SECRET",
            "SABRE_TOKEN_URL",
        )?;
        let travelport = soap_from_env(
            "TRAVELPORT_ENDPOINT",
            "TRAVELPORT_USERNAME",
            "TRAVELPORT_PASSWORD",
            "TRAVELPORT_TARGET_BRANCH",
        )?;

        let enable_lcc_placeholders = match std::env::var("ENABLE_LCC_PLACEHOLDERS") {
            Ok(v) => v
                .parse::<bool>()
                .with_context(|| format!("ENABLE_LCC_PLACEHOLDERS: invalid bool '{v}'"))?,
            Err(_) => true,
        };
        let search_timeout_ms = match std::env::var("SEARCH_TIMEOUT_MS") {
            Ok(v) => Some(
                v.parse::<u64>()
                    .with_context(|| format!("SEARCH_TIMEOUT_MS: invalid integer '{v}'"))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            amadeus,
            sabre,
            travelport,
            enable_lcc_placeholders,
            search_timeout_ms,
            cache: None,
        })
    }
}

fn rest_from_env(
    base_url: &str,
    client_id: &str,
    client_secret: &str,
    token_url: &str,
) -> Result<Option<RestSupplierConfig>> {
    let vars = [base_url, client_id, client_secret, token_url];
    let values: Vec<Option<String>> = vars.iter().map(|v| std::env::var(v).ok()).collect();
    if values.iter().all(Option::is_none) {
        return Ok(None);
    }
    if values.iter().any(Option::is_none) {
        bail!("incomplete supplier configuration: expected all of {vars:?}");
    }
    let mut values = values.into_iter().map(Option::unwrap);
    Ok(Some(RestSupplierConfig {
        base_url: values.next().expect("checked"),
        oauth: OAuthCredentials {
            client_id: values.next().expect("checked"),
            client_secret: values.next().expect("checked"),
            token_url: values.next().expect("checked"),
        },
    }))
}

fn soap_from_env(
    endpoint: &str,
    username: &str,
    password: &str,
    target_branch: &str,
) -> Result<Option<SoapSupplierConfig>> {
    let vars = [endpoint, username, password, target_branch];
    let values: Vec<Option<String>> = vars.iter().map(|v| std::env::var(v).ok()).collect();
    if values.iter().all(Option::is_none) {
        return Ok(None);
    }
    if values.iter().any(Option::is_none) {
        bail!("incomplete supplier configuration: expected all of {vars:?}");
    }
    let mut values = values.into_iter().map(Option::unwrap);
    Ok(Some(SoapSupplierConfig {
        endpoint: values.next().expect("checked"),
        username: values.next().expect("checked"),
        password: values.next().expect("checked"),
        target_branch: values.next().expect("checked"),
    }))
}
