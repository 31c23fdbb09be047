// Connector-level error taxonomy. Everything a supplier backend can do wrong
// normalizes to one of these; the orchestrator treats any of them as a
// supplier-scoped failure, never a global one.

use crate::model::SupplierType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("malformed supplier response: {0}")]
    MalformedResponse(String),

    #[error("supplier API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("JSON parse error: {0}")]
    Json(String),

    #[error("{0} integration not available: commercial partnership required")]
    CapabilityUnavailable(SupplierType),
}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured timeout value.
            ConnectorError::Timeout(0)
        } else if let Some(status) = err.status() {
            ConnectorError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ConnectorError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(err: serde_json::Error) -> Self {
        ConnectorError::Json(err.to_string())
    }
}
