use async_trait::async_trait;
use serde_json::Value;

use vela_core::provider::ProviderError;

/// One request to an upstream flight-data source. Adapters build these;
/// the gateway owns transport and authentication.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl GatewayRequest {
    pub fn get(path: &str) -> Self {
        Self {
            path: path.to_string(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: &str, body: Value) -> Self {
        Self {
            path: path.to_string(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("Upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Network timeout")]
    Timeout,
    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Transport seam between an adapter and its upstream source. Injected so
/// adapters stay testable without a network.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    async fn fetch(&self, request: GatewayRequest) -> Result<Value, GatewayError>;
}

/// Map a transport failure onto the provider error taxonomy. 429 and
/// 5xx-class statuses are transient upstream trouble; other 4xx statuses
/// mean the request itself was refused.
pub fn classify(provider: &str, error: GatewayError) -> ProviderError {
    match error {
        GatewayError::Status { status, body } if status == 429 || status >= 500 => {
            ProviderError::Unavailable {
                provider: provider.to_string(),
                reason: format!("status {}: {}", status, body),
            }
        }
        GatewayError::Status { status, body } => ProviderError::Rejected {
            provider: provider.to_string(),
            status,
            reason: body,
        },
        GatewayError::Timeout => ProviderError::Timeout {
            provider: provider.to_string(),
        },
        GatewayError::Connection(reason) => ProviderError::Unavailable {
            provider: provider.to_string(),
            reason,
        },
    }
}
