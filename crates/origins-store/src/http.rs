use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, LOCATION};
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::protocol::{BatchRequest, BatchResponse};
use crate::transport::{Transport, TransportResponse};

/// Transport speaking the transactional HTTP endpoint of a graph store.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post(&self, url: &str, request: &BatchRequest) -> StoreResult<TransportResponse> {
        debug!(url, statements = request.statements.len(), "posting batch");
        let response = self
            .client
            .post(url)
            .header(ACCEPT, "application/json; charset=UTF-8")
            .json(request)
            .send()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: BatchResponse = response
            .json()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(TransportResponse { location, body })
    }

    fn delete(&self, url: &str) -> StoreResult<()> {
        debug!(url, "rolling back transaction");
        let response = self
            .client
            .delete(url)
            .header(ACCEPT, "application/json; charset=UTF-8")
            .send()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(StoreError::Http {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            })
        }
    }
}
