//! Simulation server adapter.
//!
//! [`SimulationServer`] is the seam between the session loop and the
//! network.  [`HttpServer`] talks to the real server; tests substitute an
//! in-memory implementation.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use crate::error::ClientResult;
use crate::protocol::{endpoints, parse_state, parse_step_ack, StateSnapshot, StepAck};

pub trait SimulationServer: Send + Sync {
    /// Ask the server to compute the next step.
    fn advance(&self) -> impl Future<Output = ClientResult<StepAck>> + Send;

    /// Fetch the full current state.
    fn fetch_state(&self) -> impl Future<Output = ClientResult<StateSnapshot>> + Send;
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

pub struct HttpServer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpServer {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Body of a successful response.  Non-2xx statuses are transport errors.
    async fn body(request: reqwest::RequestBuilder) -> ClientResult<Bytes> {
        let response = request.send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }
}

impl SimulationServer for HttpServer {
    async fn advance(&self) -> ClientResult<StepAck> {
        let body = Self::body(self.client.post(self.url(endpoints::STEP))).await?;
        let ack = parse_step_ack(&body)?;
        log::debug!("POST {} -> {:?}", endpoints::STEP, ack);
        Ok(ack)
    }

    async fn fetch_state(&self) -> ClientResult<StateSnapshot> {
        let body = Self::body(self.client.get(self.url(endpoints::STATE))).await?;
        log::debug!("GET {} -> {} bytes", endpoints::STATE, body.len());
        parse_state(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let s = HttpServer::new("http://localhost:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(s.base_url(), "http://localhost:5000");
        assert_eq!(s.url(endpoints::STATE), "http://localhost:5000/state");
    }
}
