use std::time::Duration;

use reqwest::{
    header::{ACCEPT, AUTHORIZATION},
    Client,
};
use url::Url;

use crate::error::Error;

/// Raw HTTP exchange result, before any status or body interpretation.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Minimal outbound HTTP seam. The fetcher only ever issues authenticated
/// GETs, so that is the whole contract; tests script responses through it.
#[allow(async_fn_in_trait)]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: Url,
        auth_header: &str,
    ) -> Result<RawResponse, Error>;
}

/// Production transport over a shared reqwest client.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout_secs: u64) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    async fn get(
        &self,
        url: Url,
        auth_header: &str,
    ) -> Result<RawResponse, Error> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, auth_header)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(RawResponse { status, body })
    }
}

/// Scripted transport for tests: responses are consumed in order and every
/// requested URL is recorded.
#[cfg(test)]
pub struct MockTransport {
    responses: std::sync::Mutex<
        std::collections::VecDeque<Result<RawResponse, Error>>,
    >,
    requests: std::sync::Mutex<Vec<Url>>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            responses: std::sync::Mutex::new(
                std::collections::VecDeque::new(),
            ),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn push_body(&self, body: &str) {
        self.push_response(200, body);
    }

    pub fn push_response(&self, status: u16, body: &str) {
        self.responses.lock().unwrap().push_back(Ok(RawResponse {
            status,
            body: body.to_owned(),
        }));
    }

    pub fn push_error(&self, error: Error) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request_urls(&self) -> Vec<Url> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Transport for MockTransport {
    async fn get(
        &self,
        url: Url,
        _auth_header: &str,
    ) -> Result<RawResponse, Error> {
        self.requests.lock().unwrap().push(url);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(Error::Transport("no scripted response".to_owned()))
            })
    }
}
