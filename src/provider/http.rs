use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{Months, NaiveDate, Utc};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::Error,
    model::{LeadRecord, LeadsPage},
    provider::transport::Transport,
};

/// Maximum page size the upstream API accepts.
pub const LEADS_PER_PAGE: u32 = 2500;

/// Hard bound on pages per window, against runaway pagination from a
/// malformed `total_pages`.
pub const MAX_PAGES_PER_WINDOW: u32 = 100;

/// Hard bound on API calls within one request cycle.
pub const MAX_REQUESTS_PER_CYCLE: u32 = 25;

/// An unbounded window is fetched as sliding 12-month chunks, at most this
/// many (roughly ten years of history).
pub const MAX_WINDOW_CHUNKS: u32 = 10;

const RATE_LIMIT_RETRIES: u32 = 3;

/// Per-invocation counter of issued API calls. Constructed fresh for every
/// inbound request or prewarm target and threaded through the fetch chain,
/// never shared across cycles.
#[derive(Debug)]
pub struct FetchCycle {
    requests: u32,
    limit: u32,
}

impl FetchCycle {
    pub fn new() -> Self {
        FetchCycle {
            requests: 0,
            limit: MAX_REQUESTS_PER_CYCLE,
        }
    }

    #[cfg(test)]
    pub fn with_limit(limit: u32) -> Self {
        FetchCycle { requests: 0, limit }
    }

    /// Count one outgoing request against the cycle budget.
    pub fn register(&mut self) -> Result<(), Error> {
        self.requests += 1;
        if self.requests > self.limit {
            return Err(Error::MaxRequestsExceeded(self.requests));
        }
        Ok(())
    }

    pub fn requests_issued(&self) -> u32 {
        self.requests
    }
}

impl Default for FetchCycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Paginated, retrying client for the upstream `/leads` endpoint.
#[derive(Debug)]
pub struct LeadsApi<T> {
    transport: T,
    base_url: String,
    token: String,
    secret: String,
    auth_header: String,
}

impl<T: Transport> LeadsApi<T> {
    pub fn new(
        transport: T,
        base_url: &str,
        token: &str,
        secret: &str,
    ) -> Self {
        let auth_header = format!(
            "Basic {}",
            BASE64.encode(format!("{}:{}", token, secret))
        );
        LeadsApi {
            transport,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: token.to_owned(),
            secret: secret.to_owned(),
            auth_header,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.token.is_empty() && !self.secret.is_empty()
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch every lead for the given account scope and window selector.
    ///
    /// The window selector is expected sanitized ("1"/"3"/"6"/"12"/"all").
    /// "all" walks backwards in 12-month chunks until a chunk comes back
    /// empty or the chunk cap is reached; any other selector is a single
    /// `[now - N months, now]` window.
    pub async fn fetch_leads(
        &self,
        account: Option<&str>,
        window: &str,
        cycle: &mut FetchCycle,
    ) -> Result<Vec<LeadRecord>, Error> {
        if !self.is_configured() {
            return Err(Error::NotConfigured);
        }

        let today = Utc::now().date_naive();

        if window == "all" {
            let mut all_leads = Vec::new();
            let mut end = today;

            for chunk in 0..MAX_WINDOW_CHUNKS {
                let start = match end.checked_sub_months(Months::new(12)) {
                    Some(date) => date,
                    None => break,
                };
                let leads =
                    self.fetch_window(account, start, end, cycle).await?;
                if leads.is_empty() {
                    debug!(
                        "empty chunk {} ending {}, stopping history walk",
                        chunk, end
                    );
                    break;
                }
                all_leads.extend(leads);
                end = start;
            }

            return Ok(all_leads);
        }

        let months: u32 = window.parse()?;
        let start = today
            .checked_sub_months(Months::new(months))
            .unwrap_or(today);
        self.fetch_window(account, start, today, cycle).await
    }

    /// Single-probe credential check: one request for one lead.
    pub async fn test_connection(
        &self,
        cycle: &mut FetchCycle,
    ) -> Result<(), Error> {
        if !self.is_configured() {
            return Err(Error::NotConfigured);
        }

        let mut url = Url::parse(&format!("{}/leads", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("leads_per_page", "1")
            .append_pair("page_number", "1");

        self.request_with_retry(url, cycle).await.map(|_| ())
    }

    async fn fetch_window(
        &self,
        account: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
        cycle: &mut FetchCycle,
    ) -> Result<Vec<LeadRecord>, Error> {
        let mut leads = Vec::new();
        let mut page = 1;
        let mut total_pages = 1;

        while page <= total_pages && page <= MAX_PAGES_PER_WINDOW {
            let url = self.leads_url(account, start, end, page)?;
            let body = self.request_with_retry(url, cycle).await?;

            let parsed: LeadsPage = serde_json::from_str(&body)
                .map_err(|e| Error::InvalidResponse(e.to_string()))?;

            leads.extend(parsed.leads);
            total_pages = parsed.total_pages;
            page += 1;
        }

        Ok(leads)
    }

    fn leads_url(
        &self,
        account: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
        page: u32,
    ) -> Result<Url, Error> {
        let mut url = Url::parse(&format!("{}/leads", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("leads_per_page", &LEADS_PER_PAGE.to_string())
            .append_pair("page_number", &page.to_string())
            .append_pair(
                "start_date",
                &start.format("%Y-%m-%d").to_string(),
            )
            .append_pair("end_date", &end.format("%Y-%m-%d").to_string());
        if let Some(id) = account {
            url.query_pairs_mut().append_pair("account_id", id);
        }
        Ok(url)
    }

    /// Issue one request, retrying only on rate limiting. Explicit loop with
    /// a bounded counter; every attempt counts against the cycle budget.
    async fn request_with_retry(
        &self,
        url: Url,
        cycle: &mut FetchCycle,
    ) -> Result<String, Error> {
        let mut retries = 0;

        loop {
            match self.request_once(&url, cycle).await {
                Ok(body) => return Ok(body),
                Err(Error::RateLimited) if retries < RATE_LIMIT_RETRIES => {
                    retries += 1;
                    // 2s, 4s, 8s
                    let delay = Duration::from_secs(1u64 << retries);
                    warn!(
                        "rate limited by API, retry {}/{} in {:?}",
                        retries, RATE_LIMIT_RETRIES, delay
                    );
                    tokio::time::sleep(delay).await;
                },
                Err(Error::RateLimited) => {
                    return Err(Error::Api { status: 429 })
                },
                Err(e) => return Err(e),
            }
        }
    }

    async fn request_once(
        &self,
        url: &Url,
        cycle: &mut FetchCycle,
    ) -> Result<String, Error> {
        cycle.register()?;
        debug!(
            "GET {} (request {} this cycle)",
            url,
            cycle.requests_issued()
        );

        let response =
            self.transport.get(url.clone(), &self.auth_header).await?;

        match response.status {
            200 => Ok(response.body),
            429 => Err(Error::RateLimited),
            status => Err(Error::Api { status }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::transport::MockTransport;
    use std::collections::HashMap;

    const BASE: &str = "https://api.example.com/v1";

    fn api(transport: MockTransport) -> LeadsApi<MockTransport> {
        LeadsApi::new(transport, BASE, "token", "secret")
    }

    fn page_body(lead_count: usize, total_pages: u32) -> String {
        let leads: Vec<&str> = std::iter::repeat(r#"{"quotable":"yes"}"#)
            .take(lead_count)
            .collect();
        format!(
            r#"{{"leads":[{}],"total_pages":{}}}"#,
            leads.join(","),
            total_pages
        )
    }

    fn query_map(url: &Url) -> HashMap<String, String> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_request() {
        let api = LeadsApi::new(MockTransport::new(), BASE, "token", "");
        let mut cycle = FetchCycle::new();

        let result = api.fetch_leads(None, "12", &mut cycle).await;

        assert!(matches!(result, Err(Error::NotConfigured)));
        assert_eq!(cycle.requests_issued(), 0);
    }

    #[tokio::test]
    async fn single_window_merges_all_pages() {
        let transport = MockTransport::new();
        transport.push_body(&page_body(2, 2));
        transport.push_body(&page_body(1, 2));
        let api = api(transport);
        let mut cycle = FetchCycle::new();

        let leads = api.fetch_leads(None, "3", &mut cycle).await.unwrap();

        assert_eq!(leads.len(), 3);
        let urls = api.transport.request_urls();
        assert_eq!(urls.len(), 2);
        assert_eq!(query_map(&urls[0])["page_number"], "1");
        assert_eq!(query_map(&urls[0])["leads_per_page"], "2500");
        assert_eq!(query_map(&urls[1])["page_number"], "2");
    }

    #[tokio::test]
    async fn window_dates_span_requested_months() {
        let transport = MockTransport::new();
        transport.push_body(&page_body(0, 1));
        let api = api(transport);
        let mut cycle = FetchCycle::new();

        api.fetch_leads(Some("4821"), "6", &mut cycle).await.unwrap();

        let urls = api.transport.request_urls();
        let params = query_map(&urls[0]);
        let today = Utc::now().date_naive();
        let expected_start =
            today.checked_sub_months(Months::new(6)).unwrap();
        assert_eq!(params["end_date"], today.format("%Y-%m-%d").to_string());
        assert_eq!(
            params["start_date"],
            expected_start.format("%Y-%m-%d").to_string()
        );
        assert_eq!(params["account_id"], "4821");
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let transport = MockTransport::new();
        transport.push_body("<html>gateway timeout</html>");
        let api = api(transport);
        let mut cycle = FetchCycle::new();

        let result = api.fetch_leads(None, "12", &mut cycle).await;

        assert!(matches!(result, Err(Error::InvalidResponse(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limiting_retries_with_backoff_then_succeeds() {
        let transport = MockTransport::new();
        transport.push_response(429, "");
        transport.push_response(429, "");
        transport.push_body(&page_body(1, 1));
        let api = api(transport);
        let mut cycle = FetchCycle::new();

        let started = tokio::time::Instant::now();
        let leads = api.fetch_leads(None, "12", &mut cycle).await.unwrap();

        assert_eq!(leads.len(), 1);
        assert_eq!(api.transport.request_count(), 3);
        assert_eq!(cycle.requests_issued(), 3);
        // 2s + 4s of backoff
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_rate_limiting_becomes_api_error() {
        let transport = MockTransport::new();
        for _ in 0..4 {
            transport.push_response(429, "");
        }
        let api = api(transport);
        let mut cycle = FetchCycle::new();

        let result = api.fetch_leads(None, "12", &mut cycle).await;

        assert!(matches!(result, Err(Error::Api { status: 429 })));
        // initial attempt + 3 retries
        assert_eq!(api.transport.request_count(), 4);
    }

    #[tokio::test]
    async fn other_statuses_are_terminal_without_retry() {
        let transport = MockTransport::new();
        transport.push_response(500, "");
        let api = api(transport);
        let mut cycle = FetchCycle::new();

        let result = api.fetch_leads(None, "12", &mut cycle).await;

        assert!(matches!(result, Err(Error::Api { status: 500 })));
        assert_eq!(api.transport.request_count(), 1);
    }

    #[tokio::test]
    async fn transport_failures_propagate_without_retry() {
        let transport = MockTransport::new();
        transport.push_error(Error::Transport("connection refused".into()));
        let api = api(transport);
        let mut cycle = FetchCycle::new();

        let result = api.fetch_leads(None, "12", &mut cycle).await;

        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(api.transport.request_count(), 1);
    }

    #[tokio::test]
    async fn request_cap_aborts_mid_cycle() {
        let transport = MockTransport::new();
        // Upstream keeps claiming more pages; the cycle budget must stop us.
        for _ in 0..MAX_REQUESTS_PER_CYCLE {
            transport.push_body(&page_body(1, 100));
        }
        let api = api(transport);
        let mut cycle = FetchCycle::new();

        let result = api.fetch_leads(None, "12", &mut cycle).await;

        assert!(matches!(result, Err(Error::MaxRequestsExceeded(_))));
        assert_eq!(
            api.transport.request_count() as u32,
            MAX_REQUESTS_PER_CYCLE
        );
    }

    #[tokio::test]
    async fn page_cap_bounds_runaway_pagination() {
        let transport = MockTransport::new();
        for _ in 0..MAX_PAGES_PER_WINDOW {
            transport.push_body(&page_body(1, 500));
        }
        let api = api(transport);
        let mut cycle = FetchCycle::with_limit(1000);

        let leads = api.fetch_leads(None, "12", &mut cycle).await.unwrap();

        assert_eq!(leads.len(), MAX_PAGES_PER_WINDOW as usize);
        assert_eq!(
            api.transport.request_count() as u32,
            MAX_PAGES_PER_WINDOW
        );
    }

    #[tokio::test]
    async fn unbounded_window_walks_chunks_until_empty() {
        let transport = MockTransport::new();
        transport.push_body(&page_body(2, 1));
        transport.push_body(&page_body(1, 1));
        transport.push_body(&page_body(0, 1));
        let api = api(transport);
        let mut cycle = FetchCycle::new();

        let leads = api.fetch_leads(None, "all", &mut cycle).await.unwrap();

        assert_eq!(leads.len(), 3);
        assert_eq!(api.transport.request_count(), 3);

        // Each chunk's end date is the previous chunk's start date.
        let urls = api.transport.request_urls();
        let first = query_map(&urls[0]);
        let second = query_map(&urls[1]);
        assert_eq!(second["end_date"], first["start_date"]);
    }

    #[tokio::test]
    async fn unbounded_window_stops_at_chunk_cap() {
        let transport = MockTransport::new();
        for _ in 0..MAX_WINDOW_CHUNKS {
            transport.push_body(&page_body(1, 1));
        }
        let api = api(transport);
        let mut cycle = FetchCycle::with_limit(1000);

        let leads = api.fetch_leads(None, "all", &mut cycle).await.unwrap();

        assert_eq!(leads.len(), MAX_WINDOW_CHUNKS as usize);
        assert_eq!(
            api.transport.request_count() as u32,
            MAX_WINDOW_CHUNKS
        );
    }

    #[tokio::test]
    async fn test_connection_issues_single_probe() {
        let transport = MockTransport::new();
        transport.push_body(&page_body(1, 1));
        let api = api(transport);
        let mut cycle = FetchCycle::new();

        api.test_connection(&mut cycle).await.unwrap();

        let urls = api.transport.request_urls();
        assert_eq!(urls.len(), 1);
        assert_eq!(query_map(&urls[0])["leads_per_page"], "1");
    }
}
