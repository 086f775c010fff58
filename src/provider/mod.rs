pub use self::{
    http::{
        FetchCycle, LeadsApi, LEADS_PER_PAGE, MAX_PAGES_PER_WINDOW,
        MAX_REQUESTS_PER_CYCLE, MAX_WINDOW_CHUNKS,
    },
    transport::{HttpTransport, RawResponse, Transport},
};

#[cfg(test)]
pub use self::transport::MockTransport;

mod http;
mod transport;
