//! Consumer-facing metric query surface.
//!
//! One metric per request, always HTTP 200: consumers rendering widgets get
//! `{"value": null}` on any failure instead of raw error text. Privileged
//! callers can request diagnostic details with `debug=true` and the admin
//! token.

use actix_web::{get, web, Responder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    configuration::{AppState, State},
    error::Error,
    metrics::FetchContext,
    model::MetricName,
    provider::FetchCycle,
};

#[derive(Debug, Deserialize)]
pub struct MetricQuery {
    account_id: Option<String>,
    months: Option<String>,
    preview: Option<bool>,
    debug: Option<bool>,
    auth: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MetricResponse {
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<MetricDebug>,
}

#[derive(Debug, Serialize)]
pub struct MetricDebug {
    pub error: String,
    pub requests_issued: u32,
}

#[get("/metric/{name}")]
pub async fn index(
    state: web::Data<AppState<State>>,
    path: web::Path<String>,
    query: web::Query<MetricQuery>,
) -> Result<impl Responder, Error> {
    let name = path.into_inner();

    // Explicit account selector wins over the configured static scope.
    let account = query
        .account_id
        .as_deref()
        .or(state.config.account_id.as_deref());
    let window = query.months.as_deref().unwrap_or("12");
    let ctx = if query.preview.unwrap_or(false) {
        FetchContext::Interactive
    } else {
        FetchContext::Live
    };
    let debug_authorized = query.debug.unwrap_or(false)
        && query.auth.as_deref() == Some(state.config.auth.as_str());

    let mut cycle = FetchCycle::new();

    let result = match MetricName::parse(&name) {
        Ok(metric) => state
            .metrics
            .get_summary(account, window, false, ctx, &mut cycle)
            .await
            .map(|summary| metric.pick(&summary)),
        Err(e) => Err(e),
    };

    let response = match result {
        Ok(value) => MetricResponse { value, debug: None },
        Err(e) => {
            match &e {
                Error::Skipped => {
                    debug!("metric {} skipped: cold cache in preview", name)
                },
                other => warn!("metric {} failed: {}", name, other),
            }
            MetricResponse {
                value: Value::Null,
                debug: debug_authorized.then(|| MetricDebug {
                    error: e.to_string(),
                    requests_issued: cycle.requests_issued(),
                }),
            }
        },
    };

    Ok(web::Json(response))
}
