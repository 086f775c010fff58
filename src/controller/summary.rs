use actix_web::{get, web, Responder};
use serde::Deserialize;

use crate::{
    configuration::{AppState, State},
    error::Error,
    metrics::FetchContext,
    provider::FetchCycle,
};

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    account_id: Option<String>,
    months: Option<String>,
    preview: Option<bool>,
}

/// Full metrics summary for one `(account, window)` pair. Unlike the
/// single-metric surface, errors map to HTTP error responses here.
#[get("/summary")]
pub async fn index(
    state: web::Data<AppState<State>>,
    query: web::Query<SummaryQuery>,
) -> Result<impl Responder, Error> {
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

    let mut cycle = FetchCycle::new();
    let summary = state
        .metrics
        .get_summary(account, window, false, ctx, &mut cycle)
        .await?;

    Ok(web::Json(summary))
}
