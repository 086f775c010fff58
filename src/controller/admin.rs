//! Admin API endpoints
//!
//! Protected endpoints for cache maintenance and credential checks. All of
//! them require the configured admin token; unauthorized calls get
//! `{"result": false}`.

use actix_web::{get, web, Responder};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    configuration::{AppState, State},
    error::Error,
    metrics::FetchContext,
    provider::FetchCycle,
};

#[derive(Debug, Deserialize)]
pub struct AdminQuery {
    auth: Option<String>,
    account_id: Option<String>,
    months: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminResponse {
    pub result: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn authorized(
    state: &AppState<State>,
    query: &AdminQuery,
) -> Result<bool, Error> {
    let auth = query.auth.to_owned().context("Auth is required")?;
    Ok(auth == state.config.auth)
}

#[get("/admin/clear-cache")]
pub async fn clear_cache(
    state: web::Data<AppState<State>>,
    query: web::Query<AdminQuery>,
) -> Result<impl Responder, Error> {
    if !authorized(&state, &query)? {
        return Ok(web::Json(AdminResponse {
            result: false,
            error: None,
        }));
    }

    state.metrics.clear_cache(query.account_id.as_deref()).await;
    info!(
        "cleared cached summaries for account={}",
        query.account_id.as_deref().unwrap_or("all")
    );

    Ok(web::Json(AdminResponse {
        result: true,
        error: None,
    }))
}

#[get("/admin/clear-all")]
pub async fn clear_all(
    state: web::Data<AppState<State>>,
    query: web::Query<AdminQuery>,
) -> Result<impl Responder, Error> {
    if !authorized(&state, &query)? {
        return Ok(web::Json(AdminResponse {
            result: false,
            error: None,
        }));
    }

    state.metrics.clear_all().await;
    info!("cleared the whole metrics cache namespace");

    Ok(web::Json(AdminResponse {
        result: true,
        error: None,
    }))
}

#[get("/admin/test-connection")]
pub async fn test_connection(
    state: web::Data<AppState<State>>,
    query: web::Query<AdminQuery>,
) -> Result<impl Responder, Error> {
    if !authorized(&state, &query)? {
        return Ok(web::Json(AdminResponse {
            result: false,
            error: None,
        }));
    }

    let mut cycle = FetchCycle::new();
    let response = match state.metrics.test_connection(&mut cycle).await {
        Ok(()) => AdminResponse {
            result: true,
            error: None,
        },
        Err(e) => AdminResponse {
            result: false,
            error: Some(e.to_string()),
        },
    };

    Ok(web::Json(response))
}

/// Forced recalculation for one `(account, window)` pair, bypassing a
/// populated cache entry and overwriting it.
#[get("/admin/refresh")]
pub async fn refresh(
    state: web::Data<AppState<State>>,
    query: web::Query<AdminQuery>,
) -> Result<impl Responder, Error> {
    if !authorized(&state, &query)? {
        return Ok(web::Json(serde_json::to_value(AdminResponse {
            result: false,
            error: None,
        })?));
    }

    let window = query.months.as_deref().unwrap_or("12");
    let mut cycle = FetchCycle::new();
    let summary = state
        .metrics
        .get_summary(
            query.account_id.as_deref(),
            window,
            true,
            FetchContext::Live,
            &mut cycle,
        )
        .await?;

    Ok(web::Json(serde_json::to_value(summary)?))
}
