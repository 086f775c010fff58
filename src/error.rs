use actix_web::ResponseError;
use anyhow::Error as ANYHOW_ERROR;
use reqwest::Error as REQWEST_ERROR;
use serde_json::Error as JSON_ERROR;
use std::{env::VarError, io::Error as IO_ERROR, num::ParseIntError};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::subscriber::SetGlobalDefaultError as TRACING_GLOBAL_DEFAULT_ERROR;
use url::ParseError as URL_ERROR;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] IO_ERROR),

    #[error("{0}")]
    URL(#[from] URL_ERROR),

    #[error("{0}")]
    INT(#[from] ParseIntError),

    #[error("{0}")]
    VAR(#[from] VarError),

    #[error("{0}")]
    TokioJoinError(#[from] JoinError),

    #[error("{0}")]
    JsonError(#[from] JSON_ERROR),

    #[error("{0}")]
    ReqwestError(#[from] REQWEST_ERROR),

    #[error("Tracing error: {0}")]
    SetGlobalDefaultError(#[from] TRACING_GLOBAL_DEFAULT_ERROR),

    #[error("{0}")]
    AnyHowError(#[from] ANYHOW_ERROR),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("API credentials not configured")]
    NotConfigured,

    #[error("API rate limited (status 429)")]
    RateLimited,

    #[error("API returned status {status}")]
    Api { status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid JSON response: {0}")]
    InvalidResponse(String),

    #[error("Request failsafe exceeded: {0} API calls in one cycle")]
    MaxRequestsExceeded(u32),

    #[error("Live fetch skipped: no cached value in interactive context")]
    Skipped,

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),
}

impl ResponseError for Error {}
