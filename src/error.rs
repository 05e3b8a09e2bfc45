// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types for the ingestion run.
//!
//! Errors before a token exists terminate the run; errors during pagination
//! are downgraded to partial success by the fetcher, which reports them
//! alongside whatever it already collected.

use axum::http::StatusCode;

/// Application error type covering every failure mode of an ingestion run.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The OAuth redirect arrived without an authorization code.
    #[error("Authorization callback did not include a code")]
    CallbackMissingCode,

    /// The provider redirected back with an explicit error instead of a code.
    #[error("Authorization was denied: {0}")]
    CallbackDenied(String),

    #[error("No authorization callback received within {0} seconds")]
    CallbackTimeout(u64),

    /// The token endpoint rejected the exchange. The code was consumed by
    /// the attempt and must not be retried.
    #[error("Token exchange failed with status {status}: {body}")]
    AuthExchange { status: StatusCode, body: String },

    #[error("Athlete lookup failed with status {status}: {body}")]
    AthleteFetch { status: StatusCode, body: String },

    #[error("Transport error talking to Strava: {0}")]
    Transport(#[from] reqwest::Error),

    /// An HTTP error mid-pagination. The fetcher stops and keeps the pages
    /// collected so far.
    #[error("Activity page {page} failed with status {status}: {body}")]
    PageFetch {
        page: u32,
        status: StatusCode,
        body: String,
    },

    /// Defensive cap: the provider kept returning full pages long past any
    /// plausible account size.
    #[error("Gave up after {0} pages without seeing a short page")]
    PageLimit(u32),

    #[error("Failed to bind local port {port}: {source}")]
    Bind { port: u16, source: std::io::Error },

    #[error("Run interrupted")]
    Interrupted,

    #[error("Failed to write activity export: {0}")]
    Export(#[from] std::io::Error),

    #[error("Failed to encode activity export: {0}")]
    ExportEncode(#[from] serde_json::Error),
}

impl AppError {
    /// HTTP status the callback listener answers with for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::CallbackMissingCode | AppError::CallbackDenied(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::AuthExchange { .. }
            | AppError::AthleteFetch { .. }
            | AppError::Transport(_)
            | AppError::PageFetch { .. }
            | AppError::PageLimit(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
