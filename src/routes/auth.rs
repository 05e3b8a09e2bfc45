// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth redirect capture.
//!
//! The listener serves exactly one meaningful interaction per run: the first
//! callback takes the outcome channel and drives the whole fetch pipeline
//! before the browser gets its response. Later callbacks are answered but
//! never signalled onward.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::sync::oneshot;

use crate::error::AppError;
use crate::services::ingest::{self, RunReport};
use crate::{AppState, ListenerState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(auth_callback))
}

/// Query parameters of the provider redirect.
#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange the code and run the full ingestion pipeline.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    // Take the outcome channel; only the first callback gets it.
    let Some(outcome_tx) = state.listener.lock().await.try_begin() else {
        tracing::warn!("Ignoring extra callback; this run already consumed one");
        return (
            StatusCode::CONFLICT,
            Html(failure_page(
                "This authorization has already been handled.",
            )),
        )
            .into_response();
    };

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "Provider redirected back with an error");
        let err = AppError::CallbackDenied(error);
        let response = error_response(&err);
        finish(&state, outcome_tx, Err(err)).await;
        return response;
    }

    let Some(code) = params.code else {
        tracing::warn!("Callback arrived without a code parameter");
        let err = AppError::CallbackMissingCode;
        let response = error_response(&err);
        finish(&state, outcome_tx, Err(err)).await;
        return response;
    };

    tracing::info!("Authorization code received, exchanging for tokens");

    match ingest::process_code(&state, &code).await {
        Ok(report) => {
            let response = success_response(&report);
            finish(&state, outcome_tx, Ok(report)).await;
            response
        }
        Err(err) => {
            tracing::error!(error = %err, "Ingestion failed after callback");
            let response = error_response(&err);
            finish(&state, outcome_tx, Err(err)).await;
            response
        }
    }
}

/// Hand the outcome to the waiting orchestrator and close the gate.
async fn finish(
    state: &AppState,
    outcome_tx: oneshot::Sender<Result<RunReport, AppError>>,
    outcome: Result<RunReport, AppError>,
) {
    // The orchestrator may already be gone (timeout or interrupt).
    let _ = outcome_tx.send(outcome);
    *state.listener.lock().await = ListenerState::Done;
}

fn success_response(report: &RunReport) -> Response {
    let detail = if report.is_partial() {
        format!(
            "Fetched {} activities before an error stopped pagination; \
             a partial export was saved. Check the terminal for details.",
            report.total
        )
    } else {
        format!("{} activities exported.", report.total)
    };

    let body = format!(
        r#"<html>
<body>
<h2>Authorization successful!</h2>
<p>{detail} You can close this window.</p>
<script>setTimeout(() => window.close(), 3000);</script>
</body>
</html>"#
    );

    (StatusCode::OK, Html(body)).into_response()
}

fn error_response(err: &AppError) -> Response {
    // Keep provider output out of the page; details go to the terminal.
    let message = match err {
        AppError::CallbackMissingCode => "No authorization code received.",
        AppError::CallbackDenied(_) => "Authorization was denied.",
        _ => "Authorization failed. Check the terminal output for details.",
    };
    (err.status_code(), Html(failure_page(message))).into_response()
}

fn failure_page(message: &str) -> String {
    format!(
        r#"<html>
<body>
<h2>Authorization failed</h2>
<p>{message}</p>
</body>
</html>"#
    )
}
