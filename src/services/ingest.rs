// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end ingestion run: authorize, capture the callback, drain and
//! export activities.
//!
//! The run suspends at exactly two points: waiting for the OAuth redirect
//! (bounded by the configurable timeout) and inside each page request. The
//! callback port is held for the run's duration and released on every exit
//! path before `wait_for_callback` returns.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

use crate::config::Config;
use crate::error::AppError;
use crate::models::summarize_by_category;
use crate::routes;
use crate::services::export::JsonExportSink;
use crate::services::strava::{FetchReport, StravaClient};
use crate::{AppState, CancelFlag, ListenerState};

/// Outcome of one ingestion run, handed back to the operator.
#[derive(Debug)]
pub struct RunReport {
    pub athlete_label: String,
    pub export_path: PathBuf,
    pub total: usize,
    /// Per-category counts, most frequent first.
    pub by_category: Vec<(String, usize)>,
    /// Set when pagination aborted early. The export still holds everything
    /// fetched before the abort.
    pub pagination_error: Option<AppError>,
}

impl RunReport {
    pub fn is_partial(&self) -> bool {
        self.pagination_error.is_some()
    }
}

/// A bound ingestion run, ready to accept the OAuth redirect.
#[derive(Debug)]
pub struct Ingestor {
    state: Arc<AppState>,
    listener: TcpListener,
    local_addr: SocketAddr,
    outcome_rx: oneshot::Receiver<Result<RunReport, AppError>>,
}

/// Bind the callback listener and prepare a run.
///
/// Binding happens before any network activity, so a second concurrent run
/// fails fast on the held port instead of fighting over the redirect.
pub async fn bind(mut config: Config, strava: StravaClient) -> Result<Ingestor, AppError> {
    let addr = format!("127.0.0.1:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| AppError::Bind {
            port: config.port,
            source,
        })?;
    let local_addr = listener.local_addr().map_err(|source| AppError::Bind {
        port: config.port,
        source,
    })?;
    // With PORT=0 the OS picks the port; the redirect URI must match it.
    config.port = local_addr.port();

    let (outcome_tx, outcome_rx) = oneshot::channel();
    let sink = JsonExportSink::new(config.export_dir.clone());
    let state = Arc::new(AppState {
        config,
        strava,
        sink,
        listener: Mutex::new(ListenerState::Listening(outcome_tx)),
        cancel: CancelFlag::new(),
    });

    Ok(Ingestor {
        state,
        listener,
        local_addr,
        outcome_rx,
    })
}

impl Ingestor {
    /// Address the listener actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Strava authorization URL the operator must visit.
    ///
    /// `approval_prompt=force` re-prompts even for already-authorized apps,
    /// so a run never stalls on a silently-skipped consent screen.
    pub fn authorize_url(&self) -> String {
        let config = &self.state.config;
        format!(
            "https://www.strava.com/oauth/authorize?\
             client_id={}&\
             response_type=code&\
             redirect_uri={}&\
             approval_prompt=force&\
             scope={}",
            config.strava_client_id,
            urlencoding::encode(&config.redirect_uri()),
            urlencoding::encode("read,activity:read_all"),
        )
    }

    /// Serve the listener until the single callback is processed end-to-end,
    /// the configured timeout elapses, or the process is interrupted.
    pub async fn wait_for_callback(self) -> Result<RunReport, AppError> {
        let Ingestor {
            state,
            listener,
            local_addr,
            outcome_rx,
        } = self;

        tracing::info!(address = %local_addr, "Callback listener ready");

        let app = routes::create_router(state.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let timeout_secs = state.config.callback_timeout_secs;
        // A callback-delivered outcome (even a failure) has a response in
        // flight that must flush to the browser; only a timeout or an
        // interrupt may tear the server down hard.
        let (outcome, graceful) = tokio::select! {
            outcome = outcome_rx => {
                (outcome.unwrap_or_else(|_| Err(AppError::Interrupted)), true)
            }
            () = sleep_or_forever(timeout_secs) => {
                tracing::warn!(timeout_secs, "No callback received, giving up");
                (Err(AppError::CallbackTimeout(timeout_secs)), false)
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down listener");
                state.cancel.cancel();
                (Err(AppError::Interrupted), false)
            }
        };

        // Release the port on every path. Awaiting the handle (aborted or
        // not) guarantees the socket is dropped before returning.
        let _ = shutdown_tx.send(());
        if !graceful {
            server.abort();
        }
        let _ = server.await;

        outcome
    }
}

async fn sleep_or_forever(secs: u64) {
    if secs == 0 {
        std::future::pending::<()>().await;
    } else {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}

/// The downstream pipeline once a code arrives: exchange, label, drain,
/// persist, summarize. Runs inside the callback request so the browser sees
/// the final outcome.
pub(crate) async fn process_code(state: &AppState, code: &str) -> Result<RunReport, AppError> {
    let tokens = state.strava.exchange_code(code).await?;

    // Credentials are never persisted here; hand the refresh token to the
    // operator for external reuse.
    println!("Token exchange succeeded. To renew access later without re-authorizing, save:");
    println!("STRAVA_REFRESH_TOKEN={}", tokens.refresh_token);

    if let Some(expiry) = chrono::DateTime::from_timestamp(tokens.expires_at, 0) {
        tracing::debug!(expires_at = %expiry.to_rfc3339(), "Access token expiry");
    }

    let athlete = state.strava.get_athlete(&tokens.access_token).await?;
    tracing::info!(
        athlete_id = athlete.id,
        name = %athlete.display_name(),
        "Fetching all activities"
    );

    let FetchReport {
        records,
        pages,
        error,
    } = state
        .strava
        .fetch_all_activities(&tokens.access_token, &state.cancel)
        .await;

    if let Some(err) = &error {
        tracing::warn!(
            pages,
            fetched = records.len(),
            error = %err,
            "Pagination ended early; exporting partial results"
        );
    } else {
        tracing::info!(pages, fetched = records.len(), "Account drained");
    }

    let export_path = state.sink.write_batch(athlete.label(), &records)?;
    let by_category = summarize_by_category(&records);

    Ok(RunReport {
        athlete_label: athlete.label().to_string(),
        export_path,
        total: records.len(),
        by_category,
        pagination_error: error,
    })
}
