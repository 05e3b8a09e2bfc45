// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava-Export: archive a Strava account's activity history
//!
//! One run drives a browser-based OAuth authorization, captures the redirect
//! on a short-lived local listener, drains the paginated activities API and
//! hands the raw records to the JSON export sink.

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};

use config::Config;
use error::AppError;
use services::export::JsonExportSink;
use services::ingest::RunReport;
use services::strava::StravaClient;

/// Cooperative cancellation flag, checked between page requests.
#[derive(Clone, Default, Debug)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Listener lifecycle for the single OAuth callback.
///
/// The outcome channel lives inside `Listening`, so accepting a second
/// callback is impossible by construction rather than by convention.
#[derive(Debug)]
pub enum ListenerState {
    Listening(oneshot::Sender<Result<RunReport, AppError>>),
    Processing,
    Done,
}

impl ListenerState {
    /// Move `Listening` to `Processing`, yielding the outcome channel.
    ///
    /// Every callback after the first gets `None` and must be answered
    /// without touching the pipeline.
    pub fn try_begin(&mut self) -> Option<oneshot::Sender<Result<RunReport, AppError>>> {
        match std::mem::replace(self, ListenerState::Processing) {
            ListenerState::Listening(tx) => Some(tx),
            prior => {
                *self = prior;
                None
            }
        }
    }
}

/// Shared application state.
#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    pub strava: StravaClient,
    pub sink: JsonExportSink,
    pub listener: Mutex<ListenerState>,
    pub cancel: CancelFlag,
}
