// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for OAuth token exchange and activity fetching.
//!
//! Handles:
//! - Authorization code exchange (one shot, never retried)
//! - Athlete profile lookup (export label only)
//! - Draining the paginated activities endpoint

use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;
use crate::models::ActivityRecord;
use crate::CancelFlag;

/// Strava's maximum page size for the activities endpoint.
pub const PAGE_SIZE: u32 = 200;

/// Pause between successful page requests to stay friendly to the API.
const PAGE_DELAY: Duration = Duration::from_millis(100);

/// Upper bound on pages per run. A provider that never returns a short page
/// would otherwise keep the loop alive forever.
const MAX_PAGES: u32 = 1000;

/// Strava API client.
#[derive(Clone, Debug)]
pub struct StravaClient {
    http: reqwest::Client,
    api_base: String,
    oauth_base: String,
    client_id: String,
    client_secret: String,
    page_delay: Duration,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: "https://www.strava.com/api/v3".to_string(),
            oauth_base: "https://www.strava.com/oauth".to_string(),
            client_id,
            client_secret,
            page_delay: PAGE_DELAY,
        }
    }

    /// Point the client at a different API host. Tests aim this at a local
    /// mock server.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Point the token endpoint at a different host.
    pub fn with_oauth_base(mut self, base: impl Into<String>) -> Self {
        self.oauth_base = base.into();
        self
    }

    /// Override the inter-page delay.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Exchange an authorization code for a token pair.
    ///
    /// The code is consumed by this attempt whether or not it succeeds;
    /// callers must never retry with the same code.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        let url = format!("{}/token", self.oauth_base);

        let response = self
            .http
            .post(&url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Strava token exchange failed");
            return Err(AppError::AuthExchange { status, body });
        }

        response.json().await.map_err(AppError::Transport)
    }

    /// Get the authenticated athlete's profile.
    pub async fn get_athlete(&self, access_token: &str) -> Result<Athlete, AppError> {
        let url = format!("{}/athlete", self.api_base);

        let response = self.http.get(&url).bearer_auth(access_token).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::AthleteFetch { status, body });
        }

        response.json().await.map_err(AppError::Transport)
    }

    /// Fetch one page of activities (1-based page index).
    async fn activities_page(
        &self,
        access_token: &str,
        page: u32,
    ) -> Result<Vec<ActivityRecord>, AppError> {
        let url = format!("{}/athlete/activities", self.api_base);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::PageFetch { page, status, body });
        }

        response.json().await.map_err(AppError::Transport)
    }

    /// Drain every page of the athlete's activities.
    ///
    /// Strava has no "has more" flag: a short or empty page is the only
    /// exhaustion signal, so the loop runs until one arrives, an error aborts
    /// it, or the page cap trips. Whatever was collected before an abort is
    /// always returned.
    pub async fn fetch_all_activities(
        &self,
        access_token: &str,
        cancel: &CancelFlag,
    ) -> FetchReport {
        let mut records: Vec<ActivityRecord> = Vec::new();
        let mut page = 1u32;

        loop {
            if cancel.is_cancelled() {
                tracing::info!(page, total = records.len(), "Fetch cancelled");
                return FetchReport {
                    records,
                    pages: page - 1,
                    error: Some(AppError::Interrupted),
                };
            }

            tracing::debug!(page, "Requesting activity page");
            let batch = match self.activities_page(access_token, page).await {
                Ok(batch) => batch,
                Err(err) => {
                    tracing::warn!(
                        page,
                        total = records.len(),
                        error = %err,
                        "Pagination aborted, keeping partial results"
                    );
                    return FetchReport {
                        records,
                        pages: page - 1,
                        error: Some(err),
                    };
                }
            };

            let got = batch.len();
            records.extend(batch);
            tracing::info!(page, got, total = records.len(), "Fetched activity page");

            // Short or empty page: the account is drained.
            if got < PAGE_SIZE as usize {
                return FetchReport {
                    records,
                    pages: page,
                    error: None,
                };
            }

            if page >= MAX_PAGES {
                return FetchReport {
                    records,
                    pages: page,
                    error: Some(AppError::PageLimit(page)),
                };
            }

            page += 1;
            tokio::time::sleep(self.page_delay).await;
        }
    }
}

/// Result of draining the activities endpoint.
///
/// Pagination failures do not discard work: `records` always holds everything
/// fetched before the abort, and `error` reports why the loop stopped early.
#[derive(Debug)]
pub struct FetchReport {
    pub records: Vec<ActivityRecord>,
    /// Pages fetched successfully.
    pub pages: u32,
    pub error: Option<AppError>,
}

impl FetchReport {
    /// True when the loop aborted before seeing the exhaustion signal.
    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }
}

/// Token pair from the OAuth exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Athlete profile, used only to derive the export label.
#[derive(Debug, Clone, Deserialize)]
pub struct Athlete {
    pub id: u64,
    pub username: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

impl Athlete {
    /// Label for the export filename: username, else first name, else "unknown".
    pub fn label(&self) -> &str {
        self.username
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.firstname.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or("unknown")
    }

    /// Human-readable name for logs.
    pub fn display_name(&self) -> String {
        let name = format!(
            "{} {}",
            self.firstname.as_deref().unwrap_or(""),
            self.lastname.as_deref().unwrap_or("")
        );
        name.trim().to_string()
    }
}
